//! Tokenization of dotted, possibly-indexed property paths.
//!
//! A path like `orders[0].total` decomposes into a first segment (`orders`
//! with index `0`) and a remainder (`total`). Resolution walks one segment
//! at a time, recursing into the remainder.

/// One step of a property path, borrowed from the full path string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyPath<'a> {
    name: &'a str,
    index: Option<&'a str>,
    indexed_name: &'a str,
    children: Option<&'a str>,
}

impl<'a> PropertyPath<'a> {
    pub fn parse(full: &'a str) -> PropertyPath<'a> {
        let (segment, children) = match full.find('.') {
            Some(dot) => (&full[..dot], Some(&full[dot + 1..])),
            None => (full, None),
        };

        let (name, index) = match segment.find('[') {
            Some(open) if segment.ends_with(']') => (
                &segment[..open],
                Some(&segment[open + 1..segment.len() - 1]),
            ),
            _ => (segment, None),
        };

        PropertyPath {
            name,
            index,
            indexed_name: segment,
            children,
        }
    }

    /// The bare segment name, without any index suffix.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The raw index text found inside `[...]`, if any. Numeric for
    /// sequences, an arbitrary key for maps.
    pub fn index(&self) -> Option<&'a str> {
        self.index
    }

    /// The segment including its index suffix, e.g. `orders[0]`.
    pub fn indexed_name(&self) -> &'a str {
        self.indexed_name
    }

    pub fn children(&self) -> Option<&'a str> {
        self.children
    }

    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    /// The tokenized remainder path, if any.
    pub fn next(&self) -> Option<PropertyPath<'a>> {
        self.children.map(PropertyPath::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name() {
        let path = PropertyPath::parse("total");
        assert_eq!(path.name(), "total");
        assert_eq!(path.index(), None);
        assert_eq!(path.indexed_name(), "total");
        assert!(!path.has_children());
    }

    #[test]
    fn indexed_with_remainder() {
        let path = PropertyPath::parse("orders[0].total");
        assert_eq!(path.name(), "orders");
        assert_eq!(path.index(), Some("0"));
        assert_eq!(path.indexed_name(), "orders[0]");
        assert_eq!(path.children(), Some("total"));

        let next = path.next().unwrap();
        assert_eq!(next.name(), "total");
        assert!(!next.has_children());
    }

    #[test]
    fn map_key_index() {
        let path = PropertyPath::parse("attributes[color]");
        assert_eq!(path.name(), "attributes");
        assert_eq!(path.index(), Some("color"));
    }

    #[test]
    fn bare_index() {
        let path = PropertyPath::parse("[2].id");
        assert_eq!(path.name(), "");
        assert_eq!(path.index(), Some("2"));
        assert_eq!(path.children(), Some("id"));
    }

    #[test]
    fn deep_nesting() {
        let path = PropertyPath::parse("a.b[1].c.d");
        let names: Vec<&str> = std::iter::successors(Some(path), PropertyPath::next)
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }
}
