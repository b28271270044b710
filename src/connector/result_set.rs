//! Fully materialized query results.

use std::sync::Arc;

use crate::error::ErrorKind;
use crate::value::Value;

/// The rows returned by a single query execution. Column names are shared
/// across all rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub(crate) columns: Arc<Vec<String>>,
    pub(crate) rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(names: Vec<String>, rows: Vec<Vec<Value>>) -> ResultSet {
        ResultSet {
            columns: Arc::new(names),
            rows,
        }
    }

    pub fn empty() -> ResultSet {
        ResultSet::new(Vec::new(), Vec::new())
    }

    pub fn columns(&self) -> &Vec<String> {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first row, if any.
    pub fn first(&self) -> Option<ResultRow> {
        self.rows.first().map(|values| ResultRow {
            columns: Arc::clone(&self.columns),
            values: values.clone(),
        })
    }

    /// Consumes the set, returning its only row. Errors when empty.
    pub fn into_single(self) -> crate::Result<ResultRow> {
        match self.into_iter().next() {
            Some(row) => Ok(row),
            None => Err(ErrorKind::NotFound.into()),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRow;
    type IntoIter = ResultSetIterator;

    fn into_iter(self) -> Self::IntoIter {
        ResultSetIterator {
            columns: self.columns,
            rows: self.rows.into_iter(),
        }
    }
}

pub struct ResultSetIterator {
    columns: Arc<Vec<String>>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl Iterator for ResultSetIterator {
    type Item = ResultRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|values| ResultRow {
            columns: Arc::clone(&self.columns),
            values,
        })
    }
}

/// One row of a result set. Values are accessible by position or by column
/// name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub(crate) columns: Arc<Vec<String>>,
    pub(crate) values: Vec<Value>,
}

impl ResultRow {
    /// The value at the given position, if the row is wide enough.
    pub fn at(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    /// The value under the given column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| &self.values[idx])
    }

    pub fn columns(&self) -> &Vec<String> {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the row, returning its first value. Errors when the row is
    /// empty.
    pub fn into_single(self) -> crate::Result<Value> {
        match self.values.into_iter().next() {
            Some(value) => Ok(value),
            None => Err(ErrorKind::NotFound.into()),
        }
    }
}

impl IntoIterator for ResultRow {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> ResultSet {
        ResultSet::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Int64(1), Value::from("Musti")],
                vec![Value::Int64(2), Value::from("Naukio")],
            ],
        )
    }

    #[test]
    fn positional_and_named_access_agree() {
        let set = users();
        let row = set.first().unwrap();

        assert_eq!(row.at(0), row.get("id"));
        assert_eq!(row.at(1), row.get("name"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn into_single_requires_a_row() {
        let set = users();
        assert_eq!(set.len(), 2);
        assert!(set.into_single().is_ok());

        let err = ResultSet::empty().into_single().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotFound));
    }

    #[test]
    fn iteration_preserves_order() {
        let names: Vec<Value> = users()
            .into_iter()
            .map(|row| row.get("name").cloned().unwrap())
            .collect();

        assert_eq!(names, vec![Value::from("Musti"), Value::from("Naukio")]);
    }
}
