//! The dynamic object view: uniform path-based access over heterogeneous
//! value shapes.
//!
//! An [`ObjectView`] wraps exactly one value for its lifetime and exposes
//! `get`, `set`, `has_reader`, `has_writer` and append operations driven by
//! dotted/indexed path strings. Dispatch is by the wrapped value's runtime
//! shape: key-value containers use the raw index text as a key, sequences
//! parse it as a numeric offset, and records consult their registered
//! capability table.
//!
//! Writing through an absent intermediate default-constructs it (a record
//! via its registered schema, otherwise a map, or a sequence when the next
//! index is numeric). Reading never instantiates: a null anywhere along the
//! path reads as null.

use crate::error::ErrorKind;
use crate::meta::property::PropertyPath;
use crate::meta::schema::{PropertySchema, TypeRegistry};
use crate::value::{Value, ValueKind};

/// A path-addressable view over one wrapped value. Created on demand,
/// discarded after the access; never cached across calls.
#[derive(Debug)]
pub struct ObjectView<'a> {
    target: &'a mut Value,
    types: &'a TypeRegistry,
}

impl<'a> ObjectView<'a> {
    pub fn new(target: &'a mut Value, types: &'a TypeRegistry) -> ObjectView<'a> {
        ObjectView { target, types }
    }

    pub fn get(&self, path: &str) -> crate::Result<Value> {
        read_path(self.target, path)
    }

    pub fn set(&mut self, path: &str, value: Value) -> crate::Result<()> {
        write_path(self.target, path, value, self.types)
    }

    pub fn has_reader(&self, path: &str) -> bool {
        has_reader(self.target, path)
    }

    pub fn has_writer(&self, path: &str) -> bool {
        has_writer(self.target, path)
    }

    /// True only for the sequence shape. A map or record is never treated
    /// as appendable even though it is path-addressable.
    pub fn is_appendable(&self) -> bool {
        matches!(self.target, Value::Array(_))
    }

    pub fn append(&mut self, value: Value) -> crate::Result<()> {
        match &mut *self.target {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            other => Err(ErrorKind::NotAppendable {
                property: other.shape_name(),
            }
            .into()),
        }
    }

    pub fn append_all(&mut self, values: impl IntoIterator<Item = Value>) -> crate::Result<()> {
        for value in values {
            self.append(value)?;
        }
        Ok(())
    }
}

/// Reads the value at `path` without requiring mutable access. A null
/// intermediate short-circuits to `Null`.
pub fn read_path(target: &Value, path: &str) -> crate::Result<Value> {
    read_token(target, PropertyPath::parse(path))
}

fn read_token(target: &Value, prop: PropertyPath<'_>) -> crate::Result<Value> {
    match prop.next() {
        Some(rest) => {
            let child = get_token(target, &prop)?;
            if child.is_null() {
                return Ok(Value::Null);
            }
            read_token(&child, rest)
        }
        None => get_token(target, &prop),
    }
}

/// Writes `value` at `path`, default-constructing absent intermediates.
/// Writing a null value through a null intermediate is a no-op: the
/// intermediate is not instantiated just to hold a null.
pub fn write_path(
    target: &mut Value,
    path: &str,
    value: Value,
    types: &TypeRegistry,
) -> crate::Result<()> {
    write_token(target, PropertyPath::parse(path), value, types)
}

fn write_token(
    target: &mut Value,
    prop: PropertyPath<'_>,
    value: Value,
    types: &TypeRegistry,
) -> crate::Result<()> {
    match prop.next() {
        Some(rest) => match child_slot_mut(target, &prop, value.is_null(), types)? {
            Some(slot) => write_token(slot, rest, value, types),
            None => Ok(()),
        },
        None => set_token(target, &prop, value),
    }
}

/// Resolves one segment (name plus optional index) to a value, cloning it
/// out of the target.
fn get_token(target: &Value, prop: &PropertyPath<'_>) -> crate::Result<Value> {
    let base = if prop.name().is_empty() {
        target.clone()
    } else {
        get_named(target, prop.name())?
    };

    match prop.index() {
        None => Ok(base),
        Some(index) => index_into(&base, index, prop),
    }
}

fn get_named(target: &Value, name: &str) -> crate::Result<Value> {
    match target {
        Value::Null => Ok(Value::Null),
        Value::Map(fields) => Ok(fields.get(name).cloned().unwrap_or(Value::Null)),
        Value::Record(record) => record.get(name),
        other => Err(no_such_property(other, name)),
    }
}

fn index_into(base: &Value, index: &str, prop: &PropertyPath<'_>) -> crate::Result<Value> {
    match base {
        Value::Null => Ok(Value::Null),
        Value::Map(fields) => Ok(fields.get(index).cloned().unwrap_or(Value::Null)),
        Value::Array(items) => {
            let offset = parse_offset(index)?;
            items.get(offset).cloned().ok_or_else(|| {
                ErrorKind::InvalidIndex {
                    index: index.to_string(),
                    message: format!("out of bounds for a sequence of length {}", items.len()),
                }
                .into()
            })
        }
        _ => Err(not_indexable(prop)),
    }
}

/// Resolves one segment to a mutable slot for recursion, instantiating
/// absent intermediates. Returns `None` when the write is a null and the
/// intermediate does not exist.
fn child_slot_mut<'v>(
    target: &'v mut Value,
    prop: &PropertyPath<'_>,
    writing_null: bool,
    types: &TypeRegistry,
) -> crate::Result<Option<&'v mut Value>> {
    // The parent's declared property drives instantiation of a direct named
    // child; captured before the mutable borrow below.
    let hint: Option<PropertySchema> = match (&*target, prop.index()) {
        (Value::Record(record), None) if !prop.name().is_empty() => {
            record.schema().property(prop.name()).cloned()
        }
        _ => None,
    };

    let base: &mut Value = if prop.name().is_empty() {
        target
    } else {
        // A null write must not leave a residual entry behind, so the
        // slot is only created when there is a value to carry.
        if writing_null && !named_child_exists(target, prop.name()) {
            return Ok(None);
        }
        named_slot_mut(target, prop.name())?
    };

    let slot: &mut Value = match prop.index() {
        None => base,
        Some(index) => {
            if base.is_null() {
                if writing_null {
                    return Ok(None);
                }
                *base = empty_container_for(index);
            }
            if writing_null && !indexed_child_exists(base, index) {
                return Ok(None);
            }
            index_slot_mut(base, index, prop)?
        }
    };

    if slot.is_null() {
        if writing_null {
            return Ok(None);
        }
        *slot = instantiate_child(hint.as_ref(), types)?;
    }

    Ok(Some(slot))
}

/// Whether a named child slot already exists. Shape errors are left for
/// `named_slot_mut` to raise.
fn named_child_exists(target: &Value, name: &str) -> bool {
    match target {
        Value::Map(fields) => fields.contains_key(name),
        Value::Record(record) => record.fields().contains_key(name),
        _ => true,
    }
}

fn indexed_child_exists(base: &Value, index: &str) -> bool {
    match base {
        Value::Map(fields) => fields.contains_key(index),
        Value::Array(items) => match parse_offset(index) {
            Ok(offset) => offset < items.len(),
            Err(_) => true,
        },
        _ => true,
    }
}

fn named_slot_mut<'v>(target: &'v mut Value, name: &str) -> crate::Result<&'v mut Value> {
    match target {
        Value::Map(fields) => Ok(fields.entry(name.to_string()).or_insert(Value::Null)),
        Value::Record(record) => {
            if !record.schema().has_writer(name) {
                let mut builder = crate::Error::builder(ErrorKind::NoSuchProperty {
                    target: format!("type `{}`", record.schema().name()),
                    property: name.to_string(),
                });
                builder.set_property(name);
                return Err(builder.build());
            }
            if record.field_mut(name).is_none() {
                record.insert_field(name, Value::Null);
            }
            Ok(record
                .field_mut(name)
                .unwrap_or_else(|| unreachable!("field inserted above")))
        }
        other => Err(no_such_property(other, name)),
    }
}

fn index_slot_mut<'v>(
    base: &'v mut Value,
    index: &str,
    prop: &PropertyPath<'_>,
) -> crate::Result<&'v mut Value> {
    match base {
        Value::Map(fields) => Ok(fields.entry(index.to_string()).or_insert(Value::Null)),
        Value::Array(items) => {
            let offset = parse_offset(index)?;
            if offset >= items.len() {
                items.resize(offset + 1, Value::Null);
            }
            Ok(&mut items[offset])
        }
        _ => Err(not_indexable(prop)),
    }
}

fn set_token(target: &mut Value, prop: &PropertyPath<'_>, value: Value) -> crate::Result<()> {
    if let Some(index) = prop.index() {
        let base: &mut Value = if prop.name().is_empty() {
            target
        } else {
            named_slot_mut(target, prop.name())?
        };

        if base.is_null() {
            if value.is_null() {
                return Ok(());
            }
            *base = empty_container_for(index);
        }

        return match base {
            Value::Map(fields) => {
                fields.insert(index.to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                let offset = parse_offset(index)?;
                if offset >= items.len() {
                    items.resize(offset + 1, Value::Null);
                }
                items[offset] = value;
                Ok(())
            }
            _ => Err(not_indexable(prop)),
        };
    }

    match target {
        Value::Map(fields) => {
            fields.insert(prop.name().to_string(), value);
            Ok(())
        }
        Value::Record(record) => record.set(prop.name(), value),
        other => Err(no_such_property(other, prop.name())),
    }
}

/// True when a read of `path` would resolve against declared/present state.
pub fn has_reader(target: &Value, path: &str) -> bool {
    let prop = PropertyPath::parse(path);

    match prop.children() {
        Some(rest) => match get_token(target, &prop) {
            Ok(child) if !child.is_null() => has_reader(&child, rest),
            _ => false,
        },
        None => match target {
            Value::Map(fields) => prop.name().is_empty() || fields.contains_key(prop.name()),
            Value::Record(record) => record.schema().has_reader(prop.name()),
            Value::Array(_) => {
                prop.name().is_empty()
                    && prop.index().is_some_and(|i| i.parse::<usize>().is_ok())
            }
            _ => false,
        },
    }
}

/// True when a write of `path` would have a target. For a null intermediate
/// only the first segment's writability can be judged.
pub fn has_writer(target: &Value, path: &str) -> bool {
    let prop = PropertyPath::parse(path);

    match prop.children() {
        Some(rest) => match get_token(target, &prop) {
            Ok(child) if !child.is_null() => has_writer(&child, rest),
            Ok(_) => first_segment_writable(target, &prop),
            Err(_) => false,
        },
        None => first_segment_writable(target, &prop),
    }
}

fn first_segment_writable(target: &Value, prop: &PropertyPath<'_>) -> bool {
    match target {
        Value::Map(_) => true,
        Value::Record(record) => record.schema().has_writer(prop.name()),
        Value::Array(_) => {
            prop.name().is_empty() && prop.index().is_some_and(|i| i.parse::<usize>().is_ok())
        }
        _ => false,
    }
}

fn instantiate_child(
    hint: Option<&PropertySchema>,
    types: &TypeRegistry,
) -> crate::Result<Value> {
    match hint {
        Some(property) => match property.kind() {
            ValueKind::Record => {
                let reference = property.schema_ref().ok_or_else(|| {
                    crate::Error::from(ErrorKind::NotConstructible {
                        type_name: format!("<unreferenced type of `{}`>", property.name()),
                    })
                })?;
                let schema = types.get(reference).ok_or_else(|| {
                    crate::Error::from(ErrorKind::NotConstructible {
                        type_name: reference.to_string(),
                    })
                })?;
                schema.instantiate()
            }
            ValueKind::Array => Ok(Value::Array(Vec::new())),
            _ => Ok(Value::map()),
        },
        None => Ok(Value::map()),
    }
}

fn empty_container_for(index: &str) -> Value {
    if index.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::map()
    }
}

fn parse_offset(index: &str) -> crate::Result<usize> {
    index.parse::<usize>().map_err(|_| {
        ErrorKind::InvalidIndex {
            index: index.to_string(),
            message: "not a numeric offset".to_string(),
        }
        .into()
    })
}

fn no_such_property(target: &Value, property: &str) -> crate::Error {
    let mut builder = crate::Error::builder(ErrorKind::NoSuchProperty {
        target: target.shape_name(),
        property: property.to_string(),
    });
    builder.set_property(property);
    builder.build()
}

fn not_indexable(prop: &PropertyPath<'_>) -> crate::Error {
    let mut builder = crate::Error::builder(ErrorKind::NotIndexable {
        property: prop.indexed_name().to_string(),
    });
    builder.set_property(prop.indexed_name());
    builder.build()
}
