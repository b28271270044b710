//! The runtime value tree.
//!
//! [`Value`] is the single currency between callers, the property path layer,
//! the driver boundary and the result materializer: parameter objects, bound
//! parameter values, result rows and generated keys are all `Value`s. Scalar
//! variants map one-to-one onto driver-level values; `Array`, `Map` and
//! `Record` are the three container shapes the dynamic object view knows how
//! to address.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::ErrorKind;
use crate::meta::TypeSchema;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// An ordered sequence. The only shape the object view treats as
    /// appendable.
    Array(Vec<Value>),
    /// A key-value container. Indexed access uses the raw index text as key.
    Map(BTreeMap<String, Value>),
    /// A typed record whose readable and writable properties are declared by
    /// a registered [`TypeSchema`].
    Record(Record),
}

/// The declared type of a value, used in parameter descriptors and property
/// schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Boolean,
    Int32,
    Int64,
    Double,
    Text,
    Bytes,
    Array,
    Map,
    Record,
    /// No declared type; resolution happens per-invocation.
    Any,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Any,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Array(_) => ValueKind::Array,
            Value::Map(_) => ValueKind::Map,
            Value::Record(_) => ValueKind::Record,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for the non-container, non-null variants. A scalar parameter
    /// object is bound directly instead of being resolved through a property
    /// path.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            Value::Null | Value::Array(_) | Value::Map(_) | Value::Record(_)
        )
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// An empty key-value container.
    pub fn map() -> Value {
        Value::Map(BTreeMap::new())
    }

    /// Renders the value as JSON for diagnostics. Record schemas are not
    /// part of the rendering, only field values.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "<unrenderable>".to_string())
    }

    /// A short human-readable description of the wrapped shape, used in
    /// property path errors.
    pub(crate) fn shape_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Array(_) => "a sequence".to_string(),
            Value::Map(_) => "a map".to_string(),
            Value::Record(r) => format!("type `{}`", r.schema().name()),
            other => format!("a scalar ({:?})", other.kind()),
        }
    }
}

// Cache keys hash extracted literal values; doubles hash by bit pattern so
// that equal-by-extraction keys collide deterministically.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) => i.hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Array(values) => {
                for value in values {
                    value.hash(state);
                }
            }
            Value::Map(fields) => {
                for (key, value) in fields {
                    key.hash(state);
                    value.hash(state);
                }
            }
            Value::Record(record) => {
                record.schema().name().hash(state);
                for (key, value) in record.fields() {
                    key.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<V> FromIterator<(String, V)> for Value
where
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// An instance of a registered type: schema plus field values. Fields that
/// were never written read back as [`Value::Null`].
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<TypeSchema>,
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(schema: Arc<TypeSchema>) -> Self {
        Record {
            schema,
            fields: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.schema
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Reads a declared property. Errors when the schema declares no
    /// readable property of that name.
    pub fn get(&self, property: &str) -> crate::Result<Value> {
        if !self.schema.has_reader(property) {
            return Err(self.no_such_property(property));
        }

        Ok(self.fields.get(property).cloned().unwrap_or(Value::Null))
    }

    /// Writes a declared property. Errors when the schema declares no
    /// writable property of that name.
    pub fn set(&mut self, property: &str, value: Value) -> crate::Result<()> {
        if !self.schema.has_writer(property) {
            return Err(self.no_such_property(property));
        }

        self.fields.insert(property.to_string(), value);
        Ok(())
    }

    pub(crate) fn field_mut(&mut self, property: &str) -> Option<&mut Value> {
        self.fields.get_mut(property)
    }

    pub(crate) fn insert_field(&mut self, property: &str, value: Value) {
        self.fields.insert(property.to_string(), value);
    }

    fn no_such_property(&self, property: &str) -> crate::Error {
        let mut builder = crate::Error::builder(ErrorKind::NoSuchProperty {
            target: format!("type `{}`", self.schema.name()),
            property: property.to_string(),
        });
        builder.set_property(property);
        builder.build()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.fields == other.fields
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
