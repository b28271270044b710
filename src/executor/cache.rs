//! The session-level query result cache.
//!
//! A cached result is addressed by a composite key derived from everything
//! that influences what the database would return: the operation, the row
//! bounds, the final SQL text, the resolved input parameter values and the
//! environment the configuration was built for. Keys compare by value, so
//! two independently built parameter objects with equal contents hit the
//! same slot.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::value::Value;

/// How long cached results live. `Session` keeps entries until a mutation
/// clears them; `Statement` drops everything after each query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    Session,
    Statement,
}

/// A value-equality composite cache key.
#[derive(Debug, Clone)]
pub struct CacheKey {
    parts: Vec<Value>,
}

impl CacheKey {
    pub fn new() -> CacheKey {
        CacheKey { parts: Vec::new() }
    }

    pub fn push(&mut self, part: Value) {
        self.parts.push(part);
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        CacheKey::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| values_identical(a, b))
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

/// Bitwise comparison for floats so that `Eq` is sound and agrees with the
/// `to_bits`-based `Hash` on `Value`.
fn values_identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_identical(a, b))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((ka, va), (kb, vb))| ka == kb && values_identical(va, vb))
        }
        (Value::Record(x), Value::Record(y)) => {
            x.schema().name() == y.schema().name()
                && x.fields().len() == y.fields().len()
                && x.fields()
                    .iter()
                    .zip(y.fields())
                    .all(|((ka, va), (kb, vb))| ka == kb && values_identical(va, vb))
        }
        _ => a == b,
    }
}

/// A per-session cache of materialized row lists. Entries are defensively
/// copied on both sides so cached data never aliases caller-visible data,
/// and a hit never re-runs materialization.
#[derive(Debug, Default)]
pub(crate) struct LocalCache {
    entries: HashMap<CacheKey, Vec<Value>>,
}

impl LocalCache {
    pub(crate) fn new() -> LocalCache {
        LocalCache {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<Vec<Value>> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn put(&mut self, key: CacheKey, rows: &[Value]) {
        self.entries.insert(key, rows.to_vec());
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
