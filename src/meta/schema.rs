//! Per-type capability tables.
//!
//! A [`TypeSchema`] declares, once per type, which named properties can be
//! read and written, their declared value kinds, and whether the type can be
//! default-constructed. Schemas are built through an explicit registration
//! step instead of runtime reflection and are memoized in a shared
//! [`TypeRegistry`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::error::ErrorKind;
use crate::value::{Record, Value, ValueKind};

/// One declared property of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    name: String,
    kind: ValueKind,
    /// For `ValueKind::Record` properties, the registered name of the child
    /// type. Required to default-construct the child when writing through a
    /// null intermediate.
    schema_ref: Option<String>,
    readable: bool,
    writable: bool,
}

impl PropertySchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn schema_ref(&self) -> Option<&str> {
        self.schema_ref.as_deref()
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

/// The capability table for one registered type.
#[derive(Debug)]
pub struct TypeSchema {
    name: String,
    properties: BTreeMap<String, PropertySchema>,
    // Secondary index for compatibility matching of column names.
    case_index: HashMap<String, String>,
    constructible: bool,
}

impl TypeSchema {
    pub fn builder(name: impl Into<String>) -> TypeSchemaBuilder {
        TypeSchemaBuilder {
            name: name.into(),
            properties: Vec::new(),
            constructible: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    pub fn has_reader(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|p| p.readable)
    }

    pub fn has_writer(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|p| p.writable)
    }

    pub fn reader_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .values()
            .filter(|p| p.readable)
            .map(|p| p.name.as_str())
    }

    pub fn writer_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .values()
            .filter(|p| p.writable)
            .map(|p| p.name.as_str())
    }

    /// Finds the canonical property name for `name`, optionally ignoring
    /// case. Case-insensitive lookup is a secondary index; exact matches
    /// always win.
    pub fn find_property(&self, name: &str, ignore_case: bool) -> Option<&str> {
        if let Some(p) = self.properties.get(name) {
            return Some(p.name.as_str());
        }

        if ignore_case {
            return self
                .case_index
                .get(&name.to_lowercase())
                .map(String::as_str);
        }

        None
    }

    pub fn is_constructible(&self) -> bool {
        self.constructible
    }

    /// Default-constructs an instance of this type with all fields unset.
    pub fn instantiate(self: &Arc<Self>) -> crate::Result<Value> {
        if !self.constructible {
            return Err(ErrorKind::NotConstructible {
                type_name: self.name.clone(),
            }
            .into());
        }

        Ok(Value::Record(Record::new(Arc::clone(self))))
    }
}

impl PartialEq for TypeSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug)]
pub struct TypeSchemaBuilder {
    name: String,
    properties: Vec<PropertySchema>,
    constructible: bool,
}

impl TypeSchemaBuilder {
    /// Declares a readable and writable property.
    pub fn field(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.property(name, kind, None, true, true)
    }

    /// Declares a readable and writable property holding an instance of
    /// another registered type.
    pub fn record_field(self, name: impl Into<String>, schema_ref: impl Into<String>) -> Self {
        self.property(name, ValueKind::Record, Some(schema_ref.into()), true, true)
    }

    /// Declares a property with an accessor but no mutator.
    pub fn readonly(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.property(name, kind, None, true, false)
    }

    /// Declares a property with a mutator but no accessor.
    pub fn writeonly(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.property(name, kind, None, false, true)
    }

    /// Marks the type as lacking a default-construction capability.
    pub fn not_constructible(mut self) -> Self {
        self.constructible = false;
        self
    }

    fn property(
        mut self,
        name: impl Into<String>,
        kind: ValueKind,
        schema_ref: Option<String>,
        readable: bool,
        writable: bool,
    ) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            kind,
            schema_ref,
            readable,
            writable,
        });
        self
    }

    /// Validates and builds the schema. Conflicting declarations for the
    /// same logical name are a configuration error, never silently merged:
    /// identical re-declarations are idempotent, anything else is ambiguous.
    /// Two distinct names that collide case-insensitively are ambiguous too,
    /// because the case-insensitive index could resolve to either.
    pub fn build(self) -> crate::Result<TypeSchema> {
        let mut properties: BTreeMap<String, PropertySchema> = BTreeMap::new();
        let mut case_index: HashMap<String, String> = HashMap::new();

        for property in self.properties {
            if let Some(existing) = properties.get(&property.name) {
                if *existing == property {
                    continue;
                }

                return Err(ErrorKind::AmbiguousProperty {
                    type_name: self.name,
                    property: property.name,
                }
                .into());
            }

            let lower = property.name.to_lowercase();
            if let Some(other) = case_index.get(&lower) {
                if *other != property.name {
                    return Err(ErrorKind::AmbiguousProperty {
                        type_name: self.name,
                        property: property.name,
                    }
                    .into());
                }
            }

            case_index.insert(lower, property.name.clone());
            properties.insert(property.name.clone(), property);
        }

        Ok(TypeSchema {
            name: self.name,
            properties,
            case_index,
            constructible: self.constructible,
        })
    }
}

/// The shared, read-mostly schema cache. This is the one structure shared
/// across concurrent sessions; population is compute-if-absent and lookups
/// take only the read lock.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    inner: RwLock<HashMap<String, Arc<TypeSchema>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<TypeSchema>> {
        self.read().get(name).cloned()
    }

    /// Registers a schema if no schema of that name exists yet; returns the
    /// registered schema either way. The first registration wins.
    pub fn register(&self, schema: TypeSchema) -> Arc<TypeSchema> {
        let mut guard = self.write();
        Arc::clone(guard.entry(schema.name().to_string()).or_insert_with(|| {
            tracing::debug!(type_name = schema.name(), "registering type schema");
            Arc::new(schema)
        }))
    }

    /// Compute-if-absent lookup: builds and registers the schema only when
    /// it is not cached yet.
    pub fn get_or_register<F>(&self, name: &str, build: F) -> crate::Result<Arc<TypeSchema>>
    where
        F: FnOnce() -> crate::Result<TypeSchema>,
    {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let schema = build()?;
        Ok(self.register(schema))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<TypeSchema>>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<TypeSchema>>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
