//! Build-time configuration: the operation registry and session-level
//! settings shared by every executor created from it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::executor::CacheScope;
use crate::mapping::MappedOperation;
use crate::meta::TypeRegistry;

/// Everything an executor needs that is fixed before the first statement
/// runs: mapped operations keyed by id, the type registry backing object
/// views, and the environment the configuration was built for.
#[derive(Debug)]
pub struct Configuration {
    operations: HashMap<String, Arc<MappedOperation>>,
    environment_id: String,
    cache_scope: CacheScope,
    types: TypeRegistry,
}

impl Configuration {
    pub fn new(environment_id: impl Into<String>) -> Configuration {
        Configuration {
            operations: HashMap::new(),
            environment_id: environment_id.into(),
            cache_scope: CacheScope::Session,
            types: TypeRegistry::new(),
        }
    }

    /// Registers a mapped operation under its id. Ids are unique per
    /// configuration; a second registration under the same id is a
    /// configuration error, not a silent override.
    pub fn register_operation(&mut self, operation: Arc<MappedOperation>) -> crate::Result<()> {
        let id = operation.id().to_string();

        if self.operations.contains_key(&id) {
            return Err(ErrorKind::configuration(format!(
                "operation {id:?} is already registered"
            ))
            .into());
        }

        self.operations.insert(id, operation);
        Ok(())
    }

    /// Looks up a mapped operation by id.
    pub fn operation(&self, id: &str) -> crate::Result<&Arc<MappedOperation>> {
        self.operations.get(id).ok_or_else(|| {
            let mut builder = Error::builder(ErrorKind::OperationNotFound { id: id.to_string() });
            builder.set_statement_id(id);
            builder.build()
        })
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn cache_scope(&self) -> CacheScope {
        self.cache_scope
    }

    pub fn set_cache_scope(&mut self, scope: CacheScope) {
        self.cache_scope = scope;
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }
}
