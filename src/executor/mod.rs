//! Statement execution.
//!
//! An [`Executor`] owns one driver connection for the duration of a session
//! and runs mapped operations against it under one of three policies:
//! direct (a fresh handle per call), reuse (handles cached by SQL text) or
//! batch (mutations deferred into the driver's native batch API until a
//! flush). Queries go through a session-level result cache regardless of
//! policy.

mod batch;
mod cache;
pub mod keygen;
mod statement;

pub use batch::{BatchResult, BATCH_UPDATE_SENTINEL};
pub use cache::{CacheKey, CacheScope};
pub use keygen::KeyGenerator;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Configuration;
use crate::connector::{Driver, ResultSet, StatementId};
use crate::error::ErrorKind;
use crate::mapping::{BoundStatement, MappedOperation, ParameterMode, StatementKind};
use crate::materializer::{DefaultMaterializer, RowMaterializer};
use crate::value::Value;

use batch::BatchState;
use cache::LocalCache;

/// A window over a query's rows, applied during materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl RowBounds {
    pub const DEFAULT: RowBounds = RowBounds {
        offset: 0,
        limit: usize::MAX,
    };

    pub fn new(offset: usize, limit: usize) -> RowBounds {
        RowBounds { offset, limit }
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        RowBounds::DEFAULT
    }
}

/// The execution policy an executor is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    #[default]
    Direct,
    Reuse,
    Batch,
}

impl ExecutorKind {
    fn policy(self) -> Policy {
        match self {
            ExecutorKind::Direct => Policy::Direct,
            ExecutorKind::Reuse => Policy::Reuse {
                statements: HashMap::new(),
            },
            ExecutorKind::Batch => Policy::Batch(BatchState::default()),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Policy {
    Direct,
    Reuse {
        statements: HashMap<String, StatementId>,
    },
    Batch(BatchState),
}

/// A session-scoped execution engine over one driver connection.
pub struct Executor {
    config: Arc<Configuration>,
    driver: Box<dyn Driver>,
    materializer: Box<dyn RowMaterializer>,
    cache: LocalCache,
    policy: Policy,
    closed: bool,
}

impl Executor {
    pub fn new(config: Arc<Configuration>, driver: Box<dyn Driver>, kind: ExecutorKind) -> Executor {
        Executor {
            config,
            driver,
            materializer: Box::new(DefaultMaterializer),
            cache: LocalCache::new(),
            policy: kind.policy(),
            closed: false,
        }
    }

    pub fn set_materializer(&mut self, materializer: Box<dyn RowMaterializer>) {
        self.materializer = materializer;
    }

    /// Runs a select operation and materializes its rows.
    ///
    /// The result cache is consulted first; under the batch policy a cache
    /// miss flushes any pending mutations before the query runs, so the
    /// query observes its own session's writes.
    pub fn query(
        &mut self,
        id: &str,
        parameter: &Value,
        bounds: RowBounds,
    ) -> crate::Result<Vec<Value>> {
        self.ensure_open()?;

        let operation = Arc::clone(self.config.operation(id)?);
        let bound = operation.sql_source().bound_statement(parameter)?;
        let key = self.cache_key(&operation, &bound, &bounds)?;

        // A hit returns the cached materialized rows as-is; the
        // materializer only ever runs for a database round-trip.
        let rows = match self.cached(&operation, &key) {
            Some(hit) => {
                debug!(statement_id = id, "result cache hit");
                hit
            }
            None => {
                let result = self.query_database(&operation, &bound)?;
                let rows = self.materializer.materialize(
                    result,
                    operation.result_shapes(),
                    &bounds,
                    self.config.types(),
                )?;
                if operation.use_cache() {
                    self.cache.put(key, &rows);
                }
                rows
            }
        };

        if self.config.cache_scope() == CacheScope::Statement {
            self.cache.clear();
        }

        Ok(rows)
    }

    /// Runs a mutation. Under the batch policy the statement is accumulated
    /// and [`BATCH_UPDATE_SENTINEL`] is returned instead of a real count;
    /// running a `Flush` operation executes the accumulator and returns the
    /// summed counts.
    pub fn update(&mut self, id: &str, parameter: &mut Value) -> crate::Result<i64> {
        self.ensure_open()?;

        let operation = Arc::clone(self.config.operation(id)?);

        if operation.kind() == StatementKind::Flush {
            let results = self.flush(false)?;
            return Ok(results
                .iter()
                .map(|result| result.update_counts().iter().sum::<i64>())
                .sum());
        }

        if !operation.kind().is_mutation() {
            return Err(ErrorKind::configuration(format!(
                "operation `{id}` is not a mutation"
            ))
            .into());
        }

        // Any mutation invalidates cached query results, including ones
        // merely accumulated for a later batch flush.
        self.cache.clear();

        self.process_before(&operation, parameter)?;
        let bound = operation.sql_source().bound_statement(parameter)?;

        debug!(statement_id = id, sql = bound.sql(), "executing mutation");

        if matches!(self.policy, Policy::Batch(_)) {
            self.batch_update(&operation, &bound)
        } else if matches!(self.policy, Policy::Reuse { .. }) {
            self.reuse_update(&operation, &bound, parameter)
        } else {
            self.direct_update(&operation, &bound, parameter)
        }
    }

    /// Executes pending batch entries and releases reused handles. Cached
    /// query results survive a flush.
    pub fn flush_statements(&mut self) -> crate::Result<Vec<BatchResult>> {
        self.ensure_open()?;
        self.flush(false)
    }

    /// Closes the session. With `force_rollback` any pending batch entries
    /// are discarded instead of executed. Idempotent.
    pub fn close(&mut self, force_rollback: bool) {
        if self.closed {
            return;
        }

        if let Err(error) = self.flush(force_rollback) {
            warn!(%error, "flush during close failed");
        }

        self.cache.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> crate::Result<()> {
        if self.closed {
            Err(ErrorKind::ExecutorClosed.into())
        } else {
            Ok(())
        }
    }

    fn cached(&self, operation: &MappedOperation, key: &CacheKey) -> Option<Vec<Value>> {
        if operation.use_cache() {
            self.cache.get(key)
        } else {
            None
        }
    }

    fn flush(&mut self, is_rollback: bool) -> crate::Result<Vec<BatchResult>> {
        if matches!(self.policy, Policy::Batch(_)) {
            return self.do_flush(is_rollback);
        }

        if let Policy::Reuse { statements } = &mut self.policy {
            let handles: Vec<StatementId> = statements.drain().map(|(_, handle)| handle).collect();
            for handle in handles {
                close_quietly(self.driver.as_mut(), handle);
            }
        }

        Ok(Vec::new())
    }

    fn query_database(
        &mut self,
        operation: &Arc<MappedOperation>,
        bound: &BoundStatement,
    ) -> crate::Result<ResultSet> {
        debug!(statement_id = operation.id(), sql = bound.sql(), "executing query");

        if matches!(self.policy, Policy::Batch(_)) {
            // Pending mutations must reach the database before the query
            // runs against it.
            self.do_flush(false)?;
            return self.direct_query(operation, bound);
        }

        if matches!(self.policy, Policy::Reuse { .. }) {
            let handle = self.reuse_prepare(operation, bound)?;
            statement::parameterize(self.driver.as_mut(), handle, bound)?;
            return self.driver.execute_query(handle);
        }

        self.direct_query(operation, bound)
    }

    fn direct_query(
        &mut self,
        operation: &MappedOperation,
        bound: &BoundStatement,
    ) -> crate::Result<ResultSet> {
        let handle = statement::prepare(self.driver.as_mut(), operation, bound)?;
        let result = statement::parameterize(self.driver.as_mut(), handle, bound)
            .and_then(|_| self.driver.execute_query(handle));
        close_quietly(self.driver.as_mut(), handle);
        result
    }

    fn direct_update(
        &mut self,
        operation: &Arc<MappedOperation>,
        bound: &BoundStatement,
        parameter: &mut Value,
    ) -> crate::Result<i64> {
        let handle = statement::prepare(self.driver.as_mut(), operation, bound)?;
        let result = statement::parameterize(self.driver.as_mut(), handle, bound)
            .and_then(|_| self.driver.execute_update(handle))
            .and_then(|count| {
                self.process_after(operation, handle, parameter)?;
                Ok(count as i64)
            });
        close_quietly(self.driver.as_mut(), handle);
        result
    }

    fn reuse_update(
        &mut self,
        operation: &Arc<MappedOperation>,
        bound: &BoundStatement,
        parameter: &mut Value,
    ) -> crate::Result<i64> {
        let handle = self.reuse_prepare(operation, bound)?;
        statement::parameterize(self.driver.as_mut(), handle, bound)?;
        let count = self.driver.execute_update(handle)?;
        self.process_after(operation, handle, parameter)?;
        Ok(count as i64)
    }

    /// Returns a cached handle for the statement's SQL when the connection
    /// is still healthy, preparing (and caching) a fresh one otherwise.
    fn reuse_prepare(
        &mut self,
        operation: &MappedOperation,
        bound: &BoundStatement,
    ) -> crate::Result<StatementId> {
        let healthy = self.driver.is_healthy();

        if let Policy::Reuse { statements } = &mut self.policy {
            if healthy {
                if let Some(&handle) = statements.get(bound.sql()) {
                    return Ok(handle);
                }
            } else if !statements.is_empty() {
                warn!("connection unhealthy, dropping cached statement handles");
                let stale: Vec<StatementId> =
                    statements.drain().map(|(_, handle)| handle).collect();
                for handle in stale {
                    close_quietly(self.driver.as_mut(), handle);
                }
            }
        }

        let handle = statement::prepare(self.driver.as_mut(), operation, bound)?;

        if let Policy::Reuse { statements } = &mut self.policy {
            statements.insert(bound.sql().to_string(), handle);
        }

        Ok(handle)
    }

    fn process_before(
        &mut self,
        operation: &Arc<MappedOperation>,
        parameter: &mut Value,
    ) -> crate::Result<()> {
        if let KeyGenerator::SelectKey {
            statement,
            before: true,
        } = operation.key_generator()
        {
            let key_operation = Arc::clone(statement);
            self.run_key_query(&key_operation, parameter)?;
        }

        Ok(())
    }

    fn process_after(
        &mut self,
        operation: &Arc<MappedOperation>,
        handle: StatementId,
        parameter: &mut Value,
    ) -> crate::Result<()> {
        match operation.key_generator() {
            KeyGenerator::None | KeyGenerator::SelectKey { before: true, .. } => Ok(()),
            KeyGenerator::DriverGenerated => {
                let keys = self.driver.generated_keys(handle)?;
                keygen::assign_generated(
                    parameter,
                    keys,
                    operation.key_properties(),
                    operation.key_columns(),
                    self.config.types(),
                )
            }
            KeyGenerator::SelectKey { statement, .. } => {
                let key_operation = Arc::clone(statement);
                self.run_key_query(&key_operation, parameter)
            }
        }
    }

    /// Runs a key statement on a fresh handle, outside every policy and the
    /// result cache, and writes its single row into the parameter object.
    /// Nothing is written unless the query returned exactly one row.
    fn run_key_query(
        &mut self,
        operation: &Arc<MappedOperation>,
        parameter: &mut Value,
    ) -> crate::Result<()> {
        let bound = operation.sql_source().bound_statement(parameter)?;

        let handle = statement::prepare(self.driver.as_mut(), operation, &bound)?;
        let result = statement::parameterize(self.driver.as_mut(), handle, &bound)
            .and_then(|_| self.driver.execute_query(handle));
        close_quietly(self.driver.as_mut(), handle);

        let row = keygen::single_key_row(operation.id(), result?)?;
        keygen::write_selected_keys(
            parameter,
            &row,
            operation.key_properties(),
            operation.key_columns(),
            self.config.types(),
        )
    }

    fn cache_key(
        &self,
        operation: &MappedOperation,
        bound: &BoundStatement,
        bounds: &RowBounds,
    ) -> crate::Result<CacheKey> {
        let mut key = CacheKey::new();

        key.push(Value::from(operation.id()));
        key.push(Value::Int64(bounds.offset as i64));
        key.push(Value::Int64(bounds.limit as i64));
        key.push(Value::from(bound.sql()));

        for binding in bound.bindings() {
            if binding.mode() == ParameterMode::Out {
                continue;
            }
            key.push(statement::resolve_parameter(bound, binding)?);
        }

        key.push(Value::from(self.config.environment_id()));

        Ok(key)
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.close(true);
    }
}

pub(crate) fn close_quietly(driver: &mut dyn Driver, statement: StatementId) {
    if let Err(error) = driver.close(statement) {
        warn!(%statement, %error, "failed to close statement handle");
    }
}
