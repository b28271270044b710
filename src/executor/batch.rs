//! Deferred execution of mutations through the driver's native batch API.
//!
//! Under the batch policy, mutations accumulate instead of executing.
//! Consecutive mutations with identical SQL and the same operation join a
//! single accumulator entry (one driver handle, many parameter rows); any
//! other mutation starts a new entry and a new handle. The whole
//! accumulator runs in order on the next flush.

use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::connector::StatementId;
use crate::error::{BatchFailure, Error, ErrorKind};
use crate::executor::keygen::KeyGenerator;
use crate::executor::{close_quietly, statement, Executor, Policy};
use crate::mapping::{BoundStatement, MappedOperation};
use crate::value::Value;

/// The update count reported for every batched mutation at submission
/// time. Real counts only exist after the flush.
pub const BATCH_UPDATE_SENTINEL: i64 = (i32::MIN as i64) + 1002;

/// The outcome of one flushed accumulator entry: the per-statement update
/// counts in submission order, plus the parameter objects that were
/// submitted (with generated keys written back).
#[derive(Debug, Clone)]
pub struct BatchResult {
    statement_id: String,
    sql: String,
    parameter_objects: Vec<Value>,
    update_counts: Vec<i64>,
}

impl BatchResult {
    pub fn new(
        statement_id: impl Into<String>,
        sql: impl Into<String>,
        parameter: Value,
    ) -> BatchResult {
        BatchResult {
            statement_id: statement_id.into(),
            sql: sql.into(),
            parameter_objects: vec![parameter],
            update_counts: Vec::new(),
        }
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_objects(&self) -> &[Value] {
        &self.parameter_objects
    }

    pub fn update_counts(&self) -> &[i64] {
        &self.update_counts
    }
}

impl std::fmt::Display for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` x{} [{}]",
            self.statement_id,
            self.parameter_objects.len(),
            self.update_counts.iter().join(", "),
        )
    }
}

/// One accumulator entry: a prepared handle plus the result being built
/// for it.
#[derive(Debug)]
pub(crate) struct BatchEntry {
    pub(crate) statement: StatementId,
    pub(crate) operation: Arc<MappedOperation>,
    pub(crate) result: BatchResult,
}

#[derive(Debug, Default)]
pub(crate) struct BatchState {
    pub(crate) entries: Vec<BatchEntry>,
}

impl Executor {
    /// Accumulates one mutation, reusing the newest entry when the SQL and
    /// operation match it exactly. Returns [`BATCH_UPDATE_SENTINEL`].
    pub(crate) fn batch_update(
        &mut self,
        operation: &Arc<MappedOperation>,
        bound: &BoundStatement,
    ) -> crate::Result<i64> {
        let state = match &mut self.policy {
            Policy::Batch(state) => state,
            _ => {
                return Err(ErrorKind::configuration(
                    "batch accumulation outside the batch policy",
                )
                .into())
            }
        };

        let reused = match state.entries.last_mut() {
            Some(entry)
                if entry.result.sql == bound.sql()
                    && entry.result.statement_id == operation.id() =>
            {
                entry.result.parameter_objects.push(bound.parameter().clone());
                Some(entry.statement)
            }
            _ => None,
        };

        let handle = match reused {
            Some(handle) => handle,
            None => {
                let handle = statement::prepare(self.driver.as_mut(), operation, bound)?;
                state.entries.push(BatchEntry {
                    statement: handle,
                    operation: Arc::clone(operation),
                    result: BatchResult::new(operation.id(), bound.sql(), bound.parameter().clone()),
                });
                handle
            }
        };

        statement::parameterize(self.driver.as_mut(), handle, bound)?;
        self.driver.add_batch(handle)?;

        Ok(BATCH_UPDATE_SENTINEL)
    }

    /// Executes all accumulated entries in order. On a driver failure the
    /// error names the failing entry and carries the results of the entries
    /// that already completed; the rest are not attempted. Handles are
    /// closed on every path. A rollback flush discards the accumulator
    /// without touching the database.
    pub(crate) fn do_flush(&mut self, is_rollback: bool) -> crate::Result<Vec<BatchResult>> {
        let entries = match &mut self.policy {
            Policy::Batch(state) => std::mem::take(&mut state.entries),
            _ => return Ok(Vec::new()),
        };

        if is_rollback {
            for entry in &entries {
                close_quietly(self.driver.as_mut(), entry.statement);
            }
            return Ok(Vec::new());
        }

        debug!(entries = entries.len(), "flushing batch accumulator");

        let mut results: Vec<BatchResult> = Vec::with_capacity(entries.len());
        let mut iter = entries.into_iter();

        while let Some(mut entry) = iter.next() {
            let outcome = self.flush_entry(&mut entry);
            close_quietly(self.driver.as_mut(), entry.statement);

            match outcome {
                Ok(()) => results.push(entry.result),
                Err(error) => {
                    for rest in iter.by_ref() {
                        close_quietly(self.driver.as_mut(), rest.statement);
                    }

                    return Err(self.batch_failure(entry, results, error));
                }
            }
        }

        Ok(results)
    }

    fn flush_entry(&mut self, entry: &mut BatchEntry) -> crate::Result<()> {
        entry.result.update_counts = self.driver.execute_batch(entry.statement)?;

        match entry.operation.key_generator() {
            KeyGenerator::None => Ok(()),
            KeyGenerator::DriverGenerated => {
                let keys = self.driver.generated_keys(entry.statement)?;
                super::keygen::distribute_generated(
                    &mut entry.result.parameter_objects,
                    keys,
                    entry.operation.key_properties(),
                    entry.operation.key_columns(),
                    self.config.types(),
                )
            }
            KeyGenerator::SelectKey { statement, before } => {
                if *before {
                    return Ok(());
                }

                let key_operation = Arc::clone(statement);
                for parameter in &mut entry.result.parameter_objects {
                    self.run_key_query(&key_operation, parameter)?;
                }
                Ok(())
            }
        }
    }

    fn batch_failure(
        &self,
        entry: BatchEntry,
        successful: Vec<BatchResult>,
        error: Error,
    ) -> Error {
        let detail = BatchFailure {
            statement_id: entry.operation.id().to_string(),
            entry_index: successful.len() + 1,
            prior_succeeded: successful.len(),
            successful,
            message: error.to_string(),
            partial: entry.result,
        };

        let mut builder = Error::builder(ErrorKind::BatchFailure(Box::new(detail)));
        builder.set_statement_id(entry.operation.id());
        builder.build()
    }
}
