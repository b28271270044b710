//! A scripted in-memory driver for executor tests.
//!
//! Results are canned per SQL string; every driver call is recorded so tests
//! can assert on the exact traffic an execution policy produced. The driver
//! is a cloneable handle over shared state, letting a test keep a view into
//! the driver after moving it into an executor.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connector::{Driver, ResultSet, StatementHints, StatementId};
use crate::error::{Error, ErrorKind};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Prepare(String),
    Bind(StatementId, usize, Value),
    ExecuteQuery(StatementId),
    ExecuteUpdate(StatementId),
    AddBatch(StatementId),
    ExecuteBatch(StatementId),
    GeneratedKeys(StatementId),
    Close(StatementId),
}

#[derive(Debug)]
struct OpenStatement {
    sql: String,
    pending_batch: usize,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    healthy: bool,
    open: HashMap<StatementId, OpenStatement>,
    query_results: HashMap<String, ResultSet>,
    update_counts: HashMap<String, u64>,
    generated: HashMap<String, ResultSet>,
    fail_query: HashSet<String>,
    fail_update: HashSet<String>,
    fail_batch: HashSet<String>,
    events: Vec<Event>,
}

#[derive(Debug, Clone)]
pub(crate) struct TestDriver {
    state: Arc<Mutex<State>>,
}

impl TestDriver {
    pub(crate) fn new() -> TestDriver {
        TestDriver {
            state: Arc::new(Mutex::new(State {
                healthy: true,
                ..State::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn script_query(&self, sql: &str, result: ResultSet) {
        self.state().query_results.insert(sql.to_string(), result);
    }

    pub(crate) fn script_update(&self, sql: &str, count: u64) {
        self.state().update_counts.insert(sql.to_string(), count);
    }

    pub(crate) fn script_generated_keys(&self, sql: &str, keys: ResultSet) {
        self.state().generated.insert(sql.to_string(), keys);
    }

    pub(crate) fn fail_query(&self, sql: &str) {
        self.state().fail_query.insert(sql.to_string());
    }

    pub(crate) fn fail_batch(&self, sql: &str) {
        self.state().fail_batch.insert(sql.to_string());
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.state().healthy = healthy;
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    /// How many times the given SQL text was prepared.
    pub(crate) fn prepare_count(&self, sql: &str) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Prepare(s) if s == sql))
            .count()
    }

    pub(crate) fn query_count(&self) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| matches!(e, Event::ExecuteQuery(_)))
            .count()
    }

    /// Handles prepared but never closed.
    pub(crate) fn open_count(&self) -> usize {
        self.state().open.len()
    }

    fn sql_of(state: &State, statement: StatementId) -> crate::Result<String> {
        state
            .open
            .get(&statement)
            .map(|s| s.sql.clone())
            .ok_or_else(|| {
                Error::from(ErrorKind::driver(format!(
                    "unknown statement handle {statement}"
                )))
            })
    }
}

impl Driver for TestDriver {
    fn prepare(&mut self, sql: &str, _hints: &StatementHints) -> crate::Result<StatementId> {
        let mut state = self.state();
        state.next_id += 1;
        let id = StatementId(state.next_id);

        state.events.push(Event::Prepare(sql.to_string()));
        state.open.insert(
            id,
            OpenStatement {
                sql: sql.to_string(),
                pending_batch: 0,
            },
        );

        Ok(id)
    }

    fn bind(
        &mut self,
        statement: StatementId,
        position: usize,
        value: Value,
    ) -> crate::Result<()> {
        let mut state = self.state();
        Self::sql_of(&state, statement)?;
        state.events.push(Event::Bind(statement, position, value));
        Ok(())
    }

    fn execute_query(&mut self, statement: StatementId) -> crate::Result<ResultSet> {
        let mut state = self.state();
        let sql = Self::sql_of(&state, statement)?;
        state.events.push(Event::ExecuteQuery(statement));

        if state.fail_query.contains(&sql) {
            return Err(Error::from(ErrorKind::driver(format!(
                "scripted query failure for {sql:?}"
            ))));
        }

        Ok(state
            .query_results
            .get(&sql)
            .cloned()
            .unwrap_or_else(ResultSet::empty))
    }

    fn execute_update(&mut self, statement: StatementId) -> crate::Result<u64> {
        let mut state = self.state();
        let sql = Self::sql_of(&state, statement)?;
        state.events.push(Event::ExecuteUpdate(statement));

        if state.fail_update.contains(&sql) {
            return Err(Error::from(ErrorKind::driver(format!(
                "scripted update failure for {sql:?}"
            ))));
        }

        Ok(state.update_counts.get(&sql).copied().unwrap_or(1))
    }

    fn add_batch(&mut self, statement: StatementId) -> crate::Result<()> {
        let mut state = self.state();
        Self::sql_of(&state, statement)?;
        state.events.push(Event::AddBatch(statement));

        if let Some(open) = state.open.get_mut(&statement) {
            open.pending_batch += 1;
        }

        Ok(())
    }

    fn execute_batch(&mut self, statement: StatementId) -> crate::Result<Vec<i64>> {
        let mut state = self.state();
        let sql = Self::sql_of(&state, statement)?;
        state.events.push(Event::ExecuteBatch(statement));

        if state.fail_batch.contains(&sql) {
            return Err(Error::from(ErrorKind::driver(format!(
                "scripted batch failure for {sql:?}"
            ))));
        }

        let pending = state
            .open
            .get_mut(&statement)
            .map(|open| std::mem::take(&mut open.pending_batch))
            .unwrap_or(0);

        Ok(vec![1; pending])
    }

    fn generated_keys(&mut self, statement: StatementId) -> crate::Result<ResultSet> {
        let mut state = self.state();
        let sql = Self::sql_of(&state, statement)?;
        state.events.push(Event::GeneratedKeys(statement));

        Ok(state
            .generated
            .get(&sql)
            .cloned()
            .unwrap_or_else(ResultSet::empty))
    }

    fn close(&mut self, statement: StatementId) -> crate::Result<()> {
        let mut state = self.state();
        state.events.push(Event::Close(statement));
        state.open.remove(&statement);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.state().healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_lifecycle_is_tracked() {
        let mut driver = TestDriver::new();
        let view = driver.clone();
        let hints = StatementHints::default();

        let stmt = driver.prepare("SELECT 1", &hints).unwrap();
        assert_eq!(view.open_count(), 1);

        driver.close(stmt).unwrap();
        assert_eq!(view.open_count(), 0);
        assert!(driver.execute_query(stmt).is_err());
    }

    #[test]
    fn batch_counts_follow_pending_adds() {
        let mut driver = TestDriver::new();
        let stmt = driver
            .prepare("INSERT INTO t VALUES (?)", &StatementHints::default())
            .unwrap();

        driver.add_batch(stmt).unwrap();
        driver.add_batch(stmt).unwrap();

        assert_eq!(driver.execute_batch(stmt).unwrap(), vec![1, 1]);
        assert_eq!(driver.execute_batch(stmt).unwrap(), Vec::<i64>::new());
    }
}
