//! The database driver boundary.
//!
//! The engine never talks to a wire protocol itself; it drives an existing
//! database client through the handle-based [`Driver`] trait. A prepared
//! statement is an explicit driver-side resource identified by a
//! [`StatementId`] and must be released with [`Driver::close`]. Every call
//! blocks the calling thread; the only cancellation mechanism is the
//! statement timeout carried in [`StatementHints`].

mod result_set;

pub use result_set::{ResultRow, ResultSet};

#[cfg(test)]
pub(crate) mod test_driver;

use std::fmt;
use std::time::Duration;

use crate::value::Value;

/// An opaque handle to a driver-side prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId(pub u64);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// Execution hints passed through to the driver at prepare time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementHints {
    pub fetch_size: Option<u32>,
    pub timeout: Option<Duration>,
}

/// A blocking connection to a database, scoped to one session.
///
/// Implementations own the prepared-statement table; handles stay valid
/// until closed. `execute_batch` runs everything accumulated on the handle
/// through `add_batch` since the last batch execution and returns per-row
/// update counts in submission order.
pub trait Driver: Send {
    fn prepare(&mut self, sql: &str, hints: &StatementHints) -> crate::Result<StatementId>;

    /// Binds a positional parameter value on the handle. Positions are
    /// zero-based in descriptor order.
    fn bind(&mut self, statement: StatementId, position: usize, value: Value)
        -> crate::Result<()>;

    fn execute_query(&mut self, statement: StatementId) -> crate::Result<ResultSet>;

    fn execute_update(&mut self, statement: StatementId) -> crate::Result<u64>;

    /// Registers the currently bound values as one more unit of the native
    /// batch on this handle.
    fn add_batch(&mut self, statement: StatementId) -> crate::Result<()>;

    fn execute_batch(&mut self, statement: StatementId) -> crate::Result<Vec<i64>>;

    /// Keys the database generated for the most recent mutation or batch on
    /// this handle.
    fn generated_keys(&mut self, statement: StatementId) -> crate::Result<ResultSet>;

    fn close(&mut self, statement: StatementId) -> crate::Result<()>;

    /// False when the connection is no longer in a working state. A cached
    /// handle is only reused while this holds.
    fn is_healthy(&self) -> bool;
}
