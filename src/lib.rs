//! A statement execution engine for mapped SQL operations.
//!
//! Operations are defined once in a [`Configuration`]: an id, a SQL source,
//! parameter descriptors, output shapes and an optional key generation
//! strategy. An [`Executor`] then runs them against a database driver under
//! one of three policies (direct, reuse, batch), caching query results per
//! session and writing generated keys back into the caller's parameter
//! objects.
//!
//! The crate never speaks a wire protocol itself; databases are reached
//! through the blocking [`connector::Driver`] trait.

pub mod config;
pub mod connector;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod materializer;
pub mod meta;
pub mod value;

pub use config::Configuration;
pub use error::{Error, ErrorKind};
pub use executor::{Executor, ExecutorKind, RowBounds};
pub use value::Value;

pub type Result<T> = std::result::Result<T, Error>;
