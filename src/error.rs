//! Error handling for the execution engine.
//!
//! Every fallible operation returns [`Error`], a structured wrapper around an
//! [`ErrorKind`] with optional context fields describing which statement,
//! SQL text or property path was involved. Context is carried explicitly on
//! the error value rather than in ambient state.

use std::fmt;

use crate::executor::BatchResult;

/// The error type used across the crate. Build one through
/// [`Error::builder`].
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    statement_id: Option<String>,
    sql: Option<String>,
    property: Option<String>,
}

impl Error {
    pub fn builder(kind: ErrorKind) -> ErrorBuilder {
        ErrorBuilder {
            kind,
            statement_id: None,
            sql: None,
            property: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The id of the mapped operation that was executing, if known.
    pub fn statement_id(&self) -> Option<&str> {
        self.statement_id.as_deref()
    }

    /// The literal SQL text that was executing, if known.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// The property path that was being resolved, if known.
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)?;

        if let Some(id) = &self.statement_id {
            write!(f, " (statement: `{id}`)")?;
        }

        if let Some(property) = &self.property {
            write!(f, " (property: `{property}`)")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::builder(kind).build()
    }
}

#[derive(Debug)]
pub struct ErrorBuilder {
    kind: ErrorKind,
    statement_id: Option<String>,
    sql: Option<String>,
    property: Option<String>,
}

impl ErrorBuilder {
    pub fn set_statement_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.statement_id = Some(id.into());
        self
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn set_property(&mut self, property: impl Into<String>) -> &mut Self {
        self.property = Some(property.into());
        self
    }

    pub fn build(self) -> Error {
        Error {
            kind: self.kind,
            statement_id: self.statement_id,
            sql: self.sql,
            property: self.property,
        }
    }
}

/// Detail for a failed batch flush. Some statements of the failing entry may
/// already have reached the database; the prior entries listed in
/// `successful` completed fully before the failure.
#[derive(Debug)]
pub struct BatchFailure {
    /// The mapped operation the failing entry belongs to.
    pub statement_id: String,
    /// One-based index of the failing accumulator entry.
    pub entry_index: usize,
    /// Number of entries that executed successfully before the failure.
    pub prior_succeeded: usize,
    /// Results of the entries that completed before the failure.
    pub successful: Vec<BatchResult>,
    /// The partially executed failing entry.
    pub partial: BatchResult,
    /// Message from the underlying driver error.
    pub message: String,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch entry #{} for `{}` failed: {}. {} prior entr{} completed successfully; remaining entries were not attempted",
            self.entry_index,
            self.statement_id,
            self.message,
            self.prior_succeeded,
            if self.prior_succeeded == 1 { "y" } else { "ies" },
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    #[error("operation `{id}` is not registered")]
    OperationNotFound { id: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("ambiguous property `{property}` on type `{type_name}`")]
    AmbiguousProperty { type_name: String, property: String },

    #[error("type `{type_name}` has no construction capability")]
    NotConstructible { type_name: String },

    #[error("no such property `{property}` on {target}")]
    NoSuchProperty { target: String, property: String },

    #[error("value at `{property}` is not indexable")]
    NotIndexable { property: String },

    #[error("value at `{property}` is not sequence-like and cannot be appended to")]
    NotAppendable { property: String },

    #[error("invalid index `{index}`: {message}")]
    InvalidIndex { index: String, message: String },

    #[error("could not resolve a value for parameter `{property}`")]
    Binding { property: String },

    #[error("key generation failed: {message}")]
    KeyGeneration { message: String },

    #[error("{0}")]
    BatchFailure(Box<BatchFailure>),

    #[error("driver error: {message}")]
    Driver { message: String },

    #[error("result set contained no rows")]
    NotFound,

    #[error("the executor is closed")]
    ExecutorClosed,
}

impl ErrorKind {
    pub fn configuration(message: impl Into<String>) -> Self {
        ErrorKind::Configuration {
            message: message.into(),
        }
    }

    pub fn driver(message: impl Into<String>) -> Self {
        ErrorKind::Driver {
            message: message.into(),
        }
    }

    pub fn key_generation(message: impl Into<String>) -> Self {
        ErrorKind::KeyGeneration {
            message: message.into(),
        }
    }

    pub fn binding(property: impl Into<String>) -> Self {
        ErrorKind::Binding {
            property: property.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_fields() {
        let mut builder = Error::builder(ErrorKind::NotFound);
        builder.set_statement_id("findUser").set_property("user.id");
        let error = builder.build();

        let rendered = error.to_string();
        assert!(rendered.contains("no rows"));
        assert!(rendered.contains("`findUser`"));
        assert!(rendered.contains("`user.id`"));
    }

    #[test]
    fn batch_failure_names_prior_successes() {
        let failure = BatchFailure {
            statement_id: "insertUser".into(),
            entry_index: 2,
            prior_succeeded: 1,
            successful: vec![],
            partial: BatchResult::new("insertUser", "INSERT", crate::Value::Null),
            message: "duplicate key".into(),
        };

        let rendered = failure.to_string();
        assert!(rendered.contains("entry #2"));
        assert!(rendered.contains("1 prior entry completed successfully"));
        assert!(rendered.contains("not attempted"));
    }
}
