//! Operation definitions.
//!
//! A [`MappedOperation`] is the immutable, configuration-time description of
//! one named unit of work: its kind, the SQL source that produces bound
//! statements for it, key generation, execution hints and output shapes.
//! Definitions are built once and shared read-only across sessions.

mod bound;

pub use bound::{
    BoundStatement, ParameterBinding, ParameterBindingBuilder, ParameterMode, SqlSource,
    StaticSqlSource,
};

use std::sync::Arc;
use std::time::Duration;

use crate::executor::keygen::KeyGenerator;

/// The kind of a mapped operation. `Flush` is an explicit flush trigger:
/// running it executes any pending batch entries instead of its own SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Flush,
}

impl StatementKind {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }
}

/// What one materialized row should look like.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeTarget {
    /// A map keyed by column name (or by mapped property paths).
    Map,
    /// An instance of the named registered type.
    Record(String),
    /// The bare value of the row's first column.
    Scalar,
}

/// One column-to-property mapping inside a result shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    column: String,
    property: String,
}

impl ColumnMapping {
    pub fn new(column: impl Into<String>, property: impl Into<String>) -> Self {
        ColumnMapping {
            column: column.into(),
            property: property.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn property(&self) -> &str {
        &self.property
    }
}

/// An output shape descriptor. With no explicit column mappings, columns map
/// onto properties of the same name (case-insensitively for records).
#[derive(Debug, Clone, PartialEq)]
pub struct ResultShape {
    id: String,
    target: ShapeTarget,
    columns: Vec<ColumnMapping>,
}

impl ResultShape {
    pub fn new(id: impl Into<String>, target: ShapeTarget) -> Self {
        ResultShape {
            id: id.into(),
            target,
            columns: Vec::new(),
        }
    }

    pub fn mapped(
        id: impl Into<String>,
        target: ShapeTarget,
        columns: Vec<ColumnMapping>,
    ) -> Self {
        ResultShape {
            id: id.into(),
            target,
            columns,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> &ShapeTarget {
        &self.target
    }

    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }
}

/// An immutable operation definition, identified by a globally unique name.
#[derive(Debug)]
pub struct MappedOperation {
    id: String,
    kind: StatementKind,
    sql_source: Arc<dyn SqlSource>,
    key_generator: KeyGenerator,
    fetch_size: Option<u32>,
    timeout: Option<Duration>,
    use_cache: bool,
    result_shapes: Vec<ResultShape>,
    key_properties: Vec<String>,
    key_columns: Vec<String>,
}

impl MappedOperation {
    pub fn builder(
        id: impl Into<String>,
        kind: StatementKind,
        sql_source: Arc<dyn SqlSource>,
    ) -> MappedOperationBuilder {
        MappedOperationBuilder {
            operation: MappedOperation {
                id: id.into(),
                kind,
                sql_source,
                key_generator: KeyGenerator::None,
                fetch_size: None,
                timeout: None,
                use_cache: true,
                result_shapes: Vec::new(),
                key_properties: Vec::new(),
                key_columns: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn sql_source(&self) -> &Arc<dyn SqlSource> {
        &self.sql_source
    }

    pub fn key_generator(&self) -> &KeyGenerator {
        &self.key_generator
    }

    pub fn fetch_size(&self) -> Option<u32> {
        self.fetch_size
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn result_shapes(&self) -> &[ResultShape] {
        &self.result_shapes
    }

    pub fn key_properties(&self) -> &[String] {
        &self.key_properties
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }
}

#[derive(Debug)]
pub struct MappedOperationBuilder {
    operation: MappedOperation,
}

impl MappedOperationBuilder {
    pub fn key_generator(mut self, key_generator: KeyGenerator) -> Self {
        self.operation.key_generator = key_generator;
        self
    }

    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.operation.fetch_size = Some(fetch_size);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.operation.timeout = Some(timeout);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.operation.use_cache = use_cache;
        self
    }

    pub fn result_shape(mut self, shape: ResultShape) -> Self {
        self.operation.result_shapes.push(shape);
        self
    }

    pub fn key_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operation.key_properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn key_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operation.key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Arc<MappedOperation> {
        Arc::new(self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_classification() {
        assert!(StatementKind::Insert.is_mutation());
        assert!(StatementKind::Update.is_mutation());
        assert!(StatementKind::Delete.is_mutation());
        assert!(!StatementKind::Select.is_mutation());
        assert!(!StatementKind::Flush.is_mutation());
    }

    #[test]
    fn builder_defaults() {
        let op = MappedOperation::builder(
            "findUser",
            StatementKind::Select,
            Arc::new(StaticSqlSource::new("SELECT 1", vec![])),
        )
        .build();

        assert!(op.use_cache());
        assert!(matches!(op.key_generator(), KeyGenerator::None));
        assert!(op.result_shapes().is_empty());
        assert_eq!(op.fetch_size(), None);
    }
}
