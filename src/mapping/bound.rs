//! Bound statements and parameter descriptors.
//!
//! A [`BoundStatement`] is the per-invocation product of the SQL templating
//! collaborator: literal SQL text, the ordered parameter descriptors, the
//! caller's parameter object, and a side-map for values the templating layer
//! itself produced (loop variables, bind expressions). It is created once
//! per call and discarded when the call returns.

use std::fmt;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::meta::{self, PropertyPath, TypeRegistry};
use crate::value::{Value, ValueKind};

/// The direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterMode {
    In,
    Out,
    InOut,
}

/// One ordered parameter descriptor of a bound statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    property: String,
    mode: ParameterMode,
    kind: ValueKind,
    db_type: Option<String>,
    numeric_scale: Option<u32>,
    shape_ref: Option<String>,
}

impl ParameterBinding {
    pub fn builder(property: impl Into<String>, kind: ValueKind) -> ParameterBindingBuilder {
        ParameterBindingBuilder {
            binding: ParameterBinding {
                property: property.into(),
                mode: ParameterMode::In,
                kind,
                db_type: None,
                numeric_scale: None,
                shape_ref: None,
            },
        }
    }

    /// A plain input parameter resolved from the given property path.
    pub fn input(property: impl Into<String>, kind: ValueKind) -> ParameterBinding {
        ParameterBinding {
            property: property.into(),
            mode: ParameterMode::In,
            kind,
            db_type: None,
            numeric_scale: None,
            shape_ref: None,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn mode(&self) -> ParameterMode {
        self.mode
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn db_type(&self) -> Option<&str> {
        self.db_type.as_deref()
    }

    pub fn numeric_scale(&self) -> Option<u32> {
        self.numeric_scale
    }

    /// For structured or cursor-shaped output parameters, the id of the
    /// result shape describing them.
    pub fn shape_ref(&self) -> Option<&str> {
        self.shape_ref.as_deref()
    }
}

#[derive(Debug)]
pub struct ParameterBindingBuilder {
    binding: ParameterBinding,
}

impl ParameterBindingBuilder {
    pub fn mode(mut self, mode: ParameterMode) -> Self {
        self.binding.mode = mode;
        self
    }

    pub fn db_type(mut self, db_type: impl Into<String>) -> Self {
        self.binding.db_type = Some(db_type.into());
        self
    }

    pub fn numeric_scale(mut self, scale: u32) -> Self {
        self.binding.numeric_scale = Some(scale);
        self
    }

    pub fn shape_ref(mut self, shape_ref: impl Into<String>) -> Self {
        self.binding.shape_ref = Some(shape_ref.into());
        self
    }

    /// Validates the descriptor. A non-input parameter with no declared
    /// value type needs a shape reference; without either there is no way
    /// to resolve what comes back from the driver.
    pub fn build(self) -> crate::Result<ParameterBinding> {
        let binding = self.binding;

        if binding.mode != ParameterMode::In
            && binding.kind == ValueKind::Any
            && binding.shape_ref.is_none()
        {
            let mut builder = crate::Error::builder(ErrorKind::binding(&binding.property));
            builder.set_property(&binding.property);
            return Err(builder.build());
        }

        Ok(binding)
    }
}

/// The product of SQL templating for a single invocation.
#[derive(Debug)]
pub struct BoundStatement {
    sql: String,
    bindings: Vec<ParameterBinding>,
    parameter: Value,
    additional: Value,
}

impl BoundStatement {
    pub fn new(
        sql: impl Into<String>,
        bindings: Vec<ParameterBinding>,
        parameter: Value,
    ) -> BoundStatement {
        BoundStatement {
            sql: sql.into(),
            bindings,
            parameter,
            additional: Value::map(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    /// The caller-supplied parameter object as handed to the templating
    /// collaborator.
    pub fn parameter(&self) -> &Value {
        &self.parameter
    }

    /// Whether the templating side-map holds a value whose first path
    /// segment is `name`'s bare name.
    pub fn has_additional(&self, name: &str) -> bool {
        let bare = PropertyPath::parse(name).name();
        match &self.additional {
            Value::Map(fields) => fields.contains_key(bare),
            _ => false,
        }
    }

    pub fn set_additional(
        &mut self,
        name: &str,
        value: Value,
        types: &TypeRegistry,
    ) -> crate::Result<()> {
        meta::write_path(&mut self.additional, name, value, types)
    }

    pub fn additional(&self, name: &str) -> crate::Result<Value> {
        meta::read_path(&self.additional, name)
    }
}

/// The boundary to the SQL templating collaborator: a parameter object in, a
/// bound statement out. Called exactly once per invocation.
pub trait SqlSource: fmt::Debug + Send + Sync {
    fn bound_statement(&self, parameter: &Value) -> crate::Result<BoundStatement>;
}

/// A source whose SQL text and parameter descriptors are fixed up front; no
/// dynamic content. The usual implementation for pre-templated statements.
#[derive(Debug)]
pub struct StaticSqlSource {
    sql: String,
    bindings: Vec<ParameterBinding>,
}

impl StaticSqlSource {
    pub fn new(sql: impl Into<String>, bindings: Vec<ParameterBinding>) -> StaticSqlSource {
        StaticSqlSource {
            sql: sql.into(),
            bindings,
        }
    }

    pub fn shared(
        sql: impl Into<String>,
        bindings: Vec<ParameterBinding>,
    ) -> Arc<dyn SqlSource> {
        Arc::new(StaticSqlSource::new(sql, bindings))
    }
}

impl SqlSource for StaticSqlSource {
    fn bound_statement(&self, parameter: &Value) -> crate::Result<BoundStatement> {
        Ok(BoundStatement::new(
            self.sql.clone(),
            self.bindings.clone(),
            parameter.clone(),
        ))
    }
}
