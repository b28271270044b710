//! Statement preparation and parameter binding.

use tracing::debug;

use crate::connector::{Driver, StatementHints, StatementId};
use crate::error::{Error, ErrorKind};
use crate::mapping::{BoundStatement, MappedOperation, ParameterBinding, ParameterMode};
use crate::meta;
use crate::value::Value;

/// Prepares a driver-side handle for the statement, carrying the
/// operation's execution hints.
pub(crate) fn prepare(
    driver: &mut dyn Driver,
    operation: &MappedOperation,
    bound: &BoundStatement,
) -> crate::Result<StatementId> {
    let hints = StatementHints {
        fetch_size: operation.fetch_size(),
        timeout: operation.timeout(),
    };

    debug!(statement_id = operation.id(), sql = bound.sql(), "preparing statement");

    driver.prepare(bound.sql(), &hints)
}

/// Binds every input-mode parameter descriptor positionally onto the
/// handle. Out-mode descriptors occupy no position and are skipped.
pub(crate) fn parameterize(
    driver: &mut dyn Driver,
    statement: StatementId,
    bound: &BoundStatement,
) -> crate::Result<()> {
    let mut position = 0;

    for binding in bound.bindings() {
        if binding.mode() == ParameterMode::Out {
            continue;
        }

        let value = resolve_parameter(bound, binding)?;
        driver.bind(statement, position, value)?;
        position += 1;
    }

    Ok(())
}

/// Resolves the value a parameter descriptor binds. Side-map entries set
/// during templating win over the parameter object; a missing parameter
/// object binds null; a scalar parameter object binds itself; anything else
/// is a property path lookup through the object view.
pub(crate) fn resolve_parameter(
    bound: &BoundStatement,
    binding: &ParameterBinding,
) -> crate::Result<Value> {
    let property = binding.property();
    let parameter = bound.parameter();

    if bound.has_additional(property) {
        return bound.additional(property);
    }

    if parameter.is_null() {
        return Ok(Value::Null);
    }

    if parameter.is_scalar() {
        return Ok(parameter.clone());
    }

    meta::read_path(parameter, property).map_err(|source| {
        let mut builder = Error::builder(ErrorKind::binding(property));
        builder.set_property(property).set_sql(bound.sql());
        debug!(property, %source, "parameter resolution failed");
        builder.build()
    })
}
