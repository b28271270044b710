//! Generated-key handling for mutations.
//!
//! After an insert (or before it, for pre-selected keys) the generated key
//! values are written back into the caller's parameter object through its
//! object view, so the caller observes the database-assigned identifiers
//! without a follow-up query.

use std::sync::Arc;

use crate::connector::{ResultRow, ResultSet};
use crate::error::ErrorKind;
use crate::mapping::MappedOperation;
use crate::meta::{self, TypeRegistry};
use crate::value::Value;

/// The key generation strategy of a mapped operation.
///
/// `DriverGenerated` reads the driver's generated-keys result after the
/// statement (or batch) runs. `SelectKey` runs a companion select either
/// before or after the main statement and writes its single row back.
#[derive(Debug, Clone, Default)]
pub enum KeyGenerator {
    #[default]
    None,
    DriverGenerated,
    SelectKey {
        statement: Arc<MappedOperation>,
        before: bool,
    },
}

impl KeyGenerator {
    pub fn runs_before(&self) -> bool {
        matches!(self, KeyGenerator::SelectKey { before: true, .. })
    }

    pub fn runs_after(&self) -> bool {
        match self {
            KeyGenerator::None => false,
            KeyGenerator::DriverGenerated => true,
            KeyGenerator::SelectKey { before, .. } => !before,
        }
    }
}

/// Validates that a key query produced exactly one row.
pub(crate) fn single_key_row(statement_id: &str, result: ResultSet) -> crate::Result<ResultRow> {
    if result.len() != 1 {
        return Err(ErrorKind::key_generation(format!(
            "key statement `{statement_id}` returned {} rows, expected exactly 1",
            result.len()
        ))
        .into());
    }

    // Length was checked above.
    result.into_single()
}

/// Writes the values of one key row into the parameter object.
///
/// With a single key property the value is taken from the column of the
/// same name when present, and from the row's first column otherwise. With
/// several properties, explicit key columns pair up with properties by
/// position; without them, row positions do.
pub(crate) fn write_selected_keys(
    parameter: &mut Value,
    row: &ResultRow,
    properties: &[String],
    columns: &[String],
    types: &TypeRegistry,
) -> crate::Result<()> {
    if properties.is_empty() {
        return Ok(());
    }

    if !columns.is_empty() && columns.len() != properties.len() {
        return Err(ErrorKind::key_generation(format!(
            "{} key properties configured but {} key columns",
            properties.len(),
            columns.len()
        ))
        .into());
    }

    if properties.len() == 1 {
        let property = &properties[0];
        let value = match columns.first() {
            Some(column) => key_column_value(row, column)?,
            None => match row.get(property) {
                Some(value) => value.clone(),
                None => row.at(0).cloned().ok_or_else(|| {
                    crate::Error::from(ErrorKind::key_generation(
                        "key row contained no columns".to_string(),
                    ))
                })?,
            },
        };

        return meta::write_path(parameter, property, value, types);
    }

    for (position, property) in properties.iter().enumerate() {
        let value = match columns.get(position) {
            Some(column) => key_column_value(row, column)?,
            None => row.at(position).cloned().ok_or_else(|| {
                crate::Error::from(ErrorKind::key_generation(format!(
                    "key row has no column at position {position} for property `{property}`"
                )))
            })?,
        };

        meta::write_path(parameter, property, value, types)?;
    }

    Ok(())
}

fn key_column_value(row: &ResultRow, column: &str) -> crate::Result<Value> {
    row.get(column).cloned().ok_or_else(|| {
        crate::Error::from(ErrorKind::key_generation(format!(
            "key row has no column `{column}`"
        )))
    })
}

/// Writes the first generated-key row back into a single parameter object.
/// An empty result means the driver had no keys to report, which is not an
/// error.
pub(crate) fn assign_generated(
    parameter: &mut Value,
    keys: ResultSet,
    properties: &[String],
    columns: &[String],
    types: &TypeRegistry,
) -> crate::Result<()> {
    match keys.first() {
        Some(row) => write_selected_keys(parameter, &row, properties, columns, types),
        None => Ok(()),
    }
}

/// Distributes generated-key rows over the parameter objects of a batch
/// entry, in submission order. Rows beyond the parameter list (or the other
/// way round) are ignored, matching driver behavior when some statements
/// generated no keys.
pub(crate) fn distribute_generated(
    parameters: &mut [Value],
    keys: ResultSet,
    properties: &[String],
    columns: &[String],
    types: &TypeRegistry,
) -> crate::Result<()> {
    for (parameter, row) in parameters.iter_mut().zip(keys.into_iter()) {
        write_selected_keys(parameter, &row, properties, columns, types)?;
    }

    Ok(())
}
