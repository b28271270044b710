//! Turning result rows into values.
//!
//! Materialization happens after execution and caching: the executor hands
//! the raw result set over together with the operation's output shapes and
//! the requested row window, and gets back one value per surviving row.

use std::collections::BTreeMap;

use crate::connector::{ResultRow, ResultSet};
use crate::error::ErrorKind;
use crate::executor::RowBounds;
use crate::mapping::{ResultShape, ShapeTarget};
use crate::meta::{self, TypeRegistry};
use crate::value::Value;

pub trait RowMaterializer: Send + Sync {
    fn materialize(
        &self,
        result: ResultSet,
        shapes: &[ResultShape],
        bounds: &RowBounds,
        types: &TypeRegistry,
    ) -> crate::Result<Vec<Value>>;
}

/// The built-in materializer. Rows outside the bounds window are dropped;
/// the first configured shape applies to every remaining row, and without
/// one each row becomes a map keyed by column name.
#[derive(Debug, Default)]
pub struct DefaultMaterializer;

impl RowMaterializer for DefaultMaterializer {
    fn materialize(
        &self,
        result: ResultSet,
        shapes: &[ResultShape],
        bounds: &RowBounds,
        types: &TypeRegistry,
    ) -> crate::Result<Vec<Value>> {
        let shape = shapes.first();
        let mut values = Vec::new();

        for row in result.into_iter().skip(bounds.offset).take(bounds.limit) {
            values.push(materialize_row(row, shape, types)?);
        }

        Ok(values)
    }
}

fn materialize_row(
    row: ResultRow,
    shape: Option<&ResultShape>,
    types: &TypeRegistry,
) -> crate::Result<Value> {
    let Some(shape) = shape else {
        return Ok(whole_row_map(row));
    };

    match shape.target() {
        ShapeTarget::Scalar => Ok(row.at(0).cloned().unwrap_or(Value::Null)),
        ShapeTarget::Map => {
            if shape.columns().is_empty() {
                return Ok(whole_row_map(row));
            }

            let mut target = Value::map();
            for mapping in shape.columns() {
                let value = row.get(mapping.column()).cloned().unwrap_or(Value::Null);
                meta::write_path(&mut target, mapping.property(), value, types)?;
            }
            Ok(target)
        }
        ShapeTarget::Record(type_name) => {
            let schema = types.get(type_name).ok_or_else(|| {
                crate::Error::from(ErrorKind::configuration(format!(
                    "result shape `{}` references unregistered type `{type_name}`",
                    shape.id()
                )))
            })?;

            let mut target = schema.instantiate()?;

            if shape.columns().is_empty() {
                // Columns map onto properties of the same name, matched
                // case-insensitively; unmatched columns are skipped.
                let columns = row.columns().clone();
                for (column, value) in columns.iter().zip(row.into_iter()) {
                    if let Some(property) = schema.find_property(column, true) {
                        let property = property.to_string();
                        meta::write_path(&mut target, &property, value, types)?;
                    }
                }
            } else {
                for mapping in shape.columns() {
                    let value = row.get(mapping.column()).cloned().unwrap_or(Value::Null);
                    meta::write_path(&mut target, mapping.property(), value, types)?;
                }
            }

            Ok(target)
        }
    }
}

fn whole_row_map(row: ResultRow) -> Value {
    let columns = row.columns().clone();
    let fields: BTreeMap<String, Value> = columns.iter().cloned().zip(row.into_iter()).collect();
    Value::Map(fields)
}
