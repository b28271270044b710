//! Property path resolution and the dynamic object view.

mod property;
mod schema;
mod view;

pub use property::PropertyPath;
pub use schema::{PropertySchema, TypeRegistry, TypeSchema, TypeSchemaBuilder};
pub use view::{has_reader, has_writer, read_path, write_path, ObjectView};
