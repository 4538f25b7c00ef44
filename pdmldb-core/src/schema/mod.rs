//! Dissector schema: protocols, fields, value strings and the catalog
//! loader that populates them.

mod ftype;
mod loader;
mod model;

pub use ftype::{DisplayBase, FieldType};
pub use loader::{load_decodes, load_fields, load_protocols, load_values, LoadStats};
pub use model::{Field, Protocol, SchemaModel, ValueString};
