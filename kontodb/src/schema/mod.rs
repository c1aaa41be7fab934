pub mod registry;
pub mod types;

pub use registry::{SchemaRegistry, METADATA_FILE};
pub use types::{FieldDefinition, FieldType, TableDeclaration, TableSchema};
