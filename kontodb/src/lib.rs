pub mod schema;
pub mod record;
pub mod engine;
pub mod backend;
pub mod entity;
pub mod manager;
pub mod store;
pub mod validation;
pub mod bank;
pub mod config;
pub mod error;
mod util;

pub use backend::{Backend, BackendKind};
pub use config::StoreConfig;
pub use entity::{banking_tables, Entity, Konto, Kunde, Tables};
pub use error::{KontoDbError, Result};
pub use manager::{Manager, Query};
pub use record::{PrimaryKey, Record};
pub use schema::{TableDeclaration, TableSchema};
pub use store::Store;
