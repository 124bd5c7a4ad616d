pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod lookup;
pub mod middleware;
pub mod observability;
pub mod reconcile;
pub mod server;
pub mod table;

pub use config::{AppConfig, PostgresStorageConfig, ServerConfig, StorageBackend, StorageConfig};
pub use entity::{EntityDefinition, EntityRegistry, FieldDefinition, PLACEHOLDER_VALUE};
pub use error::ApiError;
pub use lookup::lookup;
pub use observability::init_tracing;
pub use reconcile::{ReconcileError, reconcile};
pub use server::{AppState, ServerBuilder, ZipsyncServer, build_app, create_store};
pub use table::{Row, Table, TableError};
