//! ducto-persistence
//!
//! Implementación Postgres (Diesel) del contrato `QueryBackend` del core.
//! El motor no ejecuta SQL propio: ejecuta operaciones con nombre resueltas
//! por un catálogo. Este crate aporta:
//!
//! Módulos:
//! - `catalog`: catálogo de operaciones SQL con placeholders `:nombre`
//!   renderizados a binds posicionales.
//! - `pg`: `PgQueryBackend` sobre un pool r2d2, con demarcación manual
//!   (BEGIN/COMMIT/ROLLBACK + SET LOCAL statement_timeout) y filas dinámicas
//!   vía `row_to_json`.
//! - `config`: carga de configuración desde .env.
//! - `error`: mapeo de errores Diesel/pool a variantes semánticas.

pub mod catalog;
pub mod config;
pub mod error;
pub mod pg;

pub use catalog::{OperationCatalog, SqlOperation};
pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgPool, PgQueryBackend, PoolProvider};
