//! Coordinación transaccional multi-recurso.
//!
//! - `backend`: contrato opaco del backend SQL (consumido, no implementado).
//! - `context`: registro transaccional por recurso dentro de un run.
//! - `registry`: registro inmutable nombre → recurso, construido una vez.
//! - `executor`: decorador explícito que aplica la demarcación por
//!   operación; la demarcación es una llamada visible, no una intercepción.

pub mod backend;
pub mod context;
pub mod executor;
pub mod registry;

pub use backend::{BatchResult, QueryBackend, TxHandle};
pub use context::ResourceTransaction;
pub use executor::QueryExecutor;
pub use registry::{RegistryBuilder, ResourceConfig, ResourceDecl, ResourceRegistry};
