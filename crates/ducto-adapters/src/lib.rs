//! ducto-adapters: steps y handlers concretos sobre los contratos del core.
//!
//! Este crate provee:
//! - Steps SQL (`SelectStep`, `BatchWriteStep`, `CallStep`) que drenan la
//!   cola de trabajo de la interfaz y ejecutan a través del coordinador.
//! - Steps de demarcación (`BeginGroupStep`, `CommitStep`, `RollbackStep`)
//!   que abren y cierran transacciones agrupadas.
//! - `StreamQueryStep`: lectura cursor drenada por lotes hacia un
//!   sub-pipeline vía `ResultStreamBuffer`.
//! - Steps de control (`SetParamStep`, `StopStep`, `FailStep`) para cablear
//!   interfaces de prueba y demos.
//! - Handlers de error declarativos.
//! - `InMemoryQueryBackend`: backend scriptable en memoria usado por tests y
//!   demos (ningún step de este crate depende de él).

pub mod handlers;
pub mod memory;
pub mod steps;

pub use handlers::{ClassErrorHandler, ErrorAuditHandler, LogErrorHandler};
pub use memory::InMemoryQueryBackend;
pub use steps::control::{FailStep, SetParamStep, StopStep};
pub use steps::query::{BatchWriteStep, CallStep, SelectStep, WriteMode};
pub use steps::stream::StreamQueryStep;
pub use steps::transaction::{BeginGroupStep, CommitStep, RollbackStep};
