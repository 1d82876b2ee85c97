//! Motor de ejecución de interfaces.
//!
//! Orquesta un run completo: contexto, lista de steps, handlers de error de
//! interfaz, barrido transaccional de cierre y emisión de trazas.

pub mod core;

pub use core::{InterfaceEngine, RunReport};
