//! Definición de interfaces y su registro.

mod types;

pub use types::{InterfaceDefinition, InterfaceRegistry};
