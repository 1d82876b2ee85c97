//! `WorkItem`: referencia a una operación de backend encolada.
//!
//! Los items se declaran en las colas de la interfaz (camino normal y camino
//! de error) y se consumen en orden estricto durante la ejecución. Cada
//! posición se consume a lo sumo una vez por run y la cola nunca se
//! realimenta: agotar la cola es un error de configuración, no un default
//! silencioso.

use serde::{Deserialize, Serialize};

/// Cola de la que se extrae un item: camino normal o camino de error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuePath {
    Normal,
    Error,
}

/// Unidad de trabajo encolada: recurso destino, identificador de operación y
/// timeout opcional en segundos. Valor inmutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub resource: String,
    pub operation: String,
    pub timeout_secs: Option<u64>,
}

impl WorkItem {
    pub fn new(resource: impl Into<String>, operation: impl Into<String>) -> Self {
        Self { resource: resource.into(),
               operation: operation.into(),
               timeout_secs: None }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}
