//! Registro transaccional por recurso dentro de un run.

use crate::constants::HISTORY_ARROW;
use crate::errors::CoreError;
use crate::txn::backend::TxHandle;

/// Estado transaccional mutable de un recurso dentro de un `RunContext`.
///
/// Invariantes:
/// - `handle` es `Some` sólo mientras hay una transacción física abierta.
/// - Tras commit o rollback la entrada se elimina del mapa del run; una
///   entrada con `handle: None` sólo es válida como placeholder de modo
///   agrupado (el modo agrupado siempre deja placeholder, incluso antes del
///   primer uso).
#[derive(Debug, Clone)]
pub struct ResourceTransaction {
    pub resource: String,
    pub grouped: bool,
    pub handle: Option<TxHandle>,
    pub history: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub last_error: Option<CoreError>,
}

impl ResourceTransaction {
    /// Entrada no agrupada (creada perezosamente al primer uso del recurso).
    pub fn new(resource: impl Into<String>) -> Self {
        Self { resource: resource.into(),
               grouped: false,
               handle: None,
               history: Vec::new(),
               timeout_secs: None,
               last_error: None }
    }

    /// Placeholder de modo agrupado.
    pub fn grouped(resource: impl Into<String>) -> Self {
        let mut t = Self::new(resource);
        t.grouped = true;
        t
    }

    /// Anexa una operación al historial (append-only).
    pub fn push_history(&mut self, operation: impl Into<String>) {
        self.history.push(operation.into());
    }

    /// Historial renderizado para diagnóstico, p. ej. `SELECT→INSERT`.
    pub fn history_trace(&self) -> String {
        self.history.join(HISTORY_ARROW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_renders_arrow_joined() {
        let mut t = ResourceTransaction::new("crm");
        t.push_history("SELECT");
        t.push_history("INSERT");
        assert_eq!(t.history_trace(), "SELECT→INSERT");
    }

    #[test]
    fn grouped_placeholder_has_no_handle() {
        let t = ResourceTransaction::grouped("crm");
        assert!(t.grouped);
        assert!(t.handle.is_none());
        assert!(t.history.is_empty());
    }
}
