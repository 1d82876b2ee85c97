//! Contrato del backend de ejecución SQL.
//!
//! El core no ejecuta SQL: consume este trait. Un backend resuelve
//! `(operación, parámetros)` a filas o a conteos de filas afectadas, y
//! expone primitivas de transacción con handle opaco. Implementaciones
//! conocidas: backend en memoria (ducto-adapters, tests/demos) y Postgres
//! (ducto-persistence).

use serde_json::Value;

use crate::errors::CoreError;

/// Handle opaco de una transacción física abierta. El significado del token
/// es privado de cada backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle {
    pub token: u64,
}

/// Resultado de un flush de batch: conteos de filas afectadas por sentencia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub update_counts: Vec<i64>,
}

impl BatchResult {
    /// Suma de los conteos de este resultado.
    pub fn total(&self) -> i64 {
        self.update_counts.iter().sum()
    }
}

/// Backend de consultas bloqueante y seguro para uso concurrente desde
/// múltiples runs (cada run usa sus propios handles).
pub trait QueryBackend: Send + Sync {
    /// Ejecuta una operación de lectura y materializa todas las filas.
    fn select(&self, tx: Option<&TxHandle>, operation: &str, params: &Value) -> Result<Vec<Value>, CoreError>;

    /// Variante cursor: entrega cada fila al callback sin materializar el
    /// resultado completo. La implementación por defecto materializa.
    fn select_each(&self,
                   tx: Option<&TxHandle>,
                   operation: &str,
                   params: &Value,
                   row: &mut dyn FnMut(Value) -> Result<(), CoreError>)
                   -> Result<(), CoreError> {
        for r in self.select(tx, operation, params)? {
            row(r)?;
        }
        Ok(())
    }

    /// Somete un lote de sentencias bufferizadas. Devuelve los resultados de
    /// batch en el orden reportado por el backend; el coordinador suma los
    /// conteos del primero.
    fn flush_batch(&self, tx: Option<&TxHandle>, operation: &str, rows: &[Value]) -> Result<Vec<BatchResult>, CoreError>;

    /// Invoca una operación tipo procedimiento y devuelve sus filas.
    fn call(&self, tx: Option<&TxHandle>, operation: &str, params: &Value) -> Result<Vec<Value>, CoreError>;

    /// Abre una transacción física, aplicando el timeout si se indica.
    fn begin(&self, timeout_secs: Option<u64>) -> Result<TxHandle, CoreError>;

    fn commit(&self, tx: &TxHandle) -> Result<(), CoreError>;

    fn rollback(&self, tx: &TxHandle) -> Result<(), CoreError>;
}
