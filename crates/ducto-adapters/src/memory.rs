//! Backend de consultas en memoria, scriptable.
//!
//! Pensado para tests y demos: datasets fijos por operación, conteo de
//! afectadas determinista por fila, fallos inyectables por operación o en
//! commit, y un journal de llamadas para aserciones. Implementa el mismo
//! contrato `QueryBackend` que el backend Postgres.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde_json::Value;

use ducto_core::errors::CoreError;
use ducto_core::txn::{BatchResult, QueryBackend, TxHandle};

#[derive(Default)]
struct BackendState {
    datasets: HashMap<String, Vec<Value>>,
    affected_per_row: i64,
    fail_ops: HashSet<String>,
    fail_commit: bool,
    journal: Vec<String>,
    open: HashSet<u64>,
    next_token: u64,
    begun: u64,
    committed: u64,
    rolled_back: u64,
}

pub struct InMemoryQueryBackend {
    label: String,
    state: Mutex<BackendState>,
}

impl InMemoryQueryBackend {
    pub fn new(label: impl Into<String>) -> Self {
        let mut state = BackendState::default();
        state.affected_per_row = 1;
        state.next_token = 1;
        Self { label: label.into(),
               state: Mutex::new(state) }
    }

    /// Filas que devolverán `select`/`call` para la operación dada.
    pub fn with_dataset(self, operation: impl Into<String>, rows: Vec<Value>) -> Self {
        self.state.lock().unwrap().datasets.insert(operation.into(), rows);
        self
    }

    /// Conteo de filas afectadas por cada fila batcheada (determinista).
    pub fn with_affected_per_row(self, n: i64) -> Self {
        self.state.lock().unwrap().affected_per_row = n;
        self
    }

    /// La operación dada fallará con un error de backend.
    pub fn failing_operation(self, operation: impl Into<String>) -> Self {
        self.state.lock().unwrap().fail_ops.insert(operation.into());
        self
    }

    /// El próximo commit (y todos los siguientes) fallará.
    pub fn failing_commit(self) -> Self {
        self.state.lock().unwrap().fail_commit = true;
        self
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    pub fn begun(&self) -> u64 {
        self.state.lock().unwrap().begun
    }

    pub fn committed(&self) -> u64 {
        self.state.lock().unwrap().committed
    }

    pub fn rolled_back(&self) -> u64 {
        self.state.lock().unwrap().rolled_back
    }

    fn backend_error(&self, operation: &str, message: impl Into<String>) -> CoreError {
        CoreError::Backend { resource: self.label.clone(),
                             operation: operation.to_string(),
                             message: message.into() }
    }

    fn tx_label(tx: Option<&TxHandle>) -> String {
        tx.map(|t| t.token.to_string()).unwrap_or_else(|| "-".into())
    }
}

impl QueryBackend for InMemoryQueryBackend {
    fn select(&self, tx: Option<&TxHandle>, operation: &str, _params: &Value) -> Result<Vec<Value>, CoreError> {
        let mut s = self.state.lock().unwrap();
        s.journal.push(format!("select {} tx={}", operation, Self::tx_label(tx)));
        if s.fail_ops.contains(operation) {
            return Err(self.backend_error(operation, "scripted failure"));
        }
        Ok(s.datasets.get(operation).cloned().unwrap_or_default())
    }

    fn flush_batch(&self, tx: Option<&TxHandle>, operation: &str, rows: &[Value]) -> Result<Vec<BatchResult>, CoreError> {
        let mut s = self.state.lock().unwrap();
        s.journal.push(format!("flush {} rows={} tx={}", operation, rows.len(), Self::tx_label(tx)));
        if s.fail_ops.contains(operation) {
            return Err(self.backend_error(operation, "scripted failure"));
        }
        let counts = vec![s.affected_per_row; rows.len()];
        Ok(vec![BatchResult { update_counts: counts }])
    }

    fn call(&self, tx: Option<&TxHandle>, operation: &str, _params: &Value) -> Result<Vec<Value>, CoreError> {
        let mut s = self.state.lock().unwrap();
        s.journal.push(format!("call {} tx={}", operation, Self::tx_label(tx)));
        if s.fail_ops.contains(operation) {
            return Err(self.backend_error(operation, "scripted failure"));
        }
        Ok(s.datasets.get(operation).cloned().unwrap_or_default())
    }

    fn begin(&self, timeout_secs: Option<u64>) -> Result<TxHandle, CoreError> {
        let mut s = self.state.lock().unwrap();
        let token = s.next_token;
        s.next_token += 1;
        s.open.insert(token);
        s.begun += 1;
        s.journal.push(match timeout_secs {
                           Some(t) => format!("begin#{token} timeout={t}s"),
                           None => format!("begin#{token}"),
                       });
        Ok(TxHandle { token })
    }

    fn commit(&self, tx: &TxHandle) -> Result<(), CoreError> {
        let mut s = self.state.lock().unwrap();
        if !s.open.remove(&tx.token) {
            return Err(self.backend_error("commit", format!("unknown tx token {}", tx.token)));
        }
        if s.fail_commit {
            // El handle queda cerrado: el backend real ya no lo aceptaría.
            s.journal.push(format!("commit#{} FAILED", tx.token));
            return Err(self.backend_error("commit", "scripted commit failure"));
        }
        s.committed += 1;
        s.journal.push(format!("commit#{}", tx.token));
        Ok(())
    }

    fn rollback(&self, tx: &TxHandle) -> Result<(), CoreError> {
        let mut s = self.state.lock().unwrap();
        if !s.open.remove(&tx.token) {
            return Err(self.backend_error("rollback", format!("unknown tx token {}", tx.token)));
        }
        s.rolled_back += 1;
        s.journal.push(format!("rollback#{}", tx.token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scripted_dataset_and_journal() {
        let b = InMemoryQueryBackend::new("mem").with_dataset("SEL_A", vec![json!({"id": 1})]);
        let rows = b.select(None, "SEL_A", &Value::Null).unwrap();
        assert_eq!(rows, vec![json!({"id": 1})]);
        assert_eq!(b.journal(), vec!["select SEL_A tx=-"]);
    }

    #[test]
    fn begin_commit_lifecycle_is_tracked() {
        let b = InMemoryQueryBackend::new("mem");
        let tx = b.begin(Some(30)).unwrap();
        assert_eq!(b.open_count(), 1);
        b.commit(&tx).unwrap();
        assert_eq!(b.open_count(), 0);
        assert_eq!((b.begun(), b.committed(), b.rolled_back()), (1, 1, 0));
        // Un token ya cerrado se rechaza
        assert!(b.commit(&tx).is_err());
    }
}
