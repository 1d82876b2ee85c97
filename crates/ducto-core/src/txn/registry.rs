//! Registro de recursos: nombre → backend + configuración.
//!
//! Se registra un conjunto fijo de recursos exactamente una vez al arranque
//! (el builder se consume en `build`); después el registro es inmutable y se
//! comparte por referencia (`Arc`) entre runs concurrentes. No hay
//! re-registro en vivo ni singletons de proceso.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::context::RunContext;
use crate::errors::CoreError;
use crate::txn::backend::QueryBackend;
use crate::txn::executor::QueryExecutor;

/// Configuración estática de un recurso.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceConfig {
    /// Timeout por defecto al abrir transacciones de este recurso.
    pub timeout_secs: Option<u64>,
    /// Tamaño de chunk del camino batch: con valor <= 0 se bufferiza todo y
    /// se hace un único flush; con N > 0 se flushea cada N filas.
    pub batch_chunk_size: i32,
}

/// Declaración de recurso tal como la produce el cargador externo. El
/// backend es opcional en la declaración para poder detectar (y rechazar)
/// recursos sin proveedor de conexión.
pub struct ResourceDecl {
    pub name: String,
    pub backend: Option<Arc<dyn QueryBackend>>,
    pub config: ResourceConfig,
}

impl ResourceDecl {
    pub fn new(name: impl Into<String>, backend: Arc<dyn QueryBackend>) -> Self {
        Self { name: name.into(),
               backend: Some(backend),
               config: ResourceConfig::default() }
    }

    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }
}

struct RegisteredResource {
    backend: Arc<dyn QueryBackend>,
    config: ResourceConfig,
}

/// Builder del registro. Cada registro inválido falla con error de
/// configuración sin retener registro parcial.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, RegisteredResource>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, decl: ResourceDecl) -> Result<(), CoreError> {
        if decl.name.is_empty() {
            return Err(CoreError::EmptyResourceName);
        }
        if self.entries.contains_key(&decl.name) {
            return Err(CoreError::DuplicateResource(decl.name));
        }
        let backend = decl.backend.ok_or_else(|| CoreError::MissingBackend(decl.name.clone()))?;
        self.entries.insert(decl.name, RegisteredResource { backend, config: decl.config });
        Ok(())
    }

    /// Congela el registro. El builder se consume: no hay registro posterior.
    pub fn build(self) -> ResourceRegistry {
        ResourceRegistry { entries: self.entries }
    }
}

/// Registro inmutable de recursos, compartido entre runs.
pub struct ResourceRegistry {
    entries: HashMap<String, RegisteredResource>,
}

impl ResourceRegistry {
    /// Resuelve un recurso a su ejecutor con demarcación. Nunca falla para un
    /// nombre registrado.
    pub fn resolve(&self, name: &str) -> Result<QueryExecutor, CoreError> {
        let entry = self.entries
                        .get(name)
                        .ok_or_else(|| CoreError::UnknownResource(name.to_string()))?;
        Ok(QueryExecutor::new(name.to_string(), Arc::clone(&entry.backend), entry.config))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Barrido de fin de run: toda transacción aún abierta se revierte y se
    /// deja constancia en log (el commit sólo ocurre por la operación
    /// explícita de commit). Devuelve cuántos handles abiertos se barrieron.
    pub fn rollback_open_transactions(&self, ctx: &mut RunContext) -> usize {
        let mut swept = 0;
        let names: Vec<String> = ctx.transactions.keys().cloned().collect();
        for name in names {
            let Some(txn) = ctx.transactions.remove(&name) else { continue };
            let Some(handle) = txn.handle else { continue };
            swept += 1;
            warn!("run {}: transaction on '{}' left open at end of run (history {}), rolling back",
                  ctx.run_id,
                  name,
                  txn.history_trace());
            match self.entries.get(&name) {
                Some(entry) => {
                    if let Err(e) = entry.backend.rollback(&handle) {
                        warn!("end-of-run rollback failed on '{}': {}", name, e);
                    }
                }
                None => warn!("end-of-run sweep: resource '{}' is not registered", name),
            }
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::backend::{BatchResult, TxHandle};
    use serde_json::Value;

    struct NullBackend;

    impl QueryBackend for NullBackend {
        fn select(&self, _tx: Option<&TxHandle>, _op: &str, _p: &Value) -> Result<Vec<Value>, CoreError> {
            Ok(vec![])
        }
        fn flush_batch(&self, _tx: Option<&TxHandle>, _op: &str, _rows: &[Value]) -> Result<Vec<BatchResult>, CoreError> {
            Ok(vec![])
        }
        fn call(&self, _tx: Option<&TxHandle>, _op: &str, _p: &Value) -> Result<Vec<Value>, CoreError> {
            Ok(vec![])
        }
        fn begin(&self, _timeout_secs: Option<u64>) -> Result<TxHandle, CoreError> {
            Ok(TxHandle { token: 1 })
        }
        fn commit(&self, _tx: &TxHandle) -> Result<(), CoreError> {
            Ok(())
        }
        fn rollback(&self, _tx: &TxHandle) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_name_is_a_configuration_error() {
        let mut b = RegistryBuilder::new();
        b.register(ResourceDecl::new("crm", Arc::new(NullBackend))).unwrap();
        let err = b.register(ResourceDecl::new("crm", Arc::new(NullBackend))).unwrap_err();
        assert_eq!(err, CoreError::DuplicateResource("crm".into()));
        // El registro previo sigue intacto
        let reg = b.build();
        assert!(reg.contains("crm"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn missing_backend_is_rejected_without_partial_registration() {
        let mut b = RegistryBuilder::new();
        let decl = ResourceDecl { name: "erp".into(),
                                  backend: None,
                                  config: ResourceConfig::default() };
        assert_eq!(b.register(decl).unwrap_err(), CoreError::MissingBackend("erp".into()));
        assert!(b.build().is_empty());
    }

    #[test]
    fn resolve_never_fails_for_registered_names() {
        let mut b = RegistryBuilder::new();
        b.register(ResourceDecl::new("crm", Arc::new(NullBackend))).unwrap();
        let reg = b.build();
        assert!(reg.resolve("crm").is_ok());
        assert_eq!(reg.resolve("nope").unwrap_err(), CoreError::UnknownResource("nope".into()));
    }
}
