//! Estructuras ya resueltas que consume el motor.
//!
//! El cargador declarativo es un colaborador externo: aquí sólo se consumen
//! las estructuras finales (lista de steps, colas de trabajo, handlers de
//! error). No se parsea configuración.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::model::WorkItem;
use crate::step::{ErrorHandler, Step};

/// Pipeline de movimiento de datos configurado y con nombre.
///
/// Las colas son listas de declaración inmutables; el estado de consumo por
/// run (cursor) vive en el `RunContext`, de modo que corridas concurrentes
/// de la misma interfaz no compartan estado mutable.
pub struct InterfaceDefinition {
    pub name: String,
    pub steps: Vec<Arc<dyn Step>>,
    pub error_handlers: Vec<Arc<dyn ErrorHandler>>,
    pub work_queue: Vec<WorkItem>,
    pub error_work_queue: Vec<WorkItem>,
}

impl InterfaceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               steps: Vec::new(),
               error_handlers: Vec::new(),
               work_queue: Vec::new(),
               error_work_queue: Vec::new() }
    }

    pub fn add_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handlers.push(handler);
        self
    }

    pub fn queue_work(mut self, item: WorkItem) -> Self {
        self.work_queue.push(item);
        self
    }

    pub fn queue_error_work(mut self, item: WorkItem) -> Self {
        self.error_work_queue.push(item);
        self
    }

    /// Conjunto de nombres de recurso implicado por las colas (sin duplicar).
    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.work_queue
                                       .iter()
                                       .chain(self.error_work_queue.iter())
                                       .map(|w| w.resource.as_str())
                                       .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Registro explícito de interfaces: nombre → definición.
///
/// Se construye una vez al arranque y se pasa por referencia; no hay estado
/// global de proceso.
#[derive(Default)]
pub struct InterfaceRegistry {
    inner: HashMap<String, Arc<InterfaceDefinition>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self { inner: HashMap::new() }
    }

    /// Registra una definición. Nombre duplicado es error de configuración y
    /// no deja registro parcial.
    pub fn register(&mut self, def: InterfaceDefinition) -> Result<(), CoreError> {
        if def.name.is_empty() {
            return Err(CoreError::Internal("interface name must not be empty".into()));
        }
        if self.inner.contains_key(&def.name) {
            return Err(CoreError::Internal(format!("duplicate interface name '{}'", def.name)));
        }
        self.inner.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<InterfaceDefinition>> {
        self.inner.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.inner.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
