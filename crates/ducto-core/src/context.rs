//! `RunContext`: estado por invocación de una interfaz.
//!
//! Rol en el motor:
//! - Un contexto por invocación, propiedad exclusiva del pipeline que lo
//!   ejecuta durante toda su vida; dos runs nunca comparten contexto.
//! - Transporta la bolsa de parámetros, el mapa transaccional por recurso,
//!   el mapa de sesiones externas, las trazas de ejecución y error, y el
//!   flag `process_on` de corto-circuito.
//! - El consumo de las colas de trabajo de la interfaz se registra aquí
//!   (cursores), dejando la definición inmutable y compartible.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::interface::InterfaceDefinition;
use crate::model::{ParamBag, QueuePath, WorkItem};
use crate::txn::ResourceTransaction;

/// Estado final de un run.
///
/// Transiciones válidas desde `Running`: `Completed`, `ShortCircuited` o
/// `Failed`. No hay reversiones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// La lista terminó sin error porque un step limpió `process_on`.
    ShortCircuited,
    Failed,
}

pub struct RunContext {
    pub run_id: Uuid,
    pub interface: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub params: ParamBag,
    /// recurso → transacción viva. Entradas eliminadas al commit/rollback.
    pub transactions: HashMap<String, ResourceTransaction>,
    /// Traza de steps ejecutados, en orden de ejecución (append-only).
    pub step_trace: Vec<String>,
    /// step fallido → error capturado, en orden de descubrimiento.
    pub error_trace: IndexMap<String, CoreError>,
    /// Mientras sea `true` la lista de steps sigue avanzando; cualquier step
    /// puede limpiarlo para cortar el resto de su lista sin señalar fallo.
    pub process_on: bool,
    pub status: RunStatus,
    definition: Option<Arc<InterfaceDefinition>>,
    sessions: HashMap<String, Box<dyn Any + Send>>,
    queue_cursor: usize,
    error_queue_cursor: usize,
}

impl RunContext {
    /// Contexto suelto (sin colas de interfaz): usado por iteraciones
    /// aisladas y por tests.
    pub fn new(interface: impl Into<String>) -> Self {
        Self { run_id: Uuid::new_v4(),
               interface: interface.into(),
               started_at: Utc::now(),
               finished_at: None,
               params: ParamBag::new(),
               transactions: HashMap::new(),
               step_trace: Vec::new(),
               error_trace: IndexMap::new(),
               process_on: true,
               status: RunStatus::Running,
               definition: None,
               sessions: HashMap::new(),
               queue_cursor: 0,
               error_queue_cursor: 0 }
    }

    /// Contexto ligado a una definición: habilita el drenaje de colas.
    pub fn for_interface(definition: Arc<InterfaceDefinition>) -> Self {
        let mut ctx = Self::new(definition.name.clone());
        ctx.definition = Some(definition);
        ctx
    }

    /// Limpia `process_on`: los steps restantes de la lista envolvente se
    /// saltan y la lista termina sin error.
    pub fn stop(&mut self) {
        self.process_on = false;
    }

    /// Anexa el step a la traza de ejecución.
    pub fn record_step(&mut self, name: &str) {
        self.step_trace.push(name.to_string());
    }

    /// Registra un error en la traza, con el nombre del step fallido como
    /// clave. Un fallo repetido del mismo step conserva la posición original.
    pub fn record_error(&mut self, step: &str, error: CoreError) {
        self.error_trace.insert(step.to_string(), error);
    }

    /// Sella el run: estado final + timestamp de cierre.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Extrae el siguiente item no consumido de la cola indicada.
    ///
    /// Efecto lateral: anexa la operación del item al historial de la
    /// transacción del recurso (creando la entrada si no existe, con el
    /// timeout del item). Drenar más allá del final es un error de
    /// configuración: la interfaz declaró menos operaciones de las que sus
    /// steps consumen.
    pub fn next_work_item(&mut self, path: QueuePath) -> Result<WorkItem, CoreError> {
        let def = self.definition
                      .clone()
                      .ok_or_else(|| CoreError::QueueExhausted { interface: self.interface.clone(),
                                                                 consumed: 0 })?;
        let (queue, cursor) = match path {
            QueuePath::Normal => (&def.work_queue, &mut self.queue_cursor),
            QueuePath::Error => (&def.error_work_queue, &mut self.error_queue_cursor),
        };
        let item = queue.get(*cursor)
                        .cloned()
                        .ok_or_else(|| CoreError::QueueExhausted { interface: def.name.clone(),
                                                                   consumed: queue.len() })?;
        *cursor += 1;

        let txn = self.transactions
                      .entry(item.resource.clone())
                      .or_insert_with(|| {
                          let mut t = ResourceTransaction::new(item.resource.clone());
                          t.timeout_secs = item.timeout_secs;
                          t
                      });
        txn.push_history(item.operation.clone());
        Ok(item)
    }

    /// Guarda un handle de conexión externa de larga vida (sesión de
    /// transferencia, etc.) bajo un nombre.
    pub fn add_session(&mut self, name: impl Into<String>, handle: Box<dyn Any + Send>) {
        self.sessions.insert(name.into(), handle);
    }

    /// Recupera una sesión tipada; `None` si no existe o el tipo no coincide.
    pub fn session<T: Any>(&self, name: &str) -> Option<&T> {
        self.sessions.get(name).and_then(|h| h.downcast_ref::<T>())
    }

    pub fn has_session(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn remove_session(&mut self, name: &str) -> Option<Box<dyn Any + Send>> {
        self.sessions.remove(name)
    }

    /// Traza de steps renderizada para logging.
    pub fn step_trace_string(&self) -> String {
        self.step_trace.join(crate::constants::HISTORY_ARROW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def_with_queue(n: usize) -> Arc<InterfaceDefinition> {
        let mut def = InterfaceDefinition::new("iface");
        for i in 0..n {
            def = def.queue_work(WorkItem::new("crm", format!("OP{i}")));
        }
        Arc::new(def)
    }

    #[test]
    fn draining_past_the_end_is_a_configuration_error() {
        let mut ctx = RunContext::for_interface(def_with_queue(2));
        assert!(ctx.next_work_item(QueuePath::Normal).is_ok());
        assert!(ctx.next_work_item(QueuePath::Normal).is_ok());
        let err = ctx.next_work_item(QueuePath::Normal).unwrap_err();
        assert_eq!(err, CoreError::QueueExhausted { interface: "iface".into(), consumed: 2 });
    }

    #[test]
    fn draining_appends_to_resource_history() {
        let mut ctx = RunContext::for_interface(def_with_queue(2));
        ctx.next_work_item(QueuePath::Normal).unwrap();
        ctx.next_work_item(QueuePath::Normal).unwrap();
        let txn = ctx.transactions.get("crm").expect("entrada creada por el drenaje");
        assert_eq!(txn.history_trace(), "OP0→OP1");
    }

    #[test]
    fn sessions_are_typed() {
        let mut ctx = RunContext::new("iface");
        ctx.add_session("sftp", Box::new(String::from("conn-7")));
        assert_eq!(ctx.session::<String>("sftp").unwrap(), "conn-7");
        assert!(ctx.session::<u64>("sftp").is_none());
        assert!(!ctx.has_session("ftp"));
    }

    #[test]
    fn params_are_shared_mutable_state() {
        let mut ctx = RunContext::new("iface");
        ctx.params.set("total", json!(10));
        ctx.params.set("total", json!(11));
        assert_eq!(ctx.params.get_i64("total").unwrap(), 11);
    }
}
