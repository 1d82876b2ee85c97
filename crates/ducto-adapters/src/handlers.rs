//! Handlers de error declarativos.
//!
//! Un handler declara qué errores acepta (`matches`) y qué hace con ellos.
//! El despacho (orden de declaración, fallo de handler no fatal) lo hace el
//! runner del core; aquí sólo hay acciones concretas.

use std::sync::Arc;

use log::warn;
use serde_json::{json, Value};

use ducto_core::context::RunContext;
use ducto_core::errors::{classify_error, CoreError, ErrorClass};
use ducto_core::model::QueuePath;
use ducto_core::step::ErrorHandler;
use ducto_core::txn::ResourceRegistry;

/// Anexa el error al parámetro acumulador `handled_errors` del contexto.
fn record_handled(ctx: &mut RunContext, handler: &str, error: &CoreError) {
    let mut handled = ctx.params
                         .get("handled_errors")
                         .and_then(|v| v.as_array().cloned())
                         .unwrap_or_default();
    handled.push(json!({ "handler": handler, "error": error.to_string() }));
    ctx.params.set("handled_errors", Value::Array(handled));
}

/// Acepta cualquier error: lo deja en log y en `handled_errors`.
pub struct LogErrorHandler {
    id: String,
}

impl LogErrorHandler {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl ErrorHandler for LogErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }
    fn matches(&self, _error: &CoreError) -> bool {
        true
    }
    fn handle(&self, ctx: &mut RunContext, error: &CoreError) -> Result<(), CoreError> {
        warn!("run {}: handler '{}' captured: {}", ctx.run_id, self.id, error);
        record_handled(ctx, &self.id, error);
        Ok(())
    }
}

/// Acepta sólo errores de la clase configurada.
pub struct ClassErrorHandler {
    id: String,
    class: ErrorClass,
}

impl ClassErrorHandler {
    pub fn new(id: impl Into<String>, class: ErrorClass) -> Self {
        Self { id: id.into(), class }
    }
}

impl ErrorHandler for ClassErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }
    fn matches(&self, error: &CoreError) -> bool {
        classify_error(error) == self.class
    }
    fn handle(&self, ctx: &mut RunContext, error: &CoreError) -> Result<(), CoreError> {
        record_handled(ctx, &self.id, error);
        Ok(())
    }
}

/// Audita el error contra un backend drenando la cola de trabajo del camino
/// de error: así una interfaz declara "ante fallo, registrar en esta tabla".
pub struct ErrorAuditHandler {
    id: String,
    registry: Arc<ResourceRegistry>,
}

impl ErrorAuditHandler {
    pub fn new(id: impl Into<String>, registry: Arc<ResourceRegistry>) -> Self {
        Self { id: id.into(), registry }
    }
}

impl ErrorHandler for ErrorAuditHandler {
    fn id(&self) -> &str {
        &self.id
    }
    fn matches(&self, _error: &CoreError) -> bool {
        true
    }
    fn handle(&self, ctx: &mut RunContext, error: &CoreError) -> Result<(), CoreError> {
        let item = ctx.next_work_item(QueuePath::Error)?;
        let executor = self.registry.resolve(&item.resource)?;
        let params = json!({
            "interface": ctx.interface,
            "run_id": ctx.run_id.to_string(),
            "error": error.to_string(),
        });
        executor.call(Some(&mut *ctx), &item.operation, &params)?;
        Ok(())
    }
}
