//! Core InterfaceEngine implementation

use std::sync::Arc;

use log::{debug, error, warn};

use crate::context::{RunContext, RunStatus};
use crate::errors::CoreError;
use crate::interface::{InterfaceDefinition, InterfaceRegistry};
use crate::model::ParamBag;
use crate::step::runner::{dispatch_error_handlers, run_step_list};
use crate::txn::ResourceRegistry;

/// Resultado de un run: el contexto completo (trazas incluidas) más el error
/// propagado, si lo hubo. El contexto sobrevive al fallo para diagnóstico.
pub struct RunReport {
    pub context: RunContext,
    pub error: Option<CoreError>,
}

impl RunReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Motor de ejecución de interfaces.
///
/// Mantiene el registro de recursos (inmutable, compartido) y el registro de
/// interfaces. Ambos son objetos explícitos construidos al arranque y
/// pasados por referencia: no hay singletons de proceso.
pub struct InterfaceEngine {
    registry: Arc<ResourceRegistry>,
    interfaces: InterfaceRegistry,
}

impl InterfaceEngine {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry,
               interfaces: InterfaceRegistry::new() }
    }

    pub fn with_interfaces(registry: Arc<ResourceRegistry>, interfaces: InterfaceRegistry) -> Self {
        Self { registry, interfaces }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn register_interface(&mut self, def: InterfaceDefinition) -> Result<(), CoreError> {
        self.interfaces.register(def)
    }

    /// Ejecuta una interfaz registrada por nombre.
    pub fn run(&self, name: &str, seed: ParamBag) -> Result<RunReport, CoreError> {
        let def = self.interfaces
                      .resolve(name)
                      .ok_or_else(|| CoreError::Internal(format!("unknown interface '{name}'")))?;
        Ok(self.run_definition(def, seed))
    }

    /// Ejecuta una definición (ya resuelta) de principio a fin.
    ///
    /// Secuencia: contexto nuevo con los parámetros semilla → lista de steps
    /// → ante fallo propagado, handlers de error de la interfaz → emisión de
    /// trazas → barrido de transacciones abiertas → estado final.
    pub fn run_definition(&self, def: Arc<InterfaceDefinition>, seed: ParamBag) -> RunReport {
        let mut ctx = RunContext::for_interface(Arc::clone(&def));
        ctx.params = seed;

        if def.steps.is_empty() {
            let err = CoreError::EmptyStepList(def.name.clone());
            ctx.record_error(&def.name, err.clone());
            ctx.finish(RunStatus::Failed);
            return RunReport { context: ctx, error: Some(err) };
        }

        debug!("run {} interface '{}': start ({} steps, {})",
               ctx.run_id,
               def.name,
               def.steps.len(),
               crate::constants::ENGINE_VERSION);
        let result = run_step_list(&def.steps, &mut ctx);

        if let Err(e) = &result {
            // Historial por recurso ANTES del barrido: es el rastro de
            // auditoría para diagnosticar fallos parciales.
            for txn in ctx.transactions.values() {
                error!("run {} interface '{}': resource {}, operations {}, failed: {}",
                       ctx.run_id,
                       def.name,
                       txn.resource,
                       txn.history_trace(),
                       e);
            }
            let dispatched = dispatch_error_handlers(&def.error_handlers, &mut ctx, e);
            debug!("run {} interface '{}': {} error handler(s) dispatched", ctx.run_id, def.name, dispatched);
        }

        let swept = self.registry.rollback_open_transactions(&mut ctx);
        if swept > 0 {
            warn!("run {} interface '{}': {} open transaction(s) rolled back at end of run",
                  ctx.run_id,
                  def.name,
                  swept);
        }

        let status = match &result {
            Err(_) => RunStatus::Failed,
            Ok(()) if !ctx.process_on => RunStatus::ShortCircuited,
            Ok(()) => RunStatus::Completed,
        };
        ctx.finish(status);
        debug!("run {} interface '{}': {:?}, trace: {}",
               ctx.run_id,
               def.name,
               ctx.status,
               ctx.step_trace_string());

        RunReport { context: ctx, error: result.err() }
    }
}
