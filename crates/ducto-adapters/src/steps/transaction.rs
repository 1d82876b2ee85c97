//! Steps de demarcación: abren y cierran transacciones agrupadas.
//!
//! El coordinador nunca cierra una transacción agrupada por su cuenta (salvo
//! el barrido de fin de run, que siempre revierte): confirmar es SIEMPRE una
//! decisión explícita de la interfaz, expresada con estos steps.

use std::sync::Arc;

use ducto_core::context::RunContext;
use ducto_core::step::{Step, StepRun};
use ducto_core::txn::ResourceRegistry;

/// Activa el modo agrupado para un recurso: las operaciones siguientes sobre
/// él comparten un único handle hasta el commit/rollback explícito.
pub struct BeginGroupStep {
    id: String,
    registry: Arc<ResourceRegistry>,
    resource: String,
}

impl BeginGroupStep {
    pub fn new(id: impl Into<String>, registry: Arc<ResourceRegistry>, resource: impl Into<String>) -> Self {
        Self { id: id.into(),
               registry,
               resource: resource.into() }
    }
}

impl Step for BeginGroupStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        let executor = match self.registry.resolve(&self.resource) {
            Ok(e) => e,
            Err(e) => return StepRun::Fail(e),
        };
        StepRun::from_result(executor.enable_group(ctx))
    }
}

/// Confirma la transacción agrupada del recurso.
pub struct CommitStep {
    id: String,
    registry: Arc<ResourceRegistry>,
    resource: String,
}

impl CommitStep {
    pub fn new(id: impl Into<String>, registry: Arc<ResourceRegistry>, resource: impl Into<String>) -> Self {
        Self { id: id.into(),
               registry,
               resource: resource.into() }
    }
}

impl Step for CommitStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        let executor = match self.registry.resolve(&self.resource) {
            Ok(e) => e,
            Err(e) => return StepRun::Fail(e),
        };
        StepRun::from_result(executor.commit_group(ctx))
    }
}

/// Revierte la transacción agrupada del recurso. El fallo del rollback se
/// registra en log y no se propaga.
pub struct RollbackStep {
    id: String,
    registry: Arc<ResourceRegistry>,
    resource: String,
}

impl RollbackStep {
    pub fn new(id: impl Into<String>, registry: Arc<ResourceRegistry>, resource: impl Into<String>) -> Self {
        Self { id: id.into(),
               registry,
               resource: resource.into() }
    }
}

impl Step for RollbackStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        let executor = match self.registry.resolve(&self.resource) {
            Ok(e) => e,
            Err(e) => return StepRun::Fail(e),
        };
        executor.rollback_group(ctx);
        StepRun::Continue
    }
}
