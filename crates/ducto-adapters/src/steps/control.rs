//! Steps de control para cablear interfaces de prueba y demos.

use serde_json::Value;

use ducto_core::context::RunContext;
use ducto_core::errors::CoreError;
use ducto_core::step::{Step, StepRun};

/// Escribe un parámetro fijo en el contexto.
pub struct SetParamStep {
    id: String,
    name: String,
    value: Value,
}

impl SetParamStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self { id: id.into(),
               name: name.into(),
               value }
    }
}

impl Step for SetParamStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        ctx.params.set(self.name.clone(), self.value.clone());
        StepRun::Continue
    }
}

/// Limpia `process_on`: el resto de la lista envolvente se salta sin error.
pub struct StopStep {
    id: String,
}

impl StopStep {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Step for StopStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        ctx.stop();
        StepRun::Continue
    }
}

/// Falla siempre con el mensaje configurado. Con `ignore` el runner registra
/// el error y sigue.
pub struct FailStep {
    id: String,
    message: String,
    ignore: bool,
}

impl FailStep {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { id: id.into(),
               message: message.into(),
               ignore: false }
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }
}

impl Step for FailStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn ignore_error(&self) -> bool {
        self.ignore
    }
    fn run(&self, _ctx: &mut RunContext) -> StepRun {
        StepRun::Fail(CoreError::Internal(self.message.clone()))
    }
}
