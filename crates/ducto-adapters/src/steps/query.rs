//! Steps SQL: lectura, escritura batch y llamada a procedimiento.
//!
//! Todos drenan su `WorkItem` de la cola normal de la interfaz (el recurso y
//! la operación vienen de la configuración, no del step) y ejecutan a través
//! del coordinador, de modo que la demarcación agrupada/no-agrupada aplica
//! sin que el step lo sepa.

use std::sync::Arc;

use serde_json::{json, Value};

use ducto_core::context::RunContext;
use ducto_core::errors::CoreError;
use ducto_core::model::QueuePath;
use ducto_core::step::{Step, StepRun};
use ducto_core::txn::ResourceRegistry;

/// Lee los parámetros de bind declarados (o `Null` si el step no los liga).
fn bind_params(ctx: &RunContext, params_from: &Option<String>) -> Value {
    params_from.as_ref()
               .and_then(|name| ctx.params.get(name).cloned())
               .unwrap_or(Value::Null)
}

/// Ejecuta la operación de lectura del próximo item de la cola y publica las
/// filas bajo `target_param`.
pub struct SelectStep {
    id: String,
    registry: Arc<ResourceRegistry>,
    target_param: String,
    params_from: Option<String>,
}

impl SelectStep {
    pub fn new(id: impl Into<String>, registry: Arc<ResourceRegistry>, target_param: impl Into<String>) -> Self {
        Self { id: id.into(),
               registry,
               target_param: target_param.into(),
               params_from: None }
    }

    /// Nombre del parámetro del contexto que contiene los binds de la query.
    pub fn with_params_from(mut self, name: impl Into<String>) -> Self {
        self.params_from = Some(name.into());
        self
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<(), CoreError> {
        let item = ctx.next_work_item(QueuePath::Normal)?;
        let executor = self.registry.resolve(&item.resource)?;
        let params = bind_params(ctx, &self.params_from);
        let rows = executor.select(Some(&mut *ctx), &item.operation, &params)?;
        ctx.params.set(self.target_param.clone(), Value::Array(rows));
        Ok(())
    }
}

impl Step for SelectStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        StepRun::from_result(self.execute(ctx))
    }
}

/// Tipo de escritura batch. La operación concreta la define el item drenado;
/// el modo sólo elige el punto de entrada del coordinador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    UpdateOrDelete,
}

/// Somete por el camino batch las filas de `rows_param` (fila única, lista o
/// ausente: la normalización la hace el coordinador).
pub struct BatchWriteStep {
    id: String,
    registry: Arc<ResourceRegistry>,
    rows_param: String,
    mode: WriteMode,
    count_param: Option<String>,
    ignore_error: bool,
}

impl BatchWriteStep {
    pub fn new(id: impl Into<String>,
               registry: Arc<ResourceRegistry>,
               rows_param: impl Into<String>,
               mode: WriteMode)
               -> Self {
        Self { id: id.into(),
               registry,
               rows_param: rows_param.into(),
               mode,
               count_param: None,
               ignore_error: false }
    }

    /// Publica el total de filas afectadas bajo este nombre.
    pub fn with_count_param(mut self, name: impl Into<String>) -> Self {
        self.count_param = Some(name.into());
        self
    }

    pub fn with_ignore_error(mut self) -> Self {
        self.ignore_error = true;
        self
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<(), CoreError> {
        let item = ctx.next_work_item(QueuePath::Normal)?;
        let executor = self.registry.resolve(&item.resource)?;
        let input = ctx.params.get(&self.rows_param).cloned().unwrap_or(Value::Null);
        let affected = match self.mode {
            WriteMode::Insert => executor.insert_batch(Some(&mut *ctx), &item.operation, &input)?,
            WriteMode::UpdateOrDelete => executor.update_or_delete_batch(Some(&mut *ctx), &item.operation, &input)?,
        };
        if let Some(name) = &self.count_param {
            ctx.params.set(name.clone(), json!(affected));
        }
        Ok(())
    }
}

impl Step for BatchWriteStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn ignore_error(&self) -> bool {
        self.ignore_error
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        StepRun::from_result(self.execute(ctx))
    }
}

/// Invoca una operación tipo procedimiento; las filas devueltas se publican
/// bajo `target_param` si se configuró.
pub struct CallStep {
    id: String,
    registry: Arc<ResourceRegistry>,
    target_param: Option<String>,
    params_from: Option<String>,
}

impl CallStep {
    pub fn new(id: impl Into<String>, registry: Arc<ResourceRegistry>) -> Self {
        Self { id: id.into(),
               registry,
               target_param: None,
               params_from: None }
    }

    pub fn with_target_param(mut self, name: impl Into<String>) -> Self {
        self.target_param = Some(name.into());
        self
    }

    pub fn with_params_from(mut self, name: impl Into<String>) -> Self {
        self.params_from = Some(name.into());
        self
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<(), CoreError> {
        let item = ctx.next_work_item(QueuePath::Normal)?;
        let executor = self.registry.resolve(&item.resource)?;
        let params = bind_params(ctx, &self.params_from);
        let rows = executor.call(Some(&mut *ctx), &item.operation, &params)?;
        if let Some(name) = &self.target_param {
            ctx.params.set(name.clone(), Value::Array(rows));
        }
        Ok(())
    }
}

impl Step for CallStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        StepRun::from_result(self.execute(ctx))
    }
}
