//! `StreamQueryStep`: lectura cursor drenada por lotes a un sub-pipeline.

use std::sync::Arc;

use serde_json::Value;

use ducto_core::context::RunContext;
use ducto_core::errors::CoreError;
use ducto_core::model::QueuePath;
use ducto_core::step::{IterationGroup, Step, StepRun};
use ducto_core::stream::ResultStreamBuffer;
use ducto_core::txn::ResourceRegistry;

/// Drena el próximo item de la cola, abre una lectura cursor sobre su
/// operación y alimenta cada fila a un `ResultStreamBuffer` ligado al
/// sub-pipeline configurado. El buffer flushea cada `fetch_size` filas y el
/// resto al agotarse el cursor.
///
/// El grupo interno se clona por run: el buffer es estado por-run y nunca
/// vive en el step.
pub struct StreamQueryStep {
    id: String,
    registry: Arc<ResourceRegistry>,
    fetch_size: usize,
    group: IterationGroup,
    params_from: Option<String>,
}

impl StreamQueryStep {
    pub fn new(id: impl Into<String>,
               registry: Arc<ResourceRegistry>,
               fetch_size: usize,
               group: IterationGroup)
               -> Self {
        Self { id: id.into(),
               registry,
               fetch_size,
               group,
               params_from: None }
    }

    pub fn with_params_from(mut self, name: impl Into<String>) -> Self {
        self.params_from = Some(name.into());
        self
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<(), CoreError> {
        let item = ctx.next_work_item(QueuePath::Normal)?;
        let executor = self.registry.resolve(&item.resource)?;
        let params = self.params_from
                         .as_ref()
                         .and_then(|name| ctx.params.get(name).cloned())
                         .unwrap_or(Value::Null);

        // Handle resuelto antes del callback: dentro de un grupo activo la
        // lectura participa de su transacción; sin grupo corre sin demarcar.
        let tx = executor.open_streaming(ctx)?;
        let mut buffer = ResultStreamBuffer::new(self.fetch_size, self.group.clone());
        executor.stream(tx.as_ref(), &item.operation, &params, &mut |row| buffer.push(ctx, row))?;
        buffer.finish(ctx)
    }
}

impl Step for StreamQueryStep {
    fn id(&self) -> &str {
        &self.id
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        StepRun::from_result(self.execute(ctx))
    }
}
