//! `IterationGroup`: step compuesto que itera una colección.
//!
//! Forma del problema: un run típico itera un conjunto de filas y, por fila,
//! ejecuta un mapeo multi-step que puede fallar, con su propia acción de
//! recuperación ("registrar el error de esta fila, seguir con el resto").
//! Abortar el lote entero por una fila mala es exactamente el modo de fallo
//! que este diseño evita: el grupo nunca propaga un error por-elemento más
//! allá de su frontera, sólo lo despacha a sus handlers o lo deja en log.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::context::RunContext;
use crate::step::runner::{dispatch_error_handlers, run_step_list};
use crate::step::{ErrorHandler, Step, StepRun};

/// Política de contexto para cada iteración.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationPolicy {
    /// El valor iterado se liga en el contexto envolvente, compartido entre
    /// iteraciones (los steps internos ven y mutan el run real).
    SharedContext,
    /// Cada iteración recibe un contexto recién creado, descartado al
    /// terminar (sólo se emite su traza por log).
    IsolatedContext,
}

/// Step compuesto: por cada elemento (o lote de hasta `fetch_size`
/// elementos) del parámetro de entrada, liga el valor bajo el nombre de la
/// variable de iteración y ejecuta la lista interna; ante fallo no ignorado,
/// despacha la lista interna de handlers. La iteración avanza siempre.
#[derive(Clone)]
pub struct IterationGroup {
    id: String,
    input_param: String,
    item_param: String,
    fetch_size: usize,
    isolation: IsolationPolicy,
    steps: Vec<Arc<dyn Step>>,
    handlers: Vec<Arc<dyn ErrorHandler>>,
}

impl IterationGroup {
    pub fn new(id: impl Into<String>, input_param: impl Into<String>, item_param: impl Into<String>) -> Self {
        Self { id: id.into(),
               input_param: input_param.into(),
               item_param: item_param.into(),
               fetch_size: 1,
               isolation: IsolationPolicy::SharedContext,
               steps: Vec::new(),
               handlers: Vec::new() }
    }

    /// Con `n > 1` cada iteración recibe una lista de hasta `n` elementos
    /// (lotes parciales permitidos al final).
    pub fn with_fetch_size(mut self, n: usize) -> Self {
        self.fetch_size = n.max(1);
        self
    }

    /// Cambia a contexto aislado por iteración.
    pub fn isolated(mut self) -> Self {
        self.isolation = IsolationPolicy::IsolatedContext;
        self
    }

    pub fn add_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn input_param(&self) -> &str {
        &self.input_param
    }

    /// Reasigna el parámetro de entrada. Usado por `ResultStreamBuffer` para
    /// forzar que el grupo lea el lote publicado por el buffer.
    pub(crate) fn set_input_param(&mut self, input_param: &str) {
        self.input_param = input_param.to_string();
    }

    /// Una pasada de la lista interna + despacho de handlers si falló.
    fn run_element(&self, ctx: &mut RunContext) {
        if let Err(error) = run_step_list(&self.steps, ctx) {
            let dispatched = dispatch_error_handlers(&self.handlers, ctx, &error);
            if dispatched == 0 {
                warn!("iteration group '{}': unhandled element error: {}", self.id, error);
            } else {
                debug!("iteration group '{}': element error handled by {} handler(s): {}",
                       self.id, dispatched, error);
            }
        }
    }
}

impl Step for IterationGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self, ctx: &mut RunContext) -> StepRun {
        let items = match ctx.params.get_array(&self.input_param) {
            Ok(a) => a.clone(),
            Err(e) => return StepRun::Fail(e),
        };

        let drawn: Vec<Value> = if self.fetch_size > 1 {
            items.chunks(self.fetch_size).map(|c| Value::Array(c.to_vec())).collect()
        } else {
            items
        };

        for (i, value) in drawn.into_iter().enumerate() {
            // Frontera de iteración: un process_on limpiado detiene el grupo
            // sin error; no hay otro aborto a nivel de grupo.
            if !ctx.process_on {
                debug!("iteration group '{}': process_on=false at element {}, stopping", self.id, i);
                break;
            }
            match self.isolation {
                IsolationPolicy::SharedContext => {
                    ctx.params.set(self.item_param.clone(), value);
                    self.run_element(ctx);
                }
                IsolationPolicy::IsolatedContext => {
                    let mut iter_ctx = RunContext::new(format!("{}::{}[{}]", ctx.interface, self.id, i));
                    iter_ctx.params.set(self.item_param.clone(), value);
                    self.run_element(&mut iter_ctx);
                    debug!("iteration group '{}': isolated element {} trace: {}",
                           self.id,
                           i,
                           iter_ctx.step_trace_string());
                }
            }
        }
        StepRun::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreError;
    use serde_json::json;

    /// Acumula en el parámetro "seen" cada valor iterado; falla en el valor
    /// marcado como veneno.
    struct CollectStep {
        item_param: String,
        poison: Option<Value>,
    }

    impl Step for CollectStep {
        fn id(&self) -> &str {
            "collect"
        }
        fn run(&self, ctx: &mut RunContext) -> StepRun {
            let item = match ctx.params.require(&self.item_param) {
                Ok(v) => v.clone(),
                Err(e) => return StepRun::Fail(e),
            };
            let mut seen = ctx.params.get("seen").and_then(|v| v.as_array().cloned()).unwrap_or_default();
            seen.push(item.clone());
            ctx.params.set("seen", Value::Array(seen));
            if self.poison.as_ref() == Some(&item) {
                return StepRun::Fail(CoreError::Internal("poison element".into()));
            }
            StepRun::Continue
        }
    }

    struct CountingHandler;

    impl ErrorHandler for CountingHandler {
        fn id(&self) -> &str {
            "counting"
        }
        fn matches(&self, _error: &CoreError) -> bool {
            true
        }
        fn handle(&self, ctx: &mut RunContext, _error: &CoreError) -> Result<(), CoreError> {
            let n = ctx.params.get("handled").and_then(|v| v.as_i64()).unwrap_or(0);
            ctx.params.set("handled", json!(n + 1));
            Ok(())
        }
    }

    #[test]
    fn all_elements_attempted_despite_one_failure() {
        let group = IterationGroup::new("g", "rows", "row")
            .add_step(Arc::new(CollectStep { item_param: "row".into(), poison: Some(json!(2)) }))
            .add_error_handler(Arc::new(CountingHandler));
        let mut ctx = RunContext::new("t");
        ctx.params.set("rows", json!([1, 2, 3]));

        match group.run(&mut ctx) {
            StepRun::Continue => {}
            other => panic!("el grupo debe terminar normalmente, no {other:?}"),
        }
        assert_eq!(ctx.params.get("seen").unwrap(), &json!([1, 2, 3]));
        assert_eq!(ctx.params.get_i64("handled").unwrap(), 1, "exactamente un error despachado");
    }

    #[test]
    fn fetch_size_draws_partial_tail_batches() {
        let group = IterationGroup::new("g", "rows", "batch")
            .with_fetch_size(2)
            .add_step(Arc::new(CollectStep { item_param: "batch".into(), poison: None }));
        let mut ctx = RunContext::new("t");
        ctx.params.set("rows", json!([1, 2, 3]));

        group.run(&mut ctx);
        assert_eq!(ctx.params.get("seen").unwrap(), &json!([[1, 2], [3]]));
    }

    #[test]
    fn missing_input_param_is_a_failure() {
        let group = IterationGroup::new("g", "rows", "row");
        let mut ctx = RunContext::new("t");
        match group.run(&mut ctx) {
            StepRun::Fail(CoreError::MissingParam(p)) => assert_eq!(p, "rows"),
            other => panic!("se esperaba MissingParam, no {other:?}"),
        }
    }

    #[test]
    fn isolated_contexts_do_not_touch_the_enclosing_run() {
        let group = IterationGroup::new("g", "rows", "row")
            .isolated()
            .add_step(Arc::new(CollectStep { item_param: "row".into(), poison: None }));
        let mut ctx = RunContext::new("t");
        ctx.params.set("rows", json!([1, 2]));

        group.run(&mut ctx);
        assert!(ctx.params.get("seen").is_none(), "el contexto envolvente no debe mutarse");
        assert!(ctx.params.get("row").is_none());
    }

    #[test]
    fn cleared_process_on_stops_iteration_at_the_boundary() {
        let group = IterationGroup::new("g", "rows", "row")
            .add_step(Arc::new(CollectStep { item_param: "row".into(), poison: None }));
        let mut ctx = RunContext::new("t");
        ctx.params.set("rows", json!([1, 2, 3]));
        ctx.stop();

        group.run(&mut ctx);
        assert!(ctx.params.get("seen").is_none());
    }
}
