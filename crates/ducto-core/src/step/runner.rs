//! Ejecución ordenada de listas de steps y despacho de handlers de error.

use std::sync::Arc;

use log::{debug, warn};

use crate::context::RunContext;
use crate::errors::CoreError;
use crate::step::{ErrorHandler, Step, StepRun};

/// Ejecuta una lista de steps en orden estricto contra el contexto.
///
/// Antes de cada step: si `process_on` es falso, los steps restantes se
/// saltan y la lista termina sin error (corto-circuito, no fallo). Si no,
/// el step se anexa a la traza y se ejecuta:
/// - `Continue`: sigue con el próximo.
/// - `Break`: corta esta lista sin error.
/// - `Fail`: se registra en el error trace con el nombre del step como
///   clave; si el step declara `ignore_error`, la lista continúa; si no, la
///   lista se detiene y el error se propaga.
pub fn run_step_list(steps: &[Arc<dyn Step>], ctx: &mut RunContext) -> Result<(), CoreError> {
    for step in steps {
        if !ctx.process_on {
            debug!("run {}: process_on=false, skipping remaining steps", ctx.run_id);
            return Ok(());
        }
        let name = step.name().to_string();
        ctx.record_step(&name);
        debug!("run {}: step '{}' start", ctx.run_id, name);
        match step.run(ctx) {
            StepRun::Continue => {}
            StepRun::Break => {
                debug!("run {}: step '{}' requested break", ctx.run_id, name);
                return Ok(());
            }
            StepRun::Fail(error) => {
                ctx.record_error(&name, error.clone());
                if step.ignore_error() {
                    warn!("run {}: step '{}' failed (ignored): {}", ctx.run_id, name, error);
                    continue;
                }
                return Err(error);
            }
        }
    }
    Ok(())
}

/// Despacha un error a los handlers que lo acepten, en orden de declaración.
///
/// El fallo de un handler se registra en log y no detiene a los siguientes.
/// Devuelve cuántos handlers llegaron a ejecutarse.
pub fn dispatch_error_handlers(handlers: &[Arc<dyn ErrorHandler>],
                               ctx: &mut RunContext,
                               error: &CoreError)
                               -> usize {
    let mut dispatched = 0;
    for handler in handlers {
        if !handler.matches(error) {
            continue;
        }
        dispatched += 1;
        if let Err(handler_err) = handler.handle(ctx, error) {
            warn!("run {}: error handler '{}' failed: {}", ctx.run_id, handler.id(), handler_err);
        }
    }
    dispatched
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoteStep {
        id: String,
        ignore: bool,
        outcome: fn() -> StepRun,
    }

    impl Step for NoteStep {
        fn id(&self) -> &str {
            &self.id
        }
        fn ignore_error(&self) -> bool {
            self.ignore
        }
        fn run(&self, ctx: &mut RunContext) -> StepRun {
            ctx.params.set(self.id.clone(), serde_json::json!(true));
            (self.outcome)()
        }
    }

    fn step(id: &str, ignore: bool, outcome: fn() -> StepRun) -> Arc<dyn Step> {
        Arc::new(NoteStep { id: id.into(), ignore, outcome })
    }

    #[test]
    fn steps_execute_in_list_order() {
        let steps = vec![step("a", false, || StepRun::Continue),
                         step("b", false, || StepRun::Continue)];
        let mut ctx = RunContext::new("t");
        run_step_list(&steps, &mut ctx).unwrap();
        assert_eq!(ctx.step_trace, vec!["a", "b"]);
    }

    #[test]
    fn failure_stops_the_list_and_populates_the_error_trace() {
        let steps = vec![step("a", false, || StepRun::Fail(CoreError::Internal("boom".into()))),
                         step("b", false, || StepRun::Continue)];
        let mut ctx = RunContext::new("t");
        let err = run_step_list(&steps, &mut ctx).unwrap_err();
        assert_eq!(err, CoreError::Internal("boom".into()));
        assert_eq!(ctx.error_trace.get("a"), Some(&CoreError::Internal("boom".into())));
        assert!(!ctx.params.contains("b"), "el step posterior no debe ejecutarse");
    }

    #[test]
    fn ignore_error_records_but_continues() {
        let steps = vec![step("a", true, || StepRun::Fail(CoreError::Internal("boom".into()))),
                         step("b", false, || StepRun::Continue)];
        let mut ctx = RunContext::new("t");
        run_step_list(&steps, &mut ctx).unwrap();
        assert!(ctx.error_trace.contains_key("a"));
        assert!(ctx.params.contains("b"));
    }

    #[test]
    fn break_terminates_without_error() {
        let steps = vec![step("a", false, || StepRun::Break),
                         step("b", false, || StepRun::Continue)];
        let mut ctx = RunContext::new("t");
        run_step_list(&steps, &mut ctx).unwrap();
        assert!(ctx.error_trace.is_empty());
        assert!(!ctx.params.contains("b"));
    }
}
