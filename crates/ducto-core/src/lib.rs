//! ducto-core: núcleo de ejecución de interfaces de integración de datos
pub mod constants;
pub mod context;
pub mod engine;
pub mod errors;
pub mod interface;
pub mod model;
pub mod step;
pub mod stream;
pub mod txn;


pub use context::{RunContext, RunStatus};
pub use engine::{InterfaceEngine, RunReport};
pub use errors::{classify_error, CoreError, ErrorClass};
pub use interface::{InterfaceDefinition, InterfaceRegistry};
pub use model::{ParamBag, QueuePath, WorkItem};
pub use step::{ErrorHandler, IsolationPolicy, IterationGroup, Step, StepRun};
pub use stream::ResultStreamBuffer;
pub use txn::{BatchResult, QueryBackend, QueryExecutor, RegistryBuilder, ResourceConfig, ResourceDecl,
              ResourceRegistry, ResourceTransaction, TxHandle};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use serde_json::json;

    struct SetStep(&'static str);

    impl Step for SetStep {
        fn id(&self) -> &str { self.0 }
        fn run(&self, ctx: &mut RunContext) -> StepRun {
            ctx.params.set(self.0, json!(true));
            StepRun::Continue
        }
    }

    struct StopStep;

    impl Step for StopStep {
        fn id(&self) -> &str { "stop" }
        fn run(&self, ctx: &mut RunContext) -> StepRun {
            ctx.stop();
            StepRun::Continue
        }
    }

    #[test]
    fn short_circuit_skips_the_rest_of_the_list_without_error() {
        // a -> stop -> b : 'b' nunca corre y el run no es un fallo
        let def = InterfaceDefinition::new("smoke")
            .add_step(Arc::new(SetStep("a")))
            .add_step(Arc::new(StopStep))
            .add_step(Arc::new(SetStep("b")));
        let engine = InterfaceEngine::new(Arc::new(RegistryBuilder::new().build()));
        let report = engine.run_definition(Arc::new(def), ParamBag::new());

        assert!(report.is_ok());
        assert_eq!(report.context.status, RunStatus::ShortCircuited);
        assert!(report.context.params.contains("a"));
        assert!(!report.context.params.contains("b"));
        assert_eq!(report.context.step_trace, vec!["a", "stop"]);
    }
}
