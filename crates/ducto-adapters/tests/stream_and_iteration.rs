//! Tests de streaming por lotes e iteración con recuperación por fila.

use std::sync::Arc;

use serde_json::{json, Value};

use ducto_adapters::{InMemoryQueryBackend, LogErrorHandler, StreamQueryStep};
use ducto_core::{InterfaceDefinition, InterfaceEngine, IterationGroup, ParamBag, QueryBackend, RegistryBuilder,
                 ResourceDecl, ResourceRegistry, RunContext, RunStatus, Step, StepRun, WorkItem};

fn registry_with(backend: Arc<InMemoryQueryBackend>) -> Arc<ResourceRegistry> {
    let mut b = RegistryBuilder::new();
    b.register(ResourceDecl::new("db", backend as Arc<dyn QueryBackend>)).expect("register");
    Arc::new(b.build())
}

/// Cuenta elementos procesados y falla en el id configurado como veneno.
struct CountRowStep {
    poison_id: Option<i64>,
}

impl Step for CountRowStep {
    fn id(&self) -> &str {
        "count_row"
    }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        let row = match ctx.params.require("row") {
            Ok(v) => v.clone(),
            Err(e) => return StepRun::Fail(e),
        };
        let seen = ctx.params.get("rows_seen").and_then(|v| v.as_i64()).unwrap_or(0);
        ctx.params.set("rows_seen", json!(seen + 1));
        if let (Some(poison), Some(id)) = (self.poison_id, row.get("id").and_then(Value::as_i64)) {
            if poison == id {
                return StepRun::Fail(ducto_core::CoreError::Internal(format!("poison row {id}")));
            }
        }
        StepRun::Continue
    }
}

fn dataset(n: i64) -> Vec<Value> {
    (1..=n).map(|i| json!({"id": i})).collect()
}

#[test]
fn exact_fetch_size_rows_drain_in_one_flush() {
    let backend = Arc::new(InMemoryQueryBackend::new("db").with_dataset("SEL_ROWS", dataset(4)));
    let registry = registry_with(backend);

    let group = IterationGroup::new("per_batch", "unused", "row").add_step(Arc::new(CountRowStep { poison_id: None }));
    let def = InterfaceDefinition::new("streamed")
        .queue_work(WorkItem::new("db", "SEL_ROWS"))
        .add_step(Arc::new(StreamQueryStep::new("stream", registry.clone(), 4, group)));
    let mut engine = InterfaceEngine::new(registry);
    engine.register_interface(def).expect("register");

    let report = engine.run("streamed", ParamBag::new()).expect("run");
    assert!(report.is_ok(), "error: {:?}", report.error);
    assert_eq!(report.context.params.get_i64("rows_seen").unwrap(), 4);
}

#[test]
fn remainder_rows_flush_on_finish() {
    // fetch 3 sobre 5 filas: flush lleno (3) + resto (2) al agotar el cursor
    let backend = Arc::new(InMemoryQueryBackend::new("db").with_dataset("SEL_ROWS", dataset(5)));
    let registry = registry_with(backend);

    let group = IterationGroup::new("per_batch", "unused", "row").add_step(Arc::new(CountRowStep { poison_id: None }));
    let def = InterfaceDefinition::new("streamed")
        .queue_work(WorkItem::new("db", "SEL_ROWS"))
        .add_step(Arc::new(StreamQueryStep::new("stream", registry.clone(), 3, group)));
    let mut engine = InterfaceEngine::new(registry);
    engine.register_interface(def).expect("register");

    let report = engine.run("streamed", ParamBag::new()).expect("run");
    assert!(report.is_ok(), "error: {:?}", report.error);
    assert_eq!(report.context.params.get_i64("rows_seen").unwrap(), 5);
}

#[test]
fn poison_row_is_handled_and_the_stream_completes() {
    let backend = Arc::new(InMemoryQueryBackend::new("db").with_dataset("SEL_ROWS", dataset(3)));
    let registry = registry_with(backend);

    let group = IterationGroup::new("per_batch", "unused", "row")
        .add_step(Arc::new(CountRowStep { poison_id: Some(2) }))
        .add_error_handler(Arc::new(LogErrorHandler::new("row_errors")));
    let def = InterfaceDefinition::new("streamed")
        .queue_work(WorkItem::new("db", "SEL_ROWS"))
        .add_step(Arc::new(StreamQueryStep::new("stream", registry.clone(), 2, group)));
    let mut engine = InterfaceEngine::new(registry);
    engine.register_interface(def).expect("register");

    let report = engine.run("streamed", ParamBag::new()).expect("run");
    assert!(report.is_ok(), "la fila envenenada no aborta el stream: {:?}", report.error);
    assert_eq!(report.context.status, RunStatus::Completed);
    // Las 3 filas se intentaron y exactamente un error fue despachado
    assert_eq!(report.context.params.get_i64("rows_seen").unwrap(), 3);
    let handled = report.context.params.get_array("handled_errors").expect("handled_errors");
    assert_eq!(handled.len(), 1);
}

#[test]
fn streaming_inside_a_group_reuses_its_handle() {
    use ducto_adapters::{BeginGroupStep, CommitStep};

    let backend = Arc::new(InMemoryQueryBackend::new("db").with_dataset("SEL_ROWS", dataset(2)));
    let registry = registry_with(backend.clone());

    let group = IterationGroup::new("per_batch", "unused", "row").add_step(Arc::new(CountRowStep { poison_id: None }));
    let def = InterfaceDefinition::new("streamed")
        .queue_work(WorkItem::new("db", "SEL_ROWS"))
        .add_step(Arc::new(BeginGroupStep::new("begin", registry.clone(), "db")))
        .add_step(Arc::new(StreamQueryStep::new("stream", registry.clone(), 2, group)))
        .add_step(Arc::new(CommitStep::new("commit", registry.clone(), "db")));
    let mut engine = InterfaceEngine::new(registry);
    engine.register_interface(def).expect("register");

    let report = engine.run("streamed", ParamBag::new()).expect("run");
    assert!(report.is_ok(), "error: {:?}", report.error);
    assert_eq!(backend.begun(), 1, "la lectura participa del grupo activo");
    assert!(backend.journal().iter().any(|l| l == "select SEL_ROWS tx=1"),
            "journal: {:?}",
            backend.journal());
}
