use std::sync::Arc;

use serde_json::{json, Value};

use ducto_adapters::{BatchWriteStep, BeginGroupStep, CommitStep, InMemoryQueryBackend, LogErrorHandler,
                     SelectStep, WriteMode};
use ducto_core::{InterfaceDefinition, InterfaceEngine, IterationGroup, ParamBag, QueryBackend, RegistryBuilder,
                 ResourceConfig, ResourceDecl, ResourceRegistry, RunContext, Step, StepRun, WorkItem};

/// Transforma la fila ligada como "customer" y la acumula en "outbox".
struct MapCustomerStep;

impl Step for MapCustomerStep {
    fn id(&self) -> &str { "map_customer" }
    fn run(&self, ctx: &mut RunContext) -> StepRun {
        let customer = match ctx.params.require("customer") {
            Ok(v) => v.clone(),
            Err(e) => return StepRun::Fail(e),
        };
        let name = customer.get("name").and_then(|v| v.as_str()).unwrap_or("").to_uppercase();
        let id = customer.get("id").cloned().unwrap_or(Value::Null);
        let mut outbox = ctx.params.get("outbox").and_then(|v| v.as_array().cloned()).unwrap_or_default();
        outbox.push(json!({ "id": id, "name": name }));
        ctx.params.set("outbox", Value::Array(outbox));
        StepRun::Continue
    }
}

/// Demo autocontenida contra el backend en memoria: grupo transaccional,
/// lectura, iteración por fila y escritura batch confirmada al final.
fn run_demo() -> i32 {
    let backend = Arc::new(InMemoryQueryBackend::new("crm").with_dataset("SEL_CUSTOMERS",
                                                                         vec![json!({"id": 1, "name": "ada"}),
                                                                              json!({"id": 2, "name": "grace"}),
                                                                              json!({"id": 3, "name": "linus"})]));
    let mut builder = RegistryBuilder::new();
    let decl = ResourceDecl::new("crm", backend.clone() as Arc<dyn QueryBackend>)
        .with_config(ResourceConfig { timeout_secs: Some(30), batch_chunk_size: 2 });
    if let Err(e) = builder.register(decl) {
        eprintln!("[ducto demo] registry error: {e}");
        return 5;
    }
    let registry: Arc<ResourceRegistry> = Arc::new(builder.build());

    let per_row = IterationGroup::new("map_customers", "customers", "customer")
        .add_step(Arc::new(MapCustomerStep))
        .add_error_handler(Arc::new(LogErrorHandler::new("row_errors")));

    let def = InterfaceDefinition::new("sync_customers")
        .queue_work(WorkItem::new("crm", "SEL_CUSTOMERS"))
        .queue_work(WorkItem::new("crm", "INS_TARGET"))
        .add_step(Arc::new(BeginGroupStep::new("begin", registry.clone(), "crm")))
        .add_step(Arc::new(SelectStep::new("fetch", registry.clone(), "customers")))
        .add_step(Arc::new(per_row))
        .add_step(Arc::new(BatchWriteStep::new("write", registry.clone(), "outbox", WriteMode::Insert)
                               .with_count_param("written")))
        .add_step(Arc::new(CommitStep::new("commit", registry.clone(), "crm")));

    let mut engine = InterfaceEngine::new(registry);
    if let Err(e) = engine.register_interface(def) {
        eprintln!("[ducto demo] interface error: {e}");
        return 5;
    }

    let report = match engine.run("sync_customers", ParamBag::new()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[ducto demo] run error: {e}");
            return 5;
        }
    };

    println!("run {} -> {:?}", report.context.run_id, report.context.status);
    println!("steps: {}", report.context.step_trace_string());
    println!("written: {}", report.context.params.get_i64("written").unwrap_or(0));
    println!("backend journal:");
    for line in backend.journal() {
        println!("  {line}");
    }
    if let Some(e) = report.error {
        eprintln!("[ducto demo] failed: {e}");
        return 4;
    }
    0
}

/// Sonda mínima contra Postgres: requiere DATABASE_URL y ejecuta una lectura
/// trivial del catálogo a través del coordinador.
fn run_pg_probe() -> i32 {
    let _ = dotenvy::dotenv();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[ducto pg-probe] requiere DATABASE_URL");
        return 4;
    }
    let pool = match ducto_persistence::build_dev_pool_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[ducto pg-probe] pool error: {e}");
            return 5;
        }
    };
    let mut catalog = ducto_persistence::OperationCatalog::new();
    if let Err(e) = catalog.register("SEL_PROBE", "SELECT 1 AS one, current_database() AS db") {
        eprintln!("[ducto pg-probe] catalog error: {e}");
        return 5;
    }
    let backend = Arc::new(ducto_persistence::PgQueryBackend::new("pg",
                                                                  ducto_persistence::PoolProvider { pool },
                                                                  catalog));
    let mut builder = RegistryBuilder::new();
    if let Err(e) = builder.register(ResourceDecl::new("pg", backend as Arc<dyn QueryBackend>)) {
        eprintln!("[ducto pg-probe] registry error: {e}");
        return 5;
    }
    let registry = Arc::new(builder.build());

    let def = InterfaceDefinition::new("pg_probe")
        .queue_work(WorkItem::new("pg", "SEL_PROBE"))
        .add_step(Arc::new(SelectStep::new("probe", registry.clone(), "probe_rows")));

    let mut engine = InterfaceEngine::new(registry);
    if let Err(e) = engine.register_interface(def) {
        eprintln!("[ducto pg-probe] interface error: {e}");
        return 5;
    }
    match engine.run("pg_probe", ParamBag::new()) {
        Ok(report) if report.is_ok() => {
            println!("probe rows: {:?}", report.context.params.get("probe_rows"));
            0
        }
        Ok(report) => {
            eprintln!("[ducto pg-probe] failed: {:?}", report.error);
            4
        }
        Err(e) => {
            eprintln!("[ducto pg-probe] error: {e}");
            5
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let code = match args.get(1).map(|s| s.as_str()) {
        None | Some("demo") => run_demo(),
        Some("pg-probe") => run_pg_probe(),
        Some(other) => {
            eprintln!("Uso: ducto-cli [demo|pg-probe] (comando desconocido: {other})");
            2
        }
    };
    std::process::exit(code);
}
