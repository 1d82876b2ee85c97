//! Binario de arranque: corre una interfaz de ejemplo contra el backend en
//! memoria. Con el feature `pg_demo`, además sondea el backend Postgres.

use std::sync::Arc;

use serde_json::json;

use ducto_adapters::{InMemoryQueryBackend, SelectStep, StopStep};
use ducto_core::{InterfaceDefinition, InterfaceEngine, ParamBag, QueryBackend, RegistryBuilder, ResourceDecl,
                 ResourceRegistry, WorkItem};

fn main() {
    // Cargar .env si existe (DATABASE_URL para el camino pg_demo)
    let _ = dotenvy::dotenv();

    let backend = Arc::new(InMemoryQueryBackend::new("demo").with_dataset("SEL_PING",
                                                                          vec![json!({"ping": "pong"})]));
    let mut builder = RegistryBuilder::new();
    if let Err(e) = builder.register(ResourceDecl::new("demo", backend as Arc<dyn QueryBackend>)) {
        eprintln!("registry error: {e}");
        std::process::exit(5);
    }
    let registry: Arc<ResourceRegistry> = Arc::new(builder.build());

    let def = InterfaceDefinition::new("ping")
        .queue_work(WorkItem::new("demo", "SEL_PING"))
        .add_step(Arc::new(SelectStep::new("ping", registry.clone(), "rows")))
        .add_step(Arc::new(StopStep::new("done")));

    let mut engine = InterfaceEngine::new(registry);
    if let Err(e) = engine.register_interface(def) {
        eprintln!("interface error: {e}");
        std::process::exit(5);
    }
    match engine.run("ping", ParamBag::new()) {
        Ok(report) => {
            println!("{} -> {:?}: {:?}",
                     report.context.interface,
                     report.context.status,
                     report.context.params.get("rows"));
        }
        Err(e) => {
            eprintln!("run error: {e}");
            std::process::exit(5);
        }
    }

    #[cfg(feature = "pg_demo")]
    pg_demo();
}

#[cfg(feature = "pg_demo")]
fn pg_demo() {
    let pool = match ducto_persistence::build_dev_pool_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("pg_demo: pool error: {e}");
            return;
        }
    };
    let mut catalog = ducto_persistence::OperationCatalog::new();
    if let Err(e) = catalog.register("SEL_ONE", "SELECT 1 AS one") {
        eprintln!("pg_demo: catalog error: {e}");
        return;
    }
    let backend = ducto_persistence::PgQueryBackend::new("pg", ducto_persistence::PoolProvider { pool }, catalog);
    use ducto_core::QueryBackend as _;
    match backend.select(None, "SEL_ONE", &serde_json::Value::Null) {
        Ok(rows) => println!("pg_demo: {rows:?}"),
        Err(e) => eprintln!("pg_demo: {e}"),
    }
}
