//! Tests de integración contra Postgres real.
//!
//! Requieren `DATABASE_URL`; sin ella se saltan con aviso (mismo criterio
//! que el resto de la plataforma para tests de integración de DB).

use serde_json::{json, Value};

use ducto_core::txn::QueryBackend;
use ducto_persistence::{build_dev_pool_from_env, OperationCatalog, PgQueryBackend, PoolProvider};

fn backend_or_skip(catalog: OperationCatalog) -> Option<PgQueryBackend<PoolProvider>> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping Postgres integration test: DATABASE_URL not set");
        return None;
    }
    let pool = build_dev_pool_from_env().expect("pool");
    Some(PgQueryBackend::new("pg", PoolProvider { pool }, catalog))
}

#[test]
fn select_decodes_dynamic_rows_as_json() {
    let mut catalog = OperationCatalog::new();
    catalog.register("SEL_ONE", "SELECT 1 AS one, 'x' AS tag").expect("catalog");
    let Some(backend) = backend_or_skip(catalog) else { return };

    let rows = backend.select(None, "SEL_ONE", &Value::Null).expect("select");
    assert_eq!(rows, vec![json!({"one": 1, "tag": "x"})]);
}

#[test]
fn named_binds_render_to_positional_parameters() {
    let mut catalog = OperationCatalog::new();
    catalog.register("SEL_ECHO", "SELECT :msg AS msg, (:n)::bigint + 1 AS next").expect("catalog");
    let Some(backend) = backend_or_skip(catalog) else { return };

    let rows = backend.select(None, "SEL_ECHO", &json!({"msg": "hola", "n": 41})).expect("select");
    assert_eq!(rows, vec![json!({"msg": "hola", "next": 42})]);
}

#[test]
fn unknown_operation_is_a_backend_error() {
    let Some(backend) = backend_or_skip(OperationCatalog::new()) else { return };
    let err = backend.select(None, "NOPE", &Value::Null).unwrap_err();
    assert!(err.to_string().contains("unknown operation"), "error: {err}");
}

#[test]
fn transaction_slots_pin_one_connection() {
    // Una tabla temporal sólo es visible en la sesión que la creó: si las
    // operaciones del handle no compartieran conexión, el INSERT fallaría.
    let mut catalog = OperationCatalog::new();
    catalog.register("DDL_TMP", "CREATE TEMP TABLE ducto_txn_probe (x int)").expect("catalog");
    catalog.register("INS_TMP", "INSERT INTO ducto_txn_probe (x) VALUES (:x)").expect("catalog");
    catalog.register("SEL_TMP", "SELECT count(*) AS n FROM ducto_txn_probe").expect("catalog");
    let Some(backend) = backend_or_skip(catalog) else { return };

    let tx = backend.begin(Some(30)).expect("begin");
    backend.flush_batch(Some(&tx), "DDL_TMP", &[Value::Null]).expect("create temp table");
    let results = backend.flush_batch(Some(&tx),
                                      "INS_TMP",
                                      &[json!({"x": 1}), json!({"x": 2})])
                         .expect("insert");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].update_counts, vec![1, 1]);

    let rows = backend.select(Some(&tx), "SEL_TMP", &Value::Null).expect("count");
    assert_eq!(rows, vec![json!({"n": 2})]);

    backend.rollback(&tx).expect("rollback");
    // El token ya no es válido tras cerrar
    assert!(backend.select(Some(&tx), "SEL_TMP", &Value::Null).is_err());
}
