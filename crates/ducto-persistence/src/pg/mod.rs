//! `PgQueryBackend`: implementación Postgres (Diesel) del contrato del core.
//!
//! Decisiones de diseño:
//! - El SQL es dinámico (viene del catálogo), así que no se usa el DSL
//!   tipado de Diesel sino `sql_query` con binds posicionales construidos en
//!   runtime (`BoxedSqlQuery`).
//! - Las filas de una lectura son de forma desconocida en compilación: cada
//!   query de lectura se envuelve en `SELECT row_to_json(q)::jsonb AS row
//!   FROM (...) q` y se decodifica a `serde_json::Value`.
//! - La demarcación es manual: `begin` fija una conexión del pool en un slot
//!   interno bajo un token opaco (`TxHandle`), ejecuta `BEGIN` y aplica
//!   `SET LOCAL statement_timeout` si el caller pidió timeout; commit y
//!   rollback liberan el slot (la conexión vuelve al pool al soltarse).
//! - Este backend no posee esquema propio: opera sobre los esquemas de los
//!   recursos integrados, por eso no hay migraciones aquí.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;

use ducto_core::errors::CoreError;
use ducto_core::txn::{BatchResult, QueryBackend, TxHandle};

use crate::catalog::{render_positional, OperationCatalog};
use crate::error::PersistenceError;

/// Alias del pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Conexión obtenida del pool (implementa `Connection` vía diesel::r2d2).
type PooledPg = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// factorear en tests unitarios sin acoplar a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Obtiene una conexión lista para ejecutar consultas Diesel.
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación de provider a partir de un pool r2d2.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Fila única de las lecturas dinámicas: el JSON completo de la fila.
/// (`row` a secas es palabra reservada en Postgres, de ahí el alias.)
#[derive(QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    row_json: Value,
}

/// Anexa un bind posicional según el tipo JSON del valor.
fn bind_value(q: BoxedSqlQuery<'static, Pg, SqlQuery>, v: &Value) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    use diesel::sql_types::{BigInt, Bool, Double, Jsonb, Nullable, Text};
    match v {
        Value::Null => q.bind::<Nullable<Text>, _>(None::<String>),
        Value::Bool(b) => q.bind::<Bool, _>(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind::<BigInt, _>(i)
            } else {
                q.bind::<Double, _>(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => q.bind::<Text, _>(s.clone()),
        other => q.bind::<Jsonb, _>(other.clone()),
    }
}

/// Backend Postgres sobre un `ConnectionProvider` y un catálogo de
/// operaciones. Seguro para uso concurrente: los slots transaccionales van
/// detrás de un mutex y cada transacción fija su propia conexión.
pub struct PgQueryBackend<P: ConnectionProvider> {
    label: String,
    provider: P,
    catalog: OperationCatalog,
    slots: Mutex<HashMap<u64, PooledPg>>,
    next_token: AtomicU64,
}

impl<P: ConnectionProvider> PgQueryBackend<P> {
    /// `label` es el nombre bajo el que el recurso se registra: sólo se usa
    /// para construir errores diagnosticables.
    pub fn new(label: impl Into<String>, provider: P, catalog: OperationCatalog) -> Self {
        Self { label: label.into(),
               provider,
               catalog,
               slots: Mutex::new(HashMap::new()),
               next_token: AtomicU64::new(1) }
    }

    fn core_err(&self, operation: &str, e: PersistenceError) -> CoreError {
        CoreError::Backend { resource: self.label.clone(),
                             operation: operation.to_string(),
                             message: e.to_string() }
    }

    /// Ejecuta `f` sobre la conexión correcta: el slot de la transacción si
    /// hay handle, una conexión fresca del pool si no.
    fn with_conn<T>(&self,
                    tx: Option<&TxHandle>,
                    f: impl FnOnce(&mut PooledPg) -> Result<T, PersistenceError>)
                    -> Result<T, PersistenceError> {
        match tx {
            Some(handle) => {
                let mut slots = self.slots
                                    .lock()
                                    .map_err(|_| PersistenceError::TransientIo("tx slot lock poisoned".into()))?;
                let conn = slots.get_mut(&handle.token)
                                .ok_or(PersistenceError::UnknownTxToken(handle.token))?;
                f(conn)
            }
            None => {
                let mut conn = self.provider.connection()?;
                f(&mut conn)
            }
        }
    }

    fn read_rows(&self, tx: Option<&TxHandle>, operation: &str, params: &Value) -> Result<Vec<Value>, PersistenceError> {
        let op = self.catalog.get(operation)?;
        let (sql, binds) = render_positional(operation, &op.sql, params)?;
        let wrapped = format!("SELECT row_to_json(q)::jsonb AS row_json FROM ({sql}) q");
        debug!("{}: read '{}' binds={}", self.label, operation, binds.len());
        let mut query = diesel::sql_query(wrapped).into_boxed::<Pg>();
        for b in &binds {
            query = bind_value(query, b);
        }
        let rows: Vec<JsonRow> = self.with_conn(tx, |conn| query.load(conn).map_err(PersistenceError::from))?;
        Ok(rows.into_iter().map(|r| r.row_json).collect())
    }
}

impl<P: ConnectionProvider> QueryBackend for PgQueryBackend<P> {
    fn select(&self, tx: Option<&TxHandle>, operation: &str, params: &Value) -> Result<Vec<Value>, CoreError> {
        self.read_rows(tx, operation, params).map_err(|e| self.core_err(operation, e))
    }

    fn flush_batch(&self, tx: Option<&TxHandle>, operation: &str, rows: &[Value]) -> Result<Vec<BatchResult>, CoreError> {
        let op = self.catalog.get(operation).map_err(|e| self.core_err(operation, e))?;
        debug!("{}: flush '{}' rows={}", self.label, operation, rows.len());
        let result = self.with_conn(tx, |conn| {
                             let mut counts = Vec::with_capacity(rows.len());
                             for row_params in rows {
                                 let (sql, binds) = render_positional(operation, &op.sql, row_params)?;
                                 let mut query = diesel::sql_query(sql).into_boxed::<Pg>();
                                 for b in &binds {
                                     query = bind_value(query, b);
                                 }
                                 let affected = query.execute(conn).map_err(PersistenceError::from)?;
                                 counts.push(affected as i64);
                             }
                             Ok(vec![BatchResult { update_counts: counts }])
                         });
        result.map_err(|e| self.core_err(operation, e))
    }

    fn call(&self, tx: Option<&TxHandle>, operation: &str, params: &Value) -> Result<Vec<Value>, CoreError> {
        // Una llamada a procedimiento se declara en el catálogo como
        // `SELECT * FROM fn(:a, :b)`: mismo camino de lectura dinámica.
        self.read_rows(tx, operation, params).map_err(|e| self.core_err(operation, e))
    }

    fn begin(&self, timeout_secs: Option<u64>) -> Result<TxHandle, CoreError> {
        let inner = || -> Result<TxHandle, PersistenceError> {
            let mut conn = self.provider.connection()?;
            diesel::sql_query("BEGIN").execute(&mut conn).map_err(PersistenceError::from)?;
            if let Some(secs) = timeout_secs {
                let ms = secs.saturating_mul(1000);
                diesel::sql_query(format!("SET LOCAL statement_timeout = {ms}")).execute(&mut conn)
                                                                                .map_err(PersistenceError::from)?;
            }
            let token = self.next_token.fetch_add(1, Ordering::Relaxed);
            self.slots
                .lock()
                .map_err(|_| PersistenceError::TransientIo("tx slot lock poisoned".into()))?
                .insert(token, conn);
            debug!("{}: begin token={} timeout={:?}", self.label, token, timeout_secs);
            Ok(TxHandle { token })
        };
        inner().map_err(|e| self.core_err("begin", e))
    }

    fn commit(&self, tx: &TxHandle) -> Result<(), CoreError> {
        let inner = || -> Result<(), PersistenceError> {
            let mut conn = self.slots
                               .lock()
                               .map_err(|_| PersistenceError::TransientIo("tx slot lock poisoned".into()))?
                               .remove(&tx.token)
                               .ok_or(PersistenceError::UnknownTxToken(tx.token))?;
            diesel::sql_query("COMMIT").execute(&mut conn).map_err(PersistenceError::from)?;
            debug!("{}: commit token={}", self.label, tx.token);
            Ok(())
        };
        inner().map_err(|e| self.core_err("commit", e))
    }

    fn rollback(&self, tx: &TxHandle) -> Result<(), CoreError> {
        let inner = || -> Result<(), PersistenceError> {
            let mut conn = self.slots
                               .lock()
                               .map_err(|_| PersistenceError::TransientIo("tx slot lock poisoned".into()))?
                               .remove(&tx.token)
                               .ok_or(PersistenceError::UnknownTxToken(tx.token))?;
            diesel::sql_query("ROLLBACK").execute(&mut conn).map_err(PersistenceError::from)?;
            debug!("{}: rollback token={}", self.label, tx.token);
            Ok(())
        };
        inner().map_err(|e| self.core_err("rollback", e))
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// Valida y ajusta tamaños (si `min_size > max_size`, usa `min = max`). A
/// diferencia del resto de la plataforma, aquí no se corren migraciones: el
/// backend opera sobre esquemas ajenos.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("pool min_size > max_size ({validated_min} > {validated_max}), usando min = max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder().min_idle(Some(final_min))
                         .max_size(validated_max)
                         .build(manager)
                         .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))
}

/// Helper de desarrollo: carga `.env`, lee la configuración y construye el
/// pool.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
