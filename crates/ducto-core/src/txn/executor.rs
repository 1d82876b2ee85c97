//! `QueryExecutor`: decorador de demarcación transaccional por operación.
//!
//! Las cuatro operaciones de backend (select, insert batch, update/delete
//! batch y call) pasan por este decorador, que aplica las reglas de
//! demarcación de forma visible antes de tocar la conexión:
//!
//! - Sin `RunContext` (items emitidos fuera de cualquier run, p. ej. en
//!   warm-up): ejecución directa, sin demarcación.
//! - Entrada agrupada presente: reutiliza el handle abierto o abre uno
//!   (respetando el timeout) y lo guarda; el cierre es responsabilidad
//!   explícita del caller (operaciones commit/rollback de grupo).
//! - Sin agrupar: abre handle, ejecuta, commit al retornar; ante fallo,
//!   rollback + registro del error + re-lanzamiento. La entrada no agrupada
//!   se elimina del contexto tras la llamada, sea cual sea el resultado.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::context::RunContext;
use crate::errors::CoreError;
use crate::txn::backend::{QueryBackend, TxHandle};
use crate::txn::context::ResourceTransaction;
use crate::txn::registry::ResourceConfig;

/// Ejecutor ligado a un recurso registrado. Barato de clonar/crear (el
/// backend va detrás de `Arc`); seguro para uso concurrente desde runs
/// independientes.
pub struct QueryExecutor {
    resource: String,
    backend: Arc<dyn QueryBackend>,
    config: ResourceConfig,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
         .field("resource", &self.resource)
         .field("config", &self.config)
         .finish_non_exhaustive()
    }
}

impl QueryExecutor {
    pub(crate) fn new(resource: String, backend: Arc<dyn QueryBackend>, config: ResourceConfig) -> Self {
        Self { resource, backend, config }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn config(&self) -> ResourceConfig {
        self.config
    }

    // ------------------------------------------------------------------
    // Operaciones demarcadas
    // ------------------------------------------------------------------

    pub fn select(&self, ctx: Option<&mut RunContext>, operation: &str, params: &Value) -> Result<Vec<Value>, CoreError> {
        self.with_demarcation(ctx, operation, |tx| self.backend.select(tx, operation, params))
    }

    pub fn call(&self, ctx: Option<&mut RunContext>, operation: &str, params: &Value) -> Result<Vec<Value>, CoreError> {
        self.with_demarcation(ctx, operation, |tx| self.backend.call(tx, operation, params))
    }

    /// Camino batch de inserción. Ver `run_batch` para la normalización y el
    /// chunking.
    pub fn insert_batch(&self, ctx: Option<&mut RunContext>, operation: &str, input: &Value) -> Result<i64, CoreError> {
        self.run_batch(ctx, operation, input)
    }

    /// Camino batch de update/delete. Misma mecánica que la inserción; la
    /// distinción la aporta la operación declarada en el backend.
    pub fn update_or_delete_batch(&self,
                                  ctx: Option<&mut RunContext>,
                                  operation: &str,
                                  input: &Value)
                                  -> Result<i64, CoreError> {
        self.run_batch(ctx, operation, input)
    }

    // ------------------------------------------------------------------
    // Streaming (cursor → callback)
    // ------------------------------------------------------------------

    /// Prepara el handle para una lectura streaming: dentro de un grupo
    /// activo reutiliza/abre el handle del grupo; sin grupo la lectura corre
    /// sin demarcación (el cursor no abre transacción implícita).
    pub fn open_streaming(&self, ctx: &mut RunContext) -> Result<Option<TxHandle>, CoreError> {
        let grouped = ctx.transactions.get(&self.resource).map(|t| t.grouped).unwrap_or(false);
        if grouped {
            Ok(Some(self.ensure_group_handle(ctx)?))
        } else {
            Ok(None)
        }
    }

    /// Lectura cursor: entrega cada fila al callback. El caller conserva el
    /// `RunContext` para el callback (por eso el handle va por valor y no se
    /// toma el contexto aquí).
    pub fn stream(&self,
                  tx: Option<&TxHandle>,
                  operation: &str,
                  params: &Value,
                  row: &mut dyn FnMut(Value) -> Result<(), CoreError>)
                  -> Result<(), CoreError> {
        debug!("stream:start resource={} op={}", self.resource, operation);
        self.backend.select_each(tx, operation, params, row)
    }

    // ------------------------------------------------------------------
    // Ciclo de vida del grupo
    // ------------------------------------------------------------------

    /// Activa el modo agrupado para este recurso: deja una entrada
    /// placeholder (aunque aún no haya transacción física). Activarlo dos
    /// veces es error de configuración.
    pub fn enable_group(&self, ctx: &mut RunContext) -> Result<(), CoreError> {
        if let Some(t) = ctx.transactions.get(&self.resource) {
            if t.grouped {
                return Err(CoreError::GroupAlreadyActive(self.resource.clone()));
            }
        }
        let entry = ctx.transactions
                       .entry(self.resource.clone())
                       .or_insert_with(|| ResourceTransaction::new(self.resource.clone()));
        entry.grouped = true;
        if entry.timeout_secs.is_none() {
            entry.timeout_secs = self.config.timeout_secs;
        }
        debug!("enable_group resource={}", self.resource);
        Ok(())
    }

    /// Cierra el grupo con commit. Un commit fallido dispara un intento de
    /// rollback (su fallo se registra en log) y después propaga. La entrada
    /// se elimina del contexto en todos los caminos.
    pub fn commit_group(&self, ctx: &mut RunContext) -> Result<(), CoreError> {
        let Some(txn) = ctx.transactions.remove(&self.resource) else {
            debug!("commit_group: no transaction entry for '{}'", self.resource);
            return Ok(());
        };
        let Some(handle) = txn.handle else {
            // Placeholder nunca usado: nada que confirmar.
            return Ok(());
        };
        if let Err(commit_err) = self.backend.commit(&handle) {
            if let Err(rb) = self.backend.rollback(&handle) {
                warn!("rollback after failed commit also failed on '{}': {}", self.resource, rb);
            }
            return Err(CoreError::CommitFailed { resource: self.resource.clone(),
                                                 message: commit_err.to_string() });
        }
        debug!("commit_group:done resource={} history={}", self.resource, txn.history_trace());
        Ok(())
    }

    /// Cierra el grupo con rollback. El fallo del rollback se registra y se
    /// traga: nunca enmascara al error original que llevó hasta aquí.
    pub fn rollback_group(&self, ctx: &mut RunContext) {
        let Some(txn) = ctx.transactions.remove(&self.resource) else {
            return;
        };
        if let Some(handle) = txn.handle {
            if let Err(rb) = self.backend.rollback(&handle) {
                warn!("rollback_group: rollback failed on '{}': {}", self.resource, rb);
            }
        }
        debug!("rollback_group:done resource={} history={}", self.resource, txn.history_trace());
    }

    // ------------------------------------------------------------------
    // Internos
    // ------------------------------------------------------------------

    /// Handle del grupo activo, abriéndolo si aún no existe.
    fn ensure_group_handle(&self, ctx: &mut RunContext) -> Result<TxHandle, CoreError> {
        let entry = ctx.transactions
                       .get(&self.resource)
                       .ok_or_else(|| CoreError::Internal(format!("group entry missing for '{}'", self.resource)))?;
        if let Some(h) = entry.handle {
            return Ok(h);
        }
        let timeout = entry.timeout_secs.or(self.config.timeout_secs);
        let handle = self.backend.begin(timeout)?;
        debug!("begin (grouped) resource={} token={}", self.resource, handle.token);
        if let Some(t) = ctx.transactions.get_mut(&self.resource) {
            t.handle = Some(handle);
        }
        Ok(handle)
    }

    /// Aplica las reglas de demarcación alrededor de `f`.
    fn with_demarcation<T, F>(&self, ctx: Option<&mut RunContext>, operation: &str, f: F) -> Result<T, CoreError>
        where F: FnOnce(Option<&TxHandle>) -> Result<T, CoreError>
    {
        let ctx = match ctx {
            None => {
                debug!("{}:{} direct (no run context)", self.resource, operation);
                return f(None);
            }
            Some(c) => c,
        };

        let grouped = ctx.transactions.get(&self.resource).map(|t| t.grouped).unwrap_or(false);
        if grouped {
            let handle = self.ensure_group_handle(ctx)?;
            let result = f(Some(&handle));
            if let Err(e) = &result {
                if let Some(t) = ctx.transactions.get_mut(&self.resource) {
                    t.last_error = Some(e.clone());
                }
            }
            // El grupo queda abierto: cerrar es responsabilidad del caller.
            return result;
        }

        let timeout = ctx.transactions
                         .get(&self.resource)
                         .and_then(|t| t.timeout_secs)
                         .or(self.config.timeout_secs);
        let handle = self.backend.begin(timeout)?;
        debug!("begin (auto) resource={} op={} token={}", self.resource, operation, handle.token);
        let result = f(Some(&handle));
        match result {
            Ok(v) => {
                if let Err(commit_err) = self.backend.commit(&handle) {
                    if let Err(rb) = self.backend.rollback(&handle) {
                        warn!("rollback after failed commit also failed on '{}': {}", self.resource, rb);
                    }
                    ctx.transactions.remove(&self.resource);
                    return Err(CoreError::CommitFailed { resource: self.resource.clone(),
                                                         message: commit_err.to_string() });
                }
                ctx.transactions.remove(&self.resource);
                Ok(v)
            }
            Err(e) => {
                if let Err(rb) = self.backend.rollback(&handle) {
                    warn!("rollback failed on '{}' (original error preserved): {}", self.resource, rb);
                }
                ctx.transactions.remove(&self.resource);
                Err(e)
            }
        }
    }

    /// Normaliza la entrada del camino batch y ejecuta con chunking.
    ///
    /// - Fila única u lista de filas → lista.
    /// - Entrada vacía o nula → UNA invocación sin parámetros (no un no-op):
    ///   esto preserva la capacidad de correr queries sin parámetros por el
    ///   camino batch.
    /// - Chunk <= 0: todo bufferizado, un flush. Chunk N > 0: flush cada N y
    ///   resto al final. El orden de flush es el orden de inserción.
    ///
    /// Cada flush suma los conteos por-sentencia del primer resultado de
    /// batch devuelto; el total es la suma de todos los flushes.
    fn run_batch(&self, ctx: Option<&mut RunContext>, operation: &str, input: &Value) -> Result<i64, CoreError> {
        let rows = normalize_batch_input(input);
        self.with_demarcation(ctx, operation, |tx| {
            let chunk = self.config.batch_chunk_size;
            let mut total = 0i64;
            let mut buffer: Vec<Value> = Vec::new();
            for row in &rows {
                buffer.push(row.clone());
                if chunk > 0 && buffer.len() == chunk as usize {
                    total += self.flush(tx, operation, &buffer)?;
                    buffer.clear();
                }
            }
            if !buffer.is_empty() {
                total += self.flush(tx, operation, &buffer)?;
            }
            Ok(total)
        })
    }

    /// Somete el buffer y suma los conteos del primer resultado de batch.
    fn flush(&self, tx: Option<&TxHandle>, operation: &str, rows: &[Value]) -> Result<i64, CoreError> {
        let results = self.backend.flush_batch(tx, operation, rows)?;
        let affected = results.first().map(|b| b.total()).unwrap_or(0);
        debug!("flush resource={} op={} rows={} affected={}", self.resource, operation, rows.len(), affected);
        Ok(affected)
    }
}

fn normalize_batch_input(input: &Value) -> Vec<Value> {
    match input {
        Value::Null => vec![Value::Null],
        Value::Array(a) if a.is_empty() => vec![Value::Null],
        Value::Array(a) => a.clone(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_input_normalization() {
        assert_eq!(normalize_batch_input(&Value::Null), vec![Value::Null]);
        assert_eq!(normalize_batch_input(&json!([])), vec![Value::Null]);
        assert_eq!(normalize_batch_input(&json!({"a": 1})), vec![json!({"a": 1})]);
        assert_eq!(normalize_batch_input(&json!([{"a": 1}, {"a": 2}])),
                   vec![json!({"a": 1}), json!({"a": 2})]);
    }
}
