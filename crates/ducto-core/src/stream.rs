//! `ResultStreamBuffer`: adapta un cursor de filas a sub-pipelines por lotes.
//!
//! Convierte un resultado potencialmente ilimitado en invocaciones de
//! sub-pipeline con memoria acotada: cada fila entrante se acumula hasta el
//! fetch size configurado; al llenarse, el lote se publica en el contexto
//! bajo un nombre de parámetro fijo y el `IterationGroup` ligado se ejecuta
//! con ese lote como entrada; después el buffer se vacía.

use serde_json::Value;

use crate::constants::STREAM_BATCH_PARAM;
use crate::context::RunContext;
use crate::errors::CoreError;
use crate::step::{IterationGroup, Step, StepRun};

pub struct ResultStreamBuffer {
    fetch_size: usize,
    buffer: Vec<Value>,
    group: IterationGroup,
}

impl ResultStreamBuffer {
    /// Liga el buffer a su sub-pipeline. El nombre del parámetro de entrada
    /// del grupo se fuerza a `STREAM_BATCH_PARAM`: el grupo siempre lee el
    /// lote que este buffer publica.
    pub fn new(fetch_size: usize, mut group: IterationGroup) -> Self {
        group.set_input_param(STREAM_BATCH_PARAM);
        Self { fetch_size: fetch_size.max(1),
               buffer: Vec::new(),
               group }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Acumula una fila; al alcanzar el fetch size, flushea.
    ///
    /// Llenar más allá de la capacidad sin flush intermedio significa que el
    /// buffer no fue drenado: error de programación, falla ruidosamente en
    /// lugar de crecer en silencio.
    pub fn push(&mut self, ctx: &mut RunContext, row: Value) -> Result<(), CoreError> {
        if self.buffer.len() >= self.fetch_size {
            return Err(CoreError::StreamOverflow(self.fetch_size));
        }
        self.buffer.push(row);
        if self.buffer.len() == self.fetch_size {
            self.flush(ctx)?;
        }
        Ok(())
    }

    /// Publica el lote acumulado y ejecuta el sub-pipeline; con buffer vacío
    /// es un no-op.
    pub fn flush(&mut self, ctx: &mut RunContext) -> Result<(), CoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        ctx.params.set(STREAM_BATCH_PARAM, Value::Array(batch));
        match self.group.run(ctx) {
            StepRun::Continue | StepRun::Break => Ok(()),
            StepRun::Fail(e) => Err(e),
        }
    }

    /// Flushea el resto al agotarse el cursor.
    pub fn finish(&mut self, ctx: &mut RunContext) -> Result<(), CoreError> {
        self.flush(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    /// Cuenta los flushes y el total de filas vistas por el sub-pipeline.
    struct TallyStep;

    impl Step for TallyStep {
        fn id(&self) -> &str {
            "tally"
        }
        fn run(&self, ctx: &mut RunContext) -> StepRun {
            let batch = match ctx.params.require("row") {
                Ok(v) => v.clone(),
                Err(e) => return StepRun::Fail(e),
            };
            let flushes = ctx.params.get("flushes").and_then(|v| v.as_i64()).unwrap_or(0);
            ctx.params.set("flushes", json!(flushes + 1));
            let rows = ctx.params.get("rows_seen").and_then(|v| v.as_i64()).unwrap_or(0);
            let n = if batch.is_array() { batch.as_array().unwrap().len() as i64 } else { 1 };
            ctx.params.set("rows_seen", json!(rows + n));
            StepRun::Continue
        }
    }

    fn buffer(fetch: usize) -> ResultStreamBuffer {
        // El grupo declara otro input; el buffer debe forzarlo al suyo.
        let group = IterationGroup::new("sub", "ignored", "row").add_step(Arc::new(TallyStep));
        ResultStreamBuffer::new(fetch, group)
    }

    #[test]
    fn exactly_fetch_size_rows_trigger_one_flush() {
        let mut b = buffer(3);
        let mut ctx = RunContext::new("t");
        for i in 0..3 {
            b.push(&mut ctx, json!(i)).unwrap();
        }
        assert!(b.is_empty(), "el flush debe vaciar el buffer");
        // 3 elementos en un lote → el grupo corre una vez por elemento
        assert_eq!(ctx.params.get_i64("rows_seen").unwrap(), 3);
        b.finish(&mut ctx).unwrap();
        assert_eq!(ctx.params.get_i64("rows_seen").unwrap(), 3, "finish con buffer vacío es no-op");
    }

    #[test]
    fn one_extra_row_stays_buffered_until_finish() {
        let mut b = buffer(3);
        let mut ctx = RunContext::new("t");
        for i in 0..4 {
            b.push(&mut ctx, json!(i)).unwrap();
        }
        assert_eq!(b.len(), 1);
        assert_eq!(ctx.params.get_i64("rows_seen").unwrap(), 3);
        b.finish(&mut ctx).unwrap();
        assert!(b.is_empty());
        assert_eq!(ctx.params.get_i64("rows_seen").unwrap(), 4);
    }
}
