//! Definiciones relacionadas a Steps.
//!
//! Un Step es la unidad de trabajo de un pipeline: una operación sobre el
//! `RunContext` del run en curso. Este módulo define:
//! - `Step`: interfaz neutral consumida por el runner.
//! - `StepRun`: resultado etiquetado que separa control de flujo
//!   (`Continue`/`Break`) de fallo genuino (`Fail`).
//! - `ErrorHandler`: handler de errores declarativo (interfaz o grupo de
//!   iteración).
//! - `runner`: ejecución ordenada de listas de steps.
//! - `IterationGroup`: step compuesto que itera una colección.

pub mod iteration;
pub mod runner;

use crate::context::RunContext;
use crate::errors::CoreError;

pub use iteration::{IsolationPolicy, IterationGroup};
pub use runner::{dispatch_error_handlers, run_step_list};

/// Resultado etiquetado de ejecutar un step.
///
/// `Break` corta la lista que lo contiene sin señalar fallo; `Fail` es un
/// fallo genuino. El control de flujo nunca viaja como error.
#[derive(Debug)]
pub enum StepRun {
    Continue,
    Break,
    Fail(CoreError),
}

impl StepRun {
    /// Adapta un `Result` de operación a un resultado de step.
    pub fn from_result(r: Result<(), CoreError>) -> Self {
        match r {
            Ok(()) => StepRun::Continue,
            Err(e) => StepRun::Fail(e),
        }
    }
}

impl From<Result<(), CoreError>> for StepRun {
    fn from(r: Result<(), CoreError>) -> Self {
        StepRun::from_result(r)
    }
}

/// Unidad de trabajo de un pipeline.
///
/// Un mismo Step puede ejecutarse contra muchos `RunContext` distintos
/// (secuencial o concurrentemente): todo estado por-run pertenece al
/// contexto, nunca al step.
pub trait Step: Send + Sync {
    /// Identificador estable dentro de la interfaz.
    fn id(&self) -> &str;

    /// Nombre amigable (por defecto usa el id). Es la clave del step trace y
    /// del error trace.
    fn name(&self) -> &str {
        self.id()
    }

    /// Si es `true`, un `Fail` de este step se registra en el error trace y
    /// la lista continúa como si hubiera tenido éxito.
    fn ignore_error(&self) -> bool {
        false
    }

    /// Ejecuta la operación contra el contexto del run.
    fn run(&self, ctx: &mut RunContext) -> StepRun;
}

/// Handler de errores declarativo.
///
/// Sólo los handlers cuyo `matches` acepta el error se ejecutan, en orden de
/// declaración. El fallo de un handler se registra en log y no detiene a los
/// handlers siguientes.
pub trait ErrorHandler: Send + Sync {
    fn id(&self) -> &str;

    /// Decide si este handler aplica al error dado.
    fn matches(&self, error: &CoreError) -> bool;

    /// Acción de recuperación/registro para el error.
    fn handle(&self, ctx: &mut RunContext, error: &CoreError) -> Result<(), CoreError>;
}
