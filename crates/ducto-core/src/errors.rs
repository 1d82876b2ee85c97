//! Errores del core y su clasificación.
//!
//! Taxonomía:
//! - Errores de configuración: cableado defectuoso de la interfaz; fatales
//!   para la operación en curso, nunca se reintentan.
//! - Errores de backend: propagados por el backend SQL o por un step.
//! - Errores transaccionales: commit/rollback fallidos.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreError {
    #[error("work queue exhausted for interface '{interface}' after {consumed} items")]
    QueueExhausted { interface: String, consumed: usize },
    #[error("duplicate resource name '{0}'")] DuplicateResource(String),
    #[error("unknown resource '{0}'")] UnknownResource(String),
    #[error("resource '{0}' declared without a connection provider")] MissingBackend(String),
    #[error("resource name must not be empty")] EmptyResourceName,
    #[error("grouped transaction already active for resource '{0}'")] GroupAlreadyActive(String),
    #[error("empty step list for interface '{0}'")] EmptyStepList(String),
    #[error("missing parameter '{0}'")] MissingParam(String),
    #[error("parameter '{param}' has type {found}, expected {expected}")]
    ParamTypeMismatch { param: String, expected: String, found: String },
    #[error("result buffer overflow (capacity {0} rows, buffer not drained)")] StreamOverflow(usize),
    #[error("backend error on resource '{resource}' operation '{operation}': {message}")]
    Backend { resource: String, operation: String, message: String },
    #[error("commit failed on resource '{resource}': {message}")]
    CommitFailed { resource: String, message: String },
    #[error("rollback failed on resource '{resource}': {message}")]
    RollbackFailed { resource: String, message: String },
    #[error("internal: {0}")] Internal(String),
}

/// Clase de error para diagnóstico y políticas de reintento externas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Defecto de cableado/configuración. No reintentar.
    Validation,
    /// Fallo de ejecución (backend o step).
    Runtime,
    /// Fallo probablemente transitorio (conexión, timeout).
    Transient,
    /// Fallo permanente del motor.
    Permanent,
}

/// Clasifica un `CoreError` en su `ErrorClass`.
///
/// La detección de transitorios sobre el mensaje es best-effort, igual que
/// hace la capa de persistencia con los errores del driver.
pub fn classify_error(e: &CoreError) -> ErrorClass {
    match e {
        CoreError::QueueExhausted { .. }
        | CoreError::DuplicateResource(_)
        | CoreError::UnknownResource(_)
        | CoreError::MissingBackend(_)
        | CoreError::EmptyResourceName
        | CoreError::GroupAlreadyActive(_)
        | CoreError::EmptyStepList(_)
        | CoreError::MissingParam(_)
        | CoreError::ParamTypeMismatch { .. }
        | CoreError::StreamOverflow(_) => ErrorClass::Validation,
        CoreError::Backend { message, .. }
        | CoreError::CommitFailed { message, .. }
        | CoreError::RollbackFailed { message, .. } => {
            let m = message.to_lowercase();
            if m.contains("timeout") || m.contains("connection") || m.contains("deadlock") {
                ErrorClass::Transient
            } else {
                ErrorClass::Runtime
            }
        }
        CoreError::Internal(_) => ErrorClass::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_classify_as_validation() {
        let e = CoreError::QueueExhausted { interface: "i".into(), consumed: 3 };
        assert_eq!(classify_error(&e), ErrorClass::Validation);
        assert_eq!(classify_error(&CoreError::DuplicateResource("db".into())),
                   ErrorClass::Validation);
    }

    #[test]
    fn backend_errors_classify_by_message() {
        let runtime = CoreError::Backend { resource: "db".into(),
                                           operation: "sel".into(),
                                           message: "syntax error".into() };
        assert_eq!(classify_error(&runtime), ErrorClass::Runtime);

        let transient = CoreError::Backend { resource: "db".into(),
                                             operation: "sel".into(),
                                             message: "connection refused".into() };
        assert_eq!(classify_error(&transient), ErrorClass::Transient);
    }
}
