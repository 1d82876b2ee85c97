//! Catálogo de operaciones SQL con nombre.
//!
//! Una interfaz referencia operaciones por identificador; el catálogo las
//! resuelve a SQL parametrizado con placeholders `:nombre`, que aquí se
//! renderizan a binds posicionales (`$1..$n`) en orden de aparición. El
//! catálogo lo arma el cargador externo; este módulo sólo lo consume.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::PersistenceError;

/// Operación SQL declarada: identificador estable + SQL con `:binds`.
#[derive(Debug, Clone)]
pub struct SqlOperation {
    pub name: String,
    pub sql: String,
}

/// Catálogo inmutable tras el armado: operación → SQL.
#[derive(Debug, Default)]
pub struct OperationCatalog {
    ops: HashMap<String, SqlOperation>,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self { ops: HashMap::new() }
    }

    /// Registra una operación. Nombre duplicado es error de configuración.
    pub fn register(&mut self, name: impl Into<String>, sql: impl Into<String>) -> Result<(), PersistenceError> {
        let name = name.into();
        if self.ops.contains_key(&name) {
            return Err(PersistenceError::DuplicateOperation(name));
        }
        self.ops.insert(name.clone(), SqlOperation { name, sql: sql.into() });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&SqlOperation, PersistenceError> {
        self.ops.get(name).ok_or_else(|| PersistenceError::UnknownOperation(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Renderiza `:nombre` a `$n` y devuelve los valores de bind en orden de
/// aparición (un mismo nombre puede aparecer varias veces: se bindea cada
/// vez). Reglas:
/// - Se ignoran placeholders dentro de literales `'...'`.
/// - `::` (cast de Postgres) no es un placeholder.
/// - Un nombre sin valor en `params` es `MissingBind`.
pub fn render_positional(operation: &str, sql: &str, params: &Value) -> Result<(String, Vec<Value>), PersistenceError> {
    let lookup = |name: &str| -> Result<Value, PersistenceError> {
        params.as_object()
              .and_then(|m| m.get(name).cloned())
              .ok_or_else(|| PersistenceError::MissingBind { operation: operation.to_string(),
                                                             name: name.to_string() })
    };

    let mut out = String::with_capacity(sql.len());
    let mut binds: Vec<Value> = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if in_literal {
            out.push(c);
            if c == '\'' {
                in_literal = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_literal = true;
                out.push(c);
            }
            ':' => {
                // '::' es un cast, no un placeholder
                if chars.peek() == Some(&':') {
                    out.push(':');
                    out.push(':');
                    chars.next();
                    continue;
                }
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    out.push(':');
                    continue;
                }
                binds.push(lookup(&name)?);
                out.push('$');
                out.push_str(&binds.len().to_string());
            }
            _ => out.push(c),
        }
    }

    Ok((out, binds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_render_in_order_of_appearance() {
        let (sql, binds) = render_positional("op",
                                             "SELECT * FROM t WHERE a = :a AND b = :b AND a2 = :a",
                                             &json!({"a": 1, "b": "x"})).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2 AND a2 = $3");
        assert_eq!(binds, vec![json!(1), json!("x"), json!(1)]);
    }

    #[test]
    fn casts_and_literals_are_left_alone() {
        let (sql, binds) = render_positional("op",
                                             "SELECT ':not_a_bind', x::text FROM t WHERE id = :id",
                                             &json!({"id": 7})).unwrap();
        assert_eq!(sql, "SELECT ':not_a_bind', x::text FROM t WHERE id = $1");
        assert_eq!(binds, vec![json!(7)]);
    }

    #[test]
    fn missing_bind_is_an_error() {
        let err = render_positional("op", "SELECT :missing", &json!({})).unwrap_err();
        match err {
            PersistenceError::MissingBind { operation, name } => {
                assert_eq!(operation, "op");
                assert_eq!(name, "missing");
            }
            other => panic!("se esperaba MissingBind, no {other:?}"),
        }
    }

    #[test]
    fn duplicate_operation_is_rejected() {
        let mut cat = OperationCatalog::new();
        cat.register("SEL", "SELECT 1").unwrap();
        assert!(matches!(cat.register("SEL", "SELECT 2"),
                         Err(PersistenceError::DuplicateOperation(_))));
        assert_eq!(cat.get("SEL").unwrap().sql, "SELECT 1");
    }
}
