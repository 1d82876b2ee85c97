//! Bolsa de parámetros del run: mapa nombre → valor JSON.
//!
//! La forma mapa-de-nombre-a-valor es intrínseca al diseño dirigido por
//! configuración. Los accesores tipados fallan con un error explícito ante
//! un tipo inesperado, nunca con un cast sin verificar en el punto de uso.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::CoreError;

/// Nombre legible del tipo JSON de un valor, para mensajes de error.
fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Bolsa de parámetros con semántica last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct ParamBag {
    inner: HashMap<String, Value>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self { inner: HashMap::new() }
    }

    /// Escribe un parámetro (pisa el valor anterior si existe).
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.inner.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.inner.remove(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Devuelve el valor o `MissingParam`.
    pub fn require(&self, name: &str) -> Result<&Value, CoreError> {
        self.inner.get(name).ok_or_else(|| CoreError::MissingParam(name.to_string()))
    }

    fn mismatch(name: &str, expected: &str, found: &Value) -> CoreError {
        CoreError::ParamTypeMismatch { param: name.to_string(),
                                       expected: expected.to_string(),
                                       found: json_type_name(found).to_string() }
    }

    pub fn get_str(&self, name: &str) -> Result<&str, CoreError> {
        let v = self.require(name)?;
        v.as_str().ok_or_else(|| Self::mismatch(name, "string", v))
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, CoreError> {
        let v = self.require(name)?;
        v.as_i64().ok_or_else(|| Self::mismatch(name, "integer", v))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, CoreError> {
        let v = self.require(name)?;
        v.as_bool().ok_or_else(|| Self::mismatch(name, "bool", v))
    }

    pub fn get_array(&self, name: &str) -> Result<&Vec<Value>, CoreError> {
        let v = self.require(name)?;
        v.as_array().ok_or_else(|| Self::mismatch(name, "array", v))
    }

    pub fn get_object(&self, name: &str) -> Result<&serde_json::Map<String, Value>, CoreError> {
        let v = self.require(name)?;
        v.as_object().ok_or_else(|| Self::mismatch(name, "object", v))
    }
}
