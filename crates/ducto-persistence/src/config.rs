//! Carga de configuración de conexión desde variables de entorno.
//!
//! Convención `DATABASE_URL` + parámetros opcionales de pool. La ausencia de
//! la URL es un error explícito (`MissingEnv`), no un panic: quien arma el
//! registro decide si el recurso Postgres es obligatorio.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez por proceso.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::MissingEnv("DATABASE_URL".into()))?;
        let min_connections = env_u32("DATABASE_MIN_CONNECTIONS", 2);
        let max_connections = env_u32("DATABASE_MAX_CONNECTIONS", 16);
        Ok(Self { url, min_connections, max_connections })
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
