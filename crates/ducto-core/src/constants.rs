//! Constantes compartidas del motor.

/// Versión del motor de ejecución (para trazas y diagnóstico).
pub const ENGINE_VERSION: &str = "ducto-core/0.1";

/// Nombre fijo del parámetro bajo el cual `ResultStreamBuffer` publica cada
/// lote de filas antes de invocar su sub-pipeline.
pub const STREAM_BATCH_PARAM: &str = "stream_batch";

/// Separador usado al renderizar el historial de operaciones de una
/// transacción como cadena de diagnóstico.
pub const HISTORY_ARROW: &str = "→";
