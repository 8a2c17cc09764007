//! Errores de lectura/escritura y restauración de sesiones.

use prov_core::{GraphError, ReplayError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid session document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported session version {found:?} (supported: {supported})")]
    UnsupportedVersion { found: String, supported: &'static str },
    #[error("window not found: {0}")]
    WindowNotFound(String),
    #[error("invalid workflow: {0}")]
    Graph(#[from] GraphError),
    #[error("window {0} has an empty workflow")]
    EmptyWorkflow(Uuid),
    /// El índice de `source` es local al workflow de la ventana.
    #[error("window {window}: {source}")]
    Replay {
        window: Uuid,
        #[source]
        source: ReplayError,
    },
}
