use prov_core::{GraphError, ReplayError};
use prov_session::SessionError;
use thiserror::Error;

/// Error de aplicación: agrupa los errores de cada crate del workspace.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Error interno: {0}")]
    Internal(String),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error de grafo: {0}")]
    Graph(#[from] GraphError),
    #[error("Error de replay: {0}")]
    Replay(#[from] ReplayError),
    #[error("Error de sesión: {0}")]
    Session(#[from] SessionError),
}
