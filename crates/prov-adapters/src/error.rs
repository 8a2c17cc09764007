//! Errores de los adaptadores de colaboradores.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no reader registered for {path} (plugin: {plugin:?})")]
    ReaderNotFound { plugin: Option<String>, path: String },
    #[error("reader invoked without paths")]
    NoPaths,
    #[error("command not registered: {0}")]
    CommandNotFound(String),
    #[error("no remote transfer configured")]
    NoRemoteTransfer,
    #[error("transfer of {location} failed: {detail}")]
    TransferFailed { location: String, detail: String },
    #[error("argument {name:?} of command {command_id:?}: {detail}")]
    BadArgument { command_id: String, name: String, detail: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
