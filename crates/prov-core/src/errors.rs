//! Errores del core: construcción/decodificación del grafo y replay.

use thiserror::Error;

/// Error devuelto por un colaborador externo (reader, transfer, comando).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Fallos al decodificar un registro o parámetro desde su dict etiquetado.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepDecodeError {
    #[error("unknown step kind: {0:?}")]
    UnknownStepKind(String),
    #[error("unknown parameter kind: {0:?}")]
    UnknownParameterKind(String),
    #[error("missing \"type\" tag")]
    MissingTag,
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Errores estructurales del `WorkflowGraph`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Un registro apunta a un índice igual o posterior a su propia posición.
    #[error("record {index} references step {parent}, which is not an earlier step")]
    InvalidParentReference { index: usize, parent: usize },
    #[error("step index {index} out of range (graph has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("workflow document must be a JSON array")]
    NotAnArray,
    #[error("workflow is empty")]
    Empty,
    #[error(transparent)]
    Decode(#[from] StepDecodeError),
}

/// Errores del replay. Todos llevan el índice que los originó.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("step {0} is out of range")]
    IndexOutOfRange(usize),
    /// El valor nunca fue persistido externamente (p. ej. creado por API) y no
    /// fue sembrado con `seed`.
    #[error("step {0} is not replayable")]
    NotReplayable(usize),
    #[error("step {0} requires user input and cannot be replayed unattended")]
    RequiresUserInput(usize),
    #[error("replay of step {index} failed: {source}")]
    Failed {
        index: usize,
        #[source]
        source: CollaboratorError,
    },
}

impl ReplayError {
    /// Índice del step que provocó el error.
    pub fn index(&self) -> usize {
        match self {
            ReplayError::IndexOutOfRange(i) | ReplayError::NotReplayable(i) | ReplayError::RequiresUserInput(i) => *i,
            ReplayError::Failed { index, .. } => *index,
        }
    }
}
