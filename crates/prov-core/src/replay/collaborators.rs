//! Contrato con los colaboradores externos (readers, transferencia remota,
//! comandos). El core nunca inspecciona el artifact: sólo lo pasa de un
//! colaborador a otro.
use std::path::PathBuf;

use indexmap::IndexMap;
use serde_json::Value;

use crate::errors::CollaboratorError;
use crate::step::RemoteSource;

/// Argumento de comando con las referencias ya sustituidas por artifacts.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedArgument<A> {
    Literal(Value),
    Artifact(A),
    Artifacts(Vec<A>),
}

impl<A> ResolvedArgument<A> {
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&A> {
        match self {
            Self::Artifact(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_artifacts(&self) -> Option<&[A]> {
        match self {
            Self::Artifacts(a) => Some(a),
            _ => None,
        }
    }
}

/// Argumentos resueltos, en el orden en que se registraron.
pub type ResolvedArgs<A> = IndexMap<String, ResolvedArgument<A>>;

/// Colaboradores que el motor de replay invoca. Cualquier error devuelto se
/// envuelve como `ReplayError::Failed` con el índice del step.
pub trait Collaborators {
    type Artifact: Clone;

    fn read_local(&self, paths: &[PathBuf], plugin_reference: Option<&str>) -> Result<Self::Artifact, CollaboratorError>;

    fn read_remote(&self, source: &RemoteSource) -> Result<Self::Artifact, CollaboratorError>;

    /// `contexts` trae los artifacts sobre los que opera el comando (modelo o
    /// ventana); `args` el resto de parámetros.
    fn invoke_command(&self,
                      command_id: &str,
                      contexts: &ResolvedArgs<Self::Artifact>,
                      args: &ResolvedArgs<Self::Artifact>)
                      -> Result<Self::Artifact, CollaboratorError>;
}
