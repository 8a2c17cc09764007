//! prov-core: grafo de procedencia de artifacts y motor de replay.
//!
//! - `step`: registros (`StepRecord`) y parámetros (`ParameterDescriptor`).
//! - `graph`: `WorkflowGraph`, ancestros, merge deduplicado y serialización.
//! - `replay`: recomputación memoizada a través de colaboradores externos.
pub mod errors;
pub mod graph;
pub mod hashing;
pub mod replay;
pub mod step;

pub use errors::{CollaboratorError, GraphError, ReplayError, StepDecodeError};
pub use graph::WorkflowGraph;
pub use replay::{compute, Collaborators, ReplayEngine, ReplayOptions, ReplayStrategy, ResolvedArgs, ResolvedArgument};
pub use step::{ExecutionClock, ParameterDescriptor, Parameters, RemoteSource, StepKind, StepRecord};
