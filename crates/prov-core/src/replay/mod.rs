//! Motor de replay: recomputa artifacts recorriendo el grafo y llamando a
//! los colaboradores en orden de dependencias, con memoización por índice.

mod collaborators;
mod engine;
mod options;

pub use collaborators::{Collaborators, ResolvedArgs, ResolvedArgument};
pub use engine::{compute, ReplayEngine, TraceEntry};
pub use options::{ReplayOptions, ReplayStrategy, DEFAULT_RECURSION_LIMIT};
