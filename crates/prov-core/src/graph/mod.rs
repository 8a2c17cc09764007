//! Grafo de procedencia: registros ordenados, ancestros y serialización.

mod ancestors;
mod codec;
mod workflow;

pub use workflow::WorkflowGraph;
