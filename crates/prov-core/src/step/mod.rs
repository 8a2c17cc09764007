//! Modelo de un paso del workflow: registros, parámetros y reloj de ejecución.

pub mod clock;
pub mod parameter;
pub mod record;

pub use clock::ExecutionClock;
pub use parameter::{ParameterDescriptor, Parameters, CONTEXT_TAGS, PARAMETER_TAGS};
pub use record::{RemoteSource, StepKind, StepRecord, UnreadableStep, STEP_TAGS};
