//! prov-adapters: implementaciones de los colaboradores del replay.
//!
//! `CollaboratorRegistry` agrupa readers (por plugin o extensión), comandos
//! (por id) y una `RemoteTransfer` para lecturas remotas.
pub mod error;
pub mod registry;
pub mod remote;

pub use error::AdapterError;
pub use registry::{literal, model_context, require_artifact, require_artifacts, CollaboratorRegistry, CommandFn, ReaderFn};
pub use remote::{to_wsl_path, RemoteTransfer, ScpTransfer};
