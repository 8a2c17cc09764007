//! prov-session: documento de sesión con el workflow de cada ventana y
//! restauración de todas las ventanas mediante replay.
pub mod document;
pub mod error;
pub mod restore;

pub use document::{ReplayWarning, SessionDocument, WindowSession, SESSION_FORMAT_VERSION};
pub use error::SessionError;
pub use restore::WindowRestore;
