//! ProvFlow Rust Library
//!
//! Fachada del workspace:
//! - Expone `config` para leer la configuración de replay del entorno (.env).
//! - Expone `errors` con el error de aplicación que agrupa los de cada crate.
//! - Expone `hashing` para serializar JSON en forma canónica.
//! - Re-exporta el core, los adapters y el formato de sesión.
//!
//! Puede usarse desde `prov-cli` o por otros crates/clientes.

pub mod config;
pub mod errors;
pub mod hashing;

pub use prov_adapters as adapters;
pub use prov_core::*;
pub use prov_session as session;
