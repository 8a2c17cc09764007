// Reexport de la implementación única ubicada en `prov-core` para evitar
// duplicación de lógica de canonicalización/hashing a nivel de workspace.
pub use prov_core::hashing::canonical_json;
pub use prov_core::hashing::canonical_json::to_canonical_json;
pub use prov_core::hashing::{hash_str, hash_value};
