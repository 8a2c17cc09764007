//! Estrategia de evaluación del replay.
use std::str::FromStr;

/// Límite por defecto de profundidad para la variante recursiva.
pub const DEFAULT_RECURSION_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayStrategy {
    /// Recursión memoizada; la profundidad está acotada por el largo de la cadena.
    Recursive,
    /// Pila explícita; para cadenas de miles de steps.
    Iterative,
    /// Recursiva si la cadena cabe en `recursion_limit`, iterativa si no.
    #[default]
    Auto,
}

impl FromStr for ReplayStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recursive" => Ok(Self::Recursive),
            "iterative" => Ok(Self::Iterative),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown replay strategy {other:?} (expected recursive, iterative or auto)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    pub strategy: ReplayStrategy,
    pub recursion_limit: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self { strategy: ReplayStrategy::Auto,
               recursion_limit: DEFAULT_RECURSION_LIMIT }
    }
}

impl ReplayOptions {
    /// Estrategia concreta para evaluar `index` (nunca `Auto`).
    pub fn resolve(&self, index: usize) -> ReplayStrategy {
        match self.strategy {
            // Una cadena hasta `index` tiene a lo sumo `index + 1` niveles.
            ReplayStrategy::Auto if index < self.recursion_limit => ReplayStrategy::Recursive,
            ReplayStrategy::Auto => ReplayStrategy::Iterative,
            other => other,
        }
    }
}
