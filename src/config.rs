//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y las traduce a `ReplayOptions`, que se
//! pasan explícitamente al motor: el core no lee el entorno.
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

use prov_core::replay::DEFAULT_RECURSION_LIMIT;
use prov_core::{ReplayOptions, ReplayStrategy};

use crate::errors::CoreError;

pub const ENV_REPLAY_STRATEGY: &str = "PROVFLOW_REPLAY_STRATEGY";
pub const ENV_RECURSION_LIMIT: &str = "PROVFLOW_RECURSION_LIMIT";
pub const ENV_SESSION_DIR: &str = "PROVFLOW_SESSION_DIR";

/// `.env` se carga una sola vez por proceso; si no existe no es un error.
static DOTENV: Lazy<bool> = Lazy::new(|| dotenvy::dotenv().is_ok());

/// Configuración de la aplicación (extensible para más secciones).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub replay: ReplayConfig,
    /// Directorio base para resolver rutas de sesión relativas.
    pub session_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayConfig {
    pub strategy: ReplayStrategy,
    /// Profundidad máxima para la variante recursiva en modo `auto`.
    pub recursion_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { replay: ReplayConfig { strategy: ReplayStrategy::Auto,
                                      recursion_limit: DEFAULT_RECURSION_LIMIT },
               session_dir: None }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno del proceso (tras cargar `.env`).
    pub fn from_env() -> Result<Self, CoreError> {
        Lazy::force(&DOTENV);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_REPLAY_STRATEGY) {
            cfg.replay.strategy = raw.parse().map_err(|e| CoreError::Config(format!("{ENV_REPLAY_STRATEGY}: {e}")))?;
        }
        if let Some(raw) = lookup(ENV_RECURSION_LIMIT) {
            cfg.replay.recursion_limit = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(CoreError::Config(format!("{ENV_RECURSION_LIMIT}: expected a positive integer, got {raw:?}"))),
            };
        }
        cfg.session_dir = lookup(ENV_SESSION_DIR).filter(|s| !s.trim().is_empty()).map(PathBuf::from);
        Ok(cfg)
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions { strategy: self.replay.strategy,
                        recursion_limit: self.replay.recursion_limit }
    }

    /// Resuelve `path` contra `session_dir` si es relativa.
    pub fn session_path(&self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        match &self.session_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }
}
