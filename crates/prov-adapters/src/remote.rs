//! Transferencia remota: copia un archivo de un host a un directorio local.
//!
//! `ScpTransfer` invoca `scp` (o `wsl -e scp` cuando el destino debe
//! expresarse como ruta de WSL).
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use prov_core::{CollaboratorError, RemoteSource};

use crate::error::AdapterError;

pub trait RemoteTransfer: Send + Sync {
    /// Copia `source` dentro de `dest_dir` y devuelve la ruta local creada.
    fn fetch(&self, source: &RemoteSource, dest_dir: &Path) -> Result<PathBuf, CollaboratorError>;
}

#[derive(Debug, Clone)]
pub struct ScpTransfer {
    pub program: String,
    pub extra_args: Vec<String>,
}

impl Default for ScpTransfer {
    fn default() -> Self {
        Self { program: "scp".into(),
               extra_args: vec!["-q".into(), "-o".into(), "BatchMode=yes".into()] }
    }
}

impl ScpTransfer {
    /// Ruta local de destino y argv completo del comando a ejecutar. Falla si
    /// la ruta remota no nombra un archivo (`/`, vacía).
    pub fn command_line(&self, source: &RemoteSource, dest_dir: &Path) -> Result<(PathBuf, Vec<String>), AdapterError> {
        let name = source.file_name()
                         .ok_or_else(|| AdapterError::TransferFailed { location: source.location(),
                                                                       detail: "remote path has no file name".into() })?;
        let local = dest_dir.join(name);
        let dst = local.to_string_lossy().into_owned();
        let mut argv = Vec::new();
        if source.wsl {
            argv.extend(["wsl".to_string(), "-e".to_string()]);
        }
        argv.push(self.program.clone());
        argv.extend(self.extra_args.iter().cloned());
        argv.push(source.location());
        argv.push(if source.wsl { to_wsl_path(&dst) } else { dst });
        Ok((local, argv))
    }
}

impl RemoteTransfer for ScpTransfer {
    fn fetch(&self, source: &RemoteSource, dest_dir: &Path) -> Result<PathBuf, CollaboratorError> {
        let (local, argv) = self.command_line(source, dest_dir)?;
        debug!("running {:?}", argv);
        let output = Command::new(&argv[0]).args(&argv[1..]).output().map_err(AdapterError::from)?;
        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AdapterError::TransferFailed { location: source.location(),
                                                      detail: format!("{} ({})", detail, output.status) }.into());
        }
        if !local.exists() {
            return Err(AdapterError::TransferFailed { location: source.location(),
                                                      detail: format!("{} was not created", local.display()) }.into());
        }
        Ok(local)
    }
}

/// Traduce una ruta Windows (`C:\tmp\x`) a su forma dentro de WSL
/// (`/mnt/c/tmp/x`). Rutas sin letra de unidad sólo normalizan separadores.
pub fn to_wsl_path(path: &str) -> String {
    let posix = path.replace('\\', "/");
    let mut chars = posix.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
            let rest = posix[2..].trim_start_matches('/');
            format!("/mnt/{}/{}", drive.to_ascii_lowercase(), rest)
        }
        _ => posix,
    }
}
