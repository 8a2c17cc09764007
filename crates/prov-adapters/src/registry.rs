//! Registro explícito de colaboradores: readers, comandos y transferencia
//! remota. Se construye una vez en la aplicación y se pasa al motor de replay;
//! no hay registros globales.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use prov_core::{CollaboratorError, Collaborators, RemoteSource, ResolvedArgs, ResolvedArgument};
use serde_json::Value;

use crate::error::AdapterError;
use crate::remote::RemoteTransfer;

pub type ReaderFn<A> = Box<dyn Fn(&[PathBuf]) -> Result<A, CollaboratorError> + Send + Sync>;
/// Recibe `(contexts, args)`: los artifacts de modelo o ventana por un lado y
/// el resto de argumentos por otro.
pub type CommandFn<A> = Box<dyn Fn(&ResolvedArgs<A>, &ResolvedArgs<A>) -> Result<A, CollaboratorError> + Send + Sync>;

struct ReaderEntry<A> {
    name: String,
    /// Extensiones en minúscula sin punto. Vacío = acepta cualquier archivo.
    extensions: Vec<String>,
    read: ReaderFn<A>,
}

pub struct CollaboratorRegistry<A> {
    readers: Vec<ReaderEntry<A>>,
    commands: HashMap<String, CommandFn<A>>,
    transfer: Option<Box<dyn RemoteTransfer>>,
}

impl<A> Default for CollaboratorRegistry<A> {
    fn default() -> Self {
        Self { readers: Vec::new(),
               commands: HashMap::new(),
               transfer: None }
    }
}

impl<A> std::fmt::Debug for CollaboratorRegistry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorRegistry")
         .field("readers", &self.reader_names())
         .field("commands", &self.command_ids())
         .field("transfer", &self.transfer.is_some())
         .finish()
    }
}

impl<A> CollaboratorRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un reader por nombre de plugin. Un reader con el mismo
    /// nombre reemplaza al anterior.
    pub fn register_reader<F>(&mut self, name: &str, extensions: &[&str], read: F) -> &mut Self
        where F: Fn(&[PathBuf]) -> Result<A, CollaboratorError> + Send + Sync + 'static
    {
        self.readers.retain(|r| r.name != name);
        self.readers.push(ReaderEntry { name: name.to_string(),
                                        extensions: extensions.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect(),
                                        read: Box::new(read) });
        self
    }

    pub fn register_command<F>(&mut self, command_id: &str, run: F) -> &mut Self
        where F: Fn(&ResolvedArgs<A>, &ResolvedArgs<A>) -> Result<A, CollaboratorError> + Send + Sync + 'static
    {
        self.commands.insert(command_id.to_string(), Box::new(run));
        self
    }

    pub fn set_transfer(&mut self, transfer: impl RemoteTransfer + 'static) -> &mut Self {
        self.transfer = Some(Box::new(transfer));
        self
    }

    pub fn reader_names(&self) -> Vec<&str> {
        self.readers.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn command_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn has_command(&self, command_id: &str) -> bool {
        self.commands.contains_key(command_id)
    }

    /// Reader por nombre exacto; si no existe, por extensión del primer path
    /// y por último un reader sin extensiones declaradas.
    fn find_reader(&self, paths: &[PathBuf], plugin: Option<&str>) -> Result<&ReaderEntry<A>, AdapterError> {
        let first = paths.first().ok_or(AdapterError::NoPaths)?;
        if let Some(name) = plugin {
            if let Some(r) = self.readers.iter().find(|r| r.name == name) {
                return Ok(r);
            }
            warn!("reader plugin {name:?} not registered, falling back to extension lookup");
        }
        let ext = extension_of(first);
        self.readers
            .iter()
            .find(|r| ext.as_ref().is_some_and(|e| r.extensions.contains(e)))
            .or_else(|| self.readers.iter().find(|r| r.extensions.is_empty()))
            .ok_or_else(|| AdapterError::ReaderNotFound { plugin: plugin.map(str::to_owned),
                                                          path: first.display().to_string() })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

impl<A: Clone> Collaborators for CollaboratorRegistry<A> {
    type Artifact = A;

    fn read_local(&self, paths: &[PathBuf], plugin_reference: Option<&str>) -> Result<A, CollaboratorError> {
        let reader = self.find_reader(paths, plugin_reference)?;
        debug!("reading {} path(s) with {:?}", paths.len(), reader.name);
        (reader.read)(paths)
    }

    fn read_remote(&self, source: &RemoteSource) -> Result<A, CollaboratorError> {
        let transfer = self.transfer.as_ref().ok_or(AdapterError::NoRemoteTransfer)?;
        // El directorio temporal vive hasta que el reader terminó.
        let tmp = tempfile::tempdir().map_err(AdapterError::from)?;
        let local = transfer.fetch(source, tmp.path())?;
        self.read_local(&[local], source.plugin_reference.as_deref())
    }

    fn invoke_command(&self, command_id: &str, contexts: &ResolvedArgs<A>, args: &ResolvedArgs<A>) -> Result<A, CollaboratorError> {
        let run = self.commands
                      .get(command_id)
                      .ok_or_else(|| AdapterError::CommandNotFound(command_id.to_string()))?;
        debug!("invoking {command_id:?} with {} context(s) and {} argument(s)", contexts.len(), args.len());
        run(contexts, args)
    }
}

/// Artifact requerido del argumento `name`.
pub fn require_artifact<'a, A>(args: &'a ResolvedArgs<A>, command_id: &str, name: &str) -> Result<&'a A, AdapterError> {
    args.get(name)
        .and_then(ResolvedArgument::as_artifact)
        .ok_or_else(|| bad_argument(command_id, name, "expected an artifact"))
}

/// Artifact de contexto sobre el que opera el comando: el último declarado.
pub fn model_context<A>(contexts: &ResolvedArgs<A>) -> Option<&A> {
    contexts.values().rev().find_map(ResolvedArgument::as_artifact)
}

/// Lista de artifacts requerida del argumento `name`.
pub fn require_artifacts<'a, A>(args: &'a ResolvedArgs<A>, command_id: &str, name: &str) -> Result<&'a [A], AdapterError> {
    args.get(name)
        .and_then(ResolvedArgument::as_artifacts)
        .ok_or_else(|| bad_argument(command_id, name, "expected a list of artifacts"))
}

/// Literal del argumento `name`, si está presente.
pub fn literal<'a, A>(args: &'a ResolvedArgs<A>, name: &str) -> Option<&'a Value> {
    args.get(name).and_then(ResolvedArgument::as_literal)
}

fn bad_argument(command_id: &str, name: &str, detail: &str) -> AdapterError {
    AdapterError::BadArgument { command_id: command_id.to_string(),
                                name: name.to_string(),
                                detail: detail.to_string() }
}
