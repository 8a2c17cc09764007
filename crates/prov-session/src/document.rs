//! Documento de sesión.
//!
//! Por cada ventana se guarda su workflow completo como array de dicts
//! etiquetados (`"workflow"`). El resto de la metadata de la ventana y del
//! documento (geometría, agrupación en tabs, ...) no es asunto de este crate:
//! se conserva tal cual al leer y escribir.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use prov_core::{ExecutionClock, StepRecord, WorkflowGraph};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::SessionError;

/// Versión del formato de sesión que escribe este crate.
pub const SESSION_FORMAT_VERSION: &str = "1";

fn default_version() -> String {
    SESSION_FORMAT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSession {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    pub workflow: WorkflowGraph,
    /// Atajo para restaurar: p. ej. leer el archivo donde se guardó el
    /// artifact en lugar de reproducir todo el workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_workflow: Option<WorkflowGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl WindowSession {
    pub fn new(title: impl Into<String>, model_type: Option<&str>, workflow: WorkflowGraph) -> Self {
        let fingerprint = Some(workflow.fingerprint());
        Self { id: Uuid::new_v4(),
               title: title.into(),
               model_type: model_type.map(str::to_owned),
               workflow,
               short_workflow: None,
               fingerprint,
               metadata: Map::new() }
    }

    /// Registra que el artifact fue guardado en `path`: al restaurar se lee
    /// ese archivo en lugar de reproducir el workflow.
    pub fn with_saved_file(mut self, path: impl Into<PathBuf>, plugin_reference: Option<&str>) -> Result<Self, SessionError> {
        let read = StepRecord::local_read([path.into()], plugin_reference);
        self.short_workflow = Some(WorkflowGraph::single(read)?);
        Ok(self)
    }

    /// Workflow más eficiente para obtener la ventana: override por id, luego
    /// `short_workflow`, luego el workflow completo.
    pub fn prep_workflow(&self, overrides: &HashMap<Uuid, WorkflowGraph>) -> WorkflowGraph {
        overrides.get(&self.id)
                 .or(self.short_workflow.as_ref())
                 .unwrap_or(&self.workflow)
                 .clone()
    }

    /// `false` si el workflow cambió desde que se calculó el fingerprint.
    pub fn fingerprint_matches(&self) -> bool {
        self.fingerprint.as_ref().map_or(true, |fp| *fp == self.workflow.fingerprint())
    }
}

/// Ventana cuyo replay desatendido no es posible tal como está guardada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayWarning {
    pub window: Uuid,
    pub title: String,
    /// Índices (locales al workflow preparado) que requieren intervención.
    pub blockers: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub windows: Vec<WindowSession>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Default for SessionDocument {
    fn default() -> Self {
        Self { version: default_version(),
               windows: Vec::new(),
               metadata: Map::new() }
    }
}

impl SessionDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_window(&mut self, window: WindowSession) -> Uuid {
        let id = window.id;
        self.windows.push(window);
        id
    }

    pub fn from_json_str(text: &str) -> Result<Self, SessionError> {
        let doc: SessionDocument = serde_json::from_str(text)?;
        doc.check_version()?;
        for w in &doc.windows {
            let unreadable = w.workflow.unreadable_count();
            if unreadable > 0 {
                warn!("window {} ({:?}): {unreadable} workflow record(s) could not be read", w.id, w.title);
            }
        }
        Ok(doc)
    }

    pub fn to_json_string(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    fn check_version(&self) -> Result<(), SessionError> {
        let major = |v: &str| v.split('.').next().and_then(|m| m.trim().parse::<u32>().ok());
        match (major(&self.version), major(SESSION_FORMAT_VERSION)) {
            (Some(found), Some(supported)) if found <= supported => Ok(()),
            _ => Err(SessionError::UnsupportedVersion { found: self.version.clone(),
                                                        supported: SESSION_FORMAT_VERSION }),
        }
    }

    /// Busca una ventana por id (texto) o por título exacto.
    pub fn find_window(&self, key: &str) -> Result<&WindowSession, SessionError> {
        let by_id = Uuid::parse_str(key).ok();
        self.windows
            .iter()
            .find(|w| Some(w.id) == by_id || w.title == key)
            .ok_or_else(|| SessionError::WindowNotFound(key.to_string()))
    }

    /// Ventanas cuyo workflow ya no coincide con el fingerprint guardado.
    pub fn verify_fingerprints(&self) -> Vec<Uuid> {
        self.windows
            .iter()
            .filter(|w| !w.fingerprint_matches())
            .inspect(|w| warn!("window {} ({:?}): workflow fingerprint mismatch", w.id, w.title))
            .map(|w| w.id)
            .collect()
    }

    /// Ventanas que no se pueden restaurar sin intervención humana.
    pub fn replay_warnings(&self, overrides: &HashMap<Uuid, WorkflowGraph>) -> Vec<ReplayWarning> {
        self.windows
            .iter()
            .filter_map(|w| {
                let wf = w.prep_workflow(overrides);
                let last = wf.last_index()?;
                let blockers = wf.replay_blockers(last).ok()?;
                (!blockers.is_empty()).then(|| ReplayWarning { window: w.id,
                                                                title: w.title.clone(),
                                                                blockers })
            })
            .collect()
    }

    /// Reloj de ejecución que continúa después de los tags de la sesión.
    pub fn execution_clock(&self) -> ExecutionClock {
        ExecutionClock::resume_after(self.windows.iter().map(|w| &w.workflow))
    }
}
