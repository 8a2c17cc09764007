//! Restauración de una sesión completa.
//!
//! Los workflows preparados de todas las ventanas se concatenan (deduplicando
//! registros por id) y se computan sobre un único motor, así que los ancestros
//! compartidos entre ventanas se reproducen una sola vez.
use std::collections::HashMap;

use log::{info, warn};
use prov_core::{Collaborators, ReplayEngine, ReplayError, ReplayOptions, WorkflowGraph};
use uuid::Uuid;

use crate::document::SessionDocument;
use crate::error::SessionError;

#[derive(Debug)]
pub struct WindowRestore<A> {
    pub window: Uuid,
    pub title: String,
    pub result: Result<A, SessionError>,
}

impl<A> WindowRestore<A> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl SessionDocument {
    /// Recomputa el artifact de cada ventana. El resultado conserva el orden
    /// de `windows`; un fallo en una ventana no impide restaurar las demás.
    pub fn restore<C: Collaborators>(&self,
                                     collaborators: &C,
                                     overrides: &HashMap<Uuid, WorkflowGraph>,
                                     options: ReplayOptions)
                                     -> Vec<WindowRestore<C::Artifact>> {
        let prepared: Vec<WorkflowGraph> = self.windows.iter().map(|w| w.prep_workflow(overrides)).collect();
        let merged = WorkflowGraph::concat(&prepared);
        let mut engine = ReplayEngine::new(&merged, collaborators).with_options(options);

        let out: Vec<_> = self.windows
                              .iter()
                              .zip(&prepared)
                              .map(|(w, wf)| {
                                  let result = match wf.last_id().ok().and_then(|id| merged.index_of(id)) {
                                      None => Err(SessionError::EmptyWorkflow(w.id)),
                                      Some(target) => engine.compute(target).map_err(|e| {
                                                                                 SessionError::Replay { window: w.id,
                                                                                                        source: localize(e, &merged, wf) }
                                                                             }),
                                  };
                                  if let Err(e) = &result {
                                      warn!("could not restore window {:?}: {e}", w.title);
                                  }
                                  WindowRestore { window: w.id,
                                                  title: w.title.clone(),
                                                  result }
                              })
                              .collect();

        info!("restored {}/{} window(s), {} step(s) replayed",
              out.iter().filter(|r| r.is_ok()).count(),
              out.len(),
              engine.trace().len());
        out
    }
}

/// Traduce el índice del error (del grafo concatenado) al índice del mismo
/// registro dentro del workflow de la ventana.
fn localize(err: ReplayError, merged: &WorkflowGraph, local: &WorkflowGraph) -> ReplayError {
    let to_local = |i: usize| merged.get(i).and_then(|s| local.index_of(s.id)).unwrap_or(i);
    match err {
        ReplayError::IndexOutOfRange(i) => ReplayError::IndexOutOfRange(to_local(i)),
        ReplayError::NotReplayable(i) => ReplayError::NotReplayable(to_local(i)),
        ReplayError::RequiresUserInput(i) => ReplayError::RequiresUserInput(to_local(i)),
        ReplayError::Failed { index, source } => ReplayError::Failed { index: to_local(index), source },
    }
}
