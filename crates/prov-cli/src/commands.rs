//! Implementación de los subcomandos. Cada función devuelve el texto a
//! imprimir; `main` decide dónde escribirlo y el código de salida.
use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use prov_core::{ReplayOptions, WorkflowGraph};
use prov_session::SessionDocument;
use serde_json::Value;

/// Resumen legible de cada ventana de la sesión.
pub fn inspect(doc: &SessionDocument, options: &ReplayOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "session v{} with {} window(s)", doc.version, doc.windows.len());
    let no_overrides = HashMap::new();
    for w in &doc.windows {
        let prepared = w.prep_workflow(&no_overrides);
        let _ = writeln!(out, "- {} {:?} [{}]", w.id, w.title, w.model_type.as_deref().unwrap_or("?"));
        let _ = writeln!(out, "    steps: {} {}", w.workflow.len(), Value::Object(w.workflow.summary()));
        let commands = w.workflow.command_ids();
        if !commands.is_empty() {
            let _ = writeln!(out, "    commands: {}", commands.join(", "));
        }
        if w.short_workflow.is_some() {
            let _ = writeln!(out, "    restores from saved file");
        }
        if let Some(last) = prepared.last_index() {
            let _ = writeln!(out, "    replay: {:?}", options.resolve(last));
        }
    }
    out
}

/// Problemas que impiden restaurar la sesión sin intervención. El booleano
/// es `true` si no hay ninguno.
pub fn validate(doc: &SessionDocument) -> (String, bool) {
    let mut out = String::new();
    let mut ok = true;
    for w in &doc.windows {
        let unreadable = w.workflow.unreadable_count();
        if unreadable > 0 {
            ok = false;
            let _ = writeln!(out, "{} {:?}: {unreadable} unreadable record(s)", w.id, w.title);
        }
        if w.workflow.is_empty() && w.short_workflow.is_none() {
            ok = false;
            let _ = writeln!(out, "{} {:?}: empty workflow", w.id, w.title);
        }
    }
    let no_overrides = HashMap::new();
    for warning in doc.replay_warnings(&no_overrides) {
        ok = false;
        let kinds = doc.windows
                       .iter()
                       .find(|w| w.id == warning.window)
                       .map(|w| blocker_kinds(&w.prep_workflow(&no_overrides), &warning.blockers))
                       .unwrap_or_default();
        let _ = writeln!(out,
                         "{} {:?}: cannot be replayed unattended at step(s) {:?} ({})",
                         warning.window,
                         warning.title,
                         warning.blockers,
                         kinds.join(", "));
    }
    // Un fingerprint distinto no impide el replay: sólo se informa.
    for id in doc.verify_fingerprints() {
        let _ = writeln!(out, "{id}: fingerprint mismatch");
    }
    if ok {
        let _ = writeln!(out, "ok: {} window(s) can be restored", doc.windows.len());
    }
    (out, ok)
}

/// Tipo de cada step bloqueante, sin repetir.
fn blocker_kinds(workflow: &WorkflowGraph, blockers: &[usize]) -> Vec<String> {
    let mut kinds: Vec<String> = Vec::new();
    for record in blockers.iter().filter_map(|&i| workflow.get(i)) {
        let kind = match record.type_tag() {
            _ if record.is_unreadable() => "unreadable".to_string(),
            Some("command") => "user input".to_string(),
            Some(tag) => tag.to_string(),
            None => "unknown".to_string(),
        };
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

/// Slice de ancestros del step `step` (por defecto el último) del workflow
/// de la ventana, como array JSON de dicts etiquetados.
pub fn export(doc: &SessionDocument, window: &str, step: Option<usize>) -> Result<Value> {
    let w = doc.find_window(window)?;
    let slice = slice_of(&w.workflow, step).with_context(|| format!("exporting window {:?}", w.title))?;
    Ok(slice.to_dict())
}

fn slice_of(workflow: &WorkflowGraph, step: Option<usize>) -> Result<WorkflowGraph> {
    let index = match step {
        Some(i) => i,
        None => workflow.last_index().context("workflow is empty")?,
    };
    Ok(workflow.ancestors_of(index)?)
}
