//! Escenario completo: sesión guardada en disco, configuración desde
//! variables, restauración con colaboradores reales sobre archivos.
use std::collections::HashMap;
use std::fs;

use provflow_rust::adapters::{literal, require_artifact, CollaboratorRegistry};
use provflow_rust::config::{AppConfig, ENV_RECURSION_LIMIT, ENV_REPLAY_STRATEGY};
use provflow_rust::errors::CoreError;
use provflow_rust::session::{SessionDocument, SessionError, WindowSession};
use provflow_rust::{ParameterDescriptor, Parameters, ReplayError, ReplayStrategy, StepRecord, WorkflowGraph};

fn registry() -> CollaboratorRegistry<String> {
    let mut reg = CollaboratorRegistry::new();
    reg.register_reader("text", &["txt"], |paths| Ok(fs::read_to_string(&paths[0])?))
       .register_command("repeat", |_, args| {
           let text = require_artifact(args, "repeat", "text")?;
           let times = literal(args, "times").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
           Ok(text.repeat(times))
       });
    reg
}

/// Cadena larga: read seguido de `n` repeticiones x1.
fn chain(path: &std::path::Path, n: usize) -> WorkflowGraph {
    let mut g = WorkflowGraph::new();
    g.append(StepRecord::local_read([path], Some("text"))).unwrap();
    for i in 0..n {
        let mut p = Parameters::new();
        p.insert("text".into(), ParameterDescriptor::artifact(i));
        p.insert("times".into(), ParameterDescriptor::literal(1));
        g.append(StepRecord::command("repeat", p, i as u64, vec![i])).unwrap();
    }
    g
}

#[test]
fn deep_session_restores_with_configured_iterative_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("x.txt");
    fs::write(&src, "x").unwrap();

    let mut doc = SessionDocument::new();
    doc.add_window(WindowSession::new("deep", Some("text"), chain(&src, 3000)));
    let path = dir.path().join("session.json");
    doc.save(&path).unwrap();

    let vars = HashMap::from([(ENV_REPLAY_STRATEGY, "auto"), (ENV_RECURSION_LIMIT, "256")]);
    let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    let options = config.replay_options();
    assert_eq!(options.resolve(2999), ReplayStrategy::Iterative);

    let loaded = SessionDocument::load(&path).unwrap();
    let restored = loaded.restore(&registry(), &HashMap::new(), options);
    assert_eq!(restored[0].result.as_deref().unwrap(), "x");
}

#[test]
fn errors_surface_through_the_application_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("y.txt");
    fs::write(&src, "y").unwrap();

    let mut g = chain(&src, 1);
    g.append(StepRecord::user_modification(1)).unwrap();
    let mut doc = SessionDocument::new();
    doc.add_window(WindowSession::new("edited", None, g));

    let mut restored = doc.restore(&registry(), &HashMap::new(), AppConfig::default().replay_options());
    let err: CoreError = restored.remove(0).result.unwrap_err().into();
    match err {
        CoreError::Session(SessionError::Replay { source: ReplayError::RequiresUserInput(2), .. }) => {}
        other => panic!("unexpected {other:?}"),
    }

    let err: CoreError = SessionDocument::load(dir.path().join("missing.json")).unwrap_err().into();
    assert!(err.to_string().starts_with("Error de sesión: io error"));
}
