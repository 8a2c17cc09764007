//! Evaluación memoizada sobre el DAG.
//!
//! Para computar `i` se computan primero todas sus dependencias (padres y
//! referencias de parámetros), guardando cada artifact por índice: ningún
//! índice se recomputa aunque lo consuman varios descendientes. Un índice que
//! falla no se guarda, así que el caller puede reintentar tras corregir el
//! entorno sin perder lo ya computado.
use std::collections::HashMap;

use log::{debug, warn};

use super::{Collaborators, ReplayOptions, ReplayStrategy, ResolvedArgs, ResolvedArgument};
use crate::errors::ReplayError;
use crate::graph::WorkflowGraph;
use crate::step::{ParameterDescriptor, Parameters, StepKind, StepRecord};

/// Entrada de diagnóstico: un step evaluado, en orden de evaluación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub index: usize,
    pub type_tag: String,
    /// Tag de ejecución original; no se usa para reordenar.
    pub execution_tag: Option<u64>,
}

/// Recomputa el artifact de `index` con un motor nuevo y opciones por defecto.
pub fn compute<C: Collaborators>(graph: &WorkflowGraph, index: usize, collaborators: &C) -> Result<C::Artifact, ReplayError> {
    ReplayEngine::new(graph, collaborators).compute(index)
}

pub struct ReplayEngine<'a, C: Collaborators> {
    graph: &'a WorkflowGraph,
    collaborators: &'a C,
    options: ReplayOptions,
    cache: HashMap<usize, C::Artifact>,
    trace: Vec<TraceEntry>,
}

impl<'a, C: Collaborators> ReplayEngine<'a, C> {
    pub fn new(graph: &'a WorkflowGraph, collaborators: &'a C) -> Self {
        Self { graph,
               collaborators,
               options: ReplayOptions::default(),
               cache: HashMap::new(),
               trace: Vec::new() }
    }

    pub fn with_options(mut self, options: ReplayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn graph(&self) -> &WorkflowGraph {
        self.graph
    }

    /// Fija de antemano el artifact de un índice (p. ej. un step
    /// programático cuyo valor se conoce por otra vía).
    pub fn seed(&mut self, index: usize, artifact: C::Artifact) -> Result<(), ReplayError> {
        self.record(index)?;
        self.cache.insert(index, artifact);
        Ok(())
    }

    pub fn cached(&self, index: usize) -> Option<&C::Artifact> {
        self.cache.get(&index)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Steps evaluados (llamadas a colaboradores), en orden.
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn compute(&mut self, index: usize) -> Result<C::Artifact, ReplayError> {
        match self.options.resolve(index) {
            ReplayStrategy::Iterative => self.compute_iterative(index),
            _ => self.compute_recursive(index),
        }
    }

    /// Computa varios índices compartiendo la cache. Un fallo en uno no
    /// impide los demás.
    pub fn compute_many(&mut self, indices: &[usize]) -> Vec<Result<C::Artifact, ReplayError>> {
        indices.iter().map(|i| self.compute(*i)).collect()
    }

    pub fn compute_recursive(&mut self, index: usize) -> Result<C::Artifact, ReplayError> {
        self.visit(index)?;
        self.take_cached(index)
    }

    pub fn compute_iterative(&mut self, index: usize) -> Result<C::Artifact, ReplayError> {
        let mut stack: Vec<(usize, bool)> = vec![(index, false)];
        while let Some((current, expanded)) = stack.pop() {
            if self.cache.contains_key(&current) {
                continue;
            }
            if expanded {
                self.evaluate(current)?;
                continue;
            }
            self.check_blockers(current)?;
            stack.push((current, true));
            let deps = self.record(current)?.dependencies();
            for dep in deps.into_iter().rev() {
                if !self.cache.contains_key(&dep) {
                    stack.push((dep, false));
                }
            }
        }
        self.take_cached(index)
    }

    fn visit(&mut self, index: usize) -> Result<(), ReplayError> {
        if self.cache.contains_key(&index) {
            return Ok(());
        }
        self.check_blockers(index)?;
        for dep in self.record(index)?.dependencies() {
            self.visit(dep)?;
        }
        self.evaluate(index)
    }

    fn record(&self, index: usize) -> Result<&'a StepRecord, ReplayError> {
        self.graph.get(index).ok_or(ReplayError::IndexOutOfRange(index))
    }

    fn take_cached(&self, index: usize) -> Result<C::Artifact, ReplayError> {
        self.cache.get(&index).cloned().ok_or(ReplayError::NotReplayable(index))
    }

    /// Falla rápido si el step no puede reproducirse sin intervención, antes
    /// de bajar a sus dependencias.
    fn check_blockers(&self, index: usize) -> Result<(), ReplayError> {
        let record = self.record(index)?;
        match &record.kind {
            StepKind::UserModification => Err(ReplayError::RequiresUserInput(index)),
            StepKind::CommandExecution { contexts, parameters, .. }
                if contexts.values().chain(parameters.values()).any(|p| !p.is_replayable()) =>
            {
                Err(ReplayError::RequiresUserInput(index))
            }
            StepKind::Programmatic | StepKind::Unreadable(_) => Err(ReplayError::NotReplayable(index)),
            _ => Ok(()),
        }
    }

    fn evaluate(&mut self, index: usize) -> Result<(), ReplayError> {
        let record = self.record(index)?;
        let result = match &record.kind {
            StepKind::LocalFileRead { paths, plugin_reference } => {
                self.collaborators.read_local(paths, plugin_reference.as_deref())
            }
            StepKind::RemoteFileRead(source) => self.collaborators.read_remote(source),
            StepKind::CommandExecution { command_id,
                                         contexts,
                                         parameters,
                                         .. } => {
                let contexts = self.resolve_all(index, contexts)?;
                let args = self.resolve_all(index, parameters)?;
                self.collaborators.invoke_command(command_id, &contexts, &args)
            }
            StepKind::UserModification => return Err(ReplayError::RequiresUserInput(index)),
            StepKind::Programmatic | StepKind::Unreadable(_) => return Err(ReplayError::NotReplayable(index)),
        };
        match result {
            Ok(artifact) => {
                let type_tag = record.type_tag().unwrap_or("unreadable").to_string();
                debug!("replayed step {index} ({type_tag}, execution_tag={:?})", record.execution_tag());
                self.trace.push(TraceEntry { index,
                                             type_tag,
                                             execution_tag: record.execution_tag() });
                self.cache.insert(index, artifact);
                Ok(())
            }
            Err(source) => {
                warn!("replay of step {index} failed: {source}");
                Err(ReplayError::Failed { index, source })
            }
        }
    }

    fn resolve_all(&self, index: usize, params: &Parameters) -> Result<ResolvedArgs<C::Artifact>, ReplayError> {
        let mut out: ResolvedArgs<C::Artifact> = ResolvedArgs::with_capacity(params.len());
        for (name, param) in params {
            out.insert(name.clone(), self.resolve(index, param)?);
        }
        Ok(out)
    }

    fn resolve(&self, index: usize, param: &ParameterDescriptor) -> Result<ResolvedArgument<C::Artifact>, ReplayError> {
        let lookup = |step: usize| self.cache.get(&step).cloned().ok_or(ReplayError::NotReplayable(step));
        Ok(match param {
            ParameterDescriptor::Literal { value } => ResolvedArgument::Literal(value.clone()),
            ParameterDescriptor::ArtifactReference { step, .. } | ParameterDescriptor::WindowReference { step, .. } => {
                ResolvedArgument::Artifact(lookup(*step)?)
            }
            ParameterDescriptor::ArtifactReferenceList { steps } => {
                ResolvedArgument::Artifacts(steps.iter().map(|s| lookup(*s)).collect::<Result<_, _>>()?)
            }
            ParameterDescriptor::UserSupplied { .. } => return Err(ReplayError::RequiresUserInput(index)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollaboratorError;
    use crate::step::{Parameters, RemoteSource};
    use serde_json::{json, Value};
    use std::cell::{Cell, RefCell};
    use std::path::PathBuf;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
        fail_remote: Cell<bool>,
    }

    impl Recorder {
        fn count(&self, prefix: &str) -> usize {
            self.calls.borrow().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    impl Collaborators for Recorder {
        type Artifact = Value;

        fn read_local(&self, paths: &[PathBuf], plugin: Option<&str>) -> Result<Value, CollaboratorError> {
            let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            self.calls.borrow_mut().push(format!("read:{}", names.join(",")));
            Ok(json!({ "read": names, "plugin": plugin }))
        }

        fn read_remote(&self, source: &RemoteSource) -> Result<Value, CollaboratorError> {
            self.calls.borrow_mut().push(format!("remote:{}", source.location()));
            if self.fail_remote.get() {
                return Err("connection refused".into());
            }
            Ok(json!({ "remote": source.location() }))
        }

        fn invoke_command(&self,
                          command_id: &str,
                          contexts: &ResolvedArgs<Value>,
                          args: &ResolvedArgs<Value>)
                          -> Result<Value, CollaboratorError> {
            self.calls.borrow_mut().push(format!("cmd:{command_id}"));
            let mut out = json!({ "cmd": command_id, "args": as_json(args) });
            if !contexts.is_empty() {
                out["contexts"] = as_json(contexts);
            }
            Ok(out)
        }
    }

    fn as_json(args: &ResolvedArgs<Value>) -> Value {
        args.iter()
            .map(|(k, a)| {
                let v = match a {
                    ResolvedArgument::Literal(v) | ResolvedArgument::Artifact(v) => v.clone(),
                    ResolvedArgument::Artifacts(v) => Value::Array(v.clone()),
                };
                (k.clone(), v)
            })
            .collect::<serde_json::Map<String, Value>>()
            .into()
    }

    fn params(entries: &[(&str, ParameterDescriptor)]) -> Parameters {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn replays_read_then_command() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::local_read(["a.csv"], Some("csv_reader"))).unwrap();
        g.append(StepRecord::command("transpose", params(&[("table", ParameterDescriptor::artifact(0))]), 0, vec![0]))
         .unwrap();
        let collab = Recorder::default();
        let out = compute(&g, 1, &collab).unwrap();
        assert_eq!(*collab.calls.borrow(), vec!["read:a.csv", "cmd:transpose"]);
        assert_eq!(out["args"]["table"]["plugin"], json!("csv_reader"));
    }

    #[test]
    fn both_strategies_agree_and_memoize() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::local_read(["base.csv"], None)).unwrap();
        g.append(StepRecord::command("a", Parameters::new(), 1, vec![0])).unwrap();
        g.append(StepRecord::command("b", Parameters::new(), 2, vec![0])).unwrap();
        g.append(StepRecord::command("join",
                                     params(&[("l", ParameterDescriptor::artifact(1)), ("r", ParameterDescriptor::artifact(2))]),
                                     3,
                                     vec![1, 2]))
         .unwrap();

        let rec = Recorder::default();
        let mut engine = ReplayEngine::new(&g, &rec);
        let a = engine.compute_recursive(3).unwrap();
        let b = engine.compute_recursive(3).unwrap();
        assert_eq!(a, b);
        assert_eq!(rec.count("read:"), 1);
        assert_eq!(rec.calls.borrow().len(), 4);

        let it = Recorder::default();
        let c = ReplayEngine::new(&g, &it).compute_iterative(3).unwrap();
        assert_eq!(a, c);
        assert_eq!(*rec.calls.borrow(), *it.calls.borrow());
    }

    #[test]
    fn trace_keeps_execution_tags() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::local_read(["x"], None)).unwrap();
        g.append(StepRecord::command("late", Parameters::new(), 90, vec![0])).unwrap();
        g.append(StepRecord::command("early", Parameters::new(), 10, vec![0])).unwrap();
        g.append(StepRecord::command("both", Parameters::new(), 91, vec![1, 2])).unwrap();
        let rec = Recorder::default();
        let mut engine = ReplayEngine::new(&g, &rec);
        engine.compute(3).unwrap();
        let tags: Vec<Option<u64>> = engine.trace().iter().map(|t| t.execution_tag).collect();
        // Orden de dependencias, no de execution_tag.
        assert_eq!(tags, vec![None, Some(90), Some(10), Some(91)]);
    }

    #[test]
    fn failed_step_is_not_cached_and_can_be_retried() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::local_read(["local.csv"], None)).unwrap();
        g.append(StepRecord::remote_read(RemoteSource::new("h", "u", "/r.csv"))).unwrap();
        g.append(StepRecord::command("concat",
                                     params(&[("items", ParameterDescriptor::artifacts([0, 1]))]),
                                     0,
                                     vec![0, 1]))
         .unwrap();
        let rec = Recorder::default();
        rec.fail_remote.set(true);
        let mut engine = ReplayEngine::new(&g, &rec);
        let err = engine.compute(2).unwrap_err();
        assert!(matches!(err, ReplayError::Failed { index: 1, .. }));
        assert!(engine.cached(0).is_some());
        assert!(engine.cached(1).is_none());

        rec.fail_remote.set(false);
        let out = engine.compute(2).unwrap();
        assert_eq!(out["args"]["items"].as_array().unwrap().len(), 2);
        assert_eq!(rec.count("read:"), 1);
        assert_eq!(rec.count("remote:"), 2);
    }

    #[test]
    fn contexts_are_resolved_apart_from_arguments() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::local_read(["img.tif"], None)).unwrap();
        g.append(StepRecord::local_read(["mask.tif"], None)).unwrap();
        let crop = StepRecord::command("crop", params(&[("mask", ParameterDescriptor::artifact(1))]), 0, vec![])
            .with_context("window", ParameterDescriptor::window(0));
        g.append(crop).unwrap();

        let rec = Recorder::default();
        let out = compute(&g, 2, &rec).unwrap();
        assert_eq!(*rec.calls.borrow(), vec!["read:img.tif", "read:mask.tif", "cmd:crop"]);
        assert_eq!(out["contexts"]["window"]["read"], json!(["img.tif"]));
        assert_eq!(out["args"]["mask"]["read"], json!(["mask.tif"]));
        assert!(out["args"].get("window").is_none());
    }

    #[test]
    fn programmatic_requires_seed() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::programmatic()).unwrap();
        g.append(StepRecord::command("double", params(&[("x", ParameterDescriptor::artifact(0))]), 0, vec![0]))
         .unwrap();
        let rec = Recorder::default();
        assert!(matches!(compute(&g, 1, &rec), Err(ReplayError::NotReplayable(0))));

        let mut engine = ReplayEngine::new(&g, &rec);
        engine.seed(0, json!(21)).unwrap();
        let out = engine.compute(1).unwrap();
        assert_eq!(out["args"]["x"], json!(21));
        assert!(matches!(engine.seed(7, json!(0)), Err(ReplayError::IndexOutOfRange(7))));
    }

    #[test]
    fn user_supplied_parameter_blocks_before_dependencies() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::remote_read(RemoteSource::new("h", "u", "/x"))).unwrap();
        g.append(StepRecord::command("threshold",
                                     params(&[("img", ParameterDescriptor::artifact(0)),
                                              ("value", ParameterDescriptor::user_supplied(Some("value")))]),
                                     0,
                                     vec![0]))
         .unwrap();
        let rec = Recorder::default();
        for strategy in [ReplayStrategy::Recursive, ReplayStrategy::Iterative] {
            let opts = ReplayOptions { strategy, ..ReplayOptions::default() };
            let err = ReplayEngine::new(&g, &rec).with_options(opts).compute(1).unwrap_err();
            assert!(matches!(err, ReplayError::RequiresUserInput(1)));
        }
        assert!(rec.calls.borrow().is_empty());
    }

    #[test]
    fn deep_chain_uses_iterative_variant() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::local_read(["seed.txt"], None)).unwrap();
        for i in 0..5_000u64 {
            let prev = g.len() - 1;
            g.append(StepRecord::command("inc", Parameters::new(), i, vec![prev])).unwrap();
        }
        let rec = Recorder::default();
        let opts = ReplayOptions { strategy: ReplayStrategy::Auto, recursion_limit: 64 };
        let mut engine = ReplayEngine::new(&g, &rec).with_options(opts);
        engine.compute(g.len() - 1).unwrap();
        assert_eq!(engine.cache_len(), g.len());
        assert_eq!(rec.count("cmd:"), 5_000);
    }

    #[test]
    fn out_of_range_index() {
        let g = WorkflowGraph::new();
        assert!(matches!(compute(&g, 0, &Recorder::default()), Err(ReplayError::IndexOutOfRange(0))));
    }
}
