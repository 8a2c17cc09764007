//! `StepRecord`: un paso del workflow y su origen.
//!
//! Cada registro describe cómo se obtuvo un artifact (lectura local, lectura
//! remota, creación programática, ejecución de comando o edición manual) y
//! apunta por índice a los registros que consumió. Los registros son valores
//! inmutables: una nueva derivación siempre agrega un registro nuevo.
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::parameter::{check_context_tag, check_parameter_tag, ParameterDescriptor, Parameters};
use crate::errors::StepDecodeError;

/// Tags de serialización conocidos para registros.
pub const STEP_TAGS: [&str; 5] = ["programmatic", "local-reader", "scp-reader", "command", "user-modification"];

/// Origen remoto de un artifact copiado con un mecanismo de transferencia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    pub host: String,
    pub username: String,
    /// Ruta POSIX en el host remoto.
    pub remote_path: String,
    /// La transferencia corre dentro de WSL y el destino local necesita
    /// traducción de ruta.
    #[serde(default)]
    pub wsl: bool,
    #[serde(default, rename = "plugin")]
    pub plugin_reference: Option<String>,
}

impl RemoteSource {
    pub fn new(host: impl Into<String>, username: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self { host: host.into(),
               username: username.into(),
               remote_path: remote_path.into(),
               wsl: false,
               plugin_reference: None }
    }

    /// `user@host:/path`, formato aceptado por scp.
    pub fn location(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.remote_path)
    }

    /// Nombre de archivo del path remoto; `None` si el path no nombra un
    /// archivo (`""`, `"/"`).
    pub fn file_name(&self) -> Option<&str> {
        self.remote_path.rsplit('/').find(|s| !s.is_empty() && *s != "." && *s != "..")
    }
}

/// Registro que no pudo decodificarse. Conserva el dict original para
/// volver a escribirlo sin pérdida.
#[derive(Debug, Clone, PartialEq)]
pub struct UnreadableStep {
    pub type_tag: Option<String>,
    pub reason: String,
    pub raw: Value,
    /// Índices citados en `parameters`/`contexts` del dict original
    /// (`"step"` y `"steps"`). Se mantienen en el mismo espacio de índices
    /// que `parents`.
    pub references: Vec<usize>,
}

impl UnreadableStep {
    /// Copia con `references` y los índices del dict original reescritos
    /// por `map`. Sólo se tocan valores presentes en `references`.
    fn remapped(&self, map: &dyn Fn(usize) -> usize) -> Self {
        let mut raw = self.raw.clone();
        for section in ["parameters", "contexts"] {
            if let Some(params) = raw.get_mut(section).and_then(Value::as_object_mut) {
                for p in params.values_mut() {
                    remap_raw_reference(p, &self.references, map);
                }
            }
        }
        Self { type_tag: self.type_tag.clone(),
               reason: self.reason.clone(),
               raw,
               references: self.references.iter().map(|r| map(*r)).collect() }
    }
}

fn remap_raw_reference(param: &mut Value, known: &[usize], map: &dyn Fn(usize) -> usize) {
    let rewrite = |v: &mut Value| {
        if let Some(i) = v.as_u64().map(|i| i as usize).filter(|i| known.contains(i)) {
            *v = json!(map(i));
        }
    };
    if let Some(step) = param.get_mut("step") {
        rewrite(step);
    }
    if let Some(steps) = param.get_mut("steps").and_then(Value::as_array_mut) {
        steps.iter_mut().for_each(rewrite);
    }
}

/// Índices citados por los parámetros y contextos de un dict crudo.
fn raw_references(raw: &Value) -> Vec<usize> {
    let mut out = Vec::new();
    for section in ["contexts", "parameters"] {
        let Some(params) = raw.get(section).and_then(Value::as_object) else { continue };
        for p in params.values() {
            let single = p.get("step").and_then(Value::as_u64);
            let many = p.get("steps").and_then(Value::as_array).into_iter().flatten().filter_map(Value::as_u64);
            for i in single.into_iter().chain(many) {
                let i = i as usize;
                if !out.contains(&i) {
                    out.push(i);
                }
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum StepKind {
    /// Creado en proceso; no hay nada persistido que releer.
    #[serde(rename = "programmatic")]
    Programmatic,
    #[serde(rename = "local-reader")]
    LocalFileRead {
        paths: Vec<PathBuf>,
        #[serde(default, rename = "plugin")]
        plugin_reference: Option<String>,
    },
    #[serde(rename = "scp-reader")]
    RemoteFileRead(RemoteSource),
    #[serde(rename = "command")]
    CommandExecution {
        command_id: String,
        /// Modelo o ventana sobre el que se invocó el comando; sólo
        /// referencias `model`/`window`.
        #[serde(default)]
        contexts: Parameters,
        #[serde(default)]
        parameters: Parameters,
        /// Orden global de ejecución; sólo diagnóstico.
        execution_tag: u64,
    },
    #[serde(rename = "user-modification")]
    UserModification,
    #[serde(skip)]
    Unreadable(UnreadableStep),
}

impl StepKind {
    pub fn type_tag(&self) -> Option<&str> {
        match self {
            StepKind::Programmatic => Some("programmatic"),
            StepKind::LocalFileRead { .. } => Some("local-reader"),
            StepKind::RemoteFileRead(_) => Some("scp-reader"),
            StepKind::CommandExecution { .. } => Some("command"),
            StepKind::UserModification => Some("user-modification"),
            StepKind::Unreadable(u) => u.type_tag.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Identificador único en runtime; base de la deduplicación en `concat`.
    pub id: Uuid,
    pub datetime: DateTime<Utc>,
    /// Índices (en el grafo dueño) de los artifacts consumidos.
    pub parents: Vec<usize>,
    pub kind: StepKind,
}

impl StepRecord {
    pub fn new(kind: StepKind, parents: Vec<usize>) -> Self {
        Self { id: Uuid::new_v4(),
               datetime: Utc::now(),
               parents,
               kind }
    }

    pub fn programmatic() -> Self {
        Self::new(StepKind::Programmatic, Vec::new())
    }

    pub fn local_read<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>, plugin_reference: Option<&str>) -> Self {
        Self::new(StepKind::LocalFileRead { paths: paths.into_iter().map(Into::into).collect(),
                                            plugin_reference: plugin_reference.map(str::to_owned) },
                  Vec::new())
    }

    pub fn remote_read(source: RemoteSource) -> Self {
        Self::new(StepKind::RemoteFileRead(source), Vec::new())
    }

    pub fn command(command_id: impl Into<String>, parameters: Parameters, execution_tag: u64, parents: Vec<usize>) -> Self {
        Self::new(StepKind::CommandExecution { command_id: command_id.into(),
                                               contexts: Parameters::new(),
                                               parameters,
                                               execution_tag },
                  parents)
    }

    /// Agrega un contexto (modelo o ventana) a un registro de comando. En
    /// cualquier otro tipo de registro no tiene efecto.
    pub fn with_context(mut self, name: impl Into<String>, context: ParameterDescriptor) -> Self {
        if let StepKind::CommandExecution { contexts, .. } = &mut self.kind {
            contexts.insert(name.into(), context);
        }
        self
    }

    /// Edición manual del artifact producido en `original`.
    pub fn user_modification(original: usize) -> Self {
        Self::new(StepKind::UserModification, vec![original])
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.kind.type_tag()
    }

    pub fn execution_tag(&self) -> Option<u64> {
        match &self.kind {
            StepKind::CommandExecution { execution_tag, .. } => Some(*execution_tag),
            _ => None,
        }
    }

    /// `false` si reproducir el registro requiere intervención humana.
    pub fn is_replayable(&self) -> bool {
        match &self.kind {
            // Sin valor persistido: sólo se reproduce si se siembra a mano.
            StepKind::Programmatic | StepKind::UserModification => false,
            StepKind::CommandExecution { contexts, parameters, .. } => {
                contexts.values().chain(parameters.values()).all(ParameterDescriptor::is_replayable)
            }
            _ => true,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self.kind, StepKind::Unreadable(_))
    }

    /// Padres directos seguidos de los índices referenciados por contextos y
    /// parámetros, sin repetidos y en orden de aparición.
    pub fn dependencies(&self) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::with_capacity(self.parents.len());
        let referenced = match &self.kind {
            StepKind::CommandExecution { contexts, parameters, .. } => contexts.values()
                                                                               .chain(parameters.values())
                                                                               .flat_map(|p| p.referenced_steps().iter().copied())
                                                                               .collect(),
            StepKind::Unreadable(u) => u.references.clone(),
            _ => Vec::new(),
        };
        for idx in self.parents.iter().copied().chain(referenced) {
            if !out.contains(&idx) {
                out.push(idx);
            }
        }
        out
    }

    /// Copia con padres y referencias reescritos por `map`. `id` y `datetime`
    /// se conservan.
    pub(crate) fn remapped(&self, map: &dyn Fn(usize) -> usize) -> Self {
        let kind = match &self.kind {
            StepKind::CommandExecution { command_id,
                                         contexts,
                                         parameters,
                                         execution_tag, } => StepKind::CommandExecution {
                command_id: command_id.clone(),
                contexts: contexts.iter().map(|(k, p)| (k.clone(), p.remapped(map))).collect(),
                parameters: parameters.iter().map(|(k, p)| (k.clone(), p.remapped(map))).collect(),
                execution_tag: *execution_tag,
            },
            StepKind::Unreadable(u) => StepKind::Unreadable(u.remapped(map)),
            other => other.clone(),
        };
        Self { id: self.id,
               datetime: self.datetime,
               parents: self.parents.iter().map(|p| map(*p)).collect(),
               kind }
    }

    pub fn to_tagged_dict(&self) -> Value {
        let mut d = match &self.kind {
            StepKind::Unreadable(u) => match &u.raw {
                Value::Object(m) => m.clone(),
                _ => Map::new(),
            },
            kind => kind_fields(kind),
        };
        d.insert("id".into(), Value::String(self.id.to_string()));
        d.insert("datetime".into(), json!(self.datetime));
        d.insert("parents".into(), json!(self.parents));
        if !self.is_unreadable() {
            d.insert("replayable".into(), Value::Bool(self.is_replayable()));
        }
        Value::Object(d)
    }

    pub fn from_tagged_dict(value: &Value) -> Result<Self, StepDecodeError> {
        let obj = value.as_object()
                       .ok_or_else(|| StepDecodeError::Malformed("record must be a JSON object".into()))?;
        let tag = obj.get("type").and_then(Value::as_str).ok_or(StepDecodeError::MissingTag)?;
        if !STEP_TAGS.contains(&tag) {
            return Err(StepDecodeError::UnknownStepKind(tag.to_string()));
        }
        if tag == "command" {
            if let Some(contexts) = obj.get("contexts").and_then(Value::as_object) {
                for (name, c) in contexts {
                    check_context_tag(name, c)?;
                }
            }
            if let Some(params) = obj.get("parameters").and_then(Value::as_object) {
                for p in params.values() {
                    check_parameter_tag(p)?;
                }
            }
        }
        let (id, datetime, parents) = header_fields(obj)?;
        let kind: StepKind = serde_json::from_value(value.clone()).map_err(|e| StepDecodeError::Malformed(e.to_string()))?;
        Ok(Self { id, datetime, parents, kind })
    }

    /// Placeholder para un dict que no pudo decodificarse. Se rescatan
    /// `id`, `datetime` y `parents` si son legibles.
    pub fn unreadable(raw: Value, reason: &StepDecodeError) -> Self {
        let type_tag = raw.get("type").and_then(Value::as_str).map(str::to_owned);
        let references = raw_references(&raw);
        let (id, datetime, parents) = raw.as_object()
                                         .and_then(|obj| header_fields(obj).ok())
                                         .unwrap_or_else(|| (Uuid::new_v4(), Utc::now(), Vec::new()));
        Self { id,
               datetime,
               parents,
               kind: StepKind::Unreadable(UnreadableStep { type_tag,
                                                           reason: reason.to_string(),
                                                           raw,
                                                           references }) }
    }

    /// Descarta padres y referencias de un placeholder que no apunten a un
    /// registro anterior a `index`. No afecta a registros legibles.
    pub(crate) fn retain_earlier(&mut self, index: usize) {
        if let StepKind::Unreadable(u) = &mut self.kind {
            self.parents.retain(|p| *p < index);
            u.references.retain(|r| *r < index);
        }
    }
}

fn kind_fields(kind: &StepKind) -> Map<String, Value> {
    let mut d = Map::new();
    if let Some(tag) = kind.type_tag() {
        d.insert("type".into(), Value::String(tag.to_string()));
    }
    match kind {
        StepKind::LocalFileRead { paths, plugin_reference } => {
            let paths: Vec<Value> = paths.iter().map(|p| Value::String(p.to_string_lossy().into_owned())).collect();
            d.insert("paths".into(), Value::Array(paths));
            d.insert("plugin".into(), json!(plugin_reference));
        }
        StepKind::RemoteFileRead(src) => {
            d.insert("host".into(), Value::String(src.host.clone()));
            d.insert("username".into(), Value::String(src.username.clone()));
            d.insert("remote_path".into(), Value::String(src.remote_path.clone()));
            d.insert("wsl".into(), Value::Bool(src.wsl));
            d.insert("plugin".into(), json!(src.plugin_reference));
        }
        StepKind::CommandExecution { command_id,
                                     contexts,
                                     parameters,
                                     execution_tag, } => {
            let ctx: Map<String, Value> = contexts.iter().map(|(k, p)| (k.clone(), p.to_tagged_dict())).collect();
            let params: Map<String, Value> = parameters.iter().map(|(k, p)| (k.clone(), p.to_tagged_dict())).collect();
            d.insert("command_id".into(), Value::String(command_id.clone()));
            d.insert("contexts".into(), Value::Object(ctx));
            d.insert("parameters".into(), Value::Object(params));
            d.insert("execution_tag".into(), json!(execution_tag));
        }
        StepKind::Programmatic | StepKind::UserModification | StepKind::Unreadable(_) => {}
    }
    d
}

type Header = (Uuid, DateTime<Utc>, Vec<usize>);

fn header_fields(obj: &Map<String, Value>) -> Result<Header, StepDecodeError> {
    let malformed = |field: &str, e: serde_json::Error| StepDecodeError::Malformed(format!("{field}: {e}"));
    let id = match obj.get("id") {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| malformed("id", e))?,
        None => Uuid::new_v4(),
    };
    let datetime = match obj.get("datetime") {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| malformed("datetime", e))?,
        None => Utc::now(),
    };
    let parents = match obj.get("parents") {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| malformed("parents", e))?,
        None => Vec::new(),
    };
    Ok((id, datetime, parents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ParameterDescriptor;

    fn transpose(tag: u64) -> StepRecord {
        let mut params = Parameters::new();
        params.insert("table".into(), ParameterDescriptor::artifact(0));
        params.insert("inplace".into(), ParameterDescriptor::literal(false));
        StepRecord::command("transpose", params, tag, vec![0])
    }

    #[test]
    fn every_variant_roundtrips_through_tagged_dict() {
        let mut remote = RemoteSource::new("lab-server", "alice", "/data/run1.tif");
        remote.wsl = true;
        remote.plugin_reference = Some("tiff_reader".into());
        let records = vec![StepRecord::programmatic(),
                           StepRecord::local_read(["a.csv", "b.csv"], Some("csv_reader")),
                           StepRecord::local_read(["only.txt"], None),
                           StepRecord::remote_read(remote),
                           transpose(7),
                           transpose(8).with_context("window", ParameterDescriptor::window(0)),
                           StepRecord::user_modification(1)];
        for r in records {
            let d = r.to_tagged_dict();
            assert_eq!(d["type"], json!(r.type_tag().unwrap()));
            let back = StepRecord::from_tagged_dict(&d).expect("decode");
            assert_eq!(back, r);
        }
    }

    #[test]
    fn replayable_flag_is_written() {
        assert_eq!(transpose(1).to_tagged_dict()["replayable"], json!(true));
        assert_eq!(StepRecord::user_modification(0).to_tagged_dict()["replayable"], json!(false));
        assert_eq!(StepRecord::programmatic().to_tagged_dict()["replayable"], json!(false));

        let mut params = Parameters::new();
        params.insert("sigma".into(), ParameterDescriptor::user_supplied(Some("sigma")));
        let prompt = StepRecord::command("blur", params, 2, vec![0]);
        assert!(!prompt.is_replayable());
        assert_eq!(prompt.to_tagged_dict()["replayable"], json!(false));
    }

    #[test]
    fn unknown_tags_are_reported() {
        let err = StepRecord::from_tagged_dict(&json!({"type": "http-reader", "url": "x"})).unwrap_err();
        assert_eq!(err, StepDecodeError::UnknownStepKind("http-reader".into()));

        let d = json!({"type": "command", "command_id": "c", "execution_tag": 0,
                       "parameters": {"w": {"type": "callback", "value": 1}}});
        let err = StepRecord::from_tagged_dict(&d).unwrap_err();
        assert_eq!(err, StepDecodeError::UnknownParameterKind("callback".into()));

        let d = json!({"type": "command", "command_id": "c", "execution_tag": 0,
                       "contexts": {"x": {"type": "literal", "value": 1}}});
        assert!(matches!(StepRecord::from_tagged_dict(&d), Err(StepDecodeError::Malformed(_))));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let err = StepRecord::from_tagged_dict(&json!({"type": "local-reader"})).unwrap_err();
        assert!(matches!(err, StepDecodeError::Malformed(_)));
    }

    #[test]
    fn placeholder_reserializes_raw_dict() {
        let raw = json!({"type": "future-kind", "id": Uuid::new_v4().to_string(), "parents": [0], "extra": 1});
        let err = StepRecord::from_tagged_dict(&raw).unwrap_err();
        let rec = StepRecord::unreadable(raw.clone(), &err);
        assert!(rec.is_unreadable());
        assert_eq!(rec.parents, vec![0]);
        assert_eq!(rec.type_tag(), Some("future-kind"));
        let out = rec.to_tagged_dict();
        assert_eq!(out["extra"], json!(1));
        assert_eq!(out["id"], raw["id"]);
    }

    #[test]
    fn dependencies_merge_parents_and_references() {
        let mut params = Parameters::new();
        params.insert("a".into(), ParameterDescriptor::artifact(2));
        params.insert("b".into(), ParameterDescriptor::artifacts([0, 3]));
        let rec = StepRecord::command("join", params, 0, vec![0, 1]);
        assert_eq!(rec.dependencies(), vec![0, 1, 2, 3]);
        assert_eq!(rec.execution_tag(), Some(0));

        let on_window = StepRecord::command("crop", Parameters::new(), 1, vec![]).with_context("window", ParameterDescriptor::window(4));
        assert_eq!(on_window.dependencies(), vec![4]);
        assert_eq!(on_window.remapped(&|i| i - 4).dependencies(), vec![0]);
    }

    #[test]
    fn placeholder_references_follow_reindexing() {
        let raw = json!({"type": "future-command", "parents": [3],
                         "parameters": {"t": {"type": "model", "step": 3}, "l": {"type": "list", "steps": [1, 3]},
                                        "n": {"type": "literal", "value": 1}}});
        let err = StepRecord::from_tagged_dict(&raw).unwrap_err();
        let rec = StepRecord::unreadable(raw, &err);
        assert_eq!(rec.dependencies(), vec![3, 1]);

        let moved = rec.remapped(&|i| i / 2);
        assert_eq!(moved.dependencies(), vec![1, 0]);
        let out = moved.to_tagged_dict();
        assert_eq!(out["parents"], json!([1]));
        assert_eq!(out["parameters"]["t"]["step"], json!(1));
        assert_eq!(out["parameters"]["l"]["steps"], json!([0, 1]));
        assert_eq!(out["parameters"]["n"]["value"], json!(1));
    }

    #[test]
    fn remote_source_location() {
        let src = RemoteSource::new("h", "u", "/home/u/data/img.tif");
        assert_eq!(src.location(), "u@h:/home/u/data/img.tif");
        assert_eq!(src.file_name(), Some("img.tif"));
        assert_eq!(RemoteSource::new("h", "u", "/data/dir/").file_name(), Some("dir"));
        assert_eq!(RemoteSource::new("h", "u", "/").file_name(), None);
        assert_eq!(RemoteSource::new("h", "u", "").file_name(), None);
    }
}
