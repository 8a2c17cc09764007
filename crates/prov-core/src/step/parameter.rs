//! Descriptores de parámetros de un `CommandExecution`.
//!
//! Un parámetro es un literal, una referencia al artifact producido por otro
//! step del grafo (por índice), una referencia a la ventana que mostraba ese
//! artifact, una lista de referencias o un valor que debe pedirse de nuevo a
//! una persona durante el replay.
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::StepDecodeError;

/// Tags de serialización conocidos para parámetros.
pub const PARAMETER_TAGS: [&str; 5] = ["literal", "model", "window", "list", "user-input"];

/// Tags admitidos como contexto de un comando.
pub const CONTEXT_TAGS: [&str; 2] = ["model", "window"];

/// Parámetros de un comando, en el orden en que fueron pasados.
pub type Parameters = IndexMap<String, ParameterDescriptor>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ParameterDescriptor {
    /// Valor escalar/string/número/booleano opaco.
    #[serde(rename = "literal")]
    Literal { value: Value },
    /// Sustituir por el artifact producido en `step`.
    #[serde(rename = "model")]
    ArtifactReference {
        step: usize,
        #[serde(default)]
        model_type: Option<String>,
    },
    /// Como `ArtifactReference`, pero el comando recibió la ventana que
    /// mostraba el artifact.
    #[serde(rename = "window")]
    WindowReference {
        step: usize,
        #[serde(default)]
        model_type: Option<String>,
    },
    #[serde(rename = "list")]
    ArtifactReferenceList { steps: Vec<usize> },
    /// Valor que hay que volver a pedir al usuario; bloquea el replay desatendido.
    #[serde(rename = "user-input")]
    UserSupplied {
        #[serde(default)]
        label: Option<String>,
    },
}

impl ParameterDescriptor {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal { value: value.into() }
    }

    pub fn artifact(step: usize) -> Self {
        Self::ArtifactReference { step, model_type: None }
    }

    pub fn typed_artifact(step: usize, model_type: impl Into<String>) -> Self {
        Self::ArtifactReference { step, model_type: Some(model_type.into()) }
    }

    pub fn window(step: usize) -> Self {
        Self::WindowReference { step, model_type: None }
    }

    pub fn artifacts(steps: impl IntoIterator<Item = usize>) -> Self {
        Self::ArtifactReferenceList { steps: steps.into_iter().collect() }
    }

    pub fn user_supplied(label: Option<&str>) -> Self {
        Self::UserSupplied { label: label.map(str::to_owned) }
    }

    /// Tag de serialización de la variante.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Literal { .. } => "literal",
            Self::ArtifactReference { .. } => "model",
            Self::WindowReference { .. } => "window",
            Self::ArtifactReferenceList { .. } => "list",
            Self::UserSupplied { .. } => "user-input",
        }
    }

    pub fn is_replayable(&self) -> bool {
        !matches!(self, Self::UserSupplied { .. })
    }

    /// Índices del grafo que este parámetro consume.
    pub fn referenced_steps(&self) -> &[usize] {
        match self {
            Self::ArtifactReference { step, .. } | Self::WindowReference { step, .. } => std::slice::from_ref(step),
            Self::ArtifactReferenceList { steps } => steps,
            Self::Literal { .. } | Self::UserSupplied { .. } => &[],
        }
    }

    /// Copia con las referencias reescritas por `map`.
    pub(crate) fn remapped(&self, map: &dyn Fn(usize) -> usize) -> Self {
        match self {
            Self::ArtifactReference { step, model_type } => Self::ArtifactReference { step: map(*step),
                                                                                      model_type: model_type.clone() },
            Self::WindowReference { step, model_type } => Self::WindowReference { step: map(*step),
                                                                                  model_type: model_type.clone() },
            Self::ArtifactReferenceList { steps } => Self::ArtifactReferenceList { steps: steps.iter().map(|s| map(*s)).collect() },
            other => other.clone(),
        }
    }

    pub fn to_tagged_dict(&self) -> Value {
        match self {
            Self::Literal { value } => json!({ "type": "literal", "value": value }),
            Self::ArtifactReference { step, model_type } | Self::WindowReference { step, model_type } => {
                let mut d = json!({ "type": self.type_tag(), "step": step });
                if let Some(mt) = model_type {
                    d["model_type"] = Value::String(mt.clone());
                }
                d
            }
            Self::ArtifactReferenceList { steps } => json!({ "type": "list", "steps": steps }),
            Self::UserSupplied { label } => {
                let mut d = json!({ "type": "user-input", "replayable": false });
                if let Some(l) = label {
                    d["label"] = Value::String(l.clone());
                }
                d
            }
        }
    }

    pub fn from_tagged_dict(value: &Value) -> Result<Self, StepDecodeError> {
        check_parameter_tag(value)?;
        serde_json::from_value(value.clone()).map_err(|e| StepDecodeError::Malformed(e.to_string()))
    }
}

/// Verifica que el dict tenga un tag de parámetro conocido.
pub(crate) fn check_parameter_tag(value: &Value) -> Result<(), StepDecodeError> {
    let tag = value.get("type").and_then(Value::as_str).ok_or(StepDecodeError::MissingTag)?;
    if PARAMETER_TAGS.contains(&tag) {
        Ok(())
    } else {
        Err(StepDecodeError::UnknownParameterKind(tag.to_string()))
    }
}

/// Un contexto sólo puede referenciar un modelo o una ventana.
pub(crate) fn check_context_tag(name: &str, value: &Value) -> Result<(), StepDecodeError> {
    check_parameter_tag(value)?;
    match value.get("type").and_then(Value::as_str) {
        Some(tag) if CONTEXT_TAGS.contains(&tag) => Ok(()),
        other => Err(StepDecodeError::Malformed(format!("context {name:?} must reference a model or window, got {:?}",
                                                        other.unwrap_or_default()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_dict_roundtrip_keeps_variant() {
        let params = [ParameterDescriptor::literal(3.5),
                      ParameterDescriptor::typed_artifact(2, "table"),
                      ParameterDescriptor::window(5),
                      ParameterDescriptor::artifacts([0, 1]),
                      ParameterDescriptor::user_supplied(Some("threshold"))];
        for p in params {
            let back = ParameterDescriptor::from_tagged_dict(&p.to_tagged_dict()).expect("decode");
            assert_eq!(back, p);
        }
    }

    #[test]
    fn user_supplied_is_flagged_non_replayable() {
        let d = ParameterDescriptor::user_supplied(None).to_tagged_dict();
        assert_eq!(d["replayable"], json!(false));
        assert!(ParameterDescriptor::artifact(0).to_tagged_dict().get("replayable").is_none());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = ParameterDescriptor::from_tagged_dict(&json!({"type": "callback", "step": 1})).unwrap_err();
        assert_eq!(err, StepDecodeError::UnknownParameterKind("callback".into()));
        let err = ParameterDescriptor::from_tagged_dict(&json!({"step": 1})).unwrap_err();
        assert_eq!(err, StepDecodeError::MissingTag);
    }

    #[test]
    fn window_reference_is_tagged_window() {
        let d = ParameterDescriptor::WindowReference { step: 1, model_type: Some("image".into()) }.to_tagged_dict();
        assert_eq!(d, json!({"type": "window", "step": 1, "model_type": "image"}));
        assert!(check_context_tag("w", &d).is_ok());
        let lit = ParameterDescriptor::literal(1).to_tagged_dict();
        assert!(matches!(check_context_tag("x", &lit), Err(StepDecodeError::Malformed(_))));
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = ParameterDescriptor::from_tagged_dict(&json!({"type": "model"})).unwrap_err();
        assert!(matches!(err, StepDecodeError::Malformed(_)));
    }

    #[test]
    fn referenced_steps_cover_both_reference_kinds() {
        assert_eq!(ParameterDescriptor::artifact(4).referenced_steps(), &[4]);
        assert_eq!(ParameterDescriptor::artifacts([1, 2]).referenced_steps(), &[1, 2]);
        assert_eq!(ParameterDescriptor::window(3).referenced_steps(), &[3]);
        assert_eq!(ParameterDescriptor::window(3).remapped(&|i| i - 1), ParameterDescriptor::window(2));
        assert!(ParameterDescriptor::literal("x").referenced_steps().is_empty());
    }
}
