//! Serialización del grafo a la lista plana de dicts etiquetados.
//!
//! Cada registro lleva su tag `"type"` explícito. Al leer, un registro con tag
//! desconocido o mal formado se conserva como placeholder `Unreadable` para no
//! perder el resto de la sesión; en cambio, un padre fuera de rango en un
//! registro legible invalida el grafo completo.
use log::warn;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::WorkflowGraph;
use crate::errors::GraphError;
use crate::step::StepRecord;

impl WorkflowGraph {
    pub fn to_dict(&self) -> Value {
        Value::Array(self.iter().map(StepRecord::to_tagged_dict).collect())
    }

    pub fn from_dict(value: &Value) -> Result<Self, GraphError> {
        let items = value.as_array().ok_or(GraphError::NotAnArray)?;
        let mut graph = WorkflowGraph::new();
        for (index, item) in items.iter().enumerate() {
            match StepRecord::from_tagged_dict(item) {
                Ok(record) => {
                    graph.append(record)?;
                }
                Err(err) => {
                    warn!("workflow record {index} unreadable, keeping placeholder: {err}");
                    let mut placeholder = StepRecord::unreadable(item.clone(), &err);
                    placeholder.retain_earlier(index);
                    graph.push_unchecked(placeholder);
                }
            }
        }
        Ok(graph)
    }

    /// Cantidad de registros que se cargaron como placeholder.
    pub fn unreadable_count(&self) -> usize {
        self.iter().filter(|s| s.is_unreadable()).count()
    }
}

impl Serialize for WorkflowGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dict().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        WorkflowGraph::from_dict(&value).map_err(D::Error::custom)
    }
}
