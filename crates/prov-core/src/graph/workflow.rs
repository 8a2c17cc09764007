//! `WorkflowGraph`: lista ordenada de `StepRecord` con aristas por índice.
//!
//! El orden de inserción es un orden topológico: un registro sólo puede
//! referenciar índices anteriores, así que los ciclos son imposibles por
//! construcción. El grafo nunca modifica un registro existente.
use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::GraphError;
use crate::hashing::hash_value;
use crate::step::StepRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowGraph {
    steps: Vec<StepRecord>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grafo de un único registro sin padres.
    pub fn single(record: StepRecord) -> Result<Self, GraphError> {
        let mut g = Self::new();
        g.append(record)?;
        Ok(g)
    }

    /// Construye un grafo validando cada registro en orden.
    pub fn from_records(records: impl IntoIterator<Item = StepRecord>) -> Result<Self, GraphError> {
        let mut g = Self::new();
        for r in records {
            g.append(r)?;
        }
        Ok(g)
    }

    /// Agrega un registro y devuelve su índice. Padres y referencias de
    /// parámetros deben apuntar a índices ya existentes; si no, el grafo no
    /// se modifica.
    pub fn append(&mut self, record: StepRecord) -> Result<usize, GraphError> {
        let index = self.steps.len();
        if let Some(parent) = record.dependencies().into_iter().find(|d| *d >= index) {
            return Err(GraphError::InvalidParentReference { index, parent });
        }
        self.steps.push(record);
        Ok(index)
    }

    pub(crate) fn push_unchecked(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepRecord> {
        self.steps.get(index)
    }

    pub(crate) fn checked(&self, index: usize) -> Result<&StepRecord, GraphError> {
        self.steps.get(index).ok_or(GraphError::IndexOutOfRange { index, len: self.len() })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepRecord> {
        self.steps.iter()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.steps.len().checked_sub(1)
    }

    pub fn last_id(&self) -> Result<Uuid, GraphError> {
        self.last().map(|s| s.id).ok_or(GraphError::Empty)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn id_to_index_map(&self) -> HashMap<Uuid, usize> {
        self.steps.iter().enumerate().map(|(i, s)| (s.id, i)).collect()
    }

    /// Dependencias directas del step `index` (padres + referencias).
    pub fn dependencies(&self, index: usize) -> Result<Vec<usize>, GraphError> {
        Ok(self.checked(index)?.dependencies())
    }

    /// Concatena grafos descartando registros cuyo `id` ya apareció, y
    /// reescribe padres y referencias al espacio de índices resultante.
    ///
    /// Sólo deduplica por identidad de registro: dos grafos grabados de forma
    /// independiente nunca comparten registros aunque lean los mismos paths.
    pub fn concat<'a>(graphs: impl IntoIterator<Item = &'a WorkflowGraph>) -> WorkflowGraph {
        let mut out = WorkflowGraph::new();
        let mut seen: HashMap<Uuid, usize> = HashMap::new();
        for g in graphs {
            let mut local: Vec<usize> = Vec::with_capacity(g.len());
            for step in g.iter() {
                if let Some(&merged) = seen.get(&step.id) {
                    local.push(merged);
                    continue;
                }
                // Índices locales válidos (< posición) ya están en `local`.
                let rewritten = step.remapped(&|i| local.get(i).copied().unwrap_or(i));
                let merged = out.len();
                out.push_unchecked(rewritten);
                seen.insert(step.id, merged);
                local.push(merged);
            }
        }
        out
    }

    /// Fingerprint del contenido: hash del JSON canónico de los registros sin
    /// `id` ni `datetime`. Dos grafos que registran las mismas operaciones en
    /// el mismo orden tienen el mismo fingerprint.
    pub fn fingerprint(&self) -> String {
        let content: Vec<Value> = self.steps
                                      .iter()
                                      .map(|s| match s.to_tagged_dict() {
                                          Value::Object(mut m) => {
                                              m.remove("id");
                                              m.remove("datetime");
                                              Value::Object(m)
                                          }
                                          other => other,
                                      })
                                      .collect();
        hash_value(&Value::Array(content))
    }

    /// Command ids usados en el grafo, sin repetidos.
    pub fn command_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .filter_map(|s| match &s.kind {
                crate::step::StepKind::CommandExecution { command_id, .. } => Some(command_id.as_str()),
                _ => None,
            })
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Resumen por tipo de registro (`type` -> cantidad).
    pub fn summary(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for s in &self.steps {
            let tag = s.type_tag().unwrap_or("unreadable").to_string();
            let n = out.get(&tag).and_then(Value::as_u64).unwrap_or(0);
            out.insert(tag, Value::from(n + 1));
        }
        out
    }
}

impl<'a> IntoIterator for &'a WorkflowGraph {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
