//! Sub-grafo de ancestros de un step.
//!
//! Recorrido iterativo con worklist (sin recursión) seguido de un filtrado
//! estable que renumbera los índices de forma densa preservando el orden.
use std::collections::BTreeSet;

use super::WorkflowGraph;
use crate::errors::GraphError;

impl WorkflowGraph {
    /// Índices requeridos para reproducir `index`, en orden ascendente.
    pub fn ancestor_indices(&self, index: usize) -> Result<BTreeSet<usize>, GraphError> {
        self.checked(index)?;
        let mut required = BTreeSet::from([index]);
        let mut worklist = vec![index];
        while let Some(current) = worklist.pop() {
            for dep in self.steps()[current].dependencies() {
                if required.insert(dep) {
                    worklist.push(dep);
                }
            }
        }
        Ok(required)
    }

    /// Sub-grafo inducido por `index` y todo lo alcanzable desde él a través
    /// de padres y referencias de parámetros, renumerado de forma densa.
    /// El último registro del resultado es siempre `index`.
    pub fn ancestors_of(&self, index: usize) -> Result<WorkflowGraph, GraphError> {
        let required = self.ancestor_indices(index)?;
        let mut remap = vec![usize::MAX; index + 1];
        let mut out = WorkflowGraph::new();
        for old in required {
            remap[old] = out.len();
            let record = self.steps()[old].remapped(&|i| remap[i]);
            out.push_unchecked(record);
        }
        Ok(out)
    }

    /// Índices del slice de `index` que impiden un replay desatendido:
    /// ediciones manuales, parámetros que hay que volver a pedir, steps
    /// programáticos (sin valor persistido que releer) y registros ilegibles.
    pub fn replay_blockers(&self, index: usize) -> Result<Vec<usize>, GraphError> {
        Ok(self.ancestor_indices(index)?
               .into_iter()
               .filter(|i| {
                   let s = &self.steps()[*i];
                   !s.is_replayable() || s.is_unreadable()
               })
               .collect())
    }
}
