//! Reloj monotónico para `execution_tag`.
//!
//! La capa de comandos de la aplicación es dueña del reloj y lo pasa
//! explícitamente; el core no guarda estado global.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::graph::WorkflowGraph;

#[derive(Debug, Default)]
pub struct ExecutionClock {
    next: AtomicU64,
}

impl ExecutionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reloj que continúa después del mayor tag presente en `graphs`
    /// (p. ej. tras cargar una sesión).
    pub fn resume_after<'a>(graphs: impl IntoIterator<Item = &'a WorkflowGraph>) -> Self {
        let next = graphs.into_iter()
                         .flat_map(|g| g.iter().filter_map(|s| s.execution_tag()))
                         .max()
                         .map_or(0, |max| max + 1);
        Self { next: AtomicU64::new(next) }
    }

    /// Devuelve el siguiente tag. Seguro entre hilos.
    pub fn tick(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Parameters, StepRecord};

    #[test]
    fn ticks_are_strictly_increasing() {
        let clock = ExecutionClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(b > a);
        assert_eq!(clock.peek(), b + 1);
    }

    #[test]
    fn resume_continues_after_loaded_tags() {
        let mut g = WorkflowGraph::new();
        g.append(StepRecord::local_read(["x.csv"], None)).unwrap();
        g.append(StepRecord::command("sort", Parameters::new(), 41, vec![0])).unwrap();
        let clock = ExecutionClock::resume_after([&g]);
        assert_eq!(clock.tick(), 42);
        assert_eq!(ExecutionClock::resume_after(Vec::<&WorkflowGraph>::new()).tick(), 0);
    }
}
