// src/parser/agenda.rs

use super::StateId;

/// Per-step buckets of states; bucket `i` holds every state with `step == i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Agenda {
    buckets: Vec<Vec<StateId>>,
}

impl Agenda {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: usize, state: StateId) {
        if self.buckets.len() <= step {
            self.buckets.resize_with(step + 1, Vec::new);
        }
        self.buckets[step].push(state);
    }

    /// States at `step`; empty past the last step.
    pub fn bucket(&self, step: usize) -> &[StateId] {
        self.buckets.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of steps, including empty intermediate buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &[StateId]> + '_ {
        self.buckets.iter().map(Vec::as_slice)
    }
}
