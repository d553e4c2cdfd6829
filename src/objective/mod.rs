// src/objective/mod.rs

//! Training objectives over a candidate and an oracle agenda.
//!
//! An objective compares the final steps of two agendas built over the
//! same sentence, returns a scalar loss and records per-state loss
//! contributions in a [`Backward`] context for the backpropagation driver.

mod margin;
mod semiring;

pub use margin::MarginEvalb;
pub use semiring::LogWeight;

use std::collections::BTreeSet;
use std::fmt::Debug;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ObjectiveError;
use crate::parser::{Parser, StateId};

/// Objective tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveOptions {
    /// Multiplier applied to model scores before normalization.
    pub scale: f64,
}

impl Default for ObjectiveOptions {
    fn default() -> Self {
        ObjectiveOptions { scale: 1.0 }
    }
}

/// Loss accumulated on one state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BackwardState {
    pub loss: f64,
}

/// Per-instance backward context.
///
/// Holds the loss attributed to each state and, per step, the states that
/// received any. One context belongs to one training instance; it is never
/// shared between sentences.
#[derive(Debug, Clone, Default)]
pub struct Backward {
    backward: FxHashMap<StateId, BackwardState>,
    states: Vec<BTreeSet<StateId>>,
}

impl Backward {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.backward.clear();
        self.states.clear();
    }

    /// Adds `loss` to `state` and marks it active at `step`.
    pub fn accumulate(&mut self, state: StateId, step: usize, loss: f64) {
        self.backward.entry(state).or_default().loss += loss;
        if self.states.len() <= step {
            self.states.resize_with(step + 1, BTreeSet::new);
        }
        self.states[step].insert(state);
    }

    pub fn get(&self, state: StateId) -> Option<&BackwardState> {
        self.backward.get(&state)
    }

    /// Accumulated loss of `state`, zero when none was attributed.
    pub fn loss(&self, state: StateId) -> f64 {
        self.get(state).map_or(0.0, |b| b.loss)
    }

    /// Active states at `step`, in id order.
    pub fn states(&self, step: usize) -> impl Iterator<Item = StateId> + '_ {
        self.states.get(step).into_iter().flatten().copied()
    }

    /// Number of steps with bookkeeping, active or not.
    pub fn steps(&self) -> usize {
        self.states.len()
    }

    pub fn len(&self) -> usize {
        self.backward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backward.is_empty()
    }
}

/// A margin objective between candidate and oracle agendas.
pub trait Margin {
    /// Returns the objective value, attributing per-state losses into
    /// `backward`. On error `backward` is left untouched.
    fn margin<S>(
        &mut self,
        candidates: &Parser<S>,
        oracles: &Parser<S>,
        options: &ObjectiveOptions,
        backward: &mut Backward,
    ) -> Result<f64, ObjectiveError>
    where
        S: Clone + Default + Debug;
}
