// src/parser/transition.rs

use std::fmt::{self, Debug};

use log::trace;
use serde::{Deserialize, Serialize};

use super::{Parser, StateId};
use crate::error::ParseError;
use crate::feature::FeatureExtractor;
use crate::model::Model;
use crate::symbol::Symbol;

/// One step of a derivation script.
///
/// Serialized as `{"op": "shift", "label": "NN"}`, `{"op": "final"}` and so on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Transition {
    Shift { label: Symbol },
    Reduce { label: Symbol },
    Unary { label: Symbol },
    Final,
    Idle,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Shift { label } => write!(f, "SHIFT({label})"),
            Transition::Reduce { label } => write!(f, "REDUCE({label})"),
            Transition::Unary { label } => write!(f, "UNARY({label})"),
            Transition::Final => f.write_str("FINAL"),
            Transition::Idle => f.write_str("IDLE"),
        }
    }
}

impl<S> Parser<S>
where
    S: Clone + Default + Debug,
{
    /// Applies `transition` to `id` after checking its preconditions.
    ///
    /// SHIFT takes its head from the input. UNARY is refused once the
    /// state's closure reaches `unary_limit`.
    pub fn apply<F>(
        &mut self,
        model: &Model,
        extractor: &F,
        id: StateId,
        transition: &Transition,
        unary_limit: usize,
    ) -> Result<StateId, ParseError>
    where
        F: FeatureExtractor<State = S>,
    {
        if id.index() >= self.states.len() {
            return Err(ParseError::NoAxiom);
        }
        let state = self.state(id);
        let finished = state.operation.is_finished();

        match transition {
            Transition::Idle => {
                if !finished {
                    return Err(ParseError::IdleBeforeFinal);
                }
                Ok(self.idle(model, extractor, id))
            }
            _ if finished => Err(ParseError::AfterFinal),
            Transition::Shift { label } => {
                let len = self.input.len();
                let head = self.input.get(state.next).cloned().ok_or(ParseError::ShiftPastEnd {
                    next: state.next,
                    len,
                })?;
                Ok(self.shift(model, extractor, id, &head, label))
            }
            Transition::Reduce { label } => {
                let depth_ok = state
                    .stack
                    .map_or(false, |left| self.state(left).stack.is_some());
                if !depth_ok {
                    return Err(ParseError::ShallowStack);
                }
                Ok(self.reduce(model, extractor, id, label))
            }
            Transition::Unary { label } => {
                if state.stack.is_none() {
                    return Err(ParseError::MissingStack);
                }
                if state.operation.closure as usize >= unary_limit {
                    return Err(ParseError::UnaryLimit { limit: unary_limit });
                }
                Ok(self.unary(model, extractor, id, label))
            }
            Transition::Final => Ok(self.finalize(model, extractor, id)),
        }
    }

    /// Applies `script` in order from `start`, returning the last state.
    pub fn replay<'t, F, I>(
        &mut self,
        model: &Model,
        extractor: &F,
        start: StateId,
        script: I,
        unary_limit: usize,
    ) -> Result<StateId, ParseError>
    where
        F: FeatureExtractor<State = S>,
        I: IntoIterator<Item = &'t Transition>,
    {
        let mut id = start;
        for transition in script {
            id = self.apply(model, extractor, id, transition, unary_limit)?;
            trace!("replayed {} -> {}", transition, id);
        }
        Ok(id)
    }

    /// Appends IDLE states after a finished derivation until it reaches `step`.
    pub fn pad_idle<F>(
        &mut self,
        model: &Model,
        extractor: &F,
        id: StateId,
        step: usize,
    ) -> Result<StateId, ParseError>
    where
        F: FeatureExtractor<State = S>,
    {
        let mut id = id;
        while self.state(id).step < step {
            id = self.apply(model, extractor, id, &Transition::Idle, 0)?;
        }
        Ok(id)
    }

    /// True when the derivation ending at `id` has been closed by FINAL.
    pub fn is_finished(&self, id: StateId) -> bool {
        self.state(id).operation.is_finished()
    }
}
