// src/parser/state.rs

use std::fmt;

use ndarray::Array1;

use crate::feature::FeatureVectorCompact;
use crate::span::Span;
use crate::symbol::Symbol;

/// Index of a state in its parser's arena.
///
/// Ids are only meaningful for the [`Parser`](super::Parser) that issued
/// them, and only until that parser's next AXIOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    /// # Panics
    ///
    /// Panics if `index` does not fit in a `u32`.
    pub(crate) fn new(index: usize) -> Self {
        StateId(u32::try_from(index).expect("state arena exceeds u32::MAX entries"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Axiom,
    Shift,
    Reduce,
    Unary,
    Final,
    Idle,
}

/// The transition that produced a state.
///
/// `closure` counts consecutive UNARY transitions ending at this state and
/// is zero for every other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    pub kind: OperationKind,
    pub closure: u32,
}

impl Operation {
    pub const fn new(kind: OperationKind) -> Self {
        Operation { kind, closure: 0 }
    }

    pub const fn unary(closure: u32) -> Self {
        Operation {
            kind: OperationKind::Unary,
            closure,
        }
    }

    pub fn is_unary(&self) -> bool {
        self.kind == OperationKind::Unary
    }

    /// True once the derivation has been closed by FINAL.
    pub fn is_finished(&self) -> bool {
        matches!(self.kind, OperationKind::Final | OperationKind::Idle)
    }

    /// REDUCE and UNARY states stand for constituents.
    pub fn is_constituent(&self) -> bool {
        matches!(self.kind, OperationKind::Reduce | OperationKind::Unary)
    }
}

/// One immutable node of the derivation DAG.
///
/// `S` is the feature extractor's per-state handle.
#[derive(Debug, Clone)]
pub struct ParserState<S> {
    pub step: usize,
    /// Next input position to shift.
    pub next: usize,
    /// Consecutive UNARY depth.
    pub unary: usize,
    pub operation: Operation,
    pub label: Symbol,
    pub head: Symbol,
    pub span: Span,

    /// Top of the stack below this state.
    pub stack: Option<StateId>,
    /// State this one was derived from.
    pub derivation: Option<StateId>,
    /// Left child merged away by REDUCE.
    pub reduced: Option<StateId>,

    pub feature_state: S,
    pub feature_vector: FeatureVectorCompact,

    pub layer: Array1<f64>,
    pub score: f64,
}
