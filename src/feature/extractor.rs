// src/feature/extractor.rs

use std::fmt;

use super::FeatureVector;
use crate::symbol::Symbol;

/// Sparse feature extraction, one method per transition kind.
///
/// Each call fills `features` with the features of the new state and returns
/// the extractor's own state for it, which later transitions receive back as
/// their ancestor handles. Implementations must be deterministic and are
/// shared read-only across sentences.
pub trait FeatureExtractor {
    type State: Clone + Default + fmt::Debug;

    fn axiom(&self, features: &mut FeatureVector) -> Self::State;

    fn shift(
        &self,
        label: &Symbol,
        head: &Symbol,
        previous: &Self::State,
        features: &mut FeatureVector,
    ) -> Self::State;

    /// `right` is the state being reduced, `left` the one merged into it.
    fn reduce(
        &self,
        label: &Symbol,
        right: &Self::State,
        left: &Self::State,
        features: &mut FeatureVector,
    ) -> Self::State;

    fn unary(&self, label: &Symbol, child: &Self::State, features: &mut FeatureVector)
        -> Self::State;

    fn finalize(&self, state: &Self::State, features: &mut FeatureVector) -> Self::State;

    fn idle(&self, state: &Self::State, features: &mut FeatureVector) -> Self::State;
}

/// Label and lexical head of the constituent a state stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelContext {
    pub label: Symbol,
    pub head: Symbol,
}

impl Default for LabelContext {
    fn default() -> Self {
        LabelContext {
            label: Symbol::axiom(),
            head: Symbol::epsilon(),
        }
    }
}

/// Indicator features over transition labels, child labels and heads.
///
/// Reduced constituents take the head of their right child.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelFeatures;

impl FeatureExtractor for LabelFeatures {
    type State = LabelContext;

    fn axiom(&self, features: &mut FeatureVector) -> LabelContext {
        features.fire("axiom");
        LabelContext::default()
    }

    fn shift(
        &self,
        label: &Symbol,
        head: &Symbol,
        previous: &LabelContext,
        features: &mut FeatureVector,
    ) -> LabelContext {
        features.fire(&format!("shift:{label}"));
        features.fire(&format!("shift:{label}:{head}"));
        features.fire(&format!("shift:{label}:after:{}", previous.label));
        LabelContext {
            label: label.clone(),
            head: head.clone(),
        }
    }

    fn reduce(
        &self,
        label: &Symbol,
        right: &LabelContext,
        left: &LabelContext,
        features: &mut FeatureVector,
    ) -> LabelContext {
        features.fire(&format!("reduce:{label}"));
        features.fire(&format!("reduce:{label}:{}:{}", left.label, right.label));
        features.fire(&format!("reduce:{label}:head:{}", right.head));
        LabelContext {
            label: label.clone(),
            head: right.head.clone(),
        }
    }

    fn unary(&self, label: &Symbol, child: &LabelContext, features: &mut FeatureVector) -> LabelContext {
        features.fire(&format!("unary:{label}"));
        features.fire(&format!("unary:{label}:{}", child.label));
        LabelContext {
            label: label.clone(),
            head: child.head.clone(),
        }
    }

    fn finalize(&self, state: &LabelContext, features: &mut FeatureVector) -> LabelContext {
        features.fire(&format!("final:{}", state.label));
        LabelContext {
            label: Symbol::final_label(),
            head: state.head.clone(),
        }
    }

    fn idle(&self, state: &LabelContext, features: &mut FeatureVector) -> LabelContext {
        features.fire("idle");
        state.clone()
    }
}
