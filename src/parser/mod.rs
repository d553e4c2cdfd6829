// src/parser/mod.rs

//! The shift-reduce state machine.
//!
//! A [`Parser`] owns the states of one sentence in an append-only arena and
//! indexes them by step in an [`Agenda`]. Each operator reads one or more
//! existing states, composes a new hidden layer from the model's
//! label-specific weight block, scores the transition and appends exactly
//! one new state. Existing states are never touched again, so hypotheses in
//! a beam share their common prefixes.
//!
//! The operators trust their caller: a beam controller that shifts past the
//! end of the input or reduces a shallow stack is a bug, and the operators
//! panic on it. [`Parser::apply`] is the checked entry point.

mod agenda;
mod state;
mod transition;


pub use agenda::Agenda;
pub use state::{Operation, OperationKind, ParserState, StateId};
pub use transition::Transition;

use std::fmt::Debug;

use log::trace;
use ndarray::{s, Array1, Array2, ArrayView2};

use crate::feature::{FeatureExtractor, FeatureVector};
use crate::model::Model;
use crate::span::Span;
use crate::symbol::Symbol;

/// Per-sentence parsing context.
#[derive(Debug, Clone, Default)]
pub struct Parser<S> {
    states: Vec<ParserState<S>>,
    agenda: Agenda,
    input: Vec<Symbol>,
    /// Right-to-left encoding of the input, `hidden x (n + 1)`.
    queue: Array2<f64>,
    /// Left-to-right encoding of the input, `hidden x (n + 1)`.
    buffer: Array2<f64>,
}

fn category<'a>(block: &'a Array2<f64>, offset: usize, hidden: usize) -> ArrayView2<'a, f64> {
    block.slice(s![offset..offset + hidden, ..])
}

fn classify(model: &Model, label: &Symbol, layer: &Array1<f64>) -> f64 {
    let row = model.offset_classification(label);
    model.weights.wc.row(row).dot(layer)
}

impl<S> Parser<S>
where
    S: Clone + Default + Debug,
{
    pub fn new() -> Self {
        Parser {
            states: Vec::new(),
            agenda: Agenda::new(),
            input: Vec::new(),
            queue: Array2::zeros((0, 0)),
            buffer: Array2::zeros((0, 0)),
        }
    }

    pub fn state(&self, id: StateId) -> &ParserState<S> {
        &self.states[id.index()]
    }

    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    pub fn input(&self) -> &[Symbol] {
        &self.input
    }

    pub fn queue(&self) -> &Array2<f64> {
        &self.queue
    }

    pub fn buffer(&self) -> &Array2<f64> {
        &self.buffer
    }

    /// Number of states allocated for the current sentence.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Walks the derivation chain from `id` back to the AXIOM state.
    pub fn derivation(&self, id: StateId) -> Derivation<'_, S> {
        Derivation {
            parser: self,
            current: Some(id),
        }
    }

    fn push(&mut self, state: ParserState<S>) -> StateId {
        let id = StateId::new(self.states.len());
        self.agenda.push(state.step, id);
        self.states.push(state);
        id
    }

    /// Starts a new sentence.
    ///
    /// Drops every state of the previous sentence, encodes `input` into the
    /// queue and buffer sequences and allocates the initial state.
    pub fn axiom<F>(&mut self, model: &Model, extractor: &F, input: &[Symbol]) -> StateId
    where
        F: FeatureExtractor<State = S>,
    {
        self.states.clear();
        self.agenda.clear();
        self.input = input.to_vec();

        let w = &model.weights;
        let h = model.hidden;
        let n = input.len();

        let mut queue = Array2::zeros((h, n + 1));
        queue.column_mut(n).assign(&w.bqe.mapv(Model::activation));
        for i in (0..n).rev() {
            let mut pre = w.bqu.clone();
            pre += &w.wqu.slice(s![.., ..h]).dot(&queue.column(i + 1));
            pre += &w.wqu.slice(s![.., h..]).dot(&model.embedding_of(&input[i]));
            pre.mapv_inplace(Model::activation);
            queue.column_mut(i).assign(&pre);
        }

        let mut buffer = Array2::zeros((h, n + 1));
        buffer.column_mut(0).assign(&w.bbs.mapv(Model::activation));
        for i in 0..n {
            let mut pre = w.bbu.clone();
            pre += &w.wbu.slice(s![.., ..h]).dot(&buffer.column(i));
            pre += &w.wbu.slice(s![.., h..]).dot(&model.embedding_of(&input[i]));
            pre.mapv_inplace(Model::activation);
            buffer.column_mut(i + 1).assign(&pre);
        }

        self.queue = queue;
        self.buffer = buffer;

        let mut features = FeatureVector::new();
        let feature_state = extractor.axiom(&mut features);
        let score = features.dot(&w.wfe);

        trace!("axiom over {} tokens, score {:.4}", n, score);

        self.push(ParserState {
            step: 0,
            next: 0,
            unary: 0,
            operation: Operation::new(OperationKind::Axiom),
            label: Symbol::axiom(),
            head: Symbol::epsilon(),
            span: Span::EMPTY,
            stack: None,
            derivation: None,
            reduced: None,
            feature_state,
            feature_vector: features.compact(),
            layer: w.ba.mapv(Model::activation),
            score,
        })
    }

    /// Shifts input position `state.next` with `label`.
    ///
    /// # Panics
    ///
    /// Panics if the input is exhausted (`state.next >= n`).
    pub fn shift<F>(
        &mut self,
        model: &Model,
        extractor: &F,
        id: StateId,
        head: &Symbol,
        label: &Symbol,
    ) -> StateId
    where
        F: FeatureExtractor<State = S>,
    {
        let state = &self.states[id.index()];
        let next = state.next;
        assert!(
            next < self.input.len(),
            "shift at {} past the end of a {}-token input",
            next,
            self.input.len()
        );

        let w = &model.weights;
        let h = model.hidden;
        let e = model.embedding;
        let c = model.offset_category(label);
        let block = category(&w.wsh, c, h);

        let mut layer = w.bsh.slice(s![c..c + h]).to_owned();
        layer += &block.slice(s![.., ..h]).dot(&state.layer);
        layer += &block.slice(s![.., h..h + e]).dot(&model.embedding_of(head));
        layer += &block.slice(s![.., h + e..2 * h + e]).dot(&self.queue.column(next));
        layer += &block.slice(s![.., 2 * h + e..]).dot(&self.buffer.column(next));
        layer.mapv_inplace(Model::activation);

        let mut features = FeatureVector::new();
        let feature_state = extractor.shift(label, head, &state.feature_state, &mut features);
        let score = state.score + features.dot(&w.wfe) + classify(model, label, &layer);

        trace!("shift {} {} at {} from {}, score {:.4}", label, head, next, id, score);

        let new = ParserState {
            step: state.step + 1,
            next: next + 1,
            unary: 0,
            operation: Operation::new(OperationKind::Shift),
            label: label.clone(),
            head: head.clone(),
            span: Span::token(next),
            stack: Some(id),
            derivation: Some(id),
            reduced: None,
            feature_state,
            feature_vector: features.compact(),
            layer,
            score,
        };
        self.push(new)
    }

    /// Merges the two topmost stacked states into one constituent.
    ///
    /// # Panics
    ///
    /// Panics unless `state.stack` and its own `stack` are both present.
    pub fn reduce<F>(&mut self, model: &Model, extractor: &F, id: StateId, label: &Symbol) -> StateId
    where
        F: FeatureExtractor<State = S>,
    {
        let right = &self.states[id.index()];
        let left_id = right.stack.expect("reduce needs a stacked left child");
        let left = &self.states[left_id.index()];
        let below_id = left.stack.expect("reduce needs a state below the left child");
        let below = &self.states[below_id.index()];

        let w = &model.weights;
        let h = model.hidden;
        let c = model.offset_category(label);
        let block = category(&w.wre, c, h);

        let mut layer = w.bre.slice(s![c..c + h]).to_owned();
        layer += &block.slice(s![.., ..h]).dot(&right.layer);
        layer += &block.slice(s![.., h..2 * h]).dot(&left.layer);
        layer += &block.slice(s![.., 2 * h..3 * h]).dot(&below.layer);
        layer += &block
            .slice(s![.., 3 * h..4 * h])
            .dot(&self.queue.column(right.next));
        layer += &block
            .slice(s![.., 4 * h..])
            .dot(&self.buffer.column(left.span.first_position()));
        layer.mapv_inplace(Model::activation);

        let mut features = FeatureVector::new();
        let feature_state = extractor.reduce(
            label,
            &right.feature_state,
            &left.feature_state,
            &mut features,
        );
        let score = right.score + features.dot(&w.wfe) + classify(model, label, &layer);
        let span = left.span.union(&right.span);

        trace!("reduce {} over {} from {}, score {:.4}", label, span, id, score);

        let new = ParserState {
            step: right.step + 1,
            next: right.next,
            unary: 0,
            operation: Operation::new(OperationKind::Reduce),
            label: label.clone(),
            head: Symbol::epsilon(),
            span,
            stack: Some(below_id),
            derivation: Some(id),
            reduced: Some(left_id),
            feature_state,
            feature_vector: features.compact(),
            layer,
            score,
        };
        self.push(new)
    }

    /// Relabels the top constituent with `label`.
    ///
    /// # Panics
    ///
    /// Panics if `state.stack` is absent. Bounding unary chains is left to
    /// the caller, using [`Operation::closure`] or [`ParserState::unary`].
    pub fn unary<F>(&mut self, model: &Model, extractor: &F, id: StateId, label: &Symbol) -> StateId
    where
        F: FeatureExtractor<State = S>,
    {
        let state = &self.states[id.index()];
        let stack_id = state.stack.expect("unary needs a stacked state");
        let stack = &self.states[stack_id.index()];

        let w = &model.weights;
        let h = model.hidden;
        let c = model.offset_category(label);
        let block = category(&w.wu, c, h);

        let mut layer = w.bu.slice(s![c..c + h]).to_owned();
        layer += &block.slice(s![.., ..h]).dot(&state.layer);
        layer += &block.slice(s![.., h..2 * h]).dot(&stack.layer);
        layer += &block
            .slice(s![.., 2 * h..3 * h])
            .dot(&self.queue.column(state.next));
        layer += &block
            .slice(s![.., 3 * h..])
            .dot(&self.buffer.column(state.span.first_position()));
        layer.mapv_inplace(Model::activation);

        let mut features = FeatureVector::new();
        let feature_state = extractor.unary(label, &state.feature_state, &mut features);
        let score = state.score + features.dot(&w.wfe) + classify(model, label, &layer);

        let closure = if state.operation.is_unary() {
            state.operation.closure + 1
        } else {
            1
        };

        trace!("unary {} over {} (closure {}), score {:.4}", label, state.span, closure, score);

        let new = ParserState {
            step: state.step + 1,
            next: state.next,
            unary: state.unary + 1,
            operation: Operation::unary(closure),
            label: label.clone(),
            head: Symbol::epsilon(),
            span: state.span,
            stack: state.stack,
            derivation: Some(id),
            reduced: None,
            feature_state,
            feature_vector: features.compact(),
            layer,
            score,
        };
        self.push(new)
    }

    /// Closes the derivation ending at `id`.
    pub fn finalize<F>(&mut self, model: &Model, extractor: &F, id: StateId) -> StateId
    where
        F: FeatureExtractor<State = S>,
    {
        let state = &self.states[id.index()];
        let w = &model.weights;

        let mut layer = w.bf.clone();
        layer += &w.wf.dot(&state.layer);
        layer.mapv_inplace(Model::activation);

        let label = Symbol::final_label();
        let mut features = FeatureVector::new();
        let feature_state = extractor.finalize(&state.feature_state, &mut features);
        let score = state.score + features.dot(&w.wfe) + classify(model, &label, &layer);

        trace!("final from {}, score {:.4}", id, score);

        let new = ParserState {
            step: state.step + 1,
            next: state.next,
            unary: 0,
            operation: Operation::new(OperationKind::Final),
            label,
            head: Symbol::epsilon(),
            span: state.span,
            stack: state.stack,
            derivation: Some(id),
            reduced: None,
            feature_state,
            feature_vector: features.compact(),
            layer,
            score,
        };
        self.push(new)
    }

    /// Pads a finished derivation by one step.
    pub fn idle<F>(&mut self, model: &Model, extractor: &F, id: StateId) -> StateId
    where
        F: FeatureExtractor<State = S>,
    {
        let state = &self.states[id.index()];
        let w = &model.weights;

        let mut layer = w.bi.clone();
        layer += &w.wi.dot(&state.layer);
        layer.mapv_inplace(Model::activation);

        let label = Symbol::idle();
        let mut features = FeatureVector::new();
        let feature_state = extractor.idle(&state.feature_state, &mut features);
        let score = state.score + features.dot(&w.wfe) + classify(model, &label, &layer);

        trace!("idle from {}, score {:.4}", id, score);

        let new = ParserState {
            step: state.step + 1,
            next: state.next,
            unary: 0,
            operation: Operation::new(OperationKind::Idle),
            label,
            head: Symbol::epsilon(),
            span: state.span,
            stack: state.stack,
            derivation: Some(id),
            reduced: None,
            feature_state,
            feature_vector: features.compact(),
            layer,
            score,
        };
        self.push(new)
    }
}

/// Iterator over a derivation chain, newest state first.
pub struct Derivation<'a, S> {
    parser: &'a Parser<S>,
    current: Option<StateId>,
}

impl<'a, S> Iterator for Derivation<'a, S> {
    type Item = (StateId, &'a ParserState<S>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let state = &self.parser.states[id.index()];
        self.current = state.derivation;
        Some((id, state))
    }
}
