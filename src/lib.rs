// src/lib.rs

//! `srparse`: a neural shift-reduce parser.
//!
//! States form a persistent DAG built by six operators (see [`parser`]),
//! their sparse features are stored in a compact delta/varint encoding
//! (see [`feature`]) and training compares candidate and oracle agendas
//! with an expected-F1 margin (see [`objective`]). All trainable
//! parameters live in a shared [`model::Model`].

pub mod config;
pub mod error;
pub mod feature;
pub mod model;
pub mod objective;
pub mod parser;
pub mod span;
pub mod symbol;

pub use error::{CodecError, ModelError, ObjectiveError, ParseError};
pub use feature::{Feature, FeatureExtractor, FeatureVector, FeatureVectorCompact, FeatureWeights};
pub use model::{Gradient, Model, ModelVocab};
pub use objective::{Backward, Margin, MarginEvalb, ObjectiveOptions};
pub use parser::{Agenda, Parser, ParserState, StateId, Transition};
pub use span::Span;
pub use symbol::Symbol;
