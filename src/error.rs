// src/error.rs

//! Error types for the parser, the feature codec, the objective and model I/O.

use thiserror::Error;

/// Failure while decoding a compact feature buffer.
///
/// Any of these means the buffer is corrupt or was produced by an
/// incompatible encoder. Decoding never skips ahead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid value tag {tag:#04x} at byte {offset}")]
    InvalidTag { tag: u8, offset: usize },
    #[error("buffer truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("feature id varint overflows 64 bits at byte {offset}")]
    VarintOverflow { offset: usize },
    #[error("feature id does not increase at byte {offset}")]
    UnorderedId { offset: usize },
    #[error("running feature id passes u64::MAX at byte {offset}")]
    IdOverflow { offset: usize },
}

/// A transition rejected by validated replay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no axiom state; call axiom() before applying transitions")]
    NoAxiom,
    #[error("shift at position {next} past the end of a {len}-token input")]
    ShiftPastEnd { next: usize, len: usize },
    #[error("reduce needs two stacked states")]
    ShallowStack,
    #[error("unary needs a stacked state")]
    MissingStack,
    #[error("unary closure already at the limit of {limit}")]
    UnaryLimit { limit: usize },
    #[error("only idle transitions may follow a final state")]
    AfterFinal,
    #[error("idle is only valid after a final state")]
    IdleBeforeFinal,
}

/// Structural mismatch between a candidate and an oracle agenda.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveError {
    #[error("candidate agenda has {candidate} steps but oracle agenda has {oracle}")]
    AgendaMismatch { candidate: usize, oracle: usize },
}

/// Model or gradient persistence failure.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("vocabulary JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("block {block} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        block: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("header declares hidden={hidden} embedding={embedding}, vocabulary needs {expected_hidden}/{expected_embedding}")]
    HeaderMismatch {
        hidden: usize,
        embedding: usize,
        expected_hidden: usize,
        expected_embedding: usize,
    },
}
