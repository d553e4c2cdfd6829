// src/span.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open interval `[first, last)` over input positions.
///
/// The AXIOM state carries [`Span::EMPTY`], which sits before position 0
/// and is never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub first: i32,
    pub last: i32,
}

impl Span {
    /// Marker span of the initial state.
    pub const EMPTY: Span = Span { first: -1, last: 0 };

    pub fn new(first: i32, last: i32) -> Self {
        Span { first, last }
    }

    /// The singleton span covering one token.
    ///
    /// # Panics
    ///
    /// Panics if `position + 1` does not fit in an `i32`.
    pub fn token(position: usize) -> Self {
        let first = i32::try_from(position)
            .ok()
            .filter(|&p| p < i32::MAX)
            .expect("token position exceeds the span range");
        Span::new(first, first + 1)
    }

    pub fn is_empty(&self) -> bool {
        *self == Span::EMPTY || self.first >= self.last
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.last - self.first) as usize
        }
    }

    /// Smallest span covering both operands.
    pub fn union(&self, other: &Span) -> Span {
        Span::new(self.first.min(other.first), self.last.max(other.last))
    }

    /// Position of the first covered token, clamped to zero for [`Span::EMPTY`].
    pub fn first_position(&self) -> usize {
        self.first.max(0) as usize
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.first, self.last)
    }
}
