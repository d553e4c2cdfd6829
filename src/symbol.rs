// src/symbol.rs

//! Label and word symbols.
//!
//! A [`Symbol`] is a cheaply clonable, immutable name. Labels produced by
//! binarizing an n-ary constituent carry a trailing `^` (`NP^`) and are
//! skipped when constituents are scored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const AXIOM: &str = "[AXIOM]";
const FINAL: &str = "[FINAL]";
const IDLE: &str = "[IDLE]";
const EPSILON: &str = "<epsilon>";
const UNKNOWN: &str = "<unk>";

/// An immutable label or terminal name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label of the initial state.
    pub fn axiom() -> Self {
        Symbol::new(AXIOM)
    }

    /// Label of a finished derivation.
    pub fn final_label() -> Self {
        Symbol::new(FINAL)
    }

    /// Label of padding states appended after FINAL.
    pub fn idle() -> Self {
        Symbol::new(IDLE)
    }

    /// The empty head used by every non-SHIFT state.
    pub fn epsilon() -> Self {
        Symbol::new(EPSILON)
    }

    /// Vocabulary entry that unseen words and labels fall back to.
    pub fn unknown() -> Self {
        Symbol::new(UNKNOWN)
    }

    /// True for labels introduced by binarization.
    pub fn is_binarized(&self) -> bool {
        self.0.len() > 1 && self.0.ends_with('^')
    }

    pub fn is_epsilon(&self) -> bool {
        &*self.0 == EPSILON
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Symbol(Arc::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binarized_labels_end_with_caret() {
        assert!(Symbol::new("NP^").is_binarized());
        assert!(!Symbol::new("NP").is_binarized());
        assert!(!Symbol::new("^").is_binarized());
    }

    #[test]
    fn reserved_symbols_are_distinct() {
        let reserved = [
            Symbol::axiom(),
            Symbol::final_label(),
            Symbol::idle(),
            Symbol::epsilon(),
            Symbol::unknown(),
        ];
        for (i, a) in reserved.iter().enumerate() {
            for b in &reserved[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(Symbol::epsilon().is_epsilon());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Symbol::new("VP")).unwrap();
        assert_eq!(json, "\"VP\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "VP");
    }
}
