// src/model/vocab.rs

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::symbol::Symbol;

/// Dense symbol indexing. Index 0 is always `<unk>`, which unseen symbols map to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Symbol>", into = "Vec<Symbol>")]
pub struct Vocab {
    symbols: Vec<Symbol>,
    index: HashMap<Symbol, usize>,
}

impl Vocab {
    pub fn new<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut vocab = Vocab {
            symbols: Vec::new(),
            index: HashMap::new(),
        };
        vocab.insert(Symbol::unknown());
        for symbol in symbols {
            vocab.insert(symbol);
        }
        vocab
    }

    fn insert(&mut self, symbol: Symbol) {
        if !self.index.contains_key(&symbol) {
            self.index.insert(symbol.clone(), self.symbols.len());
            self.symbols.push(symbol);
        }
    }

    /// Index of `symbol`, or 0 when unseen.
    pub fn index_of(&self, symbol: &Symbol) -> usize {
        self.index.get(symbol).copied().unwrap_or(0)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

impl From<Vec<Symbol>> for Vocab {
    fn from(symbols: Vec<Symbol>) -> Self {
        Vocab::new(symbols)
    }
}

impl From<Vocab> for Vec<Symbol> {
    fn from(vocab: Vocab) -> Self {
        vocab.symbols
    }
}

/// Terminal and label vocabularies of a model.
///
/// The label vocabulary always holds `[FINAL]` and `[IDLE]` so that the
/// closing transitions have classification rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVocab {
    pub terminals: Vocab,
    pub labels: Vocab,
}

impl ModelVocab {
    pub fn new<T, L>(terminals: T, labels: L) -> Self
    where
        T: IntoIterator<Item = Symbol>,
        L: IntoIterator<Item = Symbol>,
    {
        let labels = labels
            .into_iter()
            .chain([Symbol::final_label(), Symbol::idle()]);
        ModelVocab {
            terminals: Vocab::new(terminals),
            labels: Vocab::new(labels),
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ModelError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self, ModelError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_index_zero() {
        let vocab = Vocab::new(["the", "dog", "the"].map(Symbol::new));
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.get(0), Some(&Symbol::unknown()));
        assert_eq!(vocab.index_of(&Symbol::new("dog")), 2);
        assert_eq!(vocab.index_of(&Symbol::new("cat")), 0);
    }

    #[test]
    fn labels_include_closing_symbols() {
        let vocab = ModelVocab::new(Vec::new(), vec![Symbol::new("NP")]);
        assert!(vocab.labels.contains(&Symbol::final_label()));
        assert!(vocab.labels.contains(&Symbol::idle()));
        assert_eq!(vocab.labels.len(), 4);
    }

    #[test]
    fn json_keeps_order_and_rebuilds_index() {
        let vocab = ModelVocab::new(
            ["a", "b"].map(Symbol::new),
            ["S", "NP"].map(Symbol::new),
        );
        let json = serde_json::to_string(&vocab).unwrap();
        let back: ModelVocab = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vocab);
        assert_eq!(back.labels.index_of(&Symbol::new("NP")), 2);
    }
}
