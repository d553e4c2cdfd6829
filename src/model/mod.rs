// src/model/mod.rs

//! The shared parameter model.
//!
//! A [`Model`] owns every weight block plus the vocabularies that address
//! them. Each label owns one row of the classification matrix
//! ([`Model::offset_classification`]) and one `hidden`-row block of every
//! composition matrix ([`Model::offset_category`]); the blocks are disjoint
//! and together cover the matrices' rows. The model is only read while
//! parsing, so one instance can be shared by concurrent sentences.

mod gradient;
mod io;
mod vocab;
mod weights;

pub use gradient::Gradient;
pub use vocab::{ModelVocab, Vocab};
pub use weights::{Geometry, Weights};

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};
use std::path::Path;

use log::debug;
use ndarray::ArrayView1;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::ModelError;
use crate::symbol::Symbol;
use io::Header;

pub const WEIGHTS_FILE: &str = "model.bin";
pub const VOCAB_FILE: &str = "vocab.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub hidden: usize,
    pub embedding: usize,
    /// Number of updates applied so far.
    pub count: u64,
    pub vocab: ModelVocab,
    pub weights: Weights,
}

impl Model {
    /// A zero-initialized model.
    pub fn new(hidden: usize, embedding: usize, vocab: ModelVocab) -> Self {
        let geometry = Geometry {
            hidden,
            embedding,
            terminals: vocab.terminals.len(),
            labels: vocab.labels.len(),
        };
        Model {
            hidden,
            embedding,
            count: 0,
            vocab,
            weights: Weights::zeros(geometry),
        }
    }

    /// A model initialized from a seeded generator.
    pub fn new_random(hidden: usize, embedding: usize, vocab: ModelVocab, seed: u64) -> Self {
        let mut model = Self::new(hidden, embedding, vocab);
        model.randomize(&mut StdRng::seed_from_u64(seed));
        model
    }

    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        let geometry = self.geometry();
        self.weights.randomize(geometry, rng);
    }

    /// Weight block shapes for this model's sizes and vocabularies.
    pub fn geometry(&self) -> Geometry {
        Geometry {
            hidden: self.hidden,
            embedding: self.embedding,
            terminals: self.vocab.terminals.len(),
            labels: self.vocab.labels.len(),
        }
    }

    /// Column of `word` in the embedding matrix.
    pub fn terminal(&self, word: &Symbol) -> usize {
        self.vocab.terminals.index_of(word)
    }

    pub fn embedding_of(&self, word: &Symbol) -> ArrayView1<'_, f64> {
        self.weights.terminal.column(self.terminal(word))
    }

    /// Row of `label` in the classification matrix.
    pub fn offset_classification(&self, label: &Symbol) -> usize {
        self.vocab.labels.index_of(label)
    }

    /// First row of `label`'s block in the composition matrices.
    pub fn offset_category(&self, label: &Symbol) -> usize {
        self.vocab.labels.index_of(label) * self.hidden
    }

    /// Hard tanh.
    #[inline]
    pub fn activation(x: f64) -> f64 {
        x.clamp(-1.0, 1.0)
    }

    /// Derivative of [`Model::activation`] expressed through its output.
    #[inline]
    pub fn activation_derivative(y: f64) -> f64 {
        if y > -1.0 && y < 1.0 {
            1.0
        } else {
            0.0
        }
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.weights.clear();
    }

    pub fn l1(&self) -> f64 {
        self.weights.l1()
    }

    pub fn l2(&self) -> f64 {
        self.weights.l2()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ModelError> {
        Header {
            hidden: self.hidden,
            embedding: self.embedding,
            count: self.count,
        }
        .write(w)?;
        self.weights.write_to(w)
    }

    /// Reads weights written by [`Model::write_to`] for the given vocabularies.
    pub fn read_from<R: Read>(r: &mut R, vocab: ModelVocab) -> Result<Self, ModelError> {
        let header = Header::read(r)?;
        let geometry = Geometry {
            hidden: header.hidden,
            embedding: header.embedding,
            terminals: vocab.terminals.len(),
            labels: vocab.labels.len(),
        };
        Ok(Model {
            hidden: header.hidden,
            embedding: header.embedding,
            count: header.count,
            vocab,
            weights: Weights::read_from(r, geometry)?,
        })
    }

    /// Writes `model.bin` and `vocab.json` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), ModelError> {
        std::fs::create_dir_all(dir)?;
        self.vocab.save_json(&dir.join(VOCAB_FILE))?;

        let mut writer = BufWriter::new(File::create(dir.join(WEIGHTS_FILE))?);
        self.write_to(&mut writer)?;
        writer.flush()?;

        debug!(
            "saved model to {} (hidden={}, embedding={}, labels={})",
            dir.display(),
            self.hidden,
            self.embedding,
            self.vocab.labels.len()
        );
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let vocab = ModelVocab::load_json(&dir.join(VOCAB_FILE))?;
        let mut reader = BufReader::new(File::open(dir.join(WEIGHTS_FILE))?);
        let model = Self::read_from(&mut reader, vocab)?;
        debug!("loaded model from {} after {} updates", dir.display(), model.count);
        Ok(model)
    }
}

impl AddAssign<&Model> for Model {
    fn add_assign(&mut self, other: &Model) {
        self.weights += &other.weights;
    }
}

impl SubAssign<&Model> for Model {
    fn sub_assign(&mut self, other: &Model) {
        self.weights -= &other.weights;
    }
}

impl MulAssign<f64> for Model {
    fn mul_assign(&mut self, factor: f64) {
        self.weights *= factor;
    }
}

impl DivAssign<f64> for Model {
    fn div_assign(&mut self, divisor: f64) {
        self.weights /= divisor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use std::io::Cursor;

    fn vocab() -> ModelVocab {
        ModelVocab::new(
            ["the", "dog", "barks"].map(Symbol::new),
            ["S", "NP", "VP", "DT", "NN", "VBZ", "NP^"].map(Symbol::new),
        )
    }

    #[test]
    fn offsets_are_disjoint_and_cover_rows() {
        let model = Model::new(4, 3, vocab());
        let rows = model.weights.wsh.nrows();
        let mut offsets: Vec<usize> = model
            .vocab
            .labels
            .symbols()
            .iter()
            .map(|label| model.offset_category(label))
            .collect();
        offsets.sort_unstable();
        let expected: Vec<usize> = (0..rows).step_by(model.hidden).collect();
        assert_eq!(offsets, expected);

        assert_eq!(model.offset_classification(&Symbol::new("S")), 1);
        assert_eq!(model.offset_classification(&Symbol::new("ADJP")), 0);
        assert_eq!(model.terminal(&Symbol::new("cat")), 0);
    }

    #[test]
    fn activation_is_hard_tanh() {
        assert_eq!(Model::activation(3.0), 1.0);
        assert_eq!(Model::activation(-0.25), -0.25);
        assert_eq!(Model::activation_derivative(1.0), 0.0);
        assert_eq!(Model::activation_derivative(0.5), 1.0);
    }

    #[test]
    fn stream_roundtrip_preserves_every_block() {
        let mut model = Model::new_random(4, 3, vocab(), 11);
        model.count = 17;
        model.weights.wfe.set(Feature::from_name("shift:NN"), 0.75);
        model.weights.bre.fill(0.125);

        let mut buf = Vec::new();
        model.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..8], &4u64.to_le_bytes());
        assert_eq!(&buf[16..24], &17u64.to_le_bytes());

        let back = Model::read_from(&mut Cursor::new(&buf), vocab()).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn reading_with_a_different_vocabulary_fails() {
        let model = Model::new_random(4, 3, vocab(), 5);
        let mut buf = Vec::new();
        model.write_to(&mut buf).unwrap();

        let smaller = ModelVocab::new(["the"].map(Symbol::new), ["S"].map(Symbol::new));
        let err = Model::read_from(&mut Cursor::new(&buf), smaller).unwrap_err();
        assert!(matches!(
            err,
            ModelError::ShapeMismatch {
                block: "terminal",
                ..
            }
        ));
    }

    #[test]
    fn same_seed_same_model() {
        let a = Model::new_random(4, 3, vocab(), 99);
        let b = Model::new_random(4, 3, vocab(), 99);
        let c = Model::new_random(4, 3, vocab(), 100);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.l1() > 0.0 && a.l2() > 0.0);
    }
}
