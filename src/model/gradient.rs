// src/model/gradient.rs

use std::io::{Read, Write};
use std::ops::{AddAssign, SubAssign};

use super::io::Header;
use super::{Model, Weights};
use crate::error::ModelError;

/// Gradient accumulator with the model's block geometry.
///
/// Each training thread owns one; batches merge them with `+=`, which is
/// commutative, so merge order does not matter. `count` records how many
/// instances contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub hidden: usize,
    pub embedding: usize,
    pub count: u64,
    pub weights: Weights,
}

impl Gradient {
    pub fn new(model: &Model) -> Self {
        Gradient {
            hidden: model.hidden,
            embedding: model.embedding,
            count: 0,
            weights: Weights::zeros(model.geometry()),
        }
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.weights.clear();
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

    /// Reads a gradient for `model`, rejecting streams built for other sizes.
    pub fn read_from<R: Read>(r: &mut R, model: &Model) -> Result<Self, ModelError> {
        let header = Header::read(r)?;
        if header.hidden != model.hidden || header.embedding != model.embedding {
            return Err(ModelError::HeaderMismatch {
                hidden: header.hidden,
                embedding: header.embedding,
                expected_hidden: model.hidden,
                expected_embedding: model.embedding,
            });
        }
        Ok(Gradient {
            hidden: header.hidden,
            embedding: header.embedding,
            count: header.count,
            weights: Weights::read_from(r, model.geometry())?,
        })
    }
}

impl AddAssign<&Gradient> for Gradient {
    fn add_assign(&mut self, other: &Gradient) {
        self.count += other.count;
        self.weights += &other.weights;
    }
}

impl SubAssign<&Gradient> for Gradient {
    fn sub_assign(&mut self, other: &Gradient) {
        self.count = self.count.saturating_sub(other.count);
        self.weights -= &other.weights;
    }
}
