// src/model/weights.rs

//! The trainable parameter blocks shared by [`Model`](super::Model) and
//! [`Gradient`](super::Gradient).

use std::io::{Read, Write};
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use ndarray::{Array, Array1, Array2, Dimension};
use rand::Rng;

use super::io::{read_matrix, read_sparse, read_vector, write_matrix, write_sparse, write_vector};
use crate::error::ModelError;
use crate::feature::FeatureWeights;

/// Sizes every block is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub hidden: usize,
    pub embedding: usize,
    pub terminals: usize,
    pub labels: usize,
}

impl Geometry {
    /// Rows of a per-label composition matrix: one hidden-sized block per label.
    pub fn category_rows(&self) -> usize {
        self.labels * self.hidden
    }
}

/// All parameter blocks.
///
/// Composition matrices (`wsh`, `wre`, `wu`) stack one `hidden`-row block per
/// label; their columns are split into one slice per input, in the order
/// the operators consume them.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    /// Word embeddings, one column per terminal.
    pub terminal: Array2<f64>,

    // classification
    pub wc: Array2<f64>,
    pub bc: Array1<f64>,

    // sparse features
    pub wfe: FeatureWeights,

    // shift: state, head embedding, queue, buffer
    pub wsh: Array2<f64>,
    pub bsh: Array1<f64>,

    // reduce: right, left, below, queue, buffer
    pub wre: Array2<f64>,
    pub bre: Array1<f64>,

    // unary: state, stack, queue, buffer
    pub wu: Array2<f64>,
    pub bu: Array1<f64>,

    // final
    pub wf: Array2<f64>,
    pub bf: Array1<f64>,

    // idle
    pub wi: Array2<f64>,
    pub bi: Array1<f64>,

    // queue encoder, folded right to left from the `bqe` seed
    pub wqu: Array2<f64>,
    pub bqu: Array1<f64>,
    pub bqe: Array1<f64>,

    // buffer encoder, folded left to right from the `bbs` seed
    pub wbu: Array2<f64>,
    pub bbu: Array1<f64>,
    pub bbs: Array1<f64>,

    // axiom
    pub ba: Array1<f64>,
}

// Invokes the macro `$mac` with every dense block name in canonical stream order.
macro_rules! each_dense_block {
    ($mac:ident) => {
        $mac!(
            terminal, wc, bc, wsh, bsh, wre, bre, wu, bu, wf, bf, wi, bi, wqu, bqu, bqe, wbu, bbu,
            bbs, ba
        )
    };
}

impl Weights {
    pub fn zeros(g: Geometry) -> Self {
        let h = g.hidden;
        let e = g.embedding;
        let rows = g.category_rows();

        Weights {
            terminal: Array2::zeros((e, g.terminals)),
            wc: Array2::zeros((g.labels, h)),
            bc: Array1::zeros(g.labels),
            wfe: FeatureWeights::new(),
            wsh: Array2::zeros((rows, h + e + h + h)),
            bsh: Array1::zeros(rows),
            wre: Array2::zeros((rows, 5 * h)),
            bre: Array1::zeros(rows),
            wu: Array2::zeros((rows, 4 * h)),
            bu: Array1::zeros(rows),
            wf: Array2::zeros((h, h)),
            bf: Array1::zeros(h),
            wi: Array2::zeros((h, h)),
            bi: Array1::zeros(h),
            wqu: Array2::zeros((h, h + e)),
            bqu: Array1::zeros(h),
            bqe: Array1::zeros(h),
            wbu: Array2::zeros((h, h + e)),
            bbu: Array1::zeros(h),
            bbs: Array1::zeros(h),
            ba: Array1::zeros(h),
        }
    }

    pub fn clear(&mut self) {
        macro_rules! zero {
            ($($block:ident),*) => { $( self.$block.fill(0.0); )* };
        }
        each_dense_block!(zero);
        self.wfe.clear();
    }

    /// Xavier-style uniform initialization.
    ///
    /// Each weight matrix draws from `[-r, r]` with `r = sqrt(6 / (fan_in + fan_out))`.
    /// Biases stay zero except the classification bias, which starts at
    /// `-ln(labels)` so the initial label distribution is uniform.
    pub fn randomize<R: Rng>(&mut self, g: Geometry, rng: &mut R) {
        let h = g.hidden as f64;
        let e = g.embedding as f64;

        let range_embed = (6.0 / (e + 1.0)).sqrt();
        let range_c = (6.0 / (h + 1.0)).sqrt();
        let range_sh = (6.0 / (h + h + e + h)).sqrt();
        let range_re = (6.0 / (5.0 * h)).sqrt();
        let range_u = (6.0 / (4.0 * h)).sqrt();
        let range_seq = (6.0 / (h + h + e)).sqrt();
        let range_f = (6.0 / (h + h)).sqrt();
        let range_i = (6.0 / (h + h)).sqrt();

        fill_uniform(&mut self.terminal, range_embed, rng);
        fill_uniform(&mut self.wc, range_c, rng);
        self.bc.fill(-(g.labels.max(1) as f64).ln());

        fill_uniform(&mut self.wsh, range_sh, rng);
        fill_uniform(&mut self.wre, range_re, rng);
        fill_uniform(&mut self.wu, range_u, rng);
        fill_uniform(&mut self.wqu, range_seq, rng);
        fill_uniform(&mut self.wbu, range_seq, rng);
        fill_uniform(&mut self.wf, range_f, rng);
        fill_uniform(&mut self.wi, range_i, rng);
    }

    /// L1 norm over the weight matrices (embeddings and biases excluded).
    pub fn l1(&self) -> f64 {
        [&self.wc, &self.wsh, &self.wre, &self.wu, &self.wf, &self.wi, &self.wqu, &self.wbu]
            .iter()
            .map(|block| block.iter().map(|w| w.abs()).sum::<f64>())
            .sum()
    }

    /// L2 norm over the weight matrices (embeddings and biases excluded).
    pub fn l2(&self) -> f64 {
        [&self.wc, &self.wsh, &self.wre, &self.wu, &self.wf, &self.wi, &self.wqu, &self.wbu]
            .iter()
            .map(|block| block.iter().map(|w| w * w).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }

    /// Writes every block once, in canonical order.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ModelError> {
        write_matrix(w, self.terminal.view())?;
        write_matrix(w, self.wc.view())?;
        write_vector(w, &self.bc)?;
        write_sparse(w, &self.wfe)?;
        write_matrix(w, self.wsh.view())?;
        write_vector(w, &self.bsh)?;
        write_matrix(w, self.wre.view())?;
        write_vector(w, &self.bre)?;
        write_matrix(w, self.wu.view())?;
        write_vector(w, &self.bu)?;
        write_matrix(w, self.wf.view())?;
        write_vector(w, &self.bf)?;
        write_matrix(w, self.wi.view())?;
        write_vector(w, &self.bi)?;
        write_matrix(w, self.wqu.view())?;
        write_vector(w, &self.bqu)?;
        write_vector(w, &self.bqe)?;
        write_matrix(w, self.wbu.view())?;
        write_vector(w, &self.bbu)?;
        write_vector(w, &self.bbs)?;
        write_vector(w, &self.ba)
    }

    /// Reads blocks in the order [`Weights::write_to`] produced them.
    pub fn read_from<R: Read>(r: &mut R, g: Geometry) -> Result<Self, ModelError> {
        let h = g.hidden;
        let e = g.embedding;
        let rows = g.category_rows();

        Ok(Weights {
            terminal: read_matrix(r, "terminal", (e, g.terminals))?,
            wc: read_matrix(r, "wc", (g.labels, h))?,
            bc: read_vector(r, "bc", g.labels)?,
            wfe: read_sparse(r)?,
            wsh: read_matrix(r, "wsh", (rows, h + e + h + h))?,
            bsh: read_vector(r, "bsh", rows)?,
            wre: read_matrix(r, "wre", (rows, 5 * h))?,
            bre: read_vector(r, "bre", rows)?,
            wu: read_matrix(r, "wu", (rows, 4 * h))?,
            bu: read_vector(r, "bu", rows)?,
            wf: read_matrix(r, "wf", (h, h))?,
            bf: read_vector(r, "bf", h)?,
            wi: read_matrix(r, "wi", (h, h))?,
            bi: read_vector(r, "bi", h)?,
            wqu: read_matrix(r, "wqu", (h, h + e))?,
            bqu: read_vector(r, "bqu", h)?,
            bqe: read_vector(r, "bqe", h)?,
            wbu: read_matrix(r, "wbu", (h, h + e))?,
            bbu: read_vector(r, "bbu", h)?,
            bbs: read_vector(r, "bbs", h)?,
            ba: read_vector(r, "ba", h)?,
        })
    }
}

fn fill_uniform<R: Rng, D: Dimension>(block: &mut Array<f64, D>, range: f64, rng: &mut R) {
    block.mapv_inplace(|_| rng.gen_range(-range..=range));
}

impl AddAssign<&Weights> for Weights {
    fn add_assign(&mut self, other: &Weights) {
        macro_rules! add {
            ($($block:ident),*) => { $( self.$block += &other.$block; )* };
        }
        each_dense_block!(add);
        self.wfe += &other.wfe;
    }
}

impl SubAssign<&Weights> for Weights {
    fn sub_assign(&mut self, other: &Weights) {
        macro_rules! sub {
            ($($block:ident),*) => { $( self.$block -= &other.$block; )* };
        }
        each_dense_block!(sub);
        for (feature, weight) in other.wfe.sorted() {
            self.wfe.add(feature, -weight);
        }
    }
}

impl MulAssign<f64> for Weights {
    fn mul_assign(&mut self, factor: f64) {
        macro_rules! mul {
            ($($block:ident),*) => { $( self.$block *= factor; )* };
        }
        each_dense_block!(mul);
        self.wfe.scale(factor);
    }
}

impl DivAssign<f64> for Weights {
    fn div_assign(&mut self, divisor: f64) {
        *self *= 1.0 / divisor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use rand::{rngs::StdRng, SeedableRng};

    const GEOMETRY: Geometry = Geometry {
        hidden: 3,
        embedding: 2,
        terminals: 4,
        labels: 5,
    };

    #[test]
    fn block_shapes_follow_geometry() {
        let w = Weights::zeros(GEOMETRY);
        assert_eq!(w.terminal.dim(), (2, 4));
        assert_eq!(w.wc.dim(), (5, 3));
        assert_eq!(w.wsh.dim(), (15, 11));
        assert_eq!(w.wre.dim(), (15, 15));
        assert_eq!(w.wu.dim(), (15, 12));
        assert_eq!(w.wqu.dim(), (3, 5));
        assert_eq!(w.bsh.len(), 15);
    }

    #[test]
    fn randomize_stays_within_xavier_range() {
        let mut w = Weights::zeros(GEOMETRY);
        w.randomize(GEOMETRY, &mut StdRng::seed_from_u64(3));
        let range_re = (6.0f64 / 15.0).sqrt();
        assert!(w.wre.iter().all(|x| x.abs() <= range_re));
        assert!(w.wre.iter().any(|&x| x != 0.0));
        assert!(w.bsh.iter().all(|&x| x == 0.0));
        assert!((w.bc[0] + 5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn arithmetic_is_blockwise() {
        let mut a = Weights::zeros(GEOMETRY);
        a.randomize(GEOMETRY, &mut StdRng::seed_from_u64(1));
        a.wfe.set(Feature::new(4), 2.0);
        let original = a.clone();

        let b = a.clone();
        a += &b;
        a /= 2.0;
        assert_eq!(a.wf, original.wf);
        assert_eq!(a.wfe.get(Feature::new(4)), 2.0);

        a -= &b;
        assert!(a.l1() == 0.0);
        assert_eq!(a.wfe.get(Feature::new(4)), 0.0);

        let mut c = original.clone();
        c *= 0.0;
        assert_eq!(c.l2(), 0.0);
        c.clear();
        assert!(c.wfe.is_empty());
    }
}
