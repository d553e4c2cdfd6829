// src/model/io.rs

//! Raw little-endian block streams shared by models and gradients.
//!
//! ```text
//! header = u64 hidden, u64 embedding, u64 count
//! dense  = u64 rows, u64 cols, rows * cols f64 (row major)
//! sparse = u64 len, len * (u64 id, f64 weight), ascending id
//! ```
//!
//! Vectors are dense blocks with one column. Readers check every shape
//! against the expected geometry before allocating.

use std::io::{Read, Write};

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::ModelError;
use crate::feature::{Feature, FeatureWeights};

pub(crate) fn write_u64<W: Write>(w: &mut W, value: u64) -> Result<(), ModelError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u64<R: Read>(r: &mut R) -> Result<u64, ModelError> {
    let mut raw = [0u8; 8];
    r.read_exact(&mut raw)?;
    Ok(u64::from_le_bytes(raw))
}

fn write_f64<W: Write>(w: &mut W, value: f64) -> Result<(), ModelError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_f64<R: Read>(r: &mut R) -> Result<f64, ModelError> {
    let mut raw = [0u8; 8];
    r.read_exact(&mut raw)?;
    Ok(f64::from_le_bytes(raw))
}

/// Header written before every block sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub hidden: usize,
    pub embedding: usize,
    pub count: u64,
}

impl Header {
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), ModelError> {
        write_u64(w, self.hidden as u64)?;
        write_u64(w, self.embedding as u64)?;
        write_u64(w, self.count)
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, ModelError> {
        Ok(Header {
            hidden: read_u64(r)? as usize,
            embedding: read_u64(r)? as usize,
            count: read_u64(r)?,
        })
    }
}

pub(crate) fn write_matrix<W: Write>(w: &mut W, block: ArrayView2<'_, f64>) -> Result<(), ModelError> {
    write_u64(w, block.nrows() as u64)?;
    write_u64(w, block.ncols() as u64)?;
    for &value in block.iter() {
        write_f64(w, value)?;
    }
    Ok(())
}

pub(crate) fn write_vector<W: Write>(w: &mut W, block: &Array1<f64>) -> Result<(), ModelError> {
    write_u64(w, block.len() as u64)?;
    write_u64(w, 1)?;
    for &value in block.iter() {
        write_f64(w, value)?;
    }
    Ok(())
}

fn read_shape<R: Read>(
    r: &mut R,
    block: &'static str,
    expected: (usize, usize),
) -> Result<(), ModelError> {
    let found = (read_u64(r)? as usize, read_u64(r)? as usize);
    if found != expected {
        return Err(ModelError::ShapeMismatch {
            block,
            expected,
            found,
        });
    }
    Ok(())
}

pub(crate) fn read_matrix<R: Read>(
    r: &mut R,
    block: &'static str,
    expected: (usize, usize),
) -> Result<Array2<f64>, ModelError> {
    read_shape(r, block, expected)?;
    let mut matrix = Array2::zeros(expected);
    for value in matrix.iter_mut() {
        *value = read_f64(r)?;
    }
    Ok(matrix)
}

pub(crate) fn read_vector<R: Read>(
    r: &mut R,
    block: &'static str,
    expected: usize,
) -> Result<Array1<f64>, ModelError> {
    read_shape(r, block, (expected, 1))?;
    let mut vector = Array1::zeros(expected);
    for value in vector.iter_mut() {
        *value = read_f64(r)?;
    }
    Ok(vector)
}

pub(crate) fn write_sparse<W: Write>(w: &mut W, weights: &FeatureWeights) -> Result<(), ModelError> {
    let entries = weights.sorted();
    write_u64(w, entries.len() as u64)?;
    for (feature, weight) in entries {
        write_u64(w, feature.id())?;
        write_f64(w, weight)?;
    }
    Ok(())
}

pub(crate) fn read_sparse<R: Read>(r: &mut R) -> Result<FeatureWeights, ModelError> {
    let len = read_u64(r)?;
    let mut weights = FeatureWeights::new();
    for _ in 0..len {
        let feature = Feature::new(read_u64(r)?);
        let weight = read_f64(r)?;
        weights.set(feature, weight);
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Cursor;

    #[test]
    fn matrices_are_row_major_with_shape_prefix() {
        let m = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let mut buf = Vec::new();
        write_matrix(&mut buf, m.view()).unwrap();
        assert_eq!(buf.len(), 16 + 6 * 8);
        assert_eq!(&buf[0..8], &3u64.to_le_bytes());
        assert_eq!(&buf[16..24], &1.0f64.to_le_bytes());
        assert_eq!(&buf[24..32], &2.0f64.to_le_bytes());

        let back = read_matrix(&mut Cursor::new(&buf), "m", (3, 2)).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn shape_mismatch_is_reported_before_reading_data() {
        let mut buf = Vec::new();
        write_vector(&mut buf, &array![1.0, 2.0]).unwrap();
        let err = read_vector(&mut Cursor::new(&buf), "bias", 3).unwrap_err();
        match err {
            ModelError::ShapeMismatch {
                block,
                expected,
                found,
            } => {
                assert_eq!(block, "bias");
                assert_eq!(expected, (3, 1));
                assert_eq!(found, (2, 1));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn sparse_blocks_roundtrip() {
        let weights: FeatureWeights = vec![(Feature::new(12), 0.5), (Feature::new(3), -1.0)]
            .into_iter()
            .collect();
        let mut buf = Vec::new();
        write_sparse(&mut buf, &weights).unwrap();
        assert_eq!(&buf[8..16], &3u64.to_le_bytes());
        let back = read_sparse(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back, weights);
    }

    #[test]
    fn truncated_stream_is_an_io_error() {
        let header = Header {
            hidden: 4,
            embedding: 2,
            count: 9,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(Header::read(&mut Cursor::new(&buf)).unwrap(), header);
        assert!(matches!(
            Header::read(&mut Cursor::new(&buf[..20])),
            Err(ModelError::Io(_))
        ));
    }
}
