// src/feature/compact.rs

//! Immutable, delta-encoded feature vectors.

use std::fmt;
use std::iter::FusedIterator;

use super::codec::{decode_id, decode_value, encode_id, encode_value};
use super::{Feature, FeatureVector, FeatureWeights};
use crate::error::CodecError;

/// Upper bound on the encoded size of one entry (10-byte varint + 9-byte value).
const MAX_ENTRY_BYTES: usize = 19;

/// A sparse feature vector frozen into a compact byte buffer.
///
/// Entries are stored in ascending id order and can only be read front to
/// back through [`FeatureVectorCompact::iter`]. Equality, ordering and
/// hashing compare the encoded bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureVectorCompact {
    bytes: Box<[u8]>,
}

impl FeatureVectorCompact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes entries that are already sorted by id with no repeated ids.
    pub fn from_sorted<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Feature, f64)>,
    {
        let entries = entries.into_iter();
        let mut bytes = Vec::with_capacity(entries.size_hint().0 * MAX_ENTRY_BYTES);
        let mut previous: Option<u64> = None;

        for (feature, value) in entries {
            let id = feature.id();
            debug_assert!(
                previous.map_or(true, |p| p < id),
                "entries must be strictly ascending by id"
            );
            encode_id(&mut bytes, id - previous.unwrap_or(0));
            encode_value(&mut bytes, value);
            previous = Some(id);
        }

        bytes.shrink_to_fit();
        FeatureVectorCompact {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Encodes entries in any order. Repeated ids are merged by summing their values.
    pub fn from_unsorted<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Feature, f64)>,
    {
        let mut raw: Vec<(Feature, f64)> = entries.into_iter().collect();
        raw.sort_by_key(|&(feature, _)| feature);

        let mut merged: Vec<(Feature, f64)> = Vec::with_capacity(raw.len());
        for (feature, value) in raw {
            match merged.last_mut() {
                Some((last, sum)) if *last == feature => *sum += value,
                _ => merged.push((feature, value)),
            }
        }

        Self::from_sorted(merged)
    }

    /// Adopts an encoded buffer after checking every entry decodes and ids
    /// ascend without passing `u64::MAX`.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CodecError> {
        let mut pos = 0;
        let mut id: Option<u64> = None;
        while pos < bytes.len() {
            let (delta, after_id) = decode_id(&bytes, pos)?;
            id = Some(match id {
                None => delta,
                Some(_) if delta == 0 => return Err(CodecError::UnorderedId { offset: pos }),
                Some(previous) => previous
                    .checked_add(delta)
                    .ok_or(CodecError::IdOverflow { offset: pos })?,
            });
            let (_, after_value) = decode_value(&bytes, after_id)?;
            pos = after_value;
        }

        Ok(FeatureVectorCompact {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            bytes: &self.bytes,
            pos: 0,
            id: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the encoded buffer in bytes.
    pub fn size_compressed(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes = Box::default();
    }

    pub fn dot(&self, weights: &FeatureWeights) -> f64 {
        self.iter()
            .map(|(feature, value)| weights.get(feature) * value)
            .sum()
    }

    /// Decodes back into accumulation form.
    pub fn to_vector(&self) -> FeatureVector {
        self.iter().collect()
    }
}

impl From<&FeatureVector> for FeatureVectorCompact {
    fn from(vector: &FeatureVector) -> Self {
        let mut raw: Vec<(Feature, f64)> = vector.iter().collect();
        raw.sort_by_key(|&(feature, _)| feature);
        Self::from_sorted(raw)
    }
}

impl<'a> IntoIterator for &'a FeatureVectorCompact {
    type Item = (Feature, f64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for FeatureVectorCompact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Forward-only iterator over a compact vector.
///
/// Buffers are validated on construction, so decoding cannot fail here; a
/// malformed tail simply ends the iteration.
#[derive(Clone)]
pub struct Iter<'a> {
    bytes: &'a [u8],
    pos: usize,
    id: u64,
}

impl Iterator for Iter<'_> {
    type Item = (Feature, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }

        let decoded = decode_id(self.bytes, self.pos)
            .and_then(|(delta, pos)| decode_value(self.bytes, pos).map(|(v, end)| (delta, v, end)));

        match decoded {
            Ok((delta, value, end)) => {
                self.id = self.id.wrapping_add(delta);
                self.pos = end;
                Some((Feature::new(self.id), value))
            }
            Err(_) => {
                self.pos = self.bytes.len();
                None
            }
        }
    }
}

impl FusedIterator for Iter<'_> {}
