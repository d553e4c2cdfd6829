// src/feature/mod.rs

//! Sparse features: ids, the accumulation vector, the compact encoding,
//! the sparse weight table and the extractor interface.

pub mod codec;
mod compact;
mod extractor;

pub use compact::{FeatureVectorCompact, Iter as CompactIter};
pub use extractor::{FeatureExtractor, LabelContext, LabelFeatures};

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::ops::AddAssign;

/// A sparse feature identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(u64);

impl Feature {
    pub const fn new(id: u64) -> Self {
        Feature(id)
    }

    /// Stable id for a named feature.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write(name.as_bytes());
        Feature(hasher.finish())
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Mutable accumulation form of a feature vector. Adding to an id that is
/// already present sums the values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: FxHashMap<Feature, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, feature: Feature, value: f64) {
        *self.values.entry(feature).or_insert(0.0) += value;
    }

    /// Adds `1.0` to the feature named `name`.
    pub fn fire(&mut self, name: &str) {
        self.add(Feature::from_name(name), 1.0);
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values.get(&feature).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(&feature, &value)| (feature, value))
    }

    pub fn dot(&self, weights: &FeatureWeights) -> f64 {
        self.iter()
            .map(|(feature, value)| weights.get(feature) * value)
            .sum()
    }

    pub fn compact(&self) -> FeatureVectorCompact {
        FeatureVectorCompact::from(self)
    }
}

impl FromIterator<(Feature, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        let mut vector = FeatureVector::new();
        vector.extend(iter);
        vector
    }
}

impl Extend<(Feature, f64)> for FeatureVector {
    fn extend<I: IntoIterator<Item = (Feature, f64)>>(&mut self, iter: I) {
        for (feature, value) in iter {
            self.add(feature, value);
        }
    }
}

/// Sparse table of feature weights. Missing ids weigh zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureWeights {
    weights: FxHashMap<Feature, f64>,
}

impl FeatureWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.weights.get(&feature).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, feature: Feature, weight: f64) {
        self.weights.insert(feature, weight);
    }

    pub fn add(&mut self, feature: Feature, delta: f64) {
        *self.weights.entry(feature).or_insert(0.0) += delta;
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn clear(&mut self) {
        self.weights.clear();
    }

    /// Entries sorted by id, the order used when persisting.
    pub fn sorted(&self) -> Vec<(Feature, f64)> {
        let mut entries: Vec<(Feature, f64)> =
            self.weights.iter().map(|(&f, &w)| (f, w)).collect();
        entries.sort_by_key(|&(feature, _)| feature);
        entries
    }

    pub fn scale(&mut self, factor: f64) {
        for weight in self.weights.values_mut() {
            *weight *= factor;
        }
    }

    pub fn l1(&self) -> f64 {
        self.weights.values().map(|w| w.abs()).sum()
    }

    pub fn squared_norm(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum()
    }
}

impl AddAssign<&FeatureWeights> for FeatureWeights {
    fn add_assign(&mut self, other: &FeatureWeights) {
        for (&feature, &weight) in &other.weights {
            self.add(feature, weight);
        }
    }
}

impl FromIterator<(Feature, f64)> for FeatureWeights {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        FeatureWeights {
            weights: iter.into_iter().collect(),
        }
    }
}
