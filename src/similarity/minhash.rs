//! MinHash signatures over normalized-token shingles (spec §4.6).

use std::collections::HashSet;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// A fixed-length MinHash signature used to estimate Jaccard similarity
/// without comparing full shingle sets.
#[derive(Debug, Clone)]
pub struct MinHashSignature {
    values: Vec<u64>,
}

impl MinHashSignature {
    pub fn compute(shingles: &HashSet<String>, num_permutations: usize) -> Self {
        let mut values = vec![u64::MAX; num_permutations];
        for shingle in shingles {
            for (seed, slot) in values.iter_mut().enumerate() {
                let hash = xxh3_64_with_seed(shingle.as_bytes(), seed as u64);
                if hash < *slot {
                    *slot = hash;
                }
            }
        }
        Self { values }
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn from_values(values: Vec<u64>) -> Self {
        Self { values }
    }

    /// Fraction of permutation slots that agree, an unbiased estimator of the
    /// Jaccard similarity of the underlying shingle sets.
    pub fn estimate_jaccard(&self, other: &Self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let agree = self
            .values
            .iter()
            .zip(other.values.iter())
            .filter(|(a, b)| a == b)
            .count();
        agree as f64 / self.values.len() as f64
    }
}
