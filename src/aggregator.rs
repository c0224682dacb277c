//! Critical-path aggregation over sampled values
//!
//! The one CPU-bound step of the pipeline: a single filter+fold pass that
//! sums samples above a fixed threshold, with no intermediate allocation.

use sha2::{Digest, Sha256};

/// Samples at or below this value are discarded by default
pub const DEFAULT_SAMPLE_THRESHOLD: u64 = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    threshold: u64,
}

impl Aggregator {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Sum of all samples strictly greater than the threshold.
    ///
    /// Empty input, or input with no surviving samples, yields 0.
    pub fn aggregate(&self, samples: &[u64]) -> u64 {
        samples.iter().filter(|&&s| s > self.threshold).sum()
    }

    /// Derive the cache key identifying a sample batch.
    ///
    /// The threshold participates in the digest so results computed under
    /// different thresholds never collide.
    pub fn fingerprint(&self, samples: &[u64]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.threshold.to_le_bytes());
        for sample in samples {
            hasher.update(sample.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero() {
        assert_eq!(Aggregator::default().aggregate(&[]), 0);
    }

    #[test]
    fn sums_only_samples_above_threshold() {
        let agg = Aggregator::default();
        assert_eq!(agg.aggregate(&[500, 1_500, 2_500]), 4_000);
        // Boundary value is excluded, not included.
        assert_eq!(agg.aggregate(&[1_000, 1_001]), 1_001);
    }

    #[test]
    fn all_filtered_yields_zero() {
        assert_eq!(Aggregator::default().aggregate(&[1, 2, 999]), 0);
    }

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let agg = Aggregator::default();
        let a = agg.fingerprint(&[1, 2, 3]);
        assert_eq!(a, agg.fingerprint(&[1, 2, 3]));
        assert_ne!(a, agg.fingerprint(&[1, 2, 4]));
        assert_ne!(a, agg.fingerprint(&[1, 2]));
        // Different thresholds key different results.
        assert_ne!(a, Aggregator::new(2_000).fingerprint(&[1, 2, 3]));
    }
}
