use std::collections::HashSet;

use anyhow::Result;

use crate::cohort::records::BinaryRecord;
use crate::compare::{Comparator, Similarity};

/// Presence/absence comparison for categorical records.
///
/// Pairs score 1 on an exact value match and 0 otherwise; sets score the
/// Jaccard index of their distinct values. Two empty sets are treated as
/// identical (1.0).
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryComparator;

impl BinaryComparator {
    pub fn new() -> Self {
        Self
    }
}

impl Comparator for BinaryComparator {
    type Item = BinaryRecord;

    fn compare_pair(&self, a: &BinaryRecord, b: &BinaryRecord) -> Result<Similarity> {
        let score = if a.value == b.value { 1.0 } else { 0.0 };
        Ok(Similarity::Score(score))
    }

    fn compare_set(&self, set_a: &[BinaryRecord], set_b: &[BinaryRecord]) -> Result<f64> {
        let values_a: HashSet<&str> = set_a.iter().map(|r| r.value.as_str()).collect();
        let values_b: HashSet<&str> = set_b.iter().map(|r| r.value.as_str()).collect();
        let union = values_a.union(&values_b).count();
        if union == 0 {
            return Ok(1.0);
        }
        let intersection = values_a.intersection(&values_b).count();
        Ok(intersection as f64 / union as f64)
    }
}
