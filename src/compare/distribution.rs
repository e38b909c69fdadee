use std::collections::HashMap;

use anyhow::Result;

use crate::cohort::records::CodedObservation;
use crate::compare::{Comparator, Similarity};
use crate::math::stats::{mean, normal_cdf};

/// Compares coded numerical observations (labs, vitals) against their
/// population reference distribution.
///
/// Two observations that both sit in the normal range are `Incomparable`.
/// With `scale_by_distribution` the percentile similarity is weighted by how
/// far the pair's mean percentile sits from the median, so tail matches count
/// more than matches around the population centre.
#[derive(Debug, Clone, Copy)]
pub struct DistributionComparator {
    pub scale_by_distribution: bool,
}

impl Default for DistributionComparator {
    fn default() -> Self {
        Self {
            scale_by_distribution: true,
        }
    }
}

impl DistributionComparator {
    pub fn new(scale_by_distribution: bool) -> Self {
        Self {
            scale_by_distribution,
        }
    }
}

impl Comparator for DistributionComparator {
    type Item = CodedObservation;

    fn compare_pair(&self, a: &CodedObservation, b: &CodedObservation) -> Result<Similarity> {
        if a.hadm_id == b.hadm_id {
            return Ok(Similarity::Score(1.0));
        }
        if a.category != b.category {
            return Ok(Similarity::Incomparable);
        }
        let (Some(value_a), Some(value_b)) = (valid_value(a.value), valid_value(b.value)) else {
            return Ok(Similarity::Incomparable);
        };
        // Reference statistics belong to the category; both sides must agree.
        let (Some(ref_mean), Some(ref_std)) = (a.mean, a.std) else {
            return Ok(Similarity::Incomparable);
        };
        if b.mean != Some(ref_mean) || b.std != Some(ref_std) {
            return Ok(Similarity::Incomparable);
        }
        if !a.abnormal && !b.abnormal {
            return Ok(Similarity::Incomparable);
        }
        let (Some(p_a), Some(p_b)) = (
            normal_cdf(value_a, ref_mean, ref_std),
            normal_cdf(value_b, ref_mean, ref_std),
        ) else {
            return Ok(Similarity::Incomparable);
        };

        let mut similarity = 1.0 - (p_a - p_b).abs();
        if self.scale_by_distribution {
            let mean_percentile = (p_a + p_b) / 2.0;
            similarity *= 2.0 * (mean_percentile - 0.5).abs();
        }
        Ok(Similarity::Score(similarity))
    }

    fn compare_set(&self, set_a: &[CodedObservation], set_b: &[CodedObservation]) -> Result<f64> {
        let mut by_category: HashMap<&str, Vec<&CodedObservation>> = HashMap::new();
        for b in set_b {
            by_category.entry(b.category.as_str()).or_default().push(b);
        }

        let mut similarities = Vec::new();
        for a in set_a {
            let Some(candidates) = by_category.get(a.category.as_str()) else {
                continue;
            };
            for b in candidates {
                if let Similarity::Score(v) = self.compare_pair(a, b)? {
                    similarities.push(v);
                }
            }
        }
        // No comparable pair: no evidence of similarity.
        Ok(mean(&similarities))
    }
}

fn valid_value(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
