use anyhow::Result;

use crate::cohort::records::Demographics;
use crate::compare::{Comparator, Similarity};
use crate::math::stats::mean;

/// Mean of age proximity and gender match, optionally extended with an
/// ethnicity match. Components missing on either side are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemographicsComparator {
    pub with_ethnicity: bool,
}

impl DemographicsComparator {
    pub fn new(with_ethnicity: bool) -> Self {
        Self { with_ethnicity }
    }
}

impl Comparator for DemographicsComparator {
    type Item = Demographics;

    fn compare_pair(&self, a: &Demographics, b: &Demographics) -> Result<Similarity> {
        let mut components = Vec::with_capacity(3);
        if let (Some(age_a), Some(age_b)) = (finite(a.age), finite(b.age)) {
            components.push(proximity(age_a, age_b));
        }
        if let (Some(gender_a), Some(gender_b)) = (&a.gender, &b.gender) {
            components.push(exact_match(gender_a, gender_b));
        }
        if self.with_ethnicity {
            if let (Some(eth_a), Some(eth_b)) = (&a.ethnicity, &b.ethnicity) {
                components.push(exact_match(eth_a, eth_b));
            }
        }
        if components.is_empty() {
            return Ok(Similarity::Incomparable);
        }
        Ok(Similarity::Score(mean(&components)))
    }

    fn compare_set(&self, set_a: &[Demographics], set_b: &[Demographics]) -> Result<f64> {
        let mut scores = Vec::new();
        for a in set_a {
            for b in set_b {
                if let Similarity::Score(v) = self.compare_pair(a, b)? {
                    scores.push(v);
                }
            }
        }
        Ok(mean(&scores))
    }
}

/// `1 - |a - b| / max(a, b)` for non-negative quantities such as age or height.
pub fn proximity(a: f64, b: f64) -> f64 {
    let (a, b) = (a.max(0.0), b.max(0.0));
    let max = a.max(b);
    if max == 0.0 {
        return 1.0;
    }
    1.0 - (a - b).abs() / max
}

pub fn height_similarity(a: &Demographics, b: &Demographics) -> Similarity {
    match (a.height, b.height) {
        (Some(h_a), Some(h_b)) if h_a.is_finite() && h_b.is_finite() => {
            Similarity::Score(proximity(h_a, h_b))
        }
        _ => Similarity::Incomparable,
    }
}

fn exact_match(a: &str, b: &str) -> f64 {
    if a == b { 1.0 } else { 0.0 }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
