use anyhow::{Result, anyhow};

use crate::cohort::records::Diagnosis;
use crate::compare::{Comparator, Similarity};
use crate::taxonomy::{IcMetric, SemanticMeasure, Taxonomy, code_similarity};

/// Diagnosis comparator over the code taxonomy.
///
/// Set comparison is a TF-IDF weighted best-match average (Jia et al. 2019):
/// every diagnosis takes its best weighted match on the other side, and the
/// per-diagnosis maxima of both directions are averaged over `|A| + |B|`.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosisComparator<'a> {
    taxonomy: &'a Taxonomy,
    pub metric: IcMetric,
    pub measure: SemanticMeasure,
}

impl<'a> DiagnosisComparator<'a> {
    pub fn new(taxonomy: &'a Taxonomy, metric: IcMetric, measure: SemanticMeasure) -> Self {
        Self {
            taxonomy,
            metric,
            measure,
        }
    }

    pub fn taxonomy(&self) -> &'a Taxonomy {
        self.taxonomy
    }
}

impl Comparator for DiagnosisComparator<'_> {
    type Item = Diagnosis;

    fn compare_pair(&self, a: &Diagnosis, b: &Diagnosis) -> Result<Similarity> {
        Ok(code_similarity(
            self.taxonomy,
            &a.code,
            &b.code,
            self.metric,
            self.measure,
        ))
    }

    fn compare_set(&self, set_a: &[Diagnosis], set_b: &[Diagnosis]) -> Result<f64> {
        if set_a.is_empty() || set_b.is_empty() {
            return Ok(0.0);
        }
        let weights_a = set_a.iter().map(tfidf).collect::<Result<Vec<_>>>()?;
        let weights_b = set_b.iter().map(tfidf).collect::<Result<Vec<_>>>()?;

        // Both the measure and the weight are symmetric, so one matrix serves
        // both directions: row maxima for A -> B, column maxima for B -> A.
        let mut row_max = vec![0.0f64; set_a.len()];
        let mut col_max = vec![0.0f64; set_b.len()];
        for (i, a) in set_a.iter().enumerate() {
            for (j, b) in set_b.iter().enumerate() {
                let sim = self.compare_pair(a, b)?.or_zero();
                let weighted = sim * (weights_a[i] + weights_b[j]) / 2.0;
                row_max[i] = row_max[i].max(weighted);
                col_max[j] = col_max[j].max(weighted);
            }
        }

        let lhs: f64 = row_max.iter().sum();
        let rhs: f64 = col_max.iter().sum();
        Ok((lhs + rhs) / (set_a.len() + set_b.len()) as f64)
    }
}

fn tfidf(diagnosis: &Diagnosis) -> Result<f64> {
    diagnosis.tfidf.ok_or_else(|| {
        anyhow!(
            "tf-idf score missing for diagnosis '{}' of admission {} (cohort tf-idf pre-pass not run)",
            diagnosis.code,
            diagnosis.hadm_id
        )
    })
}
