use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Result, bail};

use crate::cohort::{AdmissionId, Encounter};

/// Cohort-wide TF-IDF weights for diagnosis codes.
///
/// Each encounter's diagnosis list is one document. TF is the code's count in
/// the encounter divided by the encounter's diagnosis count; IDF is
/// `ln(N / df)` over the cohort's encounters. Document frequency is cached by
/// code, so the weight depends only on the code and the encounter.
#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfTable {
    documents: usize,
    document_frequency: BTreeMap<String, usize>,
    scores: HashMap<(AdmissionId, String), f64>,
}

impl TfIdfTable {
    pub fn compute(encounters: &[Encounter]) -> Self {
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for encounter in encounters {
            let distinct: HashSet<&str> =
                encounter.diagnoses.iter().map(|d| d.code.as_str()).collect();
            for code in distinct {
                *document_frequency.entry(code.to_string()).or_insert(0) += 1;
            }
        }

        let documents = encounters.len();
        let mut scores = HashMap::new();
        for encounter in encounters {
            let total = encounter.diagnoses.len();
            if total == 0 {
                continue;
            }
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for d in &encounter.diagnoses {
                *counts.entry(d.code.as_str()).or_insert(0) += 1;
            }
            for (code, count) in counts {
                let df = document_frequency.get(code).copied().unwrap_or(0);
                let tf = count as f64 / total as f64;
                let score = tf * inverse_document_frequency(documents, df);
                scores.insert((encounter.hadm_id, code.to_string()), score);
            }
        }

        Self {
            documents,
            document_frequency,
            scores,
        }
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn code_count(&self) -> usize {
        self.document_frequency.len()
    }

    pub fn document_frequency(&self, code: &str) -> Option<usize> {
        self.document_frequency.get(code).copied()
    }

    pub fn idf(&self, code: &str) -> Option<f64> {
        self.document_frequency(code)
            .map(|df| inverse_document_frequency(self.documents, df))
    }

    pub fn score(&self, hadm_id: AdmissionId, code: &str) -> Option<f64> {
        self.scores.get(&(hadm_id, code.to_string())).copied()
    }

    /// Write the weight onto every diagnosis. A diagnosis without a weight in
    /// the table means the encounters changed since `compute`.
    pub fn apply(&self, encounters: &mut [Encounter]) -> Result<()> {
        for encounter in encounters.iter_mut() {
            let hadm_id = encounter.hadm_id;
            for d in encounter.diagnoses.iter_mut() {
                let Some(score) = self.score(hadm_id, &d.code) else {
                    bail!(
                        "no tf-idf weight for diagnosis '{}' of admission {}",
                        d.code,
                        hadm_id
                    );
                };
                d.tfidf = Some(score);
            }
        }
        Ok(())
    }
}

fn inverse_document_frequency(documents: usize, df: usize) -> f64 {
    if documents == 0 || df == 0 {
        return 0.0;
    }
    (documents as f64 / df as f64).ln()
}
