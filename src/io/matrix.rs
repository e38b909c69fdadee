use std::collections::{BTreeSet, HashMap};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cohort::{AdmissionId, PairResult};
use crate::compare::{Category, EncounterSimilarity};

/// Square encounter-by-encounter table of one score column.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    pub name: String,
    pub ids: Vec<AdmissionId>,
    /// Row-major, `None` where no entry exists for the ordered pair.
    pub values: Vec<Option<f64>>,
}

impl SimilarityMatrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values[row * self.ids.len() + col]
    }
}

/// One matrix per category, or a single `similarity` matrix for aggregated
/// results. Rows and columns are ordered by admission id.
pub fn build_matrices(entries: &[PairResult]) -> Vec<SimilarityMatrix> {
    let ids: Vec<AdmissionId> = entries
        .iter()
        .flat_map(|r| [r.encounter_a, r.encounter_b])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<AdmissionId, usize> =
        ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let n = ids.len();

    let aggregated = entries
        .first()
        .is_some_and(|r| matches!(r.similarity, EncounterSimilarity::Aggregate(_)));
    let columns: Vec<Option<Category>> = if aggregated {
        vec![None]
    } else {
        Category::ALL.iter().copied().map(Some).collect()
    };

    columns
        .into_iter()
        .map(|column| {
            let mut values = vec![None; n * n];
            for r in entries {
                let value = match (column, &r.similarity) {
                    (Some(c), EncounterSimilarity::Categories(s)) => Some(s.get(c)),
                    (None, EncounterSimilarity::Aggregate(v)) => Some(*v),
                    _ => None,
                };
                values[index[&r.encounter_a] * n + index[&r.encounter_b]] = value;
            }
            SimilarityMatrix {
                name: column.map_or("similarity", Category::name).to_string(),
                ids: ids.clone(),
                values,
            }
        })
        .collect()
}

pub fn write_matrix(path: &Path, matrix: &SimilarityMatrix) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);

    let header: Vec<String> = matrix.ids.iter().map(|id| id.to_string()).collect();
    writeln!(w, "hadm_id\t{}", header.join("\t"))?;
    for (row, id) in matrix.ids.iter().enumerate() {
        write!(w, "{}", id)?;
        for col in 0..matrix.ids.len() {
            match matrix.get(row, col) {
                Some(v) => write!(w, "\t{:.6}", v)?,
                None => write!(w, "\tNA")?,
            }
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Write `matrix_<name>.tsv` files into `out_dir`; returns the file names.
pub fn write_matrices(out_dir: &Path, entries: &[PairResult]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for matrix in build_matrices(entries) {
        let path = out_dir.join(format!("matrix_{}.tsv", matrix.name));
        write_matrix(&path, &matrix)?;
        written.push(path);
    }
    Ok(written)
}
