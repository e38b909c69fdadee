use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cohort::PairResult;
use crate::compare::{Category, EncounterSimilarity};

/// Column layout of a pair table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairLayout {
    /// One column per category.
    Categories,
    /// A single `similarity` column.
    Aggregate,
}

impl PairLayout {
    pub fn of(similarity: &EncounterSimilarity) -> Self {
        match similarity {
            EncounterSimilarity::Categories(_) => Self::Categories,
            EncounterSimilarity::Aggregate(_) => Self::Aggregate,
        }
    }

    pub fn header(self) -> String {
        let mut cols = vec!["encounter_a", "encounter_b"];
        match self {
            Self::Categories => cols.extend(Category::ALL.iter().map(|c| c.name())),
            Self::Aggregate => cols.push("similarity"),
        }
        cols.join("\t")
    }
}

pub fn write_pair_row<W: Write>(w: &mut W, record: &PairResult, layout: PairLayout) -> Result<()> {
    match (&record.similarity, layout) {
        (EncounterSimilarity::Categories(s), PairLayout::Categories) => {
            writeln!(
                w,
                "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
                record.encounter_a,
                record.encounter_b,
                s.demographics,
                s.diagnoses,
                s.labevents,
                s.vitalsigns,
                s.inputevents,
                s.prescriptions
            )?;
        }
        (EncounterSimilarity::Aggregate(v), PairLayout::Aggregate) => {
            writeln!(w, "{}\t{}\t{:.6}", record.encounter_a, record.encounter_b, v)?;
        }
        _ => bail!(
            "pair ({}, {}) does not match the {:?} table layout",
            record.encounter_a,
            record.encounter_b,
            layout
        ),
    }
    Ok(())
}

/// Write every entry, in order, to `similarities.tsv`-style output.
pub fn write_pairs_tsv(path: &Path, entries: &[PairResult]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);

    let layout = entries
        .first()
        .map(|r| PairLayout::of(&r.similarity))
        .unwrap_or(PairLayout::Categories);
    writeln!(w, "{}", layout.header())?;
    for record in entries {
        write_pair_row(&mut w, record, layout)?;
    }
    w.flush()?;
    Ok(())
}
