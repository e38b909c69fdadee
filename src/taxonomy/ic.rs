use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::compare::Similarity;
use crate::taxonomy::Taxonomy;

/// Intrinsic information-content metric (computed from graph shape only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IcMetric {
    /// Sanchez et al. 2011: leaves over subsumers.
    #[default]
    Sanchez,
    /// Seco et al. 2004: share of the graph below the node.
    Seco,
}

impl FromStr for IcMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sanchez" | "intrinsic_ic_sanchez" => Ok(Self::Sanchez),
            "seco" | "intrinsic_ic" => Ok(Self::Seco),
            other => bail!("unknown IC metric '{}'", other),
        }
    }
}

impl fmt::Display for IcMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sanchez => f.write_str("sanchez"),
            Self::Seco => f.write_str("seco"),
        }
    }
}

/// Node-pair semantic similarity built on an [`IcMetric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticMeasure {
    /// `2 * IC(mica) / (IC(a) + IC(b))`
    #[default]
    Lin,
    /// `IC(mica) / max IC`
    Resnik,
}

impl FromStr for SemanticMeasure {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lin" => Ok(Self::Lin),
            "resnik" | "resnik_scaled" => Ok(Self::Resnik),
            other => bail!("unknown semantic measure '{}'", other),
        }
    }
}

impl fmt::Display for SemanticMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lin => f.write_str("lin"),
            Self::Resnik => f.write_str("resnik"),
        }
    }
}

/// Most informative common ancestor of two nodes and its IC.
pub fn most_informative_common_ancestor(
    taxonomy: &Taxonomy,
    a: usize,
    b: usize,
    metric: IcMetric,
) -> Option<(usize, f64)> {
    let anc_a = taxonomy.ancestors(a);
    let anc_b = taxonomy.ancestors(b);
    let (mut i, mut j) = (0usize, 0usize);
    let mut best: Option<(usize, f64)> = None;
    while i < anc_a.len() && j < anc_b.len() {
        if anc_a[i] < anc_b[j] {
            i += 1;
        } else if anc_a[i] > anc_b[j] {
            j += 1;
        } else {
            let node = anc_a[i];
            let ic = taxonomy.ic(node, metric);
            if best.is_none_or(|(_, best_ic)| ic > best_ic) {
                best = Some((node, ic));
            }
            i += 1;
            j += 1;
        }
    }
    best
}

/// Semantic similarity of two codes; `Incomparable` if either is not in the taxonomy.
pub fn code_similarity(
    taxonomy: &Taxonomy,
    code_a: &str,
    code_b: &str,
    metric: IcMetric,
    measure: SemanticMeasure,
) -> Similarity {
    let (Some(a), Some(b)) = (taxonomy.index_of(code_a), taxonomy.index_of(code_b)) else {
        return Similarity::Incomparable;
    };
    let mica_ic = most_informative_common_ancestor(taxonomy, a, b, metric)
        .map(|(_, ic)| ic)
        .unwrap_or(0.0);

    let score = match measure {
        SemanticMeasure::Lin => {
            if a == b {
                1.0
            } else {
                let denom = taxonomy.ic(a, metric) + taxonomy.ic(b, metric);
                if denom <= 0.0 { 0.0 } else { 2.0 * mica_ic / denom }
            }
        }
        SemanticMeasure::Resnik => {
            let max_ic = taxonomy.max_ic(metric);
            if max_ic <= 0.0 { 0.0 } else { mica_ic / max_ic }
        }
    };
    Similarity::Score(score.clamp(0.0, 1.0))
}
