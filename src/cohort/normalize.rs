use anyhow::{Result, bail};
use tracing::info;

use crate::cohort::PairResult;
use crate::compare::{
    AggregateMethod, Category, CategoryScores, CategoryWeights, EncounterSimilarity,
};
use crate::math::stats::min_max_scale;

/// Min-max scale every category to [0, 1] over the non-self entries.
///
/// Self-pairs are excluded from the bounds and set to 1 afterwards. A
/// category whose non-self scores are all equal collapses to 0.
pub fn normalize_categories(entries: &mut [PairResult]) -> Result<()> {
    if entries
        .iter()
        .any(|r| matches!(r.similarity, EncounterSimilarity::Aggregate(_)))
    {
        bail!("normalization requires per-category scores, found aggregated entries");
    }

    let others: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_self_pair())
        .map(|(idx, _)| idx)
        .collect();

    for category in Category::ALL {
        let values: Vec<f64> = others
            .iter()
            .map(|&idx| category_score(&entries[idx], category))
            .collect();
        let scaled = min_max_scale(&values, 0.0, 1.0);
        for (&idx, value) in others.iter().zip(scaled) {
            if let EncounterSimilarity::Categories(scores) = &mut entries[idx].similarity {
                scores.set(category, value);
            }
        }
    }

    for entry in entries.iter_mut().filter(|r| r.is_self_pair()) {
        entry.similarity = EncounterSimilarity::Categories(CategoryScores::uniform(1.0));
    }
    info!(entries = entries.len(), "categories_normalized");
    Ok(())
}

/// Collapse per-category scores into one value; self-pairs become 1.
pub fn aggregate_results(
    entries: &mut [PairResult],
    method: AggregateMethod,
    weights: &CategoryWeights,
) -> Result<()> {
    if method == AggregateMethod::None {
        return Ok(());
    }
    for entry in entries.iter_mut() {
        let value = if entry.is_self_pair() {
            1.0
        } else {
            match &entry.similarity {
                EncounterSimilarity::Aggregate(v) => *v,
                EncounterSimilarity::Categories(scores) => {
                    method.apply(scores, weights).unwrap_or(0.0)
                }
            }
        };
        entry.similarity = EncounterSimilarity::Aggregate(value);
    }
    info!(method = %method, entries = entries.len(), "results_aggregated");
    Ok(())
}

fn category_score(entry: &PairResult, category: Category) -> f64 {
    entry
        .similarity
        .categories()
        .map(|s| s.get(category))
        .unwrap_or(0.0)
}
