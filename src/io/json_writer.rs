use std::path::Path;

use anyhow::Result;

use crate::cohort::PairResult;
use crate::compare::{Category, EncounterSimilarity};
use crate::ctx::Ctx;
use crate::io::write_json as write_report;
use crate::math::stats::{median, quantile};
use crate::schema::v1::{
    CohortMeta, Outputs, PairSummary, RunConfig, ScoreDistribution, SimilarityReportV1,
};

pub fn build_report(ctx: &Ctx) -> Result<SimilarityReportV1> {
    let config = &ctx.config;
    let reconcile = ctx.reconcile.unwrap_or_default();

    let cohort = CohortMeta {
        name: ctx.cohort.as_ref().and_then(|c| c.name.clone()),
        participants: ctx.cohort.as_ref().map_or(0, |c| c.participants().len()) as u64,
        encounters: ctx.cohort.as_ref().map_or(0, |c| c.encounters().len()) as u64,
        dropped_encounters: ctx.dropped_encounters as u64,
        dropped_labevents: ctx.bundle.as_ref().map_or(0, |b| b.dropped_labevents) as u64,
        diagnoses_kept: reconcile.kept as u64,
        diagnoses_remapped: reconcile.remapped as u64,
        diagnoses_dropped: reconcile.dropped() as u64,
        tfidf_codes: ctx
            .cohort
            .as_ref()
            .and_then(|c| c.tfidf())
            .map_or(0, |t| t.code_count()) as u64,
    };

    let run_config = RunConfig {
        weights: config.weights,
        aggregate: config.aggregate,
        scale_by_distribution: config.scale_by_distribution,
        normalize_categories: config.normalize_categories,
        ic_metric: config.ic_metric,
        measure: config.measure,
        with_ethnicity: config.with_ethnicity,
        drop_incomplete: ctx.drop_incomplete,
        threads: ctx.threads,
        stream: ctx.stream.is_some(),
        batch_size: ctx.stream.map(|s| s.batch_size),
        start_batch: ctx.stream.map(|s| s.start_batch),
    };

    let mut pairs = PairSummary::default();
    let mut distributions = Vec::new();
    if let Some(run) = ctx.results() {
        pairs.raw_entries = run.stats.raw_entries as u64;
        pairs.unique_pairs = run.stats.unique_pairs as u64;
        pairs.cache_hits = run.stats.cache_hits as u64;
        pairs.failed_pairs = run.stats.failed_pairs as u64;
        distributions = score_distributions(&run.entries);
    }
    if let Some(sweep) = ctx.sweep {
        pairs.raw_entries = sweep.pairs_written as u64;
        pairs.unique_pairs = sweep.pairs_written as u64;
        pairs.failed_pairs = sweep.failed_pairs as u64;
        pairs.batches = Some(sweep.batches as u64);
        pairs.skipped_batches = Some(sweep.skipped_batches as u64);
    }

    let outputs = Outputs {
        pairs_tsv: (ctx.write_tsv || ctx.stream.is_some()).then(|| file_name(&ctx.output.tsv_path)),
        matrices: ctx.matrix_paths.iter().map(|p| file_name(p)).collect(),
    };

    let mut warnings = ctx.bundle.as_ref().map(|b| b.warnings.clone()).unwrap_or_default();
    warnings.extend(ctx.warnings.iter().cloned());

    Ok(SimilarityReportV1 {
        tool: "kira-encsim".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: "v1".to_string(),
        cohort,
        config: run_config,
        pairs,
        distributions,
        outputs,
        warnings,
    })
}

pub fn write_json(path: &Path, ctx: &Ctx) -> Result<()> {
    let report = build_report(ctx)?;
    write_report(path, &report)
}

/// Min/median/p90/max of every score column over non-self pairs.
pub fn score_distributions(entries: &[PairResult]) -> Vec<ScoreDistribution> {
    let others: Vec<&PairResult> = entries.iter().filter(|r| !r.is_self_pair()).collect();
    if others.is_empty() {
        return Vec::new();
    }

    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
    if others
        .iter()
        .all(|r| matches!(r.similarity, EncounterSimilarity::Aggregate(_)))
    {
        let values = others.iter().filter_map(|r| r.similarity.aggregate()).collect();
        columns.push(("similarity".to_string(), values));
    } else {
        for category in Category::ALL {
            let values = others
                .iter()
                .filter_map(|r| r.similarity.categories().map(|s| s.get(category)))
                .collect();
            columns.push((category.name().to_string(), values));
        }
    }

    columns
        .into_iter()
        .map(|(name, mut values)| {
            let n = values.len() as u64;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let p90 = quantile(&mut values, 0.9);
            let mid = median(&mut values);
            ScoreDistribution {
                name,
                n,
                min: if n == 0 { 0.0 } else { min },
                median: mid,
                p90,
                max: if n == 0 { 0.0 } else { max },
            }
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
