use anyhow::{Context, Result};
use tracing::info;

use crate::cohort::{PairwiseEngine, anchors_before_batch};
use crate::compare::{AggregateMethod, EncounterComparator};
use crate::ctx::Ctx;
use crate::io::sink::TsvPairSink;
use crate::io::tsv_writer::PairLayout;
use crate::pipeline::Stage;

pub struct Stage5Compare;

impl Stage5Compare {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage5Compare {
    fn name(&self) -> &'static str {
        "stage5_compare"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let taxonomy = ctx.taxonomy.as_ref().context("taxonomy not loaded")?;
        let cohort = ctx.cohort.as_mut().context("cohort not built")?;

        let Some(stream) = ctx.stream else {
            let run = cohort.compare_encounters(taxonomy, &ctx.config, ctx.threads)?;
            info!(
                entries = run.entries.len(),
                unique_pairs = run.stats.unique_pairs,
                "stage5_compare_ready"
            );
            return Ok(());
        };

        // Streamed batches hold raw category scores; normalisation needs the full set.
        if ctx.config.normalize_categories || ctx.config.aggregate != AggregateMethod::None {
            ctx.warnings.push(
                "streaming writes raw category scores; normalisation and aggregation skipped"
                    .to_string(),
            );
        }
        let comparator =
            EncounterComparator::new(taxonomy, &ctx.config).with_aggregate(AggregateMethod::None);
        let engine = PairwiseEngine::new(comparator, ctx.threads);
        let path = &ctx.output.tsv_path;
        let mut sink = if stream.start_batch == 0 {
            TsvPairSink::create(path, PairLayout::Categories)?
        } else {
            let done =
                anchors_before_batch(cohort.encounters(), stream.batch_size, stream.start_batch);
            TsvPairSink::resume(path, PairLayout::Categories, |a| done.contains(&a))?
        };
        let stats = engine.sweep_batched(
            cohort.encounters(),
            stream.batch_size,
            stream.start_batch,
            &mut sink,
        )?;
        info!(
            batches = stats.batches,
            skipped = stats.skipped_batches,
            pairs = stats.pairs_written,
            "stage5_sweep_ready"
        );
        ctx.sweep = Some(stats);
        Ok(())
    }
}
