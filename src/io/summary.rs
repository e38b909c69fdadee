use anyhow::Result;

use crate::ctx::Ctx;
use crate::io::json_writer::score_distributions;

pub fn format_summary(ctx: &Ctx) -> Result<String> {
    let version = env!("CARGO_PKG_VERSION");
    let cohort = ctx.cohort()?;

    let mut out = String::new();
    out.push_str(&format!("kira-encsim v{}\n", version));
    out.push_str(&format!(
        "Cohort: {} participants, {} encounters ({} dropped)\n",
        cohort.participants().len(),
        cohort.encounters().len(),
        ctx.dropped_encounters
    ));
    if let Some(r) = &ctx.reconcile {
        out.push_str(&format!(
            "Diagnoses: {} kept, {} remapped, {} dropped\n",
            r.kept,
            r.remapped,
            r.dropped()
        ));
    }
    out.push_str(&format!(
        "Config: aggregate={}, normalize={}, ic={}, measure={}\n",
        ctx.config.aggregate,
        ctx.config.normalize_categories,
        ctx.config.ic_metric,
        ctx.config.measure
    ));

    if let Some(run) = cohort.results() {
        out.push_str(&format!(
            "Pairs: {} entries, {} unique, {} cache hits\n",
            run.stats.raw_entries, run.stats.unique_pairs, run.stats.cache_hits
        ));
        for d in score_distributions(&run.entries) {
            out.push_str(&format!(
                "  {:<14} median={:.3} p90={:.3} max={:.3}\n",
                d.name, d.median, d.p90, d.max
            ));
        }
    }
    if let Some(sweep) = &ctx.sweep {
        out.push_str(&format!(
            "Sweep: {} batches written, {} skipped, {} pairs\n",
            sweep.batches, sweep.skipped_batches, sweep.pairs_written
        ));
    }

    Ok(out)
}
