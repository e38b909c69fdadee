use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::ctx::Ctx;
use crate::pipeline::Stage;
use crate::taxonomy::{load_code_map, load_taxonomy};

pub struct Stage2Taxonomy;

impl Stage2Taxonomy {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage2Taxonomy {
    fn name(&self) -> &'static str {
        "stage2_taxonomy"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let taxonomy = load_taxonomy(&ctx.taxonomy_path)?;
        info!(
            nodes = taxonomy.len(),
            leaves = taxonomy.n_leaves(),
            "taxonomy_loaded"
        );

        let code_map = match &ctx.code_map_path {
            Some(path) => Some(load_code_map(path)?),
            None => None,
        };

        let bundle = ctx.bundle.as_mut().context("cohort bundle not loaded")?;
        let report = bundle.reconcile(code_map.as_ref(), &taxonomy);
        if report.dropped_unmapped > 0 && code_map.is_none() {
            ctx.warnings.push(format!(
                "{} legacy diagnoses dropped: no code map given",
                report.dropped_unmapped
            ));
        }
        if report.dropped_version > 0 {
            ctx.warnings.push(format!(
                "{} diagnoses dropped: unsupported coding version",
                report.dropped_version
            ));
        }
        if report.kept == 0 {
            warn!("no diagnosis survived reconciliation");
            ctx.warnings
                .push("no diagnosis code matched the taxonomy".to_string());
        }

        ctx.reconcile = Some(report);
        ctx.code_map = code_map;
        ctx.taxonomy = Some(taxonomy);
        Ok(())
    }
}
