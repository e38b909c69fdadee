use anyhow::{Context, Result};
use tracing::info;

use crate::ctx::Ctx;
use crate::pipeline::Stage;

pub struct Stage4Tfidf;

impl Stage4Tfidf {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage4Tfidf {
    fn name(&self) -> &'static str {
        "stage4_tfidf"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let cohort = ctx.cohort.as_mut().context("cohort not built")?;
        let table = cohort.compute_tfidf()?;
        info!(
            documents = table.documents(),
            codes = table.code_count(),
            "stage4_tfidf_ready"
        );
        Ok(())
    }
}
