use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cohort::Cohort;
use crate::ctx::Ctx;
use crate::pipeline::Stage;

pub struct Stage3Encounters;

impl Stage3Encounters {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage3Encounters {
    fn name(&self) -> &'static str {
        "stage3_encounters"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let bundle = ctx.bundle.as_ref().context("cohort bundle not loaded")?;
        let mut cohort = Cohort::new(bundle.participants.clone());
        cohort.name = bundle.name.clone();
        cohort.initialize(bundle)?;

        let missing_demographics = cohort
            .encounters()
            .iter()
            .filter(|e| e.demographics.is_none())
            .count();
        if missing_demographics > 0 {
            ctx.warnings.push(format!(
                "{} encounters have no demographics",
                missing_demographics
            ));
        }

        if ctx.drop_incomplete {
            ctx.dropped_encounters = cohort.retain_complete_encounters()?;
        }
        if cohort.encounters().is_empty() {
            bail!("no encounters left to compare");
        }

        info!(
            encounters = cohort.encounters().len(),
            dropped = ctx.dropped_encounters,
            "stage3_encounters_ready"
        );
        ctx.cohort = Some(cohort);
        Ok(())
    }
}
