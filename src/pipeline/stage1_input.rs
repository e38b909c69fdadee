use anyhow::{Result, bail};
use tracing::info;

use crate::ctx::Ctx;
use crate::input::load_bundle;
use crate::pipeline::Stage;

pub struct Stage1Input;

impl Stage1Input {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage1Input {
    fn name(&self) -> &'static str {
        "stage1_input"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let bundle = load_bundle(&ctx.input)?;
        if bundle.participants.is_empty() {
            bail!("cohort bundle {} has no participants", ctx.input.display());
        }
        info!(
            participants = bundle.participants.len(),
            warnings = bundle.warnings.len(),
            "stage1_input_ready"
        );
        ctx.bundle = Some(bundle);
        Ok(())
    }
}
