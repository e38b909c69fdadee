use anyhow::Result;
use tracing::info;

use crate::ctx::Ctx;
use crate::io::{json_writer, matrix, tsv_writer};
use crate::pipeline::Stage;

pub struct Stage6Output;

impl Stage6Output {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage6Output {
    fn name(&self) -> &'static str {
        "stage6_output"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        if let Some(run) = ctx.results() {
            if ctx.write_tsv {
                tsv_writer::write_pairs_tsv(&ctx.output.tsv_path, &run.entries)?;
            }
            if ctx.write_matrix {
                let paths = matrix::write_matrices(&ctx.output.out_dir, &run.entries)?;
                ctx.matrix_paths = paths;
            }
        } else if ctx.write_matrix {
            ctx.warnings
                .push("matrices need the full result set; skipped for streamed runs".to_string());
        }

        if ctx.write_json {
            json_writer::write_json(&ctx.output.json_path, ctx)?;
        }

        info!(
            json = ctx.write_json,
            tsv = ctx.write_tsv,
            matrices = ctx.matrix_paths.len(),
            "stage6_output_ready"
        );
        Ok(())
    }
}
