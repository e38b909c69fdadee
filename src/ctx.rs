use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cohort::{Cohort, PairwiseRun, SweepStats};
use crate::compare::CompareConfig;
use crate::input::CohortBundle;
use crate::taxonomy::{CodeMap, ReconcileReport, Taxonomy};

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub out_dir: PathBuf,
    pub json_path: PathBuf,
    pub tsv_path: PathBuf,
}

/// Batched-sweep options for streaming runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub batch_size: usize,
    pub start_batch: usize,
}

#[derive(Debug)]
pub struct Ctx {
    pub input: PathBuf,
    pub taxonomy_path: PathBuf,
    pub code_map_path: Option<PathBuf>,
    pub config: CompareConfig,
    pub threads: usize,
    pub drop_incomplete: bool,
    pub stream: Option<StreamOptions>,
    pub write_json: bool,
    pub write_tsv: bool,
    pub write_matrix: bool,
    pub bundle: Option<CohortBundle>,
    pub taxonomy: Option<Taxonomy>,
    pub code_map: Option<CodeMap>,
    pub reconcile: Option<ReconcileReport>,
    pub cohort: Option<Cohort>,
    pub dropped_encounters: usize,
    pub sweep: Option<SweepStats>,
    pub matrix_paths: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub output: OutputPaths,
}

impl Ctx {
    pub fn new(
        input: PathBuf,
        taxonomy_path: PathBuf,
        code_map_path: Option<PathBuf>,
        out_dir: PathBuf,
        config: CompareConfig,
    ) -> Self {
        let json_path = out_dir.join("similarity.json");
        let tsv_path = out_dir.join("similarities.tsv");
        Self {
            input,
            taxonomy_path,
            code_map_path,
            config,
            threads: 0,
            drop_incomplete: false,
            stream: None,
            write_json: false,
            write_tsv: false,
            write_matrix: false,
            bundle: None,
            taxonomy: None,
            code_map: None,
            reconcile: None,
            cohort: None,
            dropped_encounters: 0,
            sweep: None,
            matrix_paths: Vec::new(),
            warnings: Vec::new(),
            output: OutputPaths {
                out_dir,
                json_path,
                tsv_path,
            },
        }
    }

    pub fn taxonomy(&self) -> Result<&Taxonomy> {
        self.taxonomy.as_ref().context("taxonomy not loaded")
    }

    pub fn cohort(&self) -> Result<&Cohort> {
        self.cohort.as_ref().context("cohort not built")
    }

    pub fn results(&self) -> Option<&PairwiseRun> {
        self.cohort.as_ref().and_then(Cohort::results)
    }
}
