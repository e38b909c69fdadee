use serde::{Deserialize, Serialize};

use crate::compare::{AggregateMethod, CategoryWeights};
use crate::taxonomy::{IcMetric, SemanticMeasure};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortMeta {
    pub name: Option<String>,
    pub participants: u64,
    pub encounters: u64,
    pub dropped_encounters: u64,
    pub dropped_labevents: u64,
    pub diagnoses_kept: u64,
    pub diagnoses_remapped: u64,
    pub diagnoses_dropped: u64,
    pub tfidf_codes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub weights: CategoryWeights,
    pub aggregate: AggregateMethod,
    pub scale_by_distribution: bool,
    pub normalize_categories: bool,
    pub ic_metric: IcMetric,
    pub measure: SemanticMeasure,
    pub with_ethnicity: bool,
    pub drop_incomplete: bool,
    pub threads: usize,
    pub stream: bool,
    pub batch_size: Option<usize>,
    pub start_batch: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairSummary {
    pub raw_entries: u64,
    pub unique_pairs: u64,
    pub cache_hits: u64,
    pub failed_pairs: u64,
    pub batches: Option<u64>,
    pub skipped_batches: Option<u64>,
}

/// Distribution of one score column over non-self pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub name: String,
    pub n: u64,
    pub min: f64,
    pub median: f64,
    pub p90: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outputs {
    pub pairs_tsv: Option<String>,
    pub matrices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityReportV1 {
    pub tool: String,
    pub version: String,
    pub schema_version: String,
    pub cohort: CohortMeta,
    pub config: RunConfig,
    pub pairs: PairSummary,
    pub distributions: Vec<ScoreDistribution>,
    pub outputs: Outputs,
    pub warnings: Vec<String>,
}
