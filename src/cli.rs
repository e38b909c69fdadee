use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::compare::{AggregateMethod, CategoryWeights};
use crate::taxonomy::{IcMetric, SemanticMeasure};

#[derive(Debug, Parser)]
#[command(
    name = "kira-encsim",
    version,
    about = "Pairwise ICU encounter similarity"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Run(RunArgs),
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, help = "Cohort bundle (.json or .json.gz)")]
    pub input: PathBuf,

    #[arg(long, help = "Diagnosis taxonomy edge list (parent<TAB>child)")]
    pub taxonomy: PathBuf,

    #[arg(long, help = "Legacy-to-current diagnosis code map (TSV)")]
    pub code_map: Option<PathBuf>,

    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, value_enum, default_value_t = AggregateArg::None)]
    pub aggregate: AggregateArg,

    #[arg(long, default_value_t = false, help = "Keep raw category scores")]
    pub no_normalize: bool,

    #[arg(long, default_value_t = false)]
    pub no_scale_by_distribution: bool,

    #[command(flatten)]
    pub weights: WeightArgs,

    #[arg(long, value_enum, default_value_t = IcMetricArg::Sanchez)]
    pub ic_metric: IcMetricArg,

    #[arg(long, value_enum, default_value_t = MeasureArg::Lin)]
    pub measure: MeasureArg,

    #[arg(long, default_value_t = false)]
    pub with_ethnicity: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Drop encounters missing demographics or any category"
    )]
    pub drop_incomplete: bool,

    #[arg(long, default_value_t = 0, help = "Number of threads (0 = auto)")]
    pub threads: usize,

    #[arg(long, default_value_t = 400, help = "Anchor encounters per streamed batch")]
    pub batch_size: usize,

    #[arg(
        long,
        default_value_t = false,
        help = "Write raw pair scores batch by batch instead of holding the full set"
    )]
    pub stream: bool,

    #[arg(long, default_value_t = 0, help = "First batch to compute when streaming")]
    pub start_batch: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false)]
    pub tsv: bool,

    #[arg(long, default_value_t = false)]
    pub matrix: bool,
}

#[derive(Debug, Args)]
pub struct WeightArgs {
    #[arg(long, default_value_t = 0.15)]
    pub w_demographics: f64,

    #[arg(long, default_value_t = 0.15)]
    pub w_diagnoses: f64,

    #[arg(long, default_value_t = 0.20)]
    pub w_labevents: f64,

    #[arg(long, default_value_t = 0.20)]
    pub w_vitalsigns: f64,

    #[arg(long, default_value_t = 0.15)]
    pub w_inputevents: f64,

    #[arg(long, default_value_t = 0.15)]
    pub w_prescriptions: f64,
}

impl WeightArgs {
    pub fn to_weights(&self) -> CategoryWeights {
        CategoryWeights {
            demographics: self.w_demographics,
            diagnoses: self.w_diagnoses,
            labevents: self.w_labevents,
            vitalsigns: self.w_vitalsigns,
            inputevents: self.w_inputevents,
            prescriptions: self.w_prescriptions,
        }
    }
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[arg(long, help = "Cohort bundle (.json or .json.gz)")]
    pub input: PathBuf,

    #[arg(long)]
    pub taxonomy: PathBuf,

    #[arg(long)]
    pub code_map: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AggregateArg {
    None,
    Mean,
    Rms,
}

impl From<AggregateArg> for AggregateMethod {
    fn from(arg: AggregateArg) -> Self {
        match arg {
            AggregateArg::None => AggregateMethod::None,
            AggregateArg::Mean => AggregateMethod::Mean,
            AggregateArg::Rms => AggregateMethod::Rms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IcMetricArg {
    Sanchez,
    Seco,
}

impl From<IcMetricArg> for IcMetric {
    fn from(arg: IcMetricArg) -> Self {
        match arg {
            IcMetricArg::Sanchez => IcMetric::Sanchez,
            IcMetricArg::Seco => IcMetric::Seco,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MeasureArg {
    Lin,
    Resnik,
}

impl From<MeasureArg> for SemanticMeasure {
    fn from(arg: MeasureArg) -> Self {
        match arg {
            MeasureArg::Lin => SemanticMeasure::Lin,
            MeasureArg::Resnik => SemanticMeasure::Resnik,
        }
    }
}
