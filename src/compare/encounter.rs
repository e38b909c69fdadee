use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::cohort::Encounter;
use crate::compare::{
    BinaryComparator, Comparator, DemographicsComparator, DiagnosisComparator,
    DistributionComparator, Operand,
};
use crate::taxonomy::{IcMetric, SemanticMeasure, Taxonomy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Demographics,
    Diagnoses,
    Labevents,
    Vitalsigns,
    Inputevents,
    Prescriptions,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Demographics,
        Category::Diagnoses,
        Category::Labevents,
        Category::Vitalsigns,
        Category::Inputevents,
        Category::Prescriptions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Demographics => "demographics",
            Self::Diagnoses => "diagnoses",
            Self::Labevents => "labevents",
            Self::Vitalsigns => "vitalsigns",
            Self::Inputevents => "inputevents",
            Self::Prescriptions => "prescriptions",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One score per feature category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub demographics: f64,
    pub diagnoses: f64,
    pub labevents: f64,
    pub vitalsigns: f64,
    pub inputevents: f64,
    pub prescriptions: f64,
}

impl CategoryScores {
    pub fn uniform(value: f64) -> Self {
        Self {
            demographics: value,
            diagnoses: value,
            labevents: value,
            vitalsigns: value,
            inputevents: value,
            prescriptions: value,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Demographics => self.demographics,
            Category::Diagnoses => self.diagnoses,
            Category::Labevents => self.labevents,
            Category::Vitalsigns => self.vitalsigns,
            Category::Inputevents => self.inputevents,
            Category::Prescriptions => self.prescriptions,
        }
    }

    pub fn set(&mut self, category: Category, value: f64) {
        match category {
            Category::Demographics => self.demographics = value,
            Category::Diagnoses => self.diagnoses = value,
            Category::Labevents => self.labevents = value,
            Category::Vitalsigns => self.vitalsigns = value,
            Category::Inputevents => self.inputevents = value,
            Category::Prescriptions => self.prescriptions = value,
        }
    }
}

/// Per-category aggregation weights. They conventionally sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub demographics: f64,
    pub diagnoses: f64,
    pub labevents: f64,
    pub vitalsigns: f64,
    pub inputevents: f64,
    pub prescriptions: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            demographics: 0.15,
            diagnoses: 0.15,
            labevents: 0.20,
            vitalsigns: 0.20,
            inputevents: 0.15,
            prescriptions: 0.15,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Demographics => self.demographics,
            Category::Diagnoses => self.diagnoses,
            Category::Labevents => self.labevents,
            Category::Vitalsigns => self.vitalsigns,
            Category::Inputevents => self.inputevents,
            Category::Prescriptions => self.prescriptions,
        }
    }

    pub fn sum(&self) -> f64 {
        Category::ALL.iter().map(|&c| self.get(c)).sum()
    }

    /// Every weight finite and non-negative, and at least one positive.
    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            let w = self.get(category);
            if !w.is_finite() || w < 0.0 {
                bail!("weight for {} must be a non-negative number, got {}", category, w);
            }
        }
        if self.sum() <= 0.0 {
            bail!("category weights must not all be zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMethod {
    /// Keep per-category scores.
    #[default]
    None,
    /// Weighted arithmetic mean.
    Mean,
    /// Weighted root mean square.
    Rms,
}

impl FromStr for AggregateMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "mean" => Ok(Self::Mean),
            "rms" | "rmse" => Ok(Self::Rms),
            other => bail!("unknown aggregate method '{}'", other),
        }
    }
}

impl fmt::Display for AggregateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Mean => f.write_str("mean"),
            Self::Rms => f.write_str("rms"),
        }
    }
}

impl AggregateMethod {
    /// Combine category scores; `None` for [`AggregateMethod::None`].
    pub fn apply(self, scores: &CategoryScores, weights: &CategoryWeights) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Mean => Some(
                Category::ALL
                    .iter()
                    .map(|&c| weights.get(c) * scores.get(c))
                    .sum(),
            ),
            Self::Rms => Some(
                Category::ALL
                    .iter()
                    .map(|&c| weights.get(c) * scores.get(c).powi(2))
                    .sum::<f64>()
                    .sqrt(),
            ),
        }
    }
}

/// Encounter-pair similarity: raw category scores or one aggregated scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncounterSimilarity {
    Categories(CategoryScores),
    Aggregate(f64),
}

impl EncounterSimilarity {
    pub fn categories(&self) -> Option<&CategoryScores> {
        match self {
            Self::Categories(scores) => Some(scores),
            Self::Aggregate(_) => None,
        }
    }

    pub fn aggregate(&self) -> Option<f64> {
        match self {
            Self::Categories(_) => None,
            Self::Aggregate(v) => Some(*v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompareConfig {
    pub weights: CategoryWeights,
    pub aggregate: AggregateMethod,
    pub scale_by_distribution: bool,
    pub normalize_categories: bool,
    pub ic_metric: IcMetric,
    pub measure: SemanticMeasure,
    pub with_ethnicity: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            aggregate: AggregateMethod::None,
            scale_by_distribution: true,
            normalize_categories: true,
            ic_metric: IcMetric::default(),
            measure: SemanticMeasure::default(),
            with_ethnicity: false,
        }
    }
}

/// Composes the category comparators into one encounter-pair comparison.
#[derive(Debug, Clone, Copy)]
pub struct EncounterComparator<'a> {
    demographics: DemographicsComparator,
    diagnoses: DiagnosisComparator<'a>,
    observations: DistributionComparator,
    binary: BinaryComparator,
    weights: CategoryWeights,
    aggregate: AggregateMethod,
}

impl<'a> EncounterComparator<'a> {
    pub fn new(taxonomy: &'a Taxonomy, config: &CompareConfig) -> Self {
        Self {
            demographics: DemographicsComparator::new(config.with_ethnicity),
            diagnoses: DiagnosisComparator::new(taxonomy, config.ic_metric, config.measure),
            observations: DistributionComparator::new(config.scale_by_distribution),
            binary: BinaryComparator::new(),
            weights: config.weights,
            aggregate: config.aggregate,
        }
    }

    pub fn with_aggregate(mut self, aggregate: AggregateMethod) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn aggregate_method(&self) -> AggregateMethod {
        self.aggregate
    }

    pub fn weights(&self) -> &CategoryWeights {
        &self.weights
    }

    pub fn category_scores(&self, a: &Encounter, b: &Encounter) -> Result<CategoryScores> {
        if a.hadm_id == b.hadm_id {
            return Ok(CategoryScores::uniform(1.0));
        }

        let demographics = match (&a.demographics, &b.demographics) {
            (Some(da), Some(db)) => self
                .demographics
                .compare(Operand::Single(da), Operand::Single(db))?
                .or_zero(),
            _ => 0.0,
        };
        let diagnoses = self
            .diagnoses
            .compare(Operand::Set(&a.diagnoses), Operand::Set(&b.diagnoses))?
            .or_zero();
        let labevents = self
            .observations
            .compare(Operand::Set(&a.labevents), Operand::Set(&b.labevents))?
            .or_zero();
        let vitalsigns = self
            .observations
            .compare(Operand::Set(&a.vitalsigns), Operand::Set(&b.vitalsigns))?
            .or_zero();
        let inputevents = self
            .binary
            .compare(Operand::Set(&a.inputevents), Operand::Set(&b.inputevents))?
            .or_zero();
        let prescriptions = self
            .binary
            .compare(Operand::Set(&a.prescriptions), Operand::Set(&b.prescriptions))?
            .or_zero();

        Ok(CategoryScores {
            demographics,
            diagnoses,
            labevents,
            vitalsigns,
            inputevents,
            prescriptions,
        })
    }

    pub fn compare(&self, a: &Encounter, b: &Encounter) -> Result<EncounterSimilarity> {
        let scores = self.category_scores(a, b)?;
        if a.hadm_id == b.hadm_id && self.aggregate != AggregateMethod::None {
            return Ok(EncounterSimilarity::Aggregate(1.0));
        }
        Ok(match self.aggregate.apply(&scores, &self.weights) {
            Some(value) => EncounterSimilarity::Aggregate(value),
            None => EncounterSimilarity::Categories(scores),
        })
    }
}
