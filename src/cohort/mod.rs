//! Cohort of ICU encounters and the all-pairs similarity run over it.
//!
//! Lifecycle: participants are known up front (`Uninitialized`), features are
//! fetched in bulk and assembled into encounters (`Initialized`), the TF-IDF
//! pre-pass back-fills diagnosis weights, and the pairwise sweep produces the
//! result set (`Compared`).

use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compare::{AggregateMethod, CompareConfig, EncounterComparator};
use crate::taxonomy::Taxonomy;

pub mod normalize;
pub mod pairwise;
pub mod records;
pub mod tfidf;

pub use normalize::{aggregate_results, normalize_categories};
pub use pairwise::{
    CanonicalPair, PairResult, PairStats, PairwiseEngine, PairwiseRun, SweepStats,
    anchors_before_batch,
};
pub use records::{AdmissionId, BinaryRecord, CodedObservation, Demographics, Diagnosis};
pub use tfidf::TfIdfTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcomes {
    pub los_icu: Option<f64>,
    pub los_hosp: Option<f64>,
    pub icu_mortality: Option<bool>,
    pub hosp_mortality: Option<bool>,
    pub thirty_day_mortality: Option<bool>,
    pub one_year_mortality: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub hadm_id: AdmissionId,
    #[serde(default)]
    pub subject_id: Option<u64>,
    #[serde(default)]
    pub outcomes: Option<Outcomes>,
}

impl Participant {
    pub fn new(hadm_id: AdmissionId, subject_id: Option<u64>) -> Self {
        Self {
            hadm_id,
            subject_id,
            outcomes: None,
        }
    }
}

/// One admission's feature bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Encounter {
    pub hadm_id: AdmissionId,
    pub subject_id: Option<u64>,
    pub demographics: Option<Demographics>,
    pub diagnoses: Vec<Diagnosis>,
    pub labevents: Vec<CodedObservation>,
    pub vitalsigns: Vec<CodedObservation>,
    pub inputevents: Vec<BinaryRecord>,
    pub prescriptions: Vec<BinaryRecord>,
}

impl Encounter {
    pub fn new(hadm_id: AdmissionId, subject_id: Option<u64>) -> Self {
        Self {
            hadm_id,
            subject_id,
            demographics: None,
            diagnoses: Vec::new(),
            labevents: Vec::new(),
            vitalsigns: Vec::new(),
            inputevents: Vec::new(),
            prescriptions: Vec::new(),
        }
    }

    /// Demographics present and no empty category.
    pub fn is_complete(&self) -> bool {
        self.demographics.is_some()
            && !self.diagnoses.is_empty()
            && !self.labevents.is_empty()
            && !self.vitalsigns.is_empty()
            && !self.inputevents.is_empty()
            && !self.prescriptions.is_empty()
    }
}

/// Bulk data access: per-category records for a set of admissions.
pub trait FeatureSource {
    fn demographics(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<Demographics>>;
    fn diagnoses(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<Diagnosis>>;
    fn labevents(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<CodedObservation>>;
    fn vitalsigns(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<CodedObservation>>;
    fn inputevents(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<BinaryRecord>>;
    fn prescriptions(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<BinaryRecord>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortState {
    Uninitialized,
    Initialized,
    Compared,
}

#[derive(Debug)]
pub struct Cohort {
    pub name: Option<String>,
    participants: Vec<Participant>,
    encounters: Vec<Encounter>,
    tfidf: Option<TfIdfTable>,
    results: Option<PairwiseRun>,
    state: CohortState,
}

impl Cohort {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self {
            name: None,
            participants,
            encounters: Vec::new(),
            tfidf: None,
            results: None,
            state: CohortState::Uninitialized,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn state(&self) -> CohortState {
        self.state
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn encounters(&self) -> &[Encounter] {
        &self.encounters
    }

    pub fn tfidf(&self) -> Option<&TfIdfTable> {
        self.tfidf.as_ref()
    }

    pub fn results(&self) -> Option<&PairwiseRun> {
        self.results.as_ref()
    }

    pub fn hadm_ids(&self) -> Vec<AdmissionId> {
        self.participants.iter().map(|p| p.hadm_id).collect()
    }

    pub fn subject_ids(&self) -> Vec<Option<u64>> {
        self.participants.iter().map(|p| p.subject_id).collect()
    }

    /// Attach outcome labels to a participant. Outcomes are set at most once.
    pub fn attach_outcomes(&mut self, hadm_id: AdmissionId, outcomes: Outcomes) -> Result<()> {
        let Some(participant) = self.participants.iter_mut().find(|p| p.hadm_id == hadm_id) else {
            bail!("admission {} is not part of the cohort", hadm_id);
        };
        if participant.outcomes.is_some() {
            bail!("outcomes already attached for admission {}", hadm_id);
        }
        participant.outcomes = Some(outcomes);
        Ok(())
    }

    /// Fetch every category for all participants and rebuild the encounters.
    ///
    /// Re-running discards encounters, TF-IDF weights and results.
    pub fn initialize(&mut self, source: &dyn FeatureSource) -> Result<()> {
        let hadm_ids = self.hadm_ids();
        let demographics = source.demographics(&hadm_ids)?;
        let diagnoses = source.diagnoses(&hadm_ids)?;
        let labevents = source.labevents(&hadm_ids)?;
        let vitalsigns = source.vitalsigns(&hadm_ids)?;
        let inputevents = source.inputevents(&hadm_ids)?;
        let prescriptions = source.prescriptions(&hadm_ids)?;

        let mut encounters: Vec<Encounter> = self
            .participants
            .iter()
            .map(|p| Encounter::new(p.hadm_id, p.subject_id))
            .collect();
        let slot: HashMap<AdmissionId, usize> = encounters
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.hadm_id, idx))
            .collect();

        for d in demographics {
            if let Some(&idx) = slot.get(&d.hadm_id) {
                encounters[idx].demographics = Some(d);
            }
        }
        for d in diagnoses {
            if let Some(&idx) = slot.get(&d.hadm_id) {
                encounters[idx].diagnoses.push(d);
            }
        }
        for o in labevents {
            if let Some(&idx) = slot.get(&o.hadm_id) {
                encounters[idx].labevents.push(o);
            }
        }
        for o in vitalsigns {
            if let Some(&idx) = slot.get(&o.hadm_id) {
                encounters[idx].vitalsigns.push(o);
            }
        }
        for r in inputevents {
            if let Some(&idx) = slot.get(&r.hadm_id) {
                encounters[idx].inputevents.push(r);
            }
        }
        for r in prescriptions {
            if let Some(&idx) = slot.get(&r.hadm_id) {
                encounters[idx].prescriptions.push(r);
            }
        }

        info!(encounters = encounters.len(), "encounters_built");
        self.encounters = encounters;
        self.tfidf = None;
        self.results = None;
        self.state = CohortState::Initialized;
        Ok(())
    }

    /// Drop encounters lacking demographics or any category; returns the count removed.
    pub fn retain_complete_encounters(&mut self) -> Result<usize> {
        self.require_initialized()?;
        if self.tfidf.is_some() {
            bail!("encounters cannot be filtered after the tf-idf pre-pass");
        }
        let before = self.encounters.len();
        self.encounters.retain(Encounter::is_complete);
        let removed = before - self.encounters.len();
        info!(removed, remaining = self.encounters.len(), "incomplete_encounters_dropped");
        Ok(removed)
    }

    /// Cohort-wide TF-IDF pre-pass; back-fills every diagnosis weight once.
    pub fn compute_tfidf(&mut self) -> Result<&TfIdfTable> {
        self.require_initialized()?;
        if self.tfidf.is_some() {
            bail!("tf-idf weights already applied to this cohort");
        }
        let table = TfIdfTable::compute(&self.encounters);
        table.apply(&mut self.encounters)?;
        info!(codes = table.code_count(), "tfidf_ready");
        Ok(self.tfidf.insert(table))
    }

    /// All-pairs comparison, then optional normalisation and aggregation.
    pub fn compare_encounters(
        &mut self,
        taxonomy: &Taxonomy,
        config: &CompareConfig,
        threads: usize,
    ) -> Result<&PairwiseRun> {
        self.require_initialized()?;
        if self.tfidf.is_none() {
            bail!("tf-idf pre-pass has not run for this cohort");
        }

        let comparator_aggregate = if config.normalize_categories {
            AggregateMethod::None
        } else {
            config.aggregate
        };
        let comparator =
            EncounterComparator::new(taxonomy, config).with_aggregate(comparator_aggregate);
        let engine = PairwiseEngine::new(comparator, threads);
        let mut run = engine.compare_all(&self.encounters)?;

        if config.normalize_categories {
            normalize_categories(&mut run.entries)?;
            aggregate_results(&mut run.entries, config.aggregate, &config.weights)?;
        }

        self.state = CohortState::Compared;
        Ok(self.results.insert(run))
    }

    fn require_initialized(&self) -> Result<()> {
        if self.state == CohortState::Uninitialized {
            bail!("cohort has not been initialized");
        }
        Ok(())
    }
}
