//! Cohort bundle: the file-based feature source.
//!
//! A bundle is one JSON document (optionally gzip-compressed) holding the
//! participants and every per-category record table. Records are turned into
//! comparator-ready values at load time: raw lab values are parsed and masked,
//! reference statistics are attached and the abnormal flag is fixed.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cohort::{
    AdmissionId, BinaryRecord, CodedObservation, Demographics, Diagnosis, FeatureSource,
    Participant,
};
use crate::io::open_maybe_gz;
use crate::taxonomy::{CodeMap, ReconcileReport, Taxonomy, reconcile_diagnoses};

pub mod vitals;

use vitals::{VITAL_SIGN_NAMES, labevent_is_abnormal, vital_stats, vitalsign_is_abnormal};

/// Placeholder the source data uses for redacted lab values.
pub const MASKED_VALUE: &str = "___";

/// A raw observation value: number, text, or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Finite numeric value; masked, unparsable and non-finite values are `None`.
    pub fn parse(&self) -> Option<f64> {
        let v = match self {
            Self::Number(v) => *v,
            Self::Text(s) => {
                let s = s.trim();
                if s == MASKED_VALUE {
                    return None;
                }
                s.parse::<f64>().ok()?
            }
        };
        v.is_finite().then_some(v)
    }
}

/// Item or drug identifier; numeric ids are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCode {
    Int(i64),
    Text(String),
}

impl RawCode {
    pub fn as_code(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDemographics {
    pub subject_id: u64,
    pub hadm_id: AdmissionId,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub ethnicity: Option<String>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDiagnosis {
    pub hadm_id: AdmissionId,
    #[serde(alias = "code")]
    pub icd_code: String,
    #[serde(default = "default_icd_version", alias = "version")]
    pub icd_version: u8,
    #[serde(default)]
    pub seq_num: u32,
}

fn default_icd_version() -> u8 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLabEvent {
    pub itemid: RawCode,
    pub hadm_id: AdmissionId,
    #[serde(default)]
    pub value: Option<RawValue>,
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub std: Option<f64>,
    #[serde(default)]
    pub ref_lower: Option<f64>,
    #[serde(default)]
    pub ref_upper: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVitalSign {
    pub hadm_id: AdmissionId,
    pub name: String,
    #[serde(default)]
    pub value: Option<RawValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBinaryEvent {
    pub hadm_id: AdmissionId,
    #[serde(alias = "itemid", alias = "drug")]
    pub code: RawCode,
}

/// On-disk layout of a cohort bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBundle {
    #[serde(default)]
    pub name: Option<String>,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub demographics: Vec<RawDemographics>,
    #[serde(default)]
    pub diagnoses: Vec<RawDiagnosis>,
    #[serde(default)]
    pub labevents: Vec<RawLabEvent>,
    #[serde(default)]
    pub vitalsigns: Vec<RawVitalSign>,
    #[serde(default)]
    pub inputevents: Vec<RawBinaryEvent>,
    #[serde(default)]
    pub prescriptions: Vec<RawBinaryEvent>,
}

/// Loaded cohort with comparator-ready records.
#[derive(Debug, Clone, Default)]
pub struct CohortBundle {
    pub name: Option<String>,
    pub participants: Vec<Participant>,
    pub demographics: Vec<Demographics>,
    pub diagnoses: Vec<Diagnosis>,
    pub labevents: Vec<CodedObservation>,
    pub vitalsigns: Vec<CodedObservation>,
    pub inputevents: Vec<BinaryRecord>,
    pub prescriptions: Vec<BinaryRecord>,
    pub dropped_labevents: usize,
    pub warnings: Vec<String>,
}

impl CohortBundle {
    pub fn from_raw(raw: RawBundle) -> Result<Self> {
        let mut seen = HashSet::new();
        for p in &raw.participants {
            if !seen.insert(p.hadm_id) {
                bail!("duplicate participant admission id {}", p.hadm_id);
            }
        }

        let mut warnings = Vec::new();

        let mut demographics: Vec<Demographics> = Vec::with_capacity(raw.demographics.len());
        let mut demo_seen = HashSet::new();
        for d in raw.demographics {
            if !demo_seen.insert(d.hadm_id) {
                warnings.push(format!(
                    "duplicate demographics for admission {}; keeping the first",
                    d.hadm_id
                ));
                continue;
            }
            demographics.push(Demographics {
                subject_id: d.subject_id,
                hadm_id: d.hadm_id,
                age: d.age,
                gender: d.gender,
                ethnicity: d.ethnicity,
                height: d.height,
            });
        }

        let diagnoses = raw
            .diagnoses
            .into_iter()
            .map(|d| Diagnosis {
                hadm_id: d.hadm_id,
                code: d.icd_code.trim().to_string(),
                version: d.icd_version,
                seq_num: d.seq_num,
                tfidf: None,
            })
            .collect();

        let lab_stats = lab_reference_stats(&raw.labevents, &mut warnings);
        let mut dropped_labevents = 0usize;
        let mut labevents = Vec::with_capacity(raw.labevents.len());
        for lab in raw.labevents {
            let Some(value) = lab.value.as_ref().and_then(RawValue::parse) else {
                dropped_labevents += 1;
                continue;
            };
            let category = lab.itemid.as_code();
            let stats = lab_stats.get(&category).copied();
            labevents.push(CodedObservation {
                hadm_id: lab.hadm_id,
                value: Some(value),
                mean: stats.map(|(mean, _)| mean),
                std: stats.map(|(_, std)| std),
                abnormal: labevent_is_abnormal(
                    value,
                    lab.ref_lower,
                    lab.ref_upper,
                    stats.map(|(mean, _)| mean),
                    stats.map(|(_, std)| std),
                ),
                category,
            });
        }

        let mut unknown_vitals: HashSet<String> = HashSet::new();
        let vitalsigns = raw
            .vitalsigns
            .into_iter()
            .map(|v| {
                let name = v.name.trim().to_string();
                let value = v.value.as_ref().and_then(RawValue::parse);
                if !VITAL_SIGN_NAMES.contains(&name.as_str()) {
                    unknown_vitals.insert(name.clone());
                }
                let stats = vital_stats(&name);
                CodedObservation {
                    abnormal: vitalsign_is_abnormal(&name, value),
                    category: name,
                    hadm_id: v.hadm_id,
                    value,
                    mean: stats.map(|s| s.mean),
                    std: stats.map(|s| s.std),
                }
            })
            .collect();
        let mut unknown_vitals: Vec<String> = unknown_vitals.into_iter().collect();
        unknown_vitals.sort();
        for name in unknown_vitals {
            warnings.push(format!(
                "unknown vital sign '{}' has no reference statistics",
                name
            ));
        }

        if dropped_labevents > 0 {
            warnings.push(format!(
                "{} lab events without a usable value were dropped",
                dropped_labevents
            ));
        }
        for w in &warnings {
            warn!(warning = %w, "bundle_warning");
        }

        Ok(Self {
            name: raw.name,
            participants: raw.participants,
            demographics,
            diagnoses,
            labevents,
            vitalsigns,
            inputevents: binary_records(raw.inputevents),
            prescriptions: binary_records(raw.prescriptions),
            dropped_labevents,
            warnings,
        })
    }

    /// Map legacy diagnosis codes and drop codes missing from the taxonomy.
    pub fn reconcile(
        &mut self,
        code_map: Option<&CodeMap>,
        taxonomy: &Taxonomy,
    ) -> ReconcileReport {
        let diagnoses = std::mem::take(&mut self.diagnoses);
        let (kept, report) = reconcile_diagnoses(diagnoses, code_map, taxonomy);
        self.diagnoses = kept;
        report
    }
}

/// One reference mean/std per lab item: the first record carrying both wins.
/// Records without statistics inherit their item's; disagreeing records are
/// reported once per item.
fn lab_reference_stats(
    labevents: &[RawLabEvent],
    warnings: &mut Vec<String>,
) -> HashMap<String, (f64, f64)> {
    let mut stats: HashMap<String, (f64, f64)> = HashMap::new();
    let mut conflicting: HashSet<String> = HashSet::new();
    for lab in labevents {
        let (Some(mean), Some(std)) = (lab.mean, lab.std) else {
            continue;
        };
        if !(mean.is_finite() && std.is_finite()) {
            continue;
        }
        let item = lab.itemid.as_code();
        match stats.get(&item) {
            Some(&(m, s)) if m != mean || s != std => {
                conflicting.insert(item);
            }
            Some(_) => {}
            None => {
                stats.insert(item, (mean, std));
            }
        }
    }
    let mut conflicting: Vec<String> = conflicting.into_iter().collect();
    conflicting.sort();
    for item in conflicting {
        warnings.push(format!(
            "lab item {} has conflicting reference statistics; keeping the first",
            item
        ));
    }
    stats
}

fn binary_records(events: Vec<RawBinaryEvent>) -> Vec<BinaryRecord> {
    events
        .into_iter()
        .map(|e| BinaryRecord {
            hadm_id: e.hadm_id,
            value: e.code.as_code(),
        })
        .filter(|r| !r.value.is_empty())
        .collect()
}

pub fn parse_bundle(content: &str, source: &str) -> Result<CohortBundle> {
    let raw: RawBundle = serde_json::from_str(content)
        .with_context(|| format!("failed to parse cohort bundle {}", source))?;
    CohortBundle::from_raw(raw)
}

/// Load a bundle from `.json` or `.json.gz`.
pub fn load_bundle(path: &Path) -> Result<CohortBundle> {
    let mut reader = open_maybe_gz(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let bundle = parse_bundle(&content, &path.display().to_string())?;
    info!(
        participants = bundle.participants.len(),
        diagnoses = bundle.diagnoses.len(),
        labevents = bundle.labevents.len(),
        vitalsigns = bundle.vitalsigns.len(),
        inputevents = bundle.inputevents.len(),
        prescriptions = bundle.prescriptions.len(),
        "bundle_loaded"
    );
    Ok(bundle)
}

fn select<T: Clone>(
    records: &[T],
    hadm_ids: &[AdmissionId],
    key: impl Fn(&T) -> AdmissionId,
) -> Vec<T> {
    let wanted: HashSet<AdmissionId> = hadm_ids.iter().copied().collect();
    records
        .iter()
        .filter(|r| wanted.contains(&key(*r)))
        .cloned()
        .collect()
}

impl FeatureSource for CohortBundle {
    fn demographics(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<Demographics>> {
        Ok(select(&self.demographics, hadm_ids, |d| d.hadm_id))
    }

    fn diagnoses(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<Diagnosis>> {
        Ok(select(&self.diagnoses, hadm_ids, |d| d.hadm_id))
    }

    fn labevents(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<CodedObservation>> {
        Ok(select(&self.labevents, hadm_ids, |o| o.hadm_id))
    }

    fn vitalsigns(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<CodedObservation>> {
        Ok(select(&self.vitalsigns, hadm_ids, |o| o.hadm_id))
    }

    fn inputevents(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<BinaryRecord>> {
        Ok(select(&self.inputevents, hadm_ids, |r| r.hadm_id))
    }

    fn prescriptions(&self, hadm_ids: &[AdmissionId]) -> Result<Vec<BinaryRecord>> {
        Ok(select(&self.prescriptions, hadm_ids, |r| r.hadm_id))
    }
}

/// Per-category record counts by admission, for validation reports.
pub fn records_per_admission(bundle: &CohortBundle) -> HashMap<AdmissionId, usize> {
    let mut counts: HashMap<AdmissionId, usize> = HashMap::new();
    let ids = bundle
        .diagnoses
        .iter()
        .map(|d| d.hadm_id)
        .chain(bundle.labevents.iter().map(|o| o.hadm_id))
        .chain(bundle.vitalsigns.iter().map(|o| o.hadm_id))
        .chain(bundle.inputevents.iter().map(|r| r.hadm_id))
        .chain(bundle.prescriptions.iter().map(|r| r.hadm_id));
    for id in ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}
