/// Admission identifier shared by every record of one hospital stay.
pub type AdmissionId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Demographics {
    pub subject_id: u64,
    pub hadm_id: AdmissionId,
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub height: Option<f64>,
}

/// A coded numerical observation (lab event or vital sign).
///
/// `mean`/`std` are the category's population reference, copied onto every
/// observation. `abnormal` is fixed at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct CodedObservation {
    pub category: String,
    pub hadm_id: AdmissionId,
    pub value: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub abnormal: bool,
}

/// Presence/absence record (input event item code, prescription drug code).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryRecord {
    pub hadm_id: AdmissionId,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub hadm_id: AdmissionId,
    pub code: String,
    pub version: u8,
    pub seq_num: u32,
    /// Back-filled once by the cohort TF-IDF pre-pass.
    pub tfidf: Option<f64>,
}
