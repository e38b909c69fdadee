use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cohort::records::Diagnosis;
use crate::taxonomy::Taxonomy;

pub const LEGACY_VERSION: u8 = 9;
pub const CURRENT_VERSION: u8 = 10;

/// Legacy-to-current diagnosis code mapping.
#[derive(Debug, Clone, Default)]
pub struct CodeMap {
    map: HashMap<String, String>,
}

impl CodeMap {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, legacy: &str) -> Option<&str> {
        self.map.get(legacy).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

pub fn load_code_map(path: &Path) -> Result<CodeMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read code map TSV {}", path.display()))?;
    parse_code_map(&content, &path.display().to_string())
}

/// Parse `legacy_code<TAB>current_code` lines; the first mapping of a code wins.
pub fn parse_code_map(content: &str, source: &str) -> Result<CodeMap> {
    let mut map = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = trimmed.split('\t').collect();
        if parts.len() != 2 {
            bail!("{}:{} malformed TSV (expected 2 columns)", source, line_no);
        }
        let legacy = parts[0].trim();
        let current = parts[1].trim();
        if legacy.is_empty() || current.is_empty() {
            bail!("{}:{} empty field in TSV", source, line_no);
        }
        map.entry(legacy.to_string())
            .or_insert_with(|| current.to_string());
    }
    Ok(CodeMap { map })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub kept: usize,
    pub remapped: usize,
    pub dropped_unmapped: usize,
    pub dropped_unknown: usize,
    /// Neither the legacy nor the current coding scheme.
    pub dropped_version: usize,
}

impl ReconcileReport {
    pub fn dropped(&self) -> usize {
        self.dropped_unmapped + self.dropped_unknown + self.dropped_version
    }
}

/// Bring every diagnosis onto the current coding scheme and keep only codes
/// the taxonomy knows.
///
/// Legacy codes are translated through `code_map`; legacy codes without a
/// mapping (or with no map at all) are dropped, as are codes of any other
/// coding version.
pub fn reconcile_diagnoses(
    diagnoses: Vec<Diagnosis>,
    code_map: Option<&CodeMap>,
    taxonomy: &Taxonomy,
) -> (Vec<Diagnosis>, ReconcileReport) {
    let mut report = ReconcileReport::default();
    let mut kept = Vec::with_capacity(diagnoses.len());

    for mut d in diagnoses {
        d.code = d.code.trim().to_string();
        if d.version != LEGACY_VERSION && d.version != CURRENT_VERSION {
            report.dropped_version += 1;
            continue;
        }
        if d.version == LEGACY_VERSION {
            match code_map.and_then(|m| m.get(&d.code)) {
                Some(current) => {
                    d.code = current.to_string();
                    d.version = CURRENT_VERSION;
                    report.remapped += 1;
                }
                None => {
                    report.dropped_unmapped += 1;
                    continue;
                }
            }
        }
        if !taxonomy.contains(&d.code) {
            report.dropped_unknown += 1;
            continue;
        }
        report.kept += 1;
        kept.push(d);
    }

    info!(
        kept = report.kept,
        remapped = report.remapped,
        dropped_unmapped = report.dropped_unmapped,
        dropped_unknown = report.dropped_unknown,
        dropped_version = report.dropped_version,
        "diagnoses_reconciled"
    );
    (kept, report)
}
