use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::taxonomy::Taxonomy;

pub fn load_taxonomy(path: &Path) -> Result<Taxonomy> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read taxonomy TSV {}", path.display()))?;
    let edges = parse_edge_tsv(&content, &path.display().to_string())?;
    Taxonomy::from_edges(&edges)
        .with_context(|| format!("invalid taxonomy graph in {}", path.display()))
}

/// Parse `parent<TAB>child` lines. Blank lines and `#` comments are skipped.
pub fn parse_edge_tsv(content: &str, source: &str) -> Result<Vec<(String, String)>> {
    let mut edges = Vec::new();
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
        let parent = parts[0].trim();
        let child = parts[1].trim();
        if parent.is_empty() || child.is_empty() {
            bail!("{}:{} empty field in TSV", source, line_no);
        }
        edges.push((parent.to_string(), child.to_string()));
    }
    if edges.is_empty() {
        bail!("{} contains no taxonomy edges", source);
    }
    Ok(edges)
}
