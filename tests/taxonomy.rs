use std::fs;

use kira_encsim::cohort::Diagnosis;
use kira_encsim::compare::Similarity;
use kira_encsim::taxonomy::{
    IcMetric, SemanticMeasure, Taxonomy, code_similarity, load_taxonomy,
    most_informative_common_ancestor, parse_code_map, parse_edge_tsv, reconcile_diagnoses,
};
use tempfile::TempDir;

const EDGES: &str = "# parent\tchild\nROOT\tA\nROOT\tB\n\nA\tA1\nA\tA2\nB\tB1\n";

fn taxonomy() -> Taxonomy {
    let edges = parse_edge_tsv(EDGES, "edges.tsv").unwrap();
    Taxonomy::from_edges(&edges).unwrap()
}

fn diagnosis(hadm_id: u64, code: &str, version: u8) -> Diagnosis {
    Diagnosis {
        hadm_id,
        code: code.to_string(),
        version,
        seq_num: 1,
        tfidf: None,
    }
}

#[test]
fn graph_shape() {
    let tax = taxonomy();
    assert_eq!(tax.len(), 6);
    assert_eq!(tax.n_leaves(), 3);
    let root = tax.index_of("ROOT").unwrap();
    let a = tax.index_of("A").unwrap();
    let a1 = tax.index_of("A1").unwrap();
    assert_eq!(tax.descendant_count(root), 6);
    assert_eq!(tax.leaf_count(a), 2);
    assert!(tax.is_leaf(a1));
    assert_eq!(tax.ancestors(a1).len(), 3);
    assert_eq!(tax.parents(a1), &[a]);
}

#[test]
fn sanchez_ic_values() {
    let tax = taxonomy();
    let ic = |code: &str| tax.ic(tax.index_of(code).unwrap(), IcMetric::Sanchez);
    assert!(ic("ROOT").abs() < 1e-12);
    assert!((ic("A") - 2f64.ln()).abs() < 1e-9);
    assert!((ic("B") - (8.0f64 / 3.0).ln()).abs() < 1e-9);
    assert!((ic("A1") - 3f64.ln()).abs() < 1e-9);
    assert!((tax.max_ic(IcMetric::Sanchez) - 3f64.ln()).abs() < 1e-9);
}

#[test]
fn seco_ic_values() {
    let tax = taxonomy();
    let ic = |code: &str| tax.ic(tax.index_of(code).unwrap(), IcMetric::Seco);
    assert!(ic("ROOT").abs() < 1e-12);
    assert!((ic("A") - 2f64.ln()).abs() < 1e-9);
    assert!((ic("A1") - 6f64.ln()).abs() < 1e-9);
}

#[test]
fn mica_of_siblings_is_parent() {
    let tax = taxonomy();
    let a1 = tax.index_of("A1").unwrap();
    let a2 = tax.index_of("A2").unwrap();
    let (node, ic) = most_informative_common_ancestor(&tax, a1, a2, IcMetric::Sanchez).unwrap();
    assert_eq!(tax.code(node), "A");
    assert!((ic - 2f64.ln()).abs() < 1e-9);
}

#[test]
fn lin_similarity() {
    let tax = taxonomy();
    let lin = |a: &str, b: &str| {
        code_similarity(&tax, a, b, IcMetric::Sanchez, SemanticMeasure::Lin)
            .score()
            .unwrap()
    };
    assert_eq!(lin("A1", "A1"), 1.0);
    assert!((lin("A1", "A2") - 2f64.ln() / 3f64.ln()).abs() < 1e-9);
    assert_eq!(lin("A1", "B1"), 0.0);
    assert!((lin("A1", "A2") - lin("A2", "A1")).abs() < 1e-12);
}

#[test]
fn resnik_is_scaled_by_max_ic() {
    let tax = taxonomy();
    let s = code_similarity(&tax, "A1", "A2", IcMetric::Sanchez, SemanticMeasure::Resnik);
    assert!((s.score().unwrap() - 2f64.ln() / 3f64.ln()).abs() < 1e-9);
    let root_pair = code_similarity(&tax, "A1", "B1", IcMetric::Seco, SemanticMeasure::Resnik);
    assert_eq!(root_pair, Similarity::Score(0.0));
}

#[test]
fn unknown_code_is_incomparable() {
    let tax = taxonomy();
    let s = code_similarity(&tax, "A1", "Z99", IcMetric::Sanchez, SemanticMeasure::Lin);
    assert!(s.is_incomparable());
}

#[test]
fn metric_names_parse() {
    assert_eq!("sanchez".parse::<IcMetric>().unwrap(), IcMetric::Sanchez);
    assert_eq!("intrinsic_ic".parse::<IcMetric>().unwrap(), IcMetric::Seco);
    assert_eq!("resnik_scaled".parse::<SemanticMeasure>().unwrap(), SemanticMeasure::Resnik);
    assert!("wup".parse::<SemanticMeasure>().is_err());
    assert!("zhou".parse::<IcMetric>().is_err());
}

#[test]
fn cycle_is_rejected() {
    let edges = vec![("A", "B"), ("B", "C"), ("C", "A")];
    assert!(Taxonomy::from_edges(&edges).is_err());
    assert!(Taxonomy::from_edges(&[("A", "A")]).is_err());
}

#[test]
fn malformed_line_reports_location() {
    let err = parse_edge_tsv("ROOT\tA\nROOT A B\n", "edges.tsv").unwrap_err();
    assert!(err.to_string().contains("edges.tsv:2"));
    assert!(parse_edge_tsv("# only comments\n", "edges.tsv").is_err());
}

#[test]
fn load_from_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("edges.tsv");
    fs::write(&path, EDGES).unwrap();
    let tax = load_taxonomy(&path).unwrap();
    assert!(tax.contains("B1"));
    assert!(load_taxonomy(&tmp.path().join("missing.tsv")).is_err());
}

#[test]
fn reconcile_maps_legacy_and_drops_unknown() {
    let tax = taxonomy();
    let map = parse_code_map("4019\tA1\n4019\tB1\n25000\tZ1\n", "map.tsv").unwrap();
    assert_eq!(map.get("4019"), Some("A1"));

    let input = vec![
        diagnosis(1, " A2 ", 10),
        diagnosis(1, "4019", 9),
        diagnosis(1, "V3000", 9),
        diagnosis(2, "25000", 9),
        diagnosis(2, "Q99", 10),
    ];
    let (kept, report) = reconcile_diagnoses(input, Some(&map), &tax);
    let codes: Vec<&str> = kept.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["A2", "A1"]);
    assert!(kept.iter().all(|d| d.version == 10));
    assert_eq!(report.kept, 2);
    assert_eq!(report.remapped, 2);
    assert_eq!(report.dropped_unmapped, 1);
    assert_eq!(report.dropped_unknown, 2);
    assert_eq!(report.dropped(), 3);
}

#[test]
fn reconcile_without_map_drops_legacy() {
    let tax = taxonomy();
    let (kept, report) = reconcile_diagnoses(vec![diagnosis(1, "A1", 9)], None, &tax);
    assert!(kept.is_empty());
    assert_eq!(report.dropped_unmapped, 1);
}

#[test]
fn reconcile_drops_unsupported_versions() {
    let tax = taxonomy();
    let input = vec![diagnosis(1, "A1", 11), diagnosis(1, "A2", 10), diagnosis(2, "B1", 0)];
    let (kept, report) = reconcile_diagnoses(input, None, &tax);
    let codes: Vec<&str> = kept.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["A2"]);
    assert_eq!(report.dropped_version, 2);
    assert_eq!(report.dropped_unknown, 0);
    assert_eq!(report.dropped(), 2);
}
