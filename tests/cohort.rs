use kira_encsim::cohort::{
    Cohort, CohortState, Outcomes, Participant, aggregate_results, normalize_categories,
};
use kira_encsim::compare::{AggregateMethod, Category, CompareConfig, EncounterSimilarity};
use kira_encsim::input::{CohortBundle, parse_bundle};
use kira_encsim::taxonomy::{Taxonomy, parse_edge_tsv};

const BUNDLE: &str = r#"{
  "name": "unit",
  "participants": [
    {"hadm_id": 10, "subject_id": 1},
    {"hadm_id": 11, "subject_id": 2},
    {"hadm_id": 12, "subject_id": 3}
  ],
  "demographics": [
    {"subject_id": 1, "hadm_id": 10, "age": 60, "gender": "M"},
    {"subject_id": 2, "hadm_id": 11, "age": 30, "gender": "F"},
    {"subject_id": 3, "hadm_id": 12, "age": 60, "gender": "M"}
  ],
  "diagnoses": [
    {"hadm_id": 10, "icd_code": "A1", "icd_version": 10, "seq_num": 1},
    {"hadm_id": 10, "icd_code": "A2", "icd_version": 10, "seq_num": 2},
    {"hadm_id": 11, "icd_code": "B1", "icd_version": 10, "seq_num": 1},
    {"hadm_id": 12, "icd_code": "A1", "icd_version": 10, "seq_num": 1}
  ],
  "labevents": [
    {"itemid": 50912, "hadm_id": 10, "value": 3.0, "mean": 1.0, "std": 0.5, "ref_lower": 0.5, "ref_upper": 1.2},
    {"itemid": 50912, "hadm_id": 11, "value": "___", "mean": 1.0, "std": 0.5},
    {"itemid": 50912, "hadm_id": 12, "value": "2.5", "mean": 1.0, "std": 0.5, "ref_lower": 0.5, "ref_upper": 1.2}
  ],
  "vitalsigns": [
    {"hadm_id": 10, "name": "heart_rate", "value": 120},
    {"hadm_id": 11, "name": "heart_rate", "value": 70},
    {"hadm_id": 12, "name": "heart_rate", "value": 130}
  ],
  "inputevents": [
    {"hadm_id": 10, "itemid": 225158},
    {"hadm_id": 10, "itemid": 220949},
    {"hadm_id": 11, "itemid": 225158},
    {"hadm_id": 12, "itemid": 220949}
  ],
  "prescriptions": [
    {"hadm_id": 10, "drug": "Heparin"},
    {"hadm_id": 12, "drug": "Heparin"},
    {"hadm_id": 12, "drug": "Insulin"}
  ]
}"#;

fn bundle() -> CohortBundle {
    parse_bundle(BUNDLE, "bundle.json").unwrap()
}

fn taxonomy() -> Taxonomy {
    let edges = parse_edge_tsv("ROOT\tA\nROOT\tB\nA\tA1\nA\tA2\nB\tB1\n", "edges.tsv").unwrap();
    Taxonomy::from_edges(&edges).unwrap()
}

fn ready_cohort(source: &CohortBundle) -> Cohort {
    let mut cohort = Cohort::new(source.participants.clone());
    cohort.initialize(source).unwrap();
    cohort.compute_tfidf().unwrap();
    cohort
}

#[test]
fn initialize_groups_records_by_admission() {
    let source = bundle();
    let mut cohort = Cohort::new(source.participants.clone());
    assert_eq!(cohort.state(), CohortState::Uninitialized);
    cohort.initialize(&source).unwrap();
    assert_eq!(cohort.state(), CohortState::Initialized);

    let e = cohort.encounters();
    assert_eq!(e.len(), 3);
    assert_eq!(e[0].hadm_id, 10);
    assert_eq!(e[0].diagnoses.len(), 2);
    assert_eq!(e[0].inputevents.len(), 2);
    assert!(e[1].labevents.is_empty());
    assert!(e[1].prescriptions.is_empty());
    assert_eq!(e[2].prescriptions.len(), 2);
    assert_eq!(cohort.hadm_ids(), vec![10, 11, 12]);
}

#[test]
fn state_machine_guards() {
    let source = bundle();
    let tax = taxonomy();
    let config = CompareConfig::default();

    let mut cohort = Cohort::new(source.participants.clone());
    assert!(cohort.compare_encounters(&tax, &config, 1).is_err());
    assert!(cohort.compute_tfidf().is_err());

    cohort.initialize(&source).unwrap();
    let err = cohort.compare_encounters(&tax, &config, 1).unwrap_err();
    assert!(err.to_string().contains("tf-idf"));

    cohort.compute_tfidf().unwrap();
    assert!(cohort.compute_tfidf().is_err());
    assert!(cohort.retain_complete_encounters().is_err());

    cohort.compare_encounters(&tax, &config, 1).unwrap();
    assert_eq!(cohort.state(), CohortState::Compared);

    // Re-initialising starts over.
    cohort.initialize(&source).unwrap();
    assert_eq!(cohort.state(), CohortState::Initialized);
    assert!(cohort.tfidf().is_none());
    assert!(cohort.results().is_none());
}

#[test]
fn outcomes_attach_once() {
    let mut cohort = Cohort::new(vec![Participant::new(10, Some(1))]);
    let outcomes = Outcomes {
        los_icu: Some(2.5),
        hosp_mortality: Some(false),
        ..Outcomes::default()
    };
    cohort.attach_outcomes(10, outcomes.clone()).unwrap();
    assert_eq!(cohort.participants()[0].outcomes, Some(outcomes.clone()));
    assert!(cohort.attach_outcomes(10, outcomes.clone()).is_err());
    assert!(cohort.attach_outcomes(99, outcomes).is_err());
}

#[test]
fn retain_complete_drops_sparse_encounters() {
    let source = bundle();
    let mut cohort = Cohort::new(source.participants.clone());
    cohort.initialize(&source).unwrap();
    let removed = cohort.retain_complete_encounters().unwrap();
    assert_eq!(removed, 1);
    let ids: Vec<u64> = cohort.encounters().iter().map(|e| e.hadm_id).collect();
    assert_eq!(ids, vec![10, 12]);
}

#[test]
fn three_encounters_give_nine_entries_six_unique() {
    let source = bundle();
    let tax = taxonomy();
    let mut cohort = ready_cohort(&source);
    let run = cohort
        .compare_encounters(&tax, &CompareConfig::default(), 2)
        .unwrap();

    assert_eq!(run.entries.len(), 9);
    assert_eq!(run.stats.raw_entries, 9);
    assert_eq!(run.stats.unique_pairs, 6);
    assert_eq!(run.stats.cache_hits, 3);
    assert_eq!(run.stats.failed_pairs, 0);

    for r in run.entries.iter().filter(|r| r.is_self_pair()) {
        let scores = r.similarity.categories().unwrap();
        for c in Category::ALL {
            assert_eq!(scores.get(c), 1.0);
        }
    }
    for (a, b) in [(10, 11), (10, 12), (11, 12)] {
        assert_eq!(run.get(a, b).unwrap().similarity, run.get(b, a).unwrap().similarity);
    }
}

#[test]
fn normalized_scores_span_unit_interval() {
    let source = bundle();
    let tax = taxonomy();
    let mut cohort = ready_cohort(&source);
    let run = cohort
        .compare_encounters(&tax, &CompareConfig::default(), 1)
        .unwrap();

    for c in Category::ALL {
        let values: Vec<f64> = run
            .entries
            .iter()
            .filter(|r| !r.is_self_pair())
            .map(|r| r.similarity.categories().unwrap().get(c))
            .collect();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(min, 0.0);
        assert!(max == 1.0 || max == 0.0);
    }

    // 10 and 12 share age, gender and a diagnosis: the closest pair.
    let close = run.get(10, 12).unwrap().similarity.categories().unwrap();
    assert_eq!(close.demographics, 1.0);
    assert_eq!(close.diagnoses, 1.0);
}

#[test]
fn normalization_is_idempotent() {
    let source = bundle();
    let tax = taxonomy();
    let mut cohort = ready_cohort(&source);
    let run = cohort
        .compare_encounters(&tax, &CompareConfig::default(), 1)
        .unwrap();

    let mut again = run.entries.clone();
    normalize_categories(&mut again).unwrap();
    assert_eq!(again, run.entries);
}

#[test]
fn aggregated_run_has_unit_self_pairs() {
    let source = bundle();
    let tax = taxonomy();
    let mut cohort = ready_cohort(&source);
    let config = CompareConfig {
        aggregate: AggregateMethod::Mean,
        ..CompareConfig::default()
    };
    let run = cohort.compare_encounters(&tax, &config, 1).unwrap();
    for r in &run.entries {
        let v = r.similarity.aggregate().unwrap();
        assert!((0.0..=1.0).contains(&v));
        if r.is_self_pair() {
            assert_eq!(v, 1.0);
        }
    }
    let ab = run.get(10, 12).unwrap().similarity.aggregate().unwrap();
    let ac = run.get(10, 11).unwrap().similarity.aggregate().unwrap();
    assert!(ab > ac);
}

#[test]
fn raw_run_keeps_unnormalized_scores() {
    let source = bundle();
    let tax = taxonomy();
    let mut cohort = ready_cohort(&source);
    let config = CompareConfig {
        normalize_categories: false,
        ..CompareConfig::default()
    };
    let run = cohort.compare_encounters(&tax, &config, 1).unwrap().clone();
    let pair = run.get(10, 11).unwrap().similarity.categories().unwrap();
    // 60/M vs 30/F
    assert!((pair.demographics - 0.25).abs() < 1e-12);
    // {225158, 220949} vs {225158}
    assert!((pair.inputevents - 0.5).abs() < 1e-12);
    // {Heparin} vs {}
    assert_eq!(pair.prescriptions, 0.0);

    let mut entries = run.entries.clone();
    aggregate_results(&mut entries, AggregateMethod::Mean, &config.weights).unwrap();
    assert!(entries
        .iter()
        .all(|r| matches!(r.similarity, EncounterSimilarity::Aggregate(_))));
    assert!(normalize_categories(&mut entries).is_err());
}
