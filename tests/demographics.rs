use kira_encsim::cohort::Demographics;
use kira_encsim::compare::demographics::{height_similarity, proximity};
use kira_encsim::compare::{Comparator, DemographicsComparator, Similarity};

fn person(hadm_id: u64, age: Option<f64>, gender: Option<&str>, ethnicity: Option<&str>) -> Demographics {
    Demographics {
        subject_id: hadm_id * 100,
        hadm_id,
        age,
        gender: gender.map(str::to_string),
        ethnicity: ethnicity.map(str::to_string),
        height: None,
    }
}

#[test]
fn proximity_relative_to_larger_value() {
    assert!((proximity(60.0, 30.0) - 0.5).abs() < 1e-12);
    assert_eq!(proximity(0.0, 0.0), 1.0);
    assert_eq!(proximity(40.0, 40.0), 1.0);
}

#[test]
fn age_and_gender_are_averaged() {
    let cmp = DemographicsComparator::default();
    let a = person(1, Some(60.0), Some("M"), Some("WHITE"));
    let b = person(2, Some(30.0), Some("M"), Some("ASIAN"));
    let s = cmp.compare_pair(&a, &b).unwrap().score().unwrap();
    assert!((s - 0.75).abs() < 1e-12);
}

#[test]
fn ethnicity_extension() {
    let cmp = DemographicsComparator::new(true);
    let a = person(1, Some(60.0), Some("M"), Some("WHITE"));
    let b = person(2, Some(30.0), Some("M"), Some("ASIAN"));
    let s = cmp.compare_pair(&a, &b).unwrap().score().unwrap();
    assert!((s - 0.5).abs() < 1e-12);
}

#[test]
fn missing_components_are_skipped() {
    let cmp = DemographicsComparator::default();
    let a = person(1, None, Some("F"), None);
    let b = person(2, Some(50.0), Some("F"), None);
    assert_eq!(cmp.compare_pair(&a, &b).unwrap(), Similarity::Score(1.0));

    let empty_a = person(1, None, None, None);
    assert!(cmp.compare_pair(&empty_a, &b).unwrap().is_incomparable());
    let nan_age = person(3, Some(f64::NAN), None, None);
    assert!(cmp.compare_pair(&nan_age, &b).unwrap().is_incomparable());
}

#[test]
fn height_helper() {
    let mut a = person(1, None, None, None);
    let mut b = person(2, None, None, None);
    assert!(height_similarity(&a, &b).is_incomparable());
    a.height = Some(180.0);
    b.height = Some(90.0);
    assert_eq!(height_similarity(&a, &b), Similarity::Score(0.5));
}
