use kira_encsim::cohort::CodedObservation;
use kira_encsim::compare::{Comparator, DistributionComparator, Operand, Similarity};

fn obs(hadm_id: u64, category: &str, value: Option<f64>, abnormal: bool) -> CodedObservation {
    CodedObservation {
        category: category.to_string(),
        hadm_id,
        value,
        mean: Some(1.0),
        std: Some(1.0),
        abnormal,
    }
}

fn score(sim: Similarity) -> f64 {
    sim.score().expect("expected a comparable pair")
}

#[test]
fn both_normal_is_incomparable() {
    let cmp = DistributionComparator::default();
    let a = obs(1, "50912", Some(1.1), false);
    let b = obs(2, "50912", Some(0.9), false);
    assert!(cmp.compare_pair(&a, &b).unwrap().is_incomparable());
}

#[test]
fn one_abnormal_side_is_enough() {
    let cmp = DistributionComparator::new(false);
    let a = obs(1, "50912", Some(1.0), false);
    let b = obs(2, "50912", Some(1.0), true);
    let s = score(cmp.compare_pair(&a, &b).unwrap());
    assert!((s - 1.0).abs() < 1e-9);
}

#[test]
fn tail_pairs_outscore_central_pairs() {
    let cmp = DistributionComparator::default();
    let central = score(
        cmp.compare_pair(&obs(1, "x", Some(1.5), true), &obs(2, "x", Some(2.0), true))
            .unwrap(),
    );
    let tail = score(
        cmp.compare_pair(&obs(1, "x", Some(3.0), true), &obs(2, "x", Some(2.0), true))
            .unwrap(),
    );
    assert!((central - 0.4530).abs() < 1e-3);
    assert!((tail - 0.7073).abs() < 1e-3);
    assert!(tail > central);
}

#[test]
fn unscaled_similarity_is_percentile_distance() {
    let cmp = DistributionComparator::new(false);
    let s = score(
        cmp.compare_pair(&obs(1, "x", Some(1.5), true), &obs(2, "x", Some(2.0), true))
            .unwrap(),
    );
    assert!((s - (1.0 - (0.841_344_746 - 0.691_462_461))).abs() < 1e-6);
}

#[test]
fn same_admission_scores_one() {
    let cmp = DistributionComparator::default();
    let a = obs(7, "x", Some(5.0), true);
    let b = obs(7, "y", None, false);
    assert_eq!(cmp.compare_pair(&a, &b).unwrap(), Similarity::Score(1.0));
}

#[test]
fn category_mismatch_is_incomparable() {
    let cmp = DistributionComparator::default();
    let a = obs(1, "x", Some(3.0), true);
    let b = obs(2, "y", Some(3.0), true);
    assert!(cmp.compare_pair(&a, &b).unwrap().is_incomparable());
}

#[test]
fn missing_value_or_zero_std_is_incomparable() {
    let cmp = DistributionComparator::default();
    let a = obs(1, "x", None, true);
    let b = obs(2, "x", Some(3.0), true);
    assert!(cmp.compare_pair(&a, &b).unwrap().is_incomparable());

    let mut c = obs(1, "x", Some(3.0), true);
    c.std = Some(0.0);
    assert!(cmp.compare_pair(&c, &b).unwrap().is_incomparable());

    let mut d = obs(1, "x", Some(3.0), true);
    d.mean = None;
    assert!(cmp.compare_pair(&d, &b).unwrap().is_incomparable());
}

#[test]
fn set_compares_within_category_only() {
    let cmp = DistributionComparator::new(false);
    let set_a = vec![obs(1, "x", Some(3.0), true), obs(1, "y", Some(3.0), true)];
    let set_b = vec![obs(2, "x", Some(3.0), true)];
    let s = cmp.compare_set(&set_a, &set_b).unwrap();
    assert!((s - 1.0).abs() < 1e-9);
}

#[test]
fn set_without_comparable_pair_scores_zero() {
    let cmp = DistributionComparator::default();
    let set_a = vec![obs(1, "x", Some(1.0), false)];
    let set_b = vec![obs(2, "x", Some(1.0), false)];
    assert_eq!(cmp.compare_set(&set_a, &set_b).unwrap(), 0.0);
    assert_eq!(cmp.compare_set(&[], &set_b).unwrap(), 0.0);
}

#[test]
fn operand_shape_picks_strategy() {
    let cmp = DistributionComparator::new(false);
    let a = obs(1, "x", Some(3.0), true);
    let set_b = vec![obs(2, "x", Some(3.0), true), obs(2, "y", Some(3.0), true)];
    let single = cmp.compare(Operand::Single(&a), Operand::Single(&set_b[0])).unwrap();
    let mixed = cmp.compare(Operand::Single(&a), Operand::Set(&set_b)).unwrap();
    assert_eq!(single, Similarity::Score(1.0));
    assert_eq!(mixed, Similarity::Score(1.0));
}

#[test]
fn mismatched_reference_stats_are_incomparable() {
    let cmp = DistributionComparator::default();
    let a = obs(1, "50912", Some(3.0), true);
    let mut b = obs(2, "50912", Some(2.5), true);
    b.mean = None;
    b.std = None;
    assert!(cmp.compare_pair(&a, &b).unwrap().is_incomparable());
    assert!(cmp.compare_pair(&b, &a).unwrap().is_incomparable());

    b.mean = Some(2.0);
    b.std = Some(1.0);
    assert!(cmp.compare_pair(&a, &b).unwrap().is_incomparable());
    assert!(cmp.compare_pair(&b, &a).unwrap().is_incomparable());
}
