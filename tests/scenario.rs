pub mod common;
use common::*;
use quantcheck::prelude::*;
use std::{cell::Cell, rc::Rc, time::Duration};

#[test]
fn additive_inverses_exist() {
    setup();
    // ∀a ∈ [-10, 10]. ∃b ∈ [-10, 10]. a + b = 0
    let report = scenario()
        .forall("a", integer(-10, 10))
        .exists("b", integer(-10, 10))
        .then(|case| case.int("a") + case.int("b") == 0)
        .config(Strategy::new().without_replacement())
        .check()
        .unwrap();
    assert!(report.satisfiable());
}

#[test]
fn one_is_the_multiplicative_identity() {
    setup();
    // ∃b ∈ [-10, 10]. ∀a. a·b = a ∧ b·a = a
    let report = scenario()
        .exists("b", integer(-10, 10))
        .forall("a", integers())
        .then(|case| case.int("a") * case.int("b") == case.int("a"))
        .and(|case| case.int("b") * case.int("a") == case.int("a"))
        .config(Strategy::new().without_replacement())
        .check()
        .unwrap();
    assert!(report.satisfiable());
    assert_eq!(example_int(&report, "b"), 1);
}

#[test]
fn zero_is_the_additive_identity() {
    setup();
    // ∃b ∈ [-10, 10]. ∀a. a + b = a
    let report = scenario()
        .exists("b", integer(-10, 10))
        .forall("a", integers())
        .then(|case| case.int("a") + case.int("b") == case.int("a"))
        .config(Strategy::new().without_replacement())
        .check()
        .unwrap();
    assert!(report.satisfiable());
    assert_eq!(example_int(&report, "b"), 0);
}

#[test]
fn subtraction_is_not_commutative() {
    setup();
    // ∀a, b. a − b = b − a is refuted and shrinks to the minimal pair.
    let report = scenario()
        .forall("a", integers())
        .forall("b", integers())
        .then(|case| case.int("a") - case.int("b") == case.int("b") - case.int("a"))
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    let (a, b) = (example_int(&report, "a"), example_int(&report, "b"));
    assert_ne!(a, b);
    assert_eq!(a, 0);
    assert_eq!(b.abs(), 1);
}

#[test]
fn a_witness_shrinks_to_zero() {
    setup();
    // ∃a. a + 1000 > a
    let report = scenario()
        .exists("a", integers())
        .then(|case| case.int("a") + 1000 > case.int("a"))
        .check()
        .unwrap();
    assert!(report.satisfiable());
    assert_eq!(example_int(&report, "a"), 0);
}

#[test]
fn nested_exists_failure_refutes_forall() {
    setup();
    // ∀a ∈ [5, 10]. ∃b ∈ [1, 2]. a + b = 0
    let report = scenario()
        .forall("a", integer(5, 10))
        .exists("b", integer(1, 2))
        .then(|case| case.int("a") + case.int("b") == 0)
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    assert!(matches!(report.outcome, Outcome::Failed { .. }));
    assert_eq!(example_int(&report, "a"), 5);
}

#[test]
fn an_interrupted_inner_search_continues_with_the_next_sample() {
    setup();
    // Every outer sample needs exactly three inner evaluations to reach its
    // witness (the deduplicated batch over [0, 2] is always [0, 2, 1]), so
    // the base budget of 20 runs out in the middle of an inner sweep. The
    // unmet minimum confidence grants further tranches and the sweep
    // carries on with fresh outer samples up to the iteration ceiling.
    let report = scenario()
        .forall("x", integer(0, 1000))
        .exists("y", integer(0, 2))
        .then(|case| case.int("y") == 1)
        .config(
            Strategy::new()
                .without_replacement()
                .with_sample_size(20)
                .unwrap()
                .with_min_confidence(0.9)
                .unwrap()
                .with_max_iterations(27)
                .unwrap(),
        )
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    assert!(matches!(report.outcome, Outcome::Exhausted));
    // Past two mid-sweep interruptions, all the way to the ceiling.
    assert_eq!(report.statistics.tests_run, 27);
}

#[test]
fn labels_partition_the_sample() {
    setup();
    // ∀x ∈ [0, 1] with a label per value and 100 samples.
    let report = scenario()
        .forall("x", integer(0, 1))
        .label_by(|case| if case.int("x") == 0 { "zero".into() } else { "one".into() })
        .then(|case| (0..=1).contains(&case.int("x")))
        .config(Strategy::new().with_sample_size(100).unwrap())
        .check()
        .unwrap();
    assert!(report.satisfiable());
    let labels = report.statistics.labels.as_ref().unwrap();
    let zero = labels.get("zero").copied().unwrap_or(0);
    let one = labels.get("one").copied().unwrap_or(0);
    assert_eq!(zero + one, 100);
    assert!((zero as f64 / 100.0 - 0.5).abs() < 0.15);
    let percentages = report.statistics.label_percentages.as_ref().unwrap();
    let total: f64 = percentages.values().sum();
    assert!((total - 100.0).abs() < 1e-9);
}

#[test]
fn an_existential_sweep_without_witness_exhausts() {
    setup();
    let report = scenario()
        .exists("a", integer(0, 1_000_000))
        .then(|case| case.int("a") < 0)
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    assert!(matches!(report.outcome, Outcome::Exhausted));
    assert!(report.example().is_empty());
}

#[test]
fn discarding_every_case_exhausts() {
    setup();
    let report = scenario()
        .forall("a", integers())
        .then(|case| {
            pre(false);
            case.int("a") == case.int("a")
        })
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    assert!(matches!(report.outcome, Outcome::Exhausted));
    assert_eq!(
        report.statistics.tests_run,
        report.statistics.tests_discarded
    );
    assert_eq!(report.statistics.tests_passed, 0);
}

#[test]
fn preconditions_discard_without_failing() {
    setup();
    let report = scenario()
        .forall("a", integer(-10, 10))
        .then(|case| {
            pre(case.int("a") != 0);
            case.int("a") * case.int("a") > 0
        })
        .check()
        .unwrap();
    assert!(report.satisfiable());
    assert!(report.statistics.tests_discarded > 0);
    assert_eq!(
        report.statistics.tests_run,
        report.statistics.tests_passed + report.statistics.tests_discarded
    );
}

#[test]
fn an_empty_arbitrary_exhausts_without_tests() {
    setup();
    let report = scenario()
        .forall("a", empty())
        .then(|_| true)
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    assert!(matches!(report.outcome, Outcome::Exhausted));
    assert_eq!(report.statistics.tests_run, 0);
}

#[test]
fn a_zero_time_budget_exhausts() {
    setup();
    let report = scenario()
        .forall("a", integers())
        .then(|_| true)
        .config(Strategy::new().with_max_time(Duration::ZERO))
        .check()
        .unwrap();
    assert!(matches!(report.outcome, Outcome::Exhausted));
    assert_eq!(report.statistics.tests_run, 0);
}

#[test]
fn duplicate_bindings_are_rejected() {
    setup();
    let error = scenario()
        .forall("a", integers())
        .forall("a", integers())
        .then(|_| true)
        .check()
        .unwrap_err();
    assert_eq!(error, Error::DuplicateBinding("a".into()));

    let error = scenario()
        .forall("a", integers())
        .given("a", 1)
        .then(|_| true)
        .check()
        .unwrap_err();
    assert_eq!(error, Error::DuplicateBinding("a".into()));
}

#[test]
#[should_panic(expected = "boom")]
fn user_panics_reach_the_caller() {
    setup();
    let _ = scenario()
        .forall("a", integers())
        .then(|_| panic!("boom"))
        .check();
}

#[test]
fn givens_and_effects_run_in_order() {
    setup();
    let effects = Rc::new(Cell::new(0usize));
    let seen = effects.clone();
    let report = scenario()
        .forall("a", integer(1, 50))
        .given("scale", 10)
        .given_with("scaled", |case| {
            Value::Int(case.int("a") * case.int("scale"))
        })
        .when(move |_| seen.set(seen.get() + 1))
        .then(|case| case.int("scaled") == case.int("a") * 10)
        .check()
        .unwrap();
    assert!(report.satisfiable());
    assert_eq!(effects.get(), report.statistics.tests_run);
}

#[test]
fn flat_traversal_zips_universal_batches() {
    setup();
    let report = scenario()
        .forall("a", integers())
        .forall("b", integers())
        .then(|case| case.int("a") + case.int("b") == case.int("b") + case.int("a"))
        .config(Strategy::new().with_traversal(Traversal::Flat))
        .check()
        .unwrap();
    assert!(report.satisfiable());
    assert!(report.statistics.tests_run <= 1000);
    assert!(report.statistics.tests_run > 2);
}

#[test]
fn flat_traversal_finds_existential_witnesses() {
    setup();
    let report = scenario()
        .exists("a", integer(0, 100))
        .exists("b", integer(0, 100))
        .then(|case| case.int("a") == case.int("b"))
        .config(Strategy::new().with_traversal(Traversal::Flat))
        .check()
        .unwrap();
    assert!(report.satisfiable());
    let example = report.example();
    assert_eq!(example.get("a"), example.get("b"));
}

#[test]
fn determinism_with_an_explicit_seed() {
    setup();
    let property = || {
        scenario()
            .forall("a", integers())
            .forall("b", integers())
            .then(|case| case.int("a") - case.int("b") == case.int("b") - case.int("a"))
            .with_seed(0x2a)
    };
    let left = property().check().unwrap();
    let right = property().check().unwrap();
    assert_eq!(left.seed, 0x2a);
    assert_eq!(left.seed, right.seed);
    assert_eq!(left.satisfiable(), right.satisfiable());
    assert_eq!(left.example(), right.example());
    assert_eq!(left.statistics.tests_run, right.statistics.tests_run);
}

#[test]
fn a_supplied_generator_drives_the_run() {
    setup();
    let report = scenario()
        .forall("a", integer(0, 10))
        .then(|case| case.int("a") >= 0)
        .with_generator(
            |seed| {
                let mut state = seed as u64;
                Box::new(move || {
                    state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                    (state >> 11) as f64 / (1u64 << 53) as f64
                })
            },
            Some(7),
        )
        .check()
        .unwrap();
    assert!(report.satisfiable());
    assert_eq!(report.seed, 7);
}
