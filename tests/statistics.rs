pub mod common;
use common::*;
use quantcheck::prelude::*;

#[test]
fn counts_balance_on_a_failing_run() {
    setup();
    let report = scenario()
        .forall("a", integers())
        .forall("b", integers())
        .then(|case| case.int("a") - case.int("b") == case.int("b") - case.int("a"))
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    let statistics = &report.statistics;
    // One refutation, everything else passed or was discarded.
    assert_eq!(
        statistics.tests_run,
        statistics.tests_passed + statistics.tests_discarded + 1
    );
    assert!(statistics.execution_time >= statistics.exploration_time);
}

#[test]
fn label_counts_are_bounded_by_tests_run() {
    setup();
    let report = scenario()
        .forall("x", integer(-100, 100))
        .classify("negative", |case| case.int("x") < 0)
        .classify("small", |case| case.int("x").abs() <= 10)
        .then(|_| true)
        .check()
        .unwrap();
    let statistics = &report.statistics;
    let labels = statistics.labels.as_ref().unwrap();
    let total: u64 = labels.values().sum();
    assert!(total <= (statistics.tests_run as u64) * 2);
    for count in labels.values() {
        assert!(*count <= statistics.tests_run as u64);
    }
}

#[test]
fn labels_are_absent_without_classifiers() {
    setup();
    let report = scenario()
        .forall("x", integers())
        .then(|_| true)
        .check()
        .unwrap();
    assert!(report.statistics.labels.is_none());
    assert!(report.statistics.label_percentages.is_none());
}

#[test]
fn classifiers_count_discarded_cases_too() {
    setup();
    let report = scenario()
        .forall("x", integer(0, 9))
        .classify("seen", |_| true)
        .then(|case| {
            pre(case.int("x") > 4);
            true
        })
        .check()
        .unwrap();
    let statistics = &report.statistics;
    assert!(statistics.tests_discarded > 0);
    let labels = statistics.labels.as_ref().unwrap();
    assert_eq!(
        labels.get("seen").copied().unwrap(),
        statistics.tests_run as u64
    );
}

#[test]
fn collect_stringifies_case_values() {
    setup();
    let report = scenario()
        .forall("x", integer(0, 1))
        .collect_by(|case| Value::Int(case.int("x")))
        .then(|_| true)
        .config(Strategy::new().with_sample_size(50).unwrap())
        .check()
        .unwrap();
    let labels = report.statistics.labels.unwrap();
    let total: u64 = labels.values().sum();
    assert_eq!(total, 50);
    assert!(labels.keys().all(|label| label == "0" || label == "1"));
}

#[test]
fn cover_surfaces_observed_rates() {
    setup();
    let report = scenario()
        .forall("x", integer(1, 100))
        .cover("upper half", |case| case.int("x") > 50)
        .cover("impossible", |case| case.int("x") > 100)
        .then(|_| true)
        .check()
        .unwrap();
    let coverage = report.statistics.coverage.unwrap();
    let upper = coverage
        .iter()
        .find(|result| result.label == "upper half")
        .unwrap();
    assert!(upper.count > 0);
    assert!(upper.percentage > 0.0);
    let impossible = coverage
        .iter()
        .find(|result| result.label == "impossible")
        .unwrap();
    assert_eq!(impossible.count, 0);
    assert_eq!(impossible.percentage, 0.0);
}

#[test]
fn cover_tables_qualify_their_categories() {
    setup();
    let report = scenario()
        .forall("x", integer(0, 9))
        .cover_table("digit", |case| {
            if case.int("x") % 2 == 0 {
                "even".into()
            } else {
                "odd".into()
            }
        })
        .then(|_| true)
        .config(Strategy::new().with_sample_size(40).unwrap())
        .check()
        .unwrap();
    let labels = report.statistics.labels.unwrap();
    let even = labels.get("digit.even").copied().unwrap_or(0);
    let odd = labels.get("digit.odd").copied().unwrap_or(0);
    assert_eq!(even + odd, 40);
}

#[test]
fn events_and_targets_are_attributed() {
    setup();
    let report = scenario()
        .forall("x", integer(1, 50))
        .then(|case| {
            if case.int("x") % 10 == 0 {
                case.event("round");
            }
            case.target("magnitude", case.int("x") as f64);
            true
        })
        .config(Strategy::new().with_sample_size(200).unwrap())
        .check()
        .unwrap();
    let statistics = &report.statistics;
    let events = statistics.events.as_ref().unwrap();
    assert!(events.get("round").copied().unwrap() > 0);
    let targets = statistics.targets.as_ref().unwrap();
    let magnitude = targets.get("magnitude").unwrap();
    assert_eq!(magnitude.count, statistics.tests_run as u64);
    assert!(magnitude.minimum.unwrap() >= 1.0);
    assert!(magnitude.maximum.unwrap() <= 50.0);
}

#[test]
fn detailed_statistics_describe_each_arbitrary() {
    setup();
    let report = scenario()
        .forall("x", integer(0, 20))
        .exists("y", integer(-5, 5))
        .then(|case| case.int("x") + case.int("y") >= -5)
        .config_statistics(StatisticsConfig::new().detailed(true))
        .check()
        .unwrap();
    assert!(report.satisfiable());
    let arbitraries = report.statistics.arbitrary_stats.as_ref().unwrap();
    let x = arbitraries.get("x").unwrap();
    assert!(x.samples > 0);
    assert!(x.unique > 0);
    assert!(x.corner_hits > 0);
    assert!(x.minimum.unwrap() >= 0.0);
    assert!(x.maximum.unwrap() <= 20.0);
    assert!(x.mean.unwrap() >= 0.0);
    assert!(x.median.is_some());
    let coverage = x.coverage.unwrap();
    assert!(coverage > 0.0 && coverage <= 1.0);
    assert!(arbitraries.contains_key("y"));
}

#[test]
fn detailed_statistics_are_off_by_default() {
    setup();
    let report = scenario()
        .forall("x", integers())
        .then(|_| true)
        .check()
        .unwrap();
    assert!(report.statistics.arbitrary_stats.is_none());
}

#[test]
fn shrink_statistics_account_for_the_second_phase() {
    setup();
    let report = scenario()
        .forall("x", integers())
        .then(|case| case.int("x") == 0)
        .check()
        .unwrap();
    assert!(!report.satisfiable());
    let shrinking = report.statistics.shrinking.unwrap();
    assert!(shrinking.attempts > 0);
    assert!(shrinking.rounds > 0);
}
