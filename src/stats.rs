use crate::{
    arbitrary::{Arb, Pick},
    random::Random,
    value::Value,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

/// Gates and caps for the statistics context. Detailed per-arbitrary
/// statistics are off by default; label, event and target accounting is
/// always on.
#[derive(Clone, Copy, Debug)]
pub struct StatisticsConfig {
    pub(crate) detailed: bool,
    pub(crate) unique_cap: usize,
    pub(crate) reservoir: usize,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            detailed: false,
            unique_cap: 1024,
            reservoir: 1024,
        }
    }
}

impl StatisticsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn with_unique_cap(mut self, cap: usize) -> Self {
        self.unique_cap = cap.max(1);
        self
    }

    pub fn with_reservoir(mut self, size: usize) -> Self {
        self.reservoir = size.max(1);
        self
    }
}

/// Mutable statistics container for one `check()`. Written only by the
/// running evaluation; passed explicitly (never thread-local) and reachable
/// from user predicates through the test-case view.
#[derive(Debug)]
pub(crate) struct StatsContext {
    config: StatisticsConfig,
    collectors: BTreeMap<String, Collector>,
    labels: BTreeMap<String, u64>,
    covers: BTreeSet<String>,
    events: BTreeMap<String, u64>,
    targets: BTreeMap<String, Welford>,
    labelled: bool,
    current_case: usize,
    seed: u32,
}

impl StatsContext {
    pub fn new(seed: u32, config: StatisticsConfig) -> Self {
        Self {
            config,
            collectors: BTreeMap::new(),
            labels: BTreeMap::new(),
            covers: BTreeSet::new(),
            events: BTreeMap::new(),
            targets: BTreeMap::new(),
            labelled: false,
            current_case: 0,
            seed,
        }
    }

    pub fn register(&mut self, name: &str, arbitrary: &Arb) {
        let corners = arbitrary
            .corner_cases()
            .into_iter()
            .map(|pick| pick.value)
            .collect();
        let seed = self.seed.wrapping_add(self.collectors.len() as u32 + 1);
        self.collectors.insert(
            name.into(),
            Collector::new(corners, self.config, seed),
        );
    }

    pub fn record_pick(&mut self, name: &str, pick: &Pick) {
        if let Some(collector) = self.collectors.get_mut(name) {
            collector.record(pick);
        }
    }

    pub fn begin_case(&mut self, index: usize) {
        self.current_case = index;
    }

    pub fn label(&mut self, label: &str) {
        self.labelled = true;
        *self.labels.entry(label.into()).or_insert(0) += 1;
    }

    pub fn cover(&mut self, label: &str) {
        self.covers.insert(label.into());
        self.label(label);
    }

    pub fn mark_cover(&mut self, label: &str) {
        self.covers.insert(label.into());
        self.labelled = true;
        self.labels.entry(label.into()).or_insert(0);
    }

    pub fn event(&mut self, name: &str) {
        log::trace!("case {}: event `{name}`", self.current_case);
        *self.events.entry(name.into()).or_insert(0) += 1;
    }

    pub fn target(&mut self, name: &str, value: f64) {
        log::trace!("case {}: target `{name}` = {value}", self.current_case);
        self.targets.entry(name.into()).or_default().push(value);
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, u64>> {
        self.labelled.then_some(&self.labels)
    }

    /// Assembles the reportable statistics. `quantifiers` resolves coverage
    /// against each arbitrary's domain size.
    pub fn finish(
        &self,
        tests_run: usize,
        quantifiers: &[(String, Arb)],
    ) -> (
        Option<BTreeMap<String, u64>>,
        Option<BTreeMap<String, f64>>,
        Option<BTreeMap<String, ArbitraryStats>>,
        Option<BTreeMap<String, u64>>,
        Option<BTreeMap<String, TargetStats>>,
        Option<Vec<CoverageResult>>,
    ) {
        let labels = self.labels().cloned();
        let percentages = labels.as_ref().map(|labels| {
            labels
                .iter()
                .map(|(label, count)| {
                    let share = if tests_run == 0 {
                        0.0
                    } else {
                        *count as f64 / tests_run as f64 * 100.0
                    };
                    (label.clone(), share)
                })
                .collect()
        });
        let arbitraries = self.config.detailed.then(|| {
            quantifiers
                .iter()
                .filter_map(|(name, arbitrary)| {
                    self.collectors
                        .get(name)
                        .map(|collector| (name.clone(), collector.finish(arbitrary)))
                })
                .collect()
        });
        let events = (!self.events.is_empty()).then(|| self.events.clone());
        let targets = (!self.targets.is_empty()).then(|| {
            self.targets
                .iter()
                .map(|(name, welford)| (name.clone(), welford.finish()))
                .collect()
        });
        let coverage = (!self.covers.is_empty()).then(|| {
            self.covers
                .iter()
                .map(|label| {
                    let count = self.labels.get(label).copied().unwrap_or(0);
                    CoverageResult {
                        label: label.clone(),
                        count,
                        percentage: if tests_run == 0 {
                            0.0
                        } else {
                            count as f64 / tests_run as f64 * 100.0
                        },
                    }
                })
                .collect()
        });
        (labels, percentages, arbitraries, events, targets, coverage)
    }
}

/// Per-quantifier sample accounting: counts, distinct values, corner hits
/// and moments of the numeric projection.
#[derive(Debug)]
pub(crate) struct Collector {
    samples: u64,
    unique: BTreeSet<Value>,
    unique_overflow: bool,
    unique_cap: usize,
    corners: Vec<Value>,
    corner_hits: u64,
    welford: Welford,
    reservoir: Reservoir,
}

impl Collector {
    fn new(corners: Vec<Value>, config: StatisticsConfig, seed: u32) -> Self {
        Self {
            samples: 0,
            unique: BTreeSet::new(),
            unique_overflow: false,
            unique_cap: config.unique_cap,
            corners,
            corner_hits: 0,
            welford: Welford::default(),
            reservoir: Reservoir::new(config.reservoir, seed),
        }
    }

    fn record(&mut self, pick: &Pick) {
        self.samples += 1;
        if self.corners.contains(&pick.value) {
            self.corner_hits += 1;
        }
        if self.unique.len() < self.unique_cap {
            self.unique.insert(pick.value.clone());
        } else if !self.unique.contains(&pick.value) {
            self.unique_overflow = true;
        }
        if let Some(value) = pick.value.numeric() {
            self.welford.push(value);
            self.reservoir.push(value);
        }
    }

    fn finish(&self, arbitrary: &Arb) -> ArbitraryStats {
        let unique = self.unique.len() as u64;
        let coverage = if self.unique_overflow {
            None
        } else {
            arbitrary.coverage(unique as f64).map(|(ratio, _)| ratio)
        };
        ArbitraryStats {
            samples: self.samples,
            unique,
            unique_is_lower_bound: self.unique_overflow,
            corner_hits: self.corner_hits,
            coverage,
            minimum: self.welford.minimum(),
            maximum: self.welford.maximum(),
            mean: self.welford.mean(),
            median: self.reservoir.median(),
            stddev: self.welford.stddev(),
        }
    }
}

/// Welford's online mean and variance with min/max tracking.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
    minimum: f64,
    maximum: f64,
}

impl Welford {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.minimum = value;
            self.maximum = value;
        } else {
            self.minimum = self.minimum.min(value);
            self.maximum = self.maximum.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn minimum(&self) -> Option<f64> {
        (self.count > 0).then_some(self.minimum)
    }

    pub fn maximum(&self) -> Option<f64> {
        (self.count > 0).then_some(self.maximum)
    }

    pub fn stddev(&self) -> Option<f64> {
        (self.count > 1).then(|| (self.m2 / (self.count - 1) as f64).sqrt())
    }

    fn finish(&self) -> TargetStats {
        TargetStats {
            count: self.count,
            minimum: self.minimum(),
            maximum: self.maximum(),
            mean: self.mean(),
            stddev: self.stddev(),
        }
    }
}

/// Algorithm-R reservoir over the numeric projection, for quantiles.
#[derive(Debug)]
struct Reservoir {
    capacity: usize,
    seen: u64,
    values: Vec<f64>,
    random: Random,
}

impl Reservoir {
    fn new(capacity: usize, seed: u32) -> Self {
        Self {
            capacity,
            seen: 0,
            values: Vec::with_capacity(capacity.min(64)),
            random: Random::new(seed),
        }
    }

    fn push(&mut self, value: f64) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            let slot = (self.random.next() * self.seen as f64) as u64;
            if (slot as usize) < self.capacity {
                self.values[slot as usize] = value;
            }
        }
    }

    fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let middle = sorted.len() / 2;
        Some(if sorted.len() % 2 == 0 {
            (sorted[middle - 1] + sorted[middle]) / 2.0
        } else {
            sorted[middle]
        })
    }
}

/// Distribution summary for one quantifier's arbitrary.
#[derive(Clone, Debug, PartialEq)]
pub struct ArbitraryStats {
    pub samples: u64,
    pub unique: u64,
    pub unique_is_lower_bound: bool,
    pub corner_hits: u64,
    pub coverage: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub stddev: Option<f64>,
}

/// Summary of one user-raised target distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetStats {
    pub count: u64,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
}

/// Observed rate of one `cover` label.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageResult {
    pub label: String,
    pub count: u64,
    pub percentage: f64,
}

/// Work done by the shrinker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShrinkStats {
    pub rounds: usize,
    pub attempts: usize,
    pub improvements: usize,
}

/// Quantitative evidence attached to every report.
#[derive(Clone, Debug)]
pub struct RunStatistics {
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_discarded: usize,
    pub execution_time: Duration,
    pub exploration_time: Duration,
    pub shrinking_time: Duration,
    pub labels: Option<BTreeMap<String, u64>>,
    pub label_percentages: Option<BTreeMap<String, f64>>,
    pub arbitrary_stats: Option<BTreeMap<String, ArbitraryStats>>,
    pub events: Option<BTreeMap<String, u64>>,
    pub targets: Option<BTreeMap<String, TargetStats>>,
    pub shrinking: Option<ShrinkStats>,
    pub coverage: Option<Vec<CoverageResult>>,
    pub credible_interval: Option<(f64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welford_matches_direct_moments() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut welford = Welford::default();
        for value in values {
            welford.push(value);
        }
        assert_eq!(welford.mean(), Some(5.0));
        assert_eq!(welford.minimum(), Some(2.0));
        assert_eq!(welford.maximum(), Some(9.0));
        let stddev = welford.stddev().unwrap();
        assert!((stddev - 2.138).abs() < 1e-3);
    }

    #[test]
    fn reservoir_median_of_small_streams_is_exact() {
        let mut reservoir = Reservoir::new(16, 0);
        for value in [5.0, 1.0, 3.0] {
            reservoir.push(value);
        }
        assert_eq!(reservoir.median(), Some(3.0));
    }

    #[test]
    fn labels_are_absent_until_a_classifier_runs() {
        let mut context = StatsContext::new(0, StatisticsConfig::default());
        assert!(context.labels().is_none());
        context.label("small");
        assert_eq!(context.labels().unwrap().get("small"), Some(&1));
    }
}
