use crate::{
    EXTENSION, SAMPLES, SHRINKS,
    confidence::{self, Termination},
    error::Error,
    explore::{Case, Compiled, Explored, Explorer, case_values},
    random::{self, Random},
    sample,
    scenario::{Node, Property},
    shrink::{Shrinker, Target},
    stats::{RunStatistics, ShrinkStats, StatsContext},
    value::Value,
};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    panic,
    rc::Rc,
    time::{Duration, Instant},
};

/// How the test budget is spread over nested quantifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Traversal {
    /// `⌊budget^(1/depth)⌋` samples per quantifier, nested loops.
    #[default]
    Nested,
    /// A full budget of samples per quantifier, zipped into tuples.
    Flat,
}

/// Iteration order of the shrinker over quantifier positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShrinkMode {
    /// Restart from the first position after every improvement.
    Sequential,
    /// Fair rotation across positions.
    #[default]
    RoundRobin,
    /// Shrink all positions jointly before falling back to single ones.
    DeltaDebug,
}

/// Bounds and toggles for one `check()`. Built fluently; setters taking a
/// value that can be out of range validate it immediately.
#[derive(Clone, Debug, PartialEq)]
pub struct Strategy {
    pub(crate) sample_size: usize,
    pub(crate) shrink_size: usize,
    pub(crate) bias: bool,
    pub(crate) dedup: bool,
    pub(crate) cache: bool,
    pub(crate) shrinking: bool,
    pub(crate) traversal: Traversal,
    pub(crate) shrink_mode: ShrinkMode,
    pub(crate) confidence: Option<f64>,
    pub(crate) min_confidence: Option<f64>,
    pub(crate) pass_rate_threshold: f64,
    pub(crate) max_iterations: Option<usize>,
    pub(crate) max_time: Option<Duration>,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            sample_size: SAMPLES,
            shrink_size: SHRINKS,
            bias: true,
            dedup: false,
            cache: false,
            shrinking: true,
            traversal: Traversal::default(),
            shrink_mode: ShrinkMode::default(),
            confidence: None,
            min_confidence: None,
            pass_rate_threshold: 0.999,
            max_iterations: None,
            max_time: None,
        }
    }
}

fn unit_open(value: f64) -> bool {
    value > 0.0 && value < 1.0
}

impl Strategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_size(mut self, size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::SampleSize);
        }
        self.sample_size = size;
        Ok(self)
    }

    /// Enables shrinking, optionally bounding the number of attempts.
    pub fn with_shrinking(mut self, size: Option<usize>) -> Result<Self, Error> {
        if size == Some(0) {
            return Err(Error::ShrinkSize);
        }
        self.shrinking = true;
        if let Some(size) = size {
            self.shrink_size = size;
        }
        Ok(self)
    }

    pub fn without_shrinking(mut self) -> Self {
        self.shrinking = false;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Deduplicates samples by value, up to the arbitrary's size.
    pub fn without_replacement(mut self) -> Self {
        self.dedup = true;
        self
    }

    /// Memoizes each arbitrary's sample batch for the duration of the run.
    pub fn using_cache(mut self) -> Self {
        self.cache = true;
        self
    }

    /// Stops exploration early once the Bayesian confidence reaches `target`.
    pub fn with_confidence(mut self, target: f64) -> Result<Self, Error> {
        if !unit_open(target) {
            return Err(Error::Confidence(target));
        }
        self.confidence = Some(target);
        Ok(self)
    }

    /// Forbids stopping before the confidence reaches `minimum`, drawing
    /// past the sample size up to the iteration ceiling.
    pub fn with_min_confidence(mut self, minimum: f64) -> Result<Self, Error> {
        if !unit_open(minimum) {
            return Err(Error::MinConfidence(minimum));
        }
        self.min_confidence = Some(minimum);
        Ok(self)
    }

    /// Pass rate the confidence is measured against (default 0.999).
    pub fn with_pass_rate_threshold(mut self, threshold: f64) -> Result<Self, Error> {
        if !unit_open(threshold) {
            return Err(Error::PassRateThreshold(threshold));
        }
        self.pass_rate_threshold = threshold;
        Ok(self)
    }

    /// Hard ceiling on draws when a minimum confidence keeps the run going.
    pub fn with_max_iterations(mut self, iterations: usize) -> Result<Self, Error> {
        if iterations == 0 {
            return Err(Error::MaxIterations);
        }
        self.max_iterations = Some(iterations);
        Ok(self)
    }

    pub fn with_max_time(mut self, budget: Duration) -> Self {
        self.max_time = Some(budget);
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn with_shrink_mode(mut self, mode: ShrinkMode) -> Self {
        self.shrink_mode = mode;
        self
    }

    fn termination(&self) -> Option<Termination> {
        if self.confidence.is_none() && self.min_confidence.is_none() {
            return None;
        }
        Some(Termination {
            target: self.confidence,
            minimum: self.min_confidence,
            threshold: self.pass_rate_threshold,
            ceiling: self
                .max_iterations
                .unwrap_or(self.sample_size.saturating_mul(EXTENSION)),
        })
    }
}

/// The decision reached for a scenario.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// The claim holds within the budget; existential scenarios carry the
    /// witness.
    Passed {
        witness: Option<BTreeMap<String, Value>>,
    },
    /// A universal claim was refuted.
    Failed {
        counterexample: BTreeMap<String, Value>,
    },
    /// The budget ran out, every sample was discarded, or an existential
    /// sweep found no witness.
    Exhausted,
}

/// What one `check()` produced: the outcome, the seed that reproduces it and
/// the quantitative evidence gathered along the way.
#[derive(Clone, Debug)]
pub struct Report {
    pub outcome: Outcome,
    pub seed: u32,
    pub statistics: RunStatistics,
}

impl Report {
    pub fn satisfiable(&self) -> bool {
        matches!(self.outcome, Outcome::Passed { .. })
    }

    /// The witness or counterexample bindings; empty when there are none.
    pub fn example(&self) -> BTreeMap<String, Value> {
        match &self.outcome {
            Outcome::Passed {
                witness: Some(witness),
            } => witness.clone(),
            Outcome::Failed { counterexample } => counterexample.clone(),
            _ => BTreeMap::new(),
        }
    }
}

struct Ran {
    explored: Explored,
    tests_run: usize,
    tests_passed: usize,
    tests_discarded: usize,
    tests_failed: usize,
    panic: Option<Box<dyn core::any::Any + Send>>,
    shrink_stats: Option<ShrinkStats>,
    exploration_time: Duration,
    shrinking_time: Duration,
}

pub(crate) fn run(property: &Property) -> Result<Report, Error> {
    if let Some(defect) = &property.scenario.defect {
        return Err(defect.clone());
    }
    let strategy = environment::update(property.strategy.clone());
    let compiled = Compiled::new(&property.scenario);
    let seed = environment::seed()
        .or(property.seed)
        .unwrap_or_else(random::seed);
    let mut random = match &property.stream {
        Some(factory) => Random::from_stream(seed, factory(seed)),
        None => Random::new(seed),
    };
    let stats = Rc::new(RefCell::new(StatsContext::new(seed, property.statistics)));
    {
        let mut stats = stats.borrow_mut();
        for quantifier in &compiled.quantifiers {
            stats.register(&quantifier.name, &quantifier.arbitrary);
        }
        // Cover labels show up in the coverage results even when never hit.
        for node in &compiled.nodes {
            if let Node::Cover { label, .. } = node {
                stats.mark_cover(label);
            }
        }
    }
    let started = Instant::now();
    let deadline = strategy.max_time.map(|budget| started + budget);
    let ran = hook::quiet(|| {
        let mut sampler = sample::stack(strategy.dedup, strategy.bias, strategy.cache);
        let mut explorer = Explorer::new(
            &compiled,
            sampler.as_mut(),
            &mut random,
            stats.clone(),
            strategy.traversal,
            strategy.sample_size,
            deadline,
            strategy.termination(),
        );
        let explored = explorer.explore();
        let exploration_time = started.elapsed();
        if explorer.budget_exceeded {
            log::debug!("budget exhausted after {} tests", explorer.tests_run);
        }
        let tests_run = explorer.tests_run;
        let tests_passed = explorer.tests_passed;
        let tests_discarded = explorer.tests_discarded;
        let tests_failed = explorer.tests_failed;
        let panic = explorer.panic.take();
        drop(explorer);

        let shrink_started = Instant::now();
        let mut shrink_stats = None;
        let explored = if panic.is_some() || !strategy.shrinking {
            explored
        } else {
            match explored {
                Explored::Refuted(case) => {
                    let (case, stats) = minimize(
                        &compiled,
                        case,
                        Target::Counterexample,
                        &strategy,
                        seed,
                        deadline,
                    );
                    shrink_stats = Some(stats);
                    Explored::Refuted(case)
                }
                Explored::Holds(Some(case)) if compiled.has_existential => {
                    let (case, stats) =
                        minimize(&compiled, case, Target::Witness, &strategy, seed, deadline);
                    shrink_stats = Some(stats);
                    Explored::Holds(Some(case))
                }
                other => other,
            }
        };
        Ran {
            explored,
            tests_run,
            tests_passed,
            tests_discarded,
            tests_failed,
            panic,
            shrink_stats,
            exploration_time,
            shrinking_time: shrink_started.elapsed(),
        }
    });
    if let Some(payload) = ran.panic {
        panic::resume_unwind(payload);
    }

    let outcome = match ran.explored {
        Explored::Holds(witness) => Outcome::Passed {
            witness: if compiled.has_existential {
                witness.as_ref().map(case_values)
            } else {
                None
            },
        },
        Explored::Refuted(counterexample) => Outcome::Failed {
            counterexample: case_values(&counterexample),
        },
        Explored::NoWitness | Explored::Discarded | Explored::OutOfBudget => Outcome::Exhausted,
        Explored::Panicked => unreachable!("panics re-raise before reporting"),
    };

    let quantifiers: Vec<(String, crate::arbitrary::Arb)> = compiled
        .quantifiers
        .iter()
        .map(|quantifier| (quantifier.name.clone(), quantifier.arbitrary.clone()))
        .collect();
    let (labels, label_percentages, arbitrary_stats, events, targets, coverage) =
        stats.borrow().finish(ran.tests_run, &quantifiers);
    let credible_interval = strategy
        .termination()
        .map(|_| confidence::credible_interval(ran.tests_passed, ran.tests_failed, 0.95));
    let statistics = RunStatistics {
        tests_run: ran.tests_run,
        tests_passed: ran.tests_passed,
        tests_discarded: ran.tests_discarded,
        execution_time: started.elapsed(),
        exploration_time: ran.exploration_time,
        shrinking_time: ran.shrinking_time,
        labels,
        label_percentages,
        arbitrary_stats,
        events,
        targets,
        shrinking: ran.shrink_stats,
        coverage,
        credible_interval,
    };
    Ok(Report {
        outcome,
        seed,
        statistics,
    })
}

fn minimize(
    compiled: &Compiled,
    case: Case,
    target: Target,
    strategy: &Strategy,
    seed: u32,
    deadline: Option<Instant>,
) -> (Case, ShrinkStats) {
    Shrinker::new(
        compiled,
        target,
        strategy.shrink_mode,
        strategy.shrink_size,
        seed,
        deadline,
    )
    .minimize(case)
}

mod hook {
    use std::panic;

    /// Runs `f` with the panic hook silenced, so sentinel precondition
    /// panics and probing evaluations do not spam stderr. `f` must not
    /// unwind (the evaluator catches at the leaf).
    pub fn quiet<T>(f: impl FnOnce() -> T) -> T {
        let saved = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let result = f();
        panic::set_hook(saved);
        result
    }
}

mod environment {
    use super::Strategy;
    use std::{env, str::FromStr};

    fn parse<T: FromStr>(key: &str) -> Option<T> {
        match env::var(key) {
            Ok(value) => value.parse().ok(),
            Err(_) => None,
        }
    }

    pub fn seed() -> Option<u32> {
        parse("QUANTCHECK_SEED")
    }

    pub fn update(mut strategy: Strategy) -> Strategy {
        if let Some(value) = parse("QUANTCHECK_SAMPLE_SIZE") {
            strategy.sample_size = value;
        }
        if let Some(value) = parse("QUANTCHECK_SHRINK_SIZE") {
            strategy.shrink_size = value;
        }
        if let Some(value) = parse("QUANTCHECK_BIAS") {
            strategy.bias = value;
        }
        if let Some(value) = parse("QUANTCHECK_DEDUP") {
            strategy.dedup = value;
        }
        if let Some(value) = parse("QUANTCHECK_CACHE") {
            strategy.cache = value;
        }
        if let Some(value) = parse("QUANTCHECK_SHRINKING") {
            strategy.shrinking = value;
        }
        strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_rejects_out_of_range_values() {
        assert_eq!(
            Strategy::new().with_confidence(0.0),
            Err(Error::Confidence(0.0))
        );
        assert_eq!(
            Strategy::new().with_confidence(1.0),
            Err(Error::Confidence(1.0))
        );
        assert_eq!(Strategy::new().with_sample_size(0), Err(Error::SampleSize));
        assert_eq!(
            Strategy::new().with_max_iterations(0),
            Err(Error::MaxIterations)
        );
        assert_eq!(
            Strategy::new().with_pass_rate_threshold(1.5),
            Err(Error::PassRateThreshold(1.5))
        );
    }

    #[test]
    fn defaults_match_the_documented_configuration() {
        let strategy = Strategy::default();
        assert_eq!(strategy.sample_size, 1000);
        assert_eq!(strategy.shrink_size, 500);
        assert!(strategy.bias);
        assert!(!strategy.dedup);
        assert!(!strategy.cache);
        assert!(strategy.shrinking);
        assert_eq!(strategy.pass_rate_threshold, 0.999);
    }
}
