use crate::{
    arbitrary::Arb,
    check::{self, Report, Strategy},
    error::Error,
    stats::{StatisticsConfig, StatsContext},
    value::Value,
};
use core::fmt;
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

/// One element of a scenario, in lexical order. Quantifier nodes also appear
/// in the reified quantifier list built at compile time; the remaining nodes
/// are evaluated at the leaf of every traversal.
#[derive(Clone)]
pub(crate) enum Node {
    Forall {
        name: String,
        arbitrary: Arb,
    },
    Exists {
        name: String,
        arbitrary: Arb,
    },
    Given {
        name: String,
        value: Value,
    },
    GivenWith {
        name: String,
        factory: Rc<dyn Fn(&TestCase) -> Value>,
    },
    When {
        effect: Rc<dyn Fn(&TestCase)>,
    },
    Then {
        predicate: Rc<dyn Fn(&TestCase) -> bool>,
    },
    Classify {
        label: String,
        predicate: Rc<dyn Fn(&TestCase) -> bool>,
    },
    Label {
        by: Rc<dyn Fn(&TestCase) -> String>,
    },
    Collect {
        by: Rc<dyn Fn(&TestCase) -> Value>,
    },
    Cover {
        label: String,
        predicate: Rc<dyn Fn(&TestCase) -> bool>,
    },
    CoverTable {
        name: String,
        by: Rc<dyn Fn(&TestCase) -> String>,
    },
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Forall { name, arbitrary } => {
                write!(f, "forall {name} in {arbitrary:?}")
            }
            Node::Exists { name, arbitrary } => {
                write!(f, "exists {name} in {arbitrary:?}")
            }
            Node::Given { name, value } => write!(f, "given {name} = {value}"),
            Node::GivenWith { name, .. } => write!(f, "given {name} = <factory>"),
            Node::When { .. } => write!(f, "when"),
            Node::Then { .. } => write!(f, "then"),
            Node::Classify { label, .. } => write!(f, "classify {label:?}"),
            Node::Label { .. } => write!(f, "label"),
            Node::Collect { .. } => write!(f, "collect"),
            Node::Cover { label, .. } => write!(f, "cover {label:?}"),
            Node::CoverTable { name, .. } => write!(f, "cover table {name:?}"),
        }
    }
}

/// An open scenario under construction. Every combinator returns a new
/// scenario with one appended node; the chain is sealed into a [`Property`]
/// by [`Scenario::then`]. Classifiers, givens and effects can only be added
/// before sealing, which enforces their ordering relative to the predicates.
#[must_use = "scenarios do nothing until sealed by `then` and checked"]
#[derive(Clone, Debug, Default)]
pub struct Scenario {
    pub(crate) nodes: Vec<Node>,
    pub(crate) defect: Option<Error>,
}

/// Starts an empty scenario.
pub fn scenario() -> Scenario {
    Scenario::default()
}

impl Scenario {
    fn push(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    fn bind(mut self, name: &str) -> Self {
        let taken = self.nodes.iter().any(|node| match node {
            Node::Forall { name: bound, .. }
            | Node::Exists { name: bound, .. }
            | Node::Given { name: bound, .. }
            | Node::GivenWith { name: bound, .. } => bound == name,
            _ => false,
        });
        if taken && self.defect.is_none() {
            self.defect = Some(Error::DuplicateBinding(name.into()));
        }
        self
    }

    /// Universally quantifies `name` over `arbitrary`.
    pub fn forall(self, name: &str, arbitrary: Arb) -> Self {
        self.bind(name).push(Node::Forall {
            name: name.into(),
            arbitrary,
        })
    }

    /// Existentially quantifies `name` over `arbitrary`.
    pub fn exists(self, name: &str, arbitrary: Arb) -> Self {
        self.bind(name).push(Node::Exists {
            name: name.into(),
            arbitrary,
        })
    }

    /// Binds a constant.
    pub fn given(self, name: &str, value: impl Into<Value>) -> Self {
        self.bind(name).push(Node::Given {
            name: name.into(),
            value: value.into(),
        })
    }

    /// Binds a value computed from the bindings made so far.
    pub fn given_with(
        self,
        name: &str,
        factory: impl Fn(&TestCase) -> Value + 'static,
    ) -> Self {
        self.bind(name).push(Node::GivenWith {
            name: name.into(),
            factory: Rc::new(factory),
        })
    }

    /// Runs a side effect for every test case.
    pub fn when(self, effect: impl Fn(&TestCase) + 'static) -> Self {
        self.push(Node::When {
            effect: Rc::new(effect),
        })
    }

    /// Counts `label` for every case satisfying the predicate.
    pub fn classify(
        self,
        label: &str,
        predicate: impl Fn(&TestCase) -> bool + 'static,
    ) -> Self {
        self.push(Node::Classify {
            label: label.into(),
            predicate: Rc::new(predicate),
        })
    }

    /// Labels every case with the result of `by`.
    pub fn label_by(self, by: impl Fn(&TestCase) -> String + 'static) -> Self {
        self.push(Node::Label { by: Rc::new(by) })
    }

    /// Labels every case with the stringified result of `by`.
    pub fn collect_by(self, by: impl Fn(&TestCase) -> Value + 'static) -> Self {
        self.push(Node::Collect { by: Rc::new(by) })
    }

    /// Like [`Scenario::classify`], and additionally surfaces the observed
    /// rate in the report's coverage results.
    pub fn cover(self, label: &str, predicate: impl Fn(&TestCase) -> bool + 'static) -> Self {
        self.push(Node::Cover {
            label: label.into(),
            predicate: Rc::new(predicate),
        })
    }

    /// Maps every case into exactly one `name.category` label.
    pub fn cover_table(self, name: &str, by: impl Fn(&TestCase) -> String + 'static) -> Self {
        self.push(Node::CoverTable {
            name: name.into(),
            by: Rc::new(by),
        })
    }

    /// Seals the scenario with its property.
    pub fn then(self, predicate: impl Fn(&TestCase) -> bool + 'static) -> Property {
        Property {
            scenario: self.push(Node::Then {
                predicate: Rc::new(predicate),
            }),
            strategy: Strategy::default(),
            statistics: StatisticsConfig::default(),
            seed: None,
            stream: None,
        }
    }
}

/// Stream factory substituting the built-in generator: `seed ↦ (() → f64)`.
pub(crate) type StreamFactory = Rc<dyn Fn(u32) -> Box<dyn FnMut() -> f64>>;

/// A sealed scenario together with its checking configuration.
#[must_use = "properties do nothing until checked"]
#[derive(Clone)]
pub struct Property {
    pub(crate) scenario: Scenario,
    pub(crate) strategy: Strategy,
    pub(crate) statistics: StatisticsConfig,
    pub(crate) seed: Option<u32>,
    pub(crate) stream: Option<StreamFactory>,
}

impl Property {
    /// Conjoins another predicate.
    pub fn and(mut self, predicate: impl Fn(&TestCase) -> bool + 'static) -> Self {
        self.scenario.nodes.push(Node::Then {
            predicate: Rc::new(predicate),
        });
        self
    }

    pub fn config(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config_statistics(mut self, statistics: StatisticsConfig) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed.into();
        self
    }

    /// Substitutes a caller-supplied `[0, 1)` generator factory, optionally
    /// with an explicit seed.
    pub fn with_generator(
        mut self,
        factory: impl Fn(u32) -> Box<dyn FnMut() -> f64> + 'static,
        seed: Option<u32>,
    ) -> Self {
        self.stream = Some(Rc::new(factory));
        self.seed = seed.or(self.seed);
        self
    }

    /// Decides the scenario: searches for a counterexample or witness under
    /// the configured budget, shrinks what it finds and reports statistics.
    pub fn check(&self) -> Result<Report, Error> {
        check::run(self)
    }

    /// Runs [`Property::check`] with an early-stop confidence target.
    pub fn check_with_confidence(&self, confidence: f64) -> Result<Report, Error> {
        let strategy = self.strategy.clone().with_confidence(confidence)?;
        check::run(&Self {
            strategy,
            ..self.clone()
        })
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("scenario", &self.scenario)
            .field("strategy", &self.strategy)
            .field("seed", &self.seed)
            .finish()
    }
}

/// The user-visible view of one bound test case: the values of every
/// quantifier and given binding, plus hooks to raise events and targets that
/// the statistics context attributes to the current case.
pub struct TestCase {
    values: BTreeMap<String, Value>,
    stats: Rc<RefCell<StatsContext>>,
}

impl TestCase {
    pub(crate) fn new(values: BTreeMap<String, Value>, stats: Rc<RefCell<StatsContext>>) -> Self {
        Self { values, stats }
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn value(&self, name: &str) -> &Value {
        self.values
            .get(name)
            .unwrap_or_else(|| panic!("no binding named `{name}` in this scenario"))
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.value(name) {
            Value::Int(value) => *value,
            other => panic!("binding `{name}` is not an integer: {other}"),
        }
    }

    pub fn real(&self, name: &str) -> f64 {
        match self.value(name) {
            Value::Real(value) => *value,
            Value::Int(value) => *value as f64,
            other => panic!("binding `{name}` is not a real: {other}"),
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        match self.value(name) {
            Value::Bool(value) => *value,
            other => panic!("binding `{name}` is not a boolean: {other}"),
        }
    }

    pub fn str(&self, name: &str) -> &str {
        match self.value(name) {
            Value::Str(value) => value,
            other => panic!("binding `{name}` is not a string: {other}"),
        }
    }

    pub fn list(&self, name: &str) -> &[Value] {
        match self.value(name) {
            Value::List(values) => values,
            other => panic!("binding `{name}` is not a list: {other}"),
        }
    }

    /// Counts a named event for the current test case.
    pub fn event(&self, name: &str) {
        self.stats.borrow_mut().event(name);
    }

    /// Feeds a named target distribution.
    pub fn target(&self, name: &str, value: f64) {
        self.stats.borrow_mut().target(name, value);
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}
