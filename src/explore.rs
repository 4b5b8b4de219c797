use crate::{
    CANDIDATES,
    arbitrary::{Arb, Pick},
    confidence::Termination,
    constant::Constant,
    error::PreconditionFailure,
    random::Random,
    sample::Sampler,
    scenario::{Node, Scenario, TestCase},
    stats::StatsContext,
    check::Traversal,
    value::Value,
};
use core::any::Any;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    time::Instant,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Forall,
    Exists,
}

/// A quantifier compiled out of the scenario: its arbitrary plus the
/// sampling and shrinking behaviour the explorer and shrinker drive.
#[derive(Clone, Debug)]
pub(crate) struct Quantifier {
    pub name: String,
    pub kind: Kind,
    pub arbitrary: Arb,
}

impl Quantifier {
    pub fn sample(
        &self,
        sampler: &mut dyn Sampler,
        count: usize,
        random: &mut Random,
    ) -> Vec<Pick> {
        sampler.sample(&self.arbitrary, count, &[], random)
    }

    /// Candidate picks strictly simpler than `towards`, corner cases first.
    pub fn shrink(
        &self,
        towards: &Pick,
        sampler: &mut dyn Sampler,
        count: usize,
        random: &mut Random,
    ) -> Vec<Pick> {
        let shrunk = self.arbitrary.shrink(towards);
        if shrunk.is_empty() {
            return Vec::new();
        }
        let mut candidates: Vec<Pick> = Vec::new();
        for pick in sampler.sample(&shrunk, count.min(CANDIDATES), &[], random) {
            if candidates.iter().all(|seen| seen.value != pick.value) {
                candidates.push(pick);
            }
        }
        candidates
    }

    pub fn is_shrunken(&self, candidate: &Pick, origin: &Pick) -> bool {
        self.arbitrary.is_shrunken(candidate, origin)
    }

    /// The same quantifier pinned to a single value.
    pub fn pinned(&self, pick: &Pick) -> Quantifier {
        Quantifier {
            name: self.name.clone(),
            kind: self.kind,
            arbitrary: Rc::new(Constant::new(pick.value.clone())),
        }
    }
}

/// Executable form of a scenario: the node list for leaf evaluation plus the
/// flattened quantifier list (outermost first). Compilation is a pure
/// function of the scenario and may be repeated freely.
#[derive(Clone, Debug)]
pub(crate) struct Compiled {
    pub nodes: Vec<Node>,
    pub quantifiers: Vec<Quantifier>,
    pub has_existential: bool,
}

impl Compiled {
    pub fn new(scenario: &Scenario) -> Self {
        let mut quantifiers = Vec::new();
        for node in &scenario.nodes {
            match node {
                Node::Forall { name, arbitrary } => quantifiers.push(Quantifier {
                    name: name.clone(),
                    kind: Kind::Forall,
                    arbitrary: arbitrary.clone(),
                }),
                Node::Exists { name, arbitrary } => quantifiers.push(Quantifier {
                    name: name.clone(),
                    kind: Kind::Exists,
                    arbitrary: arbitrary.clone(),
                }),
                _ => {}
            }
        }
        let has_existential = quantifiers
            .iter()
            .any(|quantifier| quantifier.kind == Kind::Exists);
        Self {
            nodes: scenario.nodes.clone(),
            quantifiers,
            has_existential,
        }
    }
}

/// A bound test case: quantifier name to pick.
pub(crate) type Case = BTreeMap<String, Pick>;

pub(crate) fn case_values(case: &Case) -> BTreeMap<String, Value> {
    case.iter()
        .map(|(name, pick)| (name.clone(), pick.value.clone()))
        .collect()
}

/// Outcome of one traversal of the quantifier tree.
#[derive(Debug)]
pub(crate) enum Explored {
    /// The subtree holds; carries a witness for reporting.
    Holds(Option<Case>),
    /// A counterexample was found.
    Refuted(Case),
    /// An existential sweep completed without a witness.
    NoWitness,
    /// Every sample was discarded (or no sample existed).
    Discarded,
    /// The test or time budget cut the search short.
    OutOfBudget,
    /// A user predicate panicked; the payload is held by the explorer.
    Panicked,
}

pub(crate) struct Explorer<'a> {
    compiled: &'a Compiled,
    sampler: &'a mut dyn Sampler,
    random: &'a mut Random,
    stats: Rc<RefCell<StatsContext>>,
    traversal: Traversal,
    limit: usize,
    /// Tests granted per budget tranche: the cost of one outer subtree.
    tranche: usize,
    deadline: Option<Instant>,
    termination: Option<Termination>,
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_discarded: usize,
    pub tests_failed: usize,
    pub budget_exceeded: bool,
    pub panic: Option<Box<dyn Any + Send>>,
}

impl<'a> Explorer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        compiled: &'a Compiled,
        sampler: &'a mut dyn Sampler,
        random: &'a mut Random,
        stats: Rc<RefCell<StatsContext>>,
        traversal: Traversal,
        limit: usize,
        deadline: Option<Instant>,
        termination: Option<Termination>,
    ) -> Self {
        Self {
            compiled,
            sampler,
            random,
            stats,
            traversal,
            limit,
            tranche: 1,
            deadline,
            termination,
            tests_run: 0,
            tests_passed: 0,
            tests_discarded: 0,
            tests_failed: 0,
            budget_exceeded: false,
            panic: None,
        }
    }

    fn out_of_budget(&self) -> bool {
        if self.tests_run >= self.limit {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// After a child exploration was cut by the test budget, decides whether
    /// the remaining budget allows continuing with the next sibling sample:
    /// an unmet minimum confidence grants another tranche of tests toward
    /// its iteration ceiling. Deadline cuts are final.
    fn replenish(&mut self) -> bool {
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return false;
        }
        let Some(termination) = self.termination else {
            return false;
        };
        if self.limit >= termination.ceiling
            || !termination.must_continue(self.tests_passed, self.tests_failed)
        {
            return false;
        }
        self.limit = termination
            .ceiling
            .min(self.limit.saturating_add(self.tranche));
        self.budget_exceeded = false;
        true
    }

    /// Effective traversal: zipping has no faithful nesting semantics for
    /// mixed quantifiers, so those scenarios fall back to nested loops.
    fn effective_traversal(&self) -> Traversal {
        let quantifiers = &self.compiled.quantifiers;
        let uniform = quantifiers
            .windows(2)
            .all(|pair| pair[0].kind == pair[1].kind);
        match self.traversal {
            Traversal::Flat if uniform => Traversal::Flat,
            Traversal::Flat => {
                log::debug!("mixed quantifiers: falling back to nested traversal");
                Traversal::Nested
            }
            Traversal::Nested => Traversal::Nested,
        }
    }

    pub fn explore(&mut self) -> Explored {
        let compiled = self.compiled;
        let depth = compiled.quantifiers.len();
        if depth == 0 {
            let mut case = Case::new();
            return self.leaf(&mut case);
        }
        let traversal = self.effective_traversal();
        let per = match traversal {
            Traversal::Nested => ((self.limit as f64).powf(1.0 / depth as f64) as usize).max(1),
            Traversal::Flat => self.limit,
        };
        self.tranche = match traversal {
            Traversal::Nested => per
                .saturating_pow(depth.saturating_sub(1) as u32)
                .max(1),
            Traversal::Flat => 1,
        };
        let mut batches = Vec::with_capacity(depth);
        for quantifier in &compiled.quantifiers {
            let batch = quantifier.sample(&mut *self.sampler, per, &mut *self.random);
            if batch.is_empty() {
                return Explored::Discarded;
            }
            let mut stats = self.stats.borrow_mut();
            for pick in &batch {
                stats.record_pick(&quantifier.name, pick);
            }
            drop(stats);
            batches.push(batch);
        }
        match traversal {
            Traversal::Nested => {
                let mut case = Case::new();
                self.descend(0, &batches, &mut case)
            }
            Traversal::Flat => self.zipped(&batches),
        }
    }

    fn descend(&mut self, level: usize, batches: &[Vec<Pick>], case: &mut Case) -> Explored {
        let compiled = self.compiled;
        if level == compiled.quantifiers.len() {
            return self.leaf(case);
        }
        let quantifier = &compiled.quantifiers[level];
        match quantifier.kind {
            Kind::Forall => self.each(level, quantifier, batches, case),
            Kind::Exists => self.search(level, quantifier, batches, case),
        }
    }

    /// Universal sweep: fail fast, pass only when some sample passed and
    /// none refuted; an inner existential sweep with no witness refutes at
    /// the current sample.
    fn each(
        &mut self,
        level: usize,
        quantifier: &Quantifier,
        batches: &[Vec<Pick>],
        case: &mut Case,
    ) -> Explored {
        let mut witness: Option<Case> = None;
        let mut seen_pass = false;
        let mut inconclusive = false;
        for pick in &batches[level] {
            if self.out_of_budget() {
                self.budget_exceeded = true;
                return Explored::OutOfBudget;
            }
            case.insert(quantifier.name.clone(), pick.clone());
            let explored = self.descend(level + 1, batches, case);
            let outcome = self.observe(explored, case, &mut witness, &mut seen_pass);
            case.remove(&quantifier.name);
            match outcome {
                Observed::Continue => {}
                Observed::Inconclusive => inconclusive = true,
                Observed::Done(explored) => return explored,
            }
            if level == 0 {
                if let Some(termination) = self.termination {
                    if termination.satisfied(self.tests_passed, self.tests_failed) {
                        return Explored::Holds(witness);
                    }
                }
            }
        }
        if level == 0 && seen_pass {
            if let Some(explored) = self.extend(quantifier, case, &mut witness, &mut seen_pass) {
                return explored;
            }
        }
        if inconclusive {
            Explored::OutOfBudget
        } else if seen_pass {
            Explored::Holds(witness)
        } else {
            Explored::Discarded
        }
    }

    /// Shared handling of one universal sample's sub-result.
    fn observe(
        &mut self,
        explored: Explored,
        case: &Case,
        witness: &mut Option<Case>,
        seen_pass: &mut bool,
    ) -> Observed {
        match explored {
            Explored::Panicked => Observed::Done(Explored::Panicked),
            Explored::Refuted(counterexample) => {
                Observed::Done(Explored::Refuted(counterexample))
            }
            Explored::NoWitness => Observed::Done(Explored::Refuted(case.clone())),
            Explored::Holds(inner) => {
                *seen_pass = true;
                *witness = inner.or_else(|| witness.take());
                Observed::Continue
            }
            Explored::Discarded => Observed::Continue,
            Explored::OutOfBudget => {
                if self.replenish() {
                    Observed::Inconclusive
                } else {
                    self.budget_exceeded = true;
                    Observed::Done(Explored::OutOfBudget)
                }
            }
        }
    }

    /// Keeps drawing outer samples past the batch while a minimum confidence
    /// is unmet, one budget tranche at a time up to the iteration ceiling.
    /// A sample whose inner sweep stays interrupted is recorded and the
    /// sweep moves on; it leaves the run exhausted.
    fn extend(
        &mut self,
        quantifier: &Quantifier,
        case: &mut Case,
        witness: &mut Option<Case>,
        seen_pass: &mut bool,
    ) -> Option<Explored> {
        let termination = self.termination?;
        if !termination.must_continue(self.tests_passed, self.tests_failed) {
            return None;
        }
        let mut inconclusive = false;
        while termination.must_continue(self.tests_passed, self.tests_failed) {
            if self.out_of_budget() && !self.replenish() {
                self.budget_exceeded = true;
                return Some(Explored::OutOfBudget);
            }
            let Some(pick) = quantifier.arbitrary.pick(&mut *self.random) else {
                break;
            };
            self.stats.borrow_mut().record_pick(&quantifier.name, &pick);
            case.insert(quantifier.name.clone(), pick);
            let explored = self.leaf_or_descend(case);
            let outcome = self.observe(explored, case, witness, seen_pass);
            case.remove(&quantifier.name);
            match outcome {
                Observed::Continue => {}
                Observed::Inconclusive => inconclusive = true,
                Observed::Done(explored) => return Some(explored),
            }
        }
        if inconclusive {
            Some(Explored::OutOfBudget)
        } else {
            None
        }
    }

    /// Extension samples re-enter below the outermost quantifier; inner
    /// quantifiers re-sample fresh batches.
    fn leaf_or_descend(&mut self, case: &mut Case) -> Explored {
        let compiled = self.compiled;
        if compiled.quantifiers.len() == 1 {
            return self.leaf(case);
        }
        let per = ((self.limit as f64)
            .powf(1.0 / compiled.quantifiers.len() as f64) as usize)
            .max(1);
        let mut batches = vec![Vec::new()];
        for quantifier in &compiled.quantifiers[1..] {
            let batch = quantifier.sample(&mut *self.sampler, per, &mut *self.random);
            if batch.is_empty() {
                return Explored::Discarded;
            }
            batches.push(batch);
        }
        self.descend(1, &batches, case)
    }

    /// Existential search: pass on the first witness, definitively report
    /// no witness after a full sweep, out-of-budget when cut short.
    fn search(
        &mut self,
        level: usize,
        quantifier: &Quantifier,
        batches: &[Vec<Pick>],
        case: &mut Case,
    ) -> Explored {
        let mut cut = false;
        for pick in &batches[level] {
            if self.out_of_budget() {
                self.budget_exceeded = true;
                return Explored::OutOfBudget;
            }
            case.insert(quantifier.name.clone(), pick.clone());
            let explored = self.descend(level + 1, batches, case);
            match explored {
                Explored::Panicked => {
                    case.remove(&quantifier.name);
                    return Explored::Panicked;
                }
                Explored::Holds(inner) => {
                    let witness = inner.unwrap_or_else(|| case.clone());
                    case.remove(&quantifier.name);
                    return Explored::Holds(Some(witness));
                }
                Explored::Refuted(_) | Explored::NoWitness | Explored::Discarded => {
                    case.remove(&quantifier.name);
                }
                Explored::OutOfBudget => {
                    case.remove(&quantifier.name);
                    if self.replenish() {
                        cut = true;
                    } else {
                        self.budget_exceeded = true;
                        return Explored::OutOfBudget;
                    }
                }
            }
        }
        if cut {
            Explored::OutOfBudget
        } else {
            Explored::NoWitness
        }
    }

    /// Flat traversal over zipped tuples; quantifier kinds are uniform here.
    fn zipped(&mut self, batches: &[Vec<Pick>]) -> Explored {
        let compiled = self.compiled;
        let kind = compiled.quantifiers[0].kind;
        let rounds = batches.iter().map(Vec::len).min().unwrap_or(0);
        let mut witness: Option<Case> = None;
        let mut seen_pass = false;
        for index in 0..rounds {
            if self.out_of_budget() {
                self.budget_exceeded = true;
                return Explored::OutOfBudget;
            }
            let mut case = Case::new();
            for (quantifier, batch) in compiled.quantifiers.iter().zip(batches) {
                case.insert(quantifier.name.clone(), batch[index].clone());
            }
            match (kind, self.leaf(&mut case)) {
                (_, Explored::Panicked) => return Explored::Panicked,
                (Kind::Forall, Explored::Refuted(counterexample)) => {
                    return Explored::Refuted(counterexample)
                }
                (Kind::Forall, Explored::Holds(inner)) => {
                    seen_pass = true;
                    witness = inner.or(witness);
                }
                (Kind::Exists, Explored::Holds(inner)) => {
                    return Explored::Holds(inner);
                }
                _ => {}
            }
        }
        match kind {
            Kind::Forall if seen_pass => Explored::Holds(witness),
            Kind::Forall => Explored::Discarded,
            Kind::Exists => Explored::NoWitness,
        }
    }

    /// Evaluates the non-quantifier nodes for one bound case: givens bind,
    /// effects run, classifiers count (also for discarded cases), predicates
    /// decide. A precondition failure discards; any other panic aborts.
    fn leaf(&mut self, case: &mut Case) -> Explored {
        if self.out_of_budget() {
            self.budget_exceeded = true;
            return Explored::OutOfBudget;
        }
        let compiled = self.compiled;
        let stats = self.stats.clone();
        stats.borrow_mut().begin_case(self.tests_run);
        let values = case_values(case);
        let nodes = &compiled.nodes;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluate(nodes, values, stats)));
        self.tests_run += 1;
        match outcome {
            Ok(true) => {
                self.tests_passed += 1;
                Explored::Holds(Some(case.clone()))
            }
            Ok(false) => {
                self.tests_failed += 1;
                Explored::Refuted(case.clone())
            }
            Err(payload) if payload.is::<PreconditionFailure>() => {
                self.tests_discarded += 1;
                Explored::Discarded
            }
            Err(payload) => {
                self.panic = Some(payload);
                Explored::Panicked
            }
        }
    }
}

enum Observed {
    Continue,
    Inconclusive,
    Done(Explored),
}

fn evaluate(
    nodes: &[Node],
    values: BTreeMap<String, Value>,
    stats: Rc<RefCell<StatsContext>>,
) -> bool {
    let mut case = TestCase::new(values, stats.clone());
    for node in nodes {
        match node {
            Node::Forall { .. } | Node::Exists { .. } => {}
            Node::Given { name, value } => case.insert(name.clone(), value.clone()),
            Node::GivenWith { name, factory } => {
                let value = factory(&case);
                case.insert(name.clone(), value);
            }
            Node::When { effect } => effect(&case),
            Node::Classify { label, predicate } => {
                if predicate(&case) {
                    stats.borrow_mut().label(label);
                }
            }
            Node::Label { by } => {
                let label = by(&case);
                stats.borrow_mut().label(&label);
            }
            Node::Collect { by } => {
                let label = by(&case).to_string();
                stats.borrow_mut().label(&label);
            }
            Node::Cover { label, predicate } => {
                if predicate(&case) {
                    stats.borrow_mut().cover(label);
                }
            }
            Node::CoverTable { name, by } => {
                let category = by(&case);
                stats.borrow_mut().cover(&format!("{name}.{category}"));
            }
            Node::Then { predicate } => {
                if !predicate(&case) {
                    return false;
                }
            }
        }
    }
    true
}
