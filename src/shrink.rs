use crate::{
    CANDIDATES, ORACLE, ROUNDS,
    arbitrary::Pick,
    check::{ShrinkMode, Traversal},
    explore::{Case, Compiled, Explored, Explorer, Kind, Quantifier},
    random::Random,
    sample,
    stats::{ShrinkStats, StatisticsConfig, StatsContext},
};
use std::{cell::RefCell, rc::Rc, time::Instant};

/// What the minimizer must preserve at every step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    /// The scenario keeps failing (minimizing a counterexample).
    Counterexample,
    /// The scenario keeps passing (minimizing a witness).
    Witness,
}

pub(crate) struct Shrinker<'a> {
    compiled: &'a Compiled,
    target: Target,
    mode: ShrinkMode,
    max_attempts: usize,
    seed: u32,
    deadline: Option<Instant>,
    stats: ShrinkStats,
}

impl<'a> Shrinker<'a> {
    pub fn new(
        compiled: &'a Compiled,
        target: Target,
        mode: ShrinkMode,
        max_attempts: usize,
        seed: u32,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            compiled,
            target,
            mode,
            max_attempts,
            seed,
            deadline,
            stats: ShrinkStats::default(),
        }
    }

    /// Minimizes `case` while the explorer keeps confirming the target
    /// invariant. Non-convergence is not an error: the best case found
    /// within the budget wins.
    pub fn minimize(mut self, case: Case) -> (Case, ShrinkStats) {
        let relevant: Vec<usize> = self
            .compiled
            .quantifiers
            .iter()
            .enumerate()
            .filter(|(_, quantifier)| match self.target {
                Target::Counterexample => true,
                Target::Witness => quantifier.kind == Kind::Exists,
            })
            .map(|(index, _)| index)
            .collect();
        if relevant.is_empty() {
            return (case, self.stats);
        }
        let mut current = case;
        let mut cursor = 0;
        while self.stats.rounds < ROUNDS && self.stats.attempts < self.max_attempts {
            self.stats.rounds += 1;
            let mut improved = false;
            if self.mode == ShrinkMode::DeltaDebug && relevant.len() > 1 {
                improved |= self.joint(&relevant, &mut current);
            }
            let order: Vec<usize> = (0..relevant.len())
                .map(|offset| relevant[(cursor + offset) % relevant.len()])
                .collect();
            for (position, &index) in order.iter().enumerate() {
                if self.stats.attempts >= self.max_attempts || self.timed_out() {
                    return (current, self.stats);
                }
                if self.position(index, &mut current) {
                    improved = true;
                    match self.mode {
                        // Biased toward earlier positions: restart the sweep.
                        ShrinkMode::Sequential => break,
                        // Fair rotation: resume after the improved position.
                        ShrinkMode::RoundRobin => {
                            cursor = (cursor + position + 1) % relevant.len();
                            break;
                        }
                        ShrinkMode::DeltaDebug => break,
                    }
                }
            }
            if !improved {
                break;
            }
        }
        (current, self.stats)
    }

    fn timed_out(&self) -> bool {
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Tries candidates for one quantifier; on acceptance, merges the
    /// candidate and the oracle's bindings for the free quantifiers into
    /// the current case.
    fn position(&mut self, index: usize, current: &mut Case) -> bool {
        let quantifier = &self.compiled.quantifiers[index];
        let Some(pick) = current.get(&quantifier.name).cloned() else {
            return false;
        };
        let remaining = self.max_attempts - self.stats.attempts;
        let mut random = self.step_random();
        let mut sampler = sample::stack(true, true, false);
        let candidates = quantifier.shrink(
            &pick,
            sampler.as_mut(),
            remaining.min(CANDIDATES),
            &mut random,
        );
        for candidate in candidates {
            if self.stats.attempts >= self.max_attempts || self.timed_out() {
                return false;
            }
            if !quantifier.is_shrunken(&candidate, &pick) {
                continue;
            }
            self.stats.attempts += 1;
            let partial = self.pin(current, index, &candidate);
            if let Some(oracle) = self.oracle(&partial) {
                log::debug!(
                    "shrunk {} from {} to {}",
                    quantifier.name,
                    pick.value,
                    candidate.value
                );
                self.accept(current, index, candidate, oracle);
                return true;
            }
        }
        false
    }

    /// Joint step of delta debugging: shrink every relevant quantifier at
    /// once while the combined move still confirms the invariant.
    fn joint(&mut self, relevant: &[usize], current: &mut Case) -> bool {
        const COMBOS: usize = 8;
        let mut improved = false;
        loop {
            if self.stats.attempts >= self.max_attempts || self.timed_out() {
                return improved;
            }
            let mut random = self.step_random();
            let mut sampler = sample::stack(true, true, false);
            let mut columns: Vec<(usize, Vec<Pick>)> = Vec::new();
            for &index in relevant {
                let quantifier = &self.compiled.quantifiers[index];
                let Some(pick) = current.get(&quantifier.name) else {
                    continue;
                };
                let candidates: Vec<Pick> = quantifier
                    .shrink(pick, sampler.as_mut(), COMBOS, &mut random)
                    .into_iter()
                    .filter(|candidate| quantifier.is_shrunken(candidate, pick))
                    .collect();
                if !candidates.is_empty() {
                    columns.push((index, candidates));
                }
            }
            if columns.len() < 2 {
                return improved;
            }
            let rows = columns
                .iter()
                .map(|(_, candidates)| candidates.len())
                .min()
                .unwrap_or(0);
            let mut accepted = false;
            for row in 0..rows {
                if self.stats.attempts >= self.max_attempts {
                    return improved;
                }
                self.stats.attempts += 1;
                let mut combined = current.clone();
                for (index, candidates) in &columns {
                    let quantifier = &self.compiled.quantifiers[*index];
                    combined.insert(quantifier.name.clone(), candidates[row].clone());
                }
                let partial = self.pin_all(&combined);
                if let Some(oracle) = self.oracle(&partial) {
                    self.stats.improvements += 1;
                    for (index, candidates) in &columns {
                        let name = &self.compiled.quantifiers[*index].name;
                        current.insert(name.clone(), candidates[row].clone());
                    }
                    for quantifier in &self.compiled.quantifiers {
                        if !current.contains_key(&quantifier.name) {
                            if let Some(pick) = oracle.get(&quantifier.name) {
                                current.insert(quantifier.name.clone(), pick.clone());
                            }
                        }
                    }
                    accepted = true;
                    improved = true;
                    break;
                }
            }
            if !accepted {
                return improved;
            }
        }
    }

    /// Partial scenario: this quantifier and all preceding ones pinned to
    /// constants (the candidate replacing the current pick), following
    /// quantifiers left free.
    fn pin(&self, current: &Case, index: usize, candidate: &Pick) -> Compiled {
        let quantifiers: Vec<Quantifier> = self
            .compiled
            .quantifiers
            .iter()
            .enumerate()
            .map(|(position, quantifier)| {
                if position == index {
                    quantifier.pinned(candidate)
                } else if position < index {
                    match current.get(&quantifier.name) {
                        Some(pick) => quantifier.pinned(pick),
                        None => quantifier.clone(),
                    }
                } else {
                    quantifier.clone()
                }
            })
            .collect();
        Compiled {
            nodes: self.compiled.nodes.clone(),
            quantifiers,
            has_existential: self.compiled.has_existential,
        }
    }

    /// Partial scenario with every bound quantifier pinned to `combined`.
    fn pin_all(&self, combined: &Case) -> Compiled {
        let quantifiers: Vec<Quantifier> = self
            .compiled
            .quantifiers
            .iter()
            .map(|quantifier| match combined.get(&quantifier.name) {
                Some(pick) => quantifier.pinned(pick),
                None => quantifier.clone(),
            })
            .collect();
        Compiled {
            nodes: self.compiled.nodes.clone(),
            quantifiers,
            has_existential: self.compiled.has_existential,
        }
    }

    /// Re-verifies a partial scenario with a small exploration budget.
    /// Returns the confirming case when the invariant holds.
    fn oracle(&mut self, partial: &Compiled) -> Option<Case> {
        let mut random = Random::new(
            self.seed
                .wrapping_add((self.stats.attempts as u32).wrapping_mul(0x9e37_79b9)),
        );
        let mut sampler = sample::stack(true, true, false);
        let scratch = Rc::new(RefCell::new(StatsContext::new(
            random.seed(),
            StatisticsConfig::default(),
        )));
        let mut explorer = Explorer::new(
            partial,
            sampler.as_mut(),
            &mut random,
            scratch,
            Traversal::Nested,
            ORACLE,
            self.deadline,
            None,
        );
        let explored = explorer.explore();
        match (self.target, explored) {
            (Target::Counterexample, Explored::Refuted(case)) => Some(case),
            // A panic reproduces the failure as far as shrinking is
            // concerned.
            (Target::Counterexample, Explored::Panicked) => Some(Case::new()),
            (Target::Witness, Explored::Holds(Some(case))) => Some(case),
            _ => None,
        }
    }

    /// The shrunk quantifier takes the candidate (lineage preserved for
    /// later rounds), pinned quantifiers keep their picks, free quantifiers
    /// adopt the oracle's.
    fn accept(&mut self, current: &mut Case, index: usize, candidate: Pick, oracle: Case) {
        self.stats.improvements += 1;
        let name = &self.compiled.quantifiers[index].name;
        current.insert(name.clone(), candidate);
        for quantifier in &self.compiled.quantifiers[index + 1..] {
            if let Some(pick) = oracle.get(&quantifier.name) {
                current.insert(quantifier.name.clone(), pick.clone());
            }
        }
    }

    fn step_random(&self) -> Random {
        Random::new(
            self.seed
                .wrapping_mul(0x0100_0193)
                .wrapping_add(self.stats.attempts as u32),
        )
    }
}
