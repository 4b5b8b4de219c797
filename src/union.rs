use crate::{
    CORNERS,
    arbitrary::{Arb, Arbitrary, Pick},
    constant,
    random::Random,
    size::Size,
};
use std::rc::Rc;

/// Weighted choice between component arbitraries. Corner cases are the union
/// of the components' corner cases; shrinking delegates to the component
/// that produced the pick.
#[derive(Clone, Debug)]
pub struct Union {
    entries: Vec<(f64, Arb)>,
    total: f64,
}

impl Union {
    pub fn new(entries: Vec<(f64, Arb)>) -> Self {
        let entries: Vec<_> = entries
            .into_iter()
            .filter(|(weight, entry)| *weight > 0.0 && !entry.is_empty())
            .collect();
        let total = entries.iter().map(|(weight, _)| weight).sum();
        Self { entries, total }
    }

    pub fn even(entries: Vec<Arb>) -> Self {
        Self::new(entries.into_iter().map(|entry| (1.0, entry)).collect())
    }

    /// Resolves the component that could have produced the pick.
    fn source_of(&self, pick: &Pick) -> Option<&Arb> {
        self.entries
            .iter()
            .map(|(_, entry)| entry)
            .find(|entry| entry.can_generate(pick))
    }
}

impl Arbitrary for Union {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        if self.entries.is_empty() {
            return None;
        }
        let mut roll = random.next() * self.total;
        for (weight, entry) in &self.entries {
            roll -= weight;
            if roll < 0.0 {
                return entry.pick(random);
            }
        }
        self.entries.last().and_then(|(_, entry)| entry.pick(random))
    }

    fn size(&self) -> Size {
        self.entries
            .iter()
            .fold(Size::exact(0.0), |size, (_, entry)| size.plus(entry.size()))
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let mut cases: Vec<Pick> = Vec::new();
        for (_, entry) in &self.entries {
            for corner in entry.corner_cases() {
                if cases.len() >= CORNERS {
                    return cases;
                }
                if cases.iter().all(|case| case.value != corner.value) {
                    cases.push(corner);
                }
            }
        }
        cases
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        self.source_of(pick).is_some()
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        match self.source_of(towards) {
            Some(entry) => entry.shrink(towards),
            None => constant::empty(),
        }
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        let mut offset = 0.0;
        for (_, entry) in &self.entries {
            if entry.can_generate(pick) {
                return entry.index_of(pick).map(|index| offset + index);
            }
            let size = entry.size();
            if !size.is_exact() {
                return None;
            }
            offset += size.value();
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collapses a set of shrink options into a single arbitrary.
pub(crate) fn options(mut choices: Vec<Arb>) -> Arb {
    choices.retain(|choice| !choice.is_empty());
    match choices.len() {
        0 => constant::empty(),
        1 => choices.remove(0),
        _ => Rc::new(Union::even(choices)),
    }
}
