use crate::{
    arbitrary::{Arb, Arbitrary, Pick},
    confidence, constant,
    random::Random,
    size::Size,
    value::Value,
};
use core::fmt;
use std::rc::Rc;

// Trials used to estimate the acceptance rate at construction; the fixed
// seed keeps `size()` a pure function of the arbitrary.
const TRIALS: usize = 100;
const ESTIMATE_SEED: u32 = 0x51_7e;

/// Keeps only the inner picks whose value satisfies the predicate, retrying
/// the inner arbitrary a bounded number of times per pick. The size is
/// downgraded to an estimate of `inner size × acceptance rate`, with a
/// Wilson score interval around the sampled rate.
#[derive(Clone)]
pub struct Filtered {
    inner: Arb,
    filter: Rc<dyn Fn(&Value) -> bool>,
    retries: usize,
    size: Size,
}

impl Filtered {
    pub fn new(inner: Arb, filter: Rc<dyn Fn(&Value) -> bool>, retries: usize) -> Self {
        let size = estimate(&inner, &filter);
        Self {
            inner,
            filter,
            retries,
            size,
        }
    }
}

fn estimate(inner: &Arb, filter: &Rc<dyn Fn(&Value) -> bool>) -> Size {
    let mut random = Random::new(ESTIMATE_SEED);
    let mut accepted = 0usize;
    for _ in 0..TRIALS {
        if let Some(pick) = inner.pick(&mut random) {
            if filter(&pick.value) {
                accepted += 1;
            }
        }
    }
    let ratio = accepted as f64 / TRIALS as f64;
    let bounds = confidence::wilson(accepted as u64, TRIALS as u64, 1.96);
    inner.size().scaled(ratio, bounds)
}

impl Arbitrary for Filtered {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        for _ in 0..self.retries {
            if let Some(pick) = self.inner.pick(random) {
                if (self.filter)(&pick.value) {
                    return Some(pick);
                }
            }
        }
        None
    }

    fn size(&self) -> Size {
        self.size
    }

    fn corner_cases(&self) -> Vec<Pick> {
        self.inner
            .corner_cases()
            .into_iter()
            .filter(|pick| (self.filter)(&pick.value))
            .collect()
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        self.inner.can_generate(pick) && (self.filter)(&pick.value)
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let shrunk = self.inner.shrink(towards);
        if shrunk.is_empty() {
            constant::empty()
        } else {
            Rc::new(Filtered::new(shrunk, self.filter.clone(), self.retries))
        }
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        self.inner.index_of(pick)
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Filtered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filtered")
            .field("inner", &self.inner)
            .field("retries", &self.retries)
            .finish()
    }
}
