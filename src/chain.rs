use crate::{
    CORNERS,
    arbitrary::{Arb, Arbitrary, Pick},
    constant,
    random::Random,
    size::Size,
    value::Value,
};
use core::fmt;
use std::rc::Rc;

/// Monadic bind: a continuation builds a fresh arbitrary from each source
/// value. The pick's `original` holds the source value, so shrinking
/// navigates the source domain and re-runs the continuation.
#[derive(Clone)]
pub struct Chained {
    source: Arb,
    chain: Rc<dyn Fn(&Value) -> Arb>,
}

impl Chained {
    pub fn new(source: Arb, chain: Rc<dyn Fn(&Value) -> Arb>) -> Self {
        Self { source, chain }
    }
}

impl Arbitrary for Chained {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        let source = self.source.pick(random)?;
        let inner = (self.chain)(&source.value);
        let pick = inner.pick(random)?;
        Some(Pick {
            value: pick.value,
            original: source.value,
            pre_map: None,
        })
    }

    fn size(&self) -> Size {
        // The continuation's sizes are unobservable without running it.
        Size::estimated(self.source.size().value(), (0.0, f64::INFINITY))
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let mut cases = Vec::new();
        for source in self.source.corner_cases() {
            let inner = (self.chain)(&source.value);
            for pick in inner.corner_cases() {
                if cases.len() >= CORNERS {
                    return cases;
                }
                cases.push(Pick {
                    value: pick.value,
                    original: source.value.clone(),
                    pre_map: None,
                });
            }
        }
        cases
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        self.source
            .can_generate(&Pick::new(pick.original.clone()))
            && (self.chain)(&pick.original).can_generate(&Pick::new(pick.value.clone()))
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let shrunk = self.source.shrink(&Pick::new(towards.original.clone()));
        if shrunk.is_empty() {
            constant::empty()
        } else {
            Rc::new(Chained::new(shrunk, self.chain.clone()))
        }
    }

    fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl fmt::Debug for Chained {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chained")
            .field("source", &self.source)
            .finish()
    }
}
