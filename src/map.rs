use crate::{
    arbitrary::{Arb, Arbitrary, Pick},
    constant,
    random::Random,
    size::Size,
    value::Value,
};
use core::fmt;
use std::rc::Rc;

/// Applies a function to every value generated by the inner arbitrary. The
/// pick remembers the pre-map value so shrinking and `can_generate` navigate
/// the inner domain.
#[derive(Clone)]
pub struct Mapped {
    inner: Arb,
    map: Rc<dyn Fn(Value) -> Value>,
}

impl Mapped {
    pub fn new(inner: Arb, map: Rc<dyn Fn(Value) -> Value>) -> Self {
        Self { inner, map }
    }

    fn apply(&self, pick: Pick) -> Pick {
        Pick {
            value: (self.map)(pick.value.clone()),
            original: pick.original,
            pre_map: Some(pick.value),
        }
    }
}

impl Arbitrary for Mapped {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        self.inner.pick(random).map(|pick| self.apply(pick))
    }

    fn size(&self) -> Size {
        self.inner.size()
    }

    fn corner_cases(&self) -> Vec<Pick> {
        self.inner
            .corner_cases()
            .into_iter()
            .map(|pick| self.apply(pick))
            .collect()
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        self.inner.can_generate(&pick.unmapped())
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let shrunk = self.inner.shrink(&towards.unmapped());
        if shrunk.is_empty() {
            constant::empty()
        } else {
            Rc::new(Mapped::new(shrunk, self.map.clone()))
        }
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        self.inner.index_of(&pick.unmapped())
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Mapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapped").field("inner", &self.inner).finish()
    }
}
