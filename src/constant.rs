use crate::{
    arbitrary::{Arb, Arbitrary, Pick},
    random::Random,
    size::Size,
    value::Value,
};
use std::rc::Rc;

/// Single-value arbitrary. Size 1, never shrinks.
#[derive(Clone, Debug)]
pub struct Constant {
    value: Value,
}

impl Constant {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Arbitrary for Constant {
    fn pick(&self, _random: &mut Random) -> Option<Pick> {
        Some(Pick::new(self.value.clone()))
    }

    fn size(&self) -> Size {
        Size::exact(1.0)
    }

    fn corner_cases(&self) -> Vec<Pick> {
        vec![Pick::new(self.value.clone())]
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        pick.value == self.value
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        (pick.value == self.value).then_some(0.0)
    }
}

/// The terminal arbitrary: generates nothing, absorbs every combinator and
/// ends every shrink chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct Empty;

impl Arbitrary for Empty {
    fn pick(&self, _random: &mut Random) -> Option<Pick> {
        None
    }

    fn size(&self) -> Size {
        Size::exact(0.0)
    }

    fn can_generate(&self, _pick: &Pick) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        true
    }
}

pub fn empty() -> Arb {
    Rc::new(Empty)
}
