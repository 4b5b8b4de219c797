pub use crate::{
    arbitrary::{Arb, Arbitrary, Compose, Pick},
    check::{Outcome, Report, ShrinkMode, Strategy, Traversal},
    error::{Error, PreconditionFailure, pre},
    scenario::{Property, Scenario, TestCase, scenario},
    size::Size,
    stats::StatisticsConfig,
    value::Value,
};
use crate::{
    array::Array,
    constant::{self, Constant},
    primitive::{Boolean, Integer, Real},
    record::{Record, Tuple},
    set::Subset,
    union::Union,
};
use std::rc::Rc;

/// Uniform integers in `start..=end`.
pub fn integer(start: i64, end: i64) -> Arb {
    Rc::new(Integer::new(start, end))
}

/// Reals in `start..=end`, quantized to `10^-precision` steps.
pub fn real(start: f64, end: f64, precision: u32) -> Arb {
    Rc::new(Real::new(start, end, precision))
}

/// Uniform booleans.
pub fn boolean() -> Arb {
    Rc::new(Boolean)
}

/// The single given value.
pub fn constant(value: impl Into<Value>) -> Arb {
    Rc::new(Constant::new(value.into()))
}

/// The arbitrary that generates nothing.
pub fn empty() -> Arb {
    constant::empty()
}

/// Sequences of `item` with a length in `min..=max`.
pub fn array(item: Arb, min: usize, max: usize) -> Arb {
    Rc::new(Array::new(item, min, max))
}

/// Subsets of `domain` with a cardinality in `min..=max`.
pub fn set(domain: Vec<Value>, min: usize, max: usize) -> Arb {
    Rc::new(Subset::new(domain, min, max))
}

/// The Cartesian product of `components`, as a list value.
pub fn tuple(components: Vec<Arb>) -> Arb {
    Rc::new(Tuple::new(components))
}

/// The named Cartesian product of `fields`, as a record value.
pub fn record(fields: Vec<(&str, Arb)>) -> Arb {
    Rc::new(Record::new(
        fields
            .into_iter()
            .map(|(name, component)| (name.into(), component))
            .collect(),
    ))
}

/// Evenly weighted choice between `entries`.
pub fn union(entries: Vec<Arb>) -> Arb {
    Rc::new(Union::even(entries))
}

/// Weighted choice between `entries`.
pub fn weighted(entries: Vec<(f64, Arb)>) -> Arb {
    Rc::new(Union::new(entries))
}
