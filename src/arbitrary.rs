use crate::{
    RETRIES, chain::Chained, constant, filter::Filtered, map::Mapped, random::Random, size::Size,
    value::Value,
};
use core::fmt;
use std::rc::Rc;

/// Shared handle to a type-erased arbitrary. Constructors and combinators all
/// produce `Arb`, so generators compose freely and the engine can identify an
/// arbitrary by its allocation for caching.
pub type Arb = Rc<dyn Arbitrary>;

/// One generated sample together with its pre-transformation lineage.
///
/// `value` is the visible sample; `original` is the representative at the
/// root of the transformation chain (what shrinking navigates by); `pre_map`
/// traces a single `map` step back when the pick went through one.
#[derive(Clone, Debug, PartialEq)]
pub struct Pick {
    pub value: Value,
    pub original: Value,
    pub pre_map: Option<Value>,
}

impl Pick {
    pub fn new(value: Value) -> Self {
        Self {
            original: value.clone(),
            value,
            pre_map: None,
        }
    }

    pub fn with_original(value: Value, original: Value) -> Self {
        Self {
            value,
            original,
            pre_map: None,
        }
    }

    /// The pick of the generator one `map` step below this one.
    pub(crate) fn unmapped(&self) -> Pick {
        let value = self
            .pre_map
            .clone()
            .unwrap_or_else(|| self.original.clone());
        Pick::with_original(value, self.original.clone())
    }
}

/// A typed value generator: sampling, corner cases, size metadata and
/// shrinking. Implementations are immutable after construction and own their
/// child arbitraries; all randomness flows through the [`Random`] argument.
#[must_use = "arbitraries do nothing until sampled"]
pub trait Arbitrary: fmt::Debug {
    /// Draws one pick, or `None` when the arbitrary cannot produce (empty
    /// domain, exhausted filter retries).
    fn pick(&self, random: &mut Random) -> Option<Pick>;

    fn size(&self) -> Size;

    /// Canonical values sampled ahead of the random stream when bias is
    /// enabled. Order matters: shrink targets come first.
    fn corner_cases(&self) -> Vec<Pick> {
        Vec::new()
    }

    /// Whether this arbitrary could have produced `pick`.
    fn can_generate(&self, pick: &Pick) -> bool;

    /// An arbitrary over values strictly simpler than `towards`; the empty
    /// arbitrary once no simpler value exists.
    fn shrink(&self, _towards: &Pick) -> Arb {
        constant::empty()
    }

    /// Strict partial order induced by shrinking: true when `candidate` lies
    /// in the shrunk domain of `origin`.
    fn is_shrunken(&self, candidate: &Pick, origin: &Pick) -> bool {
        self.shrink(origin).can_generate(candidate)
    }

    /// Position of a pick within the domain, when the domain is indexable.
    /// Used for coverage accounting and duplicate detection in statistics.
    fn index_of(&self, _pick: &Pick) -> Option<f64> {
        None
    }

    /// Fraction of the domain covered by `seen` distinct values, with
    /// credible bounds derived from the size interval.
    fn coverage(&self, seen: f64) -> Option<(f64, (f64, f64))> {
        let size = self.size();
        if size.value() <= 0.0 {
            return None;
        }
        let (low, high) = size.interval();
        let ratio = (seen / size.value()).min(1.0);
        Some((
            ratio,
            (
                (seen / high.max(1.0)).min(1.0),
                (seen / low.max(1.0)).min(1.0),
            ),
        ))
    }

    /// True only for the terminal empty arbitrary and combinators that
    /// collapse into it.
    fn is_empty(&self) -> bool {
        false
    }

    /// Draws up to `count` picks, capped at the domain size when it is exact.
    fn sample(&self, count: usize, random: &mut Random) -> Vec<Pick> {
        let count = cap(count, self.size());
        let mut picks = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(pick) = self.pick(random) {
                picks.push(pick);
            }
        }
        picks
    }

    /// Like [`Arbitrary::sample`], with the corner cases occupying the first
    /// slots (duplicates among corner cases collapse).
    fn sample_with_bias(&self, count: usize, random: &mut Random) -> Vec<Pick> {
        let count = cap(count, self.size());
        let mut picks: Vec<Pick> = Vec::with_capacity(count);
        for corner in self.corner_cases() {
            if picks.len() >= count {
                break;
            }
            if picks.iter().all(|pick| pick.value != corner.value) {
                picks.push(corner);
            }
        }
        let rest = count - picks.len();
        for _ in 0..rest {
            if let Some(pick) = self.pick(random) {
                picks.push(pick);
            }
        }
        picks
    }

    /// Draws up to `count` pairwise-distinct picks, none of which repeats a
    /// value in `exclude`.
    fn sample_unique(&self, count: usize, exclude: &[Pick], random: &mut Random) -> Vec<Pick> {
        let count = cap(count, self.size());
        let mut picks: Vec<Pick> = Vec::with_capacity(count);
        let mut misses = 0;
        while picks.len() < count && misses < RETRIES {
            match self.pick(random) {
                Some(pick)
                    if exclude.iter().all(|seen| seen.value != pick.value)
                        && picks.iter().all(|seen| seen.value != pick.value) =>
                {
                    misses = 0;
                    picks.push(pick);
                }
                Some(_) => misses += 1,
                None => misses += 1,
            }
        }
        picks
    }
}

fn cap(count: usize, size: Size) -> usize {
    if size.is_exact() {
        count.min(size.value() as usize)
    } else {
        count
    }
}

/// Functorial and monadic composition over [`Arb`] handles.
pub trait Compose {
    /// Transforms every generated value; shrinking maps back through the
    /// pick's `pre_map` lineage.
    fn map(&self, map: impl Fn(Value) -> Value + 'static) -> Arb;

    /// Keeps only values satisfying the predicate; the size downgrades to an
    /// estimate of the acceptance rate.
    fn filter(&self, filter: impl Fn(&Value) -> bool + 'static) -> Arb;

    /// Same as [`Compose::filter`] with an explicit retry bound per pick.
    fn filter_with(&self, retries: usize, filter: impl Fn(&Value) -> bool + 'static) -> Arb;

    /// Generates from the arbitrary produced by `chain` applied to each
    /// source value; shrinking re-runs the continuation on shrunk sources.
    fn chain(&self, chain: impl Fn(&Value) -> Arb + 'static) -> Arb;
}

impl Compose for Arb {
    fn map(&self, map: impl Fn(Value) -> Value + 'static) -> Arb {
        if self.is_empty() {
            constant::empty()
        } else {
            Rc::new(Mapped::new(self.clone(), Rc::new(map)))
        }
    }

    fn filter(&self, filter: impl Fn(&Value) -> bool + 'static) -> Arb {
        self.filter_with(RETRIES, filter)
    }

    fn filter_with(&self, retries: usize, filter: impl Fn(&Value) -> bool + 'static) -> Arb {
        if self.is_empty() {
            constant::empty()
        } else {
            Rc::new(Filtered::new(self.clone(), Rc::new(filter), retries))
        }
    }

    fn chain(&self, chain: impl Fn(&Value) -> Arb + 'static) -> Arb {
        if self.is_empty() {
            constant::empty()
        } else {
            Rc::new(Chained::new(self.clone(), Rc::new(chain)))
        }
    }
}
