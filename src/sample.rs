use crate::{
    RETRIES,
    arbitrary::{Arb, Pick},
    random::Random,
};
use std::{collections::HashMap, rc::Rc};

/// One layer of the sampling pipeline. Layers own their inner layer and are
/// stacked in a fixed order from the base upward: random, dedup, bias,
/// cache. Adding a layer never violates the guarantees of the layers below.
pub trait Sampler {
    /// Draws up to `count` picks for `arbitrary`, never producing a value
    /// present in `exclude`-aware layers' exclusions.
    fn sample(
        &mut self,
        arbitrary: &Arb,
        count: usize,
        exclude: &[Pick],
        random: &mut Random,
    ) -> Vec<Pick>;
}

/// Base layer: repeatedly calls the arbitrary's generation. Draws with
/// replacement, so small domains still fill large requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn sample(
        &mut self,
        arbitrary: &Arb,
        count: usize,
        _exclude: &[Pick],
        random: &mut Random,
    ) -> Vec<Pick> {
        let mut picks = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(pick) = arbitrary.pick(random) {
                picks.push(pick);
            }
        }
        picks
    }
}

/// Discards duplicates by value equality and honours exclusions; unique up
/// to the arbitrary's exact size.
pub struct DedupSampler {
    inner: Box<dyn Sampler>,
}

impl DedupSampler {
    pub fn new(inner: Box<dyn Sampler>) -> Self {
        Self { inner }
    }
}

impl Sampler for DedupSampler {
    fn sample(
        &mut self,
        arbitrary: &Arb,
        count: usize,
        exclude: &[Pick],
        random: &mut Random,
    ) -> Vec<Pick> {
        let size = arbitrary.size();
        let limit = if size.is_exact() {
            count.min((size.value() as usize).saturating_sub(exclude.len()))
        } else {
            count
        };
        let mut picks: Vec<Pick> = Vec::with_capacity(limit);
        let mut stalls = 0;
        while picks.len() < limit && stalls < RETRIES {
            let batch = self
                .inner
                .sample(arbitrary, limit - picks.len(), &[], random);
            if batch.is_empty() {
                break;
            }
            let before = picks.len();
            for pick in batch {
                if exclude.iter().all(|seen| seen.value != pick.value)
                    && picks.iter().all(|seen| seen.value != pick.value)
                {
                    picks.push(pick);
                }
            }
            if picks.len() == before {
                stalls += 1;
            } else {
                stalls = 0;
            }
        }
        picks
    }
}

/// Reserves the first slots for the arbitrary's corner cases, in declared
/// order, collapsing duplicates among them; the rest is filled by the inner
/// layer with the corners excluded.
pub struct BiasedSampler {
    inner: Box<dyn Sampler>,
}

impl BiasedSampler {
    pub fn new(inner: Box<dyn Sampler>) -> Self {
        Self { inner }
    }
}

impl Sampler for BiasedSampler {
    fn sample(
        &mut self,
        arbitrary: &Arb,
        count: usize,
        exclude: &[Pick],
        random: &mut Random,
    ) -> Vec<Pick> {
        let mut picks: Vec<Pick> = Vec::new();
        for corner in arbitrary.corner_cases() {
            if picks.len() >= count {
                break;
            }
            if exclude.iter().all(|seen| seen.value != corner.value)
                && picks.iter().all(|seen| seen.value != corner.value)
            {
                picks.push(corner);
            }
        }
        let rest = count - picks.len();
        if rest > 0 {
            let mut excluded = exclude.to_vec();
            excluded.extend(picks.iter().cloned());
            picks.extend(self.inner.sample(arbitrary, rest, &excluded, random));
        }
        picks
    }
}

/// Memoizes the full sample of an arbitrary under `(identity, seed)` for the
/// duration of one run; identity is the arbitrary's allocation.
pub struct CachedSampler {
    inner: Box<dyn Sampler>,
    cache: HashMap<(usize, u32), (usize, Vec<Pick>)>,
}

impl CachedSampler {
    pub fn new(inner: Box<dyn Sampler>) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
        }
    }
}

fn identity(arbitrary: &Arb) -> usize {
    Rc::as_ptr(arbitrary) as *const () as usize
}

impl Sampler for CachedSampler {
    fn sample(
        &mut self,
        arbitrary: &Arb,
        count: usize,
        exclude: &[Pick],
        random: &mut Random,
    ) -> Vec<Pick> {
        if !exclude.is_empty() {
            return self.inner.sample(arbitrary, count, exclude, random);
        }
        let key = (identity(arbitrary), random.seed());
        if let Some((requested, cached)) = self.cache.get(&key) {
            if *requested >= count {
                let kept = cached.len().min(count);
                return cached[..kept].to_vec();
            }
        }
        let picks = self.inner.sample(arbitrary, count, exclude, random);
        self.cache.insert(key, (count, picks.clone()));
        picks
    }
}

/// Assembles the pipeline from strategy flags, base upward.
pub fn stack(dedup: bool, bias: bool, cache: bool) -> Box<dyn Sampler> {
    let mut sampler: Box<dyn Sampler> = Box::new(RandomSampler);
    if dedup {
        sampler = Box::new(DedupSampler::new(sampler));
    }
    if bias {
        sampler = Box::new(BiasedSampler::new(sampler));
    }
    if cache {
        sampler = Box::new(CachedSampler::new(sampler));
    }
    sampler
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prelude::integer, value::Value};

    #[test]
    fn dedup_caps_at_the_domain_size() {
        let mut sampler = stack(true, false, false);
        let arbitrary = integer(0, 4);
        let mut random = Random::new(1);
        let picks = sampler.sample(&arbitrary, 100, &[], &mut random);
        assert_eq!(picks.len(), 5);
        let mut values: Vec<_> = picks.iter().map(|pick| pick.value.clone()).collect();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), 5);
    }

    #[test]
    fn bias_reserves_corner_slots() {
        let mut sampler = stack(false, true, false);
        let arbitrary = integer(-10, 10);
        let mut random = Random::new(2);
        let picks = sampler.sample(&arbitrary, 100, &[], &mut random);
        assert_eq!(picks.len(), 100);
        assert_eq!(picks[0].value, Value::Int(0));
        assert_eq!(picks[1].value, Value::Int(-10));
        assert_eq!(picks[2].value, Value::Int(10));
    }

    #[test]
    fn bias_over_dedup_enumerates_small_domains() {
        let mut sampler = stack(true, true, false);
        let arbitrary = integer(-10, 10);
        let mut random = Random::new(3);
        let picks = sampler.sample(&arbitrary, 100, &[], &mut random);
        let mut values: Vec<_> = picks.iter().map(|pick| pick.value.clone()).collect();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), 21);
    }

    #[test]
    fn cache_replays_the_same_batch() {
        let mut sampler = stack(false, false, true);
        let arbitrary = integer(0, 1_000_000);
        let mut random = Random::new(4);
        let first = sampler.sample(&arbitrary, 50, &[], &mut random);
        let second = sampler.sample(&arbitrary, 50, &[], &mut random);
        assert_eq!(first, second);
    }
}
