use crate::{
    arbitrary::{Arb, Arbitrary, Pick},
    constant,
    random::Random,
    size::Size,
    value::Value,
};
use std::rc::Rc;

/// Subsets of a fixed domain of distinct values, generated in domain order
/// (the canonical representation) with a uniform cardinality in
/// `min..=max`. Subsets are indexed by their bitmask over the domain.
#[derive(Clone, Debug)]
pub struct Subset {
    domain: Vec<Value>,
    min: usize,
    max: usize,
}

impl Subset {
    pub fn new(domain: Vec<Value>, min: usize, max: usize) -> Self {
        let mut distinct: Vec<Value> = Vec::with_capacity(domain.len());
        for value in domain {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let max = max.min(distinct.len());
        let min = min.min(max);
        Self {
            domain: distinct,
            min,
            max,
        }
    }

    fn members(&self, pick: &Pick) -> Option<Vec<usize>> {
        let values = pick.value.as_list()?;
        let mut positions = Vec::with_capacity(values.len());
        for value in values {
            positions.push(self.domain.iter().position(|member| member == value)?);
        }
        Some(positions)
    }

    /// Canonical subsets appear in domain order without repetition.
    fn canonical(positions: &[usize]) -> bool {
        positions.windows(2).all(|pair| pair[0] < pair[1])
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let mut result = 1.0;
    for i in 0..k {
        result *= (n - i) as f64 / (i + 1) as f64;
    }
    result
}

impl Arbitrary for Subset {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        let cardinality = self.min + random.below(self.max - self.min + 1);
        let mut values = Vec::with_capacity(cardinality);
        let mut needed = cardinality;
        for (position, value) in self.domain.iter().enumerate() {
            if needed == 0 {
                break;
            }
            let remaining = self.domain.len() - position;
            if random.next() < needed as f64 / remaining as f64 {
                values.push(value.clone());
                needed -= 1;
            }
        }
        Some(Pick::new(Value::List(values)))
    }

    fn size(&self) -> Size {
        let mut total = 0.0;
        for cardinality in self.min..=self.max {
            total += binomial(self.domain.len(), cardinality);
        }
        Size::exact(total)
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let mut cases = vec![Pick::new(Value::List(
            self.domain[..self.min].to_vec(),
        ))];
        if self.max != self.min {
            cases.push(Pick::new(Value::List(self.domain[..self.max].to_vec())));
        }
        cases
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        match self.members(pick) {
            Some(positions) => {
                (self.min..=self.max).contains(&positions.len())
                    && Subset::canonical(&positions)
            }
            None => false,
        }
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let Some(values) = towards.value.as_list() else {
            return constant::empty();
        };
        if values.len() <= self.min {
            return constant::empty();
        }
        Rc::new(Subset::new(values.to_vec(), self.min, values.len() - 1))
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        let positions = self.members(pick)?;
        Some(
            positions
                .into_iter()
                .map(|position| 2f64.powi(position as i32))
                .sum(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Vec<Value> {
        (0..5).map(Value::from).collect()
    }

    #[test]
    fn picks_are_canonical_subsets() {
        let subset = Subset::new(domain(), 1, 3);
        let mut random = Random::new(3);
        for _ in 0..500 {
            let pick = subset.pick(&mut random).unwrap();
            assert!(subset.can_generate(&pick));
            let length = pick.value.as_list().unwrap().len();
            assert!((1..=3).contains(&length));
        }
    }

    #[test]
    fn size_counts_subsets() {
        // C(5,1) + C(5,2) + C(5,3) = 5 + 10 + 10
        let subset = Subset::new(domain(), 1, 3);
        assert_eq!(subset.size().value(), 25.0);
    }

    #[test]
    fn shrinking_loses_an_element() {
        let subset = Subset::new(domain(), 0, 5);
        let pick = Pick::new(Value::List(vec![
            Value::Int(1),
            Value::Int(3),
            Value::Int(4),
        ]));
        let shrunk = subset.shrink(&pick);
        assert!(!shrunk.can_generate(&pick));
        assert!(shrunk.can_generate(&Pick::new(Value::List(vec![
            Value::Int(1),
            Value::Int(4),
        ]))));
        assert!(subset.is_shrunken(
            &Pick::new(Value::List(vec![Value::Int(3)])),
            &pick
        ));
    }

    #[test]
    fn bitmask_indexing() {
        let subset = Subset::new(domain(), 0, 5);
        let pick = Pick::new(Value::List(vec![Value::Int(0), Value::Int(2)]));
        assert_eq!(subset.index_of(&pick), Some(5.0));
    }
}
