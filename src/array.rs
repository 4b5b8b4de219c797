use crate::{
    CORNERS,
    arbitrary::{Arb, Arbitrary, Pick},
    constant::{self, Constant},
    random::Random,
    size::Size,
    record::Tuple,
    union,
    value::Value,
};
use std::rc::Rc;

// Positions considered for item-wise shrinking of one array.
const POSITIONS: usize = 16;

/// Variable-length sequences of one item arbitrary: a uniform length in
/// `min..=max`, then uniform items. Shrinking reduces the length first, then
/// shrinks items in place.
#[derive(Clone, Debug)]
pub struct Array {
    item: Arb,
    min: usize,
    max: usize,
}

impl Array {
    pub fn new(item: Arb, min: usize, max: usize) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { item, min, max }
    }

    fn item_picks(pick: &Pick) -> Option<Vec<Pick>> {
        let values = pick.value.as_list()?;
        let originals = match pick.original.as_list() {
            Some(originals) if originals.len() == values.len() => originals.to_vec(),
            _ => values.to_vec(),
        };
        Some(
            values
                .iter()
                .cloned()
                .zip(originals)
                .map(|(value, original)| Pick::with_original(value, original))
                .collect(),
        )
    }
}

impl Arbitrary for Array {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        let length = self.min + random.below(self.max - self.min + 1);
        let mut values = Vec::with_capacity(length);
        let mut originals = Vec::with_capacity(length);
        for _ in 0..length {
            let pick = self.item.pick(random)?;
            values.push(pick.value);
            originals.push(pick.original);
        }
        Some(Pick {
            value: Value::List(values),
            original: Value::List(originals),
            pre_map: None,
        })
    }

    fn size(&self) -> Size {
        let item = self.item.size();
        let mut size = Size::exact(0.0);
        for length in self.min..=self.max {
            size = size.plus(item.pow(length as u32));
        }
        size
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let corners = self.item.corner_cases();
        let mut cases: Vec<Pick> = Vec::new();
        let mut lengths = vec![self.min];
        if self.max != self.min {
            lengths.push(self.max);
        }
        for length in lengths {
            if length == 0 {
                cases.push(Pick::new(Value::List(Vec::new())));
                continue;
            }
            for corner in &corners {
                if cases.len() >= CORNERS {
                    return cases;
                }
                let case = Pick {
                    value: Value::List(vec![corner.value.clone(); length]),
                    original: Value::List(vec![corner.original.clone(); length]),
                    pre_map: None,
                };
                if cases.iter().all(|seen| seen.value != case.value) {
                    cases.push(case);
                }
            }
        }
        cases
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        let Some(picks) = Array::item_picks(pick) else {
            return false;
        };
        (self.min..=self.max).contains(&picks.len())
            && picks.iter().all(|pick| self.item.can_generate(pick))
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let Some(picks) = Array::item_picks(towards) else {
            return constant::empty();
        };
        let length = picks.len();
        let mut choices: Vec<Arb> = Vec::new();
        if length > self.min {
            choices.push(Rc::new(Array::new(self.item.clone(), self.min, length - 1)));
        }
        for (index, pick) in picks.iter().enumerate().take(POSITIONS) {
            let shrunk = self.item.shrink(pick);
            if shrunk.is_empty() {
                continue;
            }
            let components: Vec<Arb> = picks
                .iter()
                .enumerate()
                .map(|(position, pick)| {
                    if position == index {
                        shrunk.clone()
                    } else {
                        Rc::new(Constant::new(pick.value.clone())) as Arb
                    }
                })
                .collect();
            choices.push(Rc::new(Tuple::new(components)));
        }
        union::options(choices)
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        let picks = Array::item_picks(pick)?;
        let size = self.item.size();
        if !size.is_exact() || !(self.min..=self.max).contains(&picks.len()) {
            return None;
        }
        let radix = size.value();
        let mut offset = 0.0;
        for length in self.min..picks.len() {
            offset += radix.powi(length as i32);
        }
        let mut index = 0.0;
        for pick in &picks {
            index = index * radix + self.item.index_of(pick)?;
        }
        Some(offset + index)
    }

    fn is_empty(&self) -> bool {
        self.min > 0 && self.item.is_empty()
    }
}
