use crate::{
    arbitrary::{Arb, Arbitrary, Pick},
    constant,
    random::Random,
    size::Size,
    union::Union,
    value::Value,
};
use std::rc::Rc;

// Weight ratio of the near-target half over the far half when shrinking.
const NEAR: f64 = 2.0;
const FAR: f64 = 1.0;

/// Uniform integers over an inclusive range. Corner cases lead with the
/// shrink target (`0` when in range) followed by the bounds; shrinking
/// narrows the range strictly toward zero.
#[derive(Clone, Copy, Debug)]
pub struct Integer {
    start: i64,
    end: i64,
}

impl Integer {
    pub fn new(start: i64, end: i64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    fn target(&self) -> i64 {
        0i64.clamp(self.start, self.end)
    }
}

impl Arbitrary for Integer {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        Some(Pick::new(Value::Int(random.i64(self.start, self.end))))
    }

    fn size(&self) -> Size {
        Size::exact(self.end as f64 - self.start as f64 + 1.0)
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let mut values = Vec::with_capacity(3);
        if self.start <= 0 && 0 <= self.end {
            values.push(0);
        }
        for bound in [self.start, self.end] {
            if !values.contains(&bound) {
                values.push(bound);
            }
        }
        values
            .into_iter()
            .map(|value| Pick::new(Value::Int(value)))
            .collect()
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        matches!(pick.value, Value::Int(value) if self.start <= value && value <= self.end)
    }

    /// Values strictly between the target and `towards`, split at the
    /// midpoint so biased candidates step toward zero in halves.
    fn shrink(&self, towards: &Pick) -> Arb {
        let Value::Int(value) = towards.value else {
            return constant::empty();
        };
        let target = self.target();
        if value == target || value < self.start || value > self.end {
            return constant::empty();
        }
        let (low, high) = if value > target {
            (target, value - 1)
        } else {
            (value + 1, target)
        };
        if low == high {
            return Rc::new(Integer::new(low, high));
        }
        let (near, far) = if value > target {
            let middle = low + (high - low) / 2;
            (Integer::new(low, middle), Integer::new(middle + 1, high))
        } else {
            let middle = high - (high - low) / 2;
            (Integer::new(middle, high), Integer::new(low, middle - 1))
        };
        Rc::new(Union::new(vec![
            (NEAR, Rc::new(near) as Arb),
            (FAR, Rc::new(far) as Arb),
        ]))
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        match pick.value {
            Value::Int(value) if self.start <= value && value <= self.end => {
                Some(value as f64 - self.start as f64)
            }
            _ => None,
        }
    }
}

/// Reals quantized to `10^-precision` steps over an inclusive range.
#[derive(Clone, Copy, Debug)]
pub struct Real {
    start: f64,
    end: f64,
    precision: u32,
}

impl Real {
    pub fn new(start: f64, end: f64, precision: u32) -> Self {
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        debug_assert!(start.is_finite() && end.is_finite());
        Self {
            start,
            end,
            precision,
        }
    }

    fn step(&self) -> f64 {
        10f64.powi(-(self.precision as i32))
    }

    fn quantize(&self, value: f64) -> f64 {
        let step = self.step();
        ((value / step).round() * step).clamp(self.start, self.end)
    }

    fn target(&self) -> f64 {
        self.quantize(0f64.clamp(self.start, self.end))
    }

    fn on_grid(&self, value: f64) -> bool {
        if value == self.start || value == self.end {
            return true;
        }
        let ratio = value / self.step();
        (ratio - ratio.round()).abs() < 1e-6
    }
}

impl Arbitrary for Real {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        let raw = random.f64(self.start, self.end);
        Some(Pick::new(Value::Real(self.quantize(raw))))
    }

    fn size(&self) -> Size {
        Size::exact(((self.end - self.start) / self.step()).floor() + 1.0)
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let mut values = Vec::with_capacity(3);
        if self.start <= 0.0 && 0.0 <= self.end {
            values.push(self.target());
        }
        for bound in [self.start, self.end] {
            if !values.iter().any(|value: &f64| value.total_cmp(&bound).is_eq()) {
                values.push(bound);
            }
        }
        values
            .into_iter()
            .map(|value| Pick::new(Value::Real(value)))
            .collect()
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        matches!(
            pick.value,
            Value::Real(value)
                if self.start <= value && value <= self.end && self.on_grid(value)
        )
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let Value::Real(value) = towards.value else {
            return constant::empty();
        };
        if value < self.start || value > self.end {
            return constant::empty();
        }
        let step = self.step();
        let target = self.target();
        if (value - target).abs() < step / 2.0 {
            return constant::empty();
        }
        let (low, high) = if value > target {
            (target, value - step)
        } else {
            (value + step, target)
        };
        if high < low {
            return constant::empty();
        }
        if (high - low).abs() < step / 2.0 {
            return Rc::new(Real::new(low, high, self.precision));
        }
        let middle = self.quantize((low + high) / 2.0);
        let (near, far) = if value > target {
            (
                Real::new(low, middle, self.precision),
                Real::new((middle + step).min(high), high, self.precision),
            )
        } else {
            (
                Real::new(middle, high, self.precision),
                Real::new(low, (middle - step).max(low), self.precision),
            )
        };
        Rc::new(Union::new(vec![
            (NEAR, Rc::new(near) as Arb),
            (FAR, Rc::new(far) as Arb),
        ]))
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        match pick.value {
            Value::Real(value) if self.start <= value && value <= self.end => {
                Some(((value - self.start) / self.step()).round())
            }
            _ => None,
        }
    }
}

/// Uniform booleans. Shrinks to nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Boolean;

impl Arbitrary for Boolean {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        Some(Pick::new(Value::Bool(random.bool())))
    }

    fn size(&self) -> Size {
        Size::exact(2.0)
    }

    fn corner_cases(&self) -> Vec<Pick> {
        vec![
            Pick::new(Value::Bool(false)),
            Pick::new(Value::Bool(true)),
        ]
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        matches!(pick.value, Value::Bool(_))
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        match pick.value {
            Value::Bool(value) => Some(value as u8 as f64),
            _ => None,
        }
    }
}
