/// Domain size metadata reported by every arbitrary.
///
/// `Exact` sizes come from arbitraries whose domain is enumerable from their
/// parameters; `Estimated` sizes carry a credible interval around the point
/// estimate (filtering estimates its acceptance rate by sampling, see
/// [`crate::filter`]). Propagation rules: mapping preserves the kind,
/// filtering and chaining downgrade to `Estimated`, products and sums
/// downgrade whenever a component is estimated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Size {
    Exact { value: f64 },
    Estimated { value: f64, interval: (f64, f64) },
}

impl Size {
    pub fn exact(value: f64) -> Self {
        Size::Exact {
            value: value.max(0.0),
        }
    }

    pub fn estimated(value: f64, interval: (f64, f64)) -> Self {
        let value = value.max(0.0);
        let low = interval.0.clamp(0.0, value);
        let high = interval.1.max(value);
        Size::Estimated {
            value,
            interval: (low, high),
        }
    }

    pub const fn value(&self) -> f64 {
        match self {
            Size::Exact { value } | Size::Estimated { value, .. } => *value,
        }
    }

    pub const fn interval(&self) -> (f64, f64) {
        match self {
            Size::Exact { value } => (*value, *value),
            Size::Estimated { interval, .. } => *interval,
        }
    }

    pub const fn is_exact(&self) -> bool {
        matches!(self, Size::Exact { .. })
    }

    pub fn plus(self, other: Self) -> Self {
        let value = self.value() + other.value();
        if self.is_exact() && other.is_exact() {
            Size::exact(value)
        } else {
            let (left_low, left_high) = self.interval();
            let (right_low, right_high) = other.interval();
            Size::estimated(value, (left_low + right_low, left_high + right_high))
        }
    }

    pub fn times(self, other: Self) -> Self {
        let value = self.value() * other.value();
        if self.is_exact() && other.is_exact() {
            Size::exact(value)
        } else {
            let (left_low, left_high) = self.interval();
            let (right_low, right_high) = other.interval();
            Size::estimated(value, (left_low * right_low, left_high * right_high))
        }
    }

    pub fn pow(self, exponent: u32) -> Self {
        let value = self.value().powi(exponent as i32);
        if self.is_exact() {
            Size::exact(value)
        } else {
            let (low, high) = self.interval();
            Size::estimated(
                value,
                (low.powi(exponent as i32), high.powi(exponent as i32)),
            )
        }
    }

    /// Downgrades to an estimate scaled by an acceptance ratio with its own
    /// credible bounds.
    pub fn scaled(self, ratio: f64, bounds: (f64, f64)) -> Self {
        let (low, high) = self.interval();
        Size::estimated(
            self.value() * ratio,
            (low * bounds.0.max(0.0), high * bounds.1),
        )
    }
}
