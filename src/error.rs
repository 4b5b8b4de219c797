use thiserror::Error;

/// Configuration defects surfaced by [`check`](crate::scenario::Property::check).
/// Everything here is rejected before any sampling happens; the engine itself
/// never turns an internal condition into an `Err`.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    #[error("confidence must lie strictly between 0 and 1, got {0}")]
    Confidence(f64),
    #[error("minimum confidence must lie strictly between 0 and 1, got {0}")]
    MinConfidence(f64),
    #[error("pass rate threshold must lie strictly between 0 and 1, got {0}")]
    PassRateThreshold(f64),
    #[error("sample size must be greater than zero")]
    SampleSize,
    #[error("shrink size must be greater than zero")]
    ShrinkSize,
    #[error("maximum iterations must be greater than zero")]
    MaxIterations,
    #[error("duplicate binding `{0}`")]
    DuplicateBinding(String),
}

/// Sentinel panic payload raised by [`pre`] and recovered at the property
/// boundary; the affected test case counts as discarded. Never observable by
/// callers of `check`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreconditionFailure;

/// Discards the current test case unless `condition` holds.
///
/// ```
/// use quantcheck::prelude::*;
///
/// let report = scenario()
///     .forall("n", integer(-100, 100))
///     .then(|case| {
///         pre(case.int("n") != 0);
///         case.int("n") / case.int("n") == 1
///     })
///     .check()
///     .unwrap();
/// assert!(report.satisfiable());
/// ```
pub fn pre(condition: bool) {
    if !condition {
        std::panic::panic_any(PreconditionFailure);
    }
}
