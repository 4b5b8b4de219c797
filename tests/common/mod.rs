#![allow(dead_code)]

use quantcheck::prelude::*;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn setup() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// The bounded stand-in for ℤ used by the end-to-end scenarios.
pub fn integers() -> Arb {
    integer(-1000, 1000)
}

pub fn example_int(report: &Report, name: &str) -> i64 {
    report
        .example()
        .get(name)
        .and_then(Value::as_int)
        .unwrap_or_else(|| panic!("expected an integer binding `{name}`"))
}
