//! The algebraic laws every arbitrary must satisfy, exercised over the
//! built-in generators and their combinators.

pub mod common;
use common::setup;
use quantcheck::{prelude::*, random::Random};

const SAMPLES: usize = 1000;

fn builtins() -> Vec<(&'static str, Arb)> {
    let domain: Vec<Value> = (0..8).map(Value::from).collect();
    vec![
        ("integer", integer(-50, 50)),
        ("positive integer", integer(3, 90)),
        ("real", real(-2.5, 2.5, 2)),
        ("boolean", boolean()),
        ("constant", constant(17)),
        ("array", array(integer(0, 9), 0, 6)),
        ("set", set(domain, 1, 5)),
        ("tuple", tuple(vec![integer(-5, 5), boolean()])),
        (
            "record",
            record(vec![("x", integer(0, 20)), ("y", real(0.0, 1.0, 1))]),
        ),
        ("union", union(vec![integer(-5, -1), integer(1, 5)])),
        (
            "weighted",
            weighted(vec![(3.0, integer(0, 10)), (1.0, integer(100, 110))]),
        ),
        ("mapped", integer(-20, 20).map(|v| Value::Int(v.as_int().unwrap() * 2))),
        (
            "filtered",
            integer(-50, 50).filter(|v| v.as_int().unwrap() % 2 == 0),
        ),
        (
            "chained",
            integer(1, 5).chain(|v| integer(0, v.as_int().unwrap())),
        ),
    ]
}

#[test]
fn sample_validity() {
    setup();
    for (name, arbitrary) in builtins() {
        let mut random = Random::new(0xa11);
        for pick in arbitrary.sample(SAMPLES, &mut random) {
            assert!(
                arbitrary.can_generate(&pick),
                "{name} generated {} it cannot re-generate",
                pick.value
            );
        }
        for pick in arbitrary.sample_with_bias(SAMPLES, &mut random) {
            assert!(arbitrary.can_generate(&pick), "{name} (biased)");
        }
        for pick in arbitrary.sample_unique(SAMPLES, &[], &mut random) {
            assert!(arbitrary.can_generate(&pick), "{name} (unique)");
        }
    }
}

#[test]
fn size_bound() {
    setup();
    for (name, arbitrary) in builtins() {
        let size = arbitrary.size();
        if !size.is_exact() {
            continue;
        }
        let mut random = Random::new(0x51ce);
        let picks = arbitrary.sample(SAMPLES, &mut random);
        assert!(
            picks.len() as f64 <= (SAMPLES as f64).min(size.value()),
            "{name} overflowed its size bound"
        );
    }
}

#[test]
fn uniqueness() {
    setup();
    for (name, arbitrary) in builtins() {
        let mut random = Random::new(0xded);
        let picks = arbitrary.sample_unique(SAMPLES, &[], &mut random);
        for (index, left) in picks.iter().enumerate() {
            for right in &picks[index + 1..] {
                assert_ne!(left.value, right.value, "{name} repeated a unique value");
            }
        }
    }
}

#[test]
fn corner_case_inclusion() {
    setup();
    for (name, arbitrary) in builtins() {
        let corners = arbitrary.corner_cases();
        let mut random = Random::new(0xc0e);
        let picks = arbitrary.sample_with_bias(SAMPLES, &mut random);
        for corner in &corners {
            assert!(
                picks.iter().any(|pick| pick.value == corner.value),
                "{name} dropped corner case {}",
                corner.value
            );
        }
    }
}

#[test]
fn shrink_validity() {
    setup();
    for (name, arbitrary) in builtins() {
        let mut random = Random::new(0x5a1);
        for pick in arbitrary.sample(100, &mut random) {
            let shrunk = arbitrary.shrink(&pick);
            if shrunk.is_empty() {
                continue;
            }
            for candidate in shrunk.sample(100, &mut random) {
                assert!(
                    arbitrary.is_shrunken(&candidate, &pick),
                    "{name}: {} is not strictly shrunken from {}",
                    candidate.value,
                    pick.value
                );
            }
        }
    }
}

#[test]
fn shrink_termination() {
    setup();
    for (name, arbitrary) in builtins() {
        let mut random = Random::new(0xf17);
        let Some(mut pick) = arbitrary.pick(&mut random) else {
            continue;
        };
        let mut current = arbitrary.shrink(&pick);
        let mut steps = 0;
        while !current.is_empty() {
            steps += 1;
            assert!(steps < 10_000, "{name} shrink chain does not terminate");
            match current.pick(&mut random) {
                Some(next) => {
                    pick = next;
                    current = current.shrink(&pick);
                }
                None => break,
            }
        }
    }
}

#[test]
fn map_functoriality() {
    setup();
    let base = integer(-100, 100);
    let identity = base.map(|value| value);
    let mut left = Random::new(0xf);
    let mut right = Random::new(0xf);
    for _ in 0..SAMPLES {
        let plain = base.pick(&mut left).unwrap();
        let mapped = identity.pick(&mut right).unwrap();
        assert_eq!(plain.value, mapped.value);
    }

    let double = |value: Value| Value::Int(value.as_int().unwrap() * 2);
    let successor = |value: Value| Value::Int(value.as_int().unwrap() + 1);
    let composed = base.map(move |value| successor(double(value)));
    let chained = base.map(double).map(successor);
    let mut left = Random::new(0x10);
    let mut right = Random::new(0x10);
    for _ in 0..SAMPLES {
        assert_eq!(
            composed.pick(&mut left).unwrap().value,
            chained.pick(&mut right).unwrap().value
        );
    }
}

#[test]
fn filter_soundness() {
    setup();
    let even = integer(-50, 50).filter(|value| value.as_int().unwrap() % 2 == 0);
    let mut random = Random::new(0xbead);
    for pick in even.sample(SAMPLES, &mut random) {
        assert_eq!(pick.value.as_int().unwrap() % 2, 0);
    }
    assert!(!even.size().is_exact());
    let (low, high) = even.size().interval();
    assert!(low <= even.size().value() && even.size().value() <= high);
}

#[test]
fn empty_absorption() {
    setup();
    assert!(empty().map(|value| value).is_empty());
    assert!(empty().filter(|_| true).is_empty());
    assert!(empty().chain(|_| integer(0, 1)).is_empty());
    let mut random = Random::new(0);
    assert!(empty().pick(&mut random).is_none());
    assert_eq!(empty().size().value(), 0.0);
}

#[test]
fn mapped_picks_remember_their_lineage() {
    setup();
    let doubled = integer(-20, 20).map(|value| Value::Int(value.as_int().unwrap() * 2));
    let mut random = Random::new(0x11);
    for pick in doubled.sample(100, &mut random) {
        let pre_map = pick.pre_map.clone().unwrap();
        assert_eq!(
            pick.value.as_int().unwrap(),
            pre_map.as_int().unwrap() * 2
        );
        assert_eq!(pre_map, pick.original);
    }
}

#[test]
fn union_shrink_delegates_to_the_generating_entry() {
    setup();
    let split = union(vec![integer(-50, -10), integer(10, 50)]);
    let mut random = Random::new(0x12);
    for pick in split.sample(200, &mut random) {
        let shrunk = split.shrink(&pick);
        if shrunk.is_empty() {
            continue;
        }
        for candidate in shrunk.sample(50, &mut random) {
            // Candidates stay on the side of the entry that produced the
            // pick and move toward its boundary.
            let origin = pick.value.as_int().unwrap();
            let value = candidate.value.as_int().unwrap();
            assert_eq!(origin.signum(), value.signum());
            assert!(value.abs() < origin.abs() || value.abs() == 10);
        }
    }
}
