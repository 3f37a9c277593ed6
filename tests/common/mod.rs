#![allow(dead_code)]

use approx::assert_relative_eq;
use cometprop::catalog::{Catalog, CometRecord};
use cometprop::orbit_type::{KeplerianElements, StateVector};

/// 1P/Halley, osculating elements of the 1994 apparition.
pub fn halley_elements() -> KeplerianElements {
    KeplerianElements::from_degrees(
        2449400.5,
        17.83414429,
        0.96714291,
        162.26269,
        58.42008,
        111.33249,
        38.861,
    )
    .unwrap()
}

/// A short-period comet well inside Jupiter's orbit.
pub fn encke_like_elements() -> KeplerianElements {
    KeplerianElements::from_degrees(2451545.0, 2.215, 0.848, 11.78, 334.57, 186.54, 143.0)
        .unwrap()
}

pub fn sample_records() -> Vec<CometRecord> {
    vec![
        CometRecord::new("1P/Halley", "Halley", Some(halley_elements())),
        CometRecord::new("2P/Encke", "Encke", Some(encke_like_elements())),
        CometRecord::new(
            "C/2019 Q4",
            "Borisov",
            Some(
                KeplerianElements::from_perihelion(2.006, 3.356, 44.05, 308.15, 209.12, 2458826.05)
                    .unwrap(),
            ),
        ),
        CometRecord::new("C/1900 X1", "Unknown orbit", None),
    ]
}

pub fn sample_catalog() -> Catalog {
    sample_records().into_iter().collect()
}

pub fn assert_state_close(actual: &StateVector, expected: &StateVector, epsilon: f64) {
    assert_eq!(actual.time, expected.time);
    assert_relative_eq!(actual.position, expected.position, epsilon = epsilon);
    assert_relative_eq!(actual.velocity, expected.velocity, epsilon = epsilon);
}
