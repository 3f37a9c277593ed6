use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::JulianDate;

/// Heliocentric ecliptic J2000 state of a body.
///
/// Units
/// -----
/// * `position`: AU.
/// * `velocity`: AU/day.
/// * `time`: Julian Date (TDB).
///
/// Serialized as a [`StatePoint`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "StatePoint", into = "StatePoint")]
pub struct StateVector {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub time: JulianDate,
}

impl StateVector {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>, time: JulianDate) -> Self {
        StateVector {
            position,
            velocity,
            time,
        }
    }

    /// Build a state from the 6-vector `[x, y, z, vx, vy, vz]` used by the integrator.
    pub fn from_array(state: &[f64; 6], time: JulianDate) -> Self {
        StateVector {
            position: Vector3::new(state[0], state[1], state[2]),
            velocity: Vector3::new(state[3], state[4], state[5]),
            time,
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
        ]
    }

    /// Heliocentric distance ‖r‖ (AU).
    pub fn distance(&self) -> f64 {
        self.position.norm()
    }

    /// Speed ‖v‖ (AU/day).
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Specific orbital energy `½v² - μ/r` (AU²/day²).
    pub fn specific_energy(&self, mu: f64) -> f64 {
        0.5 * self.velocity.norm_squared() - mu / self.distance()
    }

    /// Specific angular momentum `r × v` (AU²/day).
    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.position.cross(&self.velocity)
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
            && self.position.iter().all(|x| x.is_finite())
            && self.velocity.iter().all(|x| x.is_finite())
    }
}

/// Single-state query result as exposed to consuming layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatePoint {
    pub time: JulianDate,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub distance: f64,
    pub speed: f64,
}

impl From<StateVector> for StatePoint {
    fn from(state: StateVector) -> Self {
        StatePoint {
            time: state.time,
            position: state.position.into(),
            velocity: state.velocity.into(),
            distance: state.distance(),
            speed: state.speed(),
        }
    }
}

impl From<StatePoint> for StateVector {
    fn from(point: StatePoint) -> Self {
        StateVector {
            position: Vector3::from(point.position),
            velocity: Vector3::from(point.velocity),
            time: point.time,
        }
    }
}
