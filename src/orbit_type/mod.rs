//! # Orbit representations
//!
//! * [`keplerian_element::KeplerianElements`] – canonical element set and derived quantities.
//! * [`state_vector::StateVector`] – heliocentric Cartesian state at a given time.
//! * [`OrbitExtent`] – a length or duration that only exists for closed orbits.
//! * [`StateConversion`] – tagged outcome of the state → elements transform.
pub mod keplerian_element;
pub mod state_vector;

pub use keplerian_element::{ElementsInDegrees, ElementsInRadians, KeplerianElements};
pub use state_vector::{StatePoint, StateVector};

/// A derived quantity that is finite only for bound (`e < 1`) orbits.
///
/// Aphelion distance and period of a parabolic or hyperbolic orbit are reported as
/// [`OrbitExtent::Unbounded`] rather than coerced to infinity or NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrbitExtent {
    Bounded(f64),
    Unbounded,
}

impl OrbitExtent {
    /// The finite value, if any.
    pub fn bounded(self) -> Option<f64> {
        match self {
            OrbitExtent::Bounded(v) => Some(v),
            OrbitExtent::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, OrbitExtent::Unbounded)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> OrbitExtent {
        match self {
            OrbitExtent::Bounded(v) => OrbitExtent::Bounded(f(v)),
            OrbitExtent::Unbounded => OrbitExtent::Unbounded,
        }
    }
}

impl std::fmt::Display for OrbitExtent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrbitExtent::Bounded(v) => write!(f, "{v}"),
            OrbitExtent::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Outcome of converting a Cartesian state back into Keplerian elements.
///
/// The conversion is not implemented; callers always receive
/// [`StateConversion::Unsupported`] and must not treat it as a transient error.
#[derive(Debug, Clone, PartialEq)]
pub enum StateConversion {
    Converted(KeplerianElements),
    Unsupported(String),
}
