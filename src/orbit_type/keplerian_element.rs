//! # Keplerian orbital elements
//!
//! This module defines [`KeplerianElements`], the canonical element set of the crate, and
//! its derived quantities.
//!
//! ## What are Keplerian elements?
//!
//! 1. **a** – Semi-major axis (AU)
//! 2. **e** – Eccentricity (unitless)
//! 3. **i** – Inclination (radians)
//! 4. **Ω** – Longitude of ascending node (radians)
//! 5. **ω** – Argument of perihelion (radians)
//! 6. **M₀** – Mean anomaly at epoch (radians)
//!
//! Together with the epoch (Julian Date, TDB) they describe an unperturbed heliocentric
//! orbit. Angles are stored in radians; [`KeplerianElements::from_degrees`] and the
//! `*_deg` accessors are the explicit conversion boundary, and the serialized form is in
//! degrees as well.
//!
//! ## Regimes
//!
//! - `e < 1`: every derived quantity is finite.
//! - `e ≥ 1`: aphelion and period are [`OrbitExtent::Unbounded`]. Hyperbolic elements
//!   follow the usual convention `a < 0`, so that `q = a(1-e)` stays positive.
//!
//! The elements are immutable once constructed: fields are private and only read
//! through accessors.
//!
//! ## See also
//!
//! - [`crate::two_body::TwoBodyPropagator`] – closed-form elements → state transform.
//! - [`crate::orbit_type::StateConversion`] – the (unsupported) inverse transform.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::{
    Degree, JulianDate, Radian, DAYS_PER_JULIAN_YEAR, DPI, GAUSS_GRAV_SQUARED, RADEG,
};
use crate::kepler::principal_angle;
use crate::orbit_type::{OrbitExtent, StateConversion, StateVector};

/// Keplerian orbital elements (osculating, heliocentric ecliptic J2000).
///
/// Units
/// -----
/// * `epoch`: Julian Date (TDB).
/// * `semi_major_axis`: Astronomical Units (AU).
/// * `eccentricity`: unitless.
/// * `inclination`, `ascending_node_longitude`, `periapsis_argument`, `mean_anomaly`: radians.
///
/// See also
/// --------
/// * [`KeplerianElements::from_degrees`] – degree-based constructor.
/// * [`KeplerianElements::from_perihelion`] – perihelion-form (q, T) constructor.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "ElementsInDegrees", into = "ElementsInDegrees")]
pub struct KeplerianElements {
    epoch: JulianDate,
    semi_major_axis: f64,
    eccentricity: f64,
    inclination: Radian,
    ascending_node_longitude: Radian,
    periapsis_argument: Radian,
    mean_anomaly: Radian,
}

impl KeplerianElements {
    /// Build an element set from radian angles.
    ///
    /// Arguments
    /// ---------
    /// * `epoch` – Epoch of validity (Julian Date, TDB).
    /// * `semi_major_axis` – `a` (AU), positive for `e < 1`.
    /// * `eccentricity` – `e ≥ 0`.
    /// * `inclination`, `ascending_node_longitude`, `periapsis_argument`, `mean_anomaly` –
    ///   `i`, `Ω`, `ω`, `M₀` in radians.
    ///
    /// Return
    /// ------
    /// * The elements, or [`CometPropError::InvalidElements`] for non-finite values, a negative
    ///   eccentricity, a null semi-major axis or a non-positive one on a bound orbit.
    pub fn new(
        epoch: JulianDate,
        semi_major_axis: f64,
        eccentricity: f64,
        inclination: Radian,
        ascending_node_longitude: Radian,
        periapsis_argument: Radian,
        mean_anomaly: Radian,
    ) -> Result<Self> {
        let fields = [
            ("epoch", epoch),
            ("semi_major_axis", semi_major_axis),
            ("eccentricity", eccentricity),
            ("inclination", inclination),
            ("ascending_node_longitude", ascending_node_longitude),
            ("periapsis_argument", periapsis_argument),
            ("mean_anomaly", mean_anomaly),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CometPropError::InvalidElements(format!(
                "{name} is not finite ({value})"
            )));
        }
        if eccentricity < 0.0 {
            return Err(CometPropError::InvalidElements(format!(
                "negative eccentricity {eccentricity}"
            )));
        }
        if semi_major_axis == 0.0 || (eccentricity < 1.0 && semi_major_axis < 0.0) {
            return Err(CometPropError::InvalidElements(format!(
                "semi-major axis {semi_major_axis} AU is not valid for e = {eccentricity}"
            )));
        }

        Ok(KeplerianElements {
            epoch,
            semi_major_axis,
            eccentricity,
            inclination,
            ascending_node_longitude,
            periapsis_argument,
            mean_anomaly,
        })
    }

    /// Build an element set from degree angles, converting them to radians on entry.
    pub fn from_degrees(
        epoch: JulianDate,
        semi_major_axis: f64,
        eccentricity: f64,
        inclination: Degree,
        ascending_node_longitude: Degree,
        periapsis_argument: Degree,
        mean_anomaly: Degree,
    ) -> Result<Self> {
        Self::new(
            epoch,
            semi_major_axis,
            eccentricity,
            inclination * RADEG,
            ascending_node_longitude * RADEG,
            periapsis_argument * RADEG,
            mean_anomaly * RADEG,
        )
    }

    /// Build an element set from perihelion-form elements, as published for comets.
    ///
    /// The epoch is the perihelion passage, where `M₀ = 0`, and `a = q / (1 - e)`.
    ///
    /// Arguments
    /// ---------
    /// * `perihelion_distance` – `q` (AU).
    /// * `eccentricity` – `e`.
    /// * `inclination`, `ascending_node_longitude`, `periapsis_argument` – degrees.
    /// * `perihelion_time` – time of perihelion passage `T` (Julian Date, TDB).
    ///
    /// Return
    /// ------
    /// * The elements, or [`CometPropError::UnsupportedOrbitRegime`] for an exactly parabolic
    ///   orbit, which has no finite semi-major axis.
    pub fn from_perihelion(
        perihelion_distance: f64,
        eccentricity: f64,
        inclination: Degree,
        ascending_node_longitude: Degree,
        periapsis_argument: Degree,
        perihelion_time: JulianDate,
    ) -> Result<Self> {
        if eccentricity == 1.0 {
            return Err(CometPropError::UnsupportedOrbitRegime { eccentricity });
        }
        if !(perihelion_distance > 0.0) {
            return Err(CometPropError::InvalidElements(format!(
                "perihelion distance must be positive, got {perihelion_distance}"
            )));
        }
        Self::from_degrees(
            perihelion_time,
            perihelion_distance / (1.0 - eccentricity),
            eccentricity,
            inclination,
            ascending_node_longitude,
            periapsis_argument,
            0.0,
        )
    }

    /// Inverse transform, state vector → elements. Not implemented: always
    /// [`StateConversion::Unsupported`].
    pub fn from_state_vector(_state: &StateVector) -> StateConversion {
        StateConversion::Unsupported(
            "Cartesian to Keplerian conversion is not implemented".to_string(),
        )
    }

    pub fn epoch(&self) -> JulianDate {
        self.epoch
    }

    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    pub fn inclination(&self) -> Radian {
        self.inclination
    }

    pub fn ascending_node_longitude(&self) -> Radian {
        self.ascending_node_longitude
    }

    pub fn periapsis_argument(&self) -> Radian {
        self.periapsis_argument
    }

    pub fn mean_anomaly(&self) -> Radian {
        self.mean_anomaly
    }

    pub fn inclination_deg(&self) -> Degree {
        self.inclination / RADEG
    }

    pub fn ascending_node_longitude_deg(&self) -> Degree {
        self.ascending_node_longitude / RADEG
    }

    pub fn periapsis_argument_deg(&self) -> Degree {
        self.periapsis_argument / RADEG
    }

    pub fn mean_anomaly_deg(&self) -> Degree {
        self.mean_anomaly / RADEG
    }

    pub fn to_degrees(&self) -> ElementsInDegrees {
        ElementsInDegrees::from(*self)
    }

    /// Whether the orbit is closed (`e < 1`).
    pub fn is_bound(&self) -> bool {
        self.eccentricity < 1.0
    }

    /// `q = a(1-e)` (AU).
    pub fn perihelion_distance(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    /// `Q = a(1+e)` (AU), unbounded for `e ≥ 1`.
    pub fn aphelion_distance(&self) -> OrbitExtent {
        if self.is_bound() {
            OrbitExtent::Bounded(self.semi_major_axis * (1.0 + self.eccentricity))
        } else {
            OrbitExtent::Unbounded
        }
    }

    /// Orbital period from Kepler's third law, `P = 2π√(a³/μ)` (days), unbounded for `e ≥ 1`.
    pub fn orbital_period(&self) -> OrbitExtent {
        match self.mean_motion() {
            Some(n) => OrbitExtent::Bounded(DPI / n),
            None => OrbitExtent::Unbounded,
        }
    }

    /// Orbital period in Julian years, unbounded for `e ≥ 1`.
    pub fn orbital_period_years(&self) -> OrbitExtent {
        self.orbital_period().map(|p| p / DAYS_PER_JULIAN_YEAR)
    }

    /// Mean motion `n = √(μ/a³)` (rad/day), `None` for `e ≥ 1`.
    pub fn mean_motion(&self) -> Option<f64> {
        self.is_bound()
            .then(|| (GAUSS_GRAV_SQUARED / self.semi_major_axis.powi(3)).sqrt())
    }

    /// Mean anomaly at `t`, `M₀ + n(t - t₀)` (radians, not reduced).
    pub fn mean_anomaly_at(&self, t: JulianDate) -> Result<Radian> {
        let n = self.mean_motion().ok_or(CometPropError::UnsupportedOrbitRegime {
            eccentricity: self.eccentricity,
        })?;
        Ok(self.mean_anomaly + n * (t - self.epoch))
    }

    /// Time from `t` to the nearest perihelion passage (days).
    ///
    /// The result is negative when the body passed perihelion less than half a revolution
    /// ago, positive when the next passage is less than half a revolution ahead.
    ///
    /// Return
    /// ------
    /// * the signed delay, or [`CometPropError::UnsupportedOrbitRegime`] for `e ≥ 1`.
    pub fn time_to_perihelion(&self, t: JulianDate) -> Result<f64> {
        let m = principal_angle(self.mean_anomaly_at(t)?);
        // mean_anomaly_at already rejected unbound orbits
        let n = (GAUSS_GRAV_SQUARED / self.semi_major_axis.powi(3)).sqrt();
        if m < std::f64::consts::PI {
            Ok(-m / n)
        } else {
            Ok((DPI - m) / n)
        }
    }
}

/// [`KeplerianElements`] with angles in degrees, as exchanged at the crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementsInDegrees {
    pub epoch: JulianDate,
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination_deg: Degree,
    pub ascending_node_longitude_deg: Degree,
    pub periapsis_argument_deg: Degree,
    pub mean_anomaly_deg: Degree,
}

impl TryFrom<ElementsInDegrees> for KeplerianElements {
    type Error = CometPropError;

    fn try_from(raw: ElementsInDegrees) -> Result<Self> {
        KeplerianElements::from_degrees(
            raw.epoch,
            raw.semi_major_axis,
            raw.eccentricity,
            raw.inclination_deg,
            raw.ascending_node_longitude_deg,
            raw.periapsis_argument_deg,
            raw.mean_anomaly_deg,
        )
    }
}

impl From<KeplerianElements> for ElementsInDegrees {
    fn from(elem: KeplerianElements) -> Self {
        ElementsInDegrees {
            epoch: elem.epoch,
            semi_major_axis: elem.semi_major_axis,
            eccentricity: elem.eccentricity,
            inclination_deg: elem.inclination_deg(),
            ascending_node_longitude_deg: elem.ascending_node_longitude_deg(),
            periapsis_argument_deg: elem.periapsis_argument_deg(),
            mean_anomaly_deg: elem.mean_anomaly_deg(),
        }
    }
}

/// [`KeplerianElements`] with the stored radian angles, for exact exchange between processes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementsInRadians {
    pub epoch: JulianDate,
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: Radian,
    pub ascending_node_longitude: Radian,
    pub periapsis_argument: Radian,
    pub mean_anomaly: Radian,
}

impl TryFrom<ElementsInRadians> for KeplerianElements {
    type Error = CometPropError;

    fn try_from(raw: ElementsInRadians) -> Result<Self> {
        KeplerianElements::new(
            raw.epoch,
            raw.semi_major_axis,
            raw.eccentricity,
            raw.inclination,
            raw.ascending_node_longitude,
            raw.periapsis_argument,
            raw.mean_anomaly,
        )
    }
}

impl From<KeplerianElements> for ElementsInRadians {
    fn from(elem: KeplerianElements) -> Self {
        ElementsInRadians {
            epoch: elem.epoch,
            semi_major_axis: elem.semi_major_axis,
            eccentricity: elem.eccentricity,
            inclination: elem.inclination,
            ascending_node_longitude: elem.ascending_node_longitude,
            periapsis_argument: elem.periapsis_argument,
            mean_anomaly: elem.mean_anomaly,
        }
    }
}

impl fmt::Display for KeplerianElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Keplerian Elements @ epoch (JD): {:.6}", self.epoch)?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(
            f,
            "  a   (semi-major axis)       = {:.6} AU",
            self.semi_major_axis
        )?;
        writeln!(
            f,
            "  e   (eccentricity)          = {:.6}",
            self.eccentricity
        )?;
        writeln!(
            f,
            "  i   (inclination)           = {:.6} rad ({:.6}°)",
            self.inclination,
            self.inclination_deg()
        )?;
        writeln!(
            f,
            "  Ω   (longitude of node)     = {:.6} rad ({:.6}°)",
            self.ascending_node_longitude,
            self.ascending_node_longitude_deg()
        )?;
        writeln!(
            f,
            "  ω   (argument of perihelion)= {:.6} rad ({:.6}°)",
            self.periapsis_argument,
            self.periapsis_argument_deg()
        )?;
        writeln!(
            f,
            "  M   (mean anomaly)          = {:.6} rad ({:.6}°)",
            self.mean_anomaly,
            self.mean_anomaly_deg()
        )
    }
}

#[cfg(test)]
mod test_keplerian_element {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn halley() -> KeplerianElements {
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

    #[test]
    fn test_halley_derived_quantities() {
        let elem = halley();
        assert_relative_eq!(elem.perihelion_distance(), 0.586, epsilon = 1e-3);
        assert_relative_eq!(
            elem.aphelion_distance().bounded().unwrap(),
            35.08,
            epsilon = 1e-2
        );
        let years = elem.orbital_period_years().bounded().unwrap();
        assert!((years - 75.3).abs() < 1.0, "period = {years} yr");
    }

    #[test]
    fn test_degree_radian_boundary() {
        let elem = halley();
        assert_relative_eq!(elem.inclination(), 162.26269_f64.to_radians(), epsilon = 1e-14);
        assert_relative_eq!(elem.inclination_deg(), 162.26269, epsilon = 1e-11);
        assert_relative_eq!(elem.ascending_node_longitude_deg(), 58.42008, epsilon = 1e-11);
        assert_relative_eq!(elem.periapsis_argument_deg(), 111.33249, epsilon = 1e-11);
        assert_relative_eq!(elem.mean_anomaly_deg(), 38.861, epsilon = 1e-11);

        let radians = KeplerianElements::new(
            2449400.5,
            17.83414429,
            0.96714291,
            elem.inclination(),
            elem.ascending_node_longitude(),
            elem.periapsis_argument(),
            elem.mean_anomaly(),
        )
        .unwrap();
        assert_eq!(radians, elem);
    }

    #[test]
    fn test_serialized_form_is_in_degrees() {
        let elem = halley();
        let json = serde_json::to_value(&elem).unwrap();
        assert_relative_eq!(json["inclination_deg"].as_f64().unwrap(), 162.26269, epsilon = 1e-11);

        let back: KeplerianElements = serde_json::from_value(json).unwrap();
        assert_relative_eq!(back.inclination(), elem.inclination(), epsilon = 1e-15);
        assert_relative_eq!(back.mean_anomaly(), elem.mean_anomaly(), epsilon = 1e-15);

        let invalid = serde_json::json!({
            "epoch": 2451545.0, "semi_major_axis": 1.0, "eccentricity": -0.5,
            "inclination_deg": 0.0, "ascending_node_longitude_deg": 0.0,
            "periapsis_argument_deg": 0.0, "mean_anomaly_deg": 0.0
        });
        assert!(serde_json::from_value::<KeplerianElements>(invalid).is_err());
    }

    #[test]
    fn test_unbounded_regime() {
        let hyperbolic =
            KeplerianElements::from_perihelion(1.2, 1.05, 40.0, 10.0, 20.0, 2460000.5).unwrap();
        assert_relative_eq!(hyperbolic.perihelion_distance(), 1.2, epsilon = 1e-12);
        assert!(hyperbolic.semi_major_axis() < 0.0);
        assert_eq!(hyperbolic.aphelion_distance(), OrbitExtent::Unbounded);
        assert_eq!(hyperbolic.orbital_period(), OrbitExtent::Unbounded);
        assert_eq!(hyperbolic.mean_motion(), None);
        assert_eq!(
            hyperbolic.time_to_perihelion(2460000.5),
            Err(CometPropError::UnsupportedOrbitRegime { eccentricity: 1.05 })
        );

        assert_eq!(
            KeplerianElements::from_perihelion(1.2, 1.0, 40.0, 10.0, 20.0, 2460000.5),
            Err(CometPropError::UnsupportedOrbitRegime { eccentricity: 1.0 })
        );
    }

    #[test]
    fn test_invalid_elements() {
        assert!(KeplerianElements::new(2451545.0, -1.0, 0.5, 0.0, 0.0, 0.0, 0.0).is_err());
        assert!(KeplerianElements::new(2451545.0, 1.0, -0.1, 0.0, 0.0, 0.0, 0.0).is_err());
        assert!(KeplerianElements::new(2451545.0, 1.0, 0.1, f64::NAN, 0.0, 0.0, 0.0).is_err());
        assert!(KeplerianElements::new(2451545.0, 0.0, 0.1, 0.0, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_perihelion_form() {
        let elem =
            KeplerianElements::from_perihelion(0.5, 0.9, 10.0, 20.0, 30.0, 2455000.5).unwrap();
        assert_relative_eq!(elem.semi_major_axis(), 5.0, epsilon = 1e-12);
        assert_eq!(elem.mean_anomaly(), 0.0);
        assert_eq!(elem.epoch(), 2455000.5);
        assert_relative_eq!(elem.time_to_perihelion(2455000.5).unwrap(), 0.0);
    }

    #[test]
    fn test_time_to_perihelion_sign() {
        let elem = KeplerianElements::from_degrees(2451545.0, 1.0, 0.1, 0.0, 0.0, 0.0, 0.0).unwrap();
        let period = elem.orbital_period().bounded().unwrap();

        // A quarter period after perihelion: it was a quarter period ago
        let dt = elem.time_to_perihelion(2451545.0 + 0.25 * period).unwrap();
        assert_relative_eq!(dt, -0.25 * period, epsilon = 1e-8);

        // Three quarters after: next passage in a quarter period
        let dt = elem.time_to_perihelion(2451545.0 + 0.75 * period).unwrap();
        assert_relative_eq!(dt, 0.25 * period, epsilon = 1e-8);
    }

    #[test]
    fn test_inverse_transform_is_unsupported() {
        let state = StateVector::new(
            nalgebra::Vector3::new(1.0, 0.0, 0.0),
            nalgebra::Vector3::new(0.0, 0.0172, 0.0),
            2451545.0,
        );
        assert!(matches!(
            KeplerianElements::from_state_vector(&state),
            StateConversion::Unsupported(_)
        ));
    }

    #[test]
    fn test_display() {
        let text = format!("{}", halley());
        assert!(text.contains("Keplerian Elements @ epoch (JD): 2449400.500000"));
        assert!(text.contains("162.262690°"));
    }
}
