use nalgebra::{Matrix3, Matrix3x2, Rotation3, Vector3};

use crate::constants::{Radian, OBLIQUITY_J2000_ARCSEC, RADSEC};

/// Mean obliquity of the ecliptic at J2000, in radians.
pub fn obliquity_j2000() -> Radian {
    OBLIQUITY_J2000_ARCSEC * RADSEC
}

/// Construct a right-handed 3×3 rotation matrix around one of the principal axes (X, Y, or Z).
///
/// The matrix represents an **active rotation** of a vector by `alpha` in the direct
/// (counter-clockwise) sense around the chosen axis.
///
/// # Arguments
///
/// * `alpha` - Rotation angle in **radians**.
/// * `k` - Index of the axis of rotation: `0` → X, `1` → Y, any other value → Z.
///
/// # Returns
///
/// A 3×3 orthonormal rotation matrix `R` such that the rotated vector is `x' = R · x`.
pub fn rotmt(alpha: f64, k: usize) -> Matrix3<f64> {
    let axis = match k {
        0 => Vector3::x_axis(),
        1 => Vector3::y_axis(),
        _ => Vector3::z_axis(),
    };

    Rotation3::from_axis_angle(&axis, alpha).into()
}

/// Rotation taking J2000 **equatorial** coordinates to J2000 **ecliptic** coordinates.
///
/// This is a rotation of `-ε` around the X axis, `ε` being the J2000 mean obliquity.
pub fn equatorial_to_ecliptic() -> Matrix3<f64> {
    rotmt(-obliquity_j2000(), 0)
}

/// Rotation taking J2000 **ecliptic** coordinates to J2000 **equatorial** coordinates.
pub fn ecliptic_to_equatorial() -> Matrix3<f64> {
    rotmt(obliquity_j2000(), 0)
}

/// Perifocal (orbital plane) → reference frame transform, restricted to the plane.
///
/// The perifocal frame has its X axis toward perihelion and its Y axis 90° ahead in the
/// direction of motion. The full rotation is `Rz(Ω)·Rx(i)·Rz(ω)`; since in-plane vectors
/// have no Z component only its first two columns are kept:
///
/// ```text
/// | cosΩ cosω − sinΩ sinω cos i    −cosΩ sinω − sinΩ cosω cos i |
/// | sinΩ cosω + cosΩ sinω cos i    −sinΩ sinω + cosΩ cosω cos i |
/// | sinω sin i                      cosω sin i                  |
/// ```
///
/// Arguments
/// ---------
/// * `ascending_node_longitude`: Ω (radians).
/// * `inclination`: i (radians).
/// * `periapsis_argument`: ω (radians).
pub fn perifocal_to_reference(
    ascending_node_longitude: Radian,
    inclination: Radian,
    periapsis_argument: Radian,
) -> Matrix3x2<f64> {
    let (sin_node, cos_node) = ascending_node_longitude.sin_cos();
    let (sin_incl, cos_incl) = inclination.sin_cos();
    let (sin_peri, cos_peri) = periapsis_argument.sin_cos();

    Matrix3x2::new(
        cos_node * cos_peri - sin_node * sin_peri * cos_incl,
        -cos_node * sin_peri - sin_node * cos_peri * cos_incl,
        sin_node * cos_peri + cos_node * sin_peri * cos_incl,
        -sin_node * sin_peri + cos_node * cos_peri * cos_incl,
        sin_peri * sin_incl,
        cos_peri * sin_incl,
    )
}

#[cfg(test)]
mod ref_system_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rotmt_orthonormal() {
        let rot = rotmt(0.3, 2);
        assert_relative_eq!(rot * rot.transpose(), Matrix3::identity(), epsilon = 1e-15);
        let v = rot * Vector3::x();
        assert_relative_eq!(v, Vector3::new(0.3_f64.cos(), 0.3_f64.sin(), 0.0), epsilon = 1e-15);
    }

    #[test]
    fn test_equator_ecliptic_roundtrip() {
        let v = Vector3::new(0.3, -1.2, 0.7);
        let back = ecliptic_to_equatorial() * (equatorial_to_ecliptic() * v);
        assert_relative_eq!(back, v, epsilon = 1e-14);

        // The celestial pole sits at ecliptic longitude 90°, latitude 90° - ε
        let pole = equatorial_to_ecliptic() * Vector3::z();
        assert_relative_eq!(pole.y, obliquity_j2000().sin(), epsilon = 1e-15);
        assert_relative_eq!(pole.z, obliquity_j2000().cos(), epsilon = 1e-15);
    }

    #[test]
    fn test_perifocal_matches_composed_rotation() {
        let (node, incl, peri) = (1.1, 0.4, 2.3);
        let full = rotmt(node, 2) * rotmt(incl, 0) * rotmt(peri, 2);
        let plane = perifocal_to_reference(node, incl, peri);
        assert_relative_eq!(plane, full.fixed_columns::<2>(0).into_owned(), epsilon = 1e-14);
    }
}
