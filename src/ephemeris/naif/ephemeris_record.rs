//! Chebyshev record of a type 2 SPK segment.
//!
//! Each record holds, as little-endian `f64`:
//! 1. `mid`, the record midpoint (ET seconds past J2000),
//! 2. `radius`, the half-span (seconds),
//! 3. `ncoeff` coefficients for X, then Y, then Z (km).
//!
//! The normalized time is `t = (et - mid) / radius`, clamped to `[-1, 1]`.
use nalgebra::Vector3;
use nom::{multi::count, number::complete::le_f64, IResult, Parser};

#[derive(Debug, Clone, PartialEq)]
pub struct EphemerisRecord {
    pub mid: f64,
    pub radius: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl EphemerisRecord {
    /// Decode one record.
    ///
    /// Arguments
    /// -----------------
    /// * `input`: bytes positioned at the start of the record.
    /// * `ncoeff`: number of Chebyshev coefficients per axis.
    pub fn parse(input: &[u8], ncoeff: usize) -> IResult<&[u8], Self> {
        let (input, mid) = le_f64(input)?;
        let (input, radius) = le_f64(input)?;
        let (input, x) = count(le_f64, ncoeff).parse(input)?;
        let (input, y) = count(le_f64, ncoeff).parse(input)?;
        let (input, z) = count(le_f64, ncoeff).parse(input)?;
        Ok((
            input,
            EphemerisRecord {
                mid,
                radius,
                x,
                y,
                z,
            },
        ))
    }

    /// Position (km) at `ephem_time` (ET seconds), in the segment frame.
    ///
    /// Uses the recurrence `T_0 = 1`, `T_1 = t`, `T_n = 2 t T_{n-1} - T_{n-2}`.
    pub fn position(&self, ephem_time: f64) -> Vector3<f64> {
        let t = ((ephem_time - self.mid) / self.radius).clamp(-1.0, 1.0);

        let n = self.x.len();
        let mut chebyshev = vec![0.0; n.max(1)];
        chebyshev[0] = 1.0;
        if n > 1 {
            chebyshev[1] = t;
            for degree in 2..n {
                chebyshev[degree] = 2.0 * t * chebyshev[degree - 1] - chebyshev[degree - 2];
            }
        }

        let series = |coefficients: &[f64]| -> f64 {
            coefficients
                .iter()
                .zip(&chebyshev)
                .map(|(c, p)| c * p)
                .sum()
        };
        Vector3::new(series(&self.x), series(&self.y), series(&self.z))
    }
}

#[cfg(test)]
mod test_ephemeris_record {
    use super::*;

    fn encode(words: &[f64]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_parse_and_evaluate() {
        // x = 10 + 2t + 3T2(t), y = -4, z = t
        let bytes = encode(&[
            100.0, 50.0, //
            10.0, 2.0, 3.0, //
            -4.0, 0.0, 0.0, //
            0.0, 1.0, 0.0,
        ]);
        let (rest, record) = EphemerisRecord::parse(&bytes, 3).unwrap();
        assert!(rest.is_empty());
        assert_eq!(record.mid, 100.0);
        assert_eq!(record.radius, 50.0);

        // t = 0.5, T2 = 2 * 0.25 - 1 = -0.5
        let p = record.position(125.0);
        assert!((p.x - (10.0 + 1.0 - 1.5)).abs() < 1e-12);
        assert_eq!(p.y, -4.0);
        assert!((p.z - 0.5).abs() < 1e-12);

        // clamped outside the record span
        assert_eq!(record.position(1000.0), record.position(150.0));
    }

    #[test]
    fn test_truncated_record() {
        let bytes = encode(&[0.0, 1.0, 1.0, 2.0]);
        assert!(EphemerisRecord::parse(&bytes, 3).is_err());
    }
}
