//! # Precise planet positions from JPL SPK kernels
//!
//! Reads binary DAF/SPK kernels with Chebyshev (type 2) segments, such as the DE440
//! planetary ephemeris, and answers heliocentric ecliptic positions of the planetary
//! barycenters.
//!
//! ## Layout
//! * [`daf_header`] – file record (ND/NI, pointer to the first summary record).
//! * [`summary_record`] – segment descriptors (target, center, frame, coverage, addresses).
//! * [`directory`] – per-segment footer (record span, size, count).
//! * [`ephemeris_record`] – one Chebyshev record and its evaluation.
//! * [`spk_kernel`] – the indexed kernel.
//!
//! A heliocentric position is `planet barycenter − Sun`, both relative to the solar-system
//! barycenter (NAIF id 0), converted from km to AU and rotated to the J2000 ecliptic when
//! the segment is equatorial.
//!
//! Any lookup that the kernel cannot serve (missing body, time outside the coverage,
//! kernel not loadable) answers
//! [`CometPropError::EphemerisUnavailable`], so callers can fall back to another source.
pub mod daf_header;
pub mod directory;
pub mod ephemeris_record;
pub mod spk_kernel;
pub mod summary_record;

use camino::{Utf8Path, Utf8PathBuf};
use nalgebra::Vector3;
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::{JulianDate, AU};
use crate::time::{et_seconds_to_jd, jd_to_et_seconds};

use super::{EphemerisSource, Planet, PlanetPositionProvider};

pub use spk_kernel::SpkKernel;

/// NAIF id of the solar-system barycenter.
pub const SOLAR_SYSTEM_BARYCENTER: i32 = 0;
/// NAIF id of the Sun.
pub const SUN: i32 = 10;

/// Precise provider backed by a loaded SPK kernel.
#[derive(Debug)]
pub struct NaifEphemeris {
    kernel: SpkKernel,
}

impl NaifEphemeris {
    pub fn new(kernel: SpkKernel) -> Self {
        NaifEphemeris { kernel }
    }

    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        Ok(NaifEphemeris {
            kernel: SpkKernel::from_file(path)?,
        })
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Ok(NaifEphemeris {
            kernel: SpkKernel::from_bytes(data)?,
        })
    }

    /// Defer loading of the kernel at `path` to the first lookup.
    pub fn lazy(path: Utf8PathBuf) -> LazyNaifEphemeris {
        LazyNaifEphemeris::new(path)
    }

    pub fn kernel(&self) -> &SpkKernel {
        &self.kernel
    }

    /// Barycentric ecliptic position (km) of a NAIF body.
    fn barycentric(&self, naif_id: i32, body: &str, jd: JulianDate) -> Result<Vector3<f64>> {
        let et = jd_to_et_seconds(jd);
        match self
            .kernel
            .ecliptic_position(naif_id, SOLAR_SYSTEM_BARYCENTER, et)?
        {
            Some(position) => Ok(position),
            None => {
                let reason = match self.kernel.coverage(naif_id, SOLAR_SYSTEM_BARYCENTER) {
                    Some((start, end)) => format!(
                        "kernel covers JD {:.1} to {:.1} for NAIF id {naif_id}",
                        et_seconds_to_jd(start),
                        et_seconds_to_jd(end)
                    ),
                    None => format!("kernel has no segment for NAIF id {naif_id}"),
                };
                Err(CometPropError::EphemerisUnavailable {
                    body: body.to_string(),
                    jd,
                    reason,
                })
            }
        }
    }
}

impl PlanetPositionProvider for NaifEphemeris {
    fn position(&self, planet: Planet, jd: JulianDate) -> Result<Vector3<f64>> {
        let body = self.barycentric(planet.to_id(), &planet.to_string(), jd)?;
        let sun = self.barycentric(SUN, "Sun", jd)?;
        Ok((body - sun) / AU)
    }

    fn source(&self) -> EphemerisSource {
        EphemerisSource::Precise
    }
}

/// A [`NaifEphemeris`] loaded on first use.
///
/// The load is attempted once. A failure is logged and remembered: every later lookup
/// answers [`CometPropError::EphemerisUnavailable`] without touching the file again.
#[derive(Debug)]
pub struct LazyNaifEphemeris {
    path: Utf8PathBuf,
    loaded: OnceCell<std::result::Result<NaifEphemeris, String>>,
}

impl LazyNaifEphemeris {
    pub fn new(path: Utf8PathBuf) -> Self {
        LazyNaifEphemeris {
            path,
            loaded: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Whether the kernel was loaded; `None` before the first lookup.
    pub fn is_loaded(&self) -> Option<bool> {
        self.loaded.get().map(|state| state.is_ok())
    }

    fn get(&self) -> &std::result::Result<NaifEphemeris, String> {
        self.loaded
            .get_or_init(|| match NaifEphemeris::from_file(&self.path) {
                Ok(ephemeris) => {
                    info!(
                        path = %self.path,
                        segments = ephemeris.kernel().segments().len(),
                        "SPK kernel loaded"
                    );
                    Ok(ephemeris)
                }
                Err(err) => {
                    warn!(path = %self.path, %err, "cannot load SPK kernel, precise positions disabled");
                    Err(err.to_string())
                }
            })
    }
}

impl PlanetPositionProvider for LazyNaifEphemeris {
    fn position(&self, planet: Planet, jd: JulianDate) -> Result<Vector3<f64>> {
        match self.get() {
            Ok(ephemeris) => ephemeris.position(planet, jd),
            Err(reason) => Err(CometPropError::EphemerisUnavailable {
                body: planet.to_string(),
                jd,
                reason: format!("kernel {} not loaded: {reason}", self.path),
            }),
        }
    }

    fn source(&self) -> EphemerisSource {
        EphemerisSource::Precise
    }
}


#[cfg(test)]
mod test_naif_ephemeris {
    use super::spk_kernel::{FRAME_ECLIPJ2000, FRAME_J2000};
    use super::test_kernel::{write_kernel, LinearSegment};
    use super::*;
    use crate::constants::J2000_JD;
    use std::io::Write;

    fn segments() -> Vec<LinearSegment> {
        vec![
            LinearSegment::new(SUN, FRAME_ECLIPJ2000, [1.0e5, -2.0e5, 5.0e4], [1.0e-2, 0.0, 0.0]),
            LinearSegment::new(5, FRAME_ECLIPJ2000, [5.2 * AU, 0.0, 0.0], [0.0, 13.0, 0.1]),
            LinearSegment::new(3, FRAME_J2000, [0.0, 0.0, AU], [0.0, 0.0, 0.0]),
        ]
    }

    #[test]
    fn test_heliocentric_position() {
        let segments = segments();
        let kernel = SpkKernel::from_bytes(write_kernel(&segments)).unwrap();
        let eph = NaifEphemeris::new(kernel);
        assert_eq!(eph.source(), EphemerisSource::Precise);

        let jd = J2000_JD + 1.5;
        let et = jd_to_et_seconds(jd);
        let expected = (segments[1].position(et) - segments[0].position(et)) / AU;
        let jupiter = eph.position(Planet::Jupiter, jd).unwrap();
        assert!((jupiter - expected).norm() < 1e-12, "{jupiter} != {expected}");

        // equatorial segment, rotated before the Sun is subtracted
        let eps = crate::ref_system::obliquity_j2000();
        let expected = Vector3::new(0.0, eps.sin(), eps.cos()) - segments[0].position(et) / AU;
        let emb = eph.position(Planet::EarthMoon, jd).unwrap();
        assert!((emb - expected).norm() < 1e-12);
    }

    #[test]
    fn test_unavailable_positions() {
        let eph = NaifEphemeris::from_bytes(write_kernel(&segments())).unwrap();

        let err = eph.position(Planet::Jupiter, J2000_JD + 30.0).unwrap_err();
        assert_eq!(err.kind(), crate::cometprop_errors::ErrorKind::EphemerisUnavailable);
        assert!(err.to_string().contains("kernel covers"));

        let err = eph.position(Planet::Saturn, J2000_JD).unwrap_err();
        assert!(err.to_string().contains("no segment for NAIF id 6"));
    }

    #[test]
    fn test_corrupted_record_size_is_rejected() {
        let mut bytes = write_kernel(&segments());
        // rsize word of the Sun segment footer: records start at word 385, 5 records of 11 words
        let offset = (384 + 5 * 11 + 2) * 8;
        bytes[offset..offset + 8].copy_from_slice(&1.0e30f64.to_le_bytes());

        let err = NaifEphemeris::from_bytes(bytes).unwrap_err();
        assert_eq!(err.kind(), crate::cometprop_errors::ErrorKind::Ephemeris);
    }

    #[test]
    fn test_lazy_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&write_kernel(&segments())).unwrap();
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).unwrap();

        let lazy = NaifEphemeris::lazy(path);
        assert_eq!(lazy.is_loaded(), None);
        assert!(lazy.position(Planet::Jupiter, J2000_JD).is_ok());
        assert_eq!(lazy.is_loaded(), Some(true));

        let missing = LazyNaifEphemeris::new("missing/de440.bsp".into());
        for _ in 0..2 {
            let err = missing.position(Planet::Jupiter, J2000_JD).unwrap_err();
            assert_eq!(err.kind(), crate::cometprop_errors::ErrorKind::EphemerisUnavailable);
        }
        assert_eq!(missing.is_loaded(), Some(false));
    }
}
