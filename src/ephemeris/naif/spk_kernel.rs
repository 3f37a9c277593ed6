//! In-memory SPK kernel: file record, segment table and on-demand record decoding.
use std::fmt;

use camino::Utf8Path;
use nalgebra::Vector3;
use tracing::warn;

use crate::cometprop_errors::{CometPropError, Result};
use crate::ref_system::equatorial_to_ecliptic;

use super::{
    daf_header::{DAFHeader, DAF_RECORD_BYTES},
    directory::DirectoryData,
    ephemeris_record::EphemerisRecord,
    summary_record::{Summary, SummaryRecordHeader},
};

/// NAIF frame code of the J2000 equatorial frame.
pub const FRAME_J2000: i32 = 1;
/// NAIF frame code of the J2000 ecliptic frame.
pub const FRAME_ECLIPJ2000: i32 = 17;

/// Chebyshev position-only segments, the layout of the DE4xx planetary kernels.
const SPK_TYPE_CHEBYSHEV: i32 = 2;

/// Upper bound on the summary-record chain, against corrupted forward links.
const MAX_SUMMARY_RECORDS: usize = 100_000;

/// One segment of the kernel with its decoded directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SpkSegment {
    pub summary: Summary,
    pub directory: DirectoryData,
}

impl SpkSegment {
    /// Decode the record covering `et` from the kernel bytes.
    fn record(&self, data: &[u8], et: f64) -> Result<EphemerisRecord> {
        let rsize = self.directory.rsize;
        let index = self.directory.record_index(et);
        let outside = || {
            CometPropError::NomParsingError(format!(
                "record {index} of segment {}/{} is outside the kernel",
                self.summary.target, self.summary.center
            ))
        };

        let first_word = usize::try_from(self.summary.initial_addr)
            .ok()
            .and_then(|addr| addr.checked_sub(1))
            .and_then(|word| word.checked_add(index.checked_mul(rsize)?))
            .ok_or_else(outside)?;
        let start = first_word.checked_mul(8).ok_or_else(outside)?;
        let end = rsize
            .checked_mul(8)
            .and_then(|len| start.checked_add(len))
            .ok_or_else(outside)?;
        let bytes = data.get(start..end).ok_or_else(outside)?;
        let (_, record) = EphemerisRecord::parse(bytes, self.directory.n_coefficients())?;
        Ok(record)
    }
}

/// A type 2 SPK kernel held in memory.
pub struct SpkKernel {
    header: DAFHeader,
    segments: Vec<SpkSegment>,
    data: Vec<u8>,
}

impl SpkKernel {
    /// Read and index a kernel file.
    ///
    /// See also
    /// ------------
    /// * [`SpkKernel::from_bytes`]
    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Index a kernel already in memory.
    ///
    /// The summary records are followed from the file record's forward pointer. Segments in
    /// a frame other than J2000 equatorial or ecliptic are skipped with a warning.
    ///
    /// Return
    /// ----------
    /// * The kernel, [`CometPropError::InvalidSpkDataType`] if a segment is not of type 2,
    ///   or [`CometPropError::NomParsingError`] if the layout is malformed.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let (_, header) = DAFHeader::parse(&data)?;
        if header.locfmt != "LTL-IEEE" {
            return Err(CometPropError::NomParsingError(format!(
                "unsupported binary format '{}'",
                header.locfmt
            )));
        }
        if header.nd != 2 || header.ni != 6 {
            return Err(CometPropError::NomParsingError(format!(
                "not an SPK summary layout (ND = {}, NI = {})",
                header.nd, header.ni
            )));
        }

        let mut segments = Vec::new();
        let mut record_number = usize::try_from(header.fward).map_err(|_| {
            CometPropError::NomParsingError(format!(
                "invalid first summary record {}",
                header.fward
            ))
        })?;
        let mut visited = 0;
        while record_number != 0 {
            visited += 1;
            if visited > MAX_SUMMARY_RECORDS {
                return Err(CometPropError::NomParsingError(
                    "summary record chain does not terminate".into(),
                ));
            }

            let record = (record_number - 1)
                .checked_mul(DAF_RECORD_BYTES)
                .and_then(|offset| data.get(offset..offset.checked_add(DAF_RECORD_BYTES)?))
                .ok_or_else(|| {
                    CometPropError::NomParsingError(format!(
                        "summary record {record_number} is outside the kernel"
                    ))
                })?;
            let (mut input, record_header) = SummaryRecordHeader::parse(record)?;

            for _ in 0..record_header.n_summaries {
                let (rest, summary) = Summary::parse(input)?;
                input = rest;

                if summary.data_type != SPK_TYPE_CHEBYSHEV {
                    return Err(CometPropError::InvalidSpkDataType(summary.data_type));
                }
                if summary.frame_id != FRAME_J2000 && summary.frame_id != FRAME_ECLIPJ2000 {
                    warn!(
                        target_id = summary.target,
                        frame = summary.frame_id,
                        "skipping SPK segment in unsupported frame"
                    );
                    continue;
                }
                if summary.initial_addr < 1 || summary.final_addr < summary.initial_addr {
                    return Err(CometPropError::NomParsingError(format!(
                        "segment {}/{} has invalid addresses {}..{}",
                        summary.target, summary.center, summary.initial_addr, summary.final_addr
                    )));
                }
                let directory = DirectoryData::parse(&data, summary.final_addr as usize)?;
                segments.push(SpkSegment { summary, directory });
            }
            record_number = record_header.next;
        }

        Ok(SpkKernel {
            header,
            segments,
            data,
        })
    }

    pub fn header(&self) -> &DAFHeader {
        &self.header
    }

    pub fn segments(&self) -> &[SpkSegment] {
        &self.segments
    }

    /// Segment of `target` relative to `center` covering `et`.
    ///
    /// Later segments take precedence over earlier ones, as in SPICE.
    pub fn segment(&self, target: i32, center: i32, et: f64) -> Option<&SpkSegment> {
        self.segments.iter().rev().find(|segment| {
            segment.summary.target == target
                && segment.summary.center == center
                && segment.summary.covers(et)
        })
    }

    /// Overall time span covered for the pair, in ET seconds.
    pub fn coverage(&self, target: i32, center: i32) -> Option<(f64, f64)> {
        self.segments
            .iter()
            .filter(|s| s.summary.target == target && s.summary.center == center)
            .map(|s| (s.summary.start_epoch, s.summary.end_epoch))
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
    }

    /// Position of `target` relative to `center` at `et`, in km, ecliptic J2000.
    ///
    /// Return
    /// ----------
    /// * `Ok(None)` when no segment covers the request.
    pub fn ecliptic_position(
        &self,
        target: i32,
        center: i32,
        et: f64,
    ) -> Result<Option<Vector3<f64>>> {
        let Some(segment) = self.segment(target, center, et) else {
            return Ok(None);
        };
        let position = segment.record(&self.data, et)?.position(et);
        Ok(Some(match segment.summary.frame_id {
            FRAME_J2000 => equatorial_to_ecliptic() * position,
            _ => position,
        }))
    }
}

impl fmt::Debug for SpkKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpkKernel")
            .field("header", &self.header)
            .field("segments", &self.segments.len())
            .field("bytes", &self.data.len())
            .finish()
    }
}
