//! Directory footer of a type 2 SPK segment.
//!
//! The last four words of a Chebyshev segment give the time of the first record, the
//! record span, the record size (in double-precision words, not bytes) and the record
//! count. A DAF address counts 8-byte words from 1, so the footer starts at byte
//! `(final_addr - 4) * 8`.
use std::fmt;

use hifitime::{Duration, Epoch};
use nom::{number::complete::le_f64, IResult};

use crate::cometprop_errors::{CometPropError, Result};

#[derive(Debug, PartialEq, Clone)]
pub struct DirectoryData {
    /// Start of the first record, ET seconds past J2000.
    pub init: f64,
    /// Time span of each record, in seconds.
    pub intlen: f64,
    /// Record size in double-precision words.
    pub rsize: usize,
    pub n_records: usize,
}

/// A word count stored as a double: finite, whole, and no larger than `capacity`.
fn word_count(value: f64, capacity: usize) -> Option<usize> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= capacity as f64)
        .then_some(value as usize)
}

impl DirectoryData {
    fn parse_words(input: &[u8]) -> IResult<&[u8], [f64; 4]> {
        let (input, init) = le_f64(input)?;
        let (input, intlen) = le_f64(input)?;
        let (input, rsize) = le_f64(input)?;
        let (input, n_records) = le_f64(input)?;
        Ok((input, [init, intlen, rsize, n_records]))
    }

    /// Read the footer of the segment ending at `final_addr`.
    ///
    /// Arguments
    /// -----------------
    /// * `data`: the whole kernel.
    /// * `final_addr`: last word of the segment (1-based DAF address).
    ///
    /// Return
    /// ----------
    /// * The footer, or an error if it lies outside `data` or describes an empty segment.
    pub fn parse(data: &[u8], final_addr: usize) -> Result<Self> {
        let malformed = |detail: String| {
            CometPropError::NomParsingError(format!(
                "malformed segment directory at word {final_addr}: {detail}"
            ))
        };

        let start = final_addr
            .checked_sub(4)
            .and_then(|word| word.checked_mul(8))
            .filter(|start| start.checked_add(32).is_some_and(|end| end <= data.len()))
            .ok_or_else(|| {
                CometPropError::NomParsingError(format!(
                    "segment directory at word {final_addr} is outside the kernel"
                ))
            })?;

        let (_, [init, intlen, rsize, n_records]) = Self::parse_words(&data[start..start + 32])?;
        if !init.is_finite() || !intlen.is_finite() || intlen <= 0.0 {
            return Err(malformed(format!("init = {init}, intlen = {intlen}")));
        }

        let capacity = data.len() / 8;
        let (Some(rsize), Some(n_records)) =
            (word_count(rsize, capacity), word_count(n_records, capacity))
        else {
            return Err(malformed(format!("rsize = {rsize}, n_records = {n_records}")));
        };
        if rsize < 5 || n_records == 0 {
            return Err(malformed(format!("rsize = {rsize}, n_records = {n_records}")));
        }
        // all records lie before the footer
        if rsize
            .checked_mul(n_records)
            .map_or(true, |words| words > start / 8)
        {
            return Err(malformed(format!(
                "{n_records} records of {rsize} words do not fit before the footer"
            )));
        }

        Ok(DirectoryData {
            init,
            intlen,
            rsize,
            n_records,
        })
    }

    /// Index of the record covering `et`, clamped to the available records.
    pub fn record_index(&self, et: f64) -> usize {
        let index = ((et - self.init) / self.intlen).floor();
        if index <= 0.0 {
            0
        } else {
            (index as usize).min(self.n_records - 1)
        }
    }

    /// Number of Chebyshev coefficients per axis.
    pub fn n_coefficients(&self) -> usize {
        (self.rsize - 2) / 3
    }
}

impl fmt::Display for DirectoryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let init_epoch = Epoch::from_et_seconds(self.init);
        let duration = Duration::from_seconds(self.intlen);

        writeln!(f, "+-----------------+---------------------------------+")?;
        writeln!(f, "| Init epoch      | {init_epoch:<31} |")?;
        writeln!(f, "| Interval length | {:<31} |", duration.to_string())?;
        writeln!(f, "| Record size     | {:<31} |", self.rsize)?;
        writeln!(f, "| Records         | {:<31} |", self.n_records)?;
        writeln!(f, "+-----------------+---------------------------------+")
    }
}

#[cfg(test)]
mod test_directory {
    use super::*;

    /// `padding` zero words followed by the four footer words.
    fn kernel_with_footer(padding: usize, words: [f64; 4]) -> Vec<u8> {
        let mut data = vec![0u8; 8 * padding];
        for w in words {
            data.extend_from_slice(&w.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_parse_directory() {
        // 4 records of 11 words, footer at words 45..=48
        let data = kernel_with_footer(44, [-3200.0, 1600.0, 11.0, 4.0]);
        let dir = DirectoryData::parse(&data, 48).unwrap();
        assert_eq!(
            dir,
            DirectoryData {
                init: -3200.0,
                intlen: 1600.0,
                rsize: 11,
                n_records: 4
            }
        );
        assert_eq!(dir.n_coefficients(), 3);
        assert_eq!(dir.record_index(-1e6), 0);
        assert_eq!(dir.record_index(-1600.0), 1);
        assert_eq!(dir.record_index(3199.0), 3);
        assert_eq!(dir.record_index(1e6), 3);
    }

    #[test]
    fn test_directory_out_of_bounds() {
        let data = kernel_with_footer(11, [0.0, 1.0, 11.0, 1.0]);
        assert!(DirectoryData::parse(&data, 15).is_ok());
        assert!(DirectoryData::parse(&data, 16).is_err());
        assert!(DirectoryData::parse(&data, 2).is_err());
    }

    #[test]
    fn test_directory_empty_segment() {
        let data = kernel_with_footer(2, [0.0, 1.0, 11.0, 0.0]);
        assert!(DirectoryData::parse(&data, 6).is_err());
    }

    #[test]
    fn test_directory_corrupted_words() {
        let data = kernel_with_footer(2, [0.0, 1.0, 1.0e30, 1.0]);
        assert!(DirectoryData::parse(&data, 6).is_err());
        let data = kernel_with_footer(2, [0.0, 1.0, 11.0, 1.0e30]);
        assert!(DirectoryData::parse(&data, 6).is_err());
        let data = kernel_with_footer(2, [0.0, 1.0, -11.0, 1.0]);
        assert!(DirectoryData::parse(&data, 6).is_err());
        let data = kernel_with_footer(2, [0.0, 1.0, 11.5, 1.0]);
        assert!(DirectoryData::parse(&data, 6).is_err());
        let data = kernel_with_footer(2, [0.0, f64::NAN, 11.0, 1.0]);
        assert!(DirectoryData::parse(&data, 6).is_err());

        // a whole record does not fit in the two words before the footer
        let data = kernel_with_footer(2, [0.0, 1.0, 5.0, 1.0]);
        assert!(DirectoryData::parse(&data, 6).is_err());
        assert!(DirectoryData::parse(&data, usize::MAX).is_err());
    }
}
