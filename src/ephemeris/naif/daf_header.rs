//! DAF (Double Precision Array File) file record.
//!
//! The first 1024-byte record of an SPK kernel describes the layout of the array
//! summaries (`nd` doubles and `ni` integers each) and points to the first summary
//! record (`fward`). Only little-endian (`LTL-IEEE`) kernels are supported, which is the
//! format JPL distributes.
use nom::{bytes::complete::take, number::complete::le_i32, IResult, Parser};
use std::fmt;

/// Size of a DAF record in bytes.
pub const DAF_RECORD_BYTES: usize = 1024;

/// In-memory representation of the DAF/SPK file record.
#[derive(Debug, PartialEq, Clone)]
pub struct DAFHeader {
    /// 8-byte identifier, typically `"DAF/SPK"`.
    pub idword: String,
    /// Internal kernel name.
    pub internal_filename: String,
    /// Number of double-precision components in each summary (ND).
    pub nd: i32,
    /// Number of integer components in each summary (NI).
    pub ni: i32,
    /// Record number of the first summary record.
    pub fward: i32,
    /// Record number of the last summary record.
    pub bward: i32,
    /// First free address (in double-precision words, 1-based).
    pub free: i32,
    /// Binary format tag (`"LTL-IEEE"` or `"BIG-IEEE"`).
    pub locfmt: String,
}

impl DAFHeader {
    /// Parse the first DAF record.
    ///
    /// Arguments
    /// -----------------
    /// * `input`: the file bytes, at least 1024 long.
    ///
    /// Return
    /// ----------
    /// * `(remaining, header)` with trailing spaces removed from the text fields.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, id_word) = take(8usize).parse(input)?;
        let (input, nd) = le_i32(input)?;
        let (input, ni) = le_i32(input)?;
        let (input, ifname) = take(60usize).parse(input)?;
        let (input, fward) = le_i32(input)?;
        let (input, bward) = le_i32(input)?;
        let (input, free) = le_i32(input)?;
        let (input, locfmt) = take(8usize).parse(input)?;
        // reserved area and FTP validation string
        let (input, _) = take(603usize + 28).parse(input)?;
        Ok((
            input,
            DAFHeader {
                idword: String::from_utf8_lossy(id_word).trim().to_string(),
                internal_filename: String::from_utf8_lossy(ifname).trim().to_string(),
                nd,
                ni,
                fward,
                bward,
                free,
                locfmt: String::from_utf8_lossy(locfmt).trim().to_string(),
            },
        ))
    }

    /// Size of one array summary, in double-precision words: `ND + ⌈NI/2⌉`.
    pub fn summary_words(&self) -> usize {
        self.nd as usize + (self.ni as usize).div_ceil(2)
    }
}

impl fmt::Display for DAFHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LABEL_WIDTH: usize = 14;
        const VALUE_WIDTH: usize = 30;

        let border = format!(
            "+{:-<label$}+{:-<value$}+",
            "",
            "",
            label = LABEL_WIDTH + 1,
            value = VALUE_WIDTH + 1
        );
        let rows = [
            ("ID Word", self.idword.clone()),
            ("Internal Name", self.internal_filename.clone()),
            ("ND / NI", format!("{} / {}", self.nd, self.ni)),
            ("Summaries", format!("records {} .. {}", self.fward, self.bward)),
            ("Free Addr", self.free.to_string()),
            ("Binary Format", self.locfmt.clone()),
        ];

        writeln!(f, "{border}")?;
        for (label, value) in rows {
            writeln!(
                f,
                "| {:<label$}| {:<value$}|",
                label,
                value,
                label = LABEL_WIDTH,
                value = VALUE_WIDTH
            )?;
        }
        writeln!(f, "{border}")
    }
}
