use std::fmt;

use hifitime::Epoch;
use nom::{
    number::complete::{le_f64, le_i32},
    IResult,
};

/// Size of one SPK segment summary (ND = 2, NI = 6), in bytes.
pub const SPK_SUMMARY_BYTES: usize = 40;

/// Descriptor of one SPK segment.
#[derive(Debug, PartialEq, Clone)]
pub struct Summary {
    /// Coverage start, ET seconds past J2000.
    pub start_epoch: f64,
    /// Coverage end, ET seconds past J2000.
    pub end_epoch: f64,
    pub target: i32,
    pub center: i32,
    pub frame_id: i32,
    pub data_type: i32,
    /// First word of the segment data (1-based DAF address).
    pub initial_addr: i32,
    /// Last word of the segment data (1-based DAF address).
    pub final_addr: i32,
}

impl Summary {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, start_epoch) = le_f64(input)?;
        let (input, end_epoch) = le_f64(input)?;

        let (input, target) = le_i32(input)?;
        let (input, center) = le_i32(input)?;
        let (input, frame_id) = le_i32(input)?;
        let (input, data_type) = le_i32(input)?;
        let (input, initial_addr) = le_i32(input)?;
        let (input, final_addr) = le_i32(input)?;
        Ok((
            input,
            Summary {
                start_epoch,
                end_epoch,
                target,
                center,
                frame_id,
                data_type,
                initial_addr,
                final_addr,
            },
        ))
    }

    /// Whether `et` (seconds past J2000) falls inside the segment coverage.
    pub fn covers(&self, et: f64) -> bool {
        et >= self.start_epoch && et <= self.end_epoch
    }
}

/// Header words of a DAF summary record: forward link, backward link, summary count.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SummaryRecordHeader {
    pub next: usize,
    pub previous: usize,
    pub n_summaries: usize,
}

impl SummaryRecordHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, next) = le_f64(input)?;
        let (input, previous) = le_f64(input)?;
        let (input, n_summaries) = le_f64(input)?;
        Ok((
            input,
            SummaryRecordHeader {
                next: next as usize,
                previous: previous as usize,
                n_summaries: n_summaries as usize,
            },
        ))
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = Epoch::from_et_seconds(self.start_epoch);
        let end = Epoch::from_et_seconds(self.end_epoch);

        let fields = [
            ("start_epoch", format!("{start}")),
            ("end_epoch", format!("{end}")),
            ("target", self.target.to_string()),
            ("center", self.center.to_string()),
            ("frame_id", self.frame_id.to_string()),
            ("data_type", self.data_type.to_string()),
            ("initial_addr", self.initial_addr.to_string()),
            ("final_addr", self.final_addr.to_string()),
        ];

        let label_width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(10);
        let value_width = fields.iter().map(|(_, v)| v.len()).max().unwrap_or(10);

        let border = format!(
            "+{:-<label$}+{:-<value$}+",
            "",
            "",
            label = label_width + 2,
            value = value_width + 2
        );

        writeln!(f, "{border}")?;
        for (label, value) in fields {
            writeln!(
                f,
                "| {label:<label_width$} | {value:<value_width$} |"
            )?;
        }
        writeln!(f, "{border}")
    }
}
