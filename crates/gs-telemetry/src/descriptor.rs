//! Measurement descriptors and the descriptor file loader.
//!
//! A descriptor file is comma separated text. The first two lines are headers
//! and are skipped. Each following record is
//!
//! ```text
//! name, units, address, word_count, gain, offset[, period_seconds]
//! ```
//!
//! Signedness is not part of the record; it is attached from
//! [`crate::signed`] by register address.

use std::collections::HashSet;
use std::path::Path;

use gs_core::{ensure_finite, ensure_positive};
use serde::Serialize;

use crate::error::{DescriptorError, TelemetryError, TelemetryResult};
use crate::signed::is_signed_address;

/// Poll period used when a record does not carry one.
pub const DEFAULT_PERIOD_S: f64 = 1.0;

/// Number of header lines at the top of a descriptor file.
const HEADER_LINES: usize = 2;

/// Register width of a measurement on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegisterWidth {
    /// One 16-bit register.
    Single,
    /// Two registers, high word first.
    Double,
}

impl RegisterWidth {
    pub fn from_word_count(word_count: u16) -> Option<Self> {
        match word_count {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            _ => None,
        }
    }

    pub fn word_count(self) -> u16 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }
}

/// Static definition of one polled measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementDescriptor {
    /// Unique key.
    pub name: String,
    /// Display-only unit label.
    pub units: String,
    /// Holding register address.
    pub address: u16,
    pub width: RegisterWidth,
    pub gain: f64,
    pub offset: f64,
    /// Seconds between reads.
    pub period_seconds: f64,
    /// Two's-complement interpretation, from the signed-address table.
    pub signed: bool,
}

impl MeasurementDescriptor {
    /// Create a validated descriptor. Signedness is looked up by address.
    ///
    /// # Arguments
    ///
    /// * `word_count` - 1 for 16-bit, 2 for 32-bit values
    /// * `period_seconds` - poll period, [`DEFAULT_PERIOD_S`] when `None`
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        address: u16,
        word_count: u16,
        gain: f64,
        offset: f64,
        period_seconds: Option<f64>,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DescriptorError::InvalidValue {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        let width =
            RegisterWidth::from_word_count(word_count).ok_or(DescriptorError::InvalidValue {
                field: "word_count",
                reason: format!("{word_count} is not 1 or 2"),
            })?;
        let gain = ensure_finite(gain, "gain").map_err(invalid("gain"))?;
        let offset = ensure_finite(offset, "offset").map_err(invalid("offset"))?;
        let period_seconds = ensure_positive(period_seconds.unwrap_or(DEFAULT_PERIOD_S), "period")
            .map_err(invalid("period_seconds"))?;

        Ok(Self {
            name,
            units: units.into(),
            address,
            width,
            gain,
            offset,
            period_seconds,
            signed: is_signed_address(address),
        })
    }

    /// Override the signedness looked up from the address table.
    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn word_count(&self) -> u16 {
        self.width.word_count()
    }
}

fn invalid(field: &'static str) -> impl Fn(gs_core::CoreError) -> DescriptorError {
    move |e| DescriptorError::InvalidValue {
        field,
        reason: e.to_string(),
    }
}

/// Parse descriptor records from the text of a descriptor file.
pub fn parse_descriptors(text: &str) -> Result<Vec<MeasurementDescriptor>, DescriptorError> {
    let mut descriptors = Vec::new();
    let mut names = HashSet::new();

    for (index, line) in text.lines().enumerate().skip(HEADER_LINES) {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let descriptor = parse_record(line, line_no)?;
        if !names.insert(descriptor.name.clone()) {
            return Err(DescriptorError::DuplicateName {
                name: descriptor.name,
            });
        }
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

fn parse_record(line: &str, line_no: usize) -> Result<MeasurementDescriptor, DescriptorError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(DescriptorError::Parse {
            line: line_no,
            reason: format!("expected at least 6 fields, found {}", fields.len()),
        });
    }

    let parse_err = |field: &str, value: &str| DescriptorError::Parse {
        line: line_no,
        reason: format!("invalid {field} '{value}'"),
    };

    let address: u16 = fields[2]
        .parse()
        .map_err(|_| parse_err("address", fields[2]))?;
    let word_count: u16 = fields[3]
        .parse()
        .map_err(|_| parse_err("word_count", fields[3]))?;
    let gain: f64 = fields[4].parse().map_err(|_| parse_err("gain", fields[4]))?;
    let offset: f64 = fields[5]
        .parse()
        .map_err(|_| parse_err("offset", fields[5]))?;
    let period = match fields.get(6) {
        Some(&raw) if !raw.is_empty() => {
            Some(raw.parse::<f64>().map_err(|_| parse_err("period", raw))?)
        }
        _ => None,
    };

    MeasurementDescriptor::new(fields[0], fields[1], address, word_count, gain, offset, period)
        .map_err(|e| DescriptorError::Parse {
            line: line_no,
            reason: e.to_string(),
        })
}

/// Read and parse a descriptor file.
pub fn load_descriptors(path: &Path) -> TelemetryResult<Vec<MeasurementDescriptor>> {
    let text = std::fs::read_to_string(path).map_err(|source| TelemetryError::DescriptorFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_descriptors(&text)?)
}
