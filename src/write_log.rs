//! CSV register-write logs
//!
//! One write per row in the order `cycles,reg,data`, with a header line:
//!
//! ```text
//! cycles,reg,data
//! 0,24,15
//! 19656,4,33
//! ```

use std::io::{Read, Write};

use crate::render::SidWrite;
use crate::{Result, SidError};

/// Read a write log
///
/// # Errors
///
/// Returns [`SidError::WriteLogError`] for malformed rows, including the
/// offending line number.
pub fn read_write_log<R: Read>(reader: R) -> Result<Vec<SidWrite>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv.deserialize()
        .map(|row| {
            row.map_err(|err| {
                let line = err.position().map_or(0, csv::Position::line);
                SidError::WriteLogError(format!("line {line}: {err}"))
            })
        })
        .collect()
}

/// Write a log of `writes`
pub fn write_write_log<W: Write>(writer: W, writes: &[SidWrite]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for write in writes {
        csv.serialize(write)?;
    }
    csv.flush()?;
    Ok(())
}
