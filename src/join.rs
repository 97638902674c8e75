//! Reassembling part files into one stream.
//!
//! [`join_records`] copies every record of every part, strictly in the order
//! given, into a single writer. The writer is closed exactly once, on success
//! and on failure alike; after a failure the output holds whatever was copied
//! before it and must be treated as invalid by the caller.

use crate::record::{RecordReader, RecordWriter};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Copy the records of `parts` into `writer` and close it.
///
/// `open_part` is called with each part's position and path; it can skip or
/// validate structural rows (such as a CSV header) before handing back a
/// reader positioned at the first data record.
///
/// # Returns
/// The number of records copied.
///
/// # Errors
/// Returns the first open, read or write failure, or the output's close
/// failure when everything before it succeeded.
pub fn join_records<Wr, Rd, P, O>(mut writer: Wr, parts: &[P], mut open_part: O) -> Result<u64>
where
    Wr: RecordWriter,
    Rd: RecordReader<Record = Wr::Record>,
    P: AsRef<Path>,
    O: FnMut(usize, &Path) -> Result<Rd>,
{
    match copy_parts(&mut writer, parts, &mut open_part) {
        Ok(records) => {
            writer.close().context("close join output")?;
            debug!(parts = parts.len(), records, "join complete");
            Ok(records)
        }
        Err(e) => {
            if let Err(close_err) = writer.close() {
                warn!(error = %close_err, "closing join output after failure");
            }
            Err(e)
        }
    }
}

fn copy_parts<Wr, Rd, P, O>(writer: &mut Wr, parts: &[P], open_part: &mut O) -> Result<u64>
where
    Wr: RecordWriter,
    Rd: RecordReader<Record = Wr::Record>,
    P: AsRef<Path>,
    O: FnMut(usize, &Path) -> Result<Rd>,
{
    let mut total = 0u64;
    for (index, part) in parts.iter().enumerate() {
        let path = part.as_ref();
        let mut reader = open_part(index, path).with_context(|| format!("open part {}", path.display()))?;
        let mut records = 0u64;
        while let Some(record) = reader
            .read_record()
            .with_context(|| format!("read record #{} of {}", records + 1, path.display()))?
        {
            writer
                .write_record(&record)
                .with_context(|| format!("write record #{} of {}", records + 1, path.display()))?;
            records += 1;
        }
        reader
            .close()
            .with_context(|| format!("close part {}", path.display()))?;
        debug!(index, path = %path.display(), records, "joined part");
        total += records;
    }
    Ok(total)
}
