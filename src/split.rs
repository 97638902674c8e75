//! Splitting a record stream into size-bounded part files.
//!
//! [`split_records`] drains a [`RecordReader`] and distributes its records over
//! part writers in order. A new part is started when the current one has
//! reached its record limit, or when the next framed record would push it over
//! an optional byte cap. A part always takes at least one record, so no record
//! is ever cut across a boundary.
//!
//! # Notes
//! - Parts are opened lazily: an input with no records produces no parts.
//! - Structural rows (the CSV header) are written by the part factory and
//!   count toward neither limit.
//! - On failure the error is returned as-is. Parts already closed stay on disk
//!   and the part being written is left as far as it got.

use crate::error::Error;
use crate::record::{RecordReader, RecordWriter};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How much a single part may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartLimit {
    /// Maximum number of records per part.
    pub records: usize,
    /// Optional cap on framed, uncompressed bytes per part.
    pub bytes: Option<u64>,
}

impl PartLimit {
    /// At most `records` records per part, with no byte cap.
    pub fn records(records: usize) -> Self {
        Self {
            records,
            bytes: None,
        }
    }

    /// Additionally cap each part at `bytes` framed bytes.
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    fn validate(&self) -> crate::Result<()> {
        if self.records == 0 || self.bytes == Some(0) {
            return Err(Error::InvalidLimit);
        }
        Ok(())
    }

    fn would_exceed(&self, records: usize, bytes: u64, next: u64) -> bool {
        if records >= self.records {
            return true;
        }
        match self.bytes {
            Some(max) => records > 0 && bytes.saturating_add(next) > max,
            None => false,
        }
    }
}

impl From<usize> for PartLimit {
    fn from(records: usize) -> Self {
        PartLimit::records(records)
    }
}

struct OpenPart<W> {
    writer: W,
    index: usize,
    records: usize,
    bytes: u64,
}

/// Split everything `reader` yields into parts.
///
/// `partition_fn` is called once per part with increasing zero-based indices
/// to name it; `open_part` creates the writer for that path. Returns the part
/// paths in order once every part has been closed.
///
/// # Errors
/// Returns [`Error::InvalidLimit`] for a zero limit. Otherwise returns the
/// first read, open, write or close failure, with the record number or part
/// path in its context.
pub fn split_records<Rd, Wr, P, S, O>(
    mut reader: Rd,
    limit: PartLimit,
    mut partition_fn: P,
    mut open_part: O,
) -> Result<Vec<PathBuf>>
where
    Rd: RecordReader,
    Wr: RecordWriter<Record = Rd::Record>,
    P: FnMut(usize) -> S,
    S: Into<PathBuf>,
    O: FnMut(&Path) -> Result<Wr>,
{
    limit.validate()?;

    let mut parts: Vec<PathBuf> = Vec::new();
    let mut current: Option<OpenPart<Wr>> = None;
    let mut total: u64 = 0;

    while let Some(record) = reader
        .read_record()
        .with_context(|| format!("read record #{}", total + 1))?
    {
        let size = match (&current, limit.bytes) {
            (Some(part), Some(_)) => part.writer.encoded_len(&record),
            _ => 0,
        };

        if let Some(part) =
            current.take_if(|part| limit.would_exceed(part.records, part.bytes, size))
        {
            close_part(part, &parts)?;
        }

        if current.is_none() {
            let index = parts.len();
            let path: PathBuf = partition_fn(index).into();
            let writer = open_part(&path).with_context(|| format!("open part {}", path.display()))?;
            debug!(index, path = %path.display(), "opened part");
            parts.push(path);
            current = Some(OpenPart {
                writer,
                index,
                records: 0,
                bytes: 0,
            });
        }

        if let Some(ref mut part) = current {
            let size = match limit.bytes {
                Some(_) if part.records == 0 => part.writer.encoded_len(&record),
                _ => size,
            };
            part.writer
                .write_record(&record)
                .with_context(|| format!("write record #{} to {}", total + 1, parts[part.index].display()))?;
            part.records += 1;
            part.bytes += size;
            total += 1;
        }
    }

    if let Some(part) = current.take() {
        close_part(part, &parts)?;
    }
    reader.close().context("close split input")?;

    debug!(parts = parts.len(), records = total, "split complete");
    Ok(parts)
}

fn close_part<W: RecordWriter>(part: OpenPart<W>, parts: &[PathBuf]) -> Result<()> {
    let path = &parts[part.index];
    part.writer
        .close()
        .with_context(|| format!("close part {}", path.display()))?;
    debug!(
        index = part.index,
        records = part.records,
        bytes = part.bytes,
        "completed part"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    type Store = Rc<RefCell<BTreeMap<PathBuf, Vec<String>>>>;

    struct VecReader(std::vec::IntoIter<String>);

    impl RecordReader for VecReader {
        type Record = String;
        fn read_record(&mut self) -> crate::Result<Option<String>> {
            Ok(self.0.next())
        }
        fn close(self) -> crate::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Copy)]
    enum Fail {
        Never,
        Write(&'static str),
        Close,
    }

    struct MemWriter {
        path: PathBuf,
        rows: Vec<String>,
        store: Store,
        fail: Fail,
    }

    impl RecordWriter for MemWriter {
        type Record = String;
        fn write_record(&mut self, record: &String) -> crate::Result<()> {
            if matches!(self.fail, Fail::Write(r) if *record == r) {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.rows.push(record.clone());
            Ok(())
        }
        fn encoded_len(&self, record: &String) -> u64 {
            record.len() as u64 + 1
        }
        fn close(self) -> crate::Result<()> {
            if let Fail::Close = self.fail {
                return Err(Error::Io(std::io::Error::other("flush failed")));
            }
            self.store.borrow_mut().insert(self.path, self.rows);
            Ok(())
        }
    }

    fn run(
        records: &[&str],
        limit: PartLimit,
        fail: Fail,
    ) -> (Result<Vec<PathBuf>>, BTreeMap<PathBuf, Vec<String>>) {
        let store: Store = Rc::default();
        let reader = VecReader(records.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter());
        let result = split_records(
            reader,
            limit,
            |i| format!("part-{i}"),
            |path: &Path| {
                Ok(MemWriter {
                    path: path.to_path_buf(),
                    rows: Vec::new(),
                    store: store.clone(),
                    fail,
                })
            },
        );
        let parts = store.borrow().clone();
        (result, parts)
    }

    #[test]
    fn record_limit_sizes_parts() {
        let records: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = records.iter().map(String::as_str).collect();
        let (paths, store) = run(&refs, PartLimit::records(3), Fail::Never);
        let paths = paths.unwrap();
        assert_eq!(
            paths,
            (0..4).map(|i| PathBuf::from(format!("part-{i}"))).collect::<Vec<_>>()
        );
        let sizes: Vec<usize> = paths.iter().map(|p| store[p].len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        let joined: Vec<String> = paths.iter().flat_map(|p| store[p].clone()).collect();
        assert_eq!(joined, records);
    }

    #[test]
    fn empty_input_yields_no_parts() {
        let (paths, store) = run(&[], PartLimit::records(5), Fail::Never);
        assert!(paths.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn zero_limit_is_rejected() {
        let (paths, _) = run(&["a"], PartLimit::records(0), Fail::Never);
        let err = paths.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidLimit)));
        let (paths, _) = run(&["a"], PartLimit::records(1).with_max_bytes(0), Fail::Never);
        assert!(paths.is_err());
    }

    #[test]
    fn byte_cap_rolls_parts_without_cutting_records() {
        // Each record is 4 framed bytes except the oversized one.
        let (paths, store) = run(
            &["aaa", "bbb", "ccc", "a-very-long-record", "ddd"],
            PartLimit::records(100).with_max_bytes(8),
            Fail::Never,
        );
        let paths = paths.unwrap();
        let parts: Vec<Vec<String>> = paths.iter().map(|p| store[p].clone()).collect();
        assert_eq!(
            parts,
            vec![
                vec!["aaa".to_string(), "bbb".to_string()],
                vec!["ccc".to_string()],
                vec!["a-very-long-record".to_string()],
                vec!["ddd".to_string()],
            ]
        );
    }

    #[test]
    fn write_failure_stops_and_keeps_closed_parts() {
        let (paths, store) = run(&["a", "b", "c", "boom", "d"], PartLimit::records(2), Fail::Write("boom"));
        let err = paths.unwrap_err();
        assert!(format!("{err:#}").contains("disk full"));
        // part-0 was closed before the failure; part-1 never was.
        assert_eq!(store.len(), 1);
        assert_eq!(store[&PathBuf::from("part-0")], vec!["a", "b"]);
    }

    #[test]
    fn part_close_failure_is_reported() {
        let (paths, store) = run(&["a", "b", "c"], PartLimit::records(2), Fail::Close);
        let err = paths.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Io(_))));
        assert!(format!("{err:#}").contains("close part part-0"));
        // Nothing after the failed close was written.
        assert!(store.is_empty());
    }
}
