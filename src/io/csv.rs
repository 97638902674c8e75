//! CSV streams, header schema and named field access.
//!
//! This module provides:
//! - [`CsvWriter`]: writes rows with standard quoting, `\n`-terminated
//! - [`CsvReader`]: reads raw rows; [`CsvReader::read_header`] turns it into a
//!   [`CsvFile`] whose first row becomes the [`CsvSchema`]
//! - [`CsvRecord`]: a data row viewed through the schema of the file it came from
//!
//! # Notes
//! - Rows may carry more or fewer cells than the header; missing cells read
//!   as the caller's default.
//! - Configured value processors run on every cell, header included, on both
//!   read and write.

use crate::error::{Error, Result};
use crate::io::compression::{Compression, Sink, Source};
use crate::options::{CsvOptions, Options};
use crate::record::{RecordReader, RecordWriter};
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::collections::HashMap;
use std::io::{Read, Write};

fn writer_builder(delimiter: u8) -> WriterBuilder {
    let mut b = WriterBuilder::new();
    b.delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .has_headers(false);
    b
}

/// Writes CSV rows.
pub struct CsvWriter<W: Write> {
    inner: csv::Writer<Sink<W>>,
    options: CsvOptions,
    records: u64,
}

impl<W: Write> CsvWriter<W> {
    /// Create a writer over `inner` using the delimiter, value processors and
    /// buffering from `options`.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] if `compression` is not compiled in.
    pub fn new(inner: W, compression: Compression, options: &Options) -> Result<Self> {
        let sink = Sink::new(inner, compression, options.buffer_size, options.gzip_level)?;
        let inner = writer_builder(options.csv.delimiter)
            .buffer_capacity(options.buffer_size.max(1))
            .from_writer(sink);
        Ok(Self {
            inner,
            options: options.csv.clone(),
            records: 0,
        })
    }

    /// Write one row, quoting cells as needed.
    ///
    /// # Errors
    /// Returns [`Error::Framing`] for a row without cells, which CSV cannot
    /// tell apart from a row holding one empty cell, and [`Error::Io`] if the
    /// sink fails.
    pub fn write<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        if values.is_empty() {
            return Err(Error::framing("CSV row has no cells"));
        }
        if self.options.value_processors.is_empty() {
            self.inner
                .write_record(values.iter().map(|v| AsRef::<str>::as_ref(v)))?;
        } else {
            let opts = &self.options;
            self.inner
                .write_record(values.iter().map(|v| opts.process(v.as_ref())))?;
        }
        self.records += 1;
        Ok(())
    }

    /// Rows written so far, header included if one was written.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush, finish compression and hand back the inner writer.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if buffered rows cannot be flushed; rows written
    /// before a failed close may never have reached the sink.
    pub fn close(self) -> Result<W> {
        let sink = self
            .inner
            .into_inner()
            .map_err(|e| Error::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))?;
        sink.finish()
    }
}

impl<W: Write> RecordWriter for CsvWriter<W> {
    type Record = Vec<String>;

    fn write_record(&mut self, record: &Vec<String>) -> Result<()> {
        self.write(record)
    }

    fn encoded_len(&self, record: &Vec<String>) -> u64 {
        let estimate = || record.iter().map(|c| c.len() as u64 + 1).sum::<u64>().max(1);
        let mut scratch = writer_builder(self.options.delimiter).from_writer(Vec::new());
        if scratch.write_record(record).is_err() {
            return estimate();
        }
        scratch
            .into_inner()
            .map_or_else(|_| estimate(), |bytes| bytes.len() as u64)
    }

    fn close(self) -> Result<()> {
        CsvWriter::close(self).map(drop)
    }
}

/// Reads CSV rows without interpreting a header.
pub struct CsvReader<R: Read> {
    inner: csv::Reader<Source<R>>,
    options: CsvOptions,
    row: StringRecord,
}

impl<R: Read> CsvReader<R> {
    /// Create a reader over `inner` using the delimiter, value processors and
    /// buffering from `options`. No row is treated as a header until
    /// [`read_header`](Self::read_header) is called.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] if `compression` is not compiled in.
    pub fn new(inner: R, compression: Compression, options: &Options) -> Result<Self> {
        Ok(Self::from_source(
            Source::new(inner, compression, options.buffer_size)?,
            options,
        ))
    }

    pub(crate) fn from_source(source: Source<R>, options: &Options) -> Self {
        let inner = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.csv.delimiter)
            .buffer_capacity(options.buffer_size.max(1))
            .from_reader(source);
        Self {
            inner,
            options: options.csv.clone(),
            row: StringRecord::new(),
        }
    }

    /// Read the next row, or `Ok(None)` at end of stream.
    pub fn read(&mut self) -> Result<Option<Vec<String>>> {
        if !self.inner.read_record(&mut self.row)? {
            return Ok(None);
        }
        let opts = &self.options;
        Ok(Some(self.row.iter().map(|v| opts.process(v)).collect()))
    }

    /// Consume the first row as the header. An empty stream yields an empty schema.
    pub fn read_header(mut self) -> Result<CsvFile<R>> {
        let header = self.read()?.unwrap_or_default();
        Ok(CsvFile {
            schema: CsvSchema::new(header),
            reader: self,
        })
    }

    /// Line number of the last row read, 1-based.
    pub fn line_number(&self) -> u64 {
        self.inner.position().line()
    }

    /// Release the underlying source.
    pub fn close(self) -> Result<()> {
        drop(self.inner);
        Ok(())
    }
}

impl<R: Read> RecordReader for CsvReader<R> {
    type Record = Vec<String>;

    fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        self.read()
    }

    fn close(self) -> Result<()> {
        CsvReader::close(self)
    }
}

/// A CSV stream whose header has been consumed into a schema.
pub struct CsvFile<R: Read> {
    reader: CsvReader<R>,
    schema: CsvSchema,
}

impl<R: Read> CsvFile<R> {
    /// Column names in file order. Empty when the stream had no rows at all.
    pub fn header(&self) -> &[String] {
        self.schema.header()
    }

    /// Column name to position, see [`CsvSchema::index`].
    pub fn index(&self) -> &HashMap<String, usize> {
        self.schema.index()
    }

    /// Schema built from the header row.
    pub fn schema(&self) -> &CsvSchema {
        &self.schema
    }

    /// Read the next data row wrapped with the schema.
    pub fn next(&mut self) -> Result<Option<CsvRecord<'_>>> {
        match self.reader.read()? {
            Some(row) => Ok(Some(self.schema.record(row))),
            None => Ok(None),
        }
    }

    /// Read the next data row as plain cells.
    pub fn read_row(&mut self) -> Result<Option<Vec<String>>> {
        self.reader.read()
    }

    /// Release the underlying source.
    pub fn close(self) -> Result<()> {
        self.reader.close()
    }
}

impl<R: Read> RecordReader for CsvFile<R> {
    type Record = Vec<String>;

    fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        self.read_row()
    }

    fn close(self) -> Result<()> {
        CsvFile::close(self)
    }
}

/// Column name to position mapping derived from a header row.
///
/// Duplicate names resolve to their last position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvSchema {
    header: Vec<String>,
    index: HashMap<String, usize>,
}

impl CsvSchema {
    /// Build the index for `header`.
    pub fn new(header: Vec<String>) -> Self {
        let index = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { header, index }
    }

    /// Wrap a row so its cells can be looked up by column name.
    pub fn record(&self, row: Vec<String>) -> CsvRecord<'_> {
        CsvRecord { schema: self, row }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Column name to zero-based position; duplicates map to the last one.
    pub fn index(&self) -> &HashMap<String, usize> {
        &self.index
    }

    /// Position of column `name`, if the header has it.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Number of header columns.
    pub fn len(&self) -> usize {
        self.header.len()
    }

    /// `true` for the schema of a stream that had no header row.
    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }
}

/// One data row plus a borrowed reference to its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord<'s> {
    schema: &'s CsvSchema,
    row: Vec<String>,
}

impl<'s> CsvRecord<'s> {
    /// Cells of the row in file order.
    pub fn record(&self) -> &[String] {
        &self.row
    }

    /// Cell under column `name`, or `default` when the column is unknown or
    /// the row is too short to hold it.
    pub fn field<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.schema
            .position(name)
            .and_then(|i| self.row.get(i))
            .map_or(default, String::as_str)
    }

    /// All named cells present in this row.
    pub fn fields(&self) -> HashMap<String, String> {
        self.schema
            .index()
            .iter()
            .filter_map(|(name, &i)| self.row.get(i).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Schema this row is read through.
    pub fn schema(&self) -> &'s CsvSchema {
        self.schema
    }

    /// Drop the schema reference and keep the cells.
    pub fn into_record(self) -> Vec<String> {
        self.row
    }
}
