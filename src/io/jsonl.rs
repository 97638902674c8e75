//! JSON Lines streams.
//!
//! One JSON value per line, lines separated by `\n`. Writers serialize each
//! value compactly so a record never spans two lines; raw values containing a
//! newline are rejected rather than silently split. Readers strip the `\n`
//! (and a preceding `\r`), treat a final line without a terminator as a
//! complete record, and by default skip blank lines.

use crate::error::{Error, Result};
use crate::io::compression::{Compression, Sink, Source};
use crate::options::Options;
use crate::record::{RecordReader, RecordWriter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use std::io::{BufRead, Read, Write};

/// Writes newline-delimited JSON records.
pub struct JsonWriter<W: Write> {
    sink: Sink<W>,
    records: u64,
}

impl<W: Write> JsonWriter<W> {
    /// Create a writer over `inner`, buffered and compressed per `options`.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] if `compression` is not compiled in.
    pub fn new(inner: W, compression: Compression, options: &Options) -> Result<Self> {
        Ok(Self {
            sink: Sink::new(inner, compression, options.buffer_size, options.gzip_level)?,
            records: 0,
        })
    }

    /// Serialize `value` as one compact JSON line.
    ///
    /// # Errors
    /// Returns [`Error::Encode`] if `value` cannot be serialized and
    /// [`Error::Io`] if the sink fails. A failed value writes nothing.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        // Serialize up front so a failing value leaves nothing in the stream.
        let line = serde_json::to_vec(value).map_err(Error::encode)?;
        self.write_line(&line)
    }

    /// Write an already formatted JSON value.
    ///
    /// # Errors
    /// Returns [`Error::Framing`] if the value spans more than one line.
    pub fn write_raw(&mut self, raw: &RawValue) -> Result<()> {
        self.write_line(raw.get().as_bytes())
    }

    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if line.contains(&b'\n') {
            return Err(Error::framing("JSON record contains a newline"));
        }
        self.sink.write_all(line)?;
        self.sink.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush, finish compression and hand back the inner writer.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if buffered records cannot be flushed; records
    /// written before a failed close may never have reached the sink.
    pub fn close(self) -> Result<W> {
        self.sink.finish()
    }
}

impl<W: Write> RecordWriter for JsonWriter<W> {
    type Record = Box<RawValue>;

    fn write_record(&mut self, record: &Box<RawValue>) -> Result<()> {
        self.write_raw(record)
    }

    fn encoded_len(&self, record: &Box<RawValue>) -> u64 {
        record.get().len() as u64 + 1
    }

    fn close(self) -> Result<()> {
        JsonWriter::close(self).map(drop)
    }
}

/// Reads newline-delimited JSON records.
pub struct JsonReader<R: Read> {
    source: Source<R>,
    line: Vec<u8>,
    line_no: u64,
    skip_blank_lines: bool,
}

impl<R: Read> JsonReader<R> {
    /// Create a reader over `inner`, buffered and decompressed per `options`.
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
        Self {
            source,
            line: Vec::new(),
            line_no: 0,
            skip_blank_lines: options.json.skip_blank_lines,
        }
    }

    /// Load the next line into the internal buffer. Returns `false` at end of stream.
    fn next_line(&mut self) -> Result<bool> {
        loop {
            self.line.clear();
            if self.source.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(false);
            }
            self.line_no += 1;
            if self.line.last() == Some(&b'\n') {
                self.line.pop();
                if self.line.last() == Some(&b'\r') {
                    self.line.pop();
                }
            }
            if self.skip_blank_lines && self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(true);
        }
    }

    /// Read the next line as an unparsed JSON value.
    pub fn read_raw(&mut self) -> Result<Option<Box<RawValue>>> {
        if !self.next_line()? {
            return Ok(None);
        }
        let text = String::from_utf8(std::mem::take(&mut self.line))
            .map_err(|e| Error::Decode(format!("line {}: {e}", self.line_no)))?;
        RawValue::from_string(text)
            .map(Some)
            .map_err(|e| Error::Decode(format!("line {}: {e}", self.line_no)))
    }

    /// Read the next line and deserialize it into `T`.
    ///
    /// # Errors
    /// Returns [`Error::Decode`], prefixed with the line number, if the line
    /// is not a valid `T`, and [`Error::Io`] if the source fails.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if !self.next_line()? {
            return Ok(None);
        }
        serde_json::from_slice(&self.line)
            .map(Some)
            .map_err(|e| Error::Decode(format!("line {}: {e}", self.line_no)))
    }

    /// Number of physical lines consumed so far.
    pub fn line_number(&self) -> u64 {
        self.line_no
    }

    /// Release the underlying source.
    pub fn close(self) -> Result<()> {
        drop(self.source);
        Ok(())
    }
}

impl<R: Read> RecordReader for JsonReader<R> {
    type Record = Box<RawValue>;

    fn read_record(&mut self) -> Result<Option<Box<RawValue>>> {
        self.read_raw()
    }

    fn close(self) -> Result<()> {
        JsonReader::close(self)
    }
}
