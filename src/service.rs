//! Path- and handle-based entry points for every format.
//!
//! [`FileService`] carries one [`Options`] value and opens streams with it.
//! Names ending in `.gz`/`.gzip` are compressed on write and decompressed on
//! read; streams over an existing handle take an explicit `with_gzip` flag.
//!
//! Split and join copy records verbatim. They open their streams without the
//! configured CSV value processors so a split followed by a join reproduces
//! the original cells exactly.

use crate::io::compression::{Compression, Source};
use crate::io::{create_file, open_file};
use crate::options::{CsvOptions, JsonOptions, Options};
use crate::split::{PartLimit, split_records};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "io-csv")]
use crate::error::Error;
#[cfg(feature = "io-csv")]
use crate::io::csv::{CsvFile, CsvReader, CsvSchema, CsvWriter};
#[cfg(feature = "io-jsonl")]
use crate::io::jsonl::{JsonReader, JsonWriter};
#[cfg(feature = "io-proto")]
use crate::io::proto::{ProtoReader, ProtoWriter};
use crate::join::join_records;
use anyhow::Context;

/// Opens, creates, splits and joins record files.
#[derive(Debug, Clone, Default)]
pub struct FileService {
    options: Options,
}

impl FileService {
    /// Service with [`Options::default`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// Options every stream opened from now on is built with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Buffer size used for every stream opened from now on (default 64 KiB).
    pub fn buffer_size(&self) -> usize {
        self.options.buffer_size
    }

    /// Set the buffer size; zero restores the default.
    pub fn set_buffer_size(&mut self, size: usize) {
        self.options = std::mem::take(&mut self.options).with_buffer_size(size);
    }

    /// Byte cap applied to split parts in addition to the record limit.
    pub fn part_max_bytes(&self) -> Option<u64> {
        self.options.part_max_bytes
    }

    /// Set or clear the per-part byte cap. A cap of zero makes splits fail
    /// with [`Error::InvalidLimit`](crate::Error::InvalidLimit).
    pub fn set_part_max_bytes(&mut self, bytes: Option<u64>) {
        self.options.part_max_bytes = bytes;
    }

    /// JSON reading options.
    pub fn json_options(&self) -> JsonOptions {
        self.options.json
    }

    pub fn set_json_options(&mut self, json: JsonOptions) {
        self.options.json = json;
    }

    /// CSV delimiter and value processors.
    pub fn csv_options(&self) -> &CsvOptions {
        &self.options.csv
    }

    pub fn set_csv_options(&mut self, csv: CsvOptions) {
        self.options.csv = csv;
    }

    /// Record limit for a split, capped by the configured part byte size.
    fn part_limit(&self, records: usize) -> PartLimit {
        PartLimit {
            records,
            bytes: self.options.part_max_bytes,
        }
    }

    /// Options for split/join: same buffering, no cell rewriting.
    fn copy_options(&self) -> Options {
        Options {
            csv: CsvOptions {
                value_processors: Vec::new(),
                ..self.options.csv.clone()
            },
            ..self.options.clone()
        }
    }
}

fn detect_source<R: Read>(inner: R, path: &Path, options: &Options) -> anyhow::Result<Source<R>> {
    Source::detect(inner, path, options.buffer_size)
        .with_context(|| format!("setup decompression for {}", path.display()))
}

// --------- JSON lines ----------

#[cfg(feature = "io-jsonl")]
impl FileService {
    /// JSON writer over an existing handle.
    pub fn new_json_stream<W: Write>(&self, inner: W, with_gzip: bool) -> crate::Result<JsonWriter<W>> {
        JsonWriter::new(inner, Compression::from_gzip_flag(with_gzip), &self.options)
    }

    /// Create a JSON file; compressed when the name says so.
    pub fn new_json_file(&self, path: impl AsRef<Path>) -> anyhow::Result<JsonWriter<File>> {
        create_json(path.as_ref(), &self.options)
    }

    /// JSON reader over an existing handle.
    pub fn json_stream<R: Read>(&self, inner: R, with_gzip: bool) -> crate::Result<JsonReader<R>> {
        JsonReader::new(inner, Compression::from_gzip_flag(with_gzip), &self.options)
    }

    /// Open a JSON file; decompressed when the name or content says so.
    pub fn open_json_file(&self, path: impl AsRef<Path>) -> anyhow::Result<JsonReader<File>> {
        open_json(path.as_ref(), &self.options)
    }

    /// JSON reader over an open file, gzip detected from its leading bytes.
    pub fn json_file(&self, file: File) -> crate::Result<JsonReader<File>> {
        Ok(JsonReader::from_source(
            Source::detect(file, "", self.options.buffer_size)?,
            &self.options,
        ))
    }

    /// Split a JSON file into parts of at most `limit` records each.
    ///
    /// Parts are named by `partition_fn(0)`, `partition_fn(1)`, ... and are
    /// compressed when their names say so.
    ///
    /// # Errors
    /// Returns an error if the input cannot be opened, a line is not valid
    /// JSON, `limit` is zero, or a part cannot be written or closed. Parts
    /// closed before the failure stay on disk.
    pub fn split_json_file<P, S>(
        &self,
        input: impl AsRef<Path>,
        limit: usize,
        partition_fn: P,
    ) -> anyhow::Result<Vec<PathBuf>>
    where
        P: FnMut(usize) -> S,
        S: Into<PathBuf>,
    {
        let options = self.copy_options();
        let reader = open_json(input.as_ref(), &options)?;
        split_records(reader, self.part_limit(limit), partition_fn, |path| create_json(path, &options))
    }

    /// Concatenate JSON parts, in order, into `output`.
    pub fn join_json_files<P: AsRef<Path>>(&self, output: impl AsRef<Path>, parts: &[P]) -> anyhow::Result<()> {
        let options = self.copy_options();
        let writer = create_json(output.as_ref(), &options)?;
        join_records(writer, parts, |_, path| open_json(path, &options))?;
        Ok(())
    }
}

#[cfg(feature = "io-jsonl")]
fn create_json(path: &Path, options: &Options) -> anyhow::Result<JsonWriter<File>> {
    let f = create_file(path)?;
    JsonWriter::new(f, Compression::from_path(path), options)
        .with_context(|| format!("setup compression for {}", path.display()))
}

#[cfg(feature = "io-jsonl")]
fn open_json(path: &Path, options: &Options) -> anyhow::Result<JsonReader<File>> {
    let f = open_file(path)?;
    Ok(JsonReader::from_source(detect_source(f, path, options)?, options))
}

// --------- Length-prefixed protobuf ----------

#[cfg(feature = "io-proto")]
impl FileService {
    /// Proto writer over an existing handle.
    pub fn new_proto_stream<W: Write>(&self, inner: W, with_gzip: bool) -> crate::Result<ProtoWriter<W>> {
        ProtoWriter::new(inner, Compression::from_gzip_flag(with_gzip), &self.options)
    }

    /// Proto writer over an in-memory buffer; `close()` returns the bytes.
    pub fn new_proto_buf(&self, with_gzip: bool) -> crate::Result<ProtoWriter<Vec<u8>>> {
        self.new_proto_stream(Vec::new(), with_gzip)
    }

    /// Create a proto file; compressed when the name says so.
    pub fn new_proto_file(&self, path: impl AsRef<Path>) -> anyhow::Result<ProtoWriter<File>> {
        create_proto(path.as_ref(), &self.options)
    }

    /// Proto reader over an existing handle.
    pub fn proto_stream<R: Read>(&self, inner: R, with_gzip: bool) -> crate::Result<ProtoReader<R>> {
        ProtoReader::new(inner, Compression::from_gzip_flag(with_gzip), &self.options)
    }

    /// Open a proto file; decompressed when the name or content says so.
    pub fn open_proto_file(&self, path: impl AsRef<Path>) -> anyhow::Result<ProtoReader<File>> {
        open_proto(path.as_ref(), &self.options)
    }

    /// Proto reader over an open file, gzip detected from its leading bytes.
    pub fn proto_file(&self, file: File) -> crate::Result<ProtoReader<File>> {
        Ok(ProtoReader::from_source(Source::detect(
            file,
            "",
            self.options.buffer_size,
        )?))
    }

    /// Split a proto file into parts of at most `limit` messages each.
    ///
    /// Every frame must decode as `M`; frames are copied byte-for-byte.
    pub fn split_proto_file<M, P, S>(
        &self,
        input: impl AsRef<Path>,
        limit: usize,
        partition_fn: P,
    ) -> anyhow::Result<Vec<PathBuf>>
    where
        M: prost::Message + Default,
        P: FnMut(usize) -> S,
        S: Into<PathBuf>,
    {
        let options = self.copy_options();
        let reader = open_proto(input.as_ref(), &options)?.checked::<M>();
        split_records(reader, self.part_limit(limit), partition_fn, |path| create_proto(path, &options))
    }

    /// Split a proto file without decoding its messages.
    pub fn split_proto_frames<P, S>(
        &self,
        input: impl AsRef<Path>,
        limit: usize,
        partition_fn: P,
    ) -> anyhow::Result<Vec<PathBuf>>
    where
        P: FnMut(usize) -> S,
        S: Into<PathBuf>,
    {
        let options = self.copy_options();
        let reader = open_proto(input.as_ref(), &options)?;
        split_records(reader, self.part_limit(limit), partition_fn, |path| create_proto(path, &options))
    }

    /// Concatenate proto parts, in order, into `output`. Every frame must decode as `M`.
    pub fn join_proto_files<M, P>(&self, output: impl AsRef<Path>, parts: &[P]) -> anyhow::Result<()>
    where
        M: prost::Message + Default,
        P: AsRef<Path>,
    {
        let options = self.copy_options();
        let writer = create_proto(output.as_ref(), &options)?;
        join_records(writer, parts, |_, path| {
            Ok(open_proto(path, &options)?.checked::<M>())
        })?;
        Ok(())
    }

    /// Concatenate proto parts without decoding their messages.
    pub fn join_proto_frames<P: AsRef<Path>>(&self, output: impl AsRef<Path>, parts: &[P]) -> anyhow::Result<()> {
        let options = self.copy_options();
        let writer = create_proto(output.as_ref(), &options)?;
        join_records(writer, parts, |_, path| open_proto(path, &options))?;
        Ok(())
    }
}

#[cfg(feature = "io-proto")]
fn create_proto(path: &Path, options: &Options) -> anyhow::Result<ProtoWriter<File>> {
    let f = create_file(path)?;
    ProtoWriter::new(f, Compression::from_path(path), options)
        .with_context(|| format!("setup compression for {}", path.display()))
}

#[cfg(feature = "io-proto")]
fn open_proto(path: &Path, options: &Options) -> anyhow::Result<ProtoReader<File>> {
    let f = open_file(path)?;
    Ok(ProtoReader::from_source(detect_source(f, path, options)?))
}

// --------- CSV ----------

#[cfg(feature = "io-csv")]
impl FileService {
    /// CSV writer over an existing handle.
    pub fn new_csv_stream<W: Write>(&self, inner: W, with_gzip: bool) -> crate::Result<CsvWriter<W>> {
        CsvWriter::new(inner, Compression::from_gzip_flag(with_gzip), &self.options)
    }

    /// Create a CSV file; compressed when the name says so.
    pub fn new_csv_file(&self, path: impl AsRef<Path>) -> anyhow::Result<CsvWriter<File>> {
        create_csv(path.as_ref(), &self.options)
    }

    /// CSV reader over an existing handle.
    pub fn open_csv_stream<R: Read>(&self, inner: R, with_gzip: bool) -> crate::Result<CsvReader<R>> {
        CsvReader::new(inner, Compression::from_gzip_flag(with_gzip), &self.options)
    }

    /// Open a CSV file; decompressed when the name or content says so.
    pub fn open_csv_file(&self, path: impl AsRef<Path>) -> anyhow::Result<CsvReader<File>> {
        open_csv(path.as_ref(), &self.options)
    }

    /// CSV reader over an open file, gzip detected from its leading bytes.
    pub fn csv_file_reader(&self, file: File) -> crate::Result<CsvReader<File>> {
        Ok(CsvReader::from_source(
            Source::detect(file, "", self.options.buffer_size)?,
            &self.options,
        ))
    }

    /// Schema for `header`, for rows read without a header row of their own.
    pub fn new_csv_schema(&self, header: Vec<String>) -> CsvSchema {
        CsvSchema::new(header)
    }

    /// Split a CSV file into parts of at most `limit` data rows each.
    ///
    /// Every part starts with the input's header row, which does not count
    /// toward the limit. An input without data rows yields no parts.
    pub fn split_csv_file<P, S>(
        &self,
        input: impl AsRef<Path>,
        limit: usize,
        partition_fn: P,
    ) -> anyhow::Result<Vec<PathBuf>>
    where
        P: FnMut(usize) -> S,
        S: Into<PathBuf>,
    {
        let input = input.as_ref();
        let options = self.copy_options();
        let reader = open_csv(input, &options)?
            .read_header()
            .with_context(|| format!("read CSV header of {}", input.display()))?;
        let header = reader.header().to_vec();
        split_records(reader, self.part_limit(limit), partition_fn, |path| {
            let mut w = create_csv(path, &options)?;
            write_header(&mut w, &header, path)?;
            Ok(w)
        })
    }

    /// Concatenate CSV parts, in order, into `output` with a single header.
    ///
    /// Every part must carry the same header as the first one; a mismatch
    /// fails with [`Error::HeaderMismatch`]. An empty part list, or parts that
    /// are all empty files, produce an empty output file.
    pub fn join_csv_files<P: AsRef<Path>>(&self, output: impl AsRef<Path>, parts: &[P]) -> anyhow::Result<()> {
        let output = output.as_ref();
        let options = self.copy_options();

        let Some(first) = parts.first() else {
            let writer = create_csv(output, &options)?;
            writer
                .close()
                .with_context(|| format!("close {}", output.display()))?;
            return Ok(());
        };

        let first_path = first.as_ref();
        let first_file = open_csv_with_header(first_path, &options)?;
        let header = first_file.header().to_vec();

        let mut writer = create_csv(output, &options)?;
        write_header(&mut writer, &header, output)?;

        let mut first_file = Some(first_file);
        join_records(writer, parts, |index, path| {
            if index == 0
                && let Some(file) = first_file.take()
            {
                return Ok(file);
            }
            let file = open_csv_with_header(path, &options)?;
            if file.header() != header.as_slice() {
                return Err(Error::HeaderMismatch {
                    expected: header.clone(),
                    found: file.header().to_vec(),
                }
                .into());
            }
            Ok(file)
        })?;
        Ok(())
    }
}

#[cfg(feature = "io-csv")]
fn create_csv(path: &Path, options: &Options) -> anyhow::Result<CsvWriter<File>> {
    let f = create_file(path)?;
    CsvWriter::new(f, Compression::from_path(path), options)
        .with_context(|| format!("setup compression for {}", path.display()))
}

#[cfg(feature = "io-csv")]
fn open_csv(path: &Path, options: &Options) -> anyhow::Result<CsvReader<File>> {
    let f = open_file(path)?;
    Ok(CsvReader::from_source(detect_source(f, path, options)?, options))
}

/// An empty header comes from an empty file and has no row to write.
#[cfg(feature = "io-csv")]
fn write_header(writer: &mut CsvWriter<File>, header: &[String], path: &Path) -> anyhow::Result<()> {
    if header.is_empty() {
        return Ok(());
    }
    writer
        .write(header)
        .with_context(|| format!("write CSV header to {}", path.display()))
}

#[cfg(feature = "io-csv")]
fn open_csv_with_header(path: &Path, options: &Options) -> anyhow::Result<CsvFile<File>> {
    open_csv(path, options)?
        .read_header()
        .with_context(|| format!("read CSV header of {}", path.display()))
}
