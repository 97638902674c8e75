//! Stream configuration.
//!
//! An [`Options`] value is handed to every stream at construction time and
//! copied into it, so changing a [`FileService`](crate::FileService) never
//! affects a stream that is already open.

use std::fmt;
use std::sync::Arc;

/// Default buffer capacity for buffered readers and writers (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default gzip compression level.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// A cell transform applied to every CSV value on read and on write.
pub type CsvValueProcessor = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// JSON-lines reading options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonOptions {
    /// Skip empty and whitespace-only lines instead of failing to decode them.
    pub skip_blank_lines: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
        }
    }
}

/// CSV reading and writing options.
#[derive(Clone)]
pub struct CsvOptions {
    /// Field delimiter (default `b','`).
    pub delimiter: u8,
    /// Applied in order to every cell read or written.
    pub value_processors: Vec<CsvValueProcessor>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            value_processors: Vec::new(),
        }
    }
}

impl fmt::Debug for CsvOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvOptions")
            .field("delimiter", &(self.delimiter as char))
            .field("value_processors", &self.value_processors.len())
            .finish()
    }
}

impl CsvOptions {
    /// Sets the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Appends a value processor.
    pub fn with_value_processor<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.value_processors.push(Arc::new(f));
        self
    }

    pub(crate) fn process(&self, value: &str) -> String {
        let mut out = value.to_string();
        for p in &self.value_processors {
            out = p(&out);
        }
        out
    }
}

/// Configuration shared by all streams a [`FileService`](crate::FileService) opens.
#[derive(Debug, Clone)]
pub struct Options {
    /// Capacity of buffered readers and writers (default 64 KiB).
    pub buffer_size: usize,
    /// Gzip level used when compressing, 0..=9 (default 6).
    pub gzip_level: u32,
    /// Optional cap on framed, uncompressed bytes per split part (default none).
    pub part_max_bytes: Option<u64>,
    pub json: JsonOptions,
    pub csv: CsvOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            gzip_level: DEFAULT_GZIP_LEVEL,
            part_max_bytes: None,
            json: JsonOptions::default(),
            csv: CsvOptions::default(),
        }
    }
}

impl Options {
    /// Sets the buffer size. A size of zero falls back to the default.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = if size == 0 { DEFAULT_BUFFER_SIZE } else { size };
        self
    }

    /// Sets the gzip level, clamped to `0..=9`.
    pub fn with_gzip_level(mut self, level: u32) -> Self {
        self.gzip_level = level.min(9);
        self
    }

    /// Cap every split part at `bytes` framed bytes, on top of the record limit.
    pub fn with_part_max_bytes(mut self, bytes: u64) -> Self {
        self.part_max_bytes = Some(bytes);
        self
    }

    /// Replace the JSON options.
    pub fn with_json(mut self, json: JsonOptions) -> Self {
        self.json = json;
        self
    }

    /// Replace the CSV options.
    pub fn with_csv(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }
}
