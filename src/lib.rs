//! # recordfs
//!
//! Streaming I/O for three record-oriented file formats with transparent gzip
//! compression, plus the ability to split a large file into size-bounded parts
//! and reassemble them losslessly.
//!
//! ## Formats
//!
//! | Format | Framing | Record type |
//! |--------|---------|-------------|
//! | JSON lines (feature `io-jsonl`) | one value per `\n`-terminated line | [`RawValue`](serde_json::value::RawValue) or any `serde` type |
//! | Protobuf (feature `io-proto`) | `[u32 big-endian length][message]` | raw frame bytes or any `prost::Message` |
//! | CSV (feature `io-csv`) | header row, then quoted `\n`-terminated rows | `Vec<String>`, or [`CsvRecord`] via the header schema |
//!
//! A path ending in `.gz` or `.gzip` is compressed on write and decompressed
//! on read (feature `compression-gzip`). Streams over an existing handle take
//! an explicit `with_gzip` flag instead.
//!
//! ## Quick Start
//!
//! ```no_run
//! use recordfs::FileService;
//! use serde::{Deserialize, Serialize};
//! # fn main() -> anyhow::Result<()> {
//!
//! #[derive(Serialize, Deserialize)]
//! struct Event { id: u32, kind: String }
//!
//! let svc = FileService::new();
//!
//! let mut w = svc.new_json_file("events.json.gz")?;
//! for id in 0..10 {
//!     w.write(&Event { id, kind: "click".into() })?;
//! }
//! w.close()?;
//!
//! // 4 parts holding 3, 3, 3 and 1 records
//! let parts = svc.split_json_file("events.json.gz", 3, |i| format!("part-{i}.json"))?;
//! svc.join_json_files("joined.json", &parts)?;
//!
//! let mut r = svc.open_json_file("joined.json")?;
//! while let Some(event) = r.read::<Event>()? {
//!     println!("{} {}", event.id, event.kind);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Split and Join
//!
//! Splitting never cuts a record across parts; every part is a complete,
//! independently readable file. CSV parts each start with the input's header,
//! which does not count toward the limit. Joining copies records in the order
//! the parts are given and writes a single CSV header. See [`split`] and
//! [`join`] for the format-agnostic engines and [`PartLimit`] for byte caps.
//!
//! ## Errors
//!
//! Stream operations return [`Result`] with a typed [`Error`]. End of stream
//! is `Ok(None)`, never an error. File-level operations return
//! `anyhow::Result` with the path in the context chain; the [`Error`] stays
//! reachable through `downcast_ref`.
//!
//! ## Module Overview
//!
//! - [`io`] - compression layer and per-format readers/writers
//! - [`record`] - the reader/writer contracts split and join are built on
//! - [`split`] / [`join`] - the part engines
//! - [`service`] - [`FileService`], path- and handle-based entry points
//! - [`options`] - buffer size, gzip level, JSON and CSV settings

pub mod error;
pub mod io;
pub mod join;
pub mod options;
pub mod record;
pub mod service;
pub mod split;

// General re-exports
pub use error::{Error, Result};
pub use io::compression::Compression;
pub use join::join_records;
pub use options::{CsvOptions, CsvValueProcessor, JsonOptions, Options};
pub use record::{RecordReader, RecordWriter};
pub use service::FileService;
pub use split::{PartLimit, split_records};

// Gated re-exports
#[cfg(feature = "io-jsonl")]
pub use io::jsonl::{JsonReader, JsonWriter};

#[cfg(feature = "io-proto")]
pub use io::proto::{CheckedProtoReader, ProtoReader, ProtoWriter};

#[cfg(feature = "io-csv")]
pub use io::csv::{CsvFile, CsvReader, CsvRecord, CsvSchema, CsvWriter};
