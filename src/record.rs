//! Format-agnostic record stream contracts.
//!
//! Every format exposes a reader/writer pair implementing these traits; the
//! [`split`](crate::split) and [`join`](crate::join) engines only ever talk to
//! them, never to a concrete format.

use crate::error::Result;

/// A stream that yields one framed record at a time.
pub trait RecordReader {
    type Record;

    /// Read the next record, or `Ok(None)` once the stream is exhausted.
    fn read_record(&mut self) -> Result<Option<Self::Record>>;

    /// Release the underlying source.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// A stream that frames and writes one record at a time.
pub trait RecordWriter {
    type Record;

    /// Frame and write a single record. A record is written whole or not at all
    /// as far as the framing layer is concerned.
    fn write_record(&mut self, record: &Self::Record) -> Result<()>;

    /// Number of bytes `record` occupies once framed, before compression.
    fn encoded_len(&self, record: &Self::Record) -> u64;

    /// Flush all buffers and release the underlying sink. A failure here can
    /// mean buffered records never reached the sink.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
