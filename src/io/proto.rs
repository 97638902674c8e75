//! Length-prefixed protobuf streams.
//!
//! Wire layout, repeated until end of stream:
//!
//! ```text
//! [u32 big-endian length N][N bytes of serialized message]
//! ```
//!
//! A clean end of stream may only occur on a frame boundary. A short length
//! header or a body shorter than its header announces is a framing error.

use crate::error::{Error, Result};
use crate::io::compression::{Compression, Sink, Source};
use crate::options::Options;
use crate::record::{RecordReader, RecordWriter};
use prost::Message;
use std::io::{ErrorKind, Read, Write};
use std::marker::PhantomData;

/// Size in bytes of the length header preceding every message.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound on speculative allocation for a frame body.
const MAX_PREALLOC: usize = 1 << 20;

/// Writes length-prefixed protobuf messages.
pub struct ProtoWriter<W: Write> {
    sink: Sink<W>,
    records: u64,
}

impl<W: Write> ProtoWriter<W> {
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

    /// Encode and write `message`, returning its serialized bytes.
    pub fn write<M: Message>(&mut self, message: &M) -> Result<Vec<u8>> {
        let body = message.encode_to_vec();
        self.write_frame(&body)?;
        Ok(body)
    }

    /// Write an already serialized message body with its length header.
    pub fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        let len = u32::try_from(body.len()).map_err(|_| {
            Error::framing(format!("message of {} bytes exceeds the u32 length header", body.len()))
        })?;
        self.sink.write_all(&len.to_be_bytes())?;
        self.sink.write_all(body)?;
        self.records += 1;
        Ok(())
    }

    /// Messages written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush, finish compression and hand back the inner writer.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if buffered frames cannot be flushed.
    pub fn close(self) -> Result<W> {
        self.sink.finish()
    }
}

impl<W: Write> RecordWriter for ProtoWriter<W> {
    type Record = Vec<u8>;

    fn write_record(&mut self, record: &Vec<u8>) -> Result<()> {
        self.write_frame(record)
    }

    fn encoded_len(&self, record: &Vec<u8>) -> u64 {
        (LENGTH_PREFIX_LEN + record.len()) as u64
    }

    fn close(self) -> Result<()> {
        ProtoWriter::close(self).map(drop)
    }
}

/// Reads length-prefixed protobuf messages.
pub struct ProtoReader<R: Read> {
    source: Source<R>,
    records: u64,
}

impl<R: Read> ProtoReader<R> {
    /// Create a reader over `inner`, buffered and decompressed per `options`.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] if `compression` is not compiled in.
    pub fn new(inner: R, compression: Compression, options: &Options) -> Result<Self> {
        Ok(Self::from_source(Source::new(inner, compression, options.buffer_size)?))
    }

    pub(crate) fn from_source(source: Source<R>) -> Self {
        Self { source, records: 0 }
    }

    /// Read the next message body without decoding it.
    ///
    /// # Errors
    /// Returns [`Error::Framing`] if the stream ends inside a length header or
    /// inside the body it announces.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; LENGTH_PREFIX_LEN];
        match read_full(&mut self.source, &mut header)? {
            0 => return Ok(None),
            LENGTH_PREFIX_LEN => {}
            n => {
                return Err(Error::framing(format!(
                    "truncated length header after record {}: {n} of {LENGTH_PREFIX_LEN} bytes",
                    self.records
                )));
            }
        }
        let len = u32::from_be_bytes(header) as usize;
        let mut body = Vec::with_capacity(len.min(MAX_PREALLOC));
        let got = (&mut self.source).take(len as u64).read_to_end(&mut body)?;
        if got < len {
            return Err(Error::framing(format!(
                "truncated record {}: expected {len} bytes, found {got}",
                self.records + 1
            )));
        }
        self.records += 1;
        Ok(Some(body))
    }

    /// Read and decode the next message.
    pub fn read<M: Message + Default>(&mut self) -> Result<Option<M>> {
        match self.read_frame()? {
            Some(body) => Ok(Some(M::decode(body.as_slice())?)),
            None => Ok(None),
        }
    }

    /// Read the next message into `holder`, replacing its contents.
    /// Returns `false` at end of stream, leaving `holder` untouched.
    pub fn read_to<M: Message>(&mut self, holder: &mut M) -> Result<bool> {
        match self.read_frame()? {
            Some(body) => {
                holder.clear();
                holder.merge(body.as_slice())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Wrap this reader so every frame must decode as `M`.
    pub fn checked<M: Message + Default>(self) -> CheckedProtoReader<M, R> {
        CheckedProtoReader {
            inner: self,
            _message: PhantomData,
        }
    }

    /// Frames read so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Release the underlying source.
    pub fn close(self) -> Result<()> {
        drop(self.source);
        Ok(())
    }
}

impl<R: Read> RecordReader for ProtoReader<R> {
    type Record = Vec<u8>;

    fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_frame()
    }

    fn close(self) -> Result<()> {
        ProtoReader::close(self)
    }
}

/// Frame reader that rejects frames which do not decode as `M`.
///
/// Records are still yielded as the original bytes so copying them
/// elsewhere is bit-exact, unknown fields included.
pub struct CheckedProtoReader<M, R: Read> {
    inner: ProtoReader<R>,
    _message: PhantomData<fn() -> M>,
}

impl<M: Message + Default, R: Read> RecordReader for CheckedProtoReader<M, R> {
    type Record = Vec<u8>;

    fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(body) = self.inner.read_frame()? else {
            return Ok(None);
        };
        M::decode(body.as_slice())
            .map_err(|e| Error::Decode(format!("record {}: {e}", self.inner.records)))?;
        Ok(Some(body))
    }

    fn close(self) -> Result<()> {
        self.inner.close()
    }
}

/// Fill `buf` as far as the stream allows, returning the byte count.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Point {
        #[prost(int32, tag = "1")]
        x: i32,
        #[prost(string, tag = "2")]
        label: String,
    }

    fn writer() -> ProtoWriter<Vec<u8>> {
        ProtoWriter::new(Vec::new(), Compression::None, &Options::default()).unwrap()
    }

    fn reader(bytes: Vec<u8>) -> ProtoReader<Cursor<Vec<u8>>> {
        ProtoReader::new(Cursor::new(bytes), Compression::None, &Options::default()).unwrap()
    }

    #[test]
    fn frame_is_big_endian_length_then_body() {
        let mut w = writer();
        let p = Point { x: 300, label: "abc".into() };
        let body = w.write(&p).unwrap();
        let bytes = w.close().unwrap();
        assert_eq!(&bytes[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..], body.as_slice());
        assert_eq!(bytes.len(), 4 + p.encoded_len());

        let mut r = reader(bytes);
        assert_eq!(r.read::<Point>().unwrap(), Some(p));
        assert_eq!(r.read::<Point>().unwrap(), None);
    }

    #[test]
    fn empty_message_has_zero_length_header() {
        let mut w = writer();
        w.write(&Point::default()).unwrap();
        let bytes = w.close().unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        let mut r = reader(bytes);
        assert_eq!(r.read::<Point>().unwrap(), Some(Point::default()));
    }

    #[test]
    fn short_header_is_a_framing_error() {
        let mut r = reader(vec![0, 0]);
        assert!(matches!(r.read_frame(), Err(Error::Framing(_))));
    }

    #[test]
    fn short_body_is_a_framing_error() {
        let mut bytes = 10u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut r = reader(bytes);
        let err = r.read_frame().unwrap_err();
        assert!(matches!(err, Error::Framing(ref m) if m.contains("expected 10 bytes, found 3")));
    }

    #[test]
    fn undecodable_body_is_a_decode_error() {
        let mut w = writer();
        w.write_frame(&[0xff, 0xff, 0xff]).unwrap();
        let mut r = reader(w.close().unwrap());
        assert!(matches!(r.read::<Point>(), Err(Error::Decode(_))));
    }

    #[test]
    fn read_to_replaces_holder() {
        let mut w = writer();
        w.write(&Point { x: 1, label: "one".into() }).unwrap();
        w.write(&Point { x: 2, label: String::new() }).unwrap();
        let mut r = reader(w.close().unwrap());
        let mut holder = Point::default();
        assert!(r.read_to(&mut holder).unwrap());
        assert_eq!(holder.label, "one");
        assert!(r.read_to(&mut holder).unwrap());
        assert_eq!(holder, Point { x: 2, label: String::new() });
        assert!(!r.read_to(&mut holder).unwrap());
        assert_eq!(r.records_read(), 2);
    }

    #[test]
    fn checked_reader_validates_but_keeps_bytes() {
        let mut w = writer();
        let body = w.write(&Point { x: 7, label: "seven".into() }).unwrap();
        w.write_frame(&[0xff]).unwrap();
        let mut r = reader(w.close().unwrap()).checked::<Point>();
        assert_eq!(r.read_record().unwrap(), Some(body));
        assert!(matches!(r.read_record(), Err(Error::Decode(_))));
    }
}
