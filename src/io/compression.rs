//! Transparent gzip support for record streams.
//!
//! Every stream in this crate sits on top of a [`Sink`] (writing) or a
//! [`Source`] (reading). Both are buffered with the configured capacity and
//! optionally wrap the byte stream in a gzip encoder/decoder.
//!
//! ## Detection
//! - Writers opened by path compress when the name ends in `.gz` or `.gzip`
//!   (case-insensitive).
//! - Readers opened by path check the extension first and fall back to the
//!   gzip magic bytes (`1f 8b`) when the name does not say.
//! - Streams opened over an existing handle take an explicit `with_gzip` flag.
//!
//! ## Closing
//! Dropping a [`Sink`] flushes on a best-effort basis and swallows errors.
//! Call [`Sink::finish`] to flush, write the gzip trailer and observe any
//! failure; a close error after a successful last write still means data loss.

use crate::error::Result;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "compression-gzip")]
use flate2::{read::MultiGzDecoder, write::GzEncoder};

/// Compression applied to a stream's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    /// `Gzip` when `with_gzip` is set, `None` otherwise.
    pub fn from_gzip_flag(with_gzip: bool) -> Self {
        if with_gzip {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// Detect compression from the file name suffix.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        if Compression::Gzip
            .extensions()
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// File suffixes associated with this codec, lowercase with the leading dot.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Compression::None => &[],
            Compression::Gzip => &[".gz", ".gzip"],
        }
    }

    fn magic_bytes(&self) -> Option<&'static [u8]> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some(&[0x1f, 0x8b]),
        }
    }

    /// Peek at the start of a buffered reader without consuming it.
    fn detect_from_magic<R: BufRead>(reader: &mut R) -> io::Result<Self> {
        let buf = reader.fill_buf()?;
        match Compression::Gzip.magic_bytes() {
            Some(magic) if buf.starts_with(magic) => Ok(Compression::Gzip),
            _ => Ok(Compression::None),
        }
    }

    fn ensure_available(&self) -> Result<()> {
        match self {
            Compression::None => Ok(()),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => Ok(()),
            #[cfg(not(feature = "compression-gzip"))]
            Compression::Gzip => Err(crate::error::Error::Unsupported(
                "gzip support requires the `compression-gzip` feature".into(),
            )),
        }
    }
}

/// Buffered, optionally compressing byte sink.
pub enum Sink<W: Write> {
    Plain(BufWriter<W>),
    #[cfg(feature = "compression-gzip")]
    Gzip(GzEncoder<BufWriter<W>>),
}

impl<W: Write> Sink<W> {
    /// Wrap `inner` with a buffer of `buffer_size` bytes and the given codec.
    ///
    /// `level` is the gzip compression level and is ignored for plain sinks.
    pub fn new(inner: W, compression: Compression, buffer_size: usize, level: u32) -> Result<Self> {
        compression.ensure_available()?;
        let buffered = BufWriter::with_capacity(buffer_size.max(1), inner);
        match compression {
            Compression::None => Ok(Sink::Plain(buffered)),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => Ok(Sink::Gzip(GzEncoder::new(
                buffered,
                flate2::Compression::new(level.min(9)),
            ))),
            #[cfg(not(feature = "compression-gzip"))]
            Compression::Gzip => {
                let _ = level;
                Err(crate::error::Error::Unsupported("gzip".into()))
            }
        }
    }

    /// Codec this sink writes with.
    pub fn compression(&self) -> Compression {
        match self {
            Sink::Plain(_) => Compression::None,
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(_) => Compression::Gzip,
        }
    }

    /// Flush every layer, finish the compressed stream and return the inner writer.
    ///
    /// # Errors
    /// Returns [`Error::Io`](crate::Error::Io) if the gzip trailer or any
    /// buffered bytes cannot be written, or if the inner writer fails to flush.
    pub fn finish(self) -> Result<W> {
        let buffered = match self {
            Sink::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(enc) => enc.finish()?,
        };
        let mut inner = buffered.into_inner().map_err(|e| e.into_error())?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.write_all(buf),
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Buffered, optionally decompressing byte source.
pub enum Source<R: Read> {
    Plain(BufReader<R>),
    #[cfg(feature = "compression-gzip")]
    Gzip(BufReader<MultiGzDecoder<BufReader<R>>>),
}

impl<R: Read> Source<R> {
    /// Wrap `inner` with a buffer of `buffer_size` bytes and the given codec.
    pub fn new(inner: R, compression: Compression, buffer_size: usize) -> Result<Self> {
        compression.ensure_available()?;
        Self::from_buffered(BufReader::with_capacity(buffer_size.max(1), inner), compression, buffer_size)
    }

    /// Like [`Source::new`], detecting the codec from `path_hint` and then
    /// from the stream's leading bytes.
    pub fn detect(inner: R, path_hint: impl AsRef<Path>, buffer_size: usize) -> Result<Self> {
        let by_name = Compression::from_path(path_hint);
        if by_name != Compression::None {
            return Self::new(inner, by_name, buffer_size);
        }
        let mut buffered = BufReader::with_capacity(buffer_size.max(1), inner);
        let by_magic = Compression::detect_from_magic(&mut buffered)?;
        if by_magic.ensure_available().is_err() {
            // Without the codec the bytes are handed through untouched.
            return Ok(Source::Plain(buffered));
        }
        Self::from_buffered(buffered, by_magic, buffer_size)
    }

    fn from_buffered(buffered: BufReader<R>, compression: Compression, buffer_size: usize) -> Result<Self> {
        match compression {
            Compression::None => Ok(Source::Plain(buffered)),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => Ok(Source::Gzip(BufReader::with_capacity(
                buffer_size.max(1),
                MultiGzDecoder::new(buffered),
            ))),
            #[cfg(not(feature = "compression-gzip"))]
            Compression::Gzip => {
                let _ = (buffered, buffer_size);
                Err(crate::error::Error::Unsupported("gzip".into()))
            }
        }
    }

    /// Codec this source reads with.
    pub fn compression(&self) -> Compression {
        match self {
            Source::Plain(_) => Compression::None,
            #[cfg(feature = "compression-gzip")]
            Source::Gzip(_) => Compression::Gzip,
        }
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            #[cfg(feature = "compression-gzip")]
            Source::Gzip(r) => r.read(buf),
        }
    }
}

impl<R: Read> BufRead for Source<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Source::Plain(r) => r.fill_buf(),
            #[cfg(feature = "compression-gzip")]
            Source::Gzip(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Source::Plain(r) => r.consume(amt),
            #[cfg(feature = "compression-gzip")]
            Source::Gzip(r) => r.consume(amt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    /// Accepts nothing; every write and flush fails.
    struct Unwritable;

    impl Write for Unwritable {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk gone"))
        }
    }

    fn finish_over_unwritable(compression: Compression) -> Result<Unwritable> {
        let mut sink = Sink::new(Unwritable, compression, 64 * 1024, 6)?;
        // Fits in the buffer, so the failure only shows up at finish.
        sink.write_all(b"buffered but never stored\n")?;
        sink.finish()
    }

    #[test]
    fn plain_finish_reports_flush_failure() {
        let err = finish_over_unwritable(Compression::None).err().unwrap();
        assert!(matches!(err, Error::Io(ref e) if e.to_string().contains("disk gone")));
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_finish_reports_flush_failure() {
        let err = finish_over_unwritable(Compression::Gzip).err().unwrap();
        assert!(matches!(err, Error::Io(ref e) if e.to_string().contains("disk gone")));
    }

    #[test]
    fn extension_detection_is_case_insensitive() {
        assert_eq!(Compression::from_path("a/b/data.json.gz"), Compression::Gzip);
        assert_eq!(Compression::from_path("DATA.CSV.GZ"), Compression::Gzip);
        assert_eq!(Compression::from_path("x.gzip"), Compression::Gzip);
        assert_eq!(Compression::from_path("x.json"), Compression::None);
        assert_eq!(Compression::from_path("gz"), Compression::None);
    }

    #[test]
    fn plain_sink_returns_inner_bytes() {
        let mut sink = Sink::new(Vec::new(), Compression::None, 8, 6).unwrap();
        sink.write_all(b"hello world").unwrap();
        assert_eq!(sink.finish().unwrap(), b"hello world");
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_roundtrip_and_magic_detection() {
        let mut sink = Sink::new(Vec::new(), Compression::Gzip, 16, 6).unwrap();
        assert_eq!(sink.compression(), Compression::Gzip);
        sink.write_all(b"line one\nline two\n").unwrap();
        let bytes = sink.finish().unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

        let mut src = Source::detect(Cursor::new(bytes), "no-extension", 16).unwrap();
        assert_eq!(src.compression(), Compression::Gzip);
        let mut out = String::new();
        src.read_to_string(&mut out).unwrap();
        assert_eq!(out, "line one\nline two\n");
    }

    #[test]
    fn detect_leaves_plain_bytes_intact() {
        let mut src = Source::detect(Cursor::new(b"abc".to_vec()), "file.txt", 4).unwrap();
        assert_eq!(src.compression(), Compression::None);
        let mut out = Vec::new();
        src.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }
}
