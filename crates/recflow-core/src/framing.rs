//! TFRecord framing: length-prefixed records with masked CRC32C checksums.
//!
//! Each record on disk is laid out as
//!
//! ```text
//! u64 LE  payload length
//! u32 LE  masked crc32c of the 8 length bytes
//! [u8]    payload
//! u32 LE  masked crc32c of the payload
//! ```
//!
//! Files ending in `.gz` hold the same stream behind gzip compression.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::FrameError;

const MASK_DELTA: u32 = 0xa282_ead8;

const HEADER_LEN: usize = 12;
const FOOTER_LEN: usize = 4;

/// Largest payload buffer reserved up front from a frame header (1MB)
const MAX_PREALLOC: usize = 1024 * 1024;

/// Buffer size for file readers/writers (256KB)
const IO_BUF_SIZE: usize = 256 * 1024;

/// Masked CRC32C as used by TFRecord
pub fn masked_crc(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Container compression, inferred from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext == "gz") {
            Self::Gzip
        } else {
            Self::None
        }
    }

    /// File suffix appended to generated output names
    pub fn suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
        }
    }
}

/// Sequential reader of framed records
pub struct RecordReader<R> {
    inner: R,
    verify: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            verify: true,
        }
    }

    /// Skip checksum verification (faster, no corruption detection)
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Read the next record payload.
    ///
    /// Returns `Ok(None)` on a clean EOF between records.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut header = [0u8; HEADER_LEN];
        let got = read_full(&mut self.inner, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return Err(FrameError::Truncated {
                expected: HEADER_LEN,
                actual: got,
            });
        }

        let (len_bytes, len_crc) = header.split_at(8);
        if self.verify {
            let expected = u32::from_le_bytes(len_crc.try_into().expect("4-byte slice"));
            let actual = masked_crc(len_bytes);
            if expected != actual {
                return Err(FrameError::LengthChecksum { expected, actual });
            }
        }
        let len = u64::from_le_bytes(len_bytes.try_into().expect("8-byte slice"));
        let len = usize::try_from(len).map_err(|_| FrameError::TooLarge(len))?;

        // The header length is untrusted: grow with the bytes actually read
        let mut payload = Vec::with_capacity(len.min(MAX_PREALLOC));
        let got = (&mut self.inner).take(len as u64).read_to_end(&mut payload)?;
        if got < len {
            return Err(FrameError::Truncated {
                expected: len,
                actual: got,
            });
        }

        let mut footer = [0u8; FOOTER_LEN];
        let got = read_full(&mut self.inner, &mut footer)?;
        if got < FOOTER_LEN {
            return Err(FrameError::Truncated {
                expected: FOOTER_LEN,
                actual: got,
            });
        }
        if self.verify {
            let expected = u32::from_le_bytes(footer);
            let actual = masked_crc(&payload);
            if expected != actual {
                return Err(FrameError::DataChecksum { expected, actual });
            }
        }

        Ok(Some(payload))
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read (short only at EOF)
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Writer of framed records
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = (payload.len() as u64).to_le_bytes();
        self.inner.write_all(&len)?;
        self.inner.write_all(&masked_crc(&len).to_le_bytes())?;
        self.inner.write_all(payload)?;
        self.inner.write_all(&masked_crc(payload).to_le_bytes())
    }

    /// Flush buffered frames and hand back the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Boxed reader over a plain or gzip-compressed source file
pub type SourceReader = RecordReader<Box<dyn Read + Send>>;

/// Open a record file for sequential reading, picking compression by extension
pub fn open_records(path: &Path, verify: bool) -> io::Result<SourceReader> {
    let file = File::open(path)?;
    let inner: Box<dyn Read + Send> = match Compression::from_path(path) {
        Compression::None => Box::new(BufReader::with_capacity(IO_BUF_SIZE, file)),
        Compression::Gzip => Box::new(BufReader::with_capacity(
            IO_BUF_SIZE,
            MultiGzDecoder::new(BufReader::new(file)),
        )),
    };
    Ok(RecordReader::new(inner).with_verify(verify))
}

/// Output stream of a record file, plain or gzip
pub enum FileOutput {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FileOutput {
    pub fn new(file: File, compression: Compression) -> Self {
        let buf = BufWriter::with_capacity(IO_BUF_SIZE, file);
        match compression {
            Compression::None => Self::Plain(buf),
            // GzBuilder defaults to mtime 0, keeping output reproducible
            Compression::Gzip => Self::Gzip(GzEncoder::new(buf, flate2::Compression::default())),
        }
    }

    /// Flush buffers (and the gzip trailer) and sync to disk
    pub fn finish(self) -> io::Result<()> {
        let buf = match self {
            Self::Plain(buf) => buf,
            Self::Gzip(gz) => gz.finish()?,
        };
        let file = buf.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Iterator over the raw payloads of a single file, in file order.
///
/// Used where a deterministic sequential read is required (sharding).
pub struct FileRecords {
    path: PathBuf,
    reader: SourceReader,
    index: usize,
    done: bool,
}

impl FileRecords {
    pub fn open(path: impl Into<PathBuf>, verify: bool) -> io::Result<Self> {
        let path = path.into();
        let reader = open_records(&path, verify)?;
        Ok(Self {
            path,
            reader,
            index: 0,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for FileRecords {
    type Item = Result<Vec<u8>, (usize, FrameError)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_record() {
            Ok(Some(raw)) => {
                self.index += 1;
                Some(Ok(raw))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err((self.index, e)))
            }
        }
    }
}
