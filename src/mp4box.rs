//! Box header parsing and the `BoxReader` / `BoxWriter` plumbing.
//!
//! A box is serialized as `[size: u32][fourcc]`, optionally followed by
//! a 64-bit large size (signalled by `size == 1`), and for a FullBox by
//! `[version: u8][flags: u24]`. The writer writes a provisional header
//! first and patches the size field when the box is finalized, so a box
//! never needs to know its own size up front.
use std::fmt::Debug;
use std::io;

use crate::io::CountBytes;
use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::{Data, FourCC};

/// Implemented by every box.
pub trait BoxInfo {
    /// The fourcc of this box type ("moov", "trak", ...).
    const FOURCC: &'static str = "";

    /// The fourcc, as a value (some boxes choose it at runtime).
    fn fourcc(&self) -> FourCC;

    /// Highest FullBox version we can read. `None` for plain boxes.
    fn max_version() -> Option<u8>
    where
        Self: Sized,
    {
        None
    }
}

/// Version and flags of a FullBox.
///
/// Boxes that are not FullBoxes keep the default impl (`version()`
/// returns `None` and no version/flags prefix is serialized).
pub trait FullBox {
    fn version(&self) -> Option<u8> {
        None
    }
    fn flags(&self) -> u32 {
        0
    }
}

/// The header of a box, as found in the bytestream.
#[derive(Clone, Debug)]
pub struct BoxHeader {
    /// Total size of the box, including this header. 0 means "to EOF".
    pub size: u64,
    pub fourcc: FourCC,
    /// Number of bytes the header occupied (8, or 16 for large boxes,
    /// +4 when version/flags were present and parsed).
    pub header_len: u64,
    /// FullBox version, if this box was read as a FullBox.
    pub version: Option<u8>,
    pub flags: u32,
}

impl BoxHeader {
    /// Look at the next box header without consuming it.
    ///
    /// Used to decide how to dispatch; version/flags are not read.
    pub fn peek<R: ReadBytes>(stream: &mut R) -> io::Result<BoxHeader> {
        if stream.left() < 8 {
            return Err(ioerr!(UnexpectedEof, "truncated box header"));
        }
        let peek_len = std::cmp::min(16, stream.left());
        let data = stream.peek(peek_len)?;
        let size1 = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let fourcc = FourCC(u32::from_be_bytes([data[4], data[5], data[6], data[7]]));
        let (size, header_len) = match size1 {
            0 => (0, 8),
            1 => {
                if data.len() < 16 {
                    return Err(ioerr!(UnexpectedEof, "truncated large box header"));
                }
                let large = u64::from_be_bytes(data[8..16].try_into().unwrap());
                (large, 16)
            },
            sz => (sz as u64, 8),
        };
        Ok(BoxHeader {
            size,
            fourcc,
            header_len,
            version: None,
            flags: 0,
        })
    }

    // Consume the header. Reads version/flags iff `max_version` says
    // this box type is a FullBox.
    fn read<R: ReadBytes>(stream: &mut R, max_version: Option<u8>) -> io::Result<BoxHeader> {
        let size1 = u32::from_bytes(stream)?;
        let fourcc = FourCC::from_bytes(stream)?;
        let (size, mut header_len) = match size1 {
            0 => (stream.left() + 8, 8u64),
            1 => (u64::from_bytes(stream)?, 16),
            sz => (sz as u64, 8),
        };
        if size < header_len {
            return Err(ioerr!(InvalidData, "{}: invalid box size {}", fourcc, size));
        }
        if size - header_len > stream.left() {
            return Err(ioerr!(
                InvalidData,
                "{}: box size {} larger than container",
                fourcc,
                size
            ));
        }
        let mut version = None;
        let mut flags = 0;
        if max_version.is_some() {
            if size - header_len < 4 {
                return Err(ioerr!(InvalidData, "{}: truncated fullbox header", fourcc));
            }
            let vf = u32::from_bytes(stream)?;
            version = Some((vf >> 24) as u8);
            flags = vf & 0x00ff_ffff;
            header_len += 4;
        }
        Ok(BoxHeader {
            size,
            fourcc,
            header_len,
            version,
            flags,
        })
    }
}

/// Reads one box: parses the header, then acts as a size-limited
/// `ReadBytes` over the box payload. Skips any unread payload on drop.
pub struct BoxReader<'a> {
    pub header: BoxHeader,
    maxsize: u64,
    inner: Box<dyn ReadBytes + 'a>,
}

impl<'a> BoxReader<'a> {
    /// Read the box header, then return a size-limited reader.
    pub fn new(mut stream: &'a mut impl ReadBytes, max_version: Option<u8>) -> io::Result<BoxReader<'a>> {
        let start = stream.pos();
        let header = BoxHeader::read(&mut stream, max_version)?;
        if let (Some(version), Some(max)) = (header.version, max_version) {
            if version > max {
                return Err(ioerr!(
                    InvalidData,
                    "{}: no support for version {}",
                    header.fourcc,
                    version
                ));
            }
        }
        let maxsize = std::cmp::min(stream.size(), start + header.size);
        Ok(BoxReader {
            header,
            maxsize,
            inner: Box::new(stream),
        })
    }
}

impl<'a> Drop for BoxReader<'a> {
    fn drop(&mut self) {
        let pos = self.inner.pos();
        if pos < self.maxsize {
            log::trace!(
                "BoxReader {} drop: skipping {}",
                self.header.fourcc,
                self.maxsize - pos
            );
            let _ = self.inner.skip(self.maxsize - pos);
        }
    }
}

impl<'a> ReadBytes for BoxReader<'a> {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let amount = if amount == 0 { self.left() } else { amount };
        if amount == 0 {
            return Ok(b"");
        }
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof));
        }
        self.inner.read(amount)
    }
    fn peek(&mut self, amount: u64) -> io::Result<&[u8]> {
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof));
        }
        self.inner.peek(amount)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof));
        }
        self.inner.skip(amount)
    }
    fn left(&mut self) -> u64 {
        let pos = self.inner.pos();
        if pos > self.maxsize {
            0
        } else {
            self.maxsize - pos
        }
    }
}

impl<'a> BoxBytes for BoxReader<'a> {
    fn pos(&mut self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.maxsize {
            return Err(ioerr!(UnexpectedEof));
        }
        self.inner.seek(pos)
    }
    fn size(&self) -> u64 {
        self.maxsize
    }
    fn version(&self) -> u8 {
        match self.header.version {
            Some(v) => v,
            None => self.inner.version(),
        }
    }
    fn flags(&self) -> u32 {
        match self.header.version {
            Some(_) => self.header.flags,
            None => self.inner.flags(),
        }
    }
}

/// Writes one box: provisional header first, then the payload through
/// this writer, then `finalize()` patches the size field in place.
pub struct BoxWriter<'a> {
    offset: u64,
    version: Option<u8>,
    flags: u32,
    finalized: bool,
    inner: Box<dyn WriteBytes + 'a>,
}

impl<'a> BoxWriter<'a> {
    pub fn new<B>(mut stream: &'a mut impl WriteBytes, b: &B) -> io::Result<BoxWriter<'a>>
    where
        B: BoxInfo + FullBox,
    {
        let offset = stream.pos();
        0u32.to_bytes(&mut stream)?;
        b.fourcc().to_bytes(&mut stream)?;
        let version = b.version();
        let flags = b.flags();
        if let Some(v) = version {
            (((v as u32) << 24) | (flags & 0x00ff_ffff)).to_bytes(&mut stream)?;
        }
        Ok(BoxWriter {
            offset,
            version,
            flags,
            finalized: false,
            inner: Box::new(stream),
        })
    }

    /// Patch the size field in the box header.
    ///
    /// If you don't call this explicitly it runs on drop, but then any
    /// I/O errors are silently lost.
    pub fn finalize(&mut self) -> io::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        let pos = self.inner.pos();
        let sz = pos - self.offset;
        if sz > u32::MAX as u64 {
            return Err(ioerr!(InvalidData, "box size {} too large", sz));
        }
        self.inner.seek(self.offset)?;
        (sz as u32).to_bytes(&mut self.inner)?;
        self.inner.seek(pos)?;
        Ok(())
    }
}

impl<'a> Drop for BoxWriter<'a> {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}

impl<'a> WriteBytes for BoxWriter<'a> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write(data)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        self.inner.skip(amount)
    }
}

impl<'a> BoxBytes for BoxWriter<'a> {
    fn pos(&mut self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(pos)
    }
    fn size(&self) -> u64 {
        self.inner.size()
    }
    fn version(&self) -> u8 {
        match self.version {
            Some(v) => v,
            None => self.inner.version(),
        }
    }
    fn flags(&self) -> u32 {
        match self.version {
            Some(_) => self.flags,
            None => self.inner.flags(),
        }
    }
}

/// Serialized size of a box, in bytes.
pub fn box_size(b: &impl ToBytes) -> u64 {
    let mut cb = CountBytes::new();
    b.to_bytes(&mut cb).expect("counting serialized size failed");
    cb.size()
}

/// Any box we do not know is kept as a `GenericBox`: fourcc plus the
/// payload, byte for byte. An unknown FullBox keeps its version/flags
/// as part of the payload, so it round-trips unchanged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GenericBox {
    pub fourcc: FourCC,
    pub data: Data,
}

impl FromBytes for GenericBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<GenericBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let fourcc = reader.header.fourcc;
        let data = Data::from_bytes(&mut reader)?;
        Ok(GenericBox { fourcc, data })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for GenericBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        self.data.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for GenericBox {
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

impl FullBox for GenericBox {}

impl Debug for GenericBox {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut dbg = f.debug_struct("GenericBox");
        dbg.field("fourcc", &self.fourcc);
        dbg.field("data", &self.data);
        dbg.finish()
    }
}
