use std::io;

use crate::boxes::prelude::*;

/// 8.7.3.2 Sample Size Box (ISO/IEC 14496-12:2015(E))
///
/// If all samples have the same size, `size` is that size and the
/// entries table is empty.
#[derive(Clone, Debug, Default)]
pub struct SampleSizeBox {
    pub size: u32,
    pub count: u32,
    pub entries: Vec<u32>,
}

impl FromBytes for SampleSizeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleSizeBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let size = u32::from_bytes(stream)?;
        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::new();
        if size == 0 {
            entries.reserve(std::cmp::min(count as usize, 65536));
            while (entries.len() as u32) < count && stream.left() >= 4 {
                entries.push(u32::from_bytes(stream)?);
            }
        }

        Ok(SampleSizeBox { size, count, entries })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for SampleSizeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        self.size.to_bytes(stream)?;
        if self.size != 0 {
            self.count.to_bytes(stream)?;
        } else {
            (self.entries.len() as u32).to_bytes(stream)?;
            for e in &self.entries {
                e.to_bytes(stream)?;
            }
        }

        writer.finalize()
    }
}

impl BoxInfo for SampleSizeBox {
    const FOURCC: &'static str = "stsz";

    fn fourcc(&self) -> FourCC {
        FourCC::new("stsz")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for SampleSizeBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

/// 8.7.3.3 Compact Sample Size Box (ISO/IEC 14496-12:2015(E))
///
/// Read for symmetry; the writer always emits `stsz`.
#[derive(Clone, Debug, Default)]
pub struct CompactSampleSizeBox {
    pub field_size: u8,
    pub entries: Vec<u32>,
}

impl FromBytes for CompactSampleSizeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<CompactSampleSizeBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        stream.skip(3)?;
        let field_size = u8::from_bytes(stream)?;
        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::new();
        match field_size {
            4 => {
                while (entries.len() as u32) < count && stream.left() > 0 {
                    let b = u8::from_bytes(stream)?;
                    entries.push((b >> 4) as u32);
                    if (entries.len() as u32) < count {
                        entries.push((b & 0x0f) as u32);
                    }
                }
            },
            8 => {
                while (entries.len() as u32) < count && stream.left() > 0 {
                    entries.push(u8::from_bytes(stream)? as u32);
                }
            },
            16 => {
                while (entries.len() as u32) < count && stream.left() >= 2 {
                    entries.push(u16::from_bytes(stream)? as u32);
                }
            },
            sz => return Err(ioerr!(InvalidData, "stz2: invalid field size {}", sz)),
        }

        Ok(CompactSampleSizeBox { field_size, entries })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for CompactSampleSizeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        stream.skip(3)?;
        self.field_size.to_bytes(stream)?;
        (self.entries.len() as u32).to_bytes(stream)?;
        match self.field_size {
            4 => {
                for pair in self.entries.chunks(2) {
                    let hi = (pair[0] & 0x0f) as u8;
                    let lo = if pair.len() > 1 { (pair[1] & 0x0f) as u8 } else { 0 };
                    ((hi << 4) | lo).to_bytes(stream)?;
                }
            },
            8 => {
                for e in &self.entries {
                    (*e as u8).to_bytes(stream)?;
                }
            },
            16 => {
                for e in &self.entries {
                    (*e as u16).to_bytes(stream)?;
                }
            },
            sz => return Err(ioerr!(InvalidData, "stz2: invalid field size {}", sz)),
        }

        writer.finalize()
    }
}

impl BoxInfo for CompactSampleSizeBox {
    const FOURCC: &'static str = "stz2";

    fn fourcc(&self) -> FourCC {
        FourCC::new("stz2")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for CompactSampleSizeBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}
