use std::io;

use crate::boxes::prelude::*;

/// 8.7.5 Chunk Offset Box (ISO/IEC 14496-12:2015(E))
///
/// Implements both "stco" and "co64": one table of 64-bit offsets,
/// with the wide form chosen at serialize time.
#[derive(Clone, Debug, Default)]
pub struct ChunkOffsetBox {
    pub entries: Vec<u64>,
}

pub type ChunkLargeOffsetBox = ChunkOffsetBox;

impl ChunkOffsetBox {
    // stco iff every offset fits in 32 bits.
    fn is_wide(&self) -> bool {
        self.entries.iter().any(|&e| e > u32::MAX as u64)
    }
}

impl FromBytes for ChunkOffsetBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ChunkOffsetBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let wide = reader.header.fourcc == b"co64";
        let stream = &mut reader;

        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::with_capacity(std::cmp::min(count as usize, 65536));
        while (entries.len() as u32) < count && stream.left() >= 4 {
            if wide {
                entries.push(u64::from_bytes(stream)?);
            } else {
                entries.push(u32::from_bytes(stream)? as u64);
            }
        }

        Ok(ChunkOffsetBox { entries })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ChunkOffsetBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let wide = self.is_wide();
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        (self.entries.len() as u32).to_bytes(stream)?;
        for e in &self.entries {
            if wide {
                e.to_bytes(stream)?;
            } else {
                (*e as u32).to_bytes(stream)?;
            }
        }

        writer.finalize()
    }
}

impl BoxInfo for ChunkOffsetBox {
    const FOURCC: &'static str = "stco";

    fn fourcc(&self) -> FourCC {
        if self.is_wide() {
            FourCC::new("co64")
        } else {
            FourCC::new("stco")
        }
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for ChunkOffsetBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}
