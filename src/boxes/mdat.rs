use std::io;

use crate::boxes::prelude::*;

/// 8.1.1 Media Data Box (ISO/IEC 14496-12:2015(E))
///
/// The only box that can need a 64-bit large-size header. Chunk
/// offsets and `trun.data_offset` values point at the first byte
/// after this box's header.
#[derive(Clone, Debug, Default)]
pub struct MediaDataBox {
    pub data: Data,
}

impl MediaDataBox {
    /// Size of the header that will precede `data` when written.
    pub fn header_len(&self) -> u64 {
        if self.is_large() {
            16
        } else {
            8
        }
    }

    fn is_large(&self) -> bool {
        self.data.len() as u64 + 8 > u32::MAX as u64
    }
}

impl FromBytes for MediaDataBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MediaDataBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let data = Data::from_bytes(&mut reader)?;
        Ok(MediaDataBox { data })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for MediaDataBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        // Write the header by hand; BoxWriter only does 32-bit sizes.
        let fourcc = FourCC::new("mdat");
        if self.is_large() {
            1u32.to_bytes(stream)?;
            fourcc.to_bytes(stream)?;
            (self.data.len() as u64 + 16).to_bytes(stream)?;
        } else {
            (self.data.len() as u32 + 8).to_bytes(stream)?;
            fourcc.to_bytes(stream)?;
        }
        self.data.to_bytes(stream)
    }
}

impl BoxInfo for MediaDataBox {
    const FOURCC: &'static str = "mdat";

    fn fourcc(&self) -> FourCC {
        FourCC::new("mdat")
    }
}

impl FullBox for MediaDataBox {}
