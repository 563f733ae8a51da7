use std::io;

use crate::boxes::prelude::*;

/// Protection System Specific Header box (ISO/IEC 23001-7).
///
/// The payload is DRM-system opaque and is carried verbatim: the bytes
/// a key system hands us go out again unmodified, version/flags and
/// system id included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PsshBox {
    pub data: Data,
}

impl PsshBox {
    /// Wrap a complete `pssh` box (header included) as produced by a
    /// key system. The 8-byte header is stripped and regenerated on
    /// write, so the output is byte-identical to the input.
    pub fn from_raw_box(raw: &[u8]) -> io::Result<PsshBox> {
        if raw.len() < 8 {
            return Err(ioerr!(InvalidData, "pssh blob too short"));
        }
        let size = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        if &raw[4..8] != b"pssh" || size != raw.len() {
            return Err(ioerr!(InvalidData, "pssh blob is not a valid pssh box"));
        }
        Ok(PsshBox {
            data: Data(raw[8..].to_vec()),
        })
    }
}

impl FromBytes for PsshBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<PsshBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let data = Data::from_bytes(&mut reader)?;
        Ok(PsshBox { data })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for PsshBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        self.data.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for PsshBox {
    const FOURCC: &'static str = "pssh";

    fn fourcc(&self) -> FourCC {
        FourCC::new("pssh")
    }
}

impl FullBox for PsshBox {}
