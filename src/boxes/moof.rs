use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// 8.8.4 Movie Fragment Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct MovieFragmentBox {
    pub header: MovieFragmentHeaderBox,
    pub tracks: Vec<TrackFragmentBox>,
    pub pssh: Vec<PsshBox>,
}

impl FromBytes for MovieFragmentBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MovieFragmentBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut header = None;
        let mut tracks = Vec::new();
        let mut pssh = Vec::new();
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"mfhd" => header = Some(MovieFragmentHeaderBox::from_bytes(stream)?),
                b"traf" => tracks.push(TrackFragmentBox::from_bytes(stream)?),
                b"pssh" => pssh.push(PsshBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let header = header.ok_or_else(|| ioerr!(InvalidData, "moof: missing mfhd"))?;
        if tracks.is_empty() {
            return Err(ioerr!(InvalidData, "moof: no track fragments"));
        }

        Ok(MovieFragmentBox { header, tracks, pssh })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for MovieFragmentBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.header.to_bytes(writer)?;
        for traf in &self.tracks {
            traf.to_bytes(writer)?;
        }
        for pssh in &self.pssh {
            pssh.to_bytes(writer)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for MovieFragmentBox {
    const FOURCC: &'static str = "moof";

    fn fourcc(&self) -> FourCC {
        FourCC::new("moof")
    }
}

impl FullBox for MovieFragmentBox {}
