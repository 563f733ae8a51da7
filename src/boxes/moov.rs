use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// 8.2.1 Movie Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct MovieBox {
    pub header: MovieHeaderBox,
    pub extends: Option<MovieExtendsBox>,
    pub tracks: Vec<TrackBox>,
    pub pssh: Vec<PsshBox>,
}

impl MovieBox {
    /// Get a track by its track id.
    pub fn track_by_id(&self, track_id: u32) -> Option<&TrackBox> {
        self.tracks.iter().find(|t| t.track_id() == track_id)
    }
}

impl FromBytes for MovieBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MovieBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut header = None;
        let mut extends = None;
        let mut tracks = Vec::new();
        let mut pssh = Vec::new();
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"mvhd" => header = Some(MovieHeaderBox::from_bytes(stream)?),
                b"mvex" => extends = Some(MovieExtendsBox::from_bytes(stream)?),
                b"trak" => tracks.push(TrackBox::from_bytes(stream)?),
                b"pssh" => pssh.push(PsshBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let header = header.ok_or_else(|| ioerr!(InvalidData, "moov: missing mvhd"))?;
        if tracks.is_empty() {
            return Err(ioerr!(InvalidData, "moov: no tracks"));
        }

        Ok(MovieBox {
            header,
            extends,
            tracks,
            pssh,
        })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for MovieBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.header.to_bytes(writer)?;
        if let Some(ref mvex) = self.extends {
            mvex.to_bytes(writer)?;
        }
        for track in &self.tracks {
            track.to_bytes(writer)?;
        }
        for pssh in &self.pssh {
            pssh.to_bytes(writer)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for MovieBox {
    const FOURCC: &'static str = "moov";

    fn fourcc(&self) -> FourCC {
        FourCC::new("moov")
    }
}

impl FullBox for MovieBox {}
