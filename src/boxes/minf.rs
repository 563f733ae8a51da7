use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// The media-header child of `minf`; which one is present depends on
/// the track type.
#[derive(Clone, Debug)]
pub enum MediaHeader {
    Video(VideoMediaHeaderBox),
    Sound(SoundMediaHeaderBox),
    Null(NullMediaHeaderBox),
    Subtitle(SubtitleMediaHeaderBox),
}

impl Default for MediaHeader {
    fn default() -> MediaHeader {
        MediaHeader::Null(NullMediaHeaderBox::default())
    }
}

impl ToBytes for MediaHeader {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        match self {
            MediaHeader::Video(b) => b.to_bytes(stream),
            MediaHeader::Sound(b) => b.to_bytes(stream),
            MediaHeader::Null(b) => b.to_bytes(stream),
            MediaHeader::Subtitle(b) => b.to_bytes(stream),
        }
    }
}

/// 8.4.4 Media Information Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct MediaInformationBox {
    pub media_header: MediaHeader,
    pub data_information: DataInformationBox,
    pub sample_table: SampleTableBox,
}

impl MediaInformationBox {
    /// Read, with the handler type passed down from `mdia`.
    pub fn from_bytes_with_handler<R: ReadBytes>(
        stream: &mut R,
        handler: TrackType,
    ) -> io::Result<MediaInformationBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut media_header = None;
        let mut data_information = None;
        let mut sample_table = None;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"vmhd" => {
                    media_header = Some(MediaHeader::Video(VideoMediaHeaderBox::from_bytes(stream)?))
                },
                b"smhd" => {
                    media_header = Some(MediaHeader::Sound(SoundMediaHeaderBox::from_bytes(stream)?))
                },
                b"nmhd" => {
                    media_header = Some(MediaHeader::Null(NullMediaHeaderBox::from_bytes(stream)?))
                },
                b"sthd" => {
                    media_header = Some(MediaHeader::Subtitle(SubtitleMediaHeaderBox::from_bytes(
                        stream,
                    )?))
                },
                b"dinf" => data_information = Some(DataInformationBox::from_bytes(stream)?),
                b"stbl" => {
                    sample_table = Some(SampleTableBox::from_bytes_with_handler(stream, handler)?)
                },
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let media_header = media_header.ok_or_else(|| ioerr!(InvalidData, "minf: missing media header"))?;
        let data_information = data_information.ok_or_else(|| ioerr!(InvalidData, "minf: missing dinf"))?;
        let sample_table = sample_table.ok_or_else(|| ioerr!(InvalidData, "minf: missing stbl"))?;

        Ok(MediaInformationBox {
            media_header,
            data_information,
            sample_table,
        })
    }
}

impl ToBytes for MediaInformationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.media_header.to_bytes(writer)?;
        self.data_information.to_bytes(writer)?;
        self.sample_table.to_bytes(writer)?;

        writer.finalize()
    }
}

impl BoxInfo for MediaInformationBox {
    const FOURCC: &'static str = "minf";

    fn fourcc(&self) -> FourCC {
        FourCC::new("minf")
    }
}

impl FullBox for MediaInformationBox {}
