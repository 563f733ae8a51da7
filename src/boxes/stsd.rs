use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// The handler type of a track, from `hdlr.handler_type`.
///
/// A sample entry cannot be parsed from its fourcc alone (audio and
/// video entries share the same reserved prefix), so the handler type
/// is passed down to the sample description explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackType {
    Video,
    Audio,
    Text,
    Subtitle,
}

impl TrackType {
    pub fn from_handler(handler: FourCC) -> Option<TrackType> {
        match &handler.to_be_bytes() {
            b"vide" => Some(TrackType::Video),
            b"soun" => Some(TrackType::Audio),
            b"text" => Some(TrackType::Text),
            b"subt" => Some(TrackType::Subtitle),
            _ => None,
        }
    }

    pub fn handler(&self) -> FourCC {
        match self {
            TrackType::Video => FourCC::new("vide"),
            TrackType::Audio => FourCC::new("soun"),
            TrackType::Text => FourCC::new("text"),
            TrackType::Subtitle => FourCC::new("subt"),
        }
    }
}

/// One entry in the sample description.
#[derive(Clone, Debug)]
pub enum SampleEntry {
    Video(VideoSampleEntry),
    Audio(AudioSampleEntry),
    Text(TextSampleEntry),
}

impl SampleEntry {
    /// Read a sample entry. The handler type of the enclosing track
    /// decides how the entry body is interpreted.
    pub fn from_bytes_with_handler<R: ReadBytes>(
        stream: &mut R,
        handler: TrackType,
    ) -> io::Result<SampleEntry> {
        let entry = match handler {
            TrackType::Video => SampleEntry::Video(VideoSampleEntry::read(stream)?),
            TrackType::Audio => SampleEntry::Audio(AudioSampleEntry::read(stream)?),
            TrackType::Text | TrackType::Subtitle => {
                SampleEntry::Text(TextSampleEntry::read(stream)?)
            },
        };
        Ok(entry)
    }

    pub fn format(&self) -> FourCC {
        match self {
            SampleEntry::Video(e) => e.format,
            SampleEntry::Audio(e) => e.format,
            SampleEntry::Text(e) => e.format,
        }
    }

    /// The `sinf` of an encrypted entry.
    pub fn sinf(&self) -> Option<&ProtectionSchemeInfoBox> {
        match self {
            SampleEntry::Video(e) => e.sinf.as_ref(),
            SampleEntry::Audio(e) => e.sinf.as_ref(),
            _ => None,
        }
    }
}

impl ToBytes for SampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        match self {
            SampleEntry::Video(e) => e.to_bytes(stream),
            SampleEntry::Audio(e) => e.to_bytes(stream),
            SampleEntry::Text(e) => e.to_bytes(stream),
        }
    }
}

/// 8.5.2 Sample Description Box (ISO/IEC 14496-12:2015(E))
///
/// One entry per codec variant; two entries when a clear-lead track
/// carries both the encrypted and the clear form.
#[derive(Clone, Debug, Default)]
pub struct SampleDescriptionBox {
    pub entries: Vec<SampleEntry>,
}

impl SampleDescriptionBox {
    /// Read, with the handler type passed down from `mdia`.
    pub fn from_bytes_with_handler<R: ReadBytes>(
        stream: &mut R,
        handler: TrackType,
    ) -> io::Result<SampleDescriptionBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::new();
        while (entries.len() as u32) < count && stream.left() >= 8 {
            entries.push(SampleEntry::from_bytes_with_handler(stream, handler)?);
        }

        Ok(SampleDescriptionBox { entries })
    }
}

impl ToBytes for SampleDescriptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        (self.entries.len() as u32).to_bytes(stream)?;
        for e in &self.entries {
            e.to_bytes(stream)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for SampleDescriptionBox {
    const FOURCC: &'static str = "stsd";

    fn fourcc(&self) -> FourCC {
        FourCC::new("stsd")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for SampleDescriptionBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}
