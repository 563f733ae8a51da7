use std::io;

use crate::boxes::prelude::*;

/// tkhd flag: the track is enabled.
pub const TRACK_ENABLED: u32 = 0x000001;
/// tkhd flag: the track is part of the presentation.
pub const TRACK_IN_MOVIE: u32 = 0x000002;
/// tkhd flag: the track is used when previewing.
pub const TRACK_IN_PREVIEW: u32 = 0x000004;

/// 8.3.2 Track Header Box (ISO/IEC 14496-12:2015(E))
///
/// `width`/`height` carry the visual presentation size as 16.16 fixed
/// point; audio tracks leave them zero and set `volume` to 1.0.
#[derive(Clone, Default)]
pub struct TrackHeaderBox {
    pub flags: u32,
    pub creation_time: Time,
    pub modification_time: Time,
    pub track_id: u32,
    /// In the movie timescale, not the track timescale.
    pub duration: Duration_,
    pub layer: u16,
    pub alternate_group: u16,
    pub volume: FixedFloat8_8,
    pub matrix: Matrix,
    pub width: FixedFloat16_16,
    pub height: FixedFloat16_16,
}

impl FromBytes for TrackHeaderBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackHeaderBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let flags = stream.flags();
        let creation_time = Time::from_bytes(stream)?;
        let modification_time = Time::from_bytes(stream)?;
        let track_id = u32::from_bytes(stream)?;
        stream.skip(4)?;
        let duration = Duration_::from_bytes(stream)?;
        stream.skip(8)?;
        let layer = u16::from_bytes(stream)?;
        let alternate_group = u16::from_bytes(stream)?;
        let volume = FixedFloat8_8::from_bytes(stream)?;
        stream.skip(2)?;
        let matrix = Matrix::from_bytes(stream)?;
        let width = FixedFloat16_16::from_bytes(stream)?;
        let height = FixedFloat16_16::from_bytes(stream)?;

        Ok(TrackHeaderBox {
            flags,
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            matrix,
            width,
            height,
        })
    }

    fn min_size() -> usize {
        84
    }
}

impl ToBytes for TrackHeaderBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        self.creation_time.to_bytes(stream)?;
        self.modification_time.to_bytes(stream)?;
        self.track_id.to_bytes(stream)?;
        stream.skip(4)?;
        self.duration.to_bytes(stream)?;
        stream.skip(8)?;
        self.layer.to_bytes(stream)?;
        self.alternate_group.to_bytes(stream)?;
        self.volume.to_bytes(stream)?;
        stream.skip(2)?;
        self.matrix.to_bytes(stream)?;
        self.width.to_bytes(stream)?;
        self.height.to_bytes(stream)?;

        writer.finalize()
    }
}

impl BoxInfo for TrackHeaderBox {
    const FOURCC: &'static str = "tkhd";

    fn fourcc(&self) -> FourCC {
        FourCC::new("tkhd")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for TrackHeaderBox {
    fn version(&self) -> Option<u8> {
        // 64-bit times or duration force version 1.
        let v = [
            self.creation_time.version(),
            self.modification_time.version(),
            self.duration.version(),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0);
        Some(v)
    }
    fn flags(&self) -> u32 {
        self.flags
    }
}

impl std::fmt::Debug for TrackHeaderBox {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut names = Vec::new();
        if self.flags & TRACK_ENABLED != 0 {
            names.push("enabled");
        }
        if self.flags & TRACK_IN_MOVIE != 0 {
            names.push("in_movie");
        }
        if self.flags & TRACK_IN_PREVIEW != 0 {
            names.push("in_preview");
        }
        let mut dbg = f.debug_struct("TrackHeaderBox");
        dbg.field("fourcc", &self.fourcc());
        dbg.field("flags", &names.join("|"));
        dbg.field("creation_time", &self.creation_time);
        dbg.field("modification_time", &self.modification_time);
        dbg.field("track_id", &self.track_id);
        dbg.field("duration", &self.duration);
        dbg.field("layer", &self.layer);
        dbg.field("alternate_group", &self.alternate_group);
        dbg.field("volume", &self.volume);
        dbg.field("matrix", &self.matrix);
        dbg.field("width", &self.width);
        dbg.field("height", &self.height);
        dbg.finish()
    }
}
