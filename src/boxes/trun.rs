use std::io;

use crate::boxes::prelude::*;

// tr_flags bits (8.8.8.1).
const DATA_OFFSET_PRESENT: u32 = 0x000001;
const FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x000004;
const SAMPLE_DURATION_PRESENT: u32 = 0x000100;
const SAMPLE_SIZE_PRESENT: u32 = 0x000200;
const SAMPLE_FLAGS_PRESENT: u32 = 0x000400;
const SAMPLE_CTO_PRESENT: u32 = 0x000800;

// Which optional per-sample fields this run carries. One layout covers
// the whole run; it is signalled through tr_flags, so every entry of a
// run must populate the same fields.
#[derive(Clone, Copy, Default)]
struct RunLayout {
    sample_duration: bool,
    sample_size: bool,
    sample_flags: bool,
    sample_cto: bool,
}

impl RunLayout {
    fn from_tr_flags(tr_flags: u32) -> RunLayout {
        RunLayout {
            sample_duration: tr_flags & SAMPLE_DURATION_PRESENT != 0,
            sample_size: tr_flags & SAMPLE_SIZE_PRESENT != 0,
            sample_flags: tr_flags & SAMPLE_FLAGS_PRESENT != 0,
            sample_cto: tr_flags & SAMPLE_CTO_PRESENT != 0,
        }
    }

    fn from_entry(entry: &TrackRunEntry) -> RunLayout {
        RunLayout {
            sample_duration: entry.sample_duration.is_some(),
            sample_size: entry.sample_size.is_some(),
            sample_flags: entry.sample_flags.is_some(),
            sample_cto: entry.sample_composition_time_offset.is_some(),
        }
    }

    fn tr_flags(&self) -> u32 {
        let mut flags = 0;
        if self.sample_duration {
            flags |= SAMPLE_DURATION_PRESENT;
        }
        if self.sample_size {
            flags |= SAMPLE_SIZE_PRESENT;
        }
        if self.sample_flags {
            flags |= SAMPLE_FLAGS_PRESENT;
        }
        if self.sample_cto {
            flags |= SAMPLE_CTO_PRESENT;
        }
        flags
    }
}

/// 8.8.8 Track Fragment Run Box (ISO/IEC 14496-12:2015(E))
///
/// Per-sample values that the fragment header could not carry as
/// defaults. Version 1 iff any composition time offset is negative.
#[derive(Clone, Debug, Default)]
pub struct TrackRunBox {
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<SampleFlags>,
    pub entries: ArrayUnsized<TrackRunEntry>,
}

impl TrackRunBox {
    fn layout(&self) -> RunLayout {
        self.entries.first().map(RunLayout::from_entry).unwrap_or_default()
    }
}

impl FromBytes for TrackRunBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackRunBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let tr_flags = stream.flags();
        let version = stream.version();
        let layout = RunLayout::from_tr_flags(tr_flags);

        let sample_count = u32::from_bytes(stream)?;

        let mut run = TrackRunBox::default();
        if tr_flags & DATA_OFFSET_PRESENT != 0 {
            run.data_offset = Some(i32::from_bytes(stream)?);
        }
        if tr_flags & FIRST_SAMPLE_FLAGS_PRESENT != 0 {
            run.first_sample_flags = Some(SampleFlags::from_bytes(stream)?);
        }
        for _ in 0..sample_count {
            run.entries.push(TrackRunEntry::read(stream, layout, version)?);
        }

        Ok(run)
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for TrackRunBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let layout = self.layout();
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        (self.entries.len() as u32).to_bytes(stream)?;

        if let Some(offset) = self.data_offset {
            offset.to_bytes(stream)?;
        }
        if let Some(ref flags) = self.first_sample_flags {
            flags.to_bytes(stream)?;
        }
        for entry in &self.entries {
            entry.write(stream, layout)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for TrackRunBox {
    const FOURCC: &'static str = "trun";

    fn fourcc(&self) -> FourCC {
        FourCC::new("trun")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for TrackRunBox {
    fn version(&self) -> Option<u8> {
        // Negative composition offsets need the signed version-1 form.
        let negative = self.entries.iter().any(|e| {
            e.sample_composition_time_offset.map(|cto| cto < 0).unwrap_or(false)
        });
        Some(negative as u8)
    }
    fn flags(&self) -> u32 {
        let mut flags = self.layout().tr_flags();
        if self.data_offset.is_some() {
            flags |= DATA_OFFSET_PRESENT;
        }
        if self.first_sample_flags.is_some() {
            flags |= FIRST_SAMPLE_FLAGS_PRESENT;
        }
        flags
    }
}

/// One sample's worth of a track run.
#[derive(Clone, Debug, Default)]
pub struct TrackRunEntry {
    pub sample_duration: Option<u32>,
    pub sample_size: Option<u32>,
    pub sample_flags: Option<SampleFlags>,
    pub sample_composition_time_offset: Option<i32>,
}

impl TrackRunEntry {
    fn read<R: ReadBytes>(stream: &mut R, layout: RunLayout, version: u8) -> io::Result<TrackRunEntry> {
        let mut entry = TrackRunEntry::default();
        if layout.sample_duration {
            entry.sample_duration = Some(u32::from_bytes(stream)?);
        }
        if layout.sample_size {
            entry.sample_size = Some(u32::from_bytes(stream)?);
        }
        if layout.sample_flags {
            entry.sample_flags = Some(SampleFlags::from_bytes(stream)?);
        }
        if layout.sample_cto {
            // The version 0 offset is unsigned; clamp it into the
            // signed representation.
            let cto = if version == 0 {
                std::cmp::min(u32::from_bytes(stream)?, i32::MAX as u32) as i32
            } else {
                i32::from_bytes(stream)?
            };
            entry.sample_composition_time_offset = Some(cto);
        }
        Ok(entry)
    }

    fn write<W: WriteBytes>(&self, stream: &mut W, layout: RunLayout) -> io::Result<()> {
        if layout.sample_duration {
            self.sample_duration.unwrap_or(0).to_bytes(stream)?;
        }
        if layout.sample_size {
            self.sample_size.unwrap_or(0).to_bytes(stream)?;
        }
        if layout.sample_flags {
            self.sample_flags.clone().unwrap_or_default().to_bytes(stream)?;
        }
        if layout.sample_cto {
            self.sample_composition_time_offset.unwrap_or(0).to_bytes(stream)?;
        }
        Ok(())
    }
}
