use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// 8.5.1 Sample Table Box (ISO/IEC 14496-12:2015(E))
///
/// For fragmented output all tables except the sample description are
/// present but empty; the samples live in the track fragments.
#[derive(Clone, Debug, Default)]
pub struct SampleTableBox {
    pub description: SampleDescriptionBox,
    pub time_to_sample: TimeToSampleBox,
    pub composition_offset: Option<CompositionOffsetBox>,
    pub sample_to_chunk: SampleToChunkBox,
    pub sample_size: SampleSizeBox,
    pub compact_sample_size: Option<CompactSampleSizeBox>,
    pub chunk_offset: ChunkOffsetBox,
    pub sync_samples: Option<SyncSampleBox>,
    pub sample_group_descriptions: Vec<SampleGroupDescriptionBox>,
    pub sample_to_groups: Vec<SampleToGroupBox>,
}

impl SampleTableBox {
    /// Read, with the handler type passed down from `mdia`.
    pub fn from_bytes_with_handler<R: ReadBytes>(
        stream: &mut R,
        handler: TrackType,
    ) -> io::Result<SampleTableBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut stbl = SampleTableBox::default();
        let mut seen_stsd = false;
        let mut seen_stsz = false;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"stsd" => {
                    stbl.description = SampleDescriptionBox::from_bytes_with_handler(stream, handler)?;
                    seen_stsd = true;
                },
                b"stts" => stbl.time_to_sample = TimeToSampleBox::from_bytes(stream)?,
                b"ctts" => stbl.composition_offset = Some(CompositionOffsetBox::from_bytes(stream)?),
                b"stsc" => stbl.sample_to_chunk = SampleToChunkBox::from_bytes(stream)?,
                b"stsz" => {
                    stbl.sample_size = SampleSizeBox::from_bytes(stream)?;
                    seen_stsz = true;
                },
                b"stz2" => {
                    stbl.compact_sample_size = Some(CompactSampleSizeBox::from_bytes(stream)?);
                    seen_stsz = true;
                },
                b"stco" | b"co64" => stbl.chunk_offset = ChunkOffsetBox::from_bytes(stream)?,
                b"stss" => stbl.sync_samples = Some(SyncSampleBox::from_bytes(stream)?),
                b"sgpd" => stbl
                    .sample_group_descriptions
                    .push(SampleGroupDescriptionBox::from_bytes(stream)?),
                b"sbgp" => stbl.sample_to_groups.push(SampleToGroupBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        if !seen_stsd {
            return Err(ioerr!(InvalidData, "stbl: missing stsd"));
        }
        if !seen_stsz {
            return Err(ioerr!(InvalidData, "stbl: missing stsz/stz2"));
        }

        Ok(stbl)
    }
}

impl ToBytes for SampleTableBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.description.to_bytes(writer)?;
        self.time_to_sample.to_bytes(writer)?;
        if let Some(ref ctts) = self.composition_offset {
            ctts.to_bytes(writer)?;
        }
        self.sample_to_chunk.to_bytes(writer)?;
        match self.compact_sample_size {
            Some(ref stz2) => stz2.to_bytes(writer)?,
            None => self.sample_size.to_bytes(writer)?,
        }
        self.chunk_offset.to_bytes(writer)?;
        if let Some(ref stss) = self.sync_samples {
            stss.to_bytes(writer)?;
        }
        for sgpd in &self.sample_group_descriptions {
            sgpd.to_bytes(writer)?;
        }
        for sbgp in &self.sample_to_groups {
            sbgp.to_bytes(writer)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for SampleTableBox {
    const FOURCC: &'static str = "stbl";

    fn fourcc(&self) -> FourCC {
        FourCC::new("stbl")
    }
}

impl FullBox for SampleTableBox {}
