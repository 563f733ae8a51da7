use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.6.1.2 Decoding Time to Sample Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TimeToSampleBox {
        entries:    ArraySized32<TimeToSampleEntry>,
    },
    fourcc => "stts",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_struct! {
    /// Entry in TimeToSampleBox.
    #[derive(Default)]
    TimeToSampleEntry,
        count:  u32,
        delta:  u32,
}

def_box! {
    /// 8.6.1.3 Composition Time to Sample Box (ISO/IEC 14496-12:2015(E))
    ///
    /// Version 0 if every offset is non-negative, version 1 otherwise.
    #[derive(Default)]
    CompositionOffsetBox {
        entries:    ArraySized32<CompositionOffsetEntry>,
    },
    fourcc => "ctts",
    version => [1, entries],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Composition offset entry.
#[derive(Clone, Debug, Default)]
pub struct CompositionOffsetEntry {
    pub count: u32,
    pub offset: i32,
}

impl FromBytes for CompositionOffsetEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let count = u32::from_bytes(stream)?;
        let offset = if stream.version() == 0 {
            std::cmp::min(u32::from_bytes(stream)?, 0x7fffffff) as i32
        } else {
            i32::from_bytes(stream)?
        };
        Ok(CompositionOffsetEntry { count, offset })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for CompositionOffsetEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.count.to_bytes(stream)?;
        self.offset.to_bytes(stream)
    }
}

impl FullBox for CompositionOffsetEntry {
    fn version(&self) -> Option<u8> {
        if self.offset < 0 {
            Some(1)
        } else {
            None
        }
    }
}

def_box! {
    /// 8.7.4 Sample to Chunk Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SampleToChunkBox {
        entries:    ArraySized32<SampleToChunkEntry>,
    },
    fourcc => "stsc",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_struct! {
    /// Entry in SampleToChunkBox.
    #[derive(Default)]
    SampleToChunkEntry,
        first_chunk:                u32,
        samples_per_chunk:          u32,
        sample_description_index:   u32,
}
