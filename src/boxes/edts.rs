use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.6.5 Edit Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    EditBox {
        list:   EditListBox,
    },
    fourcc => "edts",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.6.6 Edit List Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    EditListBox {
        entries:    ArraySized32<EditListEntry>,
    },
    fourcc => "elst",
    version => [1, entries],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Entry in an edit list.
#[derive(Clone, Debug, Default)]
pub struct EditListEntry {
    pub segment_duration: u64,
    pub media_time: i64,
    pub media_rate_integer: u16,
    pub media_rate_fraction: u16,
}

impl FromBytes for EditListEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let (segment_duration, media_time) = if stream.version() == 0 {
            (
                u32::from_bytes(stream)? as u64,
                i32::from_bytes(stream)? as i64,
            )
        } else {
            (u64::from_bytes(stream)?, i64::from_bytes(stream)?)
        };
        Ok(EditListEntry {
            segment_duration,
            media_time,
            media_rate_integer: u16::from_bytes(stream)?,
            media_rate_fraction: u16::from_bytes(stream)?,
        })
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for EditListEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        if stream.version() == 0 {
            (self.segment_duration as u32).to_bytes(stream)?;
            (self.media_time as i32).to_bytes(stream)?;
        } else {
            self.segment_duration.to_bytes(stream)?;
            self.media_time.to_bytes(stream)?;
        }
        self.media_rate_integer.to_bytes(stream)?;
        self.media_rate_fraction.to_bytes(stream)
    }
}

impl FullBox for EditListEntry {
    fn version(&self) -> Option<u8> {
        if self.segment_duration > 0xffffffff
            || self.media_time < -0x7fffffff
            || self.media_time > 0x7fffffff
        {
            Some(1)
        } else {
            Some(0)
        }
    }
}
