use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// 8.3.1 Track Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct TrackBox {
    pub header: TrackHeaderBox,
    pub edit: Option<EditBox>,
    pub media: MediaBox,
}

impl TrackBox {
    pub fn track_id(&self) -> u32 {
        self.header.track_id
    }

    /// The edit list, if there is one.
    pub fn edit_list(&self) -> Option<&EditListBox> {
        self.edit.as_ref().map(|e| &e.list)
    }
}

impl FromBytes for TrackBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut header = None;
        let mut edit = None;
        let mut media = None;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"tkhd" => header = Some(TrackHeaderBox::from_bytes(stream)?),
                b"edts" => edit = Some(EditBox::from_bytes(stream)?),
                b"mdia" => media = Some(MediaBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let header = header.ok_or_else(|| ioerr!(InvalidData, "trak: missing tkhd"))?;
        let media = media.ok_or_else(|| ioerr!(InvalidData, "trak: missing mdia"))?;

        Ok(TrackBox { header, edit, media })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for TrackBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.header.to_bytes(writer)?;
        if let Some(ref edit) = self.edit {
            edit.to_bytes(writer)?;
        }
        self.media.to_bytes(writer)?;

        writer.finalize()
    }
}

impl BoxInfo for TrackBox {
    const FOURCC: &'static str = "trak";

    fn fourcc(&self) -> FourCC {
        FourCC::new("trak")
    }
}

impl FullBox for TrackBox {}
