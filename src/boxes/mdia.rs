use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// 8.4.1 Media Box (ISO/IEC 14496-12:2015(E))
///
/// `hdlr` is read before `minf` so that the handler type can be passed
/// down to the sample description (the entry fourcc alone does not
/// distinguish audio from video entries).
#[derive(Clone, Debug, Default)]
pub struct MediaBox {
    pub header: MediaHeaderBox,
    pub handler: HandlerBox,
    pub information: MediaInformationBox,
}

impl MediaBox {
    pub fn track_type(&self) -> Option<TrackType> {
        TrackType::from_handler(self.handler.handler_type)
    }
}

impl FromBytes for MediaBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MediaBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut header = None;
        let mut handler: Option<HandlerBox> = None;
        let mut information = None;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"mdhd" => header = Some(MediaHeaderBox::from_bytes(stream)?),
                b"hdlr" => handler = Some(HandlerBox::from_bytes(stream)?),
                b"minf" => {
                    let track_type = handler
                        .as_ref()
                        .and_then(|h| TrackType::from_handler(h.handler_type))
                        .ok_or_else(|| ioerr!(InvalidData, "mdia: minf before usable hdlr"))?;
                    information = Some(MediaInformationBox::from_bytes_with_handler(
                        stream, track_type,
                    )?);
                },
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let header = header.ok_or_else(|| ioerr!(InvalidData, "mdia: missing mdhd"))?;
        let handler = handler.ok_or_else(|| ioerr!(InvalidData, "mdia: missing hdlr"))?;
        let information = information.ok_or_else(|| ioerr!(InvalidData, "mdia: missing minf"))?;

        Ok(MediaBox {
            header,
            handler,
            information,
        })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for MediaBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.header.to_bytes(writer)?;
        self.handler.to_bytes(writer)?;
        self.information.to_bytes(writer)?;

        writer.finalize()
    }
}

impl BoxInfo for MediaBox {
    const FOURCC: &'static str = "mdia";

    fn fourcc(&self) -> FourCC {
        FourCC::new("mdia")
    }
}

impl FullBox for MediaBox {}
