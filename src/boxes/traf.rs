use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// 8.8.6 Track Fragment Box (ISO/IEC 14496-12:2015(E))
///
/// Child order on write: tfhd, tfdt, trun(s), sbgp, sgpd, saiz, saio,
/// senc. `saio`'s single offset points at the first `senc` entry and is
/// patched once the enclosing `moof` has been sized.
#[derive(Clone, Debug, Default)]
pub struct TrackFragmentBox {
    pub header: TrackFragmentHeaderBox,
    pub decode_time: Option<TrackFragmentBaseMediaDecodeTimeBox>,
    pub runs: Vec<TrackRunBox>,
    pub sample_to_group: Option<SampleToGroupBox>,
    pub sample_group_description: Option<SampleGroupDescriptionBox>,
    pub auxiliary_size: Option<SampleAuxiliaryInformationSizeBox>,
    pub auxiliary_offset: Option<SampleAuxiliaryInformationOffsetBox>,
    pub sample_encryption: Option<SampleEncryptionBox>,
}

impl TrackFragmentBox {
    /// Byte offset of the `senc` box relative to the start of this
    /// `traf`, were it serialized right now.
    pub fn sample_encryption_offset(&self) -> Option<u64> {
        self.sample_encryption.as_ref()?;
        let mut off = 8 + box_size(&self.header);
        if let Some(ref tfdt) = self.decode_time {
            off += box_size(tfdt);
        }
        for run in &self.runs {
            off += box_size(run);
        }
        if let Some(ref sbgp) = self.sample_to_group {
            off += box_size(sbgp);
        }
        if let Some(ref sgpd) = self.sample_group_description {
            off += box_size(sgpd);
        }
        if let Some(ref saiz) = self.auxiliary_size {
            off += box_size(saiz);
        }
        if let Some(ref saio) = self.auxiliary_offset {
            off += box_size(saio);
        }
        Some(off)
    }
}

impl FromBytes for TrackFragmentBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackFragmentBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut traf = TrackFragmentBox::default();
        let mut seen_tfhd = false;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"tfhd" => {
                    traf.header = TrackFragmentHeaderBox::from_bytes(stream)?;
                    seen_tfhd = true;
                },
                b"tfdt" => {
                    traf.decode_time = Some(TrackFragmentBaseMediaDecodeTimeBox::from_bytes(stream)?)
                },
                b"trun" => traf.runs.push(TrackRunBox::from_bytes(stream)?),
                b"sbgp" => traf.sample_to_group = Some(SampleToGroupBox::from_bytes(stream)?),
                b"sgpd" => {
                    traf.sample_group_description =
                        Some(SampleGroupDescriptionBox::from_bytes(stream)?)
                },
                b"saiz" => {
                    traf.auxiliary_size =
                        Some(SampleAuxiliaryInformationSizeBox::from_bytes(stream)?)
                },
                b"saio" => {
                    traf.auxiliary_offset =
                        Some(SampleAuxiliaryInformationOffsetBox::from_bytes(stream)?)
                },
                b"senc" => traf.sample_encryption = Some(SampleEncryptionBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        if !seen_tfhd {
            return Err(ioerr!(InvalidData, "traf: missing tfhd"));
        }

        Ok(traf)
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for TrackFragmentBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.header.to_bytes(writer)?;
        if let Some(ref tfdt) = self.decode_time {
            tfdt.to_bytes(writer)?;
        }
        for run in &self.runs {
            run.to_bytes(writer)?;
        }
        if let Some(ref sbgp) = self.sample_to_group {
            sbgp.to_bytes(writer)?;
        }
        if let Some(ref sgpd) = self.sample_group_description {
            sgpd.to_bytes(writer)?;
        }
        if let Some(ref saiz) = self.auxiliary_size {
            saiz.to_bytes(writer)?;
        }
        if let Some(ref saio) = self.auxiliary_offset {
            saio.to_bytes(writer)?;
        }
        if let Some(ref senc) = self.sample_encryption {
            senc.to_bytes(writer)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for TrackFragmentBox {
    const FOURCC: &'static str = "traf";

    fn fourcc(&self) -> FourCC {
        FourCC::new("traf")
    }
}

impl FullBox for TrackFragmentBox {}
