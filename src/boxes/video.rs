//! Video sample entries and codec configuration.
use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;

/// Codec configuration box (`avcC`, `hvcC`, `vpcC`, `av1C`, ...).
///
/// The contents are codec-specific and opaque to the packager. The box
/// type cannot be derived from the payload: it is determined by the
/// sample entry's format, so the caller must supply it before reading.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecConfigurationBox {
    pub box_type: FourCC,
    pub data: Data,
}

impl CodecConfigurationBox {
    /// Read a codec configuration box. `box_type` is the expected
    /// fourcc, already known from the sample entry's format.
    pub fn read<R: ReadBytes>(stream: &mut R, box_type: FourCC) -> io::Result<CodecConfigurationBox> {
        let mut reader = BoxReader::new(stream, None)?;
        if reader.header.fourcc != box_type {
            return Err(ioerr!(
                InvalidData,
                "codec configuration: expected {}, got {}",
                box_type,
                reader.header.fourcc
            ));
        }
        let data = Data::from_bytes(&mut reader)?;
        Ok(CodecConfigurationBox { box_type, data })
    }
}

impl ToBytes for CodecConfigurationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        self.data.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for CodecConfigurationBox {
    fn fourcc(&self) -> FourCC {
        self.box_type
    }
}

impl FullBox for CodecConfigurationBox {}

// The codec configuration fourccs we recognize when scanning an entry.
const CONFIG_FOURCCS: [&[u8; 4]; 4] = [b"avcC", b"hvcC", b"vpcC", b"av1C"];

// Extra codec configuration boxes, round-tripped as opaque bytes.
const EXTRA_CONFIG_FOURCCS: [&[u8; 4]; 3] = [b"dvcC", b"dvvC", b"hvcE"];

/// 12.1.3 Visual Sample Entry (ISO/IEC 14496-12:2015(E))
///
/// The fourcc is the (possibly encrypted) sample format: `avc1`,
/// `hvc1`, `encv`, etc.
#[derive(Clone, Debug)]
pub struct VideoSampleEntry {
    pub format: FourCC,
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub codec_configuration: CodecConfigurationBox,
    /// `dvcC` / `dvvC` / `hvcE` and friends, not interpreted.
    pub extra_codec_configs: Vec<GenericBox>,
    /// Opaque colour parameters (`colr`), carried as-is.
    pub colr: Option<GenericBox>,
    pub pixel_aspect: Option<PixelAspectRatioBox>,
    pub sinf: Option<ProtectionSchemeInfoBox>,
}

impl Default for VideoSampleEntry {
    fn default() -> VideoSampleEntry {
        VideoSampleEntry {
            format: FourCC::default(),
            data_reference_index: 1,
            width: 0,
            height: 0,
            codec_configuration: CodecConfigurationBox::default(),
            extra_codec_configs: Vec::new(),
            colr: None,
            pixel_aspect: None,
            sinf: None,
        }
    }
}

impl VideoSampleEntry {
    pub(crate) fn read<R: ReadBytes>(stream: &mut R) -> io::Result<VideoSampleEntry> {
        let mut reader = BoxReader::new(stream, None)?;
        let format = reader.header.fourcc;
        let stream = &mut reader;

        stream.skip(6)?;
        let data_reference_index = u16::from_bytes(stream)?;
        stream.skip(16)?;
        let width = u16::from_bytes(stream)?;
        let height = u16::from_bytes(stream)?;
        // resolution, reserved, frame count, compressor name, depth,
        // pre_defined.
        stream.skip(14 + 32 + 4)?;

        let mut entry = VideoSampleEntry {
            format,
            data_reference_index,
            width,
            height,
            ..VideoSampleEntry::default()
        };

        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            let b = child.fourcc.to_be_bytes();
            if CONFIG_FOURCCS.contains(&&b) {
                entry.codec_configuration = CodecConfigurationBox::read(stream, child.fourcc)?;
            } else if EXTRA_CONFIG_FOURCCS.contains(&&b) {
                entry.extra_codec_configs.push(GenericBox::from_bytes(stream)?);
            } else {
                match &b {
                    b"pasp" => entry.pixel_aspect = Some(PixelAspectRatioBox::from_bytes(stream)?),
                    b"colr" => entry.colr = Some(GenericBox::from_bytes(stream)?),
                    b"sinf" => entry.sinf = Some(ProtectionSchemeInfoBox::from_bytes(stream)?),
                    _ => entry.extra_codec_configs.push(GenericBox::from_bytes(stream)?),
                }
            }
        }

        Ok(entry)
    }
}

impl ToBytes for VideoSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        stream.skip(6)?;
        self.data_reference_index.to_bytes(stream)?;
        stream.skip(16)?;
        self.width.to_bytes(stream)?;
        self.height.to_bytes(stream)?;
        // 72 dpi, 16.16 fixed.
        0x0048_0000u32.to_bytes(stream)?;
        0x0048_0000u32.to_bytes(stream)?;
        stream.skip(4)?;
        // frame count.
        1u16.to_bytes(stream)?;
        // compressor name.
        stream.skip(32)?;
        // depth.
        0x0018u16.to_bytes(stream)?;
        0xffffu16.to_bytes(stream)?;

        if !self.codec_configuration.data.is_empty() {
            self.codec_configuration.to_bytes(stream)?;
        }
        for extra in &self.extra_codec_configs {
            extra.to_bytes(stream)?;
        }
        if let Some(ref colr) = self.colr {
            colr.to_bytes(stream)?;
        }
        if let Some(ref pasp) = self.pixel_aspect {
            pasp.to_bytes(stream)?;
        }
        if let Some(ref sinf) = self.sinf {
            sinf.to_bytes(stream)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for VideoSampleEntry {
    fn fourcc(&self) -> FourCC {
        self.format
    }
}

impl FullBox for VideoSampleEntry {}
