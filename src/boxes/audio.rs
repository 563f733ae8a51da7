//! Audio sample entries and the MPEG-4 elementary stream descriptor.
use std::io;

use crate::boxes::prelude::*;
use crate::boxes::*;
use crate::io::CountBytes;

// Audio codec configuration fourccs carried opaquely.
const AUDIO_CONFIG_FOURCCS: [&[u8; 4]; 7] =
    [b"dac3", b"dec3", b"dac4", b"ddts", b"dops", b"dfla", b"mhaC"];

/// 12.2.3 Audio Sample Entry (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug)]
pub struct AudioSampleEntry {
    pub format: FourCC,
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    /// In Hz; serialized as 16.16 fixed point.
    pub sample_rate: u32,
    /// MPEG-4 ES descriptor, for AAC and MP3.
    pub esds: Option<ESDescriptorBox>,
    /// Codec-specific config box (`dac3`, `dec3`, `dops`, ...).
    pub codec_config: Option<CodecConfigurationBox>,
    pub sinf: Option<ProtectionSchemeInfoBox>,
    pub extra: Vec<GenericBox>,
}

impl Default for AudioSampleEntry {
    fn default() -> AudioSampleEntry {
        AudioSampleEntry {
            format: FourCC::default(),
            data_reference_index: 1,
            channel_count: 2,
            sample_size: 16,
            sample_rate: 0,
            esds: None,
            codec_config: None,
            sinf: None,
            extra: Vec::new(),
        }
    }
}

impl AudioSampleEntry {
    pub(crate) fn read<R: ReadBytes>(stream: &mut R) -> io::Result<AudioSampleEntry> {
        let mut reader = BoxReader::new(stream, None)?;
        let format = reader.header.fourcc;
        let stream = &mut reader;

        stream.skip(6)?;
        let data_reference_index = u16::from_bytes(stream)?;
        stream.skip(8)?;
        let channel_count = u16::from_bytes(stream)?;
        let sample_size = u16::from_bytes(stream)?;
        stream.skip(4)?;
        let sample_rate = u32::from_bytes(stream)? >> 16;

        let mut entry = AudioSampleEntry {
            format,
            data_reference_index,
            channel_count,
            sample_size,
            sample_rate,
            ..AudioSampleEntry::default()
        };

        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            let b = child.fourcc.to_be_bytes();
            if AUDIO_CONFIG_FOURCCS.contains(&&b) {
                entry.codec_config = Some(CodecConfigurationBox::read(stream, child.fourcc)?);
            } else {
                match &b {
                    b"esds" => entry.esds = Some(ESDescriptorBox::from_bytes(stream)?),
                    b"sinf" => entry.sinf = Some(ProtectionSchemeInfoBox::from_bytes(stream)?),
                    _ => entry.extra.push(GenericBox::from_bytes(stream)?),
                }
            }
        }

        Ok(entry)
    }
}

impl ToBytes for AudioSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        stream.skip(6)?;
        self.data_reference_index.to_bytes(stream)?;
        stream.skip(8)?;
        self.channel_count.to_bytes(stream)?;
        self.sample_size.to_bytes(stream)?;
        stream.skip(4)?;
        (std::cmp::min(self.sample_rate, 0xffff) << 16).to_bytes(stream)?;

        if let Some(ref esds) = self.esds {
            esds.to_bytes(stream)?;
        }
        if let Some(ref config) = self.codec_config {
            config.to_bytes(stream)?;
        }
        for extra in &self.extra {
            extra.to_bytes(stream)?;
        }
        if let Some(ref sinf) = self.sinf {
            sinf.to_bytes(stream)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for AudioSampleEntry {
    fn fourcc(&self) -> FourCC {
        self.format
    }
}

impl FullBox for AudioSampleEntry {}

def_box! {
    /// MPEG-4 ES Descriptor Box (ISO/IEC 14496-14).
    #[derive(Default)]
    ESDescriptorBox {
        es_descriptor:  ESDescriptor,
    },
    fourcc => "esds",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

// Every descriptor starts with a tag and a 7-bits-per-byte length.
#[derive(Clone, Debug)]
struct BaseDescriptor {
    tag: u8,
    size: u32,
}

impl FromBytes for BaseDescriptor {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<BaseDescriptor> {
        let tag = u8::from_bytes(stream)?;
        let mut size = 0u32;
        for i in 1..=4 {
            let b = u8::from_bytes(stream)?;
            size = (size << 7) | ((b & 0x7f) as u32);
            if b & 0x80 == 0 {
                break;
            }
            if i == 4 {
                return Err(ioerr!(InvalidData, "esds: descriptor length field > 4 bytes"));
            }
        }
        Ok(BaseDescriptor { tag, size })
    }

    fn min_size() -> usize {
        0
    }
}

impl ToBytes for BaseDescriptor {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.tag.to_bytes(stream)?;
        if self.size >= 1 << 28 {
            return Err(ioerr!(InvalidData, "esds: descriptor too large"));
        }
        let mut size = self.size;
        let mut buf = [0u8; 4];
        for idx in (0..=3).rev() {
            let mut b = (size & 0x7f) as u8;
            size >>= 7;
            if idx != 3 {
                b |= 0x80;
            }
            buf[idx] = b;
        }
        stream.write(&buf[..])
    }
}

const ESDESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;
const SLCONFIG_DESCRIPTOR_TAG: u8 = 0x06;

/// Object type indications we write (ISO/IEC 14496-1 table 5).
pub mod object_type {
    /// MPEG-4 AAC.
    pub const ISO_14496_3: u8 = 0x40;
    /// MPEG-2 layer 3 (MP3 with samplerate < 32000).
    pub const ISO_13818_3_MPEG1: u8 = 0x69;
    /// MPEG-1 layer 3.
    pub const ISO_11172_3_MPEG1: u8 = 0x6b;
}

/// Elementary Stream Descriptor, tag 0x03.
#[derive(Clone, Debug, Default)]
pub struct ESDescriptor {
    /// Lower 16 bits of the track id, or 0.
    pub es_id: u16,
    pub decoder_config: DecoderConfigDescriptor,
}

impl FromBytes for ESDescriptor {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ESDescriptor> {
        let base = BaseDescriptor::from_bytes(stream)?;
        if base.tag != ESDESCRIPTOR_TAG {
            return Err(ioerr!(InvalidData, "esds: expected ES descriptor, got tag {}", base.tag));
        }
        let es_id = u16::from_bytes(stream)?;
        let flags = u8::from_bytes(stream)?;
        // In mp4 files the stream-dependence / URL / OCR flags are 0.
        if flags & 0xe0 != 0 {
            return Err(ioerr!(InvalidData, "esds: unsupported ES descriptor flags {:#x}", flags));
        }
        let decoder_config = DecoderConfigDescriptor::from_bytes(stream)?;
        // SLConfigDescriptor, fixed.
        let sl = BaseDescriptor::from_bytes(stream)?;
        if sl.tag != SLCONFIG_DESCRIPTOR_TAG {
            return Err(ioerr!(InvalidData, "esds: expected SL descriptor, got tag {}", sl.tag));
        }
        stream.skip(sl.size as u64)?;

        Ok(ESDescriptor { es_id, decoder_config })
    }

    fn min_size() -> usize {
        0
    }
}

impl ESDescriptor {
    fn to_bytes_partial<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.es_id.to_bytes(stream)?;
        0u8.to_bytes(stream)?;
        self.decoder_config.to_bytes(stream)?;
        // SLConfigDescriptor: predefined MP4 (0x02).
        BaseDescriptor { tag: SLCONFIG_DESCRIPTOR_TAG, size: 1 }.to_bytes(stream)?;
        2u8.to_bytes(stream)
    }
}

impl ToBytes for ESDescriptor {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut cnt = CountBytes::new();
        self.to_bytes_partial(&mut cnt)?;

        BaseDescriptor {
            tag: ESDESCRIPTOR_TAG,
            size: cnt.size() as u32,
        }
        .to_bytes(stream)?;
        self.to_bytes_partial(stream)
    }
}

/// Decoder config descriptor, tag 0x04.
#[derive(Clone, Debug, Default)]
pub struct DecoderConfigDescriptor {
    pub object_type: u8,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    /// Codec-specific bytes (AudioSpecificConfig for AAC); empty for MP3.
    pub decoder_specific_info: Data,
}

impl FromBytes for DecoderConfigDescriptor {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<DecoderConfigDescriptor> {
        let base = BaseDescriptor::from_bytes(stream)?;
        if base.tag != DECODER_CONFIG_DESCRIPTOR_TAG {
            return Err(ioerr!(
                InvalidData,
                "esds: expected decoder config descriptor, got tag {}",
                base.tag
            ));
        }
        let start = stream.pos();
        let object_type = u8::from_bytes(stream)?;
        // stream type / upstream / buffer size.
        stream.skip(4)?;
        let max_bitrate = u32::from_bytes(stream)?;
        let avg_bitrate = u32::from_bytes(stream)?;
        let mut decoder_specific_info = Data::default();
        if stream.pos() - start < base.size as u64 {
            let dsi = BaseDescriptor::from_bytes(stream)?;
            if dsi.tag != DECODER_SPECIFIC_INFO_TAG {
                return Err(ioerr!(
                    InvalidData,
                    "esds: expected decoder specific info, got tag {}",
                    dsi.tag
                ));
            }
            decoder_specific_info = Data::read(stream, dsi.size as usize)?;
        }
        Ok(DecoderConfigDescriptor {
            object_type,
            max_bitrate,
            avg_bitrate,
            decoder_specific_info,
        })
    }

    fn min_size() -> usize {
        0
    }
}

impl DecoderConfigDescriptor {
    fn to_bytes_partial<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.object_type.to_bytes(stream)?;
        // stream type audio (5), upstream 0, reserved 1, buffer size 0.
        let b = (5u32 << 2 | 1) << 24;
        b.to_bytes(stream)?;
        self.max_bitrate.to_bytes(stream)?;
        self.avg_bitrate.to_bytes(stream)?;
        if !self.decoder_specific_info.is_empty() {
            BaseDescriptor {
                tag: DECODER_SPECIFIC_INFO_TAG,
                size: self.decoder_specific_info.len() as u32,
            }
            .to_bytes(stream)?;
            self.decoder_specific_info.to_bytes(stream)?;
        }
        Ok(())
    }
}

impl ToBytes for DecoderConfigDescriptor {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut cnt = CountBytes::new();
        self.to_bytes_partial(&mut cnt)?;

        BaseDescriptor {
            tag: DECODER_CONFIG_DESCRIPTOR_TAG,
            size: cnt.size() as u32,
        }
        .to_bytes(stream)?;
        self.to_bytes_partial(stream)
    }
}
