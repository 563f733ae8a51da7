//! Stream metadata handed to the muxer by an upstream parser.
use crate::crypto::EncryptionConfig;
use crate::types::FourCC;

/// Whether the stream is audio, video or text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamType {
    Video,
    Audio,
    Text,
}

/// The codecs the packager can mux.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    // Video.
    Av1,
    H264,
    H265,
    H265DolbyVision,
    Vp8,
    Vp9,
    // Audio.
    Aac,
    Mp3,
    Ac3,
    Eac3,
    Ac4,
    Dtsc,
    Dtse,
    Dtsh,
    Dtsl,
    Flac,
    Opus,
    Mha1,
    Mhm1,
    // Text.
    WebVtt,
    Ttml,
}

/// How an H.264/H.265 bitstream carries its parameter sets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum H26xStreamFormat {
    #[default]
    Unspecified,
    /// Parameter sets in the sample entry only (`avc1` / `hvc1`).
    NalUnitStreamWithoutParameterSetNalus,
    /// Parameter sets may appear inband (`avc3` / `hev1`).
    NalUnitStreamWithParameterSetNalus,
}

impl Codec {
    pub fn stream_type(&self) -> StreamType {
        match self {
            Codec::Av1
            | Codec::H264
            | Codec::H265
            | Codec::H265DolbyVision
            | Codec::Vp8
            | Codec::Vp9 => StreamType::Video,
            Codec::WebVtt | Codec::Ttml => StreamType::Text,
            _ => StreamType::Audio,
        }
    }

    /// The sample entry format fourcc for this codec.
    pub fn fourcc(&self, h26x_stream_format: H26xStreamFormat) -> FourCC {
        let inband = matches!(
            h26x_stream_format,
            H26xStreamFormat::NalUnitStreamWithParameterSetNalus
        );
        let s = match self {
            Codec::Av1 => "av01",
            Codec::H264 => {
                if inband {
                    "avc3"
                } else {
                    "avc1"
                }
            },
            Codec::H265 => {
                if inband {
                    "hev1"
                } else {
                    "hvc1"
                }
            },
            Codec::H265DolbyVision => {
                if inband {
                    "dvhe"
                } else {
                    "dvh1"
                }
            },
            Codec::Vp8 => "vp08",
            Codec::Vp9 => "vp09",
            Codec::Aac | Codec::Mp3 => "mp4a",
            Codec::Ac3 => "ac-3",
            Codec::Eac3 => "ec-3",
            Codec::Ac4 => "ac-4",
            Codec::Dtsc => "dtsc",
            Codec::Dtse => "dtse",
            Codec::Dtsh => "dtsh",
            Codec::Dtsl => "dtsl",
            Codec::Flac => "fLaC",
            Codec::Opus => "Opus",
            Codec::Mha1 => "mha1",
            Codec::Mhm1 => "mhm1",
            Codec::WebVtt => "wvtt",
            Codec::Ttml => "stpp",
        };
        FourCC::new(s)
    }

    /// The codec configuration box type, if this codec uses one.
    pub fn config_fourcc(&self) -> Option<FourCC> {
        let s = match self {
            Codec::H264 => "avcC",
            Codec::H265 | Codec::H265DolbyVision => "hvcC",
            Codec::Vp8 | Codec::Vp9 => "vpcC",
            Codec::Av1 => "av1C",
            Codec::Ac3 => "dac3",
            Codec::Eac3 => "dec3",
            Codec::Ac4 => "dac4",
            Codec::Dtsc | Codec::Dtse | Codec::Dtsh | Codec::Dtsl => "ddts",
            Codec::Opus => "dOps",
            Codec::Flac => "dfLa",
            Codec::Mha1 | Codec::Mhm1 => "mhaC",
            _ => return None,
        };
        Some(FourCC::new(s))
    }
}

/// Video-only stream properties.
#[derive(Clone, Debug, Default)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub h26x_stream_format: H26xStreamFormat,
    /// Raw `colr` box bytes, carried opaquely.
    pub colr_data: Vec<u8>,
}

/// Audio-only stream properties.
#[derive(Clone, Debug, Default)]
pub struct AudioInfo {
    pub channels: u16,
    pub sample_bits: u16,
    pub sampling_frequency: u32,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    /// Codec delay that must not be presented, in nanoseconds (Opus).
    pub seek_preroll_ns: u64,
}

/// Per-kind stream properties.
#[derive(Clone, Debug)]
pub enum StreamKind {
    Video(VideoInfo),
    Audio(AudioInfo),
    Text,
}

/// Everything the muxer needs to know about one elementary stream.
///
/// Produced by an external demuxer; immutable once the muxer has been
/// initialized.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    pub kind: StreamKind,
    pub time_scale: u32,
    /// Stream duration in the stream's timescale; 0 if unknown.
    pub duration: u64,
    pub codec: Codec,
    pub codec_string: String,
    /// Decoder configuration, opaque to the packager.
    pub codec_config: Vec<u8>,
    /// Extra codec configuration boxes (`dvcC` / `dvvC` / `hvcE`),
    /// raw concatenated boxes, carried opaquely.
    pub extra_codec_configs: Vec<u8>,
    /// ISO-639-2/T code, possibly with a subtag ("en-US").
    pub language: String,
    pub is_encrypted: bool,
    pub has_clear_lead: bool,
    pub encryption_config: Option<EncryptionConfig>,
}

impl StreamInfo {
    pub fn stream_type(&self) -> StreamType {
        match self.kind {
            StreamKind::Video(_) => StreamType::Video,
            StreamKind::Audio(_) => StreamType::Audio,
            StreamKind::Text => StreamType::Text,
        }
    }

    pub fn video(&self) -> Option<&VideoInfo> {
        match self.kind {
            StreamKind::Video(ref v) => Some(v),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioInfo> {
        match self.kind {
            StreamKind::Audio(ref a) => Some(a),
            _ => None,
        }
    }
}
