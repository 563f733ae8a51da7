//! Text sample entries (WebVTT, TTML) and the WebVTT sample-format boxes.
use std::io;

use crate::boxes::prelude::*;

/// String that runs to the end of its container, no NUL terminator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextString(pub String);

impl From<&str> for TextString {
    fn from(s: &str) -> TextString {
        TextString(s.to_string())
    }
}

impl FromBytes for TextString {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TextString> {
        let data = Data::from_bytes(stream)?;
        Ok(TextString(String::from_utf8_lossy(&data.0).into_owned()))
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for TextString {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        stream.write(self.0.as_bytes())
    }
}

def_box! {
    /// WebVTT Configuration Box (ISO/IEC 14496-30 7.5).
    ///
    /// Carries the lines of the WebVTT file header.
    #[derive(Default)]
    WebVttConfigurationBox {
        config:     TextString,
    },
    fourcc => "vttC",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// WebVTT Source Label Box (ISO/IEC 14496-30 7.5).
    #[derive(Default)]
    WebVttSourceLabelBox {
        source_label:   TextString,
    },
    fourcc => "vlab",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Cue payload box inside a `vttc` (ISO/IEC 14496-30 6.6).
    #[derive(Default)]
    CuePayloadBox {
        cue_text:   TextString,
    },
    fourcc => "payl",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Cue identifier box inside a `vttc`.
    #[derive(Default)]
    CueIdBox {
        cue_id:     TextString,
    },
    fourcc => "iden",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Cue settings box inside a `vttc`.
    #[derive(Default)]
    CueSettingsBox {
        settings:   TextString,
    },
    fourcc => "sttg",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

/// VTT Cue Box: one active cue in a WebVTT sample (ISO/IEC 14496-30 6.4).
#[derive(Clone, Debug, Default)]
pub struct VttCueBox {
    pub cue_id: Option<CueIdBox>,
    pub settings: Option<CueSettingsBox>,
    pub payload: CuePayloadBox,
}

impl FromBytes for VttCueBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<VttCueBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut cue_id = None;
        let mut settings = None;
        let mut payload = None;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"iden" => cue_id = Some(CueIdBox::from_bytes(stream)?),
                b"sttg" => settings = Some(CueSettingsBox::from_bytes(stream)?),
                b"payl" => payload = Some(CuePayloadBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let payload = payload.ok_or_else(|| ioerr!(InvalidData, "vttc: missing payl"))?;
        Ok(VttCueBox {
            cue_id,
            settings,
            payload,
        })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for VttCueBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        if let Some(ref cue_id) = self.cue_id {
            cue_id.to_bytes(writer)?;
        }
        if let Some(ref settings) = self.settings {
            settings.to_bytes(writer)?;
        }
        self.payload.to_bytes(writer)?;

        writer.finalize()
    }
}

impl BoxInfo for VttCueBox {
    const FOURCC: &'static str = "vttc";

    fn fourcc(&self) -> FourCC {
        FourCC::new("vttc")
    }
}

impl FullBox for VttCueBox {}

def_box! {
    /// VTT Empty Cue Box: a WebVTT sample with no active cues.
    #[derive(Default)]
    VttEmptyCueBox {
    },
    fourcc => "vtte",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

/// 12.6.3 / ISO/IEC 14496-30 Text sample entry: `wvtt` or `stpp`.
#[derive(Clone, Debug)]
pub struct TextSampleEntry {
    pub format: FourCC,
    pub data_reference_index: u16,
    /// WebVTT only.
    pub config: Option<WebVttConfigurationBox>,
    /// WebVTT only.
    pub label: Option<WebVttSourceLabelBox>,
    /// TTML only.
    pub namespace: ZString,
    /// TTML only.
    pub schema_location: ZString,
    pub extra: Vec<GenericBox>,
}

impl Default for TextSampleEntry {
    fn default() -> TextSampleEntry {
        TextSampleEntry {
            format: FourCC::default(),
            data_reference_index: 1,
            config: None,
            label: None,
            namespace: ZString::default(),
            schema_location: ZString::default(),
            extra: Vec::new(),
        }
    }
}

impl TextSampleEntry {
    pub(crate) fn read<R: ReadBytes>(stream: &mut R) -> io::Result<TextSampleEntry> {
        let mut reader = BoxReader::new(stream, None)?;
        let format = reader.header.fourcc;
        let stream = &mut reader;

        stream.skip(6)?;
        let data_reference_index = u16::from_bytes(stream)?;

        let mut entry = TextSampleEntry {
            format,
            data_reference_index,
            ..TextSampleEntry::default()
        };

        if format == b"stpp" {
            entry.namespace = ZString::from_bytes(stream)?;
            entry.schema_location = ZString::from_bytes(stream)?;
            // auxiliary mime types.
            let _ = ZString::from_bytes(stream)?;
        }
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"vttC" => entry.config = Some(WebVttConfigurationBox::from_bytes(stream)?),
                b"vlab" => entry.label = Some(WebVttSourceLabelBox::from_bytes(stream)?),
                _ => entry.extra.push(GenericBox::from_bytes(stream)?),
            }
        }

        Ok(entry)
    }
}

impl ToBytes for TextSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        stream.skip(6)?;
        self.data_reference_index.to_bytes(stream)?;

        if self.format == b"stpp" {
            self.namespace.to_bytes(stream)?;
            if !self.namespace.0.ends_with('\0') {
                stream.write(b"\0")?;
            }
            self.schema_location.to_bytes(stream)?;
            if !self.schema_location.0.ends_with('\0') {
                stream.write(b"\0")?;
            }
            // auxiliary mime types, empty.
            stream.write(b"\0")?;
        }
        if let Some(ref config) = self.config {
            config.to_bytes(stream)?;
        }
        if let Some(ref label) = self.label {
            label.to_bytes(stream)?;
        }
        for extra in &self.extra {
            extra.to_bytes(stream)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for TextSampleEntry {
    fn fourcc(&self) -> FourCC {
        self.format
    }
}

impl FullBox for TextSampleEntry {}
