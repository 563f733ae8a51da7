//! Protection scheme signalling: `sinf` and its children.
use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.12.2 Original Format Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    OriginalFormatBox {
        format: FourCC,
    },
    fourcc => "frma",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.12.5 Scheme Type Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SchemeTypeBox {
        scheme_type:    FourCC,
        scheme_version: u32,
    },
    fourcc => "schm",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// 8.12.6 Scheme Information Box (ISO/IEC 14496-12:2015(E))
///
/// For CENC schemes the only child is the `tenc` box.
#[derive(Clone, Debug, Default)]
pub struct SchemeInfoBox {
    pub track_encryption: TrackEncryptionBox,
}

impl FromBytes for SchemeInfoBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SchemeInfoBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut track_encryption = None;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"tenc" => track_encryption = Some(TrackEncryptionBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let track_encryption = track_encryption
            .ok_or_else(|| ioerr!(InvalidData, "schi: missing tenc"))?;
        Ok(SchemeInfoBox { track_encryption })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for SchemeInfoBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        self.track_encryption.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for SchemeInfoBox {
    const FOURCC: &'static str = "schi";

    fn fourcc(&self) -> FourCC {
        FourCC::new("schi")
    }
}

impl FullBox for SchemeInfoBox {}

/// 8.12.1 Protection Scheme Information Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct ProtectionSchemeInfoBox {
    pub format: OriginalFormatBox,
    pub scheme_type: SchemeTypeBox,
    pub info: SchemeInfoBox,
}

impl FromBytes for ProtectionSchemeInfoBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ProtectionSchemeInfoBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut format = None;
        let mut scheme_type = None;
        let mut info = None;
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"frma" => format = Some(OriginalFormatBox::from_bytes(stream)?),
                b"schm" => scheme_type = Some(SchemeTypeBox::from_bytes(stream)?),
                b"schi" => info = Some(SchemeInfoBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        let format = format.ok_or_else(|| ioerr!(InvalidData, "sinf: missing frma"))?;
        let scheme_type = scheme_type.ok_or_else(|| ioerr!(InvalidData, "sinf: missing schm"))?;
        let info = info.ok_or_else(|| ioerr!(InvalidData, "sinf: missing schi"))?;
        Ok(ProtectionSchemeInfoBox {
            format,
            scheme_type,
            info,
        })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ProtectionSchemeInfoBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        self.format.to_bytes(writer)?;
        self.scheme_type.to_bytes(writer)?;
        self.info.to_bytes(writer)?;

        writer.finalize()
    }
}

impl BoxInfo for ProtectionSchemeInfoBox {
    const FOURCC: &'static str = "sinf";

    fn fourcc(&self) -> FourCC {
        FourCC::new("sinf")
    }
}

impl FullBox for ProtectionSchemeInfoBox {}

/// Track Encryption Box (ISO/IEC 23001-7 8.2).
///
/// Version 0 for cenc/cbc1; version 1 for cens/cbcs, which adds the
/// crypt/skip pattern fields.
#[derive(Clone, Debug)]
pub struct TrackEncryptionBox {
    pub version: u8,
    pub default_is_protected: bool,
    pub default_per_sample_iv_size: u8,
    pub default_kid: Vec<u8>,
    pub default_crypt_byte_block: u8,
    pub default_skip_byte_block: u8,
    pub default_constant_iv: Vec<u8>,
}

impl Default for TrackEncryptionBox {
    fn default() -> TrackEncryptionBox {
        TrackEncryptionBox {
            version: 0,
            default_is_protected: false,
            default_per_sample_iv_size: 0,
            default_kid: vec![0; 16],
            default_crypt_byte_block: 0,
            default_skip_byte_block: 0,
            default_constant_iv: Vec::new(),
        }
    }
}

impl FromBytes for TrackEncryptionBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackEncryptionBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let version = stream.version();

        stream.skip(1)?;
        let pattern = u8::from_bytes(stream)?;
        let (crypt, skip) = if version > 0 {
            (pattern >> 4, pattern & 0x0f)
        } else {
            (0, 0)
        };
        let default_is_protected = u8::from_bytes(stream)? == 1;
        let default_per_sample_iv_size = u8::from_bytes(stream)?;
        let default_kid = stream.read(16)?.to_vec();
        let mut default_constant_iv = Vec::new();
        if default_is_protected && default_per_sample_iv_size == 0 {
            let iv_size = u8::from_bytes(stream)?;
            default_constant_iv = stream.read(iv_size as u64)?.to_vec();
        }

        Ok(TrackEncryptionBox {
            version,
            default_is_protected,
            default_per_sample_iv_size,
            default_kid,
            default_crypt_byte_block: crypt,
            default_skip_byte_block: skip,
            default_constant_iv,
        })
    }

    fn min_size() -> usize {
        24
    }
}

impl ToBytes for TrackEncryptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        stream.skip(1)?;
        if self.version > 0 {
            (((self.default_crypt_byte_block & 0x0f) << 4)
                | (self.default_skip_byte_block & 0x0f))
                .to_bytes(stream)?;
        } else {
            stream.skip(1)?;
        }
        (self.default_is_protected as u8).to_bytes(stream)?;
        self.default_per_sample_iv_size.to_bytes(stream)?;
        stream.write(&self.default_kid)?;
        if self.default_is_protected && self.default_per_sample_iv_size == 0 {
            (self.default_constant_iv.len() as u8).to_bytes(stream)?;
            stream.write(&self.default_constant_iv)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for TrackEncryptionBox {
    const FOURCC: &'static str = "tenc";

    fn fourcc(&self) -> FourCC {
        FourCC::new("tenc")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for TrackEncryptionBox {
    fn version(&self) -> Option<u8> {
        Some(self.version)
    }
}
