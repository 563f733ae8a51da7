use std::io;

use crate::boxes::prelude::*;

/// 8.9.3 Sample Group Description Box (ISO/IEC 14496-12:2015(E))
///
/// Written as version 1 with a `default_length`, which requires all
/// entries to serialize to the same size (true for the grouping types
/// the packager emits: `seig` and `roll`).
#[derive(Clone, Debug, Default)]
pub struct SampleGroupDescriptionBox {
    pub grouping_type: FourCC,
    pub default_sample_description_index: Option<u32>,
    pub entries: Vec<SampleGroupDescriptionEntry>,
}

impl SampleGroupDescriptionBox {
    fn default_length(&self) -> u32 {
        let mut len = None;
        for e in &self.entries {
            let sz = e.size();
            match len {
                None => len = Some(sz),
                Some(l) if l != sz => return 0,
                _ => {},
            }
        }
        len.unwrap_or(0)
    }
}

impl FromBytes for SampleGroupDescriptionBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleGroupDescriptionBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let version = stream.version();

        let grouping_type = FourCC::from_bytes(stream)?;
        let default_length = if version == 1 {
            u32::from_bytes(stream)?
        } else {
            0
        };
        let default_sample_description_index = if version >= 2 {
            Some(u32::from_bytes(stream)?)
        } else {
            None
        };

        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::new();
        while (entries.len() as u32) < count && stream.left() > 0 {
            let mut length = default_length;
            if version == 1 && default_length == 0 {
                length = u32::from_bytes(stream)?;
            }
            entries.push(SampleGroupDescriptionEntry::from_bytes(
                stream,
                grouping_type,
                length,
            )?);
        }

        Ok(SampleGroupDescriptionBox {
            grouping_type,
            default_sample_description_index,
            entries,
        })
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for SampleGroupDescriptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let default_length = self.default_length();
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        let version = stream.version();

        self.grouping_type.to_bytes(stream)?;
        if version == 1 {
            default_length.to_bytes(stream)?;
        }
        if version >= 2 {
            self.default_sample_description_index.unwrap_or(0).to_bytes(stream)?;
        }

        (self.entries.len() as u32).to_bytes(stream)?;
        for e in &self.entries {
            if version == 1 && default_length == 0 {
                e.size().to_bytes(stream)?;
            }
            e.to_bytes(stream)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for SampleGroupDescriptionBox {
    const FOURCC: &'static str = "sgpd";

    fn fourcc(&self) -> FourCC {
        FourCC::new("sgpd")
    }
    fn max_version() -> Option<u8> {
        Some(2)
    }
}

impl FullBox for SampleGroupDescriptionBox {
    fn version(&self) -> Option<u8> {
        if self.default_sample_description_index.is_some() {
            Some(2)
        } else {
            Some(1)
        }
    }
}

/// One entry in a SampleGroupDescriptionBox, keyed by grouping type.
#[derive(Clone, Debug)]
pub enum SampleGroupDescriptionEntry {
    Seig(CencSampleEncryptionInfoEntry),
    Roll(AudioRollRecoveryEntry),
    Generic(Data),
}

impl SampleGroupDescriptionEntry {
    fn from_bytes<R: ReadBytes>(
        stream: &mut R,
        grouping_type: FourCC,
        length: u32,
    ) -> io::Result<SampleGroupDescriptionEntry> {
        let e = match &grouping_type.to_be_bytes() {
            b"seig" => SampleGroupDescriptionEntry::Seig(CencSampleEncryptionInfoEntry::from_bytes(stream)?),
            b"roll" => SampleGroupDescriptionEntry::Roll(AudioRollRecoveryEntry::from_bytes(stream)?),
            _ => SampleGroupDescriptionEntry::Generic(Data::read(stream, length as usize)?),
        };
        Ok(e)
    }

    fn size(&self) -> u32 {
        match self {
            SampleGroupDescriptionEntry::Seig(e) => e.size(),
            SampleGroupDescriptionEntry::Roll(_) => 2,
            SampleGroupDescriptionEntry::Generic(d) => d.len() as u32,
        }
    }
}

impl ToBytes for SampleGroupDescriptionEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        match self {
            SampleGroupDescriptionEntry::Seig(e) => e.to_bytes(stream),
            SampleGroupDescriptionEntry::Roll(e) => e.to_bytes(stream),
            SampleGroupDescriptionEntry::Generic(d) => d.to_bytes(stream),
        }
    }
}

/// CencSampleEncryptionInfoEntry, grouping type `seig` (ISO/IEC 23001-7).
///
/// Carries the crypto parameters for a group of samples; used for key
/// rotation where a fragment switches to a new key.
#[derive(Clone, Debug, Default)]
pub struct CencSampleEncryptionInfoEntry {
    pub is_protected: bool,
    pub per_sample_iv_size: u8,
    pub key_id: Vec<u8>,
    pub crypt_byte_block: u8,
    pub skip_byte_block: u8,
    pub constant_iv: Vec<u8>,
}

impl CencSampleEncryptionInfoEntry {
    fn size(&self) -> u32 {
        let mut sz = 20;
        if self.is_protected && self.per_sample_iv_size == 0 {
            sz += 1 + self.constant_iv.len() as u32;
        }
        sz
    }
}

impl FromBytes for CencSampleEncryptionInfoEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        stream.skip(1)?;
        let pattern = u8::from_bytes(stream)?;
        let is_protected = u8::from_bytes(stream)? == 1;
        let per_sample_iv_size = u8::from_bytes(stream)?;
        let key_id = stream.read(16)?.to_vec();
        let mut constant_iv = Vec::new();
        if is_protected && per_sample_iv_size == 0 {
            let iv_size = u8::from_bytes(stream)?;
            constant_iv = stream.read(iv_size as u64)?.to_vec();
        }
        Ok(CencSampleEncryptionInfoEntry {
            is_protected,
            per_sample_iv_size,
            key_id,
            crypt_byte_block: pattern >> 4,
            skip_byte_block: pattern & 0x0f,
            constant_iv,
        })
    }

    fn min_size() -> usize {
        20
    }
}

impl ToBytes for CencSampleEncryptionInfoEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        stream.skip(1)?;
        (((self.crypt_byte_block & 0x0f) << 4) | (self.skip_byte_block & 0x0f)).to_bytes(stream)?;
        (self.is_protected as u8).to_bytes(stream)?;
        self.per_sample_iv_size.to_bytes(stream)?;
        stream.write(&self.key_id)?;
        if self.is_protected && self.per_sample_iv_size == 0 {
            (self.constant_iv.len() as u8).to_bytes(stream)?;
            stream.write(&self.constant_iv)?;
        }
        Ok(())
    }
}

def_struct! {
    /// AudioRollRecoveryEntry, grouping type `roll`.
    #[derive(Default)]
    AudioRollRecoveryEntry,
        roll_distance:  i16,
}
