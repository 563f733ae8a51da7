//! Per-fragment sample encryption boxes: `senc`, `saiz`, `saio`.
use std::io;

use crate::boxes::prelude::*;
use crate::io::SliceReader;

/// The senc flag that signals the presence of subsample entries.
pub const SENC_USE_SUBSAMPLE_ENCRYPTION: u32 = 0x02;

/// Subsample clear/cipher partition of a single sample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubsampleEntry {
    pub clear_bytes: u16,
    pub cipher_bytes: u32,
}

impl FromBytes for SubsampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        Ok(SubsampleEntry {
            clear_bytes: u16::from_bytes(stream)?,
            cipher_bytes: u32::from_bytes(stream)?,
        })
    }
    fn min_size() -> usize {
        6
    }
}

impl ToBytes for SubsampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.clear_bytes.to_bytes(stream)?;
        self.cipher_bytes.to_bytes(stream)
    }
}

/// One `senc` entry: the per-sample IV and the subsample partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleEncryptionEntry {
    /// Empty when the scheme uses a constant IV.
    pub initialization_vector: Vec<u8>,
    pub subsamples: Vec<SubsampleEntry>,
}

impl SampleEncryptionEntry {
    fn read<R: ReadBytes>(stream: &mut R, iv_size: u8, has_subsamples: bool) -> io::Result<Self> {
        let initialization_vector = stream.read(iv_size as u64)?.to_vec();
        let mut subsamples = Vec::new();
        if has_subsamples {
            let count = u16::from_bytes(stream)?;
            for _ in 0..count {
                subsamples.push(SubsampleEntry::from_bytes(stream)?);
            }
        }
        Ok(SampleEncryptionEntry {
            initialization_vector,
            subsamples,
        })
    }

    fn write<W: WriteBytes>(&self, stream: &mut W, has_subsamples: bool) -> io::Result<()> {
        stream.write(&self.initialization_vector)?;
        if has_subsamples {
            (self.subsamples.len() as u16).to_bytes(stream)?;
            for sub in &self.subsamples {
                sub.to_bytes(stream)?;
            }
        }
        Ok(())
    }

    /// Serialized size in bytes.
    pub fn size(&self, has_subsamples: bool) -> u32 {
        let mut sz = self.initialization_vector.len() as u32;
        if has_subsamples {
            sz += 2 + 6 * self.subsamples.len() as u32;
        }
        sz
    }

    /// Total cipher bytes over all subsamples.
    pub fn cipher_bytes(&self) -> u64 {
        self.subsamples.iter().map(|s| s.cipher_bytes as u64).sum()
    }
}

/// Sample Encryption Box (ISO/IEC 23001-7 7.1).
///
/// The IV size is not recorded in the box itself, so on read the
/// payload is kept opaque; call [`SampleEncryptionBox::parse_entries`]
/// once the `tenc` (or `seig`) has told you the IV size.
#[derive(Clone, Debug, Default)]
pub struct SampleEncryptionBox {
    pub use_subsample_encryption: bool,
    pub entries: Vec<SampleEncryptionEntry>,
    /// Unparsed payload (sample count + entries), present after a read.
    pub data: Data,
}

impl SampleEncryptionBox {
    /// Parse the raw payload with a known IV size.
    pub fn parse_entries(&self, iv_size: u8) -> io::Result<Vec<SampleEncryptionEntry>> {
        let mut stream = SliceReader::new(&self.data.0);
        let count = u32::from_bytes(&mut stream)?;
        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(SampleEncryptionEntry::read(
                &mut stream,
                iv_size,
                self.use_subsample_encryption,
            )?);
        }
        Ok(entries)
    }

    /// Byte offset of the first entry, relative to the start of this box.
    pub fn first_entry_offset(&self) -> u64 {
        // header + version/flags + sample_count.
        8 + 4 + 4
    }
}

impl FromBytes for SampleEncryptionBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleEncryptionBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let use_subsample_encryption = reader.header.flags & SENC_USE_SUBSAMPLE_ENCRYPTION > 0;
        let data = Data::from_bytes(&mut reader)?;
        Ok(SampleEncryptionBox {
            use_subsample_encryption,
            entries: Vec::new(),
            data,
        })
    }

    fn min_size() -> usize {
        16
    }
}

impl ToBytes for SampleEncryptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        if !self.entries.is_empty() {
            (self.entries.len() as u32).to_bytes(stream)?;
            for e in &self.entries {
                e.write(stream, self.use_subsample_encryption)?;
            }
        } else {
            self.data.to_bytes(stream)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for SampleEncryptionBox {
    const FOURCC: &'static str = "senc";

    fn fourcc(&self) -> FourCC {
        FourCC::new("senc")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for SampleEncryptionBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    fn flags(&self) -> u32 {
        if self.use_subsample_encryption {
            SENC_USE_SUBSAMPLE_ENCRYPTION
        } else {
            0
        }
    }
}

/// Sample Auxiliary Information Sizes Box (8.7.8).
///
/// When all sizes are equal only `default_sample_info_size` is written.
#[derive(Clone, Debug, Default)]
pub struct SampleAuxiliaryInformationSizeBox {
    pub default_sample_info_size: u8,
    pub sample_count: u32,
    pub sample_info_sizes: Vec<u8>,
}

impl SampleAuxiliaryInformationSizeBox {
    /// Build from per-sample sizes, demoting to the default form when uniform.
    pub fn from_sizes(sizes: &[u8]) -> SampleAuxiliaryInformationSizeBox {
        let uniform = sizes.first().map(|&f| sizes.iter().all(|&s| s == f)).unwrap_or(false);
        if uniform {
            SampleAuxiliaryInformationSizeBox {
                default_sample_info_size: sizes[0],
                sample_count: sizes.len() as u32,
                sample_info_sizes: Vec::new(),
            }
        } else {
            SampleAuxiliaryInformationSizeBox {
                default_sample_info_size: 0,
                sample_count: sizes.len() as u32,
                sample_info_sizes: sizes.to_vec(),
            }
        }
    }
}

impl FromBytes for SampleAuxiliaryInformationSizeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleAuxiliaryInformationSizeBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        if stream.flags() & 1 > 0 {
            // aux_info_type / parameter; never written by us.
            stream.skip(8)?;
        }
        let default_sample_info_size = u8::from_bytes(stream)?;
        let sample_count = u32::from_bytes(stream)?;
        let mut sample_info_sizes = Vec::new();
        if default_sample_info_size == 0 {
            sample_info_sizes = stream.read(sample_count as u64)?.to_vec();
        }

        Ok(SampleAuxiliaryInformationSizeBox {
            default_sample_info_size,
            sample_count,
            sample_info_sizes,
        })
    }

    fn min_size() -> usize {
        9
    }
}

impl ToBytes for SampleAuxiliaryInformationSizeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        self.default_sample_info_size.to_bytes(stream)?;
        self.sample_count.to_bytes(stream)?;
        if self.default_sample_info_size == 0 {
            stream.write(&self.sample_info_sizes)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for SampleAuxiliaryInformationSizeBox {
    const FOURCC: &'static str = "saiz";

    fn fourcc(&self) -> FourCC {
        FourCC::new("saiz")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for SampleAuxiliaryInformationSizeBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

/// Sample Auxiliary Information Offsets Box (8.7.9).
///
/// The packager writes a single offset pointing at the first `senc`
/// entry, relative to the enclosing `moof`.
#[derive(Clone, Debug, Default)]
pub struct SampleAuxiliaryInformationOffsetBox {
    pub offsets: Vec<u64>,
}

impl FromBytes for SampleAuxiliaryInformationOffsetBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleAuxiliaryInformationOffsetBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let version = stream.version();
        if stream.flags() & 1 > 0 {
            stream.skip(8)?;
        }
        let count = u32::from_bytes(stream)?;
        let mut offsets = Vec::with_capacity(std::cmp::min(count as usize, 65536));
        for _ in 0..count {
            if version == 0 {
                offsets.push(u32::from_bytes(stream)? as u64);
            } else {
                offsets.push(u64::from_bytes(stream)?);
            }
        }

        Ok(SampleAuxiliaryInformationOffsetBox { offsets })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for SampleAuxiliaryInformationOffsetBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        let version = stream.version();
        (self.offsets.len() as u32).to_bytes(stream)?;
        for off in &self.offsets {
            if version == 0 {
                (*off as u32).to_bytes(stream)?;
            } else {
                off.to_bytes(stream)?;
            }
        }

        writer.finalize()
    }
}

impl BoxInfo for SampleAuxiliaryInformationOffsetBox {
    const FOURCC: &'static str = "saio";

    fn fourcc(&self) -> FourCC {
        FourCC::new("saio")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for SampleAuxiliaryInformationOffsetBox {
    fn version(&self) -> Option<u8> {
        if self.offsets.iter().any(|&o| o > u32::MAX as u64) {
            Some(1)
        } else {
            Some(0)
        }
    }
}
