use std::io;

use crate::boxes::prelude::*;

/// 8.16.3 Segment Index Box (ISO/IEC 14496-12:2015(E))
///
/// One reference per (sub)segment: byte size, duration and SAP marker,
/// all measured against `reference_id`/`timescale`. Version 0 unless
/// the earliest presentation time or the first offset need 64 bits.
#[derive(Clone, Debug, Default)]
pub struct SegmentIndexBox {
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: VersionSizedUint,
    pub first_offset: VersionSizedUint,
    pub references: Vec<SegmentReference>,
}

impl FromBytes for SegmentIndexBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SegmentIndexBox> {
        let mut reader = BoxReader::new(stream, Self::max_version())?;
        let stream = &mut reader;

        let reference_id = u32::from_bytes(stream)?;
        let timescale = u32::from_bytes(stream)?;
        let earliest_presentation_time = VersionSizedUint::from_bytes(stream)?;
        let first_offset = VersionSizedUint::from_bytes(stream)?;
        stream.skip(2)?;
        let count = u16::from_bytes(stream)?;
        let mut references = Vec::with_capacity(count as usize);
        while (references.len() as u16) < count && stream.left() >= 12 {
            references.push(SegmentReference::from_bytes(stream)?);
        }

        Ok(SegmentIndexBox {
            reference_id,
            timescale,
            earliest_presentation_time,
            first_offset,
            references,
        })
    }

    fn min_size() -> usize {
        20
    }
}

impl ToBytes for SegmentIndexBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        self.reference_id.to_bytes(stream)?;
        self.timescale.to_bytes(stream)?;
        self.earliest_presentation_time.to_bytes(stream)?;
        self.first_offset.to_bytes(stream)?;
        stream.skip(2)?;
        (self.references.len() as u16).to_bytes(stream)?;
        for reference in &self.references {
            reference.to_bytes(stream)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for SegmentIndexBox {
    const FOURCC: &'static str = "sidx";

    fn fourcc(&self) -> FourCC {
        FourCC::new("sidx")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for SegmentIndexBox {
    fn version(&self) -> Option<u8> {
        let large = self.earliest_presentation_time.version().is_some()
            || self.first_offset.version().is_some();
        Some(large as u8)
    }
}

// A reference is three 32-bit words; the first and third carry flag
// bits packed above a size / delta field.
const REFERENCE_TYPE_BIT: u32 = 1 << 31;
const STARTS_WITH_SAP_BIT: u32 = 1 << 31;
const SAP_TYPE_SHIFT: u32 = 28;
const SAP_DELTA_MASK: u32 = (1 << SAP_TYPE_SHIFT) - 1;

/// One entry of the `sidx` reference table.
///
/// `reference_type` 0 points at media (moof+mdat), 1 at a nested
/// `sidx`. The packager only writes media references.
#[derive(Clone, Debug, Default)]
pub struct SegmentReference {
    pub reference_type: u8,
    pub referenced_size: u32,
    pub subsegment_duration: u32,
    pub starts_with_sap: bool,
    pub sap_type: u8,
    pub sap_delta_time: u32,
}

impl FromBytes for SegmentReference {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SegmentReference> {
        // 1 bit reference_type, 31 bits referenced_size.
        let word = u32::from_bytes(stream)?;
        let reference_type = (word >> 31) as u8;
        let referenced_size = word & !REFERENCE_TYPE_BIT;

        let subsegment_duration = u32::from_bytes(stream)?;

        // 1 bit starts_with_sap, 3 bits sap_type, 28 bits sap_delta.
        let word = u32::from_bytes(stream)?;
        let starts_with_sap = word & STARTS_WITH_SAP_BIT != 0;
        let sap_type = ((word >> SAP_TYPE_SHIFT) & 0x07) as u8;
        let sap_delta_time = word & SAP_DELTA_MASK;

        Ok(SegmentReference {
            reference_type,
            referenced_size,
            subsegment_duration,
            starts_with_sap,
            sap_type,
            sap_delta_time,
        })
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for SegmentReference {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut word = self.referenced_size & !REFERENCE_TYPE_BIT;
        if self.reference_type != 0 {
            word |= REFERENCE_TYPE_BIT;
        }
        word.to_bytes(stream)?;

        self.subsegment_duration.to_bytes(stream)?;

        let mut word = self.sap_delta_time & SAP_DELTA_MASK;
        word |= ((self.sap_type & 0x07) as u32) << SAP_TYPE_SHIFT;
        if self.starts_with_sap {
            word |= STARTS_WITH_SAP_BIT;
        }
        word.to_bytes(stream)
    }
}
