//! Single-segment (VOD) segmenter.
//!
//! Two-pass: moof+mdat pairs go to a temp file while `sidx` references
//! are collected; on finalize the real output is written as
//! `ftyp` + `moov` + `sidx` followed by the temp file contents.
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::boxes::{SegmentIndexBox, SegmentReference};
use crate::error::{Error, Result};
use crate::io::BufferWriter;
use crate::listener::{MediaRanges, Range};
use crate::segment::SegmenterCore;
use crate::serialize::ToBytes;

pub(crate) struct SingleSegmentSegmenter {
    pub core: SegmenterCore,
    temp_file: fs::File,
    references: Vec<SegmentReference>,
    earliest_presentation_time: Option<u64>,
}

impl SingleSegmentSegmenter {
    pub fn new(core: SegmenterCore) -> Result<SingleSegmentSegmenter> {
        let temp_file = if core.options.temp_dir.is_empty() {
            tempfile::tempfile()?
        } else {
            tempfile::tempfile_in(&core.options.temp_dir)?
        };
        Ok(SingleSegmentSegmenter {
            core,
            temp_file,
            references: Vec::new(),
            earliest_presentation_time: None,
        })
    }

    pub fn initialize(&mut self) -> Result<()> {
        // Nothing goes to the real output until finalize.
        Ok(())
    }

    /// One finalized segment becomes one subsegment reference.
    pub fn finalize_segment(&mut self) -> Result<()> {
        let size = self.core.segment_size();
        let duration = self.core.segment_duration();
        let first = match self.core.segment_records.first() {
            Some(first) => *first,
            None => return Ok(()),
        };
        if size > u32::MAX as u64 {
            return Err(Error::muxer_failure(format!("subsegment too large: {}", size)));
        }

        let earliest = first.earliest_pts.max(0) as u64;
        if self.earliest_presentation_time.is_none() {
            self.earliest_presentation_time = Some(earliest);
        }
        self.references.push(SegmentReference {
            reference_type: 0,
            referenced_size: size as u32,
            subsegment_duration: duration as u32,
            starts_with_sap: first.starts_with_sap,
            sap_type: if first.starts_with_sap { 1 } else { 0 },
            sap_delta_time: 0,
        });

        let start_time = self.core.segment_start_dts.unwrap_or(0).max(0);
        self.temp_file.write_all(self.core.segment_buffer.as_slice())?;

        let name = self.core.options.output_file_name.clone();
        self.core
            .listener
            .on_new_segment(&name, start_time, duration, size);
        self.core.end_segment();
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(MediaRanges, u64)> {
        let mut sidx = SegmentIndexBox {
            reference_id: self.core.reference_track as u32 + 1,
            timescale: self.core.reference_timescale(),
            earliest_presentation_time: self.earliest_presentation_time.unwrap_or(0).into(),
            first_offset: 0u64.into(),
            ..SegmentIndexBox::default()
        };
        sidx.references = std::mem::take(&mut self.references);

        let mut init = BufferWriter::new();
        self.core.ftyp.to_bytes(&mut init)?;
        self.core.moov.to_bytes(&mut init)?;
        let init_size = init.len() as u64;

        let mut index = BufferWriter::new();
        sidx.to_bytes(&mut index)?;
        let index_size = index.len() as u64;

        let mut out = fs::File::create(&self.core.options.output_file_name)?;
        init.write_to(&mut out)?;
        index.write_to(&mut out)?;

        // Stream the accumulated moof/mdat pairs after the sidx.
        self.temp_file.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; 128 * 1024];
        loop {
            let n = self.temp_file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
        }
        out.flush()?;

        let mut ranges = MediaRanges {
            init_range: Some(Range::from_offset_size(0, init_size)),
            index_range: Some(Range::from_offset_size(init_size, index_size)),
            subsegment_ranges: Vec::new(),
        };
        let mut offset = init_size + index_size;
        for r in &sidx.references {
            ranges
                .subsegment_ranges
                .push(Range::from_offset_size(offset, r.referenced_size as u64));
            offset += r.referenced_size as u64;
        }

        Ok((ranges, self.core.total_duration))
    }
}
