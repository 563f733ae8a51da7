//! Low-latency segmenter for LL-DASH.
//!
//! Every sample becomes one chunk (a single moof+mdat pair) that is
//! flushed to the segment file immediately, so a CMAF chunked-transfer
//! origin can serve the segment while it is still growing.
use std::fs;
use std::io::Write;

use crate::boxes::SegmentTypeBox;
use crate::error::Result;
use crate::io::BufferWriter;
use crate::listener::MediaRanges;
use crate::segment::SegmenterCore;
use crate::serialize::ToBytes;
use crate::template::{fill_template, TemplateParams};

pub(crate) struct LowLatencySegmentSegmenter {
    pub core: SegmenterCore,
    styp: SegmentTypeBox,
    segment_file: Option<fs::File>,
    file_name: String,
    segment_size: u64,
    num_segments: u32,
}

impl LowLatencySegmentSegmenter {
    pub fn new(core: SegmenterCore) -> LowLatencySegmentSegmenter {
        let styp = core.ftyp.to_segment_type();
        LowLatencySegmentSegmenter {
            core,
            styp,
            segment_file: None,
            file_name: String::new(),
            segment_size: 0,
            num_segments: 0,
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        let mut buffer = BufferWriter::new();
        self.core.ftyp.to_bytes(&mut buffer)?;
        self.core.moov.to_bytes(&mut buffer)?;
        let mut file = fs::File::create(&self.core.options.output_file_name)?;
        buffer.write_to(&mut file)?;
        Ok(())
    }

    /// Close the accumulating fragment as a chunk and write it to the
    /// segment file right away.
    pub fn flush_chunk(&mut self) -> Result<()> {
        let bytes = match self.core.build_fragment()? {
            Some(bytes) => bytes,
            None => return Ok(()),
        };

        if self.segment_file.is_none() {
            self.open_segment_file()?;
        }
        let file = self.segment_file.as_mut().unwrap();
        file.write_all(&bytes)?;
        file.flush()?;
        self.segment_size += bytes.len() as u64;
        Ok(())
    }

    // The initial chunk starts the segment file: styp first.
    fn open_segment_file(&mut self) -> Result<()> {
        let start_time = self.core.segment_start_dts.unwrap_or(0).max(0);
        self.file_name = fill_template(
            &self.core.options.segment_template,
            &TemplateParams {
                number: self.core.segment_number,
                time: start_time as u64,
                bandwidth: self.core.options.bandwidth,
                representation_id: &self.core.options.representation_id,
            },
        )?;
        let mut file = fs::File::create(&self.file_name)?;

        let mut buffer = BufferWriter::new();
        self.styp.to_bytes(&mut buffer)?;
        let styp_size = buffer.len() as u64;
        buffer.write_to(&mut file)?;
        self.segment_size = styp_size;

        // Placeholder entry; the real size and duration follow in
        // on_completed_segment.
        self.core
            .listener
            .on_new_segment(&self.file_name, start_time, 0, 0);

        self.segment_file = Some(file);
        Ok(())
    }

    pub fn finalize_segment(&mut self) -> Result<()> {
        if self.segment_file.take().is_none() {
            return Ok(());
        }
        let duration = self.core.segment_duration();
        self.core
            .listener
            .on_completed_segment(duration, self.segment_size);
        log::debug!(
            "low-latency segment {} complete: {} bytes, {} ticks",
            self.file_name,
            self.segment_size,
            duration
        );
        self.segment_size = 0;
        self.core.end_segment();
        self.num_segments += 1;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(MediaRanges, u64)> {
        log::debug!("low-latency run finished: {} segments", self.num_segments);
        Ok((MediaRanges::default(), self.core.total_duration))
    }
}
