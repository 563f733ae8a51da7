//! Multi-segment segmenter: an init file plus one file per segment.
use std::fs;

use crate::boxes::SegmentTypeBox;
use crate::error::Result;
use crate::io::BufferWriter;
use crate::listener::MediaRanges;
use crate::segment::SegmenterCore;
use crate::serialize::ToBytes;
use crate::template::{fill_template, TemplateParams};

/// Writes `ftyp`+`moov` to the init file and, for every finalized
/// segment, a `styp` + `sidx` + moof/mdat pairs file named by the
/// segment template.
pub(crate) struct MultiSegmentSegmenter {
    pub core: SegmenterCore,
    styp: SegmentTypeBox,
    num_segments: u32,
}

impl MultiSegmentSegmenter {
    pub fn new(core: SegmenterCore) -> MultiSegmentSegmenter {
        let styp = core.ftyp.to_segment_type();
        MultiSegmentSegmenter {
            core,
            styp,
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

    pub fn finalize_segment(&mut self) -> Result<()> {
        let start_time = self.core.segment_start_dts.unwrap_or(0).max(0);
        let name = fill_template(
            &self.core.options.segment_template,
            &TemplateParams {
                number: self.core.segment_number,
                time: start_time as u64,
                bandwidth: self.core.options.bandwidth,
                representation_id: &self.core.options.representation_id,
            },
        )?;

        let mut buffer = BufferWriter::new();
        self.styp.to_bytes(&mut buffer)?;
        self.core.segment_index().to_bytes(&mut buffer)?;
        let duration = self.core.segment_duration();
        let size = buffer.len() as u64 + self.core.segment_buffer.len() as u64;

        let mut file = fs::File::create(&name)?;
        buffer.write_to(&mut file)?;
        self.core.segment_buffer.write_to(&mut file)?;

        self.core
            .listener
            .on_new_segment(&name, start_time, duration, size);
        self.core.end_segment();
        self.num_segments += 1;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(MediaRanges, u64)> {
        log::debug!("multi-segment run finished: {} segments", self.num_segments);
        Ok((MediaRanges::default(), self.core.total_duration))
    }
}
