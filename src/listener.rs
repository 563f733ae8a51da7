//! Events reported to downstream manifest generators.
use crate::options::MuxerOptions;
use crate::stream::StreamInfo;

/// An inclusive byte range in an output file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    pub fn from_offset_size(offset: u64, size: u64) -> Range {
        Range {
            start: offset,
            end: offset + size - 1,
        }
    }
}

/// Byte ranges describing a finished single-file output.
#[derive(Clone, Debug, Default)]
pub struct MediaRanges {
    /// `ftyp` + `moov`.
    pub init_range: Option<Range>,
    /// `sidx`.
    pub index_range: Option<Range>,
    /// One range per subsegment.
    pub subsegment_ranges: Vec<Range>,
}

/// Receives muxer progress events. MPD and HLS playlist generation
/// live behind this interface, outside the packager core.
#[allow(unused_variables)]
pub trait MuxerListener {
    /// The first sample arrived and the init data is final.
    fn on_media_start(&mut self, options: &MuxerOptions, info: &StreamInfo, time_scale: u32) {}

    /// A segment file was completely written.
    fn on_new_segment(&mut self, file_name: &str, start_time: i64, duration: u64, size: u64) {}

    /// A low-latency segment is complete: final size and duration for
    /// the placeholders reported when the segment started.
    fn on_completed_segment(&mut self, duration: u64, size: u64) {}

    /// Muxing finished.
    fn on_media_end(&mut self, ranges: &MediaRanges, duration_seconds: f32) {}
}

/// A listener that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMuxerListener;

impl MuxerListener for NullMuxerListener {}
