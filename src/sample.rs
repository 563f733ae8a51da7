//! Samples and segment boundary markers flowing into the muxer.

/// One elementary media sample.
///
/// Timestamps are in the track's timescale. A sample handed to the
/// muxer is consumed: encrypted in place if the track is protected,
/// then copied into the fragment payload and dropped.
#[derive(Clone, Debug, Default)]
pub struct MediaSample {
    pub pts: i64,
    pub dts: i64,
    pub duration: u32,
    pub is_key_frame: bool,
    /// Set once the sample has been encrypted.
    pub is_encrypted: bool,
    pub data: Vec<u8>,
}

impl MediaSample {
    pub fn new(pts: i64, dts: i64, duration: u32, is_key_frame: bool, data: Vec<u8>) -> MediaSample {
        MediaSample {
            pts,
            dts,
            duration,
            is_key_frame,
            is_encrypted: false,
            data,
        }
    }
}

/// Boundary marker: the upstream handler asks the muxer to close the
/// current segment (or subsegment / low-latency chunk).
#[derive(Clone, Debug, Default)]
pub struct SegmentInfo {
    pub start_timestamp: i64,
    pub duration: u64,
    pub is_subsegment: bool,
    pub is_encrypted: bool,
    pub is_chunk: bool,
}

/// Ad-cue marker; starts a new segment (and crypto period, when key
/// rotation is enabled) at the next stream access point.
#[derive(Clone, Copy, Debug, Default)]
pub struct CueEvent {
    pub time_in_seconds: f64,
}
