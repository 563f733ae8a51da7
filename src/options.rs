//! Muxer configuration.

/// MP4 (ISO-BMFF) specific output parameters.
#[derive(Clone, Debug)]
pub struct Mp4OutputParams {
    /// Also copy the `pssh` boxes into the first `moof` of every
    /// segment, so that a rotated key can be picked up mid-stream.
    pub include_pssh_in_stream: bool,
    /// Use the low-latency chunked segmenter (one moof+mdat per
    /// sample, flushed immediately).
    pub low_latency_dash_mode: bool,
}

impl Default for Mp4OutputParams {
    fn default() -> Mp4OutputParams {
        Mp4OutputParams {
            include_pssh_in_stream: true,
            low_latency_dash_mode: false,
        }
    }
}

/// The list of configuration options for the muxer.
#[derive(Clone, Debug)]
pub struct MuxerOptions {
    /// MP4 specific parameters.
    pub mp4_params: Mp4OutputParams,

    /// A positive value, in milliseconds, by which output timestamps
    /// are offset to compensate for negative timestamps in the input.
    pub transport_stream_timestamp_offset_ms: i32,

    /// Output file name. If `segment_template` is empty the muxer
    /// generates this single output file with all segments
    /// concatenated; otherwise it is the init segment name.
    pub output_file_name: String,

    /// Segment name pattern, supporting `$Number$`, `$Time$`,
    /// `$Bandwidth$` and `$RepresentationID$`. Empty means
    /// single-segment (VOD) mode.
    pub segment_template: String,

    /// Directory for intermediate files (single-segment mode).
    pub temp_dir: String,

    /// User-specified bit rate for the media stream. If zero, the
    /// muxer estimates it from the output size.
    pub bandwidth: u32,

    /// Representation id substituted into the segment template.
    pub representation_id: String,

    /// Target segment duration in seconds.
    pub segment_duration: f64,

    /// Target fragment (subsegment) duration in seconds.
    pub fragment_duration: f64,

    /// Segments must start on a stream access point.
    pub segment_sap_aligned: bool,

    /// Fragments must start on a stream access point.
    pub subsegment_sap_aligned: bool,

    /// Clear lead in seconds before encryption starts.
    pub clear_lead_seconds: f64,
}

impl Default for MuxerOptions {
    fn default() -> MuxerOptions {
        MuxerOptions {
            mp4_params: Mp4OutputParams::default(),
            transport_stream_timestamp_offset_ms: 0,
            output_file_name: String::new(),
            segment_template: String::new(),
            temp_dir: String::new(),
            bandwidth: 0,
            representation_id: String::new(),
            segment_duration: 6.0,
            fragment_duration: 6.0,
            segment_sap_aligned: true,
            subsegment_sap_aligned: true,
            clear_lead_seconds: 0.0,
        }
    }
}
