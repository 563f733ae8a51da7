//! The MP4 muxer: composes `ftyp`/`moov` from stream metadata and
//! drives a segmenter.
//!
//! `moov` emission is deferred until the first sample arrives, because
//! the edit list offset comes from the first sample's pts/dts pair.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::boxes::*;
use crate::clock::{Clock, SystemClock};
use crate::crypto::{EncryptionConfig, EncryptionKey, KeySource};
use crate::error::{Error, Result};
use crate::io::SliceReader;
use crate::mp4box::GenericBox;
use crate::serialize::{FromBytes, ReadBytes};
use crate::listener::{MuxerListener, NullMuxerListener};
use crate::options::MuxerOptions;
use crate::sample::{CueEvent, MediaSample, SegmentInfo};
use crate::segment::Segmenter;
use crate::stream::{AudioInfo, Codec, StreamInfo, StreamType, VideoInfo};
use crate::types::*;

// The movie header timescale; track timescales are per-stream.
const MOVIE_TIMESCALE: u32 = 1000;

// CENC scheme version written into `schm` ("CENC 4").
const CENC_SCHEME_VERSION: u32 = 0x0001_0000;

pub struct Muxer {
    options: MuxerOptions,
    streams: Vec<StreamInfo>,
    listener: Option<Box<dyn MuxerListener>>,
    key_source: Option<Box<dyn KeySource>>,
    clock: Box<dyn Clock>,
    segmenter: Option<Segmenter>,
    edit_list_offset: Option<i64>,
    to_be_initialized: bool,
    // Cues received before the first sample; forwarded once the
    // segmenter exists.
    pending_cues: Vec<CueEvent>,
    cancelled: Arc<AtomicBool>,
}

impl Muxer {
    pub fn new(options: MuxerOptions) -> Muxer {
        Muxer {
            options,
            streams: Vec::new(),
            listener: None,
            key_source: None,
            clock: Box::new(SystemClock),
            segmenter: None,
            edit_list_offset: None,
            to_be_initialized: false,
            pending_cues: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add one elementary stream. All streams must be added before
    /// `initialize`.
    pub fn add_stream(&mut self, info: StreamInfo) {
        self.streams.push(info);
    }

    pub fn set_listener(&mut self, listener: Box<dyn MuxerListener>) {
        self.listener = Some(listener);
    }

    pub fn set_key_source(&mut self, key_source: Box<dyn KeySource>) {
        self.key_source = Some(key_source);
    }

    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    /// A flag that cancels the muxer cooperatively: the next
    /// `add_sample` returns `Error::Cancelled`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Prepare for the first sample. The actual `ftyp`/`moov` are
    /// emitted when it arrives.
    pub fn initialize(&mut self) -> Result<()> {
        if self.streams.is_empty() {
            return Err(Error::invalid_argument("no streams added"));
        }
        if self.options.output_file_name.is_empty() {
            return Err(Error::invalid_argument("output_file_name is required"));
        }
        for info in &self.streams {
            if info.is_encrypted {
                let config = info
                    .encryption_config
                    .as_ref()
                    .ok_or_else(|| Error::invalid_argument("encrypted stream without config"))?;
                config.validate()?;
                if self.key_source.is_none() {
                    return Err(Error::invalid_argument(
                        "encrypted stream but no key source",
                    ));
                }
            }
        }
        self.to_be_initialized = true;
        Ok(())
    }

    pub fn add_sample(&mut self, stream_id: usize, mut sample: MediaSample) -> Result<()> {
        let info = self
            .streams
            .get(stream_id)
            .ok_or_else(|| Error::invalid_argument(format!("unknown stream id {}", stream_id)))?;

        // Compensate for negative input timestamps.
        let offset_ms = self.options.transport_stream_timestamp_offset_ms as i64;
        if offset_ms != 0 {
            let ticks = offset_ms * info.time_scale as i64 / 1000;
            sample.pts += ticks;
            sample.dts += ticks;
        }

        if self.to_be_initialized {
            self.update_edit_list_offset(&sample)?;
            self.delay_initialize()?;
            self.to_be_initialized = false;
        }
        let segmenter = self
            .segmenter
            .as_mut()
            .ok_or_else(|| Error::muxer_failure("muxer not initialized"))?;
        segmenter.add_sample(stream_id, sample)
    }

    /// Explicit segment/subsegment boundary from the upstream handler.
    pub fn finalize_segment(&mut self, stream_id: usize, info: &SegmentInfo) -> Result<()> {
        log::debug!(
            "finalizing {}segment at {} duration {}",
            if info.is_subsegment { "sub" } else { "" },
            info.start_timestamp,
            info.duration
        );
        let segmenter = self
            .segmenter
            .as_mut()
            .ok_or_else(|| Error::muxer_failure("muxer not initialized"))?;
        segmenter.finalize_segment(stream_id, info)
    }

    /// An ad cue: close the running segment at the next stream access
    /// point and start a new crypto period if key rotation is on.
    pub fn handle_cue_event(&mut self, cue: CueEvent) {
        match self.segmenter {
            Some(ref mut segmenter) => segmenter.handle_cue(cue.time_in_seconds),
            None => self.pending_cues.push(cue),
        }
    }

    /// Flush any tail fragment, write trailing boxes and close outputs.
    pub fn finalize(&mut self) -> Result<()> {
        let segmenter = match self.segmenter.as_mut() {
            Some(s) => s,
            None => {
                // No samples ever arrived; nothing was written.
                log::info!(
                    "skip stream '{}' which does not contain any sample",
                    self.options.output_file_name
                );
                return Ok(());
            },
        };
        segmenter.finalize()?;
        log::info!("MP4 file '{}' finalized", self.options.output_file_name);
        Ok(())
    }

    // An edit list entry is inserted if
    //  (1) pts > dts for the first sample, to align the presentation
    //      time of the first presented sample with 0 under B-frame
    //      reordering, or
    //  (2) pts == dts < 0 (audio priming).
    fn update_edit_list_offset(&mut self, sample: &MediaSample) -> Result<()> {
        if self.edit_list_offset.is_some() {
            return Ok(());
        }
        let pts_dts_offset = sample.pts - sample.dts;
        if pts_dts_offset > 0 {
            if sample.pts < 0 {
                return Err(Error::muxer_failure(
                    "unsupported negative pts when there is an offset between pts and dts",
                ));
            }
            self.edit_list_offset = Some(pts_dts_offset);
            return Ok(());
        }
        if pts_dts_offset < 0 {
            return Err(Error::muxer_failure("not expecting pts < dts"));
        }
        self.edit_list_offset = Some((-sample.pts).max(0));
        Ok(())
    }

    // Build ftyp and moov, then create the segmenter.
    fn delay_initialize(&mut self) -> Result<()> {
        let ftyp = self.build_ftyp();
        let key = self.fetch_initial_key()?;
        let moov = self.build_moov(key.as_ref())?;

        let listener = self
            .listener
            .take()
            .unwrap_or_else(|| Box::new(NullMuxerListener));
        let mut segmenter = Segmenter::new(
            self.options.clone(),
            ftyp,
            moov,
            self.streams.clone(),
            self.key_source.take(),
            key,
            listener,
            self.cancelled.clone(),
        )?;
        segmenter.initialize()?;

        for cue in self.pending_cues.drain(..) {
            segmenter.handle_cue(cue.time_in_seconds);
        }

        // Downstream manifest generators only handle one stream per
        // muxer.
        if self.streams.len() == 1 {
            let timescale = segmenter.core().reference_timescale();
            let options = self.options.clone();
            let info = self.streams[0].clone();
            segmenter
                .core_mut()
                .listener
                .on_media_start(&options, &info, timescale);
        }

        self.segmenter = Some(segmenter);
        Ok(())
    }

    fn fetch_initial_key(&mut self) -> Result<Option<EncryptionKey>> {
        if !self.streams.iter().any(|s| s.is_encrypted) {
            return Ok(None);
        }
        let source = self
            .key_source
            .as_mut()
            .ok_or_else(|| Error::invalid_argument("encrypted stream but no key source"))?;
        let key = source.get_key("")?;
        Ok(Some(key))
    }

    fn build_ftyp(&self) -> FileTypeBox {
        let mut ftyp = FileTypeBox {
            major_brand: FourCC::new("mp41"),
            minor_version: 0,
            compatible_brands: vec![
                FourCC::new("iso8"),
                FourCC::new("isom"),
                FourCC::new("mp41"),
                FourCC::new("dash"),
            ],
        };

        if self.streams.len() == 1 {
            let info = &self.streams[0];
            let mut codec_fourcc = None;
            if let Some(video) = info.video() {
                codec_fourcc = Some(info.codec.fourcc(video.h26x_stream_format));
                ftyp.compatible_brands.push(codec_fourcc.unwrap());
                if info.codec_string.contains("dvh") {
                    ftyp.compatible_brands.push(FourCC::new("dby1"));
                }
            }
            // CMAF requires single initialization switching for
            // avc3/hev1, which is not supported.
            let inband = codec_fourcc
                .map(|f| f == b"avc3" || f == b"hev1")
                .unwrap_or(false);
            if !inband {
                ftyp.compatible_brands.push(FourCC::new("cmfc"));
            }
        }
        ftyp
    }

    fn build_moov(&self, key: Option<&EncryptionKey>) -> Result<MovieBox> {
        let now = Time::from_unix(self.clock.now());

        let movie_duration = self
            .streams
            .iter()
            .map(|s| scale_duration(s.duration, s.time_scale, MOVIE_TIMESCALE))
            .max()
            .unwrap_or(0);

        let mut moov = MovieBox {
            header: MovieHeaderBox {
                cr_time: now,
                mod_time: now,
                timescale: MOVIE_TIMESCALE,
                duration: Duration_(movie_duration),
                pref_rate: FixedFloat16_16(0x0001_0000),
                pref_vol: FixedFloat8_8(0x0100),
                matrix: Matrix::default(),
                next_track_id: self.streams.len() as u32 + 1,
            },
            ..MovieBox::default()
        };

        let mut mvex = MovieExtendsBox::default();
        if movie_duration > 0 {
            mvex.header = Some(MovieExtendsHeaderBox {
                fragment_duration: VersionSizedUint(movie_duration),
            });
        }

        for (idx, info) in self.streams.iter().enumerate() {
            let track_id = idx as u32 + 1;
            moov.tracks.push(self.build_trak(info, track_id, now)?);
            mvex.tracks.push(TrackExtendsBox {
                track_id,
                default_sample_description_index: 1,
                ..TrackExtendsBox::default()
            });
        }
        moov.extends = Some(mvex);

        // Movie-level pssh for the initial key.
        if self.options.mp4_params.include_pssh_in_stream {
            let mut system_info = key.map(|k| k.key_system_info.clone()).unwrap_or_default();
            if system_info.is_empty() {
                for info in &self.streams {
                    if let Some(ref config) = info.encryption_config {
                        system_info = config.key_system_info.clone();
                        break;
                    }
                }
            }
            for system in &system_info {
                if system.psshs.is_empty() {
                    continue;
                }
                moov.pssh.push(PsshBox::from_raw_box(&system.psshs)?);
            }
        }

        Ok(moov)
    }

    fn build_trak(&self, info: &StreamInfo, track_id: u32, now: Time) -> Result<TrackBox> {
        let mut header = TrackHeaderBox {
            flags: TRACK_ENABLED | TRACK_IN_MOVIE,
            creation_time: now,
            modification_time: now,
            track_id,
            duration: Duration_(scale_duration(info.duration, info.time_scale, MOVIE_TIMESCALE)),
            ..TrackHeaderBox::default()
        };

        let mut sample_table = SampleTableBox::default();
        let media_header;
        let handler_type;
        let handler_name;

        match info.stream_type() {
            StreamType::Video => {
                let video = info.video().unwrap();
                let (pixel_width, pixel_height) = effective_pixel_aspect(video);
                let sample_aspect_ratio = pixel_width as f64 / pixel_height as f64;
                header.width = FixedFloat16_16::from(video.width as f64 * sample_aspect_ratio);
                header.height = FixedFloat16_16::from(video.height as f64);

                let entry = self.build_video_entry(info, video)?;
                sample_table.description.entries.push(entry);

                media_header = MediaHeader::Video(VideoMediaHeaderBox::default());
                handler_type = TrackType::Video;
                handler_name = "VideoHandler";
            },
            StreamType::Audio => {
                let audio = info.audio().unwrap();
                header.volume = FixedFloat8_8(0x0100);

                let entry = self.build_audio_entry(info, audio)?;
                sample_table.description.entries.push(entry);

                if audio.seek_preroll_ns > 0 {
                    sample_table.sample_group_descriptions.push(SampleGroupDescriptionBox {
                        grouping_type: FourCC::new("roll"),
                        default_sample_description_index: None,
                        entries: vec![SampleGroupDescriptionEntry::Roll(AudioRollRecoveryEntry {
                            roll_distance: roll_distance(audio.seek_preroll_ns, audio.sampling_frequency),
                        })],
                    });
                    // The sample-to-group box is not allowed in the init
                    // segment; it goes into the fragments.
                }

                media_header = MediaHeader::Sound(SoundMediaHeaderBox::default());
                handler_type = TrackType::Audio;
                handler_name = "SoundHandler";
            },
            StreamType::Text => {
                let entry = self.build_text_entry(info)?;
                sample_table.description.entries.push(entry);

                if info.codec == Codec::Ttml {
                    media_header = MediaHeader::Subtitle(SubtitleMediaHeaderBox::default());
                    handler_type = TrackType::Subtitle;
                } else {
                    media_header = MediaHeader::Null(NullMediaHeaderBox::default());
                    handler_type = TrackType::Text;
                }
                handler_name = "TextHandler";
            },
        }

        // Duplicate the clear entry for clear-lead output, then turn
        // entry #1 into the encrypted variant.
        if info.is_encrypted {
            let config = info.encryption_config.as_ref().unwrap();
            if info.has_clear_lead {
                let clear = sample_table.description.entries[0].clone();
                sample_table.description.entries.push(clear);
            }
            match sample_table.description.entries.get_mut(0) {
                Some(SampleEntry::Video(entry)) => {
                    entry.sinf = Some(generate_sinf(entry.format, config));
                    entry.format = FourCC::new("encv");
                },
                Some(SampleEntry::Audio(entry)) => {
                    entry.sinf = Some(generate_sinf(entry.format, config));
                    entry.format = FourCC::new("enca");
                },
                _ => {
                    return Err(Error::unimplemented(
                        "encryption is only supported for audio and video tracks",
                    ))
                },
            }
        }

        let media = MediaBox {
            header: MediaHeaderBox {
                cr_time: now,
                mod_time: now,
                timescale: info.time_scale,
                duration: Duration_(info.duration),
                language: IsoLanguageCode::from_code(&info.language),
            },
            handler: HandlerBox {
                handler_type: handler_type.handler(),
                name: ZString::from(handler_name),
            },
            information: MediaInformationBox {
                media_header,
                data_information: DataInformationBox::default(),
                sample_table,
            },
        };

        let mut edit = None;
        if let Some(offset) = self.edit_list_offset {
            if offset > 0 {
                let mut list = EditListBox::default();
                list.entries.push(EditListEntry {
                    segment_duration: 0,
                    media_time: offset,
                    media_rate_integer: 1,
                    media_rate_fraction: 0,
                });
                edit = Some(EditBox { list });
            }
        }

        Ok(TrackBox {
            header,
            edit,
            media,
        })
    }

    fn build_video_entry(&self, info: &StreamInfo, video: &VideoInfo) -> Result<SampleEntry> {
        let format = info.codec.fourcc(video.h26x_stream_format);
        let config_fourcc = info
            .codec
            .config_fourcc()
            .ok_or_else(|| Error::unimplemented(format!("unsupported video codec {:?}", info.codec)))?;

        let mut entry = VideoSampleEntry {
            format,
            width: video.width as u16,
            height: video.height as u16,
            codec_configuration: CodecConfigurationBox {
                box_type: config_fourcc,
                data: info.codec_config.clone().into(),
            },
            ..VideoSampleEntry::default()
        };

        if !info.extra_codec_configs.is_empty() {
            entry.extra_codec_configs = parse_raw_boxes(&info.extra_codec_configs)
                .map_err(|e| Error::MuxerFailure(format!("malformed extra codec configs: {}", e)))?;
        }
        if !video.colr_data.is_empty() {
            let mut boxes = parse_raw_boxes(&video.colr_data)
                .map_err(|e| Error::MuxerFailure(format!("malformed colr data: {}", e)))?;
            entry.colr = boxes.pop();
        }
        let (pixel_width, pixel_height) = effective_pixel_aspect(video);
        if pixel_width != 1 || pixel_height != 1 {
            entry.pixel_aspect = Some(PixelAspectRatioBox {
                h_spacing: pixel_width,
                v_spacing: pixel_height,
            });
        }

        Ok(SampleEntry::Video(entry))
    }

    fn build_audio_entry(&self, info: &StreamInfo, audio: &AudioInfo) -> Result<SampleEntry> {
        let format = info.codec.fourcc(Default::default());
        let mut entry = AudioSampleEntry {
            format,
            sample_rate: audio.sampling_frequency,
            ..AudioSampleEntry::default()
        };

        match info.codec {
            Codec::Aac => {
                entry.esds = Some(ESDescriptorBox {
                    es_descriptor: ESDescriptor {
                        es_id: 0,
                        decoder_config: DecoderConfigDescriptor {
                            object_type: object_type::ISO_14496_3,
                            max_bitrate: audio.max_bitrate,
                            avg_bitrate: audio.avg_bitrate,
                            decoder_specific_info: info.codec_config.clone().into(),
                        },
                    },
                });
            },
            Codec::Mp3 => {
                let object_type = if audio.sampling_frequency < 32000 {
                    object_type::ISO_13818_3_MPEG1
                } else {
                    object_type::ISO_11172_3_MPEG1
                };
                // For MP3 the decoder specific info is empty; all the
                // data is in the bitstream frames themselves.
                entry.esds = Some(ESDescriptorBox {
                    es_descriptor: ESDescriptor {
                        es_id: 0,
                        decoder_config: DecoderConfigDescriptor {
                            object_type,
                            max_bitrate: audio.max_bitrate,
                            avg_bitrate: audio.avg_bitrate,
                            decoder_specific_info: Data::default(),
                        },
                    },
                });
            },
            Codec::Ac3 | Codec::Eac3 | Codec::Ac4 | Codec::Dtsc | Codec::Dtse | Codec::Dtsh
            | Codec::Dtsl | Codec::Opus | Codec::Flac | Codec::Mha1 | Codec::Mhm1 => {
                let config_fourcc = info.codec.config_fourcc().unwrap();
                entry.codec_config = Some(CodecConfigurationBox {
                    box_type: config_fourcc,
                    data: info.codec_config.clone().into(),
                });
            },
            _ => {
                return Err(Error::unimplemented(format!(
                    "unsupported audio codec {:?}",
                    info.codec
                )))
            },
        }

        match info.codec {
            Codec::Ac3 | Codec::Eac3 => {
                // AC3 and EC3 use constants instead of the actual
                // channel count and sample size.
                entry.channel_count = 2;
                entry.sample_size = 16;
            },
            Codec::Ac4 => {
                entry.channel_count = audio.channels;
                entry.sample_size = 16;
            },
            _ => {
                entry.channel_count = audio.channels;
                entry.sample_size = audio.sample_bits;
            },
        }

        Ok(SampleEntry::Audio(entry))
    }

    fn build_text_entry(&self, info: &StreamInfo) -> Result<SampleEntry> {
        let mut entry = TextSampleEntry::default();
        match info.codec {
            Codec::WebVtt => {
                entry.format = FourCC::new("wvtt");
                entry.config = Some(WebVttConfigurationBox {
                    config: TextString::from("WEBVTT"),
                });
                entry.label = Some(WebVttSourceLabelBox {
                    source_label: TextString::from("source_label"),
                });
            },
            Codec::Ttml => {
                entry.format = FourCC::new("stpp");
                entry.namespace = ZString::from("http://www.w3.org/ns/ttml");
            },
            _ => {
                return Err(Error::unimplemented(format!(
                    "unsupported text codec {:?}",
                    info.codec
                )))
            },
        }
        Ok(SampleEntry::Text(entry))
    }
}

// Parse a blob of concatenated raw boxes.
fn parse_raw_boxes(data: &[u8]) -> std::io::Result<Vec<GenericBox>> {
    let mut reader = SliceReader::new(data);
    let mut boxes = Vec::new();
    while reader.left() >= 8 {
        boxes.push(GenericBox::from_bytes(&mut reader)?);
    }
    Ok(boxes)
}

fn effective_pixel_aspect(video: &VideoInfo) -> (u32, u32) {
    if video.pixel_width == 0 || video.pixel_height == 0 {
        log::warn!("pixel width/height are not set, assuming 1:1");
        (1, 1)
    } else {
        (video.pixel_width, video.pixel_height)
    }
}

// The roll distance is expressed in sample units and is negative.
fn roll_distance(seek_preroll_ns: u64, sampling_frequency: u32) -> i16 {
    const NANOSECONDS_PER_SECOND: f64 = 1_000_000_000.0;
    let preroll_in_samples = seek_preroll_ns as f64 / NANOSECONDS_PER_SECOND * sampling_frequency as f64;
    -((preroll_in_samples + 0.5) as i16)
}

fn scale_duration(duration: u64, from: u32, to: u32) -> u64 {
    if from == 0 {
        return 0;
    }
    duration * to as u64 / from as u64
}

// Build the sinf for an encrypted sample entry.
fn generate_sinf(original_format: FourCC, config: &EncryptionConfig) -> ProtectionSchemeInfoBox {
    let tenc = TrackEncryptionBox {
        version: config.protection_scheme.tenc_version(),
        default_is_protected: true,
        default_per_sample_iv_size: config.per_sample_iv_size,
        default_kid: config.key_id_16(),
        default_crypt_byte_block: config.crypt_byte_block,
        default_skip_byte_block: config.skip_byte_block,
        default_constant_iv: if config.per_sample_iv_size == 0 {
            config.constant_iv.clone()
        } else {
            Vec::new()
        },
    };
    ProtectionSchemeInfoBox {
        format: OriginalFormatBox {
            format: original_format,
        },
        scheme_type: SchemeTypeBox {
            scheme_type: config.protection_scheme.fourcc(),
            scheme_version: CENC_SCHEME_VERSION,
        },
        info: SchemeInfoBox {
            track_encryption: tenc,
        },
    }
}
