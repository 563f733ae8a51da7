//! Segmenters: group samples into fragments and segments, enforce
//! SAP/duration policy, and write segment bytes out.
//!
//! Three variants share one core: multi-segment (one file per
//! segment), single-segment (VOD, one file plus `sidx`), and
//! low-latency (one chunk per sample, flushed immediately).
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::boxes::*;
use crate::crypto::{EncryptionKey, KeySource, SampleEncryptor};
use crate::error::{Error, Result};
use crate::io::BufferWriter;
use crate::listener::MuxerListener;
use crate::mp4box::box_size;
use crate::options::MuxerOptions;
use crate::sample::{MediaSample, SegmentInfo};
use crate::serialize::{ToBytes, WriteBytes};
use crate::stream::{StreamInfo, StreamType};

mod fragment;
mod low_latency;
mod multi;
mod single;

pub(crate) use self::fragment::Fragmenter;
pub(crate) use self::low_latency::LowLatencySegmentSegmenter;
pub(crate) use self::multi::MultiSegmentSegmenter;
pub(crate) use self::single::SingleSegmentSegmenter;

/// Per-track muxing state that lives across fragments.
pub(crate) struct TrackState {
    pub info: StreamInfo,
    pub fragmenter: Fragmenter,
    pub encryptor: Option<SampleEncryptor>,
    /// Clear lead over; samples are now encrypted.
    pub encryption_started: bool,
    /// End of the clear lead in track timescale ticks.
    pub clear_lead_end: i64,
    /// Fragment-local `seig` group emitted after a key rotation.
    pub pending_seig: Option<CencSampleEncryptionInfoEntry>,
}

// Bookkeeping for one finalized fragment, the raw material for sidx
// references and segment duration accounting.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FragmentRecord {
    pub size: u64,
    pub duration: u64,
    pub earliest_pts: i64,
    pub starts_with_sap: bool,
}

/// State shared by all segmenter variants.
pub(crate) struct SegmenterCore {
    pub options: MuxerOptions,
    pub ftyp: FileTypeBox,
    pub moov: MovieBox,
    pub tracks: Vec<TrackState>,
    pub reference_track: usize,
    pub listener: Box<dyn MuxerListener>,

    sequence_number: u32,
    /// moof+mdat pairs of the segment being accumulated.
    pub segment_buffer: BufferWriter,
    pub segment_records: Vec<FragmentRecord>,
    pub segment_start_dts: Option<i64>,
    pub segment_number: u64,
    segment_has_moof: bool,

    cancelled: Arc<AtomicBool>,
    key_source: Option<Box<dyn KeySource>>,
    current_key: Option<EncryptionKey>,
    pending_cue: Option<i64>,
    rotate_key_pending: bool,
    crypto_period_index: u32,

    pub total_duration: u64,
}

impl SegmenterCore {
    pub fn new(
        options: MuxerOptions,
        ftyp: FileTypeBox,
        moov: MovieBox,
        streams: Vec<StreamInfo>,
        key_source: Option<Box<dyn KeySource>>,
        current_key: Option<EncryptionKey>,
        listener: Box<dyn MuxerListener>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<SegmenterCore> {
        let reference_track = streams
            .iter()
            .position(|s| s.stream_type() == StreamType::Video)
            .unwrap_or(0);

        let mut tracks = Vec::with_capacity(streams.len());
        for (idx, info) in streams.into_iter().enumerate() {
            let mut encryptor = None;
            let mut clear_lead_end = 0i64;
            let mut encryption_started = false;
            if info.is_encrypted {
                let config = info.encryption_config.as_ref().ok_or_else(|| {
                    Error::invalid_argument("encrypted stream without encryption config")
                })?;
                let key = current_key
                    .as_ref()
                    .ok_or_else(|| Error::invalid_argument("encrypted stream without a key"))?;
                encryptor = Some(SampleEncryptor::new(config, key, info.codec)?);
                clear_lead_end =
                    (options.clear_lead_seconds * info.time_scale as f64).round() as i64;
                encryption_started = !(info.has_clear_lead && clear_lead_end > 0);
            }
            tracks.push(TrackState {
                fragmenter: Fragmenter::new(idx as u32 + 1),
                encryptor,
                encryption_started,
                clear_lead_end,
                pending_seig: None,
                info,
            });
        }

        Ok(SegmenterCore {
            options,
            ftyp,
            moov,
            tracks,
            reference_track,
            listener,
            sequence_number: 1,
            segment_buffer: BufferWriter::new(),
            segment_records: Vec::new(),
            segment_start_dts: None,
            segment_number: 1,
            segment_has_moof: false,
            cancelled,
            key_source,
            current_key,
            pending_cue: None,
            rotate_key_pending: false,
            crypto_period_index: 0,
            total_duration: 0,
        })
    }

    pub fn reference_timescale(&self) -> u32 {
        self.tracks[self.reference_track].info.time_scale
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub fn handle_cue(&mut self, time_in_seconds: f64) {
        let ticks = (time_in_seconds * self.reference_timescale() as f64).round() as i64;
        self.pending_cue = Some(ticks);
    }

    /// Is there anything in the current segment at all?
    pub fn segment_is_empty(&self) -> bool {
        self.segment_records.is_empty() && self.tracks.iter().all(|t| t.fragmenter.is_empty())
    }

    pub fn segment_duration(&self) -> u64 {
        self.segment_records.iter().map(|r| r.duration).sum::<u64>()
            + self.tracks[self.reference_track].fragmenter.duration()
    }

    pub fn segment_size(&self) -> u64 {
        self.segment_records.iter().map(|r| r.size).sum()
    }

    /// Decide whether this sample should first close the current
    /// fragment and/or segment. Only the reference track drives
    /// boundaries; the other tracks follow.
    pub fn boundary(&self, stream_id: usize, sample: &MediaSample) -> (bool, bool) {
        if stream_id != self.reference_track || self.segment_is_empty() {
            return (false, false);
        }
        let track = &self.tracks[stream_id];
        let timescale = track.info.time_scale as f64;
        let is_sap = sample.is_key_frame;

        let sap_ok_segment = !self.options.segment_sap_aligned || is_sap;
        let sap_ok_fragment = !self.options.subsegment_sap_aligned || is_sap;

        let segment_target = (self.options.segment_duration * timescale) as u64;
        let fragment_target = (self.options.fragment_duration * timescale) as u64;

        let cue_hit = self.cue_hit(stream_id, sample);
        let close_segment =
            sap_ok_segment && (self.segment_duration() >= segment_target.max(1) || cue_hit);

        let clear_lead_over = track.info.is_encrypted
            && !track.encryption_started
            && sample.pts >= track.clear_lead_end;

        let close_fragment = close_segment
            || (sap_ok_fragment
                && !track.fragmenter.is_empty()
                && (track.fragmenter.duration() >= fragment_target.max(1) || clear_lead_over));

        (close_fragment, close_segment)
    }

    /// When a cue closed the previous segment, fetch the next crypto
    /// period key before the new segment starts.
    pub fn rotate_key_if_pending(&mut self) -> Result<()> {
        if !self.rotate_key_pending {
            return Ok(());
        }
        self.rotate_key_pending = false;
        let source = match self.key_source.as_mut() {
            Some(s) => s,
            None => return Ok(()),
        };
        self.crypto_period_index += 1;
        let key = source.get_crypto_period_key(self.crypto_period_index, "")?;

        for track in &mut self.tracks {
            if !track.info.is_encrypted {
                continue;
            }
            let config = track.info.encryption_config.as_ref().unwrap();
            if let Some(ref mut encryptor) = track.encryptor {
                encryptor.set_key(&key)?;
            }
            let mut key_id = key.key_id.clone();
            if key_id.len() != 16 {
                log::warn!("resized {}-byte KID to 16 bytes", key_id.len());
                key_id.resize(16, 0);
            }
            track.pending_seig = Some(CencSampleEncryptionInfoEntry {
                is_protected: true,
                per_sample_iv_size: config.per_sample_iv_size,
                key_id,
                crypt_byte_block: config.crypt_byte_block,
                skip_byte_block: config.skip_byte_block,
                constant_iv: config.constant_iv.clone(),
            });
        }
        self.current_key = Some(key);
        Ok(())
    }

    /// Route one sample into its track fragmenter, encrypting it first
    /// if the track is protected and past its clear lead.
    pub fn append_sample(&mut self, stream_id: usize, mut sample: MediaSample) -> Result<()> {
        let reference = stream_id == self.reference_track;
        let track = self
            .tracks
            .get_mut(stream_id)
            .ok_or_else(|| Error::invalid_argument(format!("unknown stream id {}", stream_id)))?;

        if track.fragmenter.is_empty() || track.fragmenter.is_finalized() {
            // Fragment start: fix the sample description index and the
            // encryption state for the whole fragment.
            if track.info.is_encrypted
                && !track.encryption_started
                && sample.pts >= track.clear_lead_end
            {
                track.encryption_started = true;
            }
            let sdi = if track.info.is_encrypted && !track.encryption_started {
                // Clear-lead samples use the second, clear sample entry.
                2
            } else {
                1
            };
            let seig = if track.encryption_started {
                track.pending_seig.clone()
            } else {
                None
            };
            track.fragmenter.reset(sdi, seig);
        }

        let mut senc_entry = None;
        if track.encryption_started {
            if let Some(ref mut encryptor) = track.encryptor {
                senc_entry = Some(encryptor.encrypt_sample(&mut sample.data)?);
                sample.is_encrypted = true;
            }
        }

        if reference && self.segment_start_dts.is_none() {
            self.segment_start_dts = Some(sample.dts);
        }

        track.fragmenter.add_sample(&sample, senc_entry)?;
        Ok(())
    }

    /// Close the current fragment over all tracks: build the `moof`,
    /// run the two-pass offset fix-up, and serialize moof+mdat.
    ///
    /// Returns `None` when no track has any samples.
    pub fn build_fragment(&mut self) -> Result<Option<Vec<u8>>> {
        let mut trafs = Vec::new();
        let mut payloads = Vec::new();
        let mut ref_stats = None;
        let mut first_stats = None;

        for (idx, track) in self.tracks.iter_mut().enumerate() {
            if track.fragmenter.is_empty() || track.fragmenter.is_finalized() {
                continue;
            }
            let (traf, payload, stats) = track.fragmenter.finalize()?;
            if idx == self.reference_track {
                ref_stats = Some(stats);
            }
            if first_stats.is_none() {
                first_stats = Some(stats);
            }
            trafs.push(traf);
            payloads.push(payload);
        }
        if trafs.is_empty() {
            return Ok(None);
        }
        let stats = ref_stats.or(first_stats).unwrap();

        let mut moof = MovieFragmentBox {
            header: MovieFragmentHeaderBox {
                sequence_number: self.sequence_number,
            },
            tracks: trafs,
            pssh: Vec::new(),
        };
        // Sequence numbers increase monotonically for the lifetime of
        // the segmenter, across segment boundaries.
        self.sequence_number += 1;

        if !self.segment_has_moof && self.options.mp4_params.include_pssh_in_stream {
            if let Some(ref key) = self.current_key {
                for info in &key.key_system_info {
                    if info.psshs.is_empty() {
                        continue;
                    }
                    moof.pssh.push(PsshBox::from_raw_box(&info.psshs)?);
                }
            }
        }
        self.segment_has_moof = true;

        // Two-pass offset fix-up: size the moof with placeholder
        // offsets, then patch trun.data_offset and saio in place.
        let moof_size = box_size(&moof);
        if moof_size > i32::MAX as u64 {
            return Err(Error::muxer_failure(format!("moof too large: {}", moof_size)));
        }

        let mut payload_offset = 0u64;
        let mut traf_pos = 8 + box_size(&moof.header);
        for (traf, payload) in moof.tracks.iter_mut().zip(&payloads) {
            for run in &mut traf.runs {
                run.data_offset = Some((moof_size + 8 + payload_offset) as i32);
            }
            if let Some(senc_in_traf) = traf.sample_encryption_offset() {
                let senc = traf.sample_encryption.as_ref().unwrap();
                let offset = traf_pos + senc_in_traf + senc.first_entry_offset();
                if let Some(ref mut saio) = traf.auxiliary_offset {
                    saio.offsets[0] = offset;
                }
            }
            traf_pos += box_size(traf);
            payload_offset += payload.len() as u64;
        }

        let mut mdat_data = Vec::with_capacity(payload_offset as usize);
        for payload in &payloads {
            mdat_data.extend_from_slice(payload);
        }
        let mdat = MediaDataBox {
            data: mdat_data.into(),
        };

        let mut out = BufferWriter::with_capacity(moof_size as usize + mdat.data.len() + 16);
        moof.to_bytes(&mut out)?;
        mdat.to_bytes(&mut out)?;
        let bytes = out.into_vec();

        self.segment_records.push(FragmentRecord {
            size: bytes.len() as u64,
            duration: stats.duration,
            earliest_pts: stats.earliest_pts,
            starts_with_sap: stats.starts_with_sap,
        });
        self.total_duration += stats.duration;

        Ok(Some(bytes))
    }

    /// One sidx covering the fragments of the current segment.
    pub fn segment_index(&self) -> SegmentIndexBox {
        let mut sidx = SegmentIndexBox {
            reference_id: self.reference_track as u32 + 1,
            timescale: self.reference_timescale(),
            earliest_presentation_time: (self
                .segment_records
                .first()
                .map(|r| r.earliest_pts.max(0))
                .unwrap_or(0) as u64)
                .into(),
            first_offset: 0u64.into(),
            ..SegmentIndexBox::default()
        };
        for record in &self.segment_records {
            sidx.references.push(SegmentReference {
                reference_type: 0,
                referenced_size: record.size as u32,
                subsegment_duration: record.duration as u32,
                starts_with_sap: record.starts_with_sap,
                sap_type: if record.starts_with_sap { 1 } else { 0 },
                sap_delta_time: 0,
            });
        }
        sidx
    }

    /// Did this sample cross a pending cue point?
    pub fn cue_hit(&self, stream_id: usize, sample: &MediaSample) -> bool {
        stream_id == self.reference_track
            && self.pending_cue.map(|c| sample.dts >= c).unwrap_or(false)
    }

    /// The cue forced a segment boundary; the next segment starts a
    /// new crypto period when a key source is attached.
    pub fn consume_cue(&mut self) {
        if self.pending_cue.take().is_some() {
            self.rotate_key_pending = self.key_source.is_some();
        }
    }

    /// Reset per-segment state after the segment was written out.
    pub fn end_segment(&mut self) {
        self.segment_records.clear();
        self.segment_buffer.clear();
        self.segment_start_dts = None;
        self.segment_has_moof = false;
        self.segment_number += 1;
    }
}

/// The segmenter variants behind one interface.
pub(crate) enum Segmenter {
    Single(SingleSegmentSegmenter),
    Multi(MultiSegmentSegmenter),
    LowLatency(LowLatencySegmentSegmenter),
}

impl Segmenter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        options: MuxerOptions,
        ftyp: FileTypeBox,
        moov: MovieBox,
        streams: Vec<StreamInfo>,
        key_source: Option<Box<dyn KeySource>>,
        current_key: Option<EncryptionKey>,
        listener: Box<dyn MuxerListener>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<Segmenter> {
        let low_latency = options.mp4_params.low_latency_dash_mode;
        let single_segment = options.segment_template.is_empty();
        let core = SegmenterCore::new(
            options, ftyp, moov, streams, key_source, current_key, listener, cancelled,
        )?;
        let segmenter = if single_segment {
            Segmenter::Single(SingleSegmentSegmenter::new(core)?)
        } else if low_latency {
            Segmenter::LowLatency(LowLatencySegmentSegmenter::new(core))
        } else {
            Segmenter::Multi(MultiSegmentSegmenter::new(core))
        };
        Ok(segmenter)
    }

    pub fn core(&self) -> &SegmenterCore {
        match self {
            Segmenter::Single(s) => &s.core,
            Segmenter::Multi(s) => &s.core,
            Segmenter::LowLatency(s) => &s.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut SegmenterCore {
        match self {
            Segmenter::Single(s) => &mut s.core,
            Segmenter::Multi(s) => &mut s.core,
            Segmenter::LowLatency(s) => &mut s.core,
        }
    }

    /// Write the init data (ftyp + moov); for the single-segment
    /// variant this only opens the temp file.
    pub fn initialize(&mut self) -> Result<()> {
        match self {
            Segmenter::Single(s) => s.initialize(),
            Segmenter::Multi(s) => s.initialize(),
            Segmenter::LowLatency(s) => s.initialize(),
        }
    }

    pub fn add_sample(&mut self, stream_id: usize, sample: MediaSample) -> Result<()> {
        self.core().check_cancelled()?;

        let (close_fragment, close_segment) = self.core().boundary(stream_id, &sample);
        let cue_hit = self.core().cue_hit(stream_id, &sample);
        if close_fragment {
            self.finalize_fragment()?;
        }
        if close_segment {
            self.finalize_current_segment()?;
            if cue_hit {
                self.core_mut().consume_cue();
            }
        }
        self.core_mut().rotate_key_if_pending()?;
        self.core_mut().append_sample(stream_id, sample)?;

        // Low latency: every sample becomes a chunk on disk.
        if let Segmenter::LowLatency(s) = self {
            s.flush_chunk()?;
        }
        Ok(())
    }

    /// Close the fragment that is currently accumulating.
    pub fn finalize_fragment(&mut self) -> Result<()> {
        match self {
            Segmenter::LowLatency(s) => s.flush_chunk(),
            _ => {
                let core = self.core_mut();
                if let Some(bytes) = core.build_fragment()? {
                    core.segment_buffer.write(&bytes)?;
                }
                Ok(())
            },
        }
    }

    // Close the current segment and hand it to the variant.
    fn finalize_current_segment(&mut self) -> Result<()> {
        self.finalize_fragment()?;
        if self.core().segment_records.is_empty() {
            return Ok(());
        }
        match self {
            Segmenter::Single(s) => s.finalize_segment(),
            Segmenter::Multi(s) => s.finalize_segment(),
            Segmenter::LowLatency(s) => s.finalize_segment(),
        }
    }

    /// Explicit segment boundary from the upstream handler.
    pub fn finalize_segment(&mut self, _stream_id: usize, info: &SegmentInfo) -> Result<()> {
        self.core().check_cancelled()?;
        if info.is_subsegment || info.is_chunk {
            self.finalize_fragment()
        } else {
            self.finalize_current_segment()
        }
    }

    pub fn handle_cue(&mut self, time_in_seconds: f64) {
        self.core_mut().handle_cue(time_in_seconds);
    }

    /// Flush everything and write trailing data. Fires `on_media_end`.
    pub fn finalize(&mut self) -> Result<()> {
        self.finalize_current_segment()?;
        let (ranges, duration) = match self {
            Segmenter::Single(s) => s.finalize()?,
            Segmenter::Multi(s) => s.finalize()?,
            Segmenter::LowLatency(s) => s.finalize()?,
        };
        let timescale = self.core().reference_timescale().max(1);
        let seconds = duration as f32 / timescale as f32;
        self.core_mut().listener.on_media_end(&ranges, seconds);
        Ok(())
    }
}
