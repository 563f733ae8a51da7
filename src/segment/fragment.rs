//! Per-track fragment accumulator.
//!
//! Collects samples (already encrypted, when the track is protected)
//! until the segmenter closes the fragment, then builds the
//! `traf` and the slice of `mdat` payload for this track.
use crate::boxes::*;
use crate::error::{Error, Result};
use crate::sample::MediaSample;
use crate::types::{FourCC, SampleFlags, VersionSizedUint};

/// Summary of a finalized fragment, used for segment bookkeeping and
/// `sidx` references.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FragmentStats {
    pub duration: u64,
    pub earliest_pts: i64,
    pub starts_with_sap: bool,
}

/// Accumulates one track's samples for the fragment being built.
#[derive(Debug, Default)]
pub(crate) struct Fragmenter {
    track_id: u32,
    sample_description_index: u32,
    seig: Option<CencSampleEncryptionInfoEntry>,

    first_dts: Option<i64>,
    earliest_pts: Option<i64>,
    total_duration: u64,
    durations: Vec<u32>,
    sizes: Vec<u32>,
    key_frames: Vec<bool>,
    cts_offsets: Vec<i64>,
    senc_entries: Vec<SampleEncryptionEntry>,
    data: Vec<u8>,
    finalized: bool,
}

impl Fragmenter {
    pub fn new(track_id: u32) -> Fragmenter {
        Fragmenter {
            track_id,
            sample_description_index: 1,
            ..Fragmenter::default()
        }
    }

    /// Start a new fragment.
    pub fn reset(&mut self, sample_description_index: u32, seig: Option<CencSampleEncryptionInfoEntry>) {
        self.sample_description_index = sample_description_index;
        self.seig = seig;
        self.first_dts = None;
        self.earliest_pts = None;
        self.total_duration = 0;
        self.durations.clear();
        self.sizes.clear();
        self.key_frames.clear();
        self.cts_offsets.clear();
        self.senc_entries.clear();
        self.data.clear();
        self.finalized = false;
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn duration(&self) -> u64 {
        self.total_duration
    }

    /// Add one sample. `senc_entry` is present iff the sample was
    /// encrypted.
    pub fn add_sample(
        &mut self,
        sample: &MediaSample,
        senc_entry: Option<SampleEncryptionEntry>,
    ) -> Result<()> {
        if self.finalized {
            return Err(Error::FragmentFinalized);
        }
        let cts_offset = sample.pts - sample.dts;
        if self.first_dts.is_none() {
            self.first_dts = Some(sample.dts);
        }
        if self.earliest_pts.map(|e| sample.pts < e).unwrap_or(true) {
            self.earliest_pts = Some(sample.pts);
        }

        self.durations.push(sample.duration);
        self.sizes.push(sample.data.len() as u32);
        self.key_frames.push(sample.is_key_frame);
        self.cts_offsets.push(cts_offset);
        self.data.extend_from_slice(&sample.data);
        self.total_duration += sample.duration as u64;

        if let Some(entry) = senc_entry {
            self.senc_entries.push(entry);
        }
        Ok(())
    }

    /// Close the fragment: build the `traf` (with placeholder
    /// `trun.data_offset` and `saio` offsets) and hand out the mdat
    /// payload for this track.
    pub fn finalize(&mut self) -> Result<(TrackFragmentBox, Vec<u8>, FragmentStats)> {
        if self.is_empty() {
            return Err(Error::muxer_failure("finalizing an empty fragment"));
        }
        self.finalized = true;

        let sample_count = self.durations.len();

        let mut header = TrackFragmentHeaderBox {
            track_id: self.track_id,
            default_base_is_moof: true,
            sample_description_index: Some(self.sample_description_index),
            ..TrackFragmentHeaderBox::default()
        };

        // Demote uniform per-sample values to tfhd defaults.
        let uniform_duration = self.durations.iter().all(|&d| d == self.durations[0]);
        if uniform_duration {
            header.default_sample_duration = Some(self.durations[0]);
        }
        let uniform_size = self.sizes.iter().all(|&s| s == self.sizes[0]);
        if uniform_size {
            header.default_sample_size = Some(self.sizes[0]);
        }

        // Sample flags: if only the first sample differs (the usual
        // key-frame-at-start case), use default flags plus
        // first_sample_flags; otherwise fall back to per-sample flags.
        let rest = &self.key_frames[1.min(sample_count)..];
        let rest_uniform = rest.iter().all(|&k| k == rest[0]);
        let uniform_flags = self.key_frames.iter().all(|&k| k == self.key_frames[0]);
        let mut first_sample_flags = None;
        let mut per_sample_flags = false;
        if uniform_flags {
            header.default_sample_flags = Some(SampleFlags::from_sync(self.key_frames[0]));
        } else if sample_count > 1 && rest_uniform {
            header.default_sample_flags = Some(SampleFlags::from_sync(self.key_frames[1]));
            first_sample_flags = Some(SampleFlags::from_sync(self.key_frames[0]));
        } else {
            per_sample_flags = true;
        }

        let all_zero_cts = self.cts_offsets.iter().all(|&c| c == 0);

        let mut run = TrackRunBox {
            data_offset: Some(0),
            first_sample_flags,
            ..TrackRunBox::default()
        };
        for i in 0..sample_count {
            let cts = self.cts_offsets[i];
            if cts < i32::MIN as i64 || cts > i32::MAX as i64 {
                return Err(Error::muxer_failure(format!(
                    "composition offset {} out of range",
                    cts
                )));
            }
            run.entries.push(TrackRunEntry {
                sample_duration: (!uniform_duration).then(|| self.durations[i]),
                sample_size: (!uniform_size).then(|| self.sizes[i]),
                sample_flags: per_sample_flags.then(|| SampleFlags::from_sync(self.key_frames[i])),
                sample_composition_time_offset: (!all_zero_cts).then(|| cts as i32),
            });
        }

        let first_dts = self.first_dts.unwrap_or(0);
        let mut traf = TrackFragmentBox {
            header,
            decode_time: Some(TrackFragmentBaseMediaDecodeTimeBox {
                base_media_decode_time: VersionSizedUint(first_dts.max(0) as u64),
            }),
            runs: vec![run],
            ..TrackFragmentBox::default()
        };

        if let Some(ref seig) = self.seig {
            traf.sample_group_description = Some(SampleGroupDescriptionBox {
                grouping_type: FourCC::new("seig"),
                default_sample_description_index: None,
                entries: vec![SampleGroupDescriptionEntry::Seig(seig.clone())],
            });
            traf.sample_to_group = Some(SampleToGroupBox {
                grouping_type: FourCC::new("seig"),
                grouping_type_parameter: None,
                entries: std::iter::once(SampleToGroupEntry {
                    sample_count: sample_count as u32,
                    group_description_index: SAMPLE_GROUP_DESCRIPTION_INDEX_BASE + 1,
                })
                .collect(),
            });
        }

        if !self.senc_entries.is_empty() {
            if self.senc_entries.len() != sample_count {
                return Err(Error::muxer_failure(
                    "mixing encrypted and clear samples in one fragment",
                ));
            }
            let use_subsamples = self.senc_entries.iter().any(|e| !e.subsamples.is_empty());
            let entry_sizes: Vec<u8> = self
                .senc_entries
                .iter()
                .map(|e| e.size(use_subsamples) as u8)
                .collect();
            traf.auxiliary_size = Some(SampleAuxiliaryInformationSizeBox::from_sizes(&entry_sizes));
            traf.auxiliary_offset = Some(SampleAuxiliaryInformationOffsetBox { offsets: vec![0] });
            traf.sample_encryption = Some(SampleEncryptionBox {
                use_subsample_encryption: use_subsamples,
                entries: std::mem::take(&mut self.senc_entries),
                data: Default::default(),
            });
        }

        let stats = FragmentStats {
            duration: self.total_duration,
            earliest_pts: self.earliest_pts.unwrap_or(first_dts),
            starts_with_sap: self.key_frames[0],
        };

        // Empty the accumulators so this fragment no longer counts
        // towards the running segment duration.
        self.durations.clear();
        self.sizes.clear();
        self.key_frames.clear();
        self.cts_offsets.clear();
        self.first_dts = None;
        self.earliest_pts = None;
        self.total_duration = 0;

        Ok((traf, std::mem::take(&mut self.data), stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4box::box_size;

    fn sample(dts: i64, pts: i64, dur: u32, key: bool, len: usize) -> MediaSample {
        MediaSample::new(pts, dts, dur, key, vec![0xab; len])
    }

    #[test]
    fn uniform_values_demote_to_defaults() {
        let mut f = Fragmenter::new(1);
        f.reset(1, None);
        for i in 0..5 {
            let key = i == 0;
            f.add_sample(&sample(i * 1000, i * 1000, 1000, key, 100), None)
                .unwrap();
        }
        let (traf, payload, stats) = f.finalize().unwrap();

        assert_eq!(payload.len(), 500);
        assert_eq!(stats.duration, 5000);
        assert!(stats.starts_with_sap);

        let tfhd = &traf.header;
        assert!(tfhd.default_base_is_moof);
        assert!(tfhd.base_data_offset.is_none());
        assert_eq!(tfhd.default_sample_duration, Some(1000));
        assert_eq!(tfhd.default_sample_size, Some(100));
        // Sync first sample, non-sync rest.
        assert_eq!(
            tfhd.default_sample_flags,
            Some(SampleFlags::from_sync(false))
        );
        let run = &traf.runs[0];
        assert_eq!(run.entries.len(), 5);
        assert_eq!(run.first_sample_flags, Some(SampleFlags::from_sync(true)));
        assert!(run.entries.iter().all(|e| e.sample_duration.is_none()
            && e.sample_size.is_none()
            && e.sample_composition_time_offset.is_none()));
    }

    #[test]
    fn negative_composition_offset_promotes_trun_version() {
        use crate::mp4box::FullBox;

        let mut f = Fragmenter::new(1);
        f.reset(1, None);
        f.add_sample(&sample(0, 0, 3000, true, 10), None).unwrap();
        f.add_sample(&sample(3000, 6000, 3000, false, 10), None).unwrap();
        f.add_sample(&sample(6000, 3000, 3000, false, 10), None).unwrap();
        let (traf, _, _) = f.finalize().unwrap();

        let run = &traf.runs[0];
        assert_eq!(run.version(), Some(1));
        let offsets: Vec<i32> = run
            .entries
            .iter()
            .map(|e| e.sample_composition_time_offset.unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 3000, -3000]);
    }

    #[test]
    fn add_after_finalize_is_an_error() {
        let mut f = Fragmenter::new(1);
        f.reset(1, None);
        f.add_sample(&sample(0, 0, 1000, true, 10), None).unwrap();
        let _ = f.finalize().unwrap();
        let err = f.add_sample(&sample(1000, 1000, 1000, false, 10), None);
        assert!(matches!(err, Err(Error::FragmentFinalized)));
    }

    #[test]
    fn encrypted_fragment_carries_senc_saiz_saio() {
        let mut f = Fragmenter::new(1);
        f.reset(1, None);
        for i in 0..3 {
            let entry = SampleEncryptionEntry {
                initialization_vector: vec![i as u8; 8],
                subsamples: Vec::new(),
            };
            f.add_sample(&sample(i * 1000, i * 1000, 1000, i == 0, 32), Some(entry))
                .unwrap();
        }
        let (traf, _, _) = f.finalize().unwrap();

        let senc = traf.sample_encryption.as_ref().unwrap();
        assert_eq!(senc.entries.len(), 3);
        assert!(!senc.use_subsample_encryption);
        let saiz = traf.auxiliary_size.as_ref().unwrap();
        assert_eq!(saiz.default_sample_info_size, 8);
        assert_eq!(saiz.sample_count, 3);
        assert!(traf.auxiliary_offset.is_some());

        // The senc offset helper matches an actual serialization.
        let senc_off = traf.sample_encryption_offset().unwrap();
        let total = box_size(&traf);
        assert!(senc_off < total);
        assert_eq!(total - senc_off, box_size(senc));
    }
}
