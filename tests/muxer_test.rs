//! End-to-end muxer/segmenter tests: drive samples through the muxer
//! and check the bytes that land on disk.
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use mp4pack::boxes::*;
use mp4pack::clock::FixedClock;
use mp4pack::crypto::{
    EncryptionConfig, EncryptionKey, FixedKeySource, ProtectionScheme,
    ProtectionSystemSpecificInfo,
};
use mp4pack::io::SliceReader;
use mp4pack::listener::{MediaRanges, MuxerListener};
use mp4pack::muxer::Muxer;
use mp4pack::options::MuxerOptions;
use mp4pack::sample::{CueEvent, MediaSample};
use mp4pack::serialize::ToBytes;
use mp4pack::stream::{AudioInfo, Codec, StreamInfo, StreamKind, VideoInfo};
use mp4pack::types::FourCC;

const VIDEO_TIMESCALE: u32 = 90000;

fn video_stream() -> StreamInfo {
    StreamInfo {
        kind: StreamKind::Video(VideoInfo {
            width: 1280,
            height: 720,
            pixel_width: 1,
            pixel_height: 1,
            ..VideoInfo::default()
        }),
        time_scale: VIDEO_TIMESCALE,
        duration: 0,
        codec: Codec::H264,
        codec_string: "avc1.640028".to_string(),
        codec_config: vec![0x01, 0x64, 0x00, 0x28, 0xff, 0xe1],
        extra_codec_configs: vec![],
        language: "und".to_string(),
        is_encrypted: false,
        has_clear_lead: false,
        encryption_config: None,
    }
}

fn audio_stream() -> StreamInfo {
    StreamInfo {
        kind: StreamKind::Audio(AudioInfo {
            channels: 2,
            sample_bits: 16,
            sampling_frequency: 44100,
            max_bitrate: 128000,
            avg_bitrate: 128000,
            ..AudioInfo::default()
        }),
        time_scale: 44100,
        duration: 0,
        codec: Codec::Aac,
        codec_string: "mp4a.40.2".to_string(),
        codec_config: vec![0x12, 0x10],
        extra_codec_configs: vec![],
        language: "eng".to_string(),
        is_encrypted: false,
        has_clear_lead: false,
        encryption_config: None,
    }
}

fn video_sample(dts: i64, pts: i64, duration: u32, key: bool) -> MediaSample {
    MediaSample::new(pts, dts, duration, key, vec![0x42; 64])
}

// One SEI NALU plus one IDR/non-IDR slice, length prefixed, with a
// 48-byte slice payload (three whole AES blocks).
fn nal_video_sample(dts: i64, duration: u32, key: bool) -> MediaSample {
    let mut data = Vec::new();
    let sei = [0x06u8, 0x01, 0x02, 0x03];
    data.extend_from_slice(&(sei.len() as u32).to_be_bytes());
    data.extend_from_slice(&sei);
    let mut vcl = vec![if key { 0x65 } else { 0x41 }];
    vcl.extend_from_slice(&[0x99; 48]);
    data.extend_from_slice(&(vcl.len() as u32).to_be_bytes());
    data.extend_from_slice(&vcl);
    MediaSample::new(dts, dts, duration, key, data)
}

fn fixed_clock() -> Box<FixedClock> {
    let _ = env_logger::builder().is_test(true).try_init();
    Box::new(FixedClock(0))
}

// Scan top-level boxes of a file: (offset, fourcc, size).
fn scan_boxes(data: &[u8]) -> Vec<(usize, FourCC, usize)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos + 8 <= data.len() {
        let size = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let fourcc = FourCC(u32::from_be_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]));
        assert!(size >= 8, "bad box size at offset {}", pos);
        out.push((pos, fourcc, size));
        pos += size;
    }
    assert_eq!(pos, data.len(), "trailing bytes after the last box");
    out
}

fn fourccs(scan: &[(usize, FourCC, usize)]) -> Vec<String> {
    scan.iter().map(|(_, f, _)| f.to_string()).collect()
}

fn parse_all(data: &[u8]) -> Vec<MP4Box> {
    read_boxes(SliceReader::new(data)).expect("parse produced file")
}

fn find_moov(boxes: &[MP4Box]) -> &MovieBox {
    boxes
        .iter()
        .find_map(|b| match b {
            MP4Box::MovieBox(m) => Some(m),
            _ => None,
        })
        .expect("no moov in output")
}

fn find_moofs(boxes: &[MP4Box]) -> Vec<&MovieFragmentBox> {
    boxes
        .iter()
        .filter_map(|b| match b {
            MP4Box::MovieFragmentBox(m) => Some(m),
            _ => None,
        })
        .collect()
}

fn find_sidx(boxes: &[MP4Box]) -> &SegmentIndexBox {
    boxes
        .iter()
        .find_map(|b| match b {
            MP4Box::SegmentIndexBox(s) => Some(s),
            _ => None,
        })
        .expect("no sidx in output")
}

#[derive(Default)]
struct Events {
    media_start: u32,
    new_segments: Vec<(String, i64, u64, u64)>,
    completed_segments: Vec<(u64, u64)>,
    media_end: Option<f32>,
    ranges: Option<MediaRanges>,
}

#[derive(Clone, Default)]
struct RecordingListener(Rc<RefCell<Events>>);

impl MuxerListener for RecordingListener {
    fn on_media_start(&mut self, _options: &MuxerOptions, _info: &StreamInfo, _time_scale: u32) {
        self.0.borrow_mut().media_start += 1;
    }
    fn on_new_segment(&mut self, file_name: &str, start_time: i64, duration: u64, size: u64) {
        self.0
            .borrow_mut()
            .new_segments
            .push((file_name.to_string(), start_time, duration, size));
    }
    fn on_completed_segment(&mut self, duration: u64, size: u64) {
        self.0.borrow_mut().completed_segments.push((duration, size));
    }
    fn on_media_end(&mut self, ranges: &MediaRanges, duration_seconds: f32) {
        let mut events = self.0.borrow_mut();
        events.media_end = Some(duration_seconds);
        events.ranges = Some(ranges.clone());
    }
}

//
// Scenario A: unencrypted single-segment VOD with one video track.
//
#[test]
fn single_segment_vod_layout() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("video.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = output.to_str().unwrap().to_string();
    options.temp_dir = dir.path().to_str().unwrap().to_string();
    options.segment_duration = 0.5;
    options.fragment_duration = 0.5;

    let events = RecordingListener::default();
    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.set_listener(Box::new(events.clone()));
    muxer.add_stream(video_stream());
    muxer.initialize().unwrap();

    for i in 0..30i64 {
        let key = i == 0 || i == 15;
        muxer
            .add_sample(0, video_sample(i * 3000, i * 3000, 3000, key))
            .unwrap();
    }
    muxer.finalize().unwrap();

    let data = fs::read(&output).unwrap();
    let scan = scan_boxes(&data);
    assert_eq!(
        fourccs(&scan),
        vec!["ftyp", "moov", "sidx", "moof", "mdat", "moof", "mdat"]
    );

    let boxes = parse_all(&data);

    // ftyp: major mp41, brands include the codec and cmfc.
    let ftyp = match &boxes[0] {
        MP4Box::FileTypeBox(f) => f,
        _ => panic!("expected ftyp first"),
    };
    assert_eq!(ftyp.major_brand, FourCC::new("mp41"));
    let brands: Vec<String> = ftyp.compatible_brands.iter().map(|b| b.to_string()).collect();
    assert_eq!(brands, vec!["iso8", "isom", "mp41", "dash", "avc1", "cmfc"]);

    let moov = find_moov(&boxes);
    assert_eq!(moov.tracks.len(), 1);
    let trak = &moov.tracks[0];
    assert!(trak.edit.is_none(), "no edit list expected");
    assert_eq!(trak.header.track_id, 1);

    // Fragmented: sample tables present but empty.
    let stbl = &trak.media.information.sample_table;
    assert_eq!(stbl.description.entries.len(), 1);
    assert_eq!(stbl.time_to_sample.entries.len(), 0);
    assert_eq!(stbl.sample_to_chunk.entries.len(), 0);
    assert_eq!(stbl.sample_size.count, 0);
    assert_eq!(stbl.chunk_offset.entries.len(), 0);

    // mvex with one trex.
    let mvex = moov.extends.as_ref().expect("mvex required for fragments");
    assert_eq!(mvex.tracks.len(), 1);
    assert_eq!(mvex.tracks[0].track_id, 1);
    assert_eq!(mvex.tracks[0].default_sample_description_index, 1);

    // sidx: two subsegments of 45000 ticks each, starting with SAP.
    let sidx = find_sidx(&boxes);
    assert_eq!(sidx.timescale, VIDEO_TIMESCALE);
    assert_eq!(sidx.references.len(), 2);
    for r in &sidx.references {
        assert_eq!(r.subsegment_duration, 45000);
        assert!(r.starts_with_sap);
        assert_eq!(r.sap_type, 1);
    }

    // The sidx references cover the moof+mdat pairs exactly.
    let moof_mdat_bytes: usize = scan[3..].iter().map(|(_, _, s)| s).sum();
    let referenced: u32 = sidx.references.iter().map(|r| r.referenced_size).sum();
    assert_eq!(referenced as usize, moof_mdat_bytes);

    // moofs: 15 samples each, sequence numbers 1 and 2, second one
    // starts at decode time 45000.
    let moofs = find_moofs(&boxes);
    assert_eq!(moofs.len(), 2);
    assert_eq!(moofs[0].header.sequence_number, 1);
    assert_eq!(moofs[1].header.sequence_number, 2);
    for moof in &moofs {
        assert_eq!(moof.tracks[0].runs[0].entries.len(), 15);
        assert!(moof.tracks[0].header.default_base_is_moof);
        assert!(moof.tracks[0].header.base_data_offset.is_none());
    }
    let tfdt = moofs[1].tracks[0].decode_time.as_ref().unwrap();
    assert_eq!(u64::from(tfdt.base_media_decode_time), 45000);

    // trun.data_offset points at the first payload byte after the mdat
    // header.
    for (idx, (moof_off, _, moof_size)) in
        scan.iter().filter(|(_, f, _)| *f == FourCC::new("moof")).enumerate()
    {
        let moof = moofs[idx];
        let data_offset = moof.tracks[0].runs[0].data_offset.unwrap() as usize;
        assert_eq!(data_offset, moof_size + 8);
        let mdat_payload_start = moof_off + moof_size + 8;
        assert_eq!(moof_off + data_offset, mdat_payload_start);
    }

    // Listener: one media start, one subsegment report per segment,
    // media end with the file ranges.
    let events = events.0.borrow();
    assert_eq!(events.media_start, 1);
    assert_eq!(events.new_segments.len(), 2);
    let ranges = events.ranges.as_ref().unwrap();
    let (ftyp_size, moov_size, sidx_size) = (scan[0].2, scan[1].2, scan[2].2);
    let init = ranges.init_range.unwrap();
    assert_eq!((init.start, init.end), (0, (ftyp_size + moov_size - 1) as u64));
    let index = ranges.index_range.unwrap();
    assert_eq!(index.start, (ftyp_size + moov_size) as u64);
    assert_eq!(index.end, (ftyp_size + moov_size + sidx_size - 1) as u64);
    assert_eq!(ranges.subsegment_ranges.len(), 2);
    assert_eq!(events.media_end, Some(1.0));
}

// The writer's own output must survive a read-write cycle
// byte-identically.
#[test]
fn produced_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("video.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = output.to_str().unwrap().to_string();
    options.segment_duration = 0.5;
    options.fragment_duration = 0.5;

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.add_stream(video_stream());
    muxer.initialize().unwrap();
    for i in 0..30i64 {
        muxer
            .add_sample(0, video_sample(i * 3000, i * 3000, 3000, i % 15 == 0))
            .unwrap();
    }
    muxer.finalize().unwrap();

    let data = fs::read(&output).unwrap();
    let boxes = parse_all(&data);
    let mut buf = mp4pack::io::BufferWriter::new();
    for b in &boxes {
        b.to_bytes(&mut buf).unwrap();
    }
    assert_eq!(buf.as_slice(), &data[..]);
}

//
// Scenario B: audio priming with negative pts produces an edit list.
//
#[test]
fn audio_priming_edit_list() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = init.to_str().unwrap().to_string();
    options.segment_template = dir
        .path()
        .join("seg_$Number$.m4s")
        .to_str()
        .unwrap()
        .to_string();

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.add_stream(audio_stream());
    muxer.initialize().unwrap();
    for i in 0..4i64 {
        let ts = -1024 + i * 1024;
        muxer
            .add_sample(0, MediaSample::new(ts, ts, 1024, true, vec![0xaa; 200]))
            .unwrap();
    }
    muxer.finalize().unwrap();

    let data = fs::read(&init).unwrap();
    let boxes = parse_all(&data);
    let moov = find_moov(&boxes);
    let elst = moov.tracks[0].edit_list().expect("edit list expected");
    assert_eq!(elst.entries.len(), 1);
    assert_eq!(elst.entries[0].media_time, 1024);
    assert_eq!(elst.entries[0].segment_duration, 0);
    assert_eq!(elst.entries[0].media_rate_integer, 1);
}

// pts > dts with negative pts is not representable.
#[test]
fn negative_pts_with_offset_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = MuxerOptions::default();
    options.output_file_name = dir.path().join("x.mp4").to_str().unwrap().to_string();
    options.temp_dir = dir.path().to_str().unwrap().to_string();

    let mut muxer = Muxer::new(options);
    muxer.add_stream(video_stream());
    muxer.initialize().unwrap();
    let err = muxer.add_sample(0, video_sample(-2000, -1000, 1000, true));
    assert!(matches!(err, Err(mp4pack::Error::MuxerFailure(_))));
}

// dts > pts is never valid.
#[test]
fn pts_before_dts_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = MuxerOptions::default();
    options.output_file_name = dir.path().join("x.mp4").to_str().unwrap().to_string();
    options.temp_dir = dir.path().to_str().unwrap().to_string();

    let mut muxer = Muxer::new(options);
    muxer.add_stream(video_stream());
    muxer.initialize().unwrap();
    let err = muxer.add_sample(0, video_sample(1000, 0, 1000, true));
    assert!(matches!(err, Err(mp4pack::Error::MuxerFailure(_))));
}

//
// Scenario C: B-frames produce negative composition offsets and a
// version 1 trun.
//
#[test]
fn b_frames_negative_composition_offsets() {
    use mp4pack::mp4box::FullBox;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("video.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = output.to_str().unwrap().to_string();
    options.temp_dir = dir.path().to_str().unwrap().to_string();

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.add_stream(video_stream());
    muxer.initialize().unwrap();
    muxer.add_sample(0, video_sample(0, 0, 3000, true)).unwrap();
    muxer.add_sample(0, video_sample(3000, 6000, 3000, false)).unwrap();
    muxer.add_sample(0, video_sample(6000, 3000, 3000, false)).unwrap();
    muxer.finalize().unwrap();

    let data = fs::read(&output).unwrap();
    let boxes = parse_all(&data);

    // pts == dts for the first sample: no edit list.
    let moov = find_moov(&boxes);
    assert!(moov.tracks[0].edit.is_none());

    let moofs = find_moofs(&boxes);
    assert_eq!(moofs.len(), 1);
    let run = &moofs[0].tracks[0].runs[0];
    assert_eq!(run.version(), Some(1));
    let offsets: Vec<i32> = run
        .entries
        .iter()
        .map(|e| e.sample_composition_time_offset.unwrap())
        .collect();
    assert_eq!(offsets, vec![0, 3000, -3000]);
}

fn cenc_config() -> EncryptionConfig {
    EncryptionConfig {
        protection_scheme: ProtectionScheme::Cenc,
        per_sample_iv_size: 8,
        constant_iv: vec![],
        key_id: vec![0x11; 16],
        crypt_byte_block: 0,
        skip_byte_block: 0,
        key_system_info: vec![ProtectionSystemSpecificInfo {
            psshs: test_pssh_blob(),
        }],
    }
}

fn test_pssh_blob() -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&36u32.to_be_bytes());
    raw.extend_from_slice(b"pssh");
    raw.extend_from_slice(&[0, 0, 0, 0]);
    raw.extend_from_slice(&[0x10; 16]);
    raw.extend_from_slice(&0u32.to_be_bytes());
    raw
}

fn cenc_key() -> EncryptionKey {
    EncryptionKey {
        key_id: vec![0x11; 16],
        key: vec![0x22; 16],
        iv: vec![0x33; 8],
        key_system_info: vec![ProtectionSystemSpecificInfo {
            psshs: test_pssh_blob(),
        }],
    }
}

//
// Scenario D: cenc with a clear lead. Two sample entries, clear-lead
// fragments use entry 2, encrypted fragments carry senc/saiz/saio and
// a chained IV.
//
#[test]
fn cenc_clear_lead() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = init.to_str().unwrap().to_string();
    options.segment_template = dir
        .path()
        .join("seg_$Number$.m4s")
        .to_str()
        .unwrap()
        .to_string();
    options.segment_duration = 1.5;
    options.fragment_duration = 1.5;
    options.clear_lead_seconds = 1.5;

    let mut stream = video_stream();
    stream.is_encrypted = true;
    stream.has_clear_lead = true;
    stream.encryption_config = Some(cenc_config());

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.set_key_source(Box::new(FixedKeySource::new(cenc_key())));
    muxer.add_stream(stream);
    muxer.initialize().unwrap();

    // 50 samples; clear lead of 1.5s at 3000 ticks each = 45 samples.
    for i in 0..50i64 {
        let key = i == 0 || i == 45;
        muxer.add_sample(0, nal_video_sample(i * 3000, 3000, key)).unwrap();
    }
    muxer.finalize().unwrap();

    // Init segment: two sample entries, encv first.
    let init_data = fs::read(&init).unwrap();
    let boxes = parse_all(&init_data);
    let moov = find_moov(&boxes);
    assert_eq!(moov.pssh.len(), 1, "movie-level pssh expected");
    let stsd = &moov.tracks[0].media.information.sample_table.description;
    assert_eq!(stsd.entries.len(), 2);
    assert_eq!(stsd.entries[0].format(), FourCC::new("encv"));
    assert_eq!(stsd.entries[1].format(), FourCC::new("avc1"));
    let sinf = stsd.entries[0].sinf().expect("encv entry needs sinf");
    assert_eq!(sinf.format.format, FourCC::new("avc1"));
    assert_eq!(sinf.scheme_type.scheme_type, FourCC::new("cenc"));
    let tenc = &sinf.info.track_encryption;
    assert_eq!(tenc.version, 0);
    assert!(tenc.default_is_protected);
    assert_eq!(tenc.default_per_sample_iv_size, 8);
    assert_eq!(tenc.default_kid, vec![0x11; 16]);

    // Segment 1: clear lead, sample description index 2, no senc.
    let seg1 = fs::read(dir.path().join("seg_1.m4s")).unwrap();
    let boxes1 = parse_all(&seg1);
    let moofs = find_moofs(&boxes1);
    assert_eq!(moofs.len(), 1);
    let traf = &moofs[0].tracks[0];
    assert_eq!(traf.header.sample_description_index, Some(2));
    assert!(traf.sample_encryption.is_none());
    assert!(traf.auxiliary_size.is_none());
    assert_eq!(traf.runs[0].entries.len(), 45);

    // Segment 2: encrypted, sample description index 1, senc with 5
    // entries and per-sample IVs chained by block count.
    let seg2 = fs::read(dir.path().join("seg_2.m4s")).unwrap();
    let boxes2 = parse_all(&seg2);
    let moofs = find_moofs(&boxes2);
    assert_eq!(moofs.len(), 1);
    let traf = &moofs[0].tracks[0];
    assert_eq!(traf.header.sample_description_index, Some(1));

    let senc = traf.sample_encryption.as_ref().expect("senc expected");
    assert!(senc.use_subsample_encryption);
    let entries = senc.parse_entries(8).unwrap();
    assert_eq!(entries.len(), 5);

    // 48 cipher bytes per sample = 3 AES blocks; IVs advance by 3.
    let mut expected_iv = vec![0x33u8; 8];
    for entry in &entries {
        assert_eq!(entry.initialization_vector, expected_iv);
        assert_eq!(entry.subsamples.len(), 1);
        assert_eq!(entry.subsamples[0].clear_bytes, 13);
        assert_eq!(entry.subsamples[0].cipher_bytes, 48);
        expected_iv[7] += 3;
    }

    // saiz/saio present; saio points at the first senc entry,
    // relative to the moof.
    let saiz = traf.auxiliary_size.as_ref().expect("saiz expected");
    assert_eq!(saiz.sample_count, 5);
    // iv (8) + subsample count (2) + one subsample (6).
    assert_eq!(saiz.default_sample_info_size, 16);
    let saio = traf.auxiliary_offset.as_ref().expect("saio expected");
    assert_eq!(saio.offsets.len(), 1);

    let scan = scan_boxes(&seg2);
    let (moof_off, _, _) = *scan
        .iter()
        .find(|(_, f, _)| *f == FourCC::new("moof"))
        .unwrap();
    let iv_pos = moof_off + saio.offsets[0] as usize;
    assert_eq!(&seg2[iv_pos..iv_pos + 8], &[0x33u8; 8][..]);

    // The first moof of each segment repeats the pssh.
    assert_eq!(moofs[0].pssh.len(), 1);
}

//
// Scenario E: a cue event rotates the key at the next SAP; the new
// segment carries seig sample groups and a fresh pssh.
//
#[test]
fn key_rotation_across_cue() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = init.to_str().unwrap().to_string();
    options.segment_template = dir
        .path()
        .join("seg_$Number$.m4s")
        .to_str()
        .unwrap()
        .to_string();
    // Only the cue should close a segment.
    options.segment_duration = 1000.0;
    options.fragment_duration = 1000.0;

    let mut stream = video_stream();
    stream.is_encrypted = true;
    stream.encryption_config = Some(cenc_config());

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.set_key_source(Box::new(FixedKeySource::new(cenc_key())));
    muxer.add_stream(stream);
    muxer.initialize().unwrap();

    // 0.5s key frames; cue at 10s = sample 20.
    muxer.handle_cue_event(CueEvent { time_in_seconds: 10.0 });
    for i in 0..30i64 {
        muxer.add_sample(0, nal_video_sample(i * 45000, 45000, true)).unwrap();
    }
    muxer.finalize().unwrap();

    // moov keeps the original pssh.
    let boxes = parse_all(&fs::read(&init).unwrap());
    assert_eq!(find_moov(&boxes).pssh.len(), 1);

    // Segment 1 covers the pre-cue samples, no sample groups.
    let seg1 = parse_all(&fs::read(dir.path().join("seg_1.m4s")).unwrap());
    let moof1 = find_moofs(&seg1)[0].clone();
    assert_eq!(moof1.tracks[0].runs[0].entries.len(), 20);
    assert!(moof1.tracks[0].sample_group_description.is_none());
    let tfdt = moof1.tracks[0].decode_time.as_ref().unwrap();
    assert_eq!(u64::from(tfdt.base_media_decode_time), 0);

    // Segment 2 starts at the cue with the rotated key.
    let seg2 = parse_all(&fs::read(dir.path().join("seg_2.m4s")).unwrap());
    let moof2 = find_moofs(&seg2)[0].clone();
    assert_eq!(moof2.tracks[0].runs[0].entries.len(), 10);
    let tfdt = moof2.tracks[0].decode_time.as_ref().unwrap();
    assert_eq!(u64::from(tfdt.base_media_decode_time), 20 * 45000);
    assert_eq!(moof2.pssh.len(), 1, "rotated key pssh in first moof");

    let sgpd = moof2.tracks[0]
        .sample_group_description
        .as_ref()
        .expect("seig group description expected");
    assert_eq!(sgpd.grouping_type, FourCC::new("seig"));
    let seig = match &sgpd.entries[0] {
        SampleGroupDescriptionEntry::Seig(e) => e,
        other => panic!("expected seig entry, got {:?}", other),
    };
    // FixedKeySource bumps the last KID byte per crypto period.
    let mut expected_kid = vec![0x11u8; 16];
    expected_kid[15] = 0x12;
    assert_eq!(seig.key_id, expected_kid);
    assert!(seig.is_protected);

    let sbgp = moof2.tracks[0]
        .sample_to_group
        .as_ref()
        .expect("seig sample-to-group expected");
    assert_eq!(sbgp.grouping_type, FourCC::new("seig"));
    assert_eq!(sbgp.entries[0].sample_count, 10);
    assert_eq!(
        sbgp.entries[0].group_description_index,
        SAMPLE_GROUP_DESCRIPTION_INDEX_BASE + 1
    );
}

//
// Scenario F: low-latency mode writes one moof+mdat chunk per sample
// and reports the completed segment to the listener.
//
#[test]
fn low_latency_chunking() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = init.to_str().unwrap().to_string();
    options.segment_template = dir
        .path()
        .join("seg_$Number$.m4s")
        .to_str()
        .unwrap()
        .to_string();
    options.mp4_params.low_latency_dash_mode = true;
    options.segment_duration = 2.0;
    options.fragment_duration = 2.0;

    let events = RecordingListener::default();
    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.set_listener(Box::new(events.clone()));
    let mut stream = video_stream();
    stream.time_scale = 1000;
    muxer.add_stream(stream);
    muxer.initialize().unwrap();

    // A sample every 200ms for 4 seconds; every sample is a SAP so the
    // 2s segment boundary can be honoured.
    for i in 0..20i64 {
        muxer.add_sample(0, video_sample(i * 200, i * 200, 200, true)).unwrap();
    }
    muxer.finalize().unwrap();

    for seg in 1..=2u32 {
        let data = fs::read(dir.path().join(format!("seg_{}.m4s", seg))).unwrap();
        let scan = scan_boxes(&data);
        let names = fourccs(&scan);

        // One styp, then exactly one moof+mdat pair per sample; no sidx.
        assert_eq!(names[0], "styp");
        assert!(!names.contains(&"sidx".to_string()));
        let pairs: Vec<_> = names[1..].chunks(2).collect();
        assert_eq!(pairs.len(), 10);
        for pair in pairs {
            assert_eq!(pair, &["moof", "mdat"]);
        }

        // Every chunk holds exactly one sample.
        let boxes = parse_all(&data);
        let moofs = find_moofs(&boxes);
        assert_eq!(moofs.len(), 10);
        for moof in moofs {
            assert_eq!(moof.tracks[0].runs[0].entries.len(), 1);
        }
    }

    let events = events.0.borrow();
    // Two placeholder announcements and two completion reports of
    // 2000 ticks each.
    assert_eq!(events.new_segments.len(), 2);
    assert!(events.new_segments.iter().all(|(_, _, d, s)| *d == 0 && *s == 0));
    assert_eq!(events.completed_segments.len(), 2);
    for (duration, size) in events.completed_segments.iter() {
        assert_eq!(*duration, 2000);
        assert!(*size > 0);
    }
    assert_eq!(events.media_end, Some(4.0));
}

// Cancellation is cooperative: the flag aborts the next add_sample.
#[test]
fn cancellation_aborts_add_sample() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = MuxerOptions::default();
    options.output_file_name = dir.path().join("x.mp4").to_str().unwrap().to_string();
    options.temp_dir = dir.path().to_str().unwrap().to_string();

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.add_stream(video_stream());
    muxer.initialize().unwrap();
    muxer.add_sample(0, video_sample(0, 0, 3000, true)).unwrap();

    muxer
        .cancel_flag()
        .store(true, std::sync::atomic::Ordering::Relaxed);
    let err = muxer.add_sample(0, video_sample(3000, 3000, 3000, false));
    assert!(matches!(err, Err(mp4pack::Error::Cancelled)));
}

// Multi-segment mode: init file plus styp/sidx/moof/mdat per segment.
#[test]
fn multi_segment_files() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = init.to_str().unwrap().to_string();
    options.segment_template = dir
        .path()
        .join("seg_$Number$.m4s")
        .to_str()
        .unwrap()
        .to_string();
    options.segment_duration = 0.5;
    options.fragment_duration = 0.5;

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.add_stream(video_stream());
    muxer.initialize().unwrap();
    for i in 0..30i64 {
        muxer
            .add_sample(0, video_sample(i * 3000, i * 3000, 3000, i % 15 == 0))
            .unwrap();
    }
    muxer.finalize().unwrap();

    let init_scan = scan_boxes(&fs::read(&init).unwrap());
    assert_eq!(fourccs(&init_scan), vec!["ftyp", "moov"]);

    for seg in 1..=2u32 {
        let data = fs::read(dir.path().join(format!("seg_{}.m4s", seg))).unwrap();
        let scan = scan_boxes(&data);
        assert_eq!(fourccs(&scan), vec!["styp", "sidx", "moof", "mdat"]);
    }
}

// Audio-only multi-segment: smhd, volume, esds.
#[test]
fn audio_track_init_segment() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.mp4");

    let mut options = MuxerOptions::default();
    options.output_file_name = init.to_str().unwrap().to_string();
    options.segment_template = dir
        .path()
        .join("seg_$Number$.m4s")
        .to_str()
        .unwrap()
        .to_string();

    let mut muxer = Muxer::new(options);
    muxer.set_clock(fixed_clock());
    muxer.add_stream(audio_stream());
    muxer.initialize().unwrap();
    for i in 0..8i64 {
        muxer
            .add_sample(0, MediaSample::new(i * 1024, i * 1024, 1024, true, vec![0xaa; 100]))
            .unwrap();
    }
    muxer.finalize().unwrap();

    let boxes = parse_all(&fs::read(&init).unwrap());
    let moov = find_moov(&boxes);
    let trak = &moov.tracks[0];
    assert_eq!(trak.header.volume.0, 0x0100);
    assert_eq!(trak.media.header.timescale, 44100);
    assert_eq!(trak.media.header.language.to_string(), "eng");
    assert_eq!(trak.media.handler.handler_type, FourCC::new("soun"));

    let entry = match &trak.media.information.sample_table.description.entries[0] {
        SampleEntry::Audio(a) => a,
        other => panic!("expected audio entry, got {:?}", other),
    };
    assert_eq!(entry.format, FourCC::new("mp4a"));
    assert_eq!(entry.channel_count, 2);
    assert_eq!(entry.sample_rate, 44100);
    assert!(entry.esds.is_some());
}
