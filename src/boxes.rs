//! All the boxes the packager reads and writes.
//!
//! Simple boxes are declared with `def_box!` (one field list generates
//! both the reader and the writer). Containers with required, typed
//! children (moov, trak, mdia, ...) have hand-written implementations
//! so that a missing required child is a parse error and the handler
//! type can be passed down to the sample description explicitly.
use std::fmt::Debug;
use std::io;

pub(crate) mod prelude;

mod audio;
mod cenc;
mod edts;
mod mdat;
mod mdia;
mod minf;
mod misc;
mod moof;
mod moov;
mod pssh;
mod sbgp;
mod sgpd;
mod sidx;
mod sinf;
mod stbl;
mod stco;
mod stsd;
mod stss;
mod stsz;
mod stts;
mod text;
mod tfhd;
mod tkhd;
mod traf;
mod trak;
mod trun;
mod video;

pub use self::audio::*;
pub use self::cenc::*;
pub use self::edts::*;
pub use self::mdat::*;
pub use self::mdia::*;
pub use self::minf::*;
pub use self::misc::*;
pub use self::moof::*;
pub use self::moov::*;
pub use self::pssh::*;
pub use self::sbgp::*;
pub use self::sgpd::*;
pub use self::sidx::*;
pub use self::sinf::*;
pub use self::stbl::*;
pub use self::stco::*;
pub use self::stsd::*;
pub use self::stss::*;
pub use self::stsz::*;
pub use self::stts::*;
pub use self::text::*;
pub use self::tfhd::*;
pub use self::tkhd::*;
pub use self::traf::*;
pub use self::trak::*;
pub use self::trun::*;
pub use self::video::*;

use crate::mp4box::{BoxHeader, BoxInfo, FullBox, GenericBox};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::FourCC;

def_boxes! {
    FileTypeBox, b"ftyp";
    SegmentTypeBox, b"styp";
    MovieBox, b"moov";
    MovieFragmentBox, b"moof";
    SegmentIndexBox, b"sidx";
    MediaDataBox, b"mdat";
    PsshBox, b"pssh";
    FreeBox, b"free";
}

/// Read a collection of top-level boxes from a stream.
pub fn read_boxes<R: ReadBytes>(mut stream: R) -> io::Result<Vec<MP4Box>> {
    let mut boxes = Vec::new();
    while stream.left() >= 8 {
        boxes.push(MP4Box::from_bytes(&mut stream)?);
    }
    Ok(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferWriter, SliceReader};
    use crate::mp4box::box_size;
    use crate::types::*;

    fn serialize<T: ToBytes>(b: &T) -> Vec<u8> {
        let mut buf = BufferWriter::new();
        b.to_bytes(&mut buf).expect("serialize");
        buf.into_vec()
    }

    // Serialize, parse, serialize again; both byte streams must be
    // identical and the coded size must match the buffer length.
    fn round_trip<T: FromBytes + ToBytes>(b: &T) -> Vec<u8> {
        let bytes = serialize(b);
        let coded_size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if coded_size != 1 {
            assert_eq!(coded_size as usize, bytes.len(), "coded box size mismatch");
        }
        assert_eq!(box_size(b), bytes.len() as u64);

        let mut reader = SliceReader::new(&bytes);
        let parsed = T::from_bytes(&mut reader).expect("parse back");
        assert_eq!(reader.left(), 0, "parser left bytes behind");
        let bytes2 = serialize(&parsed);
        assert_eq!(bytes, bytes2, "round trip not byte identical");
        bytes
    }

    fn fullbox_version(bytes: &[u8]) -> u8 {
        bytes[8]
    }

    #[test]
    fn file_type() {
        let ftyp = FileTypeBox {
            major_brand: FourCC::new("mp41"),
            minor_version: 0,
            compatible_brands: vec![FourCC::new("iso8"), FourCC::new("isom")],
        };
        let bytes = round_trip(&ftyp);
        assert_eq!(&bytes[4..8], b"ftyp");
        assert_eq!(bytes.len(), 8 + 4 + 4 + 8);

        let styp = ftyp.to_segment_type();
        let bytes = round_trip(&styp);
        assert_eq!(&bytes[4..8], b"styp");
    }

    #[test]
    fn movie_header() {
        let mvhd = MovieHeaderBox {
            cr_time: Time::from_unix(0),
            mod_time: Time::from_unix(0),
            timescale: 1000,
            duration: Duration_(60000),
            pref_rate: FixedFloat16_16(0x10000),
            pref_vol: FixedFloat8_8(0x100),
            matrix: Matrix::default(),
            next_track_id: 2,
        };
        let bytes = round_trip(&mvhd);
        assert_eq!(fullbox_version(&bytes), 0);
        // version 0 mvhd is always 108 bytes.
        assert_eq!(bytes.len(), 108);

        // 64-bit duration promotes the box to version 1.
        let mut large = mvhd.clone();
        large.duration = Duration_(u64::MAX - 1);
        let bytes = round_trip(&large);
        assert_eq!(fullbox_version(&bytes), 1);
        assert_eq!(bytes.len(), 120);
    }

    #[test]
    fn track_header() {
        let tkhd = TrackHeaderBox {
            flags: TRACK_ENABLED | TRACK_IN_MOVIE,
            track_id: 1,
            duration: Duration_(0),
            width: FixedFloat16_16::from(1280.0),
            height: FixedFloat16_16::from(720.0),
            ..TrackHeaderBox::default()
        };
        let bytes = round_trip(&tkhd);
        assert_eq!(fullbox_version(&bytes), 0);
        // flags live in the low 24 bits of the fullbox header.
        assert_eq!(bytes[11], 3);
        assert_eq!(bytes.len(), 92);
    }

    #[test]
    fn media_header_language() {
        let mdhd = MediaHeaderBox {
            timescale: 90000,
            duration: Duration_(180000),
            language: IsoLanguageCode::from_code("eng"),
            ..MediaHeaderBox::default()
        };
        let bytes = round_trip(&mdhd);
        // "eng" packed as 5-bit letters: 00101 01110 00111.
        assert_eq!(&bytes[28..30], &[0x15, 0xc7]);

        assert_eq!(IsoLanguageCode::from_code("e").to_string(), "und");
        assert_eq!(IsoLanguageCode::from_code("en-US").to_string(), "und");
        assert_eq!(IsoLanguageCode::from_code("dut-NL").to_string(), "dut");
    }

    #[test]
    fn edit_list_versions() {
        let mut elst = EditListBox::default();
        elst.entries.push(EditListEntry {
            segment_duration: 0,
            media_time: 1024,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        });
        let bytes = round_trip(&elst);
        assert_eq!(fullbox_version(&bytes), 0);

        elst.entries[0].media_time = 0x1_0000_0000;
        let bytes = round_trip(&elst);
        assert_eq!(fullbox_version(&bytes), 1);
    }

    #[test]
    fn composition_offset_version_promotion() {
        let mut ctts = CompositionOffsetBox::default();
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: 3000 });
        let bytes = round_trip(&ctts);
        assert_eq!(fullbox_version(&bytes), 0);

        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: -3000 });
        let bytes = round_trip(&ctts);
        assert_eq!(fullbox_version(&bytes), 1);
    }

    #[test]
    fn empty_sample_tables() {
        round_trip(&TimeToSampleBox::default());
        round_trip(&SampleToChunkBox::default());
        round_trip(&SampleSizeBox::default());
        round_trip(&ChunkOffsetBox::default());
        round_trip(&SyncSampleBox::default());
    }

    #[test]
    fn sample_size_forms() {
        // Uniform: only the default size is written.
        let stsz = SampleSizeBox {
            size: 100,
            count: 30,
            entries: Vec::new(),
        };
        let bytes = round_trip(&stsz);
        assert_eq!(bytes.len(), 20);

        let stsz = SampleSizeBox {
            size: 0,
            count: 3,
            entries: vec![10, 20, 30],
        };
        let bytes = round_trip(&stsz);
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn compact_sample_size() {
        let stz2 = CompactSampleSizeBox {
            field_size: 4,
            entries: vec![1, 2, 3],
        };
        round_trip(&stz2);

        let stz2 = CompactSampleSizeBox {
            field_size: 16,
            entries: vec![1000, 2000, 3000],
        };
        let bytes = round_trip(&stz2);
        assert_eq!(&bytes[4..8], b"stz2");
    }

    #[test]
    fn chunk_offset_co64_promotion() {
        let stco = ChunkOffsetBox {
            entries: vec![48, 1000, 4000000],
        };
        let bytes = round_trip(&stco);
        assert_eq!(&bytes[4..8], b"stco");
        assert_eq!(bytes.len(), 16 + 3 * 4);

        let co64 = ChunkOffsetBox {
            entries: vec![48, u32::MAX as u64 + 1],
        };
        let bytes = round_trip(&co64);
        assert_eq!(&bytes[4..8], b"co64");
        assert_eq!(bytes.len(), 16 + 2 * 8);
    }

    #[test]
    fn sample_group_description_seig() {
        let sgpd = SampleGroupDescriptionBox {
            grouping_type: FourCC::new("seig"),
            default_sample_description_index: None,
            entries: vec![SampleGroupDescriptionEntry::Seig(CencSampleEncryptionInfoEntry {
                is_protected: true,
                per_sample_iv_size: 8,
                key_id: vec![7; 16],
                crypt_byte_block: 0,
                skip_byte_block: 0,
                constant_iv: Vec::new(),
            })],
        };
        let bytes = round_trip(&sgpd);
        assert_eq!(fullbox_version(&bytes), 1);

        // Constant-IV entry: longer, still uniform.
        let sgpd = SampleGroupDescriptionBox {
            grouping_type: FourCC::new("seig"),
            default_sample_description_index: None,
            entries: vec![SampleGroupDescriptionEntry::Seig(CencSampleEncryptionInfoEntry {
                is_protected: true,
                per_sample_iv_size: 0,
                key_id: vec![7; 16],
                crypt_byte_block: 1,
                skip_byte_block: 9,
                constant_iv: vec![0xaa; 16],
            })],
        };
        round_trip(&sgpd);
    }

    #[test]
    fn sample_group_description_roll() {
        let sgpd = SampleGroupDescriptionBox {
            grouping_type: FourCC::new("roll"),
            default_sample_description_index: None,
            entries: vec![SampleGroupDescriptionEntry::Roll(AudioRollRecoveryEntry {
                roll_distance: -2,
            })],
        };
        round_trip(&sgpd);
    }

    #[test]
    fn sample_to_group() {
        let sbgp = SampleToGroupBox {
            grouping_type: FourCC::new("seig"),
            grouping_type_parameter: None,
            entries: std::iter::once(SampleToGroupEntry {
                sample_count: 5,
                group_description_index: SAMPLE_GROUP_DESCRIPTION_INDEX_BASE + 1,
            })
            .collect(),
        };
        let bytes = round_trip(&sbgp);
        assert_eq!(fullbox_version(&bytes), 0);
    }

    #[test]
    fn segment_index_versions() {
        let mut sidx = SegmentIndexBox {
            reference_id: 1,
            timescale: 90000,
            earliest_presentation_time: VersionSizedUint(0),
            first_offset: VersionSizedUint(0),
            ..SegmentIndexBox::default()
        };
        sidx.references.push(SegmentReference {
            reference_type: 0,
            referenced_size: 12345,
            subsegment_duration: 45000,
            starts_with_sap: true,
            sap_type: 1,
            sap_delta_time: 0,
        });
        let bytes = round_trip(&sidx);
        assert_eq!(fullbox_version(&bytes), 0);

        sidx.earliest_presentation_time = VersionSizedUint(u32::MAX as u64 + 1);
        let bytes = round_trip(&sidx);
        assert_eq!(fullbox_version(&bytes), 1);
    }

    #[test]
    fn track_fragment_header_flags() {
        let tfhd = TrackFragmentHeaderBox {
            track_id: 1,
            default_base_is_moof: true,
            sample_description_index: Some(1),
            default_sample_duration: Some(3000),
            default_sample_size: Some(100),
            default_sample_flags: Some(SampleFlags::from_sync(false)),
            ..TrackFragmentHeaderBox::default()
        };
        let bytes = round_trip(&tfhd);
        // default-base-is-moof | duration | size | flags | sdi.
        let flags = u32::from_be_bytes([0, bytes[9], bytes[10], bytes[11]]);
        assert_eq!(flags, 0x020000 | 0x02 | 0x08 | 0x10 | 0x20);

        // An absent default stays absent after a read.
        let mut reader = SliceReader::new(&bytes);
        let parsed = TrackFragmentHeaderBox::from_bytes(&mut reader).unwrap();
        assert!(parsed.base_data_offset.is_none());
        assert!(!parsed.duration_is_empty);
    }

    #[test]
    fn track_run_version_and_flags() {
        let mut trun = TrackRunBox {
            data_offset: Some(120),
            ..TrackRunBox::default()
        };
        trun.entries.push(TrackRunEntry {
            sample_composition_time_offset: Some(0),
            ..TrackRunEntry::default()
        });
        let bytes = round_trip(&trun);
        assert_eq!(fullbox_version(&bytes), 0);

        trun.entries.push(TrackRunEntry {
            sample_composition_time_offset: Some(-3000),
            ..TrackRunEntry::default()
        });
        let bytes = round_trip(&trun);
        assert_eq!(fullbox_version(&bytes), 1);
    }

    #[test]
    fn fragment_decode_time() {
        let tfdt = TrackFragmentBaseMediaDecodeTimeBox {
            base_media_decode_time: VersionSizedUint(45000),
        };
        let bytes = round_trip(&tfdt);
        assert_eq!(fullbox_version(&bytes), 0);

        let tfdt = TrackFragmentBaseMediaDecodeTimeBox {
            base_media_decode_time: VersionSizedUint(u32::MAX as u64 + 1),
        };
        let bytes = round_trip(&tfdt);
        assert_eq!(fullbox_version(&bytes), 1);
    }

    #[test]
    fn movie_extends() {
        let mvex = MovieExtendsBox {
            header: Some(MovieExtendsHeaderBox {
                fragment_duration: VersionSizedUint(90000),
            }),
            tracks: vec![TrackExtendsBox {
                track_id: 1,
                default_sample_description_index: 1,
                ..TrackExtendsBox::default()
            }],
        };
        round_trip(&mvex);
    }

    #[test]
    fn sample_encryption_with_subsamples() {
        let senc = SampleEncryptionBox {
            use_subsample_encryption: true,
            entries: vec![
                SampleEncryptionEntry {
                    initialization_vector: vec![1; 8],
                    subsamples: vec![
                        SubsampleEntry { clear_bytes: 5, cipher_bytes: 32 },
                        SubsampleEntry { clear_bytes: 8, cipher_bytes: 0 },
                    ],
                },
                SampleEncryptionEntry {
                    initialization_vector: vec![2; 8],
                    subsamples: vec![SubsampleEntry { clear_bytes: 5, cipher_bytes: 16 }],
                },
            ],
            data: Default::default(),
        };
        let bytes = serialize(&senc);
        assert_eq!(box_size(&senc), bytes.len() as u64);
        // subsample flag set.
        assert_eq!(bytes[11] & 0x02, 0x02);

        // senc cannot be fully parsed until the iv size is known.
        let mut reader = SliceReader::new(&bytes);
        let parsed = SampleEncryptionBox::from_bytes(&mut reader).unwrap();
        assert!(parsed.entries.is_empty());
        let entries = parsed.parse_entries(8).unwrap();
        assert_eq!(entries, senc.entries);
        assert_eq!(serialize(&parsed), bytes);
    }

    #[test]
    fn sample_auxiliary_boxes() {
        let saiz = SampleAuxiliaryInformationSizeBox::from_sizes(&[16, 16, 16]);
        assert_eq!(saiz.default_sample_info_size, 16);
        assert_eq!(saiz.sample_count, 3);
        round_trip(&saiz);

        let saiz = SampleAuxiliaryInformationSizeBox::from_sizes(&[16, 22, 16]);
        assert_eq!(saiz.default_sample_info_size, 0);
        round_trip(&saiz);

        let saio = SampleAuxiliaryInformationOffsetBox { offsets: vec![672] };
        let bytes = round_trip(&saio);
        assert_eq!(fullbox_version(&bytes), 0);

        let saio = SampleAuxiliaryInformationOffsetBox {
            offsets: vec![u32::MAX as u64 + 1],
        };
        let bytes = round_trip(&saio);
        assert_eq!(fullbox_version(&bytes), 1);
    }

    #[test]
    fn track_encryption_versions() {
        let tenc = TrackEncryptionBox {
            version: 0,
            default_is_protected: true,
            default_per_sample_iv_size: 8,
            default_kid: vec![3; 16],
            ..TrackEncryptionBox::default()
        };
        let bytes = round_trip(&tenc);
        assert_eq!(fullbox_version(&bytes), 0);

        let tenc = TrackEncryptionBox {
            version: 1,
            default_is_protected: true,
            default_per_sample_iv_size: 0,
            default_kid: vec![3; 16],
            default_crypt_byte_block: 1,
            default_skip_byte_block: 9,
            default_constant_iv: vec![0xaa; 16],
        };
        let bytes = round_trip(&tenc);
        assert_eq!(fullbox_version(&bytes), 1);
        // crypt:skip nibbles.
        assert_eq!(bytes[13], 0x19);
    }

    #[test]
    fn protection_scheme_info() {
        let sinf = ProtectionSchemeInfoBox {
            format: OriginalFormatBox {
                format: FourCC::new("avc1"),
            },
            scheme_type: SchemeTypeBox {
                scheme_type: FourCC::new("cenc"),
                scheme_version: 0x00010000,
            },
            info: SchemeInfoBox {
                track_encryption: TrackEncryptionBox {
                    default_is_protected: true,
                    default_per_sample_iv_size: 8,
                    default_kid: vec![3; 16],
                    ..TrackEncryptionBox::default()
                },
            },
        };
        round_trip(&sinf);
    }

    #[test]
    fn pssh_round_trips_verbatim() {
        // A complete v0 pssh box as a key system would hand it over.
        let mut raw = Vec::new();
        raw.extend_from_slice(&40u32.to_be_bytes());
        raw.extend_from_slice(b"pssh");
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw.extend_from_slice(&[0x10; 16]); // system id
        raw.extend_from_slice(&4u32.to_be_bytes());
        raw.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(raw.len(), 40);

        let pssh = PsshBox::from_raw_box(&raw).unwrap();
        assert_eq!(serialize(&pssh), raw);
        round_trip(&pssh);

        assert!(PsshBox::from_raw_box(&raw[..12]).is_err());
        let mut bad = raw.clone();
        bad[4] = b'x';
        assert!(PsshBox::from_raw_box(&bad).is_err());
    }

    #[test]
    fn media_data() {
        let mdat = MediaDataBox {
            data: Data(vec![1, 2, 3, 4, 5]),
        };
        let bytes = round_trip(&mdat);
        assert_eq!(bytes.len(), 13);
        assert_eq!(mdat.header_len(), 8);
    }

    #[test]
    fn unknown_box_is_preserved() {
        let junk = GenericBox {
            fourcc: FourCC::new("wide"),
            data: Data(vec![9, 9, 9]),
        };
        round_trip(&junk);
    }

    #[test]
    fn video_sample_entry() {
        let entry = VideoSampleEntry {
            format: FourCC::new("avc1"),
            width: 1280,
            height: 720,
            codec_configuration: CodecConfigurationBox {
                box_type: FourCC::new("avcC"),
                data: Data(vec![0x01, 0x64, 0x00, 0x1f, 0xff]),
            },
            pixel_aspect: Some(PixelAspectRatioBox {
                h_spacing: 4,
                v_spacing: 3,
            }),
            ..VideoSampleEntry::default()
        };
        let bytes = serialize(&entry);
        let mut reader = SliceReader::new(&bytes);
        let parsed = match SampleEntry::from_bytes_with_handler(&mut reader, TrackType::Video).unwrap() {
            SampleEntry::Video(v) => v,
            other => panic!("expected video entry, got {:?}", other),
        };
        assert_eq!(parsed.format, FourCC::new("avc1"));
        assert_eq!(parsed.width, 1280);
        assert_eq!(parsed.codec_configuration, entry.codec_configuration);
        assert_eq!(serialize(&parsed), bytes);
    }

    #[test]
    fn audio_sample_entry_with_esds() {
        let entry = AudioSampleEntry {
            format: FourCC::new("mp4a"),
            channel_count: 2,
            sample_size: 16,
            sample_rate: 44100,
            esds: Some(ESDescriptorBox {
                es_descriptor: ESDescriptor {
                    es_id: 0,
                    decoder_config: DecoderConfigDescriptor {
                        object_type: object_type::ISO_14496_3,
                        max_bitrate: 128000,
                        avg_bitrate: 128000,
                        decoder_specific_info: Data(vec![0x12, 0x10]),
                    },
                },
            }),
            ..AudioSampleEntry::default()
        };
        let bytes = serialize(&entry);
        let mut reader = SliceReader::new(&bytes);
        let parsed = match SampleEntry::from_bytes_with_handler(&mut reader, TrackType::Audio).unwrap() {
            SampleEntry::Audio(a) => a,
            other => panic!("expected audio entry, got {:?}", other),
        };
        assert_eq!(parsed.sample_rate, 44100);
        let esds = parsed.esds.as_ref().unwrap();
        assert_eq!(
            esds.es_descriptor.decoder_config.decoder_specific_info,
            Data(vec![0x12, 0x10])
        );
        assert_eq!(serialize(&parsed), bytes);
    }

    #[test]
    fn webvtt_sample_entry() {
        let entry = TextSampleEntry {
            format: FourCC::new("wvtt"),
            config: Some(WebVttConfigurationBox {
                config: TextString::from("WEBVTT"),
            }),
            label: Some(WebVttSourceLabelBox {
                source_label: TextString::from("source_label"),
            }),
            ..TextSampleEntry::default()
        };
        let bytes = serialize(&entry);
        let mut reader = SliceReader::new(&bytes);
        let parsed = match SampleEntry::from_bytes_with_handler(&mut reader, TrackType::Text).unwrap() {
            SampleEntry::Text(t) => t,
            other => panic!("expected text entry, got {:?}", other),
        };
        assert_eq!(parsed.config.as_ref().unwrap().config.0, "WEBVTT");
        assert_eq!(serialize(&parsed), bytes);
    }

    #[test]
    fn webvtt_cue_boxes() {
        let cue = VttCueBox {
            cue_id: None,
            settings: Some(CueSettingsBox {
                settings: TextString::from("align:left"),
            }),
            payload: CuePayloadBox {
                cue_text: TextString::from("hello there"),
            },
        };
        round_trip(&cue);
        round_trip(&VttEmptyCueBox::default());
    }

    #[test]
    fn codec_configuration_requires_preset_type() {
        let config = CodecConfigurationBox {
            box_type: FourCC::new("avcC"),
            data: Data(vec![1, 2, 3]),
        };
        let bytes = serialize(&config);

        let mut reader = SliceReader::new(&bytes);
        let parsed = CodecConfigurationBox::read(&mut reader, FourCC::new("avcC")).unwrap();
        assert_eq!(parsed, config);

        // Wrong expected type is a parse error.
        let mut reader = SliceReader::new(&bytes);
        assert!(CodecConfigurationBox::read(&mut reader, FourCC::new("hvcC")).is_err());
    }

    #[test]
    fn malformed_headers_are_rejected() {
        // size smaller than the header itself.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(b"ftyp");
        let mut reader = SliceReader::new(&bytes);
        assert!(MP4Box::from_bytes(&mut reader).is_err());

        // size larger than the remaining buffer.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(b"ftyp");
        let mut reader = SliceReader::new(&bytes);
        assert!(MP4Box::from_bytes(&mut reader).is_err());
    }

    #[test]
    fn top_level_dispatch() {
        let ftyp = FileTypeBox {
            major_brand: FourCC::new("mp41"),
            minor_version: 0,
            compatible_brands: vec![FourCC::new("isom")],
        };
        let mdat = MediaDataBox {
            data: Data(vec![0xab; 32]),
        };
        let mut buf = BufferWriter::new();
        ftyp.to_bytes(&mut buf).unwrap();
        mdat.to_bytes(&mut buf).unwrap();
        let bytes = buf.into_vec();

        let boxes = read_boxes(SliceReader::new(&bytes)).unwrap();
        assert_eq!(boxes.len(), 2);
        assert!(matches!(boxes[0], MP4Box::FileTypeBox(_)));
        assert!(matches!(boxes[1], MP4Box::MediaDataBox(_)));

        let mut buf = BufferWriter::new();
        for b in &boxes {
            b.to_bytes(&mut buf).unwrap();
        }
        assert_eq!(buf.into_vec(), bytes);
    }
}
