use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 4.3 File Type Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    FileTypeBox {
        major_brand:        FourCC,
        minor_version:      u32,
        compatible_brands:  Vec<FourCC>,
    },
    fourcc => "ftyp",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl FileTypeBox {
    /// The per-segment `styp` mirrors the `ftyp` of the init segment.
    pub fn to_segment_type(&self) -> SegmentTypeBox {
        SegmentTypeBox {
            major_brand: self.major_brand,
            minor_version: self.minor_version,
            compatible_brands: self.compatible_brands.clone(),
        }
    }
}

def_box! {
    /// 8.16.2 Segment Type Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SegmentTypeBox {
        major_brand:        FourCC,
        minor_version:      u32,
        compatible_brands:  Vec<FourCC>,
    },
    fourcc => "styp",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.2.2 Movie Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieHeaderBox {
        cr_time:    Time,
        mod_time:   Time,
        timescale:  u32,
        duration:   Duration_,
        pref_rate:  FixedFloat16_16,
        pref_vol:   FixedFloat8_8,
        skip:       10,
        matrix:     Matrix,
        skip:       24,
        next_track_id: u32,
    },
    fourcc => "mvhd",
    version => [1, cr_time, mod_time, duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.4.2 Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MediaHeaderBox {
        cr_time:    Time,
        mod_time:   Time,
        timescale:  u32,
        duration:   Duration_,
        language:   IsoLanguageCode,
        skip:       2,
    },
    fourcc => "mdhd",
    version => [1, cr_time, mod_time, duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.4.3 Handler Reference Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    HandlerBox {
        skip:           4,
        handler_type:   FourCC,
        skip:           12,
        name:           ZString,
    },
    fourcc => "hdlr",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 12.1.2 Video Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    VideoMediaHeaderBox {
        graphics_mode:  u16,
        opcolor_red:    u16,
        opcolor_green:  u16,
        opcolor_blue:   u16,
    },
    fourcc => "vmhd",
    version => [],
    impls => [ boxinfo, debug, fromtobytes ],
}

impl FullBox for VideoMediaHeaderBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    // vmhd always has flags = 1.
    fn flags(&self) -> u32 {
        1
    }
}

def_box! {
    /// 12.2.2 Sound Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SoundMediaHeaderBox {
        balance:    u16,
        skip:       2,
    },
    fourcc => "smhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.4.5.2 Null Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    NullMediaHeaderBox {
    },
    fourcc => "nmhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 12.6.2 Subtitle Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SubtitleMediaHeaderBox {
    },
    fourcc => "sthd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.7.2 Data Reference Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    DataReferenceBox {
        entries:    ArraySized32<DataEntryUrlBox>,
    },
    fourcc => "dref",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.7.2 Data Entry Url Box (ISO/IEC 14496-12:2015(E))
    ///
    /// Always written self-contained (flags = 1, no location).
    #[derive(Default)]
    DataEntryUrlBox {
        location:   ZString,
    },
    fourcc => "url ",
    version => [],
    impls => [ boxinfo, debug, fromtobytes ],
}

impl FullBox for DataEntryUrlBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    fn flags(&self) -> u32 {
        // media data is in the same file.
        1
    }
}

def_box! {
    /// 8.7.1 Data Information Box (ISO/IEC 14496-12:2015(E))
    DataInformationBox {
        dref:   DataReferenceBox,
    },
    fourcc => "dinf",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl Default for DataInformationBox {
    fn default() -> DataInformationBox {
        let mut dref = DataReferenceBox::default();
        dref.entries.push(DataEntryUrlBox::default());
        DataInformationBox { dref }
    }
}

def_box! {
    /// 12.1.4 Pixel Aspect Ratio Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    PixelAspectRatioBox {
        h_spacing:  u32,
        v_spacing:  u32,
    },
    fourcc => "pasp",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.8.2 Movie Extends Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieExtendsHeaderBox {
        fragment_duration:  VersionSizedUint,
    },
    fourcc => "mehd",
    version => [1, fragment_duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.8.3 Track Extends Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TrackExtendsBox {
        track_id:                           u32,
        default_sample_description_index:   u32,
        default_sample_duration:            u32,
        default_sample_size:                u32,
        default_sample_flags:               SampleFlags,
    },
    fourcc => "trex",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// 8.8.1 Movie Extends Box (ISO/IEC 14496-12:2015(E))
///
/// Declares that the movie is fragmented.
#[derive(Clone, Debug, Default)]
pub struct MovieExtendsBox {
    pub header: Option<MovieExtendsHeaderBox>,
    pub tracks: Vec<TrackExtendsBox>,
}

impl FromBytes for MovieExtendsBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MovieExtendsBox> {
        let mut reader = BoxReader::new(stream, None)?;
        let stream = &mut reader;

        let mut header = None;
        let mut tracks = Vec::new();
        while stream.left() >= 8 {
            let child = BoxHeader::peek(stream)?;
            match &child.fourcc.to_be_bytes() {
                b"mehd" => header = Some(MovieExtendsHeaderBox::from_bytes(stream)?),
                b"trex" => tracks.push(TrackExtendsBox::from_bytes(stream)?),
                _ => {
                    let _ = GenericBox::from_bytes(stream)?;
                },
            }
        }
        Ok(MovieExtendsBox { header, tracks })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for MovieExtendsBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let writer = &mut writer;

        if let Some(ref header) = self.header {
            header.to_bytes(writer)?;
        }
        for trex in &self.tracks {
            trex.to_bytes(writer)?;
        }

        writer.finalize()
    }
}

impl BoxInfo for MovieExtendsBox {
    const FOURCC: &'static str = "mvex";

    fn fourcc(&self) -> FourCC {
        FourCC::new("mvex")
    }
}

impl FullBox for MovieExtendsBox {}

def_box! {
    /// 8.8.5 Movie Fragment Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieFragmentHeaderBox {
        sequence_number:    u32,
    },
    fourcc => "mfhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.8.12 Track Fragment Base Media Decode Time Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TrackFragmentBaseMediaDecodeTimeBox {
        base_media_decode_time: VersionSizedUint,
    },
    fourcc => "tfdt",
    version => [1, base_media_decode_time],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.1.2 Free Space Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    FreeBox {
        data:   Data,
    },
    fourcc => "free",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}
