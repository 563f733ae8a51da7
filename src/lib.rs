//! DASH/HLS packager core: ISO-BMFF (fMP4/CMAF) writer, segmenters and
//! CENC common encryption.
//!
//! The crate ingests elementary media samples (from an external
//! parser) and emits standards-compliant MP4 output:
//!
//! - a typed box model with symmetric read/write ([`boxes`]),
//! - a muxer that composes `ftyp`/`moov`/fragments ([`muxer::Muxer`]),
//! - three segmenters (single-segment VOD, multi-segment, low-latency
//!   chunked),
//! - CENC `cenc`/`cbc1`/`cens`/`cbcs` sample encryption ([`crypto`]).
//!
//! ```no_run
//! use mp4pack::muxer::Muxer;
//! use mp4pack::options::MuxerOptions;
//! use mp4pack::sample::MediaSample;
//! use mp4pack::stream::{AudioInfo, Codec, StreamInfo, StreamKind};
//!
//! fn main() -> mp4pack::Result<()> {
//!     let mut options = MuxerOptions::default();
//!     options.output_file_name = "init.mp4".to_string();
//!     options.segment_template = "seg_$Number$.m4s".to_string();
//!
//!     let mut muxer = Muxer::new(options);
//!     muxer.add_stream(StreamInfo {
//!         kind: StreamKind::Audio(AudioInfo {
//!             channels: 2,
//!             sample_bits: 16,
//!             sampling_frequency: 44100,
//!             ..AudioInfo::default()
//!         }),
//!         time_scale: 44100,
//!         duration: 0,
//!         codec: Codec::Aac,
//!         codec_string: "mp4a.40.2".to_string(),
//!         codec_config: vec![0x12, 0x10],
//!         extra_codec_configs: vec![],
//!         language: "eng".to_string(),
//!         is_encrypted: false,
//!         has_clear_lead: false,
//!         encryption_config: None,
//!     });
//!     muxer.initialize()?;
//!     muxer.add_sample(0, MediaSample::new(0, 0, 1024, true, vec![0u8; 100]))?;
//!     muxer.finalize()?;
//!     Ok(())
//! }
//! ```
#[macro_use]
mod ioerr;
#[macro_use]
pub mod serialize;
#[macro_use]
pub mod types;
#[macro_use]
mod macros;

pub mod boxes;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod io;
pub mod listener;
pub mod mp4box;
pub mod muxer;
pub mod options;
pub mod sample;
pub(crate) mod segment;
pub mod stream;
pub mod template;

pub use crate::error::{Error, Result};
pub use crate::muxer::Muxer;
