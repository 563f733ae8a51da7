//! Packager errors.
use std::io;

/// Everything that can go wrong while packaging.
///
/// The muxer recovers from nothing: the first error aborts the
/// in-flight fragment and is returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration or input that is structurally invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Codec or protection scheme we do not support.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Underlying I/O error. Always fatal.
    #[error("file failure: {0}")]
    FileFailure(#[from] io::Error),

    /// Malformed input container.
    #[error("parser failure: {0}")]
    ParserFailure(String),

    /// Internal invariant violated at emit time.
    #[error("muxer failure: {0}")]
    MuxerFailure(String),

    /// A sample was added to an already-closed fragment.
    #[error("fragment already finalized")]
    FragmentFinalized,

    /// Cooperative cancellation; partial output files are left behind.
    #[error("cancelled")]
    Cancelled,

    /// End of stream. Only the demuxer side ever produces this.
    #[error("end of stream")]
    EndOfStream,

    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Error {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn muxer_failure(msg: impl Into<String>) -> Error {
        Error::MuxerFailure(msg.into())
    }

    pub(crate) fn unimplemented(msg: impl Into<String>) -> Error {
        Error::Unimplemented(msg.into())
    }
}
