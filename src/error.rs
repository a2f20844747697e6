use std::io;

use thiserror::Error;

use crate::status::{CodecError, StreamError};

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
///
/// Each variant names the layer that produced the failure, so a caller can always tell a libopus
/// problem from a libopusfile one, and both from misuse caught before reaching native code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("opus: {0}")]
    Usage(#[from] Usage),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Returned by a [`crate::source::Source`] when it is closed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// The usage error, if this is one.
    pub fn usage(&self) -> Option<Usage> {
        match self {
            Self::Usage(usage) => Some(*usage),
            _ => None,
        }
    }
}

/// Misuse detected before any native call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Usage {
    #[error("codec is uninitialized")]
    Uninitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("already closed")]
    AlreadyClosed,

    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("number of channels must be 1 or 2: {0}")]
    UnsupportedChannels(usize),

    #[error("no data supplied")]
    EmptyInput,

    #[error("no target buffer")]
    EmptyOutput,

    #[error("buffer length {len} is not a multiple of {channels} channels")]
    NotChannelMultiple { len: usize, channels: usize },

    #[error("packet loss concealment needs at least one decoded packet")]
    NoDecoderHistory,

    #[error("stream is uninitialized or already closed")]
    StreamNotOpen,

    #[error("stream already reached its end")]
    StreamExhausted,
}
