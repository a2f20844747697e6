// src/status.rs

//! Native status codes, split by the layer that produced them.
//!
//! libopus (frame codec) and libopusfile (Ogg demux + decode) use overlapping negative integers
//! for unrelated conditions, so each gets its own type:
//! - [`CodecError`] for `OPUS_*` codes, rendered through `opus_strerror`
//! - [`StreamError`] for `OP_*` codes, rendered as the libopusfile constant name

use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_int;

use audiopus_sys as opus;
use thiserror::Error;

/// An error reported by libopus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecError {
    /// One or more invalid/out of range arguments.
    BadArgument,
    /// Not enough bytes allocated in the output buffer.
    BufferTooSmall,
    /// An internal error was detected.
    InternalError,
    /// The compressed data passed is corrupted.
    InvalidPacket,
    /// Invalid/unsupported request number.
    Unimplemented,
    /// A codec state is invalid or already freed.
    InvalidState,
    /// Memory allocation has failed.
    AllocFail,
    /// A code this crate does not know about.
    Unknown(i32),
}

impl CodecError {
    /// Map a negative libopus return value to its error.
    pub fn from_code(code: i32) -> Self {
        match code {
            opus::OPUS_BAD_ARG => Self::BadArgument,
            opus::OPUS_BUFFER_TOO_SMALL => Self::BufferTooSmall,
            opus::OPUS_INTERNAL_ERROR => Self::InternalError,
            opus::OPUS_INVALID_PACKET => Self::InvalidPacket,
            opus::OPUS_UNIMPLEMENTED => Self::Unimplemented,
            opus::OPUS_INVALID_STATE => Self::InvalidState,
            opus::OPUS_ALLOC_FAIL => Self::AllocFail,
            other => Self::Unknown(other),
        }
    }

    /// The native status code.
    pub fn code(self) -> i32 {
        match self {
            Self::BadArgument => opus::OPUS_BAD_ARG,
            Self::BufferTooSmall => opus::OPUS_BUFFER_TOO_SMALL,
            Self::InternalError => opus::OPUS_INTERNAL_ERROR,
            Self::InvalidPacket => opus::OPUS_INVALID_PACKET,
            Self::Unimplemented => opus::OPUS_UNIMPLEMENTED,
            Self::InvalidState => opus::OPUS_INVALID_STATE,
            Self::AllocFail => opus::OPUS_ALLOC_FAIL,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable description from `opus_strerror`.
    pub fn message(self) -> String {
        // opus_strerror returns a pointer to a static string for every input, known or not.
        let ptr = unsafe { opus::opus_strerror(self.code() as c_int) };
        if ptr.is_null() {
            return format!("unknown error {}", self.code());
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opus: {}", self.message())
    }
}

impl std::error::Error for CodecError {}

/// Turn a libopus return value into `Ok(value)` or the matching [`CodecError`].
pub(crate) fn check(ret: c_int) -> Result<c_int, CodecError> {
    if ret < 0 {
        Err(CodecError::from_code(ret))
    } else {
        Ok(ret)
    }
}

/// An error reported by libopusfile.
///
/// Labels are the libopusfile constant names so logs can be matched against its docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum StreamError {
    #[error("OP_FALSE")]
    False,
    #[error("OP_EOF")]
    Eof,
    #[error("OP_HOLE")]
    Hole,
    #[error("OP_EREAD")]
    Read,
    #[error("OP_EFAULT")]
    Fault,
    #[error("OP_EIMPL")]
    Impl,
    #[error("OP_EINVAL")]
    Inval,
    #[error("OP_ENOTFORMAT")]
    NotFormat,
    #[error("OP_EBADHEADER")]
    BadHeader,
    #[error("OP_EVERSION")]
    Version,
    #[error("OP_ENOTAUDIO")]
    NotAudio,
    #[error("OP_EBADPACKET")]
    BadPacket,
    #[error("OP_EBADLINK")]
    BadLink,
    #[error("OP_ENOSEEK")]
    NoSeek,
    #[error("OP_EBADTIMESTAMP")]
    BadTimestamp,
    #[error("libopusfile error: {0} (unknown code)")]
    Unknown(i32),
}

// Values from opusfile.h.
const OP_FALSE: i32 = -1;
const OP_EOF: i32 = -2;
const OP_HOLE: i32 = -3;
const OP_EREAD: i32 = -128;
const OP_EFAULT: i32 = -129;
const OP_EIMPL: i32 = -130;
const OP_EINVAL: i32 = -131;
const OP_ENOTFORMAT: i32 = -132;
const OP_EBADHEADER: i32 = -133;
const OP_EVERSION: i32 = -134;
const OP_ENOTAUDIO: i32 = -135;
const OP_EBADPACKET: i32 = -136;
const OP_EBADLINK: i32 = -137;
const OP_ENOSEEK: i32 = -138;
const OP_EBADTIMESTAMP: i32 = -139;

impl StreamError {
    /// Map a negative libopusfile return value to its error.
    pub fn from_code(code: i32) -> Self {
        match code {
            OP_FALSE => Self::False,
            OP_EOF => Self::Eof,
            OP_HOLE => Self::Hole,
            OP_EREAD => Self::Read,
            OP_EFAULT => Self::Fault,
            OP_EIMPL => Self::Impl,
            OP_EINVAL => Self::Inval,
            OP_ENOTFORMAT => Self::NotFormat,
            OP_EBADHEADER => Self::BadHeader,
            OP_EVERSION => Self::Version,
            OP_ENOTAUDIO => Self::NotAudio,
            OP_EBADPACKET => Self::BadPacket,
            OP_EBADLINK => Self::BadLink,
            OP_ENOSEEK => Self::NoSeek,
            OP_EBADTIMESTAMP => Self::BadTimestamp,
            other => Self::Unknown(other),
        }
    }

    /// The native status code.
    pub fn code(self) -> i32 {
        match self {
            Self::False => OP_FALSE,
            Self::Eof => OP_EOF,
            Self::Hole => OP_HOLE,
            Self::Read => OP_EREAD,
            Self::Fault => OP_EFAULT,
            Self::Impl => OP_EIMPL,
            Self::Inval => OP_EINVAL,
            Self::NotFormat => OP_ENOTFORMAT,
            Self::BadHeader => OP_EBADHEADER,
            Self::Version => OP_EVERSION,
            Self::NotAudio => OP_ENOTAUDIO,
            Self::BadPacket => OP_EBADPACKET,
            Self::BadLink => OP_EBADLINK,
            Self::NoSeek => OP_ENOSEEK,
            Self::BadTimestamp => OP_EBADTIMESTAMP,
            Self::Unknown(code) => code,
        }
    }
}
