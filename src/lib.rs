//! `opusbind`: a thin binding to libopus and libopusfile.
//!
//! This crate provides:
//! - Frame encoding/decoding with loss recovery (FEC, PLC) and encoder tuning
//! - Streaming Ogg Opus decoding from any forward-only byte source
//! - Typed errors that keep libopus and libopusfile failures apart
//!
//! The codecs themselves live in the native libraries. Everything here is about getting data in
//! and out of them safely: buffer bounds, session lifecycles, and native callbacks that reach back
//! into Rust.

// Frame codec (libopus).
pub mod decoder;
pub mod encoder;
pub mod params;
mod state;

// Library-level configuration.
pub mod opts;

// Errors.
pub mod error;
pub mod status;

// Native callback plumbing and streaming decode (libopusfile).
pub mod bridge;
pub mod source;
#[cfg(feature = "stream")]
mod ffi;
#[cfg(feature = "stream")]
pub mod stream;

// In-memory Ogg Opus fixtures, shared with the integration tests.
#[cfg(test)]
extern crate self as opusbind;
#[cfg(all(test, feature = "stream"))]
#[path = "../tests/common/mod.rs"]
mod test_fixtures;

// Logging configuration.
#[cfg(feature = "logging")]
pub mod logging;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{Error, Result, Usage};
pub use opts::EncoderOpts;
pub use params::{
    Application, Bandwidth, Bitrate, MAX_ENCODED_FRAME_SIZE, MAX_FRAME_SIZE, SAMPLE_RATES,
    STREAM_SAMPLE_RATE, version,
};
pub use source::{Pulled, ReadSource, Source, SourceEnd};
pub use status::{CodecError, StreamError};
#[cfg(feature = "stream")]
pub use stream::Stream;
