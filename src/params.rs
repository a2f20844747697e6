// src/params.rs

//! Codec parameters shared by the encoder, decoder and configuration layers.

use std::ffi::CStr;
use std::os::raw::c_int;

use audiopus_sys as opus;
use serde::{Deserialize, Serialize};

use crate::error::Usage;

/// Sample rates libopus accepts for encoding and decoding.
pub const SAMPLE_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

/// Upper bound on the size of one encoded packet for every supported configuration.
pub const MAX_ENCODED_FRAME_SIZE: usize = 10_000;

/// Longest frame libopus produces: 120 ms at 48 kHz, per channel.
pub const MAX_FRAME_SIZE: usize = 5_760;

/// Sample rate of everything libopusfile hands back.
pub const STREAM_SAMPLE_RATE: u32 = 48_000;

/// The libopus version string, e.g. `libopus 1.4`.
pub fn version() -> &'static str {
    // The returned pointer refers to a static, NUL-terminated ASCII string inside libopus.
    let raw = unsafe { CStr::from_ptr(opus::opus_get_version_string()) };
    raw.to_str().unwrap_or("libopus (unknown version)")
}

/// Coding mode an encoder is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Application {
    /// Best for most VoIP/videoconference applications where intelligibility matters most.
    #[default]
    Voip,
    /// Best for broadcast/high-fidelity applications.
    Audio,
    /// Lowest achievable latency; disables the speech-optimized mode.
    RestrictedLowDelay,
}

impl Application {
    pub(crate) fn raw(self) -> c_int {
        match self {
            Self::Voip => opus::OPUS_APPLICATION_VOIP,
            Self::Audio => opus::OPUS_APPLICATION_AUDIO,
            Self::RestrictedLowDelay => opus::OPUS_APPLICATION_RESTRICTED_LOWDELAY,
        }
    }
}

/// Audio passband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bandwidth {
    /// 4 kHz passband.
    Narrowband,
    /// 6 kHz passband.
    Mediumband,
    /// 8 kHz passband.
    Wideband,
    /// 12 kHz passband.
    Superwideband,
    /// 20 kHz passband.
    Fullband,
}

impl Bandwidth {
    pub(crate) fn raw(self) -> c_int {
        match self {
            Self::Narrowband => opus::OPUS_BANDWIDTH_NARROWBAND,
            Self::Mediumband => opus::OPUS_BANDWIDTH_MEDIUMBAND,
            Self::Wideband => opus::OPUS_BANDWIDTH_WIDEBAND,
            Self::Superwideband => opus::OPUS_BANDWIDTH_SUPERWIDEBAND,
            Self::Fullband => opus::OPUS_BANDWIDTH_FULLBAND,
        }
    }

    pub(crate) fn from_raw(value: c_int) -> Option<Self> {
        Some(match value {
            opus::OPUS_BANDWIDTH_NARROWBAND => Self::Narrowband,
            opus::OPUS_BANDWIDTH_MEDIUMBAND => Self::Mediumband,
            opus::OPUS_BANDWIDTH_WIDEBAND => Self::Wideband,
            opus::OPUS_BANDWIDTH_SUPERWIDEBAND => Self::Superwideband,
            opus::OPUS_BANDWIDTH_FULLBAND => Self::Fullband,
            _ => return None,
        })
    }
}

/// Target bitrate setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bitrate {
    /// Let the encoder pick a bitrate from the sample rate and channel count.
    Auto,
    /// Use as many bits as the output buffer allows.
    Max,
    /// An explicit rate in bits per second.
    Bits(i32),
}

impl Bitrate {
    pub(crate) fn raw(self) -> c_int {
        match self {
            Self::Auto => opus::OPUS_AUTO,
            Self::Max => opus::OPUS_BITRATE_MAX,
            Self::Bits(bits) => bits,
        }
    }
}

pub(crate) fn validate_sample_rate(sample_rate: u32) -> Result<(), Usage> {
    if SAMPLE_RATES.contains(&sample_rate) {
        Ok(())
    } else {
        Err(Usage::UnsupportedSampleRate(sample_rate))
    }
}

pub(crate) fn validate_channels(channels: usize) -> Result<(), Usage> {
    if channels == 1 || channels == 2 {
        Ok(())
    } else {
        Err(Usage::UnsupportedChannels(channels))
    }
}

/// Samples per channel held by an interleaved buffer of `len` samples.
///
/// Rejects empty buffers and lengths that split a frame across channels.
pub(crate) fn frames_in(len: usize, channels: usize, empty: Usage) -> Result<c_int, Usage> {
    if len == 0 {
        return Err(empty);
    }
    if len % channels != 0 {
        return Err(Usage::NotChannelMultiple { len, channels });
    }
    Ok(clamp_len(len / channels))
}

/// Buffer capacity as the `int` libopus expects. Never overstates the real capacity.
pub(crate) fn clamp_len(len: usize) -> c_int {
    c_int::try_from(len).unwrap_or(c_int::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_names_libopus() {
        assert!(version().starts_with("libopus"), "{}", version());
    }

    #[test]
    fn only_opus_sample_rates_validate() {
        for rate in SAMPLE_RATES {
            assert_eq!(validate_sample_rate(rate), Ok(()));
        }
        for rate in [0, 11_025, 12_345, 22_050, 44_100, 96_000] {
            assert_eq!(
                validate_sample_rate(rate),
                Err(Usage::UnsupportedSampleRate(rate))
            );
        }
    }

    #[test]
    fn only_mono_and_stereo_validate() {
        assert_eq!(validate_channels(1), Ok(()));
        assert_eq!(validate_channels(2), Ok(()));
        assert_eq!(validate_channels(0), Err(Usage::UnsupportedChannels(0)));
        assert_eq!(validate_channels(6), Err(Usage::UnsupportedChannels(6)));
    }

    #[test]
    fn frames_in_checks_shape() {
        assert_eq!(frames_in(960, 1, Usage::EmptyInput), Ok(960));
        assert_eq!(frames_in(1920, 2, Usage::EmptyInput), Ok(960));
        assert_eq!(frames_in(0, 2, Usage::EmptyOutput), Err(Usage::EmptyOutput));
        assert_eq!(
            frames_in(5, 2, Usage::EmptyInput),
            Err(Usage::NotChannelMultiple { len: 5, channels: 2 })
        );
    }

    #[test]
    fn bandwidth_raw_round_trips() {
        for bw in [
            Bandwidth::Narrowband,
            Bandwidth::Mediumband,
            Bandwidth::Wideband,
            Bandwidth::Superwideband,
            Bandwidth::Fullband,
        ] {
            assert_eq!(Bandwidth::from_raw(bw.raw()), Some(bw));
        }
        assert_eq!(Bandwidth::from_raw(opus::OPUS_AUTO), None);
    }
}
