// src/encoder.rs

//! Opus frame encoder.
//!
//! An [`Encoder`] wraps exactly one libopus encoder state. The state lives in memory owned by the
//! encoder itself (see `state`), so there is no native free to forget.
//!
//! Every operation validates its arguments before touching native code; only the codec's own
//! complaints come back as [`crate::status::CodecError`].

use std::os::raw::c_int;

use audiopus_sys as opus;
use tracing::debug;

use crate::error::{Result, Usage};
use crate::opts::EncoderOpts;
use crate::params::{
    Application, Bandwidth, Bitrate, clamp_len, frames_in, validate_channels, validate_sample_rate,
};
use crate::state::{NativeState, Slot};
use crate::status::{CodecError, check};

// Added in libopus 1.3; not every binding release exports it.
const OPUS_GET_IN_DTX_REQUEST: c_int = 4049;

/// An Opus encoder.
///
/// `Encoder::default()` is the uninitialized zero value; call [`Encoder::init`] before use, or
/// construct a ready encoder with [`Encoder::new`].
#[derive(Default)]
pub struct Encoder {
    slot: Slot<opus::OpusEncoder>,
    channels: usize,
}

impl Encoder {
    /// Allocate and initialise an encoder.
    pub fn new(sample_rate: u32, channels: usize, application: Application) -> Result<Self> {
        let mut enc = Self::default();
        enc.init(sample_rate, channels, application)?;
        Ok(enc)
    }

    /// Build an encoder from a configuration value and apply every tuning field it sets.
    pub fn from_opts(opts: &EncoderOpts) -> Result<Self> {
        let mut enc = Self::new(opts.sample_rate, opts.channels, opts.application)?;
        opts.apply(&mut enc)?;
        Ok(enc)
    }

    /// Initialise a zero-value encoder. Allowed once per value.
    pub fn init(
        &mut self,
        sample_rate: u32,
        channels: usize,
        application: Application,
    ) -> Result<()> {
        if !matches!(self.slot, Slot::Empty) {
            return Err(Usage::AlreadyInitialized.into());
        }
        validate_sample_rate(sample_rate)?;
        validate_channels(channels)?;

        let size = unsafe { opus::opus_encoder_get_size(channels as c_int) };
        let mut state = NativeState::zeroed(check(size)? as usize);
        check(unsafe {
            opus::opus_encoder_init(
                state.as_ptr(),
                sample_rate as opus::opus_int32,
                channels as c_int,
                application.raw(),
            )
        })?;

        debug!(sample_rate, channels, ?application, bytes = state.size(), "opus encoder initialized");
        self.slot = Slot::Live(state);
        self.channels = channels;
        Ok(())
    }

    /// Release the native state. A second call is an error.
    pub fn close(&mut self) -> Result<()> {
        match self.slot {
            Slot::Live(_) => {
                self.slot = Slot::Released;
                Ok(())
            }
            Slot::Released => Err(Usage::AlreadyClosed.into()),
            Slot::Empty => Err(Usage::Uninitialized.into()),
        }
    }

    /// Number of interleaved channels this encoder expects. Zero until initialised.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Encode one frame of interleaved 16-bit PCM into `data`.
    ///
    /// The frame length per channel must be one libopus accepts at this sample rate
    /// (2.5, 5, 10, 20, 40, 60, 80, 100 or 120 ms). Returns the number of bytes written.
    pub fn encode(&mut self, pcm: &[i16], data: &mut [u8]) -> Result<usize> {
        let st = self.handle()?;
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyInput)?;
        if data.is_empty() {
            return Err(Usage::EmptyOutput.into());
        }
        let n = check(unsafe {
            opus::opus_encode(
                st,
                pcm.as_ptr(),
                frame_size,
                data.as_mut_ptr(),
                clamp_len(data.len()),
            )
        })?;
        Ok(n as usize)
    }

    /// Encode one frame of interleaved `f32` PCM (nominal range ±1.0) into `data`.
    pub fn encode_float(&mut self, pcm: &[f32], data: &mut [u8]) -> Result<usize> {
        let st = self.handle()?;
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyInput)?;
        if data.is_empty() {
            return Err(Usage::EmptyOutput.into());
        }
        let n = check(unsafe {
            opus::opus_encode_float(
                st,
                pcm.as_ptr(),
                frame_size,
                data.as_mut_ptr(),
                clamp_len(data.len()),
            )
        })?;
        Ok(n as usize)
    }

    /// Sample rate the encoder was initialised with.
    pub fn sample_rate(&mut self) -> Result<u32> {
        Ok(self.get(opus::OPUS_GET_SAMPLE_RATE_REQUEST)? as u32)
    }

    /// Set the target bitrate in bits per second.
    pub fn set_bitrate(&mut self, bits_per_second: i32) -> Result<()> {
        self.set(opus::OPUS_SET_BITRATE_REQUEST, bits_per_second)
    }

    /// Let the encoder pick the bitrate.
    pub fn set_bitrate_auto(&mut self) -> Result<()> {
        self.set(opus::OPUS_SET_BITRATE_REQUEST, Bitrate::Auto.raw())
    }

    /// Use the highest bitrate the output buffer allows.
    pub fn set_bitrate_max(&mut self) -> Result<()> {
        self.set(opus::OPUS_SET_BITRATE_REQUEST, Bitrate::Max.raw())
    }

    pub(crate) fn set_bitrate_setting(&mut self, bitrate: Bitrate) -> Result<()> {
        self.set(opus::OPUS_SET_BITRATE_REQUEST, bitrate.raw())
    }

    /// Current bitrate in bits per second, as resolved by the encoder.
    pub fn bitrate(&mut self) -> Result<i32> {
        self.get(opus::OPUS_GET_BITRATE_REQUEST)
    }

    /// Set computational complexity, 0 (fastest) to 10 (best quality).
    pub fn set_complexity(&mut self, complexity: i32) -> Result<()> {
        self.set(opus::OPUS_SET_COMPLEXITY_REQUEST, complexity)
    }

    pub fn complexity(&mut self) -> Result<i32> {
        self.get(opus::OPUS_GET_COMPLEXITY_REQUEST)
    }

    /// Cap the passband the encoder may choose.
    pub fn set_max_bandwidth(&mut self, bandwidth: Bandwidth) -> Result<()> {
        self.set(opus::OPUS_SET_MAX_BANDWIDTH_REQUEST, bandwidth.raw())
    }

    pub fn max_bandwidth(&mut self) -> Result<Bandwidth> {
        let raw = self.get(opus::OPUS_GET_MAX_BANDWIDTH_REQUEST)?;
        Bandwidth::from_raw(raw).ok_or_else(|| CodecError::InternalError.into())
    }

    /// Toggle in-band forward error correction.
    pub fn set_inband_fec(&mut self, enabled: bool) -> Result<()> {
        self.set(opus::OPUS_SET_INBAND_FEC_REQUEST, enabled as c_int)
    }

    pub fn inband_fec(&mut self) -> Result<bool> {
        Ok(self.get(opus::OPUS_GET_INBAND_FEC_REQUEST)? != 0)
    }

    /// Expected packet loss, 0 to 100 percent. Drives how much redundancy FEC spends.
    pub fn set_packet_loss_perc(&mut self, percent: i32) -> Result<()> {
        self.set(opus::OPUS_SET_PACKET_LOSS_PERC_REQUEST, percent)
    }

    pub fn packet_loss_perc(&mut self) -> Result<i32> {
        self.get(opus::OPUS_GET_PACKET_LOSS_PERC_REQUEST)
    }

    /// Toggle discontinuous transmission.
    pub fn set_dtx(&mut self, enabled: bool) -> Result<()> {
        self.set(opus::OPUS_SET_DTX_REQUEST, enabled as c_int)
    }

    pub fn dtx(&mut self) -> Result<bool> {
        Ok(self.get(opus::OPUS_GET_DTX_REQUEST)? != 0)
    }

    /// Whether the last encoded frame was suppressed by DTX.
    pub fn in_dtx(&mut self) -> Result<bool> {
        Ok(self.get(OPUS_GET_IN_DTX_REQUEST)? != 0)
    }

    /// Reset to the freshly initialised state, keeping the configured parameters.
    pub fn reset(&mut self) -> Result<()> {
        let st = self.handle()?;
        check(unsafe { opus::opus_encoder_ctl(st, opus::OPUS_RESET_STATE) })?;
        Ok(())
    }

    fn handle(&mut self) -> Result<*mut opus::OpusEncoder> {
        match &mut self.slot {
            Slot::Live(state) => Ok(state.as_ptr()),
            _ => Err(Usage::Uninitialized.into()),
        }
    }

    fn set(&mut self, request: c_int, value: c_int) -> Result<()> {
        let st = self.handle()?;
        check(unsafe { opus::opus_encoder_ctl(st, request, value) })?;
        Ok(())
    }

    fn get(&mut self, request: c_int) -> Result<i32> {
        let st = self.handle()?;
        let mut value: opus::opus_int32 = 0;
        check(unsafe { opus::opus_encoder_ctl(st, request, &mut value as *mut opus::opus_int32) })?;
        Ok(value)
    }
}
