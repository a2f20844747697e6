// src/decoder.rs

//! Opus frame decoder, including the loss-recovery paths.
//!
//! Besides plain decoding a [`Decoder`] can rebuild a lost frame two ways:
//! - forward error correction, from the redundancy carried in the *next* packet
//! - packet loss concealment, extrapolated from what was decoded before
//!
//! Output buffers decide how many samples libopus may write. For FEC and PLC their length must be
//! exactly the duration of the missing frame.

use std::os::raw::c_int;
use std::ptr;

use audiopus_sys as opus;
use tracing::debug;

use crate::error::{Result, Usage};
use crate::params::{clamp_len, frames_in, validate_channels, validate_sample_rate};
use crate::state::{NativeState, Slot};
use crate::status::check;

/// An Opus decoder.
///
/// `Decoder::default()` is the uninitialized zero value; call [`Decoder::init`] before use.
#[derive(Default)]
pub struct Decoder {
    slot: Slot<opus::OpusDecoder>,
    channels: usize,
    // Set once a packet (or its FEC data) has been decoded; concealment has nothing to extrapolate
    // from before that.
    has_history: bool,
}

impl Decoder {
    /// Allocate and initialise a decoder producing `channels` interleaved channels at
    /// `sample_rate`.
    pub fn new(sample_rate: u32, channels: usize) -> Result<Self> {
        let mut dec = Self::default();
        dec.init(sample_rate, channels)?;
        Ok(dec)
    }

    /// Initialise a zero-value decoder. Allowed once per value.
    pub fn init(&mut self, sample_rate: u32, channels: usize) -> Result<()> {
        if !matches!(self.slot, Slot::Empty) {
            return Err(Usage::AlreadyInitialized.into());
        }
        validate_sample_rate(sample_rate)?;
        validate_channels(channels)?;

        let size = unsafe { opus::opus_decoder_get_size(channels as c_int) };
        let mut state = NativeState::zeroed(check(size)? as usize);
        check(unsafe {
            opus::opus_decoder_init(
                state.as_ptr(),
                sample_rate as opus::opus_int32,
                channels as c_int,
            )
        })?;

        debug!(sample_rate, channels, bytes = state.size(), "opus decoder initialized");
        self.slot = Slot::Live(state);
        self.channels = channels;
        self.has_history = false;
        Ok(())
    }

    /// Release the native state. A second call is an error.
    pub fn close(&mut self) -> Result<()> {
        match self.slot {
            Slot::Live(_) => {
                self.slot = Slot::Released;
                self.has_history = false;
                Ok(())
            }
            Slot::Released => Err(Usage::AlreadyClosed.into()),
            Slot::Empty => Err(Usage::Uninitialized.into()),
        }
    }

    /// Number of interleaved output channels. Zero until initialised.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decode one packet into interleaved 16-bit PCM.
    ///
    /// Returns the number of samples written per channel. `pcm` must have room for the whole
    /// frame; a short buffer is reported by libopus rather than truncated.
    pub fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<usize> {
        let st = self.handle()?;
        if packet.is_empty() {
            return Err(Usage::EmptyInput.into());
        }
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyOutput)?;
        let n = check(unsafe {
            opus::opus_decode(
                st,
                packet.as_ptr(),
                clamp_len(packet.len()),
                pcm.as_mut_ptr(),
                frame_size,
                0,
            )
        })?;
        self.has_history = true;
        Ok(n as usize)
    }

    /// Decode one packet into interleaved `f32` PCM.
    pub fn decode_float(&mut self, packet: &[u8], pcm: &mut [f32]) -> Result<usize> {
        let st = self.handle()?;
        if packet.is_empty() {
            return Err(Usage::EmptyInput.into());
        }
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyOutput)?;
        let n = check(unsafe {
            opus::opus_decode_float(
                st,
                packet.as_ptr(),
                clamp_len(packet.len()),
                pcm.as_mut_ptr(),
                frame_size,
                0,
            )
        })?;
        self.has_history = true;
        Ok(n as usize)
    }

    /// Recover the frame *preceding* `packet` from its in-band FEC data.
    ///
    /// `pcm` must be exactly as long as the lost frame. When `packet` carries no FEC data libopus
    /// falls back to concealment, so this still fills `pcm`.
    pub fn decode_fec(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<()> {
        let st = self.handle()?;
        if packet.is_empty() {
            return Err(Usage::EmptyInput.into());
        }
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyOutput)?;
        check(unsafe {
            opus::opus_decode(
                st,
                packet.as_ptr(),
                clamp_len(packet.len()),
                pcm.as_mut_ptr(),
                frame_size,
                1,
            )
        })?;
        self.has_history = true;
        Ok(())
    }

    /// `f32` variant of [`Decoder::decode_fec`].
    pub fn decode_fec_float(&mut self, packet: &[u8], pcm: &mut [f32]) -> Result<()> {
        let st = self.handle()?;
        if packet.is_empty() {
            return Err(Usage::EmptyInput.into());
        }
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyOutput)?;
        check(unsafe {
            opus::opus_decode_float(
                st,
                packet.as_ptr(),
                clamp_len(packet.len()),
                pcm.as_mut_ptr(),
                frame_size,
                1,
            )
        })?;
        self.has_history = true;
        Ok(())
    }

    /// Conceal one lost frame. `pcm` must be exactly as long as the missing frame.
    pub fn decode_plc(&mut self, pcm: &mut [i16]) -> Result<()> {
        let st = self.handle()?;
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyOutput)?;
        if !self.has_history {
            return Err(Usage::NoDecoderHistory.into());
        }
        check(unsafe { opus::opus_decode(st, ptr::null(), 0, pcm.as_mut_ptr(), frame_size, 0) })?;
        Ok(())
    }

    /// `f32` variant of [`Decoder::decode_plc`].
    pub fn decode_plc_float(&mut self, pcm: &mut [f32]) -> Result<()> {
        let st = self.handle()?;
        let frame_size = frames_in(pcm.len(), self.channels, Usage::EmptyOutput)?;
        if !self.has_history {
            return Err(Usage::NoDecoderHistory.into());
        }
        check(unsafe {
            opus::opus_decode_float(st, ptr::null(), 0, pcm.as_mut_ptr(), frame_size, 0)
        })?;
        Ok(())
    }

    /// Samples per channel produced by the most recent decode call, concealment included.
    pub fn last_packet_duration(&mut self) -> Result<usize> {
        Ok(self.get(OPUS_GET_LAST_PACKET_DURATION_REQUEST)? as usize)
    }

    /// Output sample rate the decoder was initialised with.
    pub fn sample_rate(&mut self) -> Result<u32> {
        Ok(self.get(opus::OPUS_GET_SAMPLE_RATE_REQUEST)? as u32)
    }

    /// Drop all decoding history, as if freshly initialised.
    pub fn reset(&mut self) -> Result<()> {
        let st = self.handle()?;
        check(unsafe { opus::opus_decoder_ctl(st, opus::OPUS_RESET_STATE) })?;
        self.has_history = false;
        Ok(())
    }

    fn handle(&mut self) -> Result<*mut opus::OpusDecoder> {
        match &mut self.slot {
            Slot::Live(state) => Ok(state.as_ptr()),
            _ => Err(Usage::Uninitialized.into()),
        }
    }

    fn get(&mut self, request: c_int) -> Result<i32> {
        let st = self.handle()?;
        let mut value: opus::opus_int32 = 0;
        check(unsafe { opus::opus_decoder_ctl(st, request, &mut value as *mut opus::opus_int32) })?;
        Ok(value)
    }
}

// From opus_defines.h.
const OPUS_GET_LAST_PACKET_DURATION_REQUEST: c_int = 4039;
