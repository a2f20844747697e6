use serde::{Deserialize, Serialize};

use crate::encoder::Encoder;
use crate::error::Result;
use crate::params::{Application, Bandwidth, Bitrate};

/// Options that describe an encoder.
///
/// This is *library-level configuration*, not CLI flags directly. Frontends deserialize it (the
/// bundled CLI reads it from JSON) and hand it to [`Encoder::from_opts`], so:
/// - construction and tuning are applied in one place, in a fixed order
/// - unset tuning fields keep the libopus defaults
///
/// Values are not range-checked here; libopus rejects out-of-range settings when they are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EncoderOpts {
    /// One of 8000, 12000, 16000, 24000 or 48000 Hz.
    pub sample_rate: u32,

    /// 1 (mono) or 2 (stereo).
    pub channels: usize,

    pub application: Application,

    /// Target bitrate. `None` leaves the encoder's automatic choice.
    pub bitrate: Option<Bitrate>,

    /// 0..=10.
    pub complexity: Option<i32>,

    pub max_bandwidth: Option<Bandwidth>,

    /// In-band forward error correction.
    pub inband_fec: Option<bool>,

    /// Expected packet loss in percent, 0..=100.
    pub packet_loss_perc: Option<i32>,

    /// Discontinuous transmission.
    pub dtx: Option<bool>,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            application: Application::Voip,
            bitrate: None,
            complexity: None,
            max_bandwidth: None,
            inband_fec: None,
            packet_loss_perc: None,
            dtx: None,
        }
    }
}

impl EncoderOpts {
    /// Push every set tuning field into `enc`. Stops at the first rejected value.
    pub(crate) fn apply(&self, enc: &mut Encoder) -> Result<()> {
        if let Some(bitrate) = self.bitrate {
            enc.set_bitrate_setting(bitrate)?;
        }
        if let Some(complexity) = self.complexity {
            enc.set_complexity(complexity)?;
        }
        if let Some(bandwidth) = self.max_bandwidth {
            enc.set_max_bandwidth(bandwidth)?;
        }
        if let Some(fec) = self.inband_fec {
            enc.set_inband_fec(fec)?;
        }
        if let Some(percent) = self.packet_loss_perc {
            enc.set_packet_loss_perc(percent)?;
        }
        if let Some(dtx) = self.dtx {
            enc.set_dtx(dtx)?;
        }
        Ok(())
    }
}
