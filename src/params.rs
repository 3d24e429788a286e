//! Acquisition parameters and their validation.
//!
//! Everything here is checked before it is allowed anywhere near the device:
//! an [`AcquisitionParameters`] value can only be constructed from a sample
//! rate the card accepts, so the session layer never has to re-validate.

/// Selects which physical input(s) the card samples.
///
/// In [`ChannelMode::In1AndIn2`] mode the acquired buffer interleaves both
/// inputs: even indices hold `In1` samples, odd indices hold `In2` samples.
///
/// In [`ChannelMode::Difference`] mode each sample is the voltage difference
/// of `In1` and `In2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Forbid,
    In1,
    In2,
    In1AndIn2,
    Difference,
}

impl ChannelMode {
    /// Vendor selector code passed to the configure primitive.
    pub fn code(&self) -> i32 {
        match self {
            ChannelMode::Forbid => 0,
            ChannelMode::In1 => 1,
            ChannelMode::In2 => 2,
            ChannelMode::In1AndIn2 => 3,
            ChannelMode::Difference => 4,
        }
    }
}

/// Setting of the on-board Programmable Gain Amplifier (PGA).
///
/// Each variant carries two facts: the selector index the vendor library
/// expects, and the voltage range mapped onto the ADC's full digital scale.
/// Only the index ever reaches the device; the voltage range is used by
/// voltage conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgaGain {
    Range10V,
    Range5V,
    Range2V,
    Range1V,
}

impl PgaGain {
    /// Vendor selector index passed to the configure primitive.
    pub fn index(&self) -> i32 {
        match self {
            PgaGain::Range10V => 0,
            PgaGain::Range5V => 1,
            PgaGain::Range2V => 2,
            PgaGain::Range1V => 3,
        }
    }

    /// Full-scale voltage range of this gain setting, in volts.
    pub fn volt_range(&self) -> f64 {
        match self {
            PgaGain::Range10V => 10.0,
            PgaGain::Range5V => 5.0,
            PgaGain::Range2V => 2.0,
            PgaGain::Range1V => 1.0,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("AD sample rate out of range, given {0} (must be in [1000, 450000])")]
    SampleRateOutOfRange(u32),

    #[error("AD sample rate should be a multiple of 1000, given {0}")]
    SampleRateNotAligned(u32),
}

/// Validated configuration of the MPS-060602 acquisition card.
///
/// Construction is the only validation point; a value of this type is always
/// safe to hand to [`MpsSession::configure`](crate::MpsSession::configure).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionParameters {
    channel_mode: ChannelMode,
    sample_rate: u32,
    gain: PgaGain,
}

impl AcquisitionParameters {
    pub const MIN_SAMPLE_RATE: u32 = 1000;
    pub const MAX_SAMPLE_RATE: u32 = 450_000;

    /// Validate and build a parameter set.
    ///
    /// The sample rate must lie in `[1000, 450000]` and be a multiple of
    /// 1000. Use [`AcquisitionParameters::new_unaligned`] to lift the
    /// multiple-of-1000 requirement.
    pub fn new(
        channel_mode: ChannelMode,
        sample_rate: u32,
        gain: PgaGain,
    ) -> Result<Self, ParameterError> {
        if sample_rate % 1000 != 0 {
            Self::check_range(sample_rate)?;
            return Err(ParameterError::SampleRateNotAligned(sample_rate));
        }
        Self::new_unaligned(channel_mode, sample_rate, gain)
    }

    /// Like [`AcquisitionParameters::new`] but accepts sample rates that are
    /// not multiples of 1000. The range check still applies.
    ///
    /// The card rounds such rates internally; only use this if you know what
    /// the hardware does with the exact value.
    pub fn new_unaligned(
        channel_mode: ChannelMode,
        sample_rate: u32,
        gain: PgaGain,
    ) -> Result<Self, ParameterError> {
        Self::check_range(sample_rate)?;
        Ok(Self {
            channel_mode,
            sample_rate,
            gain,
        })
    }

    fn check_range(sample_rate: u32) -> Result<(), ParameterError> {
        if !(Self::MIN_SAMPLE_RATE..=Self::MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(ParameterError::SampleRateOutOfRange(sample_rate));
        }
        Ok(())
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn gain(&self) -> PgaGain {
        self.gain
    }
}

impl Default for AcquisitionParameters {
    /// Both inputs interleaved, 1 kHz, ±10 V range.
    fn default() -> Self {
        Self {
            channel_mode: ChannelMode::In1AndIn2,
            sample_rate: 1000,
            gain: PgaGain::Range10V,
        }
    }
}
