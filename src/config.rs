/// Samples per capture and transform length.
pub const FFT_SIZE: usize = 1024;

/// Length of the real-input spectrum.
pub const SPECTRUM_LEN: usize = FFT_SIZE / 2;

/// Peaks reported per cycle.
pub const PEAK_COUNT: usize = 10;

/// RTC0 runs from the 32.768 kHz LFXO with prescaler 0.
pub const TICK_RATE_HZ: u32 = 32_768;

/// Nominal microphone sample rate, half the tick rate.
pub const SAMPLE_RATE_HZ: u32 = TICK_RATE_HZ / 2;

/// VM1010 V_BIAS needs ~2 ms to come up after power on.
pub const BIAS_SETTLE_TICKS: u32 = 70;

/// Delay between the wake-on-sound trigger and the first sample. The
/// datasheet asks for 200 us; anything under ~30 ticks corrupts the capture.
pub const TRIGGER_SETTLE_TICKS: u32 = 50;

/// Half the expected dynamic range of a raw sample.
pub const NORMALIZE_DIVISOR: f32 = 512.0;

/// Period of the housekeeping heartbeat on the system channel.
pub const HOUSEKEEPING_PERIOD_TICKS: u32 = TICK_RATE_HZ;

/// Core clock of the nRF52833.
pub const SYSCLK_HZ: u32 = 64_000_000;

/// Tunables consumed by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    pub bias_settle_ticks: u32,
    pub trigger_settle_ticks: u32,
    pub sample_rate_hz: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bias_settle_ticks: BIAS_SETTLE_TICKS,
            trigger_settle_ticks: TRIGGER_SETTLE_TICKS,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}
