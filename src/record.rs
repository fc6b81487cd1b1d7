//! The per-cycle summary handed to the radio.

use crate::config::PEAK_COUNT;
use crate::peaks::PeakRecord;

/// Encoded size: three header words, then ten positions and ten values.
pub const RECORD_LEN: usize = 4 * (3 + 2 * PEAK_COUNT);

const POSITIONS_AT: usize = 12;
const VALUES_AT: usize = POSITIONS_AT + 4 * PEAK_COUNT;

/// Frequency of bin `k` is `k * sample_rate_hz / fft_size`.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRecord {
    pub fft_size: u32,
    pub sample_rate_hz: u32,
    pub mean: f32,
    pub peaks: PeakRecord,
}

impl ResultRecord {
    /// Little-endian image of
    /// `fft_size:u32, sample_rate_hz:u32, mean:f32, pos[10]:u32, val[10]:f32`.
    /// Missing peaks encode as position 0, value 0.0.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&self.fft_size.to_le_bytes());
        out[4..8].copy_from_slice(&self.sample_rate_hz.to_le_bytes());
        out[8..12].copy_from_slice(&self.mean.to_le_bytes());
        for (i, peak) in self.peaks.iter().enumerate() {
            let pos = POSITIONS_AT + 4 * i;
            let val = VALUES_AT + 4 * i;
            out[pos..pos + 4].copy_from_slice(&peak.position.to_le_bytes());
            out[val..val + 4].copy_from_slice(&peak.value.to_le_bytes());
        }
        out
    }

    /// Center frequency of a bin.
    pub fn bin_hz(&self, position: u32) -> f32 {
        position as f32 * self.sample_rate_hz as f32 / self.fft_size as f32
    }
}
