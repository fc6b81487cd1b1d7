//! Raw microphone samples to a centered, scaled float signal.

use crate::config::NORMALIZE_DIVISOR;

/// Write `(src[i] - mean) / NORMALIZE_DIVISOR` into `dst` and return the
/// arithmetic mean of all of `src`.
///
/// Only the common prefix of `src` and `dst` is used. An empty input has a
/// mean of zero.
pub fn normalize(src: &[i16], dst: &mut [f32]) -> f32 {
    let n = src.len().min(dst.len());
    if n == 0 {
        return 0.0;
    }

    let sum: i64 = src[..n].iter().map(|&s| i64::from(s)).sum();
    let mean = sum as f32 / n as f32;

    for (d, &s) in dst[..n].iter_mut().zip(&src[..n]) {
        *d = (f32::from(s) - mean) / NORMALIZE_DIVISOR;
    }
    mean
}

/// Spread of a conditioned buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalStats {
    pub min: f32,
    pub mean: f32,
    pub max: f32,
}

impl SignalStats {
    pub fn of(data: &[f32]) -> Option<Self> {
        let (&first, rest) = data.split_first()?;
        let mut stats = Self {
            min: first,
            mean: 0.0,
            max: first,
        };
        let mut sum = first;
        for &x in rest {
            if x > stats.max {
                stats.max = x;
            }
            if x < stats.min {
                stats.min = x;
            }
            sum += x;
        }
        stats.mean = sum / data.len() as f32;
        Some(stats)
    }
}
