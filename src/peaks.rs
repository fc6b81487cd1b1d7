//! Greedy top-K peak extraction over a magnitude spectrum.

use heapless::Vec;

use crate::config::PEAK_COUNT;

/// Written over a selected bin so it cannot win again. Below every finite
/// magnitude.
pub const MASKED: f32 = f32::NEG_INFINITY;

/// A spectrum bin and its magnitude.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Peak {
    pub position: u32,
    pub value: f32,
}

/// The dominant bins of one capture, strongest first.
pub type PeakRecord = Vec<Peak, PEAK_COUNT>;

/// Index of the largest value; the earliest index wins a tie.
fn argmax(data: &[f32]) -> Option<usize> {
    let (mut pos, mut max) = (0, *data.first()?);
    for (i, &x) in data.iter().enumerate().skip(1) {
        if x > max {
            max = x;
            pos = i;
        }
    }
    Some(pos)
}

/// Select the `k` largest magnitudes by repeated argmax, masking each winner
/// in place with [`MASKED`].
///
/// `magnitudes` is clobbered at the returned positions. The result holds
/// `min(k, K, magnitudes.len())` peaks with non-increasing values and
/// distinct positions; callers are expected to pass `k <= magnitudes.len()`.
pub fn top_k<const K: usize>(magnitudes: &mut [f32], k: usize) -> Vec<Peak, K> {
    debug_assert!(k <= magnitudes.len());
    let mut peaks = Vec::new();
    for _ in 0..k.min(K).min(magnitudes.len()) {
        let Some(pos) = argmax(magnitudes) else {
            break;
        };
        let peak = Peak {
            position: pos as u32,
            value: magnitudes[pos],
        };
        if peaks.push(peak).is_err() {
            break;
        }
        magnitudes[pos] = MASKED;
    }
    peaks
}

/// Mean of `|x|` over the spectrum.
pub fn mean_magnitude(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().map(|x| x.abs()).sum::<f32>() / data.len() as f32
}
