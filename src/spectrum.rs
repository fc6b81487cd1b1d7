//! Real-input spectral transform.

use micromath::F32Ext;

use crate::config::{FFT_SIZE, SPECTRUM_LEN};

/// Time-domain frame in, half-length magnitude spectrum out.
pub trait SpectralTransform {
    /// `input` may be used as scratch space.
    fn transform(&mut self, input: &mut [f32; FFT_SIZE], spectrum: &mut [f32; SPECTRUM_LEN]);
}

/// In-place radix-2 real FFT from `microfft`.
///
/// Magnitudes use the `micromath` square root on host and target alike. It
/// deviates from the exact root by up to about 6% but is monotonic, so the
/// order of bins, and with it peak selection, is exact. Powers of four come
/// out exact.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealFft;

impl SpectralTransform for RealFft {
    fn transform(&mut self, input: &mut [f32; FFT_SIZE], spectrum: &mut [f32; SPECTRUM_LEN]) {
        let bins = microfft::real::rfft_1024(input);
        // microfft packs the Nyquist term into the imaginary part of DC.
        bins[0].im = 0.0;
        for (mag, bin) in spectrum.iter_mut().zip(bins.iter()) {
            *mag = F32Ext::sqrt(bin.re * bin.re + bin.im * bin.im);
        }
    }
}
