//! Times the processing stages of one cycle on a synthetic capture.

#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(target_os = "none", no_std)]

#[cfg(target_os = "none")]
use wake_on_sound::{
    bench_time, conditioner,
    config::{FFT_SIZE, PEAK_COUNT, SPECTRUM_LEN, SYSCLK_HZ},
    peaks::{self, PeakRecord},
    spectrum::{RealFft, SpectralTransform},
};

#[cfg(target_os = "none")]
static mut SAMPLES: [i16; FFT_SIZE] = [0; FFT_SIZE];
#[cfg(target_os = "none")]
static mut SIGNAL: [f32; FFT_SIZE] = [0.0; FFT_SIZE];
#[cfg(target_os = "none")]
static mut SPECTRUM: [f32; SPECTRUM_LEN] = [0.0; SPECTRUM_LEN];

#[cfg(target_os = "none")]
#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::println!("Run Benchmark");

    // Get access to Cortex-M core peripherals (CPU-level hardware)
    let mut cortex_peripherals = cortex_m::Peripherals::take().unwrap();

    // SAFETY: the buffers are only touched here and no interrupt is enabled.
    let (samples, signal, spectrum) = unsafe {
        (
            &mut *core::ptr::addr_of_mut!(SAMPLES),
            &mut *core::ptr::addr_of_mut!(SIGNAL),
            &mut *core::ptr::addr_of_mut!(SPECTRUM),
        )
    };

    // Sawtooth with a DC offset, close enough to a click for timing
    for (i, s) in samples.iter_mut().enumerate() {
        *s = (i % 64) as i16 * 8 - 300;
    }

    let convert_us = bench_time!(
        cortex_peripherals,
        {
            conditioner::normalize(samples, signal);
        },
        SYSCLK_HZ,
        us
    );

    let fft_us = bench_time!(
        cortex_peripherals,
        {
            RealFft.transform(signal, spectrum);
        },
        SYSCLK_HZ,
        us
    );

    let record: PeakRecord;
    let peaks_us = bench_time!(
        cortex_peripherals,
        {
            record = peaks::top_k(spectrum, PEAK_COUNT);
        },
        SYSCLK_HZ,
        us
    );

    defmt::println!("convert: {} us", convert_us);
    defmt::println!("fft: {} us", fft_us);
    defmt::println!("peaks: {} us {}", peaks_us, record.as_slice());

    wake_on_sound::exit()
}

#[cfg(not(target_os = "none"))]
fn main() {}
