#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "none")]
use {defmt_rtt as _, panic_probe as _};

mod logging;

#[cfg(target_os = "none")]
pub mod board;
pub mod conditioner;
pub mod config;
pub mod peaks;
pub mod pipeline;
pub mod record;
pub mod spectrum;
pub mod timer;

// Custom panic handler to avoid duplicate panic messages
// Uses defmt for formatted logging instead of standard panic behavior
#[cfg(target_os = "none")]
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf() // Trigger undefined instruction exception
}

/// Terminates the application gracefully for probe-rs
/// Makes the debugger exit with success status (exit-code = 0)
#[cfg(target_os = "none")]
pub fn exit() -> ! {
    loop {
        cortex_m::asm::bkpt(); // Trigger breakpoint instruction repeatedly
    }
}

/// Measures CPU cycles taken to execute an expression on the Cortex-M4
///
/// # Arguments
/// * `$cp` - Core peripherals (must have DCB and DWT access)
/// * `$x` - Expression to measure
///
/// # Returns
/// Number of CPU cycles as u32
///
/// # Example
/// ```ignore
/// let cycles = bench_cycles!(cp, {
///     // code to measure
/// });
/// ```
#[cfg(target_os = "none")]
#[macro_export]
macro_rules! bench_cycles {
    ( $cp:expr, $x:expr ) => {{
        use core::sync::atomic::{self, Ordering};
        use cortex_m::peripheral::DWT;

        $cp.DCB.enable_trace();
        $cp.DWT.enable_cycle_counter();

        atomic::compiler_fence(Ordering::Acquire);
        let before = DWT::cycle_count();
        $x;
        let after = DWT::cycle_count();
        atomic::compiler_fence(Ordering::Release);

        after.wrapping_sub(before)
    }};
}

/// Measures execution time of an expression using the DWT cycle counter
///
/// # Arguments
/// * `$cp` - Cortex peripherals (cortex_m::Peripherals)
/// * `$x` - Expression to measure
/// * `$sysclk_hz` - System clock frequency in Hz
/// * Unit: `us` (microseconds) or `ms` (milliseconds)
///
/// # Returns
/// Execution time as `u64` in the requested unit
///
/// # Example
/// ```ignore
/// let time_us = bench_time!(cp, { conditioner::normalize(&raw, &mut out); }, SYSCLK_HZ, us);
/// ```
///
/// # Notes
/// - The 32-bit cycle counter wraps after ~67 s at 64 MHz
#[cfg(target_os = "none")]
#[macro_export]
macro_rules! bench_time {
    ( $cp:expr, $x:expr, $sysclk_hz:expr, us ) => {{
        let cycles = $crate::bench_cycles!($cp, $x);
        (cycles as u64 * 1_000_000) / ($sysclk_hz as u64)
    }};
    ( $cp:expr, $x:expr, $sysclk_hz:expr, ms ) => {{
        let cycles = $crate::bench_cycles!($cp, $x);
        (cycles as u64 * 1_000) / ($sysclk_hz as u64)
    }};
}
