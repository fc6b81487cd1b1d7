//! The wake-on-sound cycle: capture a frame, reduce it to its strongest
//! spectral peaks and radio the summary.
//!
//! Power can disappear between any two stages, so every stage that draws
//! real current starts by waiting on the [`EnergyGate`]. A stage never waits
//! on the gate halfway through. Nothing is retried: a failed capture ends the
//! cycle, a failed transmission is only reported.

use crate::conditioner::{self, SignalStats};
use crate::config::{FFT_SIZE, PEAK_COUNT, PipelineConfig, SPECTRUM_LEN};
use crate::logging::{debug, info, warning};
use crate::peaks::{self, PeakRecord};
use crate::record::ResultRecord;
use crate::spectrum::SpectralTransform;
use crate::timer::Sleep;

/// Raw microphone samples of one capture.
pub type SampleBuffer = [i16; FFT_SIZE];

/// Failures reported by the collaborators, carrying their raw status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Error {
    /// The wake-on-sound wait gave up without a trigger.
    NoSound(i32),
    /// Sampling stopped before the buffer was full.
    Capture(i32),
    /// The radio did not accept the frame.
    Transmit(i32),
}

impl Error {
    pub fn code(&self) -> i32 {
        match *self {
            Error::NoSound(c) | Error::Capture(c) | Error::Transmit(c) => c,
        }
    }
}

/// Legacy status code of a result: 0 on success.
pub fn status(result: &Result<(), Error>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// Blocks until the storage capacitor holds enough charge for the next stage.
pub trait EnergyGate {
    fn wait_charged(&mut self);
}

pub trait Microphone {
    fn enable(&mut self);

    fn disable(&mut self);

    /// Block until the microphone reports sound.
    fn wait_for_sound(&mut self) -> Result<(), Error>;

    /// Fill `samples` at the configured sample rate.
    fn capture(&mut self, samples: &mut SampleBuffer) -> Result<(), Error>;
}

pub trait Radio {
    fn send(&mut self, frame: &[u8]) -> Result<(), Error>;
}

/// Working memory of one cycle. Lives in a static, overwritten every cycle.
pub struct Buffers {
    samples: SampleBuffer,
    signal: [f32; FFT_SIZE],
    spectrum: [f32; SPECTRUM_LEN],
}

impl Buffers {
    pub const fn new() -> Self {
        Self {
            samples: [0; FFT_SIZE],
            signal: [0.0; FFT_SIZE],
            spectrum: [0.0; SPECTRUM_LEN],
        }
    }
}

impl Default for Buffers {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    Idle,
    /// Charged; the acquisition stage runs next.
    Armed,
    Converting,
    Transforming { mean: f32 },
    PeakExtracting { mean: f32 },
    Sending(ResultRecord),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    /// Acquisition failed; nothing was processed.
    Skipped(Error),
    /// The record went to the radio with the given result.
    Sent {
        record: ResultRecord,
        status: Result<(), Error>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    Next(Stage),
    Done(CycleOutcome),
}

pub struct Pipeline<'a, G, M, F, R, S> {
    gate: G,
    mic: M,
    fft: F,
    radio: R,
    timer: S,
    buffers: &'a mut Buffers,
    config: PipelineConfig,
}

impl<'a, G, M, F, R, S> Pipeline<'a, G, M, F, R, S>
where
    G: EnergyGate,
    M: Microphone,
    F: SpectralTransform,
    R: Radio,
    S: Sleep,
{
    pub fn new(
        gate: G,
        mic: M,
        fft: F,
        radio: R,
        timer: S,
        buffers: &'a mut Buffers,
        config: PipelineConfig,
    ) -> Self {
        Self {
            gate,
            mic,
            fft,
            radio,
            timer,
            buffers,
            config,
        }
    }

    /// Cycle forever.
    pub fn run(&mut self) -> ! {
        let mut cycles: u32 = 0;
        loop {
            match self.run_cycle() {
                CycleOutcome::Skipped(e) => debug!("cycle {} skipped: {}", cycles, e),
                CycleOutcome::Sent { status, .. } => {
                    if let Err(e) = status {
                        warning!("cycle {} not delivered: {}", cycles, e);
                    }
                }
            }
            cycles = cycles.wrapping_add(1);
        }
    }

    /// Walk the stages from `Idle` until the cycle ends.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let mut stage = Stage::Idle;
        loop {
            match self.step(stage) {
                Transition::Next(next) => stage = next,
                Transition::Done(outcome) => return outcome,
            }
        }
    }

    /// Execute one stage.
    pub fn step(&mut self, stage: Stage) -> Transition {
        match stage {
            Stage::Idle => {
                self.gate.wait_charged();
                info!("wait");
                Transition::Next(Stage::Armed)
            }
            Stage::Armed => match self.acquire() {
                Ok(()) => Transition::Next(Stage::Converting),
                Err(e) => Transition::Done(CycleOutcome::Skipped(e)),
            },
            Stage::Converting => {
                self.gate.wait_charged();
                info!("convert");
                let buffers = &mut *self.buffers;
                let mean = conditioner::normalize(&buffers.samples, &mut buffers.signal);
                if let Some(stats) = SignalStats::of(&buffers.signal) {
                    debug!("min/mean/max = [{}, {}, {}]", stats.min, stats.mean, stats.max);
                }
                Transition::Next(Stage::Transforming { mean })
            }
            Stage::Transforming { mean } => {
                self.gate.wait_charged();
                info!("fft");
                let buffers = &mut *self.buffers;
                self.fft.transform(&mut buffers.signal, &mut buffers.spectrum);
                Transition::Next(Stage::PeakExtracting { mean })
            }
            Stage::PeakExtracting { mean } => {
                self.gate.wait_charged();
                let spectrum = &mut self.buffers.spectrum;
                debug!("mean |X| = {}", peaks::mean_magnitude(spectrum));
                let peaks: PeakRecord = peaks::top_k(spectrum, PEAK_COUNT);
                info!("peaks {}", peaks.as_slice());
                Transition::Next(Stage::Sending(ResultRecord {
                    fft_size: FFT_SIZE as u32,
                    sample_rate_hz: self.config.sample_rate_hz,
                    mean,
                    peaks,
                }))
            }
            Stage::Sending(record) => {
                self.gate.wait_charged();
                let result = self.radio.send(&record.encode());
                info!("sending={}", status(&result));
                Transition::Done(CycleOutcome::Sent {
                    record,
                    status: result,
                })
            }
        }
    }

    /// Power the microphone, wait for sound, capture one frame. The
    /// microphone is switched off again whatever the outcome.
    fn acquire(&mut self) -> Result<(), Error> {
        self.mic.enable();
        self.timer.sleep_ticks(self.config.bias_settle_ticks);
        let result = self.listen_and_capture();
        self.mic.disable();
        result
    }

    fn listen_and_capture(&mut self) -> Result<(), Error> {
        self.mic.wait_for_sound()?;
        self.timer.sleep_ticks(self.config.trigger_settle_ticks);
        let result = self.mic.capture(&mut self.buffers.samples);
        info!("sample={}", status(&result));
        result
    }
}
