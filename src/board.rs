//! Riotee board collaborators: capacitor gate, VM1010 microphone and the
//! radio uplink.

use core::sync::atomic::{Ordering, compiler_fence};

use cortex_m::peripheral::NVIC;
use embedded_hal::digital::{InputPin, OutputPin};
use nrf52833_hal::clocks::{Clocks, ExternalOscillator, Internal, LfOscConfiguration, LfOscStarted};
use nrf52833_hal::gpio::{Floating, Input, Level, Output, Pin, PushPull, p0};
use nrf52833_hal::gpiote::Gpiote;
use nrf52833_hal::pac::{CLOCK, Interrupt, P0, RADIO, SAADC};

use crate::config::SAMPLE_RATE_HZ;
use crate::pipeline::{EnergyGate, Error, Microphone, Radio, SampleBuffer};
use crate::record::RECORD_LEN;
use crate::timer::rtc::Rtc;

defmt::timestamp!("{=u32}", Rtc::now());

/// SAADC sample timer divider from 16 MHz; 977 gives 16376 Hz.
const SAMPLERATE_CC: u16 = (16_000_000 / SAMPLE_RATE_HZ) as u16 + 1;

/// Wakes (RTC ticks, GPIO events) to sit through before giving up on sound.
const MAX_LISTEN_WAKES: u32 = 64;
/// Busy-wait bound for peripheral events; ~4x the 62.5 ms capture.
const SPIN_LIMIT: u32 = 4_000_000;

const RADIO_CHANNEL: u8 = 7;
const RADIO_BASE0: u32 = 0x5249_4f54;
const RADIO_PREFIX0: u32 = 0xe7;
/// PCNF0: 8-bit length field, no S0/S1.
const RADIO_PCNF0: u32 = 8;
/// PCNF1: MAXLEN, 3-byte base address, little endian, whitening on.
const RADIO_PCNF1: u32 = RECORD_LEN as u32 | (3 << 16) | (1 << 25);

const NO_SOUND: i32 = 1;
const CAPTURE_TIMEOUT: i32 = 2;
const TX_TIMEOUT: i32 = 1;
const TX_NO_CLOCK: i32 = 2;
const TX_TOO_LONG: i32 = 3;

/// Clock tree while idle: LFCLK from the 32.768 kHz crystal, HFCLK from the
/// internal oscillator.
pub type LfClocks = Clocks<Internal, ExternalOscillator, LfOscStarted>;

type InPin = Pin<Input<Floating>>;
type OutPin = Pin<Output<PushPull>>;

/// Start LFCLK from the crystal; RTC0 counts on it.
pub fn start_clocks(clock: CLOCK) -> LfClocks {
    Clocks::new(clock)
        .set_lfclk_src_external(LfOscConfiguration::NoExternalNoBypass)
        .start_lfclk()
}

fn spin_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..SPIN_LIMIT {
        if done() {
            return true;
        }
    }
    false
}

fn drive(pin: &mut OutPin, high: bool) {
    let Ok(()) = if high { pin.set_high() } else { pin.set_low() };
}

fn is_high(pin: &mut InPin) -> bool {
    let Ok(high) = pin.is_high();
    high
}

/// Sleep on WFE until `pin` reads high. The pin's DETECT signal raises the
/// GPIOTE PORT event, which wakes the core through SEVONPEND. Gives up after
/// `max_wakes` wakes when a bound is given.
fn wait_high(gpiote: &Gpiote, pin: &mut InPin, max_wakes: Option<u32>) -> bool {
    gpiote.port().input_pin(&*pin).high();
    let mut wakes = 0;
    let high = loop {
        if is_high(pin) {
            break true;
        }
        if max_wakes.is_some_and(|max| wakes >= max) {
            break false;
        }
        gpiote.port().reset_events();
        NVIC::unpend(Interrupt::GPIOTE);
        if !is_high(pin) {
            cortex_m::asm::wfe();
        }
        wakes += 1;
    };
    gpiote.port().input_pin(&*pin).disabled();
    high
}

/// Configure the pins and split the board into the pipeline collaborators.
/// Expects SEVONPEND to be set in the SCB and the GPIOTE line left masked.
pub fn split<'a>(
    p0: P0,
    gpiote: &'a Gpiote,
    saadc: SAADC,
    radio: RADIO,
    clocks: LfClocks,
) -> (CapacitorGate<'a>, Vm1010<'a>, Uplink) {
    let port = p0::Parts::new(p0);
    gpiote.port().enable_interrupt();

    let gate = CapacitorGate {
        // Power-good output of the energy management IC, high once charged.
        pwrgd: port.p0_17.into_floating_input().degrade(),
        gpiote,
    };
    let mic = Vm1010 {
        // Supply switch on the sensor shield, low active.
        power: port.p0_30.into_push_pull_output(Level::High).degrade(),
        vbias: port.p0_28.into_push_pull_output(Level::Low).degrade(),
        mode: port.p0_03.into_push_pull_output(Level::Low).degrade(),
        dout: port.p0_29.into_floating_input().degrade(),
        gpiote,
        saadc,
    };
    let uplink = Uplink {
        radio,
        clocks: Some(clocks),
        packet: [0; RECORD_LEN + 1],
    };
    (gate, mic, uplink)
}

pub struct CapacitorGate<'a> {
    pwrgd: InPin,
    gpiote: &'a Gpiote,
}

impl EnergyGate for CapacitorGate<'_> {
    fn wait_charged(&mut self) {
        wait_high(self.gpiote, &mut self.pwrgd, None);
    }
}

/// VM1010 wake-on-sound MEMS microphone sampled through the SAADC.
pub struct Vm1010<'a> {
    power: OutPin,
    vbias: OutPin,
    mode: OutPin,
    dout: InPin,
    gpiote: &'a Gpiote,
    saadc: SAADC,
}

impl Microphone for Vm1010<'_> {
    fn enable(&mut self) {
        drive(&mut self.power, false);
        drive(&mut self.vbias, true);
        // Mode high selects wake-on-sound.
        drive(&mut self.mode, true);
    }

    fn disable(&mut self) {
        drive(&mut self.mode, false);
        drive(&mut self.vbias, false);
        drive(&mut self.power, true);
    }

    fn wait_for_sound(&mut self) -> Result<(), Error> {
        if !wait_high(self.gpiote, &mut self.dout, Some(MAX_LISTEN_WAKES)) {
            return Err(Error::NoSound(NO_SOUND));
        }
        // Back to normal mode so VOUT carries audio.
        drive(&mut self.mode, false);
        Ok(())
    }

    /// The HAL's SAADC driver has no timer-mode sampling, so this drives
    /// the registers directly.
    fn capture(&mut self, samples: &mut SampleBuffer) -> Result<(), Error> {
        let saadc = &self.saadc;
        saadc.enable.write(|w| w.enable().enabled());
        saadc.ch[0].pselp.write(|w| w.pselp().analog_input0());
        saadc.ch[0].pseln.write(|w| w.pseln().nc());
        saadc.ch[0].config.write(|w| {
            w.resp().bypass();
            w.resn().bypass();
            w.gain().gain1_4();
            w.refsel().vdd1_4();
            w.tacq()._3us();
            w.mode().se();
            w.burst().disabled()
        });
        saadc.resolution.write(|w| w.val()._12bit());
        saadc.oversample.write(|w| w.oversample().bypass());
        saadc
            .samplerate
            .write(|w| unsafe { w.cc().bits(SAMPLERATE_CC) }.mode().timers());
        saadc
            .result
            .ptr
            .write(|w| unsafe { w.ptr().bits(samples.as_mut_ptr() as u32) });
        saadc
            .result
            .maxcnt
            .write(|w| unsafe { w.maxcnt().bits(samples.len() as u16) });

        saadc.events_started.write(|w| unsafe { w.bits(0) });
        saadc.events_end.write(|w| unsafe { w.bits(0) });
        saadc.events_stopped.write(|w| unsafe { w.bits(0) });
        compiler_fence(Ordering::SeqCst);

        saadc.tasks_start.write(|w| unsafe { w.bits(1) });
        let filled = spin_until(|| saadc.events_started.read().bits() != 0) && {
            saadc.tasks_sample.write(|w| unsafe { w.bits(1) });
            spin_until(|| saadc.events_end.read().bits() != 0)
        };

        saadc.tasks_stop.write(|w| unsafe { w.bits(1) });
        spin_until(|| saadc.events_stopped.read().bits() != 0);
        saadc.enable.write(|w| w.enable().disabled());
        compiler_fence(Ordering::SeqCst);

        if filled {
            Ok(())
        } else {
            Err(Error::Capture(CAPTURE_TIMEOUT))
        }
    }
}

/// Raw 1 Mbit uplink: one length-prefixed, CRC-protected packet per record.
/// The HAL has no proprietary-mode radio driver.
pub struct Uplink {
    radio: RADIO,
    /// Taken while the HFXO runs for a transmission.
    clocks: Option<LfClocks>,
    packet: [u8; RECORD_LEN + 1],
}

impl Uplink {
    fn configure(&self) {
        let radio = &self.radio;
        radio.mode.write(|w| w.mode().nrf_1mbit());
        radio.txpower.write(|w| w.txpower()._0d_bm());
        radio
            .frequency
            .write(|w| unsafe { w.frequency().bits(RADIO_CHANNEL) });
        radio.pcnf0.write(|w| unsafe { w.bits(RADIO_PCNF0) });
        radio.pcnf1.write(|w| unsafe { w.bits(RADIO_PCNF1) });
        radio.base0.write(|w| unsafe { w.bits(RADIO_BASE0) });
        radio.prefix0.write(|w| unsafe { w.bits(RADIO_PREFIX0) });
        radio.txaddress.write(|w| unsafe { w.txaddress().bits(0) });
        radio.crccnf.write(|w| w.len().two());
        radio.crcinit.write(|w| unsafe { w.crcinit().bits(0xFFFF) });
        radio.crcpoly.write(|w| unsafe { w.crcpoly().bits(0x1_1021) });
        radio
            .shorts
            .write(|w| w.ready_start().enabled().end_disable().enabled());
    }

    /// Send the staged packet; needs the HFXO running.
    fn transmit(&self) -> bool {
        self.configure();
        let radio = &self.radio;
        radio
            .packetptr
            .write(|w| unsafe { w.bits(self.packet.as_ptr() as u32) });
        radio.events_disabled.write(|w| unsafe { w.bits(0) });
        compiler_fence(Ordering::SeqCst);
        radio.tasks_txen.write(|w| unsafe { w.bits(1) });

        let sent = spin_until(|| radio.events_disabled.read().bits() != 0);
        if !sent {
            radio.tasks_disable.write(|w| unsafe { w.bits(1) });
        }
        sent
    }
}

impl Radio for Uplink {
    fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        if frame.len() > RECORD_LEN {
            return Err(Error::Transmit(TX_TOO_LONG));
        }
        self.packet[0] = frame.len() as u8;
        self.packet[1..=frame.len()].copy_from_slice(frame);

        let clocks = self
            .clocks
            .take()
            .ok_or(Error::Transmit(TX_NO_CLOCK))?
            .enable_ext_hfosc();
        let sent = self.transmit();
        self.clocks = Some(clocks.disable_ext_hfosc());

        if sent {
            Ok(())
        } else {
            Err(Error::Transmit(TX_TIMEOUT))
        }
    }
}
