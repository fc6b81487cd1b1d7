//! RTC0 of the nRF52833 behind [`CompareHardware`].

use nrf52833_hal::pac::RTC0;
use nrf52833_hal::rtc::{self, RtcCompareReg, RtcInterrupt};

use super::hardware::{COUNTER_MASK, Channel, CompareHardware};

fn compare_event(channel: Channel) -> RtcInterrupt {
    match channel {
        Channel::User => RtcInterrupt::Compare0,
        Channel::System => RtcInterrupt::Compare1,
    }
}

fn compare_reg(channel: Channel) -> RtcCompareReg {
    match channel {
        Channel::User => RtcCompareReg::Compare0,
        Channel::System => RtcCompareReg::Compare1,
    }
}

pub struct Rtc {
    rtc: rtc::Rtc<RTC0>,
    /// Interrupt enables as last written; the HAL has no read-back.
    armed: [bool; 2],
}

impl Rtc {
    /// Let RTC0 count from zero with prescaler 0. LFCLK must already run,
    /// see [`board::start_clocks`](crate::board::start_clocks). The RTC0 line
    /// is unmasked by the RTIC binding.
    pub fn start(rtc0: RTC0) -> Result<Self, rtc::Error> {
        let mut rtc = rtc::Rtc::new(rtc0, 0)?;
        for channel in Channel::ALL {
            rtc.disable_event(compare_event(channel));
            rtc.disable_interrupt(compare_event(channel), None);
            rtc.reset_event(compare_event(channel));
        }
        rtc.clear_counter();
        rtc.enable_counter();
        Ok(Self {
            rtc,
            armed: [false; 2],
        })
    }

    /// Current tick without going through a timer service, for log stamps.
    pub fn now() -> u32 {
        // SAFETY: read-only access to a free-running counter.
        unsafe { (*RTC0::ptr()).counter.read().bits() & COUNTER_MASK }
    }
}

impl CompareHardware for Rtc {
    /// A compare value of COUNTER or COUNTER + 1 may never match.
    const MIN_DELTA: u32 = 2;

    fn counter(&self) -> u32 {
        self.rtc.get_counter() & COUNTER_MASK
    }

    fn set_compare(&mut self, channel: Channel, target: u32) {
        // Only rejects values above 24 bits.
        self.rtc
            .set_compare(compare_reg(channel), target & COUNTER_MASK)
            .ok();
    }

    fn arm(&mut self, channel: Channel) {
        self.rtc.enable_event(compare_event(channel));
        self.rtc.enable_interrupt(compare_event(channel), None);
        self.armed[channel.index()] = true;
    }

    fn disarm(&mut self, channel: Channel) {
        self.rtc.disable_event(compare_event(channel));
        self.rtc.disable_interrupt(compare_event(channel), None);
        self.armed[channel.index()] = false;
    }

    fn is_pending(&self, channel: Channel) -> bool {
        self.rtc.is_event_triggered(compare_event(channel))
    }

    fn clear_pending(&mut self, channel: Channel) {
        self.rtc.reset_event(compare_event(channel));
        // Read back so the cleared event cannot re-pend the interrupt.
        let _ = self.rtc.is_event_triggered(compare_event(channel));
    }

    fn is_armed(&self, channel: Channel) -> bool {
        self.armed[channel.index()]
    }

    /// Interrupt entry sets the event register, so a wake posted between the
    /// caller's check and the WFE is not lost.
    fn wait_for_event() {
        cortex_m::asm::wfe();
    }
}
