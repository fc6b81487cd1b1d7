//! One real-time counter, two one-shot compare channels.
//!
//! [`TimerService::split`] hands out exactly one handle per channel plus the
//! interrupt handle, so a channel can never have two waiters. Every arm runs
//! as one critical section: drop the stale notification, program the compare
//! value, clear the event flag, enable event and interrupt. The interrupt
//! handler only honours a channel whose event flag *and* interrupt enable are
//! both set, disarms it and posts a notification tagged for that channel.
//!
//! Deadlines longer than one counter period are split: the compare is
//! programmed at most [`COUNTER_MASK`] ahead and the handler re-arms the
//! channel with the remainder instead of posting.

use core::cell::{Cell, RefCell};

use critical_section::{CriticalSection, Mutex};

pub mod hardware;
pub mod notify;
#[cfg(target_os = "none")]
pub mod rtc;
#[cfg(test)]
pub(crate) mod sim;

pub use hardware::{COUNTER_MASK, Channel, CompareHardware, compare_target};
pub use notify::{Event, NotificationSlot};

use crate::logging::trace;

/// Blocking delay in hardware ticks.
pub trait Sleep {
    fn sleep_ticks(&mut self, ticks: u32);
}

/// Milliseconds to ticks as `ms * 33554 / 1024`.
///
/// That is 32.7676 ticks per millisecond instead of 32.768: the result is
/// never above the exact value and at most `1 + ms / 2300` ticks below it
/// (32767 for one second). Saturates at `u32::MAX`.
pub const fn ms_to_ticks(ms: u32) -> u32 {
    let ticks = (ms as u64 * 33_554) >> 10;
    if ticks > u32::MAX as u64 {
        u32::MAX
    } else {
        ticks as u32
    }
}

const fn tag(channel: Channel) -> Event {
    match channel {
        Channel::User => Event::UserTimer,
        Channel::System => Event::SystemTimer,
    }
}

/// Channels that produced a wake in one interrupt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Fired {
    pub user: bool,
    pub system: bool,
}

impl Fired {
    fn set(&mut self, channel: Channel) {
        match channel {
            Channel::User => self.user = true,
            Channel::System => self.system = true,
        }
    }
}

pub struct TimerService<H> {
    hardware: Mutex<RefCell<H>>,
    /// Ticks still owed after the currently programmed compare.
    remaining: [Mutex<Cell<u32>>; 2],
    waiters: [NotificationSlot; 2],
}

impl<H> TimerService<H> {
    pub const fn new(hardware: H) -> Self {
        Self {
            hardware: Mutex::new(RefCell::new(hardware)),
            remaining: [Mutex::new(Cell::new(0)), Mutex::new(Cell::new(0))],
            waiters: [NotificationSlot::new(), NotificationSlot::new()],
        }
    }
}

impl<H: CompareHardware> TimerService<H> {
    /// Hand out the channel owners and the interrupt handle. The exclusive
    /// borrow is held for as long as any of them lives.
    pub fn split(&mut self) -> (UserTimer<'_, H>, SystemTimer<'_, H>, TimerIrq<'_, H>) {
        let service = &*self;
        (
            UserTimer { service },
            SystemTimer { service },
            TimerIrq { service },
        )
    }

    pub fn counter(&self) -> u32 {
        critical_section::with(|cs| self.hardware.borrow_ref(cs).counter())
    }

    pub fn is_armed(&self, channel: Channel) -> bool {
        critical_section::with(|cs| self.hardware.borrow_ref(cs).is_armed(channel))
    }

    fn arm(&self, channel: Channel, ticks: u32) {
        critical_section::with(|cs| {
            let mut hw = self.hardware.borrow_ref_mut(cs);
            self.waiters[channel.index()].clear();
            self.program(&mut hw, cs, channel, ticks);
            hw.arm(channel);
        });
    }

    /// Program the next compare for a `ticks` deadline. A compare is never
    /// closer than `H::MIN_DELTA` (and at least one tick, a compare equal to
    /// the counter only matches after a full wrap) nor further than
    /// `COUNTER_MASK`; the excess is kept in `remaining`.
    fn program(&self, hw: &mut H, cs: CriticalSection<'_>, channel: Channel, ticks: u32) {
        let step = ticks.clamp(H::MIN_DELTA.max(1), COUNTER_MASK);
        self.remaining[channel.index()]
            .borrow(cs)
            .set(ticks.saturating_sub(step));
        let target = compare_target(hw.counter(), step);
        hw.set_compare(channel, target);
        hw.clear_pending(channel);
        trace!("arm {} +{} -> {}", channel, step, target);
    }

    fn disarm(&self, channel: Channel) {
        critical_section::with(|cs| {
            let mut hw = self.hardware.borrow_ref_mut(cs);
            self.remaining[channel.index()].borrow(cs).set(0);
            hw.disarm(channel);
            hw.clear_pending(channel);
        });
    }

    fn resolve(&self) -> Fired {
        let mut fired = Fired::default();
        critical_section::with(|cs| {
            let mut hw = self.hardware.borrow_ref_mut(cs);
            for channel in Channel::ALL {
                // A latched event on a disarmed channel is stale.
                if hw.is_pending(channel) && hw.is_armed(channel) {
                    let rest = self.remaining[channel.index()].borrow(cs).get();
                    if rest > 0 {
                        self.program(&mut hw, cs, channel, rest);
                        continue;
                    }
                    hw.clear_pending(channel);
                    hw.disarm(channel);
                    self.waiters[channel.index()].post(tag(channel));
                    fired.set(channel);
                }
            }
        });
        fired
    }

    fn waiter(&self, channel: Channel) -> &NotificationSlot {
        &self.waiters[channel.index()]
    }
}

/// Owner of the user channel.
pub struct UserTimer<'a, H> {
    service: &'a TimerService<H>,
}

impl<H: CompareHardware> UserTimer<'_, H> {
    /// Block until at least `ticks` ticks have elapsed. Zero still waits for
    /// the nearest compare the hardware can match; delays beyond one counter
    /// period are re-armed from the interrupt.
    pub fn sleep(&mut self, ticks: u32) {
        self.service.arm(Channel::User, ticks);
        let waiter = self.service.waiter(Channel::User);
        while !waiter.take_if(Event::UserTimer) {
            H::wait_for_event();
        }
    }

    pub fn sleep_ms(&mut self, ms: u32) {
        self.sleep(ms_to_ticks(ms));
    }
}

impl<H: CompareHardware> Sleep for UserTimer<'_, H> {
    fn sleep_ticks(&mut self, ticks: u32) {
        self.sleep(ticks);
    }
}

/// Owner of the system channel.
pub struct SystemTimer<'a, H> {
    service: &'a TimerService<H>,
}

impl<H: CompareHardware> SystemTimer<'_, H> {
    /// Arm the channel `ticks` from now and return immediately. Re-arming
    /// replaces the previous deadline. Any `u32` is a valid delay.
    pub fn arm(&mut self, ticks: u32) {
        self.service.arm(Channel::System, ticks);
    }

    /// Disarm the channel. A notification already delivered stays readable
    /// through [`take_expired`](Self::take_expired).
    pub fn cancel(&mut self) {
        self.service.disarm(Channel::System);
    }

    pub fn is_armed(&self) -> bool {
        self.service.is_armed(Channel::System)
    }

    /// Consume the expiry notification, if one arrived.
    pub fn take_expired(&mut self) -> bool {
        self.service
            .waiter(Channel::System)
            .take_if(Event::SystemTimer)
    }

    /// Block until the armed deadline passes.
    pub fn wait(&mut self) {
        while !self.take_expired() {
            H::wait_for_event();
        }
    }
}

/// Handle for the RTC interrupt.
pub struct TimerIrq<'a, H> {
    service: &'a TimerService<H>,
}

impl<H: CompareHardware> TimerIrq<'_, H> {
    /// Resolve a timer interrupt. Each qualifying channel is disarmed and its
    /// owner notified.
    pub fn on_interrupt(&self) -> Fired {
        self.service.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::sim::{SimClock, SimRtc, sim_rtc};
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    /// Stand-in for the RTC0 interrupt: tick the clock and run the handler
    /// whenever the line is high, until `done` is set.
    fn interrupt_context(
        irq: &TimerIrq<'_, SimRtc>,
        clock: &SimClock,
        done: &AtomicBool,
    ) -> Vec<(Fired, u32)> {
        let mut log = Vec::new();
        while !done.load(Ordering::Acquire) {
            if clock.tick() {
                log.push((irq.on_interrupt(), clock.counter()));
            }
            thread::yield_now();
        }
        log
    }

    #[test]
    fn sleep_returns_on_compare_and_leaves_channel_disarmed() {
        let (rtc, clock) = sim_rtc(1_000);
        let mut service = TimerService::new(rtc);
        let (mut user, _system, irq) = service.split();
        let done = AtomicBool::new(false);

        let log = thread::scope(|s| {
            let isr = s.spawn(|| interrupt_context(&irq, &clock, &done));
            user.sleep(100);
            done.store(true, Ordering::Release);
            isr.join().unwrap()
        });

        let start = clock.armed_at(Channel::User);
        assert_eq!(clock.compare(Channel::User), compare_target(start, 100));
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, Fired { user: true, system: false });
        assert_eq!(log[0].1, compare_target(start, 100));
        assert!(!service.is_armed(Channel::User));
    }

    #[test]
    fn stale_notification_does_not_cut_sleep_short() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        service.waiters[Channel::User.index()].post(Event::UserTimer);
        let (mut user, _system, irq) = service.split();
        let done = AtomicBool::new(false);

        let log = thread::scope(|s| {
            let isr = s.spawn(|| interrupt_context(&irq, &clock, &done));
            user.sleep(40);
            done.store(true, Ordering::Release);
            isr.join().unwrap()
        });

        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, compare_target(clock.armed_at(Channel::User), 40));
    }

    #[test]
    fn consecutive_sleeps_each_need_their_own_compare() {
        let (rtc, clock) = sim_rtc(500);
        let mut service = TimerService::new(rtc);
        let (mut user, _system, irq) = service.split();
        let done = AtomicBool::new(false);

        let log = thread::scope(|s| {
            let isr = s.spawn(|| interrupt_context(&irq, &clock, &done));
            user.sleep(10);
            user.sleep_ms(1);
            user.sleep(3);
            done.store(true, Ordering::Release);
            isr.join().unwrap()
        });

        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|(f, _)| f.user && !f.system));
    }

    #[test]
    fn latched_event_on_disarmed_channel_is_ignored() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        clock.latch(Channel::System);
        assert_eq!(irq.on_interrupt(), Fired::default());
        assert!(!system.take_expired());

        system.arm(5);
        system.cancel();
        clock.latch(Channel::System);
        assert_eq!(irq.on_interrupt(), Fired::default());
        assert!(!system.take_expired());
    }

    #[test]
    fn system_channel_is_one_shot() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        system.arm(10);
        assert!(system.is_armed());
        assert!(!clock.advance(9));
        assert!(clock.advance(1));
        assert_eq!(irq.on_interrupt(), Fired { user: false, system: true });
        assert!(!system.is_armed());
        assert!(system.take_expired());
        assert!(!system.take_expired());

        // Pass the same compare value again without re-arming.
        clock.set_counter(9);
        assert!(!clock.advance(1));
        assert!(!clock.is_pending(Channel::System));
        assert_eq!(irq.on_interrupt(), Fired::default());
    }

    #[test]
    fn cancel_is_idempotent_and_suppresses_the_wake() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        system.cancel();
        system.arm(8);
        system.cancel();
        system.cancel();
        assert!(!clock.advance(20));
        assert_eq!(irq.on_interrupt(), Fired::default());
        assert!(!system.take_expired());
    }

    #[test]
    fn compare_target_wraps_at_24_bits() {
        let (rtc, clock) = sim_rtc(COUNTER_MASK - 5);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        system.arm(10);
        assert_eq!(clock.compare(Channel::System), 4);
        assert!(clock.advance(10));
        assert_eq!(clock.counter(), 4);
        assert!(irq.on_interrupt().system);
    }

    #[test]
    fn system_expiry_does_not_wake_the_user_flow() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        let (mut user, mut system, irq) = service.split();
        let done = AtomicBool::new(false);

        system.arm(20);
        let log = thread::scope(|s| {
            let isr = s.spawn(|| interrupt_context(&irq, &clock, &done));
            user.sleep(60);
            done.store(true, Ordering::Release);
            isr.join().unwrap()
        });

        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, Fired { user: false, system: true });
        assert_eq!(log[1].0, Fired { user: true, system: false });
        assert!(log[0].1 < log[1].1);
        assert!(system.take_expired());
    }

    #[test]
    fn rearming_replaces_the_pending_deadline() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        system.arm(5);
        system.arm(50);
        assert!(!clock.advance(49));
        assert!(clock.advance(1));
        assert!(irq.on_interrupt().system);
    }

    #[test]
    fn one_second_is_within_tolerance_and_deterministic() {
        let ticks = ms_to_ticks(1000);
        assert_eq!(ticks, 32_767);
        assert_eq!(ticks, ms_to_ticks(1000));
        let exact = 32_768;
        assert!(exact - ticks <= 1 + 1000 / 2300);
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(u32::MAX), u32::MAX);
    }

    #[test]
    fn zero_tick_sleep_waits_for_the_next_tick() {
        let (rtc, clock) = sim_rtc(200);
        let mut service = TimerService::new(rtc);
        let (mut user, _system, irq) = service.split();
        let done = AtomicBool::new(false);

        let log = thread::scope(|s| {
            let isr = s.spawn(|| interrupt_context(&irq, &clock, &done));
            user.sleep(0);
            done.store(true, Ordering::Release);
            isr.join().unwrap()
        });

        assert_eq!(log.len(), 1);
        assert!(log[0].0.user);
        assert_eq!(log[0].1, compare_target(clock.armed_at(Channel::User), 1));
    }

    #[test]
    fn zero_tick_arm_fires_on_the_next_tick() {
        let (rtc, clock) = sim_rtc(COUNTER_MASK);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        system.arm(0);
        assert_eq!(clock.compare(Channel::System), 0);
        assert!(clock.tick());
        assert!(irq.on_interrupt().system);
        assert!(system.take_expired());
    }

    #[test]
    fn arm_beyond_one_counter_period_rearms_for_the_remainder() {
        let (rtc, clock) = sim_rtc(500);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        system.arm(COUNTER_MASK + 100);
        assert_eq!(clock.compare(Channel::System), 499);

        // One full period later: re-armed, not expired.
        assert!(clock.skip_to_compare(Channel::System));
        assert!(clock.tick());
        assert_eq!(irq.on_interrupt(), Fired::default());
        assert!(system.is_armed());
        assert!(!system.take_expired());
        assert_eq!(clock.compare(Channel::System), 599);

        assert!(!clock.advance(99));
        assert!(clock.tick());
        assert!(irq.on_interrupt().system);
        assert!(system.take_expired());
        assert!(!system.is_armed());
    }

    #[test]
    fn short_rearm_replaces_a_long_deadline() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();

        system.arm(u32::MAX);
        system.arm(5);
        assert!(clock.advance(5));
        assert!(irq.on_interrupt().system);
        assert!(system.take_expired());
        assert!(!system.is_armed());
    }

    #[test]
    fn long_sleep_returns_only_after_the_full_delay() {
        let (rtc, clock) = sim_rtc(1_000);
        let mut service = TimerService::new(rtc);
        let (mut user, _system, irq) = service.split();
        let done = AtomicBool::new(false);

        let log = thread::scope(|s| {
            let isr = s.spawn(|| {
                let mut log = Vec::new();
                while !done.load(Ordering::Acquire) {
                    if clock.skip_to_compare(Channel::User) && clock.tick() {
                        log.push((irq.on_interrupt(), clock.counter()));
                    }
                    thread::yield_now();
                }
                log
            });
            user.sleep(COUNTER_MASK + 50);
            done.store(true, Ordering::Release);
            isr.join().unwrap()
        });

        // COUNTER_MASK ticks to 999, then 50 more.
        assert_eq!(
            log,
            [(Fired::default(), 999), (Fired { user: true, system: false }, 1_049)]
        );
    }

    #[test]
    fn system_wait_blocks_until_the_compare_fires() {
        let (rtc, clock) = sim_rtc(0);
        let mut service = TimerService::new(rtc);
        let (_user, mut system, irq) = service.split();
        let done = AtomicBool::new(false);

        system.arm(30);
        let (log, woke_at) = thread::scope(|s| {
            let isr = s.spawn(|| interrupt_context(&irq, &clock, &done));
            system.wait();
            let woke_at = clock.counter();
            done.store(true, Ordering::Release);
            (isr.join().unwrap(), woke_at)
        });

        assert_eq!(log, [(Fired { user: false, system: true }, 30)]);
        assert!(woke_at >= 30);
        assert!(!system.is_armed());
        // The wait consumed the notification.
        assert!(!system.take_expired());
    }
}
