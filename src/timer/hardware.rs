/// Width mask of the real-time counter and its compare registers.
pub const COUNTER_MASK: u32 = (1 << 24) - 1;

/// The two compare channels of the real-time counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Channel {
    /// Owned by the pipeline flow, used for blocking sleeps.
    User = 0,
    /// Owned by the housekeeping flow, armed fire-and-forget.
    System = 1,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::User, Channel::System];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Absolute compare value `ticks` after `counter`, wrapped to 24 bits.
pub const fn compare_target(counter: u32, ticks: u32) -> u32 {
    counter.wrapping_add(ticks) & COUNTER_MASK
}

/// Register-level view of a free-running counter with two compare channels.
///
/// Implementations only touch registers; sequencing and the interrupt
/// protocol belong to [`TimerService`](super::TimerService).
pub trait CompareHardware {
    /// Smallest distance ahead of the counter at which a compare still matches.
    /// A compare equal to the counter only matches after a full wrap, so this
    /// is at least one.
    const MIN_DELTA: u32 = 1;

    fn counter(&self) -> u32;

    fn set_compare(&mut self, channel: Channel, target: u32);

    /// Enable the compare event and its interrupt.
    fn arm(&mut self, channel: Channel);

    /// Disable the compare event and its interrupt.
    fn disarm(&mut self, channel: Channel);

    /// Event flag latched by a compare match.
    fn is_pending(&self, channel: Channel) -> bool;

    fn clear_pending(&mut self, channel: Channel);

    /// Interrupt-enable bit of the channel.
    fn is_armed(&self, channel: Channel) -> bool;

    /// Park the calling flow until an interrupt may have delivered a
    /// notification. Spurious returns are allowed.
    fn wait_for_event();
}
