//! Host model of the RTC: a counter advanced by the test, compare
//! registers, event flags and the two enable bits per channel.

use std::sync::{Arc, Mutex, MutexGuard};

use super::hardware::{COUNTER_MASK, Channel, CompareHardware};

#[derive(Default)]
struct State {
    counter: u32,
    compare: [u32; 2],
    pending: [bool; 2],
    event_enabled: [bool; 2],
    interrupt_enabled: [bool; 2],
    armed_at: [u32; 2],
}

pub struct SimRtc {
    state: Arc<Mutex<State>>,
}

/// Test-side handle moving time forward.
#[derive(Clone)]
pub struct SimClock {
    state: Arc<Mutex<State>>,
}

pub fn sim_rtc(counter: u32) -> (SimRtc, SimClock) {
    let state = Arc::new(Mutex::new(State {
        counter: counter & COUNTER_MASK,
        ..State::default()
    }));
    (
        SimRtc {
            state: state.clone(),
        },
        SimClock { state },
    )
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimClock {
    /// Advance one tick inside a critical section, the way the counter
    /// appears to the interrupt-masked arm sequence. Returns the level of
    /// the RTC interrupt line.
    pub fn tick(&self) -> bool {
        critical_section::with(|_| {
            let mut s = lock(&self.state);
            s.counter = (s.counter + 1) & COUNTER_MASK;
            for ch in Channel::ALL {
                let i = ch.index();
                if s.event_enabled[i] && s.compare[i] == s.counter {
                    s.pending[i] = true;
                }
            }
            Channel::ALL
                .iter()
                .any(|ch| s.pending[ch.index()] && s.interrupt_enabled[ch.index()])
        })
    }

    /// If the channel is armed, jump to one tick before its compare so the
    /// next [`tick`](Self::tick) matches. Returns whether it was armed.
    pub fn skip_to_compare(&self, channel: Channel) -> bool {
        critical_section::with(|_| {
            let mut s = lock(&self.state);
            let i = channel.index();
            if s.event_enabled[i] {
                s.counter = s.compare[i].wrapping_sub(1) & COUNTER_MASK;
            }
            s.event_enabled[i]
        })
    }

    pub fn advance(&self, ticks: u32) -> bool {
        let mut line = false;
        for _ in 0..ticks {
            line = self.tick();
        }
        line
    }

    pub fn counter(&self) -> u32 {
        lock(&self.state).counter
    }

    pub fn set_counter(&self, counter: u32) {
        lock(&self.state).counter = counter & COUNTER_MASK;
    }

    pub fn compare(&self, channel: Channel) -> u32 {
        lock(&self.state).compare[channel.index()]
    }

    /// Counter value when the channel was last programmed.
    pub fn armed_at(&self, channel: Channel) -> u32 {
        lock(&self.state).armed_at[channel.index()]
    }

    /// Force the event flag, as a match racing a disarm would.
    pub fn latch(&self, channel: Channel) {
        lock(&self.state).pending[channel.index()] = true;
    }

    pub fn is_pending(&self, channel: Channel) -> bool {
        lock(&self.state).pending[channel.index()]
    }
}

impl CompareHardware for SimRtc {
    fn counter(&self) -> u32 {
        lock(&self.state).counter
    }

    fn set_compare(&mut self, channel: Channel, target: u32) {
        let mut s = lock(&self.state);
        s.compare[channel.index()] = target;
        s.armed_at[channel.index()] = s.counter;
    }

    fn arm(&mut self, channel: Channel) {
        let mut s = lock(&self.state);
        s.event_enabled[channel.index()] = true;
        s.interrupt_enabled[channel.index()] = true;
    }

    fn disarm(&mut self, channel: Channel) {
        let mut s = lock(&self.state);
        s.event_enabled[channel.index()] = false;
        s.interrupt_enabled[channel.index()] = false;
    }

    fn is_pending(&self, channel: Channel) -> bool {
        lock(&self.state).pending[channel.index()]
    }

    fn clear_pending(&mut self, channel: Channel) {
        lock(&self.state).pending[channel.index()] = false;
    }

    fn is_armed(&self, channel: Channel) -> bool {
        lock(&self.state).interrupt_enabled[channel.index()]
    }

    fn wait_for_event() {
        std::thread::yield_now();
    }
}
