use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;

/// Source tag carried by a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[repr(u8)]
pub enum Event {
    UserTimer = 1,
    SystemTimer = 2,
}

impl Event {
    #[cfg(test)]
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Event::UserTimer),
            2 => Some(Event::SystemTimer),
            _ => None,
        }
    }
}

/// Single-capacity notification cell. A post always succeeds and replaces
/// whatever was unread.
pub struct NotificationSlot {
    value: AtomicU8,
}

impl NotificationSlot {
    pub const fn new() -> Self {
        Self {
            value: AtomicU8::new(EMPTY),
        }
    }

    pub fn post(&self, event: Event) {
        self.value.store(event as u8, Ordering::Release);
    }

    pub fn clear(&self) {
        self.value.store(EMPTY, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn peek(&self) -> Option<Event> {
        Event::from_raw(self.value.load(Ordering::Acquire))
    }

    #[cfg(test)]
    pub(crate) fn take(&self) -> Option<Event> {
        Event::from_raw(self.value.swap(EMPTY, Ordering::AcqRel))
    }

    /// Consume the slot only if it holds `event`.
    pub fn take_if(&self, event: Event) -> bool {
        self.value
            .compare_exchange(event as u8, EMPTY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for NotificationSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_post_wins() {
        let slot = NotificationSlot::new();
        slot.post(Event::UserTimer);
        slot.post(Event::SystemTimer);
        assert_eq!(slot.take(), Some(Event::SystemTimer));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn take_if_leaves_other_tags_in_place() {
        let slot = NotificationSlot::new();
        slot.post(Event::SystemTimer);
        assert!(!slot.take_if(Event::UserTimer));
        assert_eq!(slot.peek(), Some(Event::SystemTimer));
        assert!(slot.take_if(Event::SystemTimer));
        assert_eq!(slot.peek(), None);
    }

    #[test]
    fn clear_drops_unread_value() {
        let slot = NotificationSlot::new();
        slot.post(Event::UserTimer);
        slot.clear();
        assert!(!slot.take_if(Event::UserTimer));
    }
}
