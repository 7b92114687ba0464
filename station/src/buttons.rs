//! Debounced press capture. Edge handlers only touch atomics here, all reactions to a press
//! happen later in the input task.

use embassy_time::{Duration, Instant};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

pub struct ButtonState {
    /// Low 32 bits of the uptime in ms, compared with wrapping arithmetic.
    last_press_ms: AtomicU32,
    pressed_once: AtomicBool,
    pending: AtomicBool,
}

impl ButtonState {
    pub const fn new() -> Self {
        Self {
            last_press_ms: AtomicU32::new(0),
            pressed_once: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    /// Records an edge seen at `now`. Returns whether it counted as a new press.
    pub fn edge(&self, now: Instant, debounce: Duration) -> bool {
        let now_ms = now.as_millis() as u32;
        if self.pressed_once.load(Ordering::Relaxed) {
            let elapsed = now_ms.wrapping_sub(self.last_press_ms.load(Ordering::Relaxed));
            if u64::from(elapsed) <= debounce.as_millis() {
                return false;
            }
        }

        self.last_press_ms.store(now_ms, Ordering::Relaxed);
        self.pressed_once.store(true, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
        true
    }

    /// Clears the pending press, returning whether there was one.
    pub fn take_press(&self) -> bool {
        self.pending.swap(false, Ordering::Acquire)
    }
}

impl Default for ButtonState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(50);

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn bounces_collapse_into_one_press() {
        let button = ButtonState::new();
        assert!(button.edge(at(1000), DEBOUNCE));
        assert!(!button.edge(at(1010), DEBOUNCE));
        assert!(!button.edge(at(1049), DEBOUNCE));

        assert!(button.take_press());
        assert!(!button.take_press());
    }

    #[test]
    fn separated_edges_are_two_presses() {
        let button = ButtonState::new();
        assert!(button.edge(at(1000), DEBOUNCE));
        assert!(button.take_press());
        assert!(button.edge(at(1080), DEBOUNCE));
        assert!(button.take_press());
    }

    #[test]
    fn window_is_exclusive() {
        let button = ButtonState::new();
        assert!(button.edge(at(2000), DEBOUNCE));
        assert!(!button.edge(at(2050), DEBOUNCE));
        assert!(button.edge(at(2051), DEBOUNCE));
    }

    #[test]
    fn bounces_do_not_extend_the_window() {
        let button = ButtonState::new();
        assert!(button.edge(at(0), DEBOUNCE));
        assert!(!button.edge(at(40), DEBOUNCE));
        assert!(button.edge(at(60), DEBOUNCE));
    }

    #[test]
    fn unhandled_presses_coalesce() {
        let button = ButtonState::new();
        assert!(button.edge(at(100), DEBOUNCE));
        assert!(button.edge(at(300), DEBOUNCE));
        assert!(button.take_press());
        assert!(!button.take_press());
    }

    #[test]
    fn buttons_are_independent() {
        let mode = ButtonState::new();
        let backlight = ButtonState::new();
        assert!(mode.edge(at(500), DEBOUNCE));
        assert!(backlight.edge(at(510), DEBOUNCE));
        assert!(mode.take_press());
        assert!(!mode.take_press());
        assert!(backlight.take_press());
    }

    #[test]
    fn uptime_wraparound() {
        let button = ButtonState::new();
        let before_wrap = u64::from(u32::MAX) - 20;
        assert!(button.edge(at(before_wrap), DEBOUNCE));
        assert!(!button.edge(at(before_wrap + 30), DEBOUNCE));
        assert!(button.edge(at(before_wrap + 100), DEBOUNCE));
    }
}
