use std::time::{Duration, Instant};

/// Leading-edge debounce: the first event fires, later events are dropped until
/// more than `window` has passed since the last accepted one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_trigger: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_trigger: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if an event at `now` should fire a run cycle.
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_trigger
            && now.saturating_duration_since(last) <= self.window
        {
            return false;
        }
        self.last_trigger = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(3);

    #[test]
    fn test_first_event_fires() {
        let mut debouncer = Debouncer::new(WINDOW);
        assert!(debouncer.accept(Instant::now()));
    }

    #[test]
    fn test_burst_within_window_fires_once() {
        let mut debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();
        let fired = [0, 10, 250, 1500, 2999]
            .into_iter()
            .filter(|ms| debouncer.accept(t0 + Duration::from_millis(*ms)))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_event_just_past_window_fires() {
        let mut debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();
        assert!(debouncer.accept(t0));
        assert!(debouncer.accept(t0 + WINDOW + Duration::from_millis(1)));
    }

    #[test]
    fn test_event_exactly_at_window_is_dropped() {
        let mut debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();
        assert!(debouncer.accept(t0));
        assert!(!debouncer.accept(t0 + WINDOW));
    }

    #[test]
    fn test_dropped_events_do_not_extend_window() {
        let mut debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();
        assert!(debouncer.accept(t0));
        assert!(!debouncer.accept(t0 + Duration::from_secs(2)));
        // measured from the last accepted trigger, not the last event
        assert!(debouncer.accept(t0 + Duration::from_millis(3001)));
    }

    #[test]
    fn test_zero_window_accepts_distinct_instants() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(debouncer.accept(t0));
        assert!(!debouncer.accept(t0));
        assert!(debouncer.accept(t0 + Duration::from_nanos(1)));
    }
}
