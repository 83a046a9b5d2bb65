use std::time::Duration;

use tokio::time::Instant;

pub const TYPING_SEND_INTERVAL: Duration = Duration::from_secs(2);
pub const TYPING_DISPLAY_TIMEOUT: Duration = Duration::from_secs(3);

/// Collapses keystrokes into at most one typing signal per interval.
#[derive(Debug)]
pub struct TypingThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl TypingThrottle {
    pub fn new() -> Self {
        Self::with_interval(TYPING_SEND_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Returns true when a signal should go out for a keystroke at `now`.
    pub fn should_send(&mut self, now: Instant) -> bool {
        let due = match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if due {
            self.last_sent = Some(now);
        }
        due
    }
}

impl Default for TypingThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// "X is typing" flag that expires unless renewed.
#[derive(Debug)]
pub struct TypingIndicator {
    timeout: Duration,
    current: Option<(String, Instant)>,
}

impl TypingIndicator {
    pub fn new() -> Self {
        Self::with_timeout(TYPING_DISPLAY_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            current: None,
        }
    }

    pub fn signal(&mut self, user: &str, now: Instant) {
        self.current = Some((user.to_string(), now + self.timeout));
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn typing_user(&self, now: Instant) -> Option<&str> {
        match &self.current {
            Some((user, deadline)) if now < *deadline => Some(user.as_str()),
            _ => None,
        }
    }

    /// When the flag will lapse, for scheduling a redraw.
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|(_, deadline)| *deadline)
    }
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystrokes_within_interval_collapse() {
        let start = Instant::now();
        let mut throttle = TypingThrottle::new();

        assert!(throttle.should_send(start));
        assert!(!throttle.should_send(start + Duration::from_millis(500)));
        assert!(!throttle.should_send(start + Duration::from_millis(1999)));
        assert!(!throttle.should_send(start + Duration::from_secs(2)));
        assert!(throttle.should_send(start + Duration::from_millis(2001)));
        assert!(!throttle.should_send(start + Duration::from_millis(3000)));
    }

    #[test]
    fn indicator_clears_after_timeout() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::new();
        assert_eq!(indicator.typing_user(start), None);

        indicator.signal("bob", start);
        assert_eq!(indicator.typing_user(start + Duration::from_millis(2900)), Some("bob"));
        assert_eq!(indicator.typing_user(start + Duration::from_secs(3)), None);
    }

    #[test]
    fn renewal_pushes_deadline() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::new();

        indicator.signal("bob", start);
        indicator.signal("bob", start + Duration::from_secs(2));
        assert_eq!(indicator.typing_user(start + Duration::from_secs(4)), Some("bob"));
        assert_eq!(indicator.deadline(), Some(start + Duration::from_secs(5)));
        assert_eq!(indicator.typing_user(start + Duration::from_secs(5)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn indicator_follows_paused_clock() {
        let mut indicator = TypingIndicator::new();
        indicator.signal("carol", Instant::now());

        tokio::time::advance(Duration::from_millis(2500)).await;
        assert_eq!(indicator.typing_user(Instant::now()), Some("carol"));

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(indicator.typing_user(Instant::now()), None);
    }
}
