use std::time::Duration;

use tracing::{debug, warn};

use super::{EditorError, MessagePump};

/// Bounded exponential backoff for calls into the editing interface
///
/// Only [`EditorError::CallRejected`] and [`EditorError::RetryLater`] are
/// retried. Every other failure propagates on the attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Wait after the first failed attempt
    pub initial_delay: Duration,
    /// Growth factor applied after each failed attempt
    pub multiplier: f64,
    /// Upper bound on any single wait
    pub max_delay: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            multiplier: 1.5,
            max_delay: Duration::from_millis(1500),
            max_attempts: 50,
        }
    }
}

impl RetryPolicy {
    /// Waits taken after each failed attempt, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let first = self.initial_delay.min(self.max_delay);
        std::iter::successors(Some(first), move |prev| {
            Some(prev.mul_f64(self.multiplier).min(self.max_delay))
        })
        .take(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Invoke `op` until it succeeds, fails permanently, or the budget runs out
    ///
    /// Between attempts the target's pending messages are drained before
    /// sleeping. When the budget runs out the last transient error is returned.
    pub fn call<S, T, F>(&self, target: &mut S, mut op: F) -> Result<T, EditorError>
    where
        S: MessagePump + ?Sized,
        F: FnMut(&mut S) -> Result<T, EditorError>,
    {
        let mut delays = self.delays();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op(target) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Editing interface call succeeded on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => match delays.next() {
                    Some(delay) => {
                        debug!(
                            "Editing interface busy ({}), attempt {} of {}, waiting {:?}",
                            e, attempt, self.max_attempts, delay
                        );
                        target.pump_waiting_messages();
                        std::thread::sleep(delay);
                    }
                    None => {
                        warn!(
                            "Editing interface still busy after {} attempts: {}",
                            attempt, e
                        );
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails transiently a fixed number of times, then succeeds
    struct Flaky {
        failures_left: u32,
        calls: u32,
        pumped: u32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: failures,
                calls: 0,
                pumped: 0,
            }
        }

        fn poke(&mut self) -> Result<&'static str, EditorError> {
            self.calls += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                if self.calls % 2 == 0 {
                    return Err(EditorError::RetryLater);
                }
                return Err(EditorError::CallRejected);
            }
            Ok("done")
        }
    }

    impl MessagePump for Flaky {
        fn pump_waiting_messages(&mut self) {
            self.pumped += 1;
        }
    }

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<Duration> = policy.delays().collect();

        assert_eq!(delays.len(), 49);
        assert_eq!(delays[0], Duration::from_millis(100));
        assert!((delays[1].as_secs_f64() - 0.150).abs() < 1e-6);
        assert!((delays[2].as_secs_f64() - 0.225).abs() < 1e-6);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(1500)));
        assert_eq!(*delays.last().unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let mut target = Flaky::new(7);
        let result = instant_policy().call(&mut target, |t| t.poke());

        assert_eq!(result.unwrap(), "done");
        assert_eq!(target.calls, 8);
        assert_eq!(target.pumped, 7);
    }

    #[test]
    fn test_succeeds_on_last_attempt() {
        let mut target = Flaky::new(49);
        let result = instant_policy().call(&mut target, |t| t.poke());

        assert!(result.is_ok());
        assert_eq!(target.calls, 50);
    }

    #[test]
    fn test_budget_exhaustion_surfaces_last_error() {
        let mut target = Flaky::new(50);
        let result = instant_policy().call(&mut target, |t| t.poke());

        // The 50th call is even, so the last error is RetryLater
        assert!(matches!(result, Err(EditorError::RetryLater)));
        assert_eq!(target.calls, 50);
    }

    #[test]
    fn test_permanent_error_is_not_retried() {
        let mut target = Flaky::new(0);
        let result: Result<(), _> = instant_policy().call(&mut target, |t| {
            t.calls += 1;
            Err(EditorError::Failed("document is locked".to_string()))
        });

        assert!(matches!(result, Err(EditorError::Failed(_))));
        assert_eq!(target.calls, 1);
        assert_eq!(target.pumped, 0);
    }
}
