use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{GenerativeSession, extract_candidate};
use crate::error::PipelineError;
use crate::models::Candidate;

/// Polling parameters for [`ResponseStabilizer`]
#[derive(Debug, Clone)]
pub struct StabilizerConfig {
    /// Time between observations
    pub poll_interval: Duration,
    /// Overall budget before giving up
    pub deadline: Duration,
    /// Consecutive identical observations needed to accept a complete candidate
    pub stable_checks: u32,
    /// On timeout, the best candidate is used only if longer than this (in chars)
    pub min_fallback_len: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            deadline: Duration::from_secs(600),
            stable_checks: 3,
            min_fallback_len: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerState {
    /// Observing; the latest candidate differs from the one before it
    Polling,
    /// The latest candidate has been seen N times in a row
    Stable(u32),
    Accepted,
    TimedOut,
}

/// Decides when a streaming answer is final
///
/// Tracks the previous observation and the longest candidate seen. A
/// complete candidate observed `stable_checks` times in a row is accepted at
/// once, even if a longer one was seen earlier.
#[derive(Debug)]
pub struct ResponseStabilizer {
    config: StabilizerConfig,
    state: StabilizerState,
    last: Option<String>,
    best: Option<Candidate>,
    stable: u32,
    ticks: u64,
}

impl ResponseStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            state: StabilizerState::Polling,
            last: None,
            best: None,
            stable: 0,
            ticks: 0,
        }
    }

    pub fn state(&self) -> StabilizerState {
        self.state
    }

    /// Longest candidate observed so far
    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    /// Feed one tick's observation; returns the candidate once accepted
    ///
    /// A tick with no candidate changes nothing.
    pub fn observe(&mut self, candidate: Option<Candidate>) -> Option<Candidate> {
        self.ticks += 1;
        let candidate = candidate?;

        if self.best.as_ref().is_none_or(|b| candidate.len >= b.len) {
            self.best = Some(candidate.clone());
        }

        if self.last.as_deref() == Some(candidate.text.as_str()) {
            self.stable += 1;
        } else {
            self.stable = 1;
            self.last = Some(candidate.text.clone());
        }

        debug!(
            "Tick {}: {} chars, complete={}, stable={}",
            self.ticks, candidate.len, candidate.complete, self.stable
        );

        if candidate.complete && self.stable >= self.config.stable_checks {
            self.state = StabilizerState::Accepted;
            return Some(candidate);
        }
        self.state = if self.stable > 1 {
            StabilizerState::Stable(self.stable)
        } else {
            StabilizerState::Polling
        };
        None
    }

    /// Resolve a deadline: the best candidate if complete and long enough, else a timeout error
    pub fn expire(&mut self, waited: Duration) -> Result<Candidate, PipelineError> {
        self.state = StabilizerState::TimedOut;
        let best_len = self.best.as_ref().map_or(0, |b| b.len);

        match self.best.take() {
            Some(best) if best.complete && best.len > self.config.min_fallback_len => {
                warn!(
                    "No stable answer after {}s, falling back to best candidate ({} chars)",
                    waited.as_secs(),
                    best.len
                );
                Ok(best)
            }
            _ => Err(PipelineError::StabilizationTimeout {
                waited_secs: waited.as_secs(),
                best_len,
            }),
        }
    }

    /// Poll `session` until an answer is accepted or the deadline passes
    ///
    /// An observation error from the session is terminal.
    pub async fn run<C: GenerativeSession + ?Sized>(
        &mut self,
        session: &mut C,
    ) -> Result<Candidate, PipelineError> {
        let started = Instant::now();
        let deadline = started + self.config.deadline;

        while Instant::now() < deadline {
            let raw = session.observe()?;
            let candidate = raw.as_deref().and_then(extract_candidate).map(Candidate::new);
            if let Some(accepted) = self.observe(candidate) {
                info!(
                    "Answer accepted after {} ticks ({} chars)",
                    self.ticks, accepted.len
                );
                return Ok(accepted);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        self.expire(started.elapsed())
    }
}
