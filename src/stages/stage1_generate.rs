use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::info;

use crate::llm::{ChatGuard, GenerativeSession, ResponseStabilizer, StabilizerConfig};

/// Configuration for Stage 1
#[derive(Debug, Clone, Default)]
pub struct Stage1Config {
    pub stabilizer: StabilizerConfig,
}

/// Result of Stage 1
#[derive(Debug)]
pub struct Stage1Result {
    /// Accepted generated document
    pub markup: String,
    /// Time spent waiting for the answer
    pub waited: Duration,
}

/// Execute Stage 1: submit and wait for a stable answer
///
/// The session is started for this submission only and stopped on every
/// exit path. Failures here are never retried.
pub async fn execute_stage1<C: GenerativeSession>(
    chat: &mut C,
    workspace: &Path,
    submission: &str,
    config: &Stage1Config,
) -> Result<Stage1Result> {
    let started = Instant::now();
    let mut session = ChatGuard::start(chat, workspace).context("Failed to start chat session")?;
    session.submit(submission).context("Failed to submit")?;

    let mut stabilizer = ResponseStabilizer::new(config.stabilizer.clone());
    let accepted = stabilizer
        .run(&mut *session)
        .await
        .context("No usable answer")?;

    let waited = started.elapsed();
    info!(
        "Stage 1: accepted {} chars after {:.1}s",
        accepted.len,
        waited.as_secs_f64()
    );

    Ok(Stage1Result {
        markup: accepted.text,
        waited,
    })
}
