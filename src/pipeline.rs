use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{Instrument, info, info_span, warn};

use crate::editor::{EditorSession, RetryPolicy, SessionGuard};
use crate::error::PipelineError;
use crate::heuristics::FinishingResult;
use crate::io::{
    FailureRecord, StagingConfig, backup_original, find_documents, output_path,
    write_failure_report,
};
use crate::llm::GenerativeSession;
use crate::models::Degradation;
use crate::stages::{
    Stage0Config, Stage1Config, Stage2Config, Stage3Config, execute_stage0, execute_stage1,
    execute_stage2, execute_stage3,
};

/// Everything that parameterizes a batch
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub staging: StagingConfig,
    pub stage0: Stage0Config,
    pub stage1: Stage1Config,
    pub stage2: Stage2Config,
    pub stage3: Stage3Config,
}

/// A document that made it through the whole pipeline
#[derive(Debug)]
pub struct DocumentOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Where the original now lives
    pub backup: PathBuf,
    /// Staging area, if kept for inspection
    pub staging_dir: Option<PathBuf>,
    pub finishing: FinishingResult,
    /// Recoverable problems met along the way
    pub diagnostics: Vec<Degradation>,
}

/// Outcome of a batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: Vec<DocumentOutcome>,
    pub failures: Vec<FailureRecord>,
    /// Stopped early on user request
    pub cancelled: bool,
    /// Failure report, when one was written
    pub report: Option<PathBuf>,
}

/// Run one document through export, generation, reconciliation and finishing
///
/// The editing session is held only while exporting and while finishing,
/// and released on every exit path.
pub async fn process_document<S: EditorSession, C: GenerativeSession>(
    editor: &mut S,
    chat: &mut C,
    source: &Path,
    config: &PipelineConfig,
    run_id: &str,
) -> Result<DocumentOutcome> {
    let stage0 = {
        let mut session = SessionGuard::acquire(editor, &config.retry)
            .map_err(PipelineError::from)
            .context("Failed to start editing session")?;
        execute_stage0(
            &mut *session,
            &config.retry,
            source,
            &config.staging,
            &config.stage0,
            run_id,
        )?
    };
    let mut diagnostics = stage0.diagnostics;

    let stage1 = execute_stage1(
        chat,
        stage0.staging.path(),
        &stage0.submission,
        &config.stage1,
    )
    .await?;

    let stage2 = execute_stage2(
        &stage1.markup,
        &stage0.staging,
        &stage0.exported.assets_dir,
        &config.stage2,
    )?;
    diagnostics.extend(stage2.diagnostics);

    let backup = backup_original(source, &config.staging)?;

    let stage3 = {
        let mut session = SessionGuard::acquire(editor, &config.retry)
            .map_err(PipelineError::from)
            .context("Failed to start editing session")?;
        let output = output_path(source, session.output_extension());
        execute_stage3(
            &mut *session,
            &config.retry,
            &stage2.markup_path,
            &output,
            &config.stage3,
        )
        .with_context(|| format!("Original was moved to {:?}", backup))?
    };

    Ok(DocumentOutcome {
        source: source.to_path_buf(),
        output: stage3.output_path,
        backup,
        staging_dir: config
            .staging
            .keep_staging
            .then(|| stage0.staging.path().to_path_buf()),
        finishing: stage3.finishing,
        diagnostics,
    })
}

/// Process every document found under `inputs`, one at a time
///
/// A failing document is recorded and the batch moves on. `cancel` is
/// checked between documents only. When anything failed, a report is
/// written next to the first input.
pub async fn process_batch<S: EditorSession, C: GenerativeSession>(
    editor: &mut S,
    chat: &mut C,
    inputs: &[PathBuf],
    config: &PipelineConfig,
    cancel: &AtomicBool,
) -> Result<BatchSummary> {
    let documents = find_documents(
        inputs,
        editor.input_extensions(),
        &[config.staging.backup_folder.as_str()],
        &[config.staging.work_prefix.as_str(), "redraft_export"],
    )?;
    let mut summary = BatchSummary::default();

    if documents.is_empty() {
        warn!("No documents found");
        return Ok(summary);
    }

    let total = documents.len();
    for (index, source) in documents.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            warn!("Cancelled; {} document(s) not processed", total - index);
            summary.cancelled = true;
            break;
        }

        let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        info!("Processing {}/{}: {:?}", index + 1, total, source);

        let span = info_span!("document", run = %run_id);
        match process_document(editor, chat, source, config, &run_id)
            .instrument(span)
            .await
        {
            Ok(outcome) => {
                info!("Saved {:?}", outcome.output);
                summary.processed.push(outcome);
            }
            Err(e) => {
                warn!("Skipped {:?}: {:#}", source, e);
                summary.failures.push(FailureRecord::from_error(source, &e));
            }
        }
    }

    match write_failure_report(&summary.failures, inputs, &config.staging.report_prefix) {
        Ok(report) => summary.report = report,
        Err(e) => warn!("Could not write failure report: {:#}", e),
    }

    info!(
        "Batch complete: {} processed, {} skipped",
        summary.processed.len(),
        summary.failures.len()
    );
    if let Some(report) = &summary.report {
        info!("Failure report: {:?}", report);
    }

    Ok(summary)
}
