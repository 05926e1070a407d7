use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::editor::{EditorSession, ExportedMarkup, RetryPolicy};
use crate::error::PipelineError;
use crate::io::{StagingArea, StagingConfig, read_markup, short_base};
use crate::llm::package_for_generation;
use crate::markup::{AssetRebaser, extract_body};
use crate::models::{Degradation, Filtered};

/// Configuration for Stage 0
#[derive(Debug, Clone)]
pub struct Stage0Config {
    /// Directory receiving the editor's temporary exports
    pub export_root: PathBuf,
}

impl Default for Stage0Config {
    fn default() -> Self {
        Self {
            export_root: std::env::temp_dir(),
        }
    }
}

/// Result of Stage 0
#[derive(Debug)]
pub struct Stage0Result {
    /// Temporary export; removed when dropped
    pub export: StagingArea,
    pub exported: ExportedMarkup,
    /// Private working directory of this run
    pub staging: StagingArea,
    /// Preamble plus rebased body, ready to submit
    pub submission: String,
    /// Files copied from the export's asset directory up front
    pub assets_seeded: usize,
    pub diagnostics: Vec<Degradation>,
}

/// Rebase body markup into `target_dir` and wrap it for submission
///
/// Assets are resolved against `assets_dir`.
pub fn package_body(body: &str, target_dir: &Path, assets_dir: &Path) -> Filtered<String> {
    let report = AssetRebaser::outbound(target_dir, assets_dir).rebase(body);
    info!(
        "Outbound assets: {} rewritten, {} copied, {} unresolved",
        report.rewritten,
        report.copied,
        report.unresolved.len()
    );
    let rebased = report.into_filtered();
    Filtered {
        value: package_for_generation(&rebased.value),
        diagnostic: rebased.diagnostic,
    }
}

/// Execute Stage 0: export and prepare the submission
///
/// 1. Export the source through the editing interface
/// 2. Keep only the body, without style, script, link or comments
/// 3. Create the staging area and seed it with the exported assets
/// 4. Point every asset reference into the staging area
/// 5. Wrap the body in the conversion preamble
pub fn execute_stage0<S: EditorSession>(
    editor: &mut S,
    retry: &RetryPolicy,
    source: &Path,
    staging_config: &StagingConfig,
    config: &Stage0Config,
    run_id: &str,
) -> Result<Stage0Result> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let export = StagingArea::scratch(
        config
            .export_root
            .join(format!("redraft_export_{}_{}", short_base(&stem), run_id)),
    )?;

    let exported = retry
        .call(editor, |e| e.export_markup(source, export.path()))
        .map_err(PipelineError::from)
        .with_context(|| format!("Failed to export {:?}", source))?;
    info!("Exported to {:?}", exported.markup_path);

    let full_markup = read_markup(&exported.markup_path)?;
    let mut diagnostics = Vec::new();

    let body = extract_body(&full_markup);
    if let Some(d) = &body.diagnostic {
        warn!("Sanitizer: {}", d);
    }
    diagnostics.extend(body.diagnostic);

    let staging = StagingArea::create(source, &exported.short_base, staging_config)?;
    let assets_seeded = staging.seed(&exported.assets_dir)?;

    let packaged = package_body(&body.value, staging.path(), &exported.assets_dir);
    if let Some(d) = &packaged.diagnostic {
        warn!("Outbound rebase: {}", d);
    }
    diagnostics.extend(packaged.diagnostic);

    info!(
        "Stage 0: {} chars to submit, {} assets staged in {:?}",
        packaged.value.chars().count(),
        assets_seeded,
        staging.path()
    );

    Ok(Stage0Result {
        export,
        exported,
        staging,
        submission: packaged.value,
        assets_seeded,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::HtmlEditor;
    use crate::llm::BEGIN_MARKER;

    #[test]
    fn test_stage0_prepares_submission() {
        let docs = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let source = docs.path().join("Guide.html");
        std::fs::write(
            &source,
            r#"<html><head><style>p { color: red }</style></head><body>
<!-- exported -->
<p>Hello</p><img src="Guide_files/image001.png"><img src="data:image/png;base64,AAAA">
</body></html>"#,
        )
        .unwrap();
        std::fs::create_dir(docs.path().join("Guide_files")).unwrap();
        std::fs::write(docs.path().join("Guide_files/image001.png"), b"png").unwrap();

        let mut editor = HtmlEditor::new();
        editor.acquire().unwrap();
        let config = Stage0Config {
            export_root: temp.path().to_path_buf(),
        };

        let result = execute_stage0(
            &mut editor,
            &RetryPolicy::default(),
            &source,
            &StagingConfig::default(),
            &config,
            "run1",
        )
        .unwrap();

        assert!(result.diagnostics.is_empty());
        assert_eq!(result.assets_seeded, 1);
        assert!(result.staging.path().join("image001.png").is_file());
        assert!(result.submission.contains(BEGIN_MARKER));
        assert!(result.submission.contains(r#"<img src="image001.png">"#));
        assert!(result.submission.contains(r#"src="data:image/png;base64,AAAA""#));
        assert!(!result.submission.contains("color: red"));
        assert!(!result.submission.contains("exported -->"));

        let export_dir = result.export.path().to_path_buf();
        drop(result);
        assert!(!export_dir.exists());
    }

    #[test]
    fn test_stage0_seeds_nothing_without_assets() {
        let docs = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let source = docs.path().join("Plain.html");
        std::fs::write(&source, "<html><body><p>Text only</p></body></html>").unwrap();

        let mut editor = HtmlEditor::new();
        editor.acquire().unwrap();
        let result = execute_stage0(
            &mut editor,
            &RetryPolicy::default(),
            &source,
            &StagingConfig::default(),
            &Stage0Config {
                export_root: temp.path().to_path_buf(),
            },
            "run3",
        )
        .unwrap();

        assert_eq!(result.assets_seeded, 0);
        assert_eq!(std::fs::read_dir(result.staging.path()).unwrap().count(), 0);
        assert!(result.submission.contains("<p>Text only</p>"));
    }

    #[test]
    fn test_stage0_export_failure() {
        let docs = tempfile::tempdir().unwrap();
        let source = docs.path().join("legacy.doc");
        std::fs::write(&source, b"binary").unwrap();

        let mut editor = HtmlEditor::new();
        editor.acquire().unwrap();
        let err = execute_stage0(
            &mut editor,
            &RetryPolicy::default(),
            &source,
            &StagingConfig::default(),
            &Stage0Config {
                export_root: docs.path().to_path_buf(),
            },
            "run2",
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Interface(_))
        ));
    }
}
