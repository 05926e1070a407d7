use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::editor::{EditorSession, RetryPolicy};
use crate::error::PipelineError;
use crate::heuristics::{FinishingConfig, FinishingResult, apply_finishing};

/// Configuration for Stage 3
#[derive(Debug, Clone, Default)]
pub struct Stage3Config {
    pub finishing: FinishingConfig,
}

/// Result of Stage 3
#[derive(Debug)]
pub struct Stage3Result {
    /// Saved artifact
    pub output_path: PathBuf,
    pub finishing: FinishingResult,
}

/// Execute Stage 3: import, restructure and save
///
/// Imports the final markup through the editing interface, turns literal
/// list markers into structured lists, applies the finishing passes and
/// saves the artifact at `output_path`.
pub fn execute_stage3<S: EditorSession>(
    editor: &mut S,
    retry: &RetryPolicy,
    markup_path: &Path,
    output_path: &Path,
    config: &Stage3Config,
) -> Result<Stage3Result> {
    let mut document = retry
        .call(editor, |e| e.import_markup(markup_path))
        .map_err(PipelineError::from)
        .with_context(|| format!("Failed to import {:?}", markup_path))?;

    let finishing = apply_finishing(&mut document, retry, &config.finishing)
        .map_err(PipelineError::from)
        .context("Failed to restructure document")?;

    retry
        .call(editor, |e| e.save(&mut document, output_path))
        .map_err(PipelineError::from)
        .with_context(|| format!("Failed to save {:?}", output_path))?;

    info!(
        "Stage 3: {} list paragraphs ({} strip / {} apply failures), {} tables flattened, {} styles fixed, {} links broken",
        finishing.list_paragraphs,
        finishing.strip_failures,
        finishing.apply_failures,
        finishing.tables_flattened,
        finishing.list_styled + finishing.normalized,
        finishing.links_broken
    );

    Ok(Stage3Result {
        output_path: output_path.to_path_buf(),
        finishing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::HtmlEditor;

    #[test]
    fn test_stage3_restructures_lists() {
        let dir = tempfile::tempdir().unwrap();
        let markup = dir.path().join("ai_output.html");
        std::fs::write(
            &markup,
            "<html><body><h1>Steps</h1><p>1. Open</p><p>2. Close</p><p>\u{2022} Tip</p></body></html>",
        )
        .unwrap();
        let output = dir.path().join("out.html");

        let mut editor = HtmlEditor::new();
        editor.acquire().unwrap();
        let result = execute_stage3(
            &mut editor,
            &RetryPolicy::default(),
            &markup,
            &output,
            &Stage3Config::default(),
        )
        .unwrap();

        assert_eq!(result.finishing.list_paragraphs, 3);
        assert_eq!(result.finishing.list_runs, 2);
        let saved = std::fs::read_to_string(&output).unwrap();
        assert!(saved.contains("<ol>\n<li>Open</li>\n<li>Close</li>\n</ol>\n<ul>\n<li>Tip</li>\n</ul>\n"));
    }
}
