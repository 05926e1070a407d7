use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::io::StagingArea;
use crate::markup::{AssetRebaser, LeakFilterConfig, strip_leaked_instructions, unwrap_list_item_paragraphs};
use crate::models::Degradation;

/// Configuration for Stage 2
#[derive(Debug, Clone)]
pub struct Stage2Config {
    pub leak: LeakFilterConfig,
    /// File name of the final markup inside the staging area
    pub final_markup_name: String,
}

impl Default for Stage2Config {
    fn default() -> Self {
        Self {
            leak: LeakFilterConfig::default(),
            final_markup_name: "ai_output.html".to_string(),
        }
    }
}

/// Result of Stage 2
#[derive(Debug)]
pub struct Stage2Result {
    /// Final markup file inside the staging area
    pub markup_path: PathBuf,
    /// References repointed at staged files
    pub assets_rewritten: usize,
    pub diagnostics: Vec<Degradation>,
}

/// Execute Stage 2: clean the generated answer for import
///
/// 1. Remove echoed instruction text
/// 2. Point asset references back at staged files (staging first, then the export)
/// 3. Collapse `<li><p>` items that should not carry a paragraph style
/// 4. Write the result into the staging area
pub fn execute_stage2(
    generated: &str,
    staging: &StagingArea,
    export_assets_dir: &Path,
    config: &Stage2Config,
) -> Result<Stage2Result> {
    let mut diagnostics = Vec::new();

    let filtered = strip_leaked_instructions(generated, &config.leak);
    if let Some(d) = &filtered.diagnostic {
        warn!("Leak filter skipped: {}", d);
    }
    diagnostics.extend(filtered.diagnostic);

    let report = AssetRebaser::inbound(staging.path(), export_assets_dir).rebase(&filtered.value);
    let assets_rewritten = report.rewritten;
    let rebased = report.into_filtered();
    if let Some(d) = &rebased.diagnostic {
        warn!("Inbound rebase: {}", d);
    }
    diagnostics.extend(rebased.diagnostic);

    let prepared = unwrap_list_item_paragraphs(&rebased.value);
    let markup_path = staging.write(&config.final_markup_name, &prepared)?;

    info!(
        "Stage 2: {} chars written to {:?}",
        prepared.chars().count(),
        markup_path
    );

    Ok(Stage2Result {
        markup_path,
        assets_rewritten,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage2_cleans_answer() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::scratch(dir.path().join("work")).unwrap();
        let export_assets = dir.path().join("export");
        std::fs::create_dir(&export_assets).unwrap();
        std::fs::write(export_assets.join("chart.png"), b"png").unwrap();

        let generated = r#"<html><head></head><body><ul><li>Output: one document</li></ul>
<h1>Title</h1><ol><li><p>Step</p></li></ol><p><img src="chart.png"></p></body></html>"#;

        let result = execute_stage2(generated, &staging, &export_assets, &Stage2Config::default())
            .unwrap();

        assert!(result.diagnostics.is_empty());
        assert_eq!(result.markup_path, staging.path().join("ai_output.html"));
        assert_eq!(result.assets_rewritten, 1);
        assert!(staging.path().join("chart.png").is_file());

        let written = std::fs::read_to_string(&result.markup_path).unwrap();
        assert!(!written.contains("Output:"));
        assert!(written.contains("<ol><li>Step</li></ol>"));
        assert!(written.contains(r#"<img src="chart.png">"#));
    }

    #[test]
    fn test_stage2_reports_missing_assets() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::scratch(dir.path().join("work")).unwrap();
        let generated = r#"<html><body><h1>T</h1><img src="gone.png"></body></html>"#;

        let result =
            execute_stage2(generated, &staging, dir.path(), &Stage2Config::default()).unwrap();

        assert_eq!(
            result.diagnostics,
            vec![Degradation::AssetUnresolved(vec!["gone.png".to_string()])]
        );
    }

    #[test]
    fn test_stage2_keeps_answer_when_leak_filter_faults() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::scratch(dir.path().join("work")).unwrap();
        let config = Stage2Config {
            leak: LeakFilterConfig {
                signatures: vec!["y".repeat(20_000)],
                size_limit: 16 * 1024,
            },
            final_markup_name: "answer.html".to_string(),
        };
        let generated = "<html><body><h1>T</h1><p>Output: kept</p></body></html>";

        let result = execute_stage2(generated, &staging, dir.path(), &config).unwrap();

        assert!(matches!(
            result.diagnostics.as_slice(),
            [Degradation::LeakFilterFault(_)]
        ));
        assert_eq!(result.markup_path, staging.path().join("answer.html"));
        let written = std::fs::read_to_string(&result.markup_path).unwrap();
        assert!(written.contains("<p>Output: kept</p>"));
    }
}
