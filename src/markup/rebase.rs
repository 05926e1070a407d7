use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::models::{AssetReference, Degradation, Filtered};

static SRC_ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)src\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("Invalid src attribute regex")
});

/// Result of one rebasing pass
#[derive(Debug, Clone, Default)]
pub struct RebaseReport {
    /// Markup with resolved references pointing into the target directory
    pub markup: String,
    /// References rewritten to a staged filename
    pub rewritten: usize,
    /// Files copied into the target directory
    pub copied: usize,
    /// References left untouched because no file could be found or staged
    pub unresolved: Vec<String>,
}

impl RebaseReport {
    /// Convert into a degradable result; unresolved references become the diagnostic
    pub fn into_filtered(self) -> Filtered<String> {
        if self.unresolved.is_empty() {
            Filtered::clean(self.markup)
        } else {
            Filtered::degraded(self.markup, Degradation::AssetUnresolved(self.unresolved))
        }
    }
}

/// Rewrites asset references so they name files inside a staging directory
///
/// Resolution order for each reference: an existing absolute path, an
/// existing `file://` URI, the reference joined onto each source directory,
/// then the bare filename inside each source directory. Inline `data:`
/// assets are never touched. Anything unresolved stays exactly as written.
#[derive(Debug, Clone)]
pub struct AssetRebaser {
    target_dir: PathBuf,
    sources: Vec<PathBuf>,
}

impl AssetRebaser {
    pub fn new(target_dir: impl Into<PathBuf>, sources: Vec<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            sources,
        }
    }

    /// Markup leaving the system: assets come from the export's own asset directory
    pub fn outbound(staging_dir: &Path, export_assets_dir: &Path) -> Self {
        Self::new(staging_dir, vec![export_assets_dir.to_path_buf()])
    }

    /// Markup coming back: staging directory first, then the export's asset directory
    pub fn inbound(staging_dir: &Path, export_assets_dir: &Path) -> Self {
        Self::new(
            staging_dir,
            vec![staging_dir.to_path_buf(), export_assets_dir.to_path_buf()],
        )
    }

    pub fn rebase(&self, markup: &str) -> RebaseReport {
        let mut report = RebaseReport::default();

        let rewritten = SRC_ATTR_REGEX.replace_all(markup, |caps: &Captures| {
            let Some(whole) = caps.get(0) else {
                return String::new();
            };
            let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
                return whole.as_str().to_string();
            };
            let src = value.as_str().trim();

            let reference = AssetReference::classify(src);
            if reference.is_inline() || src.is_empty() {
                return whole.as_str().to_string();
            }

            let Some(found) = self.resolve(src, &reference) else {
                debug!("Asset reference not resolved: {}", src);
                report.unresolved.push(src.to_string());
                return whole.as_str().to_string();
            };

            match self.stage(&found) {
                Ok((file_name, copied)) => {
                    if copied {
                        report.copied += 1;
                    }
                    report.rewritten += 1;
                    let start = value.start() - whole.start();
                    let end = value.end() - whole.start();
                    format!("{}{}{}", &whole.as_str()[..start], file_name, &whole.as_str()[end..])
                }
                Err(e) => {
                    warn!("Failed to stage asset {:?}: {}", found, e);
                    report.unresolved.push(src.to_string());
                    whole.as_str().to_string()
                }
            }
        });

        report.markup = rewritten.into_owned();
        report
    }

    /// Find an existing file for a reference
    fn resolve(&self, src: &str, reference: &AssetReference) -> Option<PathBuf> {
        match reference {
            AssetReference::Inline | AssetReference::Remote => return None,
            AssetReference::AbsolutePath(path) | AssetReference::FileUri(path) => {
                if path.is_file() {
                    return Some(path.clone());
                }
            }
            AssetReference::Relative(relative) => {
                for dir in &self.sources {
                    let candidate = dir.join(relative);
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }
        }

        let name = file_name_of(src)?;
        self.sources
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Make sure the file exists in the target directory; returns its name and
    /// whether a copy was made
    fn stage(&self, found: &Path) -> std::io::Result<(String, bool)> {
        let file_name = found
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| std::io::Error::other("asset path has no file name"))?;
        let destination = self.target_dir.join(&file_name);

        if is_same_file(found, &destination) {
            return Ok((file_name, false));
        }

        std::fs::copy(found, &destination)?;
        Ok((file_name, true))
    }
}

/// Last path segment, splitting on both separator styles
fn file_name_of(src: &str) -> Option<&str> {
    src.rsplit(['/', '\\']).find(|segment| !segment.is_empty())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
