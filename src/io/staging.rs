use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

static UNSAFE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("Invalid name regex"));

const SHORT_BASE_LEN: usize = 40;

/// Names and locations of the state persisted per run
#[derive(Debug, Clone)]
pub struct StagingConfig {
    /// Prefix of per-document staging directories
    pub work_prefix: String,
    /// Folder (next to the source) receiving the originals
    pub backup_folder: String,
    /// Prefix of backed-up originals
    pub backup_prefix: String,
    /// Prefix of the batch failure report
    pub report_prefix: String,
    /// Leave staging directories in place for inspection
    pub keep_staging: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            work_prefix: "redraft_work".to_string(),
            backup_folder: "Originals".to_string(),
            backup_prefix: "Original_".to_string(),
            report_prefix: "redraft_skipped".to_string(),
            keep_staging: true,
        }
    }
}

/// Local time formatted for file names
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// File-system-safe short form of a document name
pub fn short_base(stem: &str) -> String {
    let safe: String = UNSAFE_NAME_REGEX
        .replace_all(stem, "_")
        .chars()
        .take(SHORT_BASE_LEN)
        .collect();
    if safe.is_empty() {
        "doc".to_string()
    } else {
        safe
    }
}

/// Copy every regular file of `src` into `dst` (not recursive)
///
/// A missing `src` copies nothing. Returns how many files were copied;
/// individual copy failures are logged and skipped.
pub fn copy_all(src: &Path, dst: &Path) -> std::io::Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }
    std::fs::create_dir_all(dst)?;

    let mut copied = 0;
    for entry in std::fs::read_dir(src)? {
        let path = entry?.path();
        let Some(name) = path.file_name() else {
            continue;
        };
        if !path.is_file() {
            continue;
        }
        match std::fs::copy(&path, dst.join(name)) {
            Ok(_) => copied += 1,
            Err(e) => warn!("Failed to copy {:?}: {}", path, e),
        }
    }
    Ok(copied)
}

/// Private working directory of one document's run
///
/// Created next to the source document. Removed on drop unless it is kept
/// for inspection.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    keep: bool,
}

impl StagingArea {
    /// Create `<work_prefix>_<short_base>_<timestamp>` beside `source`
    pub fn create(source: &Path, short_base: &str, config: &StagingConfig) -> Result<Self> {
        let parent = source.parent().unwrap_or(Path::new("."));
        let name = format!("{}_{}_{}", config.work_prefix, short_base, timestamp());
        let mut dir = parent.join(&name);
        if dir.exists() {
            // Same document twice within one second
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            dir = parent.join(format!("{}_{}", name, &suffix[..8]));
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create staging directory: {:?}", dir))?;
        debug!("Staging area {:?}", dir);

        Ok(Self {
            dir,
            keep: config.keep_staging,
        })
    }

    /// Create a throwaway directory at `dir`, removed on drop
    pub fn scratch(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        Ok(Self { dir, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Copy every file of the export's asset directory into the staging area
    pub fn seed(&self, assets_dir: &Path) -> Result<usize> {
        copy_all(assets_dir, &self.dir)
            .with_context(|| format!("Failed to seed staging area from {:?}", assets_dir))
    }

    /// Write a file into the staging area
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write staging file: {:?}", path))?;
        Ok(path)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            warn!("Failed to remove staging area {:?}: {}", self.dir, e);
        }
    }
}

/// Move the original source into the backup folder beside it
///
/// The backup is `<backup_prefix><name>`, or
/// `<backup_prefix><stem>_<timestamp><ext>` when that already exists.
pub fn backup_original(source: &Path, config: &StagingConfig) -> Result<PathBuf> {
    let parent = source.parent().unwrap_or(Path::new("."));
    let folder = parent.join(&config.backup_folder);
    std::fs::create_dir_all(&folder)
        .with_context(|| format!("Failed to create backup folder: {:?}", folder))?;

    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Source has no file name")?;
    let mut target = folder.join(format!("{}{}", config.backup_prefix, name));

    if target.exists() {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        target = folder.join(format!(
            "{}{}_{}{}",
            config.backup_prefix,
            stem,
            timestamp(),
            ext
        ));
    }

    if std::fs::rename(source, &target).is_err() {
        // Across file systems
        std::fs::copy(source, &target)
            .with_context(|| format!("Failed to back up {:?} to {:?}", source, target))?;
        std::fs::remove_file(source)
            .with_context(|| format!("Failed to remove original {:?}", source))?;
    }
    info!("Original backed up to {:?}", target);

    Ok(target)
}

/// Where the finished artifact for `source` is saved
///
/// Keeps the file name when it already has the output extension,
/// otherwise `<stem>.<extension>` in the same directory.
pub fn output_path(source: &Path, extension: &str) -> PathBuf {
    let has_extension = source
        .extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(extension));
    if has_extension {
        source.to_path_buf()
    } else {
        source.with_extension(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_base() {
        assert_eq!(short_base("Quarterly Report (v2)"), "Quarterly_Report_v2_");
        assert_eq!(short_base("plain-name_1.0"), "plain-name_1.0");
        assert_eq!(short_base(""), "doc");
        assert_eq!(short_base(&"x".repeat(60)).len(), 40);
    }

    #[test]
    fn test_staging_area_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.html");
        let assets = dir.path().join("assets");
        std::fs::create_dir(&assets).unwrap();
        std::fs::write(assets.join("image001.png"), b"png").unwrap();

        let kept_path;
        {
            let staging = StagingArea::create(&source, "doc", &StagingConfig::default()).unwrap();
            assert_eq!(staging.seed(&assets).unwrap(), 1);
            assert!(staging.path().join("image001.png").is_file());
            let name = staging.path().file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("redraft_work_doc_"));
            kept_path = staging.path().to_path_buf();
        }
        assert!(kept_path.is_dir());

        let config = StagingConfig {
            keep_staging: false,
            ..Default::default()
        };
        let discarded_path;
        {
            let staging = StagingArea::create(&source, "doc", &config).unwrap();
            staging.write("ai_output.html", "<html></html>").unwrap();
            discarded_path = staging.path().to_path_buf();
        }
        assert!(!discarded_path.exists());
    }

    #[test]
    fn test_backup_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let config = StagingConfig::default();
        let source = dir.path().join("guide.html");

        std::fs::write(&source, "first").unwrap();
        let first = backup_original(&source, &config).unwrap();
        assert_eq!(first, dir.path().join("Originals").join("Original_guide.html"));
        assert!(!source.exists());

        std::fs::write(&source, "second").unwrap();
        let second = backup_original(&source, &config).unwrap();
        assert_ne!(first, second);
        let name = second.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Original_guide_"));
        assert!(name.ends_with(".html"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "second");
    }

    #[test]
    fn test_output_path() {
        assert_eq!(output_path(Path::new("/d/a.HTML"), "html"), PathBuf::from("/d/a.HTML"));
        assert_eq!(output_path(Path::new("/d/a.htm"), "html"), PathBuf::from("/d/a.html"));
        assert_eq!(output_path(Path::new("/d/a.doc"), "docx"), PathBuf::from("/d/a.docx"));
    }
}
