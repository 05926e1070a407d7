use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Collect the documents to process from files and directories
///
/// Files are taken as given. Directories are walked recursively for files
/// with one of `extensions` (lowercase, no dot); editor lock files (`~$…`)
/// and any directory named in `skip_dirs` or starting with one of
/// `skip_prefixes` are ignored. Results keep the order of `inputs`, sorted
/// within each directory.
pub fn find_documents(
    inputs: &[PathBuf],
    extensions: &[&str],
    skip_dirs: &[&str],
    skip_prefixes: &[&str],
) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            walk(input, extensions, skip_dirs, skip_prefixes, &mut found)
                .with_context(|| format!("Failed to scan directory: {:?}", input))?;
            found.sort();
            documents.extend(found);
        } else if input.is_file() {
            documents.push(input.clone());
        } else {
            anyhow::bail!("Input not found: {:?}", input);
        }
    }

    Ok(documents)
}

fn walk(
    dir: &Path,
    extensions: &[&str],
    skip_dirs: &[&str],
    skip_prefixes: &[&str],
    found: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if path.is_dir() {
            if skip_dirs.contains(&name.as_str())
                || skip_prefixes.iter().any(|p| name.starts_with(p))
            {
                debug!("Skipping directory {:?}", path);
                continue;
            }
            walk(&path, extensions, skip_dirs, skip_prefixes, found)?;
        } else if !name.starts_with("~$") && has_extension(&path, extensions) {
            found.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

/// Read markup, replacing invalid UTF-8 sequences
pub fn read_markup(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_documents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join("Originals")).unwrap();
        std::fs::create_dir_all(root.join("redraft_work_a_1")).unwrap();
        for file in [
            "b.html",
            "a.HTM",
            "notes.txt",
            "~$lock.html",
            "sub/c.html",
            "Originals/Original_b.html",
            "redraft_work_a_1/ai_output.html",
        ] {
            std::fs::write(root.join(file), "").unwrap();
        }

        let found = find_documents(
            &[root.to_path_buf()],
            &["html", "htm"],
            &["Originals"],
            &["redraft_work"],
        )
        .unwrap();

        let names: Vec<PathBuf> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.HTM"),
                PathBuf::from("b.html"),
                PathBuf::from("sub/c.html")
            ]
        );
    }

    #[test]
    fn test_explicit_files_and_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.docx");
        std::fs::write(&file, "").unwrap();

        let found = find_documents(&[file.clone()], &["html"], &[], &[]).unwrap();
        assert_eq!(found, vec![file]);

        assert!(find_documents(&[dir.path().join("missing")], &["html"], &[], &[]).is_err());
    }

    #[test]
    fn test_read_markup_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.html");
        std::fs::write(&path, b"<p>caf\xe9</p>").unwrap();

        assert_eq!(read_markup(&path).unwrap(), "<p>caf\u{fffd}</p>");
    }
}
