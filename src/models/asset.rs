use std::path::{Path, PathBuf};

/// Classification of a textual pointer to a binary resource embedded in markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetReference {
    /// Inline-encoded blob (`data:` URI); never rewritten or copied
    Inline,
    /// `file://` URI, already converted to a local path
    FileUri(PathBuf),
    /// Absolute local path
    AbsolutePath(PathBuf),
    /// Non-file URL (http, https, ...); never resolved locally
    Remote,
    /// Path relative to some asset directory
    Relative(String),
}

impl AssetReference {
    /// Classify a raw `src` value
    pub fn classify(raw: &str) -> Self {
        let src = raw.trim();
        let lower = src.to_ascii_lowercase();

        if lower.starts_with("data:") {
            return AssetReference::Inline;
        }
        if lower.starts_with("file://") {
            return AssetReference::FileUri(file_uri_to_path(&src["file://".len()..]));
        }
        if is_drive_path(src) || Path::new(src).is_absolute() {
            return AssetReference::AbsolutePath(PathBuf::from(src));
        }
        if has_scheme(&lower) {
            return AssetReference::Remote;
        }
        AssetReference::Relative(src.to_string())
    }

    /// Whether the reference must be passed through unmodified
    pub fn is_inline(&self) -> bool {
        matches!(self, AssetReference::Inline)
    }
}

/// `C:\...` or `C:/...`, recognized on every platform
fn is_drive_path(src: &str) -> bool {
    let bytes = src.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn has_scheme(lower: &str) -> bool {
    match lower.find("://") {
        Some(idx) => lower[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        None => false,
    }
}

/// Convert the part of a file URI after `file://` into a local path
fn file_uri_to_path(rest: &str) -> PathBuf {
    let decoded = percent_decode(rest);
    // file:///C:/dir/x.png -> C:/dir/x.png
    let trimmed = match decoded.strip_prefix('/') {
        Some(tail) if is_drive_path(tail) => tail.to_string(),
        _ => decoded,
    };
    PathBuf::from(trimmed)
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}
