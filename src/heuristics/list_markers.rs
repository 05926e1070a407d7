use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::editor::{EditableDocument, EditorError, RetryPolicy};
use crate::models::ListKind;

/// A bullet glyph or hyphen followed by whitespace
static BULLET_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\x{2022}\x{00B7}-]\s+").expect("Invalid bullet regex"));

/// A decimal or single-letter ordinal, then `.` or `)`, then whitespace
static NUMBER_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\(?\d+[.)]|[A-Za-z][.)])\s+").expect("Invalid number regex")
});

/// Classify the leading marker of a paragraph's text
///
/// Returns the marker kind and the exact marker length in characters,
/// including surrounding whitespace. Trailing paragraph marks are ignored.
pub fn classify_marker(text: &str) -> Option<(ListKind, usize)> {
    let text = text.trim_end_matches(['\r', '\n']);

    if let Some(m) = BULLET_MARKER_REGEX.find(text) {
        return Some((ListKind::Bullet, m.as_str().chars().count()));
    }
    if let Some(m) = NUMBER_MARKER_REGEX.find(text) {
        return Some((ListKind::Numbered, m.as_str().chars().count()));
    }
    None
}

/// Maximal contiguous paragraphs sharing one marker classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRun {
    pub kind: ListKind,
    /// First paragraph index
    pub start: usize,
    /// One past the last paragraph index
    pub end: usize,
    /// Marker length (in characters) of each paragraph in the run
    pub prefix_lens: Vec<usize>,
}

impl MarkerRun {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Result of list reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListReconcileResult {
    /// Marker runs converted into structured lists
    pub runs: Vec<MarkerRun>,
    /// Paragraphs whose marker text could not be removed
    pub strip_failures: usize,
    /// Runs whose list formatting could not be applied
    pub apply_failures: usize,
}

impl ListReconcileResult {
    pub fn paragraphs_converted(&self) -> usize {
        self.runs.iter().map(MarkerRun::len).sum()
    }
}

/// Turn plain-text bullet and numbered paragraphs into structured lists
///
/// Single forward pass. Paragraphs that are already list items are skipped
/// and terminate any run in progress. Each run has its literal markers
/// removed and then receives list formatting as one contiguous range.
/// Scanning resumes right after the run.
pub fn reconcile_lists<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
) -> Result<ListReconcileResult, EditorError> {
    let mut result = ListReconcileResult::default();
    let mut index = 0;

    while index < retry.call(doc, |d| d.paragraph_count())? {
        let Some(run) = scan_run(doc, retry, index)? else {
            index += 1;
            continue;
        };

        debug!(
            "Marker run {:?} over paragraphs {}..{}",
            run.kind, run.start, run.end
        );

        for (offset, &prefix_len) in run.prefix_lens.iter().enumerate() {
            let paragraph = run.start + offset;
            if let Err(e) = retry.call(doc, |d| d.delete_prefix(paragraph, prefix_len)) {
                warn!("Failed to remove list marker from paragraph {}: {}", paragraph, e);
                result.strip_failures += 1;
            }
        }

        if let Err(e) = retry.call(doc, |d| d.apply_list(run.start..run.end, run.kind)) {
            warn!(
                "Failed to apply {:?} list to paragraphs {}..{}: {}",
                run.kind, run.start, run.end, e
            );
            result.apply_failures += 1;
        }

        index = run.end;
        result.runs.push(run);
    }

    Ok(result)
}

/// Detect a marker run opening at `start`, if that paragraph opens one
fn scan_run<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
    start: usize,
) -> Result<Option<MarkerRun>, EditorError> {
    let Some((kind, prefix_len)) = unstructured_marker(doc, retry, start)? else {
        return Ok(None);
    };

    let count = retry.call(doc, |d| d.paragraph_count())?;
    let mut prefix_lens = vec![prefix_len];
    let mut end = start + 1;

    while end < count {
        match unstructured_marker(doc, retry, end)? {
            Some((next_kind, len)) if next_kind == kind => {
                prefix_lens.push(len);
                end += 1;
            }
            _ => break,
        }
    }

    Ok(Some(MarkerRun {
        kind,
        start,
        end,
        prefix_lens,
    }))
}

/// Marker of a paragraph that is not already a structured list item
fn unstructured_marker<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
    index: usize,
) -> Result<Option<(ListKind, usize)>, EditorError> {
    if is_list_item(doc, retry, index) {
        return Ok(None);
    }
    let text = retry.call(doc, |d| d.paragraph_text(index))?;
    Ok(classify_marker(&text))
}

/// A paragraph whose list formatting cannot be read is treated as plain text
fn is_list_item<D: EditableDocument>(doc: &mut D, retry: &RetryPolicy, index: usize) -> bool {
    match retry.call(doc, |d| d.list_kind(index)) {
        Ok(kind) => kind.is_some(),
        Err(e) => {
            debug!("Could not read list format of paragraph {}: {}", index, e);
            false
        }
    }
}
