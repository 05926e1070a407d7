//! Contract with the local editing interface.
//!
//! The editing application is an external collaborator. Everything the
//! pipeline needs from it goes through [`EditorSession`] (document-level
//! export/import/save) and [`EditableDocument`] (paragraph-level edits used by
//! the list reconciler and finishing passes). Every call may fail
//! transiently while the application is busy; wrap calls in
//! [`RetryPolicy::call`].

pub mod html_editor;
pub mod retry;

pub use html_editor::*;
pub use retry::*;

use std::ops::{Deref, DerefMut, Range};
use std::path::{Path, PathBuf};

use crate::models::ListKind;

/// Failure reported by the editing interface
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The interface rejected the call because it is busy
    #[error("call rejected by the editing interface")]
    CallRejected,

    /// The interface asked the caller to retry later
    #[error("editing interface asked to retry later")]
    RetryLater,

    /// The interface cannot perform this operation at all
    #[error("unsupported by this editing interface: {0}")]
    Unsupported(String),

    /// Any other failure
    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    /// Whether the failure means "busy right now" and may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, EditorError::CallRejected | EditorError::RetryLater)
    }
}

/// Drains pending messages of the calling thread so the interface's own
/// event loop can make progress while we wait to retry
pub trait MessagePump {
    fn pump_waiting_messages(&mut self) {}
}

/// Result of exporting a source document to markup
#[derive(Debug, Clone)]
pub struct ExportedMarkup {
    /// Full exported markup file
    pub markup_path: PathBuf,
    /// Directory holding the exported assets
    pub assets_dir: PathBuf,
    /// Sanitized short name of the source document
    pub short_base: String,
}

/// Document-level operations of the editing interface
pub trait EditorSession: MessagePump {
    type Document: EditableDocument;

    /// Start the application session
    fn acquire(&mut self) -> Result<(), EditorError>;

    /// Tear the session down; must be safe to call on every exit path
    fn release(&mut self);

    /// Export `source` as markup into `out_dir`
    fn export_markup(&mut self, source: &Path, out_dir: &Path) -> Result<ExportedMarkup, EditorError>;

    /// Open a finished markup file as a structured document
    fn import_markup(&mut self, markup_path: &Path) -> Result<Self::Document, EditorError>;

    /// Save the structured document to `target`
    fn save(&mut self, document: &mut Self::Document, target: &Path) -> Result<(), EditorError>;

    /// Extension of saved artifacts, without the dot
    fn output_extension(&self) -> &str;

    /// Source file extensions this interface can export, lowercase without the dot
    fn input_extensions(&self) -> &[&str];
}

/// Shape of a table as seen by the finishing passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableShape {
    pub rows: usize,
    pub columns: usize,
    /// Whether the first cell has any non-whitespace text
    pub has_text: bool,
    /// Images (inline or floating) in the first cell
    pub image_count: usize,
}

impl TableShape {
    /// A 1x1 wrapper around images with no text
    pub fn is_image_only(&self) -> bool {
        self.rows == 1 && self.columns == 1 && !self.has_text && self.image_count > 0
    }
}

/// Paragraph-level operations on an open document. Indices are 0-based.
pub trait EditableDocument: MessagePump {
    fn paragraph_count(&mut self) -> Result<usize, EditorError>;

    /// Text of a paragraph, possibly including a trailing paragraph mark
    fn paragraph_text(&mut self, index: usize) -> Result<String, EditorError>;

    /// Structural list formatting of a paragraph
    fn list_kind(&mut self, index: usize) -> Result<Option<ListKind>, EditorError>;

    /// Delete the first `chars` characters of a paragraph
    fn delete_prefix(&mut self, index: usize, chars: usize) -> Result<(), EditorError>;

    /// Apply list formatting to a contiguous range of paragraphs
    fn apply_list(&mut self, range: Range<usize>, kind: ListKind) -> Result<(), EditorError>;

    fn paragraph_style(&mut self, index: usize) -> Result<String, EditorError>;

    fn set_paragraph_style(&mut self, index: usize, style: &str) -> Result<(), EditorError>;

    fn has_style(&mut self, name: &str) -> Result<bool, EditorError>;

    fn add_style(&mut self, name: &str) -> Result<(), EditorError>;

    fn table_count(&mut self) -> Result<usize, EditorError>;

    fn table_shape(&mut self, index: usize) -> Result<TableShape, EditorError>;

    /// Move the images of a table's first cell to the table's position and delete the table
    fn unwrap_table_images(&mut self, index: usize) -> Result<(), EditorError>;

    /// Turn linked images into embedded ones; returns how many links were broken
    fn break_image_links(&mut self) -> Result<usize, EditorError>;
}

/// Scoped ownership of an acquired session
///
/// The session is released when the guard drops, on success, error or panic.
pub struct SessionGuard<'a, S: EditorSession> {
    session: &'a mut S,
}

impl<'a, S: EditorSession> SessionGuard<'a, S> {
    pub fn acquire(session: &'a mut S, retry: &RetryPolicy) -> Result<Self, EditorError> {
        retry.call(session, |s| s.acquire())?;
        Ok(Self { session })
    }
}

impl<S: EditorSession> Deref for SessionGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session
    }
}

impl<S: EditorSession> DerefMut for SessionGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session
    }
}

impl<S: EditorSession> Drop for SessionGuard<'_, S> {
    fn drop(&mut self) {
        self.session.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Document, ImageRef, Paragraph, Table};

    #[test]
    fn test_transient_kinds() {
        assert!(EditorError::CallRejected.is_transient());
        assert!(EditorError::RetryLater.is_transient());
        assert!(!EditorError::Failed("boom".to_string()).is_transient());
        assert!(!EditorError::Unsupported("docx".to_string()).is_transient());
    }

    #[test]
    fn test_image_only_table_shape() {
        let mut doc = Document::from_paragraphs(vec![Paragraph::normal("after")]);
        let table = Table {
            position: 0,
            rows: 1,
            columns: 1,
            cells: vec![Cell {
                text: "  ".to_string(),
                images: vec![ImageRef::linked("a.png")],
            }],
        };
        doc.tables.push(table.clone());
        doc.tables.push(Table {
            cells: vec![Cell {
                text: "caption".to_string(),
                images: vec![ImageRef::linked("a.png")],
            }],
            ..table.clone()
        });
        doc.tables.push(Table {
            columns: 2,
            ..table
        });

        assert!(doc.table_shape(0).unwrap().is_image_only());
        assert!(!doc.table_shape(1).unwrap().is_image_only());
        assert!(!doc.table_shape(2).unwrap().is_image_only());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let mut editor = HtmlEditor::new();
        {
            let guard = SessionGuard::acquire(&mut editor, &RetryPolicy::default()).unwrap();
            assert!(guard.is_active());
        }
        assert!(!editor.is_active());
    }
}
