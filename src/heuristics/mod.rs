pub mod finishing;
pub mod list_markers;

pub use finishing::*;
pub use list_markers::*;

use tracing::info;

use crate::editor::{EditableDocument, EditorError, RetryPolicy};

/// Style names used by the finishing passes
#[derive(Debug, Clone)]
pub struct FinishingConfig {
    /// Style for bullet-structured paragraphs
    pub bulleted_style: String,
    /// Style for number-structured paragraphs
    pub numbered_style: String,
    /// Canonical base style
    pub normal_style: String,
    /// Note style, exempt from normalization
    pub note_style: String,
    /// Style names that count as generic variants of the base style
    pub normal_variants: Vec<String>,
}

impl Default for FinishingConfig {
    fn default() -> Self {
        Self {
            bulleted_style: "Bulleted List".to_string(),
            numbered_style: "List Paragraph".to_string(),
            normal_style: "Normal".to_string(),
            note_style: "Note".to_string(),
            normal_variants: vec![
                String::new(),
                "HTML Normal".to_string(),
                "Normal (Web)".to_string(),
            ],
        }
    }
}

/// Result of reconciling and finishing an imported document
#[derive(Debug, Clone, Default)]
pub struct FinishingResult {
    /// Paragraphs converted from literal markers into list items
    pub list_paragraphs: usize,
    /// Marker runs found
    pub list_runs: usize,
    /// Paragraphs whose literal marker could not be removed
    pub strip_failures: usize,
    /// Marker runs left without list formatting
    pub apply_failures: usize,
    /// Image-only tables replaced by their images
    pub tables_flattened: usize,
    /// Paragraphs moved onto the bulleted or numbered list style
    pub list_styled: usize,
    /// Paragraphs moved onto the base style
    pub normalized: usize,
    /// Image links broken
    pub links_broken: usize,
}

/// Apply all structural repairs to an imported document
///
/// Order:
/// 1. Flatten image-only tables
/// 2. Reconcile literal list markers into structured lists
/// 3. Bulleted and numbered list styles
/// 4. Base style for generic paragraph styles
/// 5. Break external image links
pub fn apply_finishing<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
    config: &FinishingConfig,
) -> Result<FinishingResult, EditorError> {
    let tables_flattened = flatten_image_only_tables(doc, retry)?;

    let lists = reconcile_lists(doc, retry)?;
    info!(
        "Lists: {} runs, {} paragraphs converted, {} strip failures, {} apply failures",
        lists.runs.len(),
        lists.paragraphs_converted(),
        lists.strip_failures,
        lists.apply_failures
    );

    let list_styled = apply_bulleted_list_style(doc, retry, config)?
        + apply_numbered_list_style(doc, retry, config)?;
    let normalized = normalize_paragraph_styles(doc, retry, config)?;
    let links_broken = break_image_links(doc, retry)?;

    Ok(FinishingResult {
        list_paragraphs: lists.paragraphs_converted(),
        list_runs: lists.runs.len(),
        strip_failures: lists.strip_failures,
        apply_failures: lists.apply_failures,
        tables_flattened,
        list_styled,
        normalized,
        links_broken,
    })
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;
    use crate::editor::{MessagePump, TableShape};
    use crate::models::{Cell, Document, ImageRef, ListKind, Paragraph, Table};

    /// Document whose marker text and list formatting cannot be edited
    struct LockedLists(Document);

    impl MessagePump for LockedLists {}

    impl EditableDocument for LockedLists {
        fn paragraph_count(&mut self) -> Result<usize, EditorError> {
            self.0.paragraph_count()
        }
        fn paragraph_text(&mut self, index: usize) -> Result<String, EditorError> {
            self.0.paragraph_text(index)
        }
        fn list_kind(&mut self, index: usize) -> Result<Option<ListKind>, EditorError> {
            self.0.list_kind(index)
        }
        fn delete_prefix(&mut self, _index: usize, _chars: usize) -> Result<(), EditorError> {
            Err(EditorError::Failed("protected".to_string()))
        }
        fn apply_list(&mut self, _range: Range<usize>, _kind: ListKind) -> Result<(), EditorError> {
            Err(EditorError::Failed("protected".to_string()))
        }
        fn paragraph_style(&mut self, index: usize) -> Result<String, EditorError> {
            self.0.paragraph_style(index)
        }
        fn set_paragraph_style(&mut self, index: usize, style: &str) -> Result<(), EditorError> {
            self.0.set_paragraph_style(index, style)
        }
        fn has_style(&mut self, name: &str) -> Result<bool, EditorError> {
            self.0.has_style(name)
        }
        fn add_style(&mut self, name: &str) -> Result<(), EditorError> {
            self.0.add_style(name)
        }
        fn table_count(&mut self) -> Result<usize, EditorError> {
            self.0.table_count()
        }
        fn table_shape(&mut self, index: usize) -> Result<TableShape, EditorError> {
            self.0.table_shape(index)
        }
        fn unwrap_table_images(&mut self, index: usize) -> Result<(), EditorError> {
            self.0.unwrap_table_images(index)
        }
        fn break_image_links(&mut self) -> Result<usize, EditorError> {
            self.0.break_image_links()
        }
    }

    #[test]
    fn test_finishing_reports_reconcile_failures() {
        let mut doc = LockedLists(Document::from_paragraphs(vec![
            Paragraph::normal("- one"),
            Paragraph::normal("- two"),
            Paragraph::normal("Body"),
        ]));

        let result =
            apply_finishing(&mut doc, &RetryPolicy::default(), &FinishingConfig::default()).unwrap();

        assert_eq!(result.list_runs, 1);
        assert_eq!(result.strip_failures, 2);
        assert_eq!(result.apply_failures, 1);
        assert_eq!(doc.0.texts(), vec!["- one", "- two", "Body"]);
    }

    #[test]
    fn test_tables_flattened_before_lists_reconciled() {
        let mut doc = Document::from_paragraphs(vec![
            Paragraph::normal("- before"),
            Paragraph::normal("- after"),
        ]);
        doc.tables.push(Table {
            position: 1,
            rows: 1,
            columns: 1,
            cells: vec![Cell {
                text: String::new(),
                images: vec![ImageRef::linked("chart.png")],
            }],
        });

        let result =
            apply_finishing(&mut doc, &RetryPolicy::default(), &FinishingConfig::default()).unwrap();

        // The lifted image paragraph sits between the markers and splits the run
        assert_eq!(result.tables_flattened, 1);
        assert_eq!(result.list_runs, 2);
        assert_eq!(doc.texts(), vec!["before", "", "after"]);
    }
}
