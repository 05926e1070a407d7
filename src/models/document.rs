use std::collections::BTreeSet;
use std::path::PathBuf;

/// Structural list formatting carried by a paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Bullet,
    Numbered,
}

/// An image placed in a paragraph or table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Reference as written in the markup
    pub src: String,
    /// Whether the image is still a live link to a file outside the document
    pub linked: bool,
}

impl ImageRef {
    pub fn linked(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            linked: true,
        }
    }
}

/// A paragraph-like text block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Plain text content
    pub text: String,
    /// Paragraph style name (e.g. "Normal", "Heading 1")
    pub style: String,
    /// Structural list formatting, if any
    pub list: Option<ListKind>,
    /// Images anchored in this paragraph
    pub images: Vec<ImageRef>,
}

impl Paragraph {
    pub fn new(text: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: style.into(),
            list: None,
            images: Vec::new(),
        }
    }

    /// Plain "Normal" paragraph
    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(text, "Normal")
    }

    pub fn with_list(mut self, kind: ListKind) -> Self {
        self.list = Some(kind);
        self
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.images.push(image);
        self
    }
}

/// A table cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub images: Vec<ImageRef>,
}

/// A table anchored before the paragraph at `position`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Index of the paragraph that follows the table
    pub position: usize,
    pub rows: usize,
    pub columns: usize,
    /// Cells in row-major order
    pub cells: Vec<Cell>,
}

/// In-memory structured document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
    /// Paragraph styles defined in the document
    pub styles: BTreeSet<String>,
    /// Directory that relative image references resolve against
    pub base_dir: PathBuf,
}

impl Document {
    /// Styles every new document starts with
    pub const DEFAULT_STYLES: [&'static str; 9] = [
        "Normal",
        "Heading 1",
        "Heading 2",
        "Heading 3",
        "Heading 4",
        "Heading 5",
        "Heading 6",
        "Note",
        "Bulleted List",
    ];

    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            paragraphs: Vec::new(),
            tables: Vec::new(),
            styles: Self::DEFAULT_STYLES.iter().map(|s| s.to_string()).collect(),
            base_dir: base_dir.into(),
        }
    }

    pub fn from_paragraphs(paragraphs: Vec<Paragraph>) -> Self {
        Self {
            paragraphs,
            ..Self::new(PathBuf::new())
        }
    }

    /// Texts of all paragraphs, in order
    pub fn texts(&self) -> Vec<&str> {
        self.paragraphs.iter().map(|p| p.text.as_str()).collect()
    }

    /// First heading text, used as the document title
    pub fn title(&self) -> Option<&str> {
        self.paragraphs
            .iter()
            .find(|p| p.style.starts_with("Heading"))
            .map(|p| p.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_first_heading() {
        let doc = Document::from_paragraphs(vec![
            Paragraph::normal("intro"),
            Paragraph::new("Title", "Heading 1"),
        ]);
        assert_eq!(doc.title(), Some("Title"));
    }
}
