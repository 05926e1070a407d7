use tracing::{debug, warn};

use crate::editor::{EditableDocument, EditorError, RetryPolicy};
use crate::models::ListKind;

use super::FinishingConfig;

/// Replace 1x1 tables holding only images with the images themselves
///
/// Tables are visited last to first so earlier indices stay valid.
pub fn flatten_image_only_tables<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
) -> Result<usize, EditorError> {
    let mut flattened = 0;
    let count = retry.call(doc, |d| d.table_count())?;

    for index in (0..count).rev() {
        let shape = match retry.call(doc, |d| d.table_shape(index)) {
            Ok(shape) => shape,
            Err(e) => {
                debug!("Could not inspect table {}: {}", index, e);
                continue;
            }
        };
        if !shape.is_image_only() {
            continue;
        }
        match retry.call(doc, |d| d.unwrap_table_images(index)) {
            Ok(()) => flattened += 1,
            Err(e) => warn!("Failed to flatten image table {}: {}", index, e),
        }
    }

    Ok(flattened)
}

/// Give every paragraph with the given list structure a style
///
/// Returns how many paragraphs were restyled.
fn style_list_paragraphs<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
    kind: ListKind,
    style: &str,
) -> Result<usize, EditorError> {
    let mut restyled = 0;
    let count = retry.call(doc, |d| d.paragraph_count())?;

    for index in 0..count {
        match retry.call(doc, |d| d.list_kind(index)) {
            Ok(Some(k)) if k == kind => {}
            _ => continue,
        }
        match retry.call(doc, |d| d.set_paragraph_style(index, style)) {
            Ok(()) => restyled += 1,
            Err(e) => warn!("Failed to set style {:?} on paragraph {}: {}", style, index, e),
        }
    }

    Ok(restyled)
}

/// Bullet-structured paragraphs take the bulleted list style, if the document defines it
pub fn apply_bulleted_list_style<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
    config: &FinishingConfig,
) -> Result<usize, EditorError> {
    if !retry.call(doc, |d| d.has_style(&config.bulleted_style))? {
        debug!("Style {:?} not defined, skipping", config.bulleted_style);
        return Ok(0);
    }
    style_list_paragraphs(doc, retry, ListKind::Bullet, &config.bulleted_style)
}

/// Number-structured paragraphs take the list paragraph style, created when missing
pub fn apply_numbered_list_style<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
    config: &FinishingConfig,
) -> Result<usize, EditorError> {
    if !retry.call(doc, |d| d.has_style(&config.numbered_style))? {
        retry.call(doc, |d| d.add_style(&config.numbered_style))?;
    }
    style_list_paragraphs(doc, retry, ListKind::Numbered, &config.numbered_style)
}

/// Whether a style name is a generic variant of the base style
pub fn is_near_normal(name: &str, config: &FinishingConfig) -> bool {
    let lower = name.to_lowercase();
    if lower.starts_with("heading")
        || name == config.numbered_style
        || name == config.note_style
        || name == config.bulleted_style
    {
        return false;
    }
    name != config.normal_style
        && (lower.contains("normal") || config.normal_variants.iter().any(|v| v == name))
}

/// Move non-list paragraphs with a near-"Normal" style onto the base style
pub fn normalize_paragraph_styles<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
    config: &FinishingConfig,
) -> Result<usize, EditorError> {
    if !retry.call(doc, |d| d.has_style(&config.normal_style))? {
        return Ok(0);
    }

    let mut normalized = 0;
    let count = retry.call(doc, |d| d.paragraph_count())?;

    for index in 0..count {
        if matches!(retry.call(doc, |d| d.list_kind(index)), Ok(Some(_))) {
            continue;
        }
        let style = retry.call(doc, |d| d.paragraph_style(index)).unwrap_or_default();
        if !is_near_normal(&style, config) {
            continue;
        }
        match retry.call(doc, |d| d.set_paragraph_style(index, &config.normal_style)) {
            Ok(()) => normalized += 1,
            Err(e) => warn!("Failed to normalize style of paragraph {}: {}", index, e),
        }
    }

    Ok(normalized)
}

/// Break live links to external images
pub fn break_image_links<D: EditableDocument>(
    doc: &mut D,
    retry: &RetryPolicy,
) -> Result<usize, EditorError> {
    retry.call(doc, |d| d.break_image_links())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Document, ImageRef, Paragraph, Table};

    #[test]
    fn test_flatten_image_only_tables() {
        let mut doc = Document::from_paragraphs(vec![
            Paragraph::normal("before"),
            Paragraph::normal("after"),
        ]);
        doc.tables = vec![
            Table {
                position: 1,
                rows: 1,
                columns: 1,
                cells: vec![Cell {
                    text: String::new(),
                    images: vec![ImageRef::linked("chart.png")],
                }],
            },
            Table {
                position: 2,
                rows: 1,
                columns: 1,
                cells: vec![Cell {
                    text: "Caption".to_string(),
                    images: vec![ImageRef::linked("other.png")],
                }],
            },
        ];

        let flattened = flatten_image_only_tables(&mut doc, &RetryPolicy::default()).unwrap();

        assert_eq!(flattened, 1);
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].position, 3);
        assert_eq!(doc.paragraphs.len(), 3);
        assert_eq!(doc.paragraphs[1].images, vec![ImageRef::linked("chart.png")]);
        assert_eq!(doc.paragraphs[2].text, "after");
    }

    #[test]
    fn test_list_styles() {
        let config = FinishingConfig::default();
        let mut doc = Document::from_paragraphs(vec![
            Paragraph::normal("a").with_list(ListKind::Bullet),
            Paragraph::normal("b").with_list(ListKind::Numbered),
            Paragraph::normal("c"),
        ]);
        let retry = RetryPolicy::default();

        assert_eq!(apply_bulleted_list_style(&mut doc, &retry, &config).unwrap(), 1);
        assert_eq!(apply_numbered_list_style(&mut doc, &retry, &config).unwrap(), 1);

        assert_eq!(doc.paragraphs[0].style, "Bulleted List");
        assert_eq!(doc.paragraphs[1].style, "List Paragraph");
        assert_eq!(doc.paragraphs[2].style, "Normal");
        assert!(doc.styles.contains("List Paragraph"));
    }

    #[test]
    fn test_bulleted_style_skipped_when_undefined() {
        let mut doc =
            Document::from_paragraphs(vec![Paragraph::normal("a").with_list(ListKind::Bullet)]);
        doc.styles.remove("Bulleted List");

        let count =
            apply_bulleted_list_style(&mut doc, &RetryPolicy::default(), &FinishingConfig::default())
                .unwrap();

        assert_eq!(count, 0);
        assert_eq!(doc.paragraphs[0].style, "Normal");
    }

    #[test]
    fn test_is_near_normal() {
        let config = FinishingConfig::default();
        assert!(is_near_normal("", &config));
        assert!(is_near_normal("HTML Normal", &config));
        assert!(is_near_normal("Normal (Web)", &config));
        assert!(is_near_normal("normal1", &config));
        assert!(!is_near_normal("Normal", &config));
        assert!(!is_near_normal("Heading 2", &config));
        assert!(!is_near_normal("Note", &config));
        assert!(!is_near_normal("Quote", &config));
    }

    #[test]
    fn test_normalize_skips_lists_and_headings() {
        let config = FinishingConfig::default();
        let mut doc = Document::from_paragraphs(vec![
            Paragraph::new("web", "Normal (Web)"),
            Paragraph::new("item", "HTML Normal").with_list(ListKind::Bullet),
            Paragraph::new("title", "Heading 1"),
        ]);

        let count = normalize_paragraph_styles(&mut doc, &RetryPolicy::default(), &config).unwrap();

        assert_eq!(count, 1);
        assert_eq!(doc.paragraphs[0].style, "Normal");
        assert_eq!(doc.paragraphs[1].style, "HTML Normal");
        assert_eq!(doc.paragraphs[2].style, "Heading 1");
    }

    #[test]
    fn test_break_image_links() {
        let mut doc = Document::from_paragraphs(vec![
            Paragraph::normal("").with_image(ImageRef::linked("a.png")),
            Paragraph::normal("").with_image(ImageRef {
                src: "b.png".to_string(),
                linked: false,
            }),
        ]);

        let broken = break_image_links(&mut doc, &RetryPolicy::default()).unwrap();

        assert_eq!(broken, 1);
        assert!(doc.paragraphs.iter().all(|p| p.images.iter().all(|i| !i.linked)));
    }
}
