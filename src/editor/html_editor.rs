use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use super::{EditableDocument, EditorError, EditorSession, ExportedMarkup, MessagePump, TableShape};
use crate::io::{copy_all, short_base};
use crate::markup::unescape_entities;
use crate::models::{Cell, Document, ImageRef, ListKind, Paragraph, Table};

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9]*)\b([^>]*)>").expect("Invalid tag regex")
});

static BODY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("Invalid body regex"));

static SRC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("Invalid src regex")
});

static CLASS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("Invalid class regex")
});

/// File-backed editing interface over exported HTML
///
/// Sources are documents that were already exported to HTML, with their
/// assets in a sibling `<stem>_files` folder. Imported markup becomes an
/// in-memory [`Document`]; saving renders it back to HTML next to a
/// `<stem>_files` folder holding copies of every embedded image.
#[derive(Debug, Default)]
pub struct HtmlEditor {
    active: bool,
}

impl HtmlEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn ensure_active(&self) -> Result<(), EditorError> {
        if self.active {
            Ok(())
        } else {
            Err(EditorError::Failed("editing session not acquired".to_string()))
        }
    }
}

impl MessagePump for HtmlEditor {}

impl EditorSession for HtmlEditor {
    type Document = Document;

    fn acquire(&mut self) -> Result<(), EditorError> {
        self.active = true;
        Ok(())
    }

    fn release(&mut self) {
        if self.active {
            debug!("Releasing HTML editing session");
        }
        self.active = false;
    }

    fn export_markup(&mut self, source: &Path, out_dir: &Path) -> Result<ExportedMarkup, EditorError> {
        self.ensure_active()?;

        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !self.input_extensions().contains(&extension.as_str()) {
            return Err(EditorError::Unsupported(format!(
                "cannot export {:?}; this interface only reads exported HTML",
                source
            )));
        }
        if !source.is_file() {
            return Err(EditorError::Failed(format!("Not a file: {:?}", source)));
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = short_base(&stem);

        std::fs::create_dir_all(out_dir)?;
        let markup_path = out_dir.join(format!("{}.html", base));
        std::fs::copy(source, &markup_path)?;

        let source_assets = source
            .parent()
            .unwrap_or(Path::new("."))
            .join(format!("{}_files", stem));
        let assets_dir = out_dir.join(format!("{}_files", base));
        if source_assets.is_dir() {
            copy_all(&source_assets, &assets_dir)?;
        } else {
            std::fs::create_dir_all(&assets_dir)?;
        }

        Ok(ExportedMarkup {
            markup_path,
            assets_dir,
            short_base: base,
        })
    }

    fn import_markup(&mut self, markup_path: &Path) -> Result<Document, EditorError> {
        self.ensure_active()?;
        let markup = std::fs::read_to_string(markup_path)?;
        let base_dir = markup_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let document = read_document(&markup, base_dir);
        info!(
            "Imported {} paragraphs, {} tables from {:?}",
            document.paragraphs.len(),
            document.tables.len(),
            markup_path
        );
        Ok(document)
    }

    fn save(&mut self, document: &mut Document, target: &Path) -> Result<(), EditorError> {
        self.ensure_active()?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let html = render_document(document, target)?;
        std::fs::write(target, html)?;
        Ok(())
    }

    fn output_extension(&self) -> &str {
        "html"
    }

    fn input_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }
}

impl MessagePump for Document {}

impl Document {
    fn paragraph(&self, index: usize) -> Result<&Paragraph, EditorError> {
        self.paragraphs
            .get(index)
            .ok_or_else(|| EditorError::Failed(format!("paragraph {} out of range", index)))
    }

    fn paragraph_mut(&mut self, index: usize) -> Result<&mut Paragraph, EditorError> {
        self.paragraphs
            .get_mut(index)
            .ok_or_else(|| EditorError::Failed(format!("paragraph {} out of range", index)))
    }
}

impl EditableDocument for Document {
    fn paragraph_count(&mut self) -> Result<usize, EditorError> {
        Ok(self.paragraphs.len())
    }

    fn paragraph_text(&mut self, index: usize) -> Result<String, EditorError> {
        Ok(self.paragraph(index)?.text.clone())
    }

    fn list_kind(&mut self, index: usize) -> Result<Option<ListKind>, EditorError> {
        Ok(self.paragraph(index)?.list)
    }

    fn delete_prefix(&mut self, index: usize, chars: usize) -> Result<(), EditorError> {
        let paragraph = self.paragraph_mut(index)?;
        paragraph.text = paragraph.text.chars().skip(chars).collect();
        Ok(())
    }

    fn apply_list(&mut self, range: Range<usize>, kind: ListKind) -> Result<(), EditorError> {
        let paragraphs = self.paragraphs.get_mut(range.clone()).ok_or_else(|| {
            EditorError::Failed(format!("paragraph range {:?} out of range", range))
        })?;
        for paragraph in paragraphs {
            paragraph.list = Some(kind);
        }
        Ok(())
    }

    fn paragraph_style(&mut self, index: usize) -> Result<String, EditorError> {
        Ok(self.paragraph(index)?.style.clone())
    }

    fn set_paragraph_style(&mut self, index: usize, style: &str) -> Result<(), EditorError> {
        if !self.styles.contains(style) {
            return Err(EditorError::Failed(format!("style {:?} is not defined", style)));
        }
        self.paragraph_mut(index)?.style = style.to_string();
        Ok(())
    }

    fn has_style(&mut self, name: &str) -> Result<bool, EditorError> {
        Ok(self.styles.contains(name))
    }

    fn add_style(&mut self, name: &str) -> Result<(), EditorError> {
        self.styles.insert(name.to_string());
        Ok(())
    }

    fn table_count(&mut self) -> Result<usize, EditorError> {
        Ok(self.tables.len())
    }

    fn table_shape(&mut self, index: usize) -> Result<TableShape, EditorError> {
        let table = self
            .tables
            .get(index)
            .ok_or_else(|| EditorError::Failed(format!("table {} out of range", index)))?;
        let first = table.cells.first();
        Ok(TableShape {
            rows: table.rows,
            columns: table.columns,
            has_text: first.is_some_and(|c| !c.text.trim().is_empty()),
            image_count: first.map_or(0, |c| c.images.len()),
        })
    }

    fn unwrap_table_images(&mut self, index: usize) -> Result<(), EditorError> {
        if index >= self.tables.len() {
            return Err(EditorError::Failed(format!("table {} out of range", index)));
        }
        let table = self.tables.remove(index);
        let position = table.position.min(self.paragraphs.len());
        let images = table.cells.into_iter().flat_map(|c| c.images).collect();

        self.paragraphs.insert(
            position,
            Paragraph {
                images,
                ..Paragraph::normal("")
            },
        );
        for other in &mut self.tables {
            if other.position >= position {
                other.position += 1;
            }
        }
        Ok(())
    }

    fn break_image_links(&mut self) -> Result<usize, EditorError> {
        let mut broken = 0;
        let paragraph_images = self.paragraphs.iter_mut().flat_map(|p| p.images.iter_mut());
        let cell_images = self
            .tables
            .iter_mut()
            .flat_map(|t| t.cells.iter_mut())
            .flat_map(|c| c.images.iter_mut());
        for image in paragraph_images.chain(cell_images) {
            if image.linked {
                image.linked = false;
                broken += 1;
            }
        }
        Ok(broken)
    }
}

/// Paragraph being accumulated by the reader
struct Pending {
    paragraph: Paragraph,
}

impl Pending {
    fn push_text(&mut self, text: &str) {
        push_collapsed(&mut self.paragraph.text, text);
    }
}

/// Table being accumulated by the reader
#[derive(Default)]
struct PendingTable {
    rows: usize,
    columns: usize,
    columns_in_row: usize,
    cells: Vec<Cell>,
    cell: Option<Cell>,
}

/// Append text with whitespace runs collapsed to single spaces
fn push_collapsed(target: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            if !target.is_empty() && !target.ends_with(' ') {
                target.push(' ');
            }
        } else {
            target.push(c);
        }
    }
}

fn attribute(regex: &Regex, attrs: &str) -> Option<String> {
    let caps = regex.captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| unescape_entities(m.as_str().trim()))
}

fn paragraph_style_for_class(class: Option<&str>) -> &'static str {
    match class {
        Some(c) if c.split_whitespace().any(|n| n.eq_ignore_ascii_case("Note")) => "Note",
        Some(c) if c.split_whitespace().any(|n| n.eq_ignore_ascii_case("BulletedList")) => {
            "Bulleted List"
        }
        _ => "Normal",
    }
}

/// Read the block structure of markup into a [`Document`]
///
/// Recognizes headings, paragraphs, list items inside `ul`/`ol`, tables and
/// images. Inline formatting is dropped; text inside `head`, `style`,
/// `script` and `title` is ignored. Multi-cell tables are read as one
/// paragraph per non-empty cell.
pub fn read_document(markup: &str, base_dir: PathBuf) -> Document {
    let body = BODY_REGEX
        .captures(markup)
        .and_then(|c| c.get(1))
        .map_or(markup, |m| m.as_str());

    let mut document = Document::new(base_dir);
    let mut lists: Vec<ListKind> = Vec::new();
    let mut pending: Option<Pending> = None;
    let mut table: Option<PendingTable> = None;
    let mut skip_depth = 0usize;
    let mut cursor = 0;

    let flush = |pending: &mut Option<Pending>, document: &mut Document| {
        if let Some(p) = pending.take() {
            let mut paragraph = p.paragraph;
            paragraph.text = paragraph.text.trim().to_string();
            if !paragraph.text.is_empty() || !paragraph.images.is_empty() {
                document.paragraphs.push(paragraph);
            }
        }
    };

    for caps in TAG_REGEX.captures_iter(body) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let text = &body[cursor..whole.start()];
        cursor = whole.end();

        if skip_depth == 0 && !text.is_empty() {
            let text = unescape_entities(text);
            if let Some(cell) = table.as_mut().and_then(|t| t.cell.as_mut()) {
                push_collapsed(&mut cell.text, &text);
            } else if let Some(p) = pending.as_mut() {
                p.push_text(&text);
            } else if !text.trim().is_empty() {
                let mut p = Pending {
                    paragraph: Paragraph::normal(""),
                };
                p.push_text(&text);
                pending = Some(p);
            }
        }

        let Some(name) = caps.get(2) else {
            continue; // comment
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = name.as_str().to_ascii_lowercase();
        let attrs = caps.get(3).map_or("", |m| m.as_str());

        match (name.as_str(), closing) {
            ("head" | "style" | "script" | "title", false) => skip_depth += 1,
            ("head" | "style" | "script" | "title", true) => skip_depth = skip_depth.saturating_sub(1),
            _ if skip_depth > 0 => {}

            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", false) => {
                flush(&mut pending, &mut document);
                pending = Some(Pending {
                    paragraph: Paragraph::new("", format!("Heading {}", &name[1..])),
                });
            }
            ("p", false) if table.as_ref().is_some_and(|t| t.cell.is_some()) => {}
            ("p", false) => {
                flush(&mut pending, &mut document);
                let class = attribute(&CLASS_REGEX, attrs);
                let mut paragraph = Paragraph::normal("");
                paragraph.style = paragraph_style_for_class(class.as_deref()).to_string();
                paragraph.list = lists.last().copied();
                pending = Some(Pending { paragraph });
            }
            ("li", false) => {
                flush(&mut pending, &mut document);
                pending = Some(Pending {
                    paragraph: Paragraph {
                        list: lists.last().copied(),
                        ..Paragraph::normal("")
                    },
                });
            }
            ("ul" | "ol", false) => {
                flush(&mut pending, &mut document);
                lists.push(if name == "ul" {
                    ListKind::Bullet
                } else {
                    ListKind::Numbered
                });
            }
            ("ul" | "ol", true) => {
                flush(&mut pending, &mut document);
                lists.pop();
            }
            ("br", _) => {
                if let Some(p) = pending.as_mut() {
                    p.push_text(" ");
                }
            }
            ("img", _) => {
                let Some(src) = attribute(&SRC_REGEX, attrs) else {
                    continue;
                };
                let image = ImageRef::linked(src);
                if let Some(cell) = table.as_mut().and_then(|t| t.cell.as_mut()) {
                    cell.images.push(image);
                } else {
                    pending
                        .get_or_insert_with(|| Pending {
                            paragraph: Paragraph::normal(""),
                        })
                        .paragraph
                        .images
                        .push(image);
                }
            }
            ("table", false) => {
                flush(&mut pending, &mut document);
                table = Some(PendingTable::default());
            }
            ("tr", false) => {
                if let Some(t) = table.as_mut() {
                    t.rows += 1;
                    t.columns_in_row = 0;
                }
            }
            ("td" | "th", false) => {
                if let Some(t) = table.as_mut() {
                    t.columns_in_row += 1;
                    t.columns = t.columns.max(t.columns_in_row);
                    t.cell = Some(Cell::default());
                }
            }
            ("td" | "th", true) => {
                if let Some(t) = table.as_mut() {
                    if let Some(mut cell) = t.cell.take() {
                        cell.text = cell.text.trim().to_string();
                        t.cells.push(cell);
                    }
                }
            }
            ("table", true) => {
                if let Some(t) = table.take() {
                    push_table(&mut document, t);
                }
            }
            ("p" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "div" | "blockquote", _) => {
                flush(&mut pending, &mut document);
            }
            _ => {}
        }
    }

    if skip_depth == 0 {
        let tail = unescape_entities(&body[cursor..]);
        if let Some(p) = pending.as_mut() {
            p.push_text(&tail);
        } else if !tail.trim().is_empty() {
            let mut p = Pending {
                paragraph: Paragraph::normal(""),
            };
            p.push_text(&tail);
            pending = Some(p);
        }
    }
    flush(&mut pending, &mut document);
    if let Some(t) = table.take() {
        push_table(&mut document, t);
    }

    document
}

fn push_table(document: &mut Document, table: PendingTable) {
    if table.rows == 1 && table.columns == 1 {
        document.tables.push(Table {
            position: document.paragraphs.len(),
            rows: 1,
            columns: 1,
            cells: table.cells,
        });
        return;
    }
    for cell in table.cells {
        if cell.text.is_empty() && cell.images.is_empty() {
            continue;
        }
        document.paragraphs.push(Paragraph {
            text: cell.text,
            images: cell.images,
            ..Paragraph::normal("")
        });
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Where an image lives on disk, if anywhere
fn image_file(base_dir: &Path, src: &str) -> Option<PathBuf> {
    let path = Path::new(src);
    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    candidate.is_file().then_some(candidate)
}

/// Render a document to HTML, embedding image copies beside `target`
fn render_document(document: &Document, target: &Path) -> Result<String, EditorError> {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let assets_name = format!("{}_files", stem);
    let assets_dir = target.parent().unwrap_or(Path::new(".")).join(&assets_name);

    let mut render_image = |image: &ImageRef| -> Result<String, EditorError> {
        let src = match image_file(&document.base_dir, &image.src) {
            Some(file) if !image.linked => {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                std::fs::create_dir_all(&assets_dir)?;
                let destination = assets_dir.join(&name);
                if file.canonicalize().ok() != destination.canonicalize().ok() {
                    std::fs::copy(&file, &destination)?;
                }
                format!("{}/{}", assets_name, name)
            }
            Some(file) => file.display().to_string(),
            None => {
                warn!("Image {:?} not found, keeping reference as-is", image.src);
                image.src.clone()
            }
        };
        Ok(format!("<img src=\"{}\">", escape_text(&src)))
    };

    let mut body = String::new();
    let mut open_list: Option<ListKind> = None;
    let close_list = |body: &mut String, open: &mut Option<ListKind>| {
        match open.take() {
            Some(ListKind::Bullet) => body.push_str("</ul>\n"),
            Some(ListKind::Numbered) => body.push_str("</ol>\n"),
            None => {}
        }
    };

    for (index, paragraph) in document.paragraphs.iter().enumerate() {
        for table in document.tables.iter().filter(|t| t.position == index) {
            close_list(&mut body, &mut open_list);
            body.push_str(&render_table(table, &mut render_image)?);
        }

        let mut content = escape_text(&paragraph.text);
        for image in &paragraph.images {
            content.push_str(&render_image(image)?);
        }

        if open_list != paragraph.list {
            close_list(&mut body, &mut open_list);
            match paragraph.list {
                Some(ListKind::Bullet) => body.push_str("<ul>\n"),
                Some(ListKind::Numbered) => body.push_str("<ol>\n"),
                None => {}
            }
            open_list = paragraph.list;
        }

        if paragraph.list.is_some() {
            body.push_str(&format!("<li>{}</li>\n", content));
            continue;
        }

        let html = match paragraph.style.as_str() {
            style if style.starts_with("Heading ") => {
                let level = style["Heading ".len()..].trim().parse::<u8>().unwrap_or(1).clamp(1, 6);
                format!("<h{level}>{content}</h{level}>\n")
            }
            "Normal" | "" => format!("<p>{}</p>\n", content),
            style => {
                let class: String = style.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
                format!("<p class=\"{}\">{}</p>\n", class, content)
            }
        };
        body.push_str(&html);
    }
    close_list(&mut body, &mut open_list);
    for table in document
        .tables
        .iter()
        .filter(|t| t.position >= document.paragraphs.len())
    {
        body.push_str(&render_table(table, &mut render_image)?);
    }

    let title = escape_text(document.title().unwrap_or(""));
    Ok(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        title, body
    ))
}

fn render_table(
    table: &Table,
    render_image: &mut impl FnMut(&ImageRef) -> Result<String, EditorError>,
) -> Result<String, EditorError> {
    let mut html = String::from("<table>\n");
    let columns = table.columns.max(1);
    for row in table.cells.chunks(columns) {
        html.push_str("<tr>");
        for cell in row {
            let mut content = escape_text(&cell.text);
            for image in &cell.images {
                content.push_str(&render_image(image)?);
            }
            html.push_str(&format!("<td>{}</td>", content));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    Ok(html)
}
