use std::sync::LazyLock;

use regex::{Captures, Regex};

static LI_SINGLE_P_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<li>\s*<p(\s[^>]*)?>(.*?)</p>\s*</li>").expect("Invalid list item regex")
});

static BULLETED_CLASS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*["'][^"']*\bBulletedList\b"#).expect("Invalid class regex")
});

static NESTED_P_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p[\s>]").expect("Invalid paragraph regex"));

/// Unwrap `<li><p>text</p></li>` into `<li>text</li>`
///
/// Items whose paragraph carries the `BulletedList` class keep it, since that
/// class is what maps them onto the bulleted paragraph style on import. Items
/// holding several paragraphs are left alone.
pub fn unwrap_list_item_paragraphs(markup: &str) -> String {
    LI_SINGLE_P_REGEX
        .replace_all(markup, |caps: &Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str());

            if BULLETED_CLASS_REGEX.is_match(attrs) || NESTED_P_REGEX.is_match(inner) {
                whole.to_string()
            } else {
                format!("<li>{}</li>", inner)
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwraps_plain_paragraph_items() {
        let html = "<ol><li>\n<p>First</p>\n</li><li><p class=\"Normal\">Second</p></li></ol>";
        assert_eq!(
            unwrap_list_item_paragraphs(html),
            "<ol><li>First</li><li>Second</li></ol>"
        );
    }

    #[test]
    fn test_keeps_bulleted_list_paragraphs() {
        let html = r#"<ul><li><p class="BulletedList">Item</p></li></ul>"#;
        assert_eq!(unwrap_list_item_paragraphs(html), html);
    }

    #[test]
    fn test_keeps_multi_paragraph_items() {
        let html = "<ol><li><p>a</p><p>b</p></li></ol>";
        assert_eq!(unwrap_list_item_paragraphs(html), html);
    }
}
