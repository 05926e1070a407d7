use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Degradation, Filtered};

static BODY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("Invalid body regex"));

/// Presentation and script noise, in removal order
static NOISE_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<style[^>]*>.*?</style>",
        r"(?is)<script[^>]*>.*?</script>",
        r"(?is)<link[^>]*?>",
        r"(?is)<!--.*?-->",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid noise regex"))
    .collect()
});

/// Extract the content-bearing body of exported markup
///
/// Keeps only what is inside `<body>`, then drops `<style>`, `<script>`,
/// `<link>` and comments. Ordering, text and asset references of the kept
/// markup are untouched. Markup without a body element is kept whole, and
/// the result carries [`Degradation::NoBodyBoundary`].
pub fn extract_body(full_markup: &str) -> Filtered<String> {
    let (body, found) = match BODY_REGEX.captures(full_markup) {
        Some(caps) => (caps.get(1).map_or("", |m| m.as_str()), true),
        None => (full_markup, false),
    };

    let mut cleaned = body.to_string();
    for regex in NOISE_REGEXES.iter() {
        cleaned = regex.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.trim().to_string();

    if found {
        Filtered::clean(cleaned)
    } else {
        Filtered::degraded(cleaned, Degradation::NoBodyBoundary)
    }
}
