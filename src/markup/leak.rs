use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::models::{Degradation, Filtered};

static BODY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("Invalid body regex"));

static FIRST_H1_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h1\b").expect("Invalid h1 regex"));

static LEADING_UL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(?:<ul\b[^>]*>.*?</ul>\s*)+").expect("Invalid leading list regex")
});

/// Configuration for instruction-leak filtering
#[derive(Debug, Clone)]
pub struct LeakFilterConfig {
    /// Phrases that only occur in the instruction preamble (matched case-insensitively)
    pub signatures: Vec<String>,
    /// Compiled size limit, in bytes, of each per-signature matcher
    pub size_limit: usize,
}

impl Default for LeakFilterConfig {
    fn default() -> Self {
        Self {
            signatures: vec![
                "mso-style-name".to_string(),
                "preservation:".to_string(),
                "output:".to_string(),
                "strip and simplify".to_string(),
                "structure and mapping".to_string(),
                "list detection".to_string(),
                "self-check".to_string(),
            ],
            size_limit: 1 << 20,
        }
    }
}

/// Remove instruction text the generative service echoed into its answer
///
/// Applied in order:
/// 1. If a signature appears before the first `<h1>`, everything before that
///    heading is dropped.
/// 2. Any `<p>` or `<li>` whose text contains a signature is dropped.
/// 3. A run of `<ul>` blocks at the very start of the body is dropped.
///
/// Markup without a `<body>` is returned as-is. An internal fault returns the
/// input unchanged with [`Degradation::LeakFilterFault`].
pub fn strip_leaked_instructions(markup: &str, config: &LeakFilterConfig) -> Filtered<String> {
    match try_strip(markup, config) {
        Ok(Some(cleaned)) => Filtered::clean(cleaned),
        Ok(None) => {
            debug!("Leak filter: no body element, leaving markup unchanged");
            Filtered::clean(markup.to_string())
        }
        Err(reason) => {
            warn!("Leak filter skipped: {}", reason);
            Filtered::degraded(markup.to_string(), Degradation::LeakFilterFault(reason))
        }
    }
}

fn try_strip(markup: &str, config: &LeakFilterConfig) -> Result<Option<String>, String> {
    let Some(body_match) = BODY_REGEX.captures(markup).and_then(|caps| caps.get(1)) else {
        return Ok(None);
    };
    let signatures: Vec<String> = config
        .signatures
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect();

    let mut body = body_match.as_str();

    // 1. Leaked preamble before the real title
    if let Some(h1) = FIRST_H1_REGEX.find(body) {
        let prefix = body[..h1.start()].to_lowercase();
        if signatures.iter().any(|sig| prefix.contains(sig.as_str())) {
            debug!("Leak filter: dropping {} bytes before first heading", h1.start());
            body = &body[h1.start()..];
        }
    }

    // 2. Single leaked paragraphs or list items anywhere
    let mut body = body.to_string();
    for sig in &signatures {
        let escaped = regex::escape(sig);
        for tag in ["p", "li"] {
            let pattern = format!(r"(?is)<{tag}(?:\s[^>]*)?>[^<]*{escaped}[^<]*</{tag}>");
            let regex = RegexBuilder::new(&pattern)
                .size_limit(config.size_limit)
                .build()
                .map_err(|e| format!("signature matcher for {:?} failed: {}", truncate(sig), e))?;
            body = regex.replace_all(&body, "").into_owned();
        }
    }

    // 3. Echoed instruction bullets at the very start
    let body = LEADING_UL_REGEX.replace(&body, "");

    let mut result = String::with_capacity(markup.len());
    result.push_str(&markup[..body_match.start()]);
    result.push_str(&body);
    result.push_str(&markup[body_match.end()..]);
    Ok(Some(result))
}

fn truncate(sig: &str) -> String {
    sig.chars().take(40).collect()
}
