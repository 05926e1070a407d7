/// Structural anchors a generated document must contain to count as complete
const REQUIRED_ANCHORS: [&str; 4] = ["<html", "</html", "<head", "<body"];

/// One polling-tick snapshot of a partially generated answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Extracted markup text
    pub text: String,
    /// Whether all required structural anchors are present
    pub complete: bool,
    /// Length in characters
    pub len: usize,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let complete = looks_complete(&text);
        let len = text.chars().count();
        Self {
            text,
            complete,
            len,
        }
    }
}

/// Check whether text contains every anchor of a well-formed document
pub fn looks_complete(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_ascii_lowercase();
    REQUIRED_ANCHORS.iter().all(|anchor| lower.contains(anchor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_document() {
        let c = Candidate::new("<HTML><head></head><Body>x</body></html>");
        assert!(c.complete);
        assert_eq!(c.len, 40);
    }

    #[test]
    fn test_fragment_is_incomplete() {
        assert!(!Candidate::new("<html><body>partial").complete);
        assert!(!Candidate::new("").complete);
    }

    #[test]
    fn test_len_counts_characters() {
        assert_eq!(Candidate::new("é<").len, 2);
    }
}
