use std::fmt;

/// A recoverable problem that made a step fall back to a weaker result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// No `<body>` element was found; the whole input was kept
    NoBodyBoundary,
    /// One or more asset references could not be resolved and were left as-is
    AssetUnresolved(Vec<String>),
    /// The leak filter hit an internal fault and passed its input through
    LeakFilterFault(String),
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::NoBodyBoundary => write!(f, "no body boundary found, kept entire input"),
            Degradation::AssetUnresolved(refs) => {
                write!(f, "{} asset reference(s) left unresolved: {}", refs.len(), refs.join(", "))
            }
            Degradation::LeakFilterFault(reason) => {
                write!(f, "leak filter skipped: {}", reason)
            }
        }
    }
}

/// Output of a best-effort transform
///
/// `diagnostic` is `None` on a clean success and carries the reason when the
/// transform fell back to a weaker result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered<T> {
    pub value: T,
    pub diagnostic: Option<Degradation>,
}

impl<T> Filtered<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }

    pub fn degraded(value: T, diagnostic: Degradation) -> Self {
        Self {
            value,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
