pub mod editor;
pub mod error;
pub mod heuristics;
pub mod io;
pub mod llm;
pub mod markup;
pub mod models;
pub mod pipeline;
pub mod stages;

pub use editor::{EditableDocument, EditorError, EditorSession, HtmlEditor, RetryPolicy, SessionGuard};
pub use error::PipelineError;
pub use heuristics::{FinishingConfig, apply_finishing, reconcile_lists};
pub use io::{StagingConfig, read_markup};
pub use llm::{
    AnthropicChat, AnthropicClient, AnthropicConfig, FileDropChat, GenerativeSession,
    ResponseStabilizer, StabilizerConfig,
};
pub use markup::{AssetRebaser, LeakFilterConfig, extract_body, strip_leaked_instructions};
pub use models::{Degradation, Filtered};
pub use pipeline::{BatchSummary, PipelineConfig, process_batch, process_document};
pub use stages::package_body;
