use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::AnthropicClient;
use crate::error::PipelineError;
use crate::markup::unescape_entities;

/// A remote generative interface that answers one submission over time
///
/// There is no completion signal: callers poll [`observe`](Self::observe)
/// and decide for themselves when the visible answer is final.
pub trait GenerativeSession {
    /// Open the session; `workspace` is the private directory of the current run
    fn start(&mut self, workspace: &Path) -> Result<(), PipelineError>;

    /// Deliver the packaged submission
    fn submit(&mut self, content: &str) -> Result<(), PipelineError>;

    /// Raw text currently visible as the answer, if any
    fn observe(&mut self) -> Result<Option<String>, PipelineError>;

    /// Close the session; must be safe to call on every exit path
    fn stop(&mut self);
}

/// Scoped ownership of a started generative session
pub struct ChatGuard<'a, C: GenerativeSession> {
    session: &'a mut C,
}

impl<'a, C: GenerativeSession> ChatGuard<'a, C> {
    pub fn start(session: &'a mut C, workspace: &Path) -> Result<Self, PipelineError> {
        session.start(workspace)?;
        Ok(Self { session })
    }
}

impl<C: GenerativeSession> Deref for ChatGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.session
    }
}

impl<C: GenerativeSession> DerefMut for ChatGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.session
    }
}

impl<C: GenerativeSession> Drop for ChatGuard<'_, C> {
    fn drop(&mut self) {
        self.session.stop();
    }
}

/// Extract the generated document from raw visible text
///
/// Strips a surrounding code fence, decodes escaped markup, and slices from
/// the first `<html` to the last `</html>` inclusive.
pub fn extract_candidate(raw: &str) -> Option<String> {
    let mut text = raw.trim();

    if let Some(fenced) = text.strip_prefix("```") {
        // Drop the fence line, language tag included
        text = match fenced.find('\n') {
            Some(newline) => &fenced[newline + 1..],
            None => fenced,
        }
        .trim();
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }

    let text = if ["&lt;", "&gt;", "&amp;"].iter().any(|e| text.contains(e)) {
        unescape_entities(text)
    } else {
        text.to_string()
    };

    let lower = text.to_ascii_lowercase();
    let start = lower.find("<html")?;
    let end = lower.rfind("</html>")? + "</html>".len();
    (start < end).then(|| text[start..end].to_string())
}

#[derive(Debug, Clone, Default)]
enum Reply {
    #[default]
    Pending,
    Done(String),
    Failed(String),
}

/// Generative session backed by the Anthropic Messages API
///
/// The request runs on its own task; observations read whatever the task
/// has stored so far.
pub struct AnthropicChat {
    client: AnthropicClient,
    started: bool,
    reply: Arc<Mutex<Reply>>,
    task: Option<JoinHandle<()>>,
}

impl AnthropicChat {
    pub fn new(client: AnthropicClient) -> Self {
        Self {
            client,
            started: false,
            reply: Arc::new(Mutex::new(Reply::Pending)),
            task: None,
        }
    }
}

impl GenerativeSession for AnthropicChat {
    fn start(&mut self, _workspace: &Path) -> Result<(), PipelineError> {
        self.started = true;
        self.reply = Arc::new(Mutex::new(Reply::Pending));
        debug!("Started chat with model {}", self.client.model());
        Ok(())
    }

    fn submit(&mut self, content: &str) -> Result<(), PipelineError> {
        if !self.started {
            return Err(PipelineError::MissingComposer(
                "chat session not started".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(PipelineError::Submission("submission is empty".to_string()));
        }

        info!("Submitting {} chars to {}", content.chars().count(), self.client.model());
        let client = self.client.clone();
        let reply = Arc::clone(&self.reply);
        let content = content.to_string();
        self.task = Some(tokio::spawn(async move {
            let outcome = match client.send_message(None, &content).await {
                Ok(text) => Reply::Done(text),
                Err(e) => Reply::Failed(format!("{:#}", e)),
            };
            if let Ok(mut slot) = reply.lock() {
                *slot = outcome;
            }
        }));
        Ok(())
    }

    fn observe(&mut self) -> Result<Option<String>, PipelineError> {
        let reply = self
            .reply
            .lock()
            .map_err(|_| PipelineError::Submission("reply buffer poisoned".to_string()))?;
        match &*reply {
            Reply::Pending => Ok(None),
            // A finished reply never changes, so one without a document is final
            Reply::Done(text) if extract_candidate(text).is_none() => Err(
                PipelineError::Submission("finished reply contains no HTML document".to_string()),
            ),
            Reply::Done(text) => Ok(Some(text.clone())),
            Reply::Failed(e) => Err(PipelineError::Submission(e.clone())),
        }
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.started = false;
    }
}

/// Generative session driven by a person at a chat UI
///
/// The submission is written to `prompt.txt` in the run's workspace; the
/// answer is read from `reply.html` there as it is saved.
#[derive(Debug, Default)]
pub struct FileDropChat {
    workspace: Option<PathBuf>,
}

impl FileDropChat {
    pub const PROMPT_FILE: &'static str = "prompt.txt";
    pub const REPLY_FILE: &'static str = "reply.html";

    pub fn new() -> Self {
        Self::default()
    }

    fn reply_path(&self) -> Option<PathBuf> {
        self.workspace.as_ref().map(|w| w.join(Self::REPLY_FILE))
    }
}

impl GenerativeSession for FileDropChat {
    fn start(&mut self, workspace: &Path) -> Result<(), PipelineError> {
        if !workspace.is_dir() {
            return Err(PipelineError::MissingComposer(format!(
                "workspace {:?} does not exist",
                workspace
            )));
        }
        let stale = workspace.join(Self::REPLY_FILE);
        if stale.exists() {
            std::fs::remove_file(&stale).map_err(|e| {
                PipelineError::Submission(format!("cannot clear stale reply {:?}: {}", stale, e))
            })?;
        }
        self.workspace = Some(workspace.to_path_buf());
        Ok(())
    }

    fn submit(&mut self, content: &str) -> Result<(), PipelineError> {
        let Some(workspace) = &self.workspace else {
            return Err(PipelineError::MissingComposer(
                "file-drop session not started".to_string(),
            ));
        };
        if content.trim().is_empty() {
            return Err(PipelineError::Submission("submission is empty".to_string()));
        }

        let prompt = workspace.join(Self::PROMPT_FILE);
        std::fs::write(&prompt, content)
            .map_err(|e| PipelineError::Submission(format!("cannot write {:?}: {}", prompt, e)))?;
        info!(
            "Paste {:?} into the chat and save the answer as {:?}",
            prompt,
            workspace.join(Self::REPLY_FILE)
        );
        Ok(())
    }

    fn observe(&mut self) -> Result<Option<String>, PipelineError> {
        let Some(path) = self.reply_path() else {
            return Err(PipelineError::MissingComposer(
                "file-drop session not started".to_string(),
            ));
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("Cannot read {:?}: {}", path, e);
                Err(PipelineError::Submission(format!("cannot read {:?}: {}", path, e)))
            }
        }
    }

    fn stop(&mut self) {
        self.workspace = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::AnthropicConfig;

    #[test]
    fn test_extract_strips_fences() {
        let raw = "```html\n<!DOCTYPE html>\n<html><head></head><body>x</body></html>\n```";
        assert_eq!(
            extract_candidate(raw).as_deref(),
            Some("<html><head></head><body>x</body></html>")
        );
    }

    #[test]
    fn test_extract_unescapes_entities() {
        let raw = "Here you go: &lt;html&gt;&lt;body&gt;A &amp;amp; B&lt;/body&gt;&lt;/html&gt; done";
        assert_eq!(
            extract_candidate(raw).as_deref(),
            Some("<html><body>A &amp; B</body></html>")
        );
    }

    #[test]
    fn test_extract_requires_document_span() {
        assert_eq!(extract_candidate("<html><body>still typing"), None);
        assert_eq!(extract_candidate("no markup at all"), None);
        assert_eq!(extract_candidate(""), None);
    }

    #[test]
    fn test_finished_reply_without_document_fails_fast() {
        let client = AnthropicClient::new(AnthropicConfig::new("key".to_string(), "model".to_string()));
        let mut chat = AnthropicChat::new(client);

        *chat.reply.lock().unwrap() = Reply::Done("I can't convert this file.".to_string());
        assert!(matches!(chat.observe(), Err(PipelineError::Submission(_))));

        let document = "<html><body>ok</body></html>";
        *chat.reply.lock().unwrap() = Reply::Done(document.to_string());
        assert_eq!(chat.observe().unwrap().as_deref(), Some(document));
    }

    #[test]
    fn test_file_drop_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut chat = FileDropChat::new();
        {
            let mut guard = ChatGuard::start(&mut chat, dir.path()).unwrap();
            guard.submit("prompt body").unwrap();
            assert_eq!(guard.observe().unwrap(), None);

            std::fs::write(dir.path().join(FileDropChat::REPLY_FILE), "<html></html>").unwrap();
            assert_eq!(guard.observe().unwrap().as_deref(), Some("<html></html>"));
        }
        assert_eq!(
            std::fs::read_to_string(dir.path().join(FileDropChat::PROMPT_FILE)).unwrap(),
            "prompt body"
        );
        // Guard dropped: session is stopped
        assert!(matches!(chat.observe(), Err(PipelineError::MissingComposer(_))));
    }

    #[test]
    fn test_file_drop_rejects_empty_submission() {
        let dir = tempfile::tempdir().unwrap();
        let mut chat = FileDropChat::new();
        chat.start(dir.path()).unwrap();
        assert!(matches!(chat.submit("  \n"), Err(PipelineError::Submission(_))));
    }

    #[test]
    fn test_submit_before_start() {
        let mut chat = FileDropChat::new();
        assert!(matches!(chat.submit("x"), Err(PipelineError::MissingComposer(_))));
    }
}
