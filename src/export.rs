//! Export Channel - clipboard and file sinks
//!
//! Two independent actions, share and download, each with its own
//! acknowledgment indicator. Indicators are reset by the end of their
//! presentation animation, never by a timer.
//!
//! Clipboard failures are reported. File saves are fire-and-forget: a sink
//! failure looks the same as the user dismissing the dialog.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::generator::{RULES_FILE_NAME, RULES_MEDIA_TYPE};
use crate::hashing::sha256_hex;
use crate::pipeline::Derivation;
use crate::share::{encode_to_shareable_url, ShareLinkError};

/// Name used when a file is offered without one
pub const DEFAULT_FILE_NAME: &str = "download";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("Clipboard access denied: {0}")]
    ClipboardDenied(String),

    #[error("Share link error: {0}")]
    ShareLink(#[from] ShareLinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportAction {
    Share,
    Download,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckState {
    #[default]
    Idle,
    Shown,
}

/// Transient "done" flag for one export action.
///
/// Idle -> Shown on `trigger`, Shown -> Idle on `animation_ended`.
/// Triggering while shown keeps it shown, so there is exactly one reset
/// per visible period.
#[derive(Debug, Clone, Default)]
pub struct AckIndicator {
    state: AckState,
}

impl AckIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AckState {
        self.state
    }

    pub fn is_shown(&self) -> bool {
        self.state == AckState::Shown
    }

    /// Returns true when a new presentation animation starts
    pub fn trigger(&mut self) -> bool {
        match self.state {
            AckState::Idle => {
                self.state = AckState::Shown;
                true
            }
            AckState::Shown => false,
        }
    }

    /// Returns true when this event reset the flag
    pub fn animation_ended(&mut self) -> bool {
        match self.state {
            AckState::Shown => {
                self.state = AckState::Idle;
                true
            }
            AckState::Idle => false,
        }
    }
}

/// A file offered to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub name: String,
    pub media_type: String,
    pub content: Vec<u8>,
}

impl ExportFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() { DEFAULT_FILE_NAME.to_string() } else { name },
            media_type: media_type.into(),
            content: content.into(),
        }
    }

    /// `tests.json` for a valid derivation
    pub fn rules(derivation: &Derivation) -> Option<Self> {
        derivation
            .tests_json()
            .map(|json| Self::new(RULES_FILE_NAME, RULES_MEDIA_TYPE, json))
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub path: PathBuf,
    pub media_type: String,
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub action: ExportAction,
    /// False when the indicator was already showing
    pub animation_started: bool,
    pub receipt: Option<SaveReceipt>,
}

#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ExportError>;
}

#[async_trait]
pub trait FileSink: Send + Sync {
    /// Offer `file` to the user. May never resolve if the user never answers.
    async fn offer(&self, file: &ExportFile) -> Result<SaveReceipt, ExportError>;
}

/// Clipboard backed by a platform program reading from stdin
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Pick the usual clipboard program for this platform
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("pbcopy", vec![])
        } else if cfg!(target_os = "windows") {
            Self::new("clip", vec![])
        } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            Self::new("wl-copy", vec![])
        } else {
            Self::new("xclip", vec!["-selection".into(), "clipboard".into()])
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ClipboardSink for CommandClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ExportError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            // Clipboard programs may fork to keep serving the selection.
            // Nothing is left for the forked process to hold open.
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    ExportError::ClipboardUnavailable(format!("{}: {}", self.program, e))
                }
                ErrorKind::PermissionDenied => {
                    ExportError::ClipboardDenied(format!("{}: {}", self.program, e))
                }
                _ => ExportError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(ExportError::ClipboardDenied(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

/// Saves offered files into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn offer(&self, file: &ExportFile) -> Result<SaveReceipt, ExportError> {
        // Only the final component of a suggested name is honoured
        let name = Path::new(&file.name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME));
        let path = self.dir.join(name);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, &file.content).await?;

        Ok(SaveReceipt {
            path,
            media_type: file.media_type.clone(),
            bytes: file.content.len(),
            sha256: sha256_hex(&file.content),
        })
    }
}

/// Share and download actions over pluggable sinks.
///
/// All actions take `&self`: a save waiting on the user never blocks a
/// share, another download, or an animation-end event. Indicator locks are
/// never held across an await.
pub struct ExportChannel {
    clipboard: Box<dyn ClipboardSink>,
    files: Box<dyn FileSink>,
    share_indicator: Mutex<AckIndicator>,
    download_indicator: Mutex<AckIndicator>,
}

impl ExportChannel {
    pub fn new(clipboard: Box<dyn ClipboardSink>, files: Box<dyn FileSink>) -> Self {
        Self {
            clipboard,
            files,
            share_indicator: Mutex::new(AckIndicator::new()),
            download_indicator: Mutex::new(AckIndicator::new()),
        }
    }

    fn lock(&self, action: ExportAction) -> MutexGuard<'_, AckIndicator> {
        let indicator = match action {
            ExportAction::Share => &self.share_indicator,
            ExportAction::Download => &self.download_indicator,
        };
        // AckIndicator has no invariant a panicking holder could break
        indicator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the indicator for `action`
    pub fn indicator(&self, action: ExportAction) -> AckIndicator {
        self.lock(action).clone()
    }

    /// Presentation animation for `action` finished
    pub fn animation_ended(&self, action: ExportAction) -> bool {
        self.lock(action).animation_ended()
    }

    pub async fn copy_to_clipboard(&self, text: &str) -> Result<Ack, ExportError> {
        if let Err(e) = self.clipboard.write_text(text).await {
            warn!(error = %e, "clipboard write failed");
            return Err(e);
        }

        let animation_started = self.lock(ExportAction::Share).trigger();
        info!(chars = text.chars().count(), "copied to clipboard");
        Ok(Ack {
            action: ExportAction::Share,
            animation_started,
            receipt: None,
        })
    }

    /// Offer a file. `None` covers both dismissal and sink failure.
    pub async fn save_as_file(&self, file: ExportFile) -> Option<Ack> {
        match self.files.offer(&file).await {
            Ok(receipt) => {
                let animation_started = self.lock(ExportAction::Download).trigger();
                info!(
                    file = %receipt.path.display(),
                    bytes = receipt.bytes,
                    sha256 = %receipt.sha256,
                    "saved export"
                );
                Some(Ack {
                    action: ExportAction::Download,
                    animation_started,
                    receipt: Some(receipt),
                })
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "file was not saved");
                None
            }
        }
    }

    /// Build the share link for `text` and copy it. Returns the link.
    pub async fn share(&self, origin: &str, text: &str) -> Result<(String, Ack), ExportError> {
        let url = encode_to_shareable_url(origin, text)?;
        let ack = self.copy_to_clipboard(&url).await?;
        Ok((url, ack))
    }

    /// Download the rules of `derivation` as they are at call time
    pub async fn download(&self, derivation: &Derivation) -> Option<Ack> {
        let Some(file) = ExportFile::rules(derivation) else {
            debug!("download requested without generated rules");
            return None;
        };
        self.save_as_file(file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default, Clone)]
    struct MemoryClipboard {
        writes: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ClipboardSink for MemoryClipboard {
        async fn write_text(&self, text: &str) -> Result<(), ExportError> {
            self.writes.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct DeniedClipboard;

    #[async_trait]
    impl ClipboardSink for DeniedClipboard {
        async fn write_text(&self, _text: &str) -> Result<(), ExportError> {
            Err(ExportError::ClipboardDenied("not allowed".into()))
        }
    }

    struct FailingSink;

    #[async_trait]
    impl FileSink for FailingSink {
        async fn offer(&self, _file: &ExportFile) -> Result<SaveReceipt, ExportError> {
            Err(ExportError::Io(std::io::Error::new(ErrorKind::Other, "disk full")))
        }
    }

    struct PendingSink;

    #[async_trait]
    impl FileSink for PendingSink {
        async fn offer(&self, _file: &ExportFile) -> Result<SaveReceipt, ExportError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_indicator_resets_once() {
        let mut indicator = AckIndicator::new();
        assert!(!indicator.animation_ended());
        assert!(indicator.trigger());
        assert!(!indicator.trigger());
        assert!(indicator.is_shown());
        assert!(indicator.animation_ended());
        assert!(!indicator.animation_ended());
        assert_eq!(indicator.state(), AckState::Idle);
    }

    #[test]
    fn test_export_file_default_name() {
        let file = ExportFile::new("", "text/plain", "hi");
        assert_eq!(file.name, "download");
        assert_eq!(file.text(), Some("hi"));
    }

    #[tokio::test]
    async fn test_copy_triggers_share_indicator() {
        let clipboard = MemoryClipboard::default();
        let writes = clipboard.writes.clone();
        let channel = ExportChannel::new(Box::new(clipboard), Box::new(FailingSink));

        let ack = channel.copy_to_clipboard("text").await.unwrap();
        assert!(ack.animation_started);
        assert!(channel.indicator(ExportAction::Share).is_shown());
        assert!(!channel.indicator(ExportAction::Download).is_shown());

        let again = channel.copy_to_clipboard("text").await.unwrap();
        assert!(!again.animation_started);
        assert_eq!(*writes.lock().unwrap(), vec!["text", "text"]);

        assert!(channel.animation_ended(ExportAction::Share));
        assert!(!channel.animation_ended(ExportAction::Share));
    }

    #[tokio::test]
    async fn test_denied_clipboard_is_reported() {
        let channel = ExportChannel::new(Box::new(DeniedClipboard), Box::new(FailingSink));
        let err = channel.copy_to_clipboard("text").await.unwrap_err();
        assert!(matches!(err, ExportError::ClipboardDenied(_)));
        assert!(!channel.indicator(ExportAction::Share).is_shown());
    }

    #[tokio::test]
    async fn test_share_copies_link() {
        let clipboard = MemoryClipboard::default();
        let writes = clipboard.writes.clone();
        let channel = ExportChannel::new(Box::new(clipboard), Box::new(FailingSink));

        let (url, _) = channel.share("https://x.test", "hello world").await.unwrap();
        assert_eq!(url, "https://x.test/?spec=hello%20world");
        assert_eq!(*writes.lock().unwrap(), vec![url]);
    }

    #[tokio::test]
    async fn test_failed_save_is_silent() {
        let channel =
            ExportChannel::new(Box::new(MemoryClipboard::default()), Box::new(FailingSink));
        let ack = channel
            .save_as_file(ExportFile::new("a.json", RULES_MEDIA_TYPE, "[]"))
            .await;
        assert!(ack.is_none());
        assert!(!channel.indicator(ExportAction::Download).is_shown());
    }

    #[tokio::test]
    async fn test_pending_save_never_acknowledges() {
        let channel =
            ExportChannel::new(Box::new(MemoryClipboard::default()), Box::new(PendingSink));
        let save = channel.save_as_file(ExportFile::new("a.json", RULES_MEDIA_TYPE, "[]"));
        let outcome = tokio::time::timeout(Duration::from_millis(20), save).await;
        assert!(outcome.is_err());
        assert!(!channel.indicator(ExportAction::Download).is_shown());
    }

    #[tokio::test]
    async fn test_share_while_save_pending() {
        let clipboard = MemoryClipboard::default();
        let writes = clipboard.writes.clone();
        let channel = ExportChannel::new(Box::new(clipboard), Box::new(PendingSink));

        let save = tokio::time::timeout(
            Duration::from_millis(50),
            channel.save_as_file(ExportFile::new("a.json", RULES_MEDIA_TYPE, "[]")),
        );
        let share = async {
            let shared = channel.share("https://x.test", "{}").await;
            let shown = channel.indicator(ExportAction::Share).is_shown();
            let reset = channel.animation_ended(ExportAction::Share);
            (shared, shown, reset)
        };

        let (saved, (shared, shown, reset)) = tokio::join!(save, share);
        assert!(saved.is_err());
        let (url, ack) = shared.unwrap();
        assert!(ack.animation_started);
        assert!(shown);
        assert!(reset);
        assert_eq!(*writes.lock().unwrap(), vec![url]);
        assert!(!channel.indicator(ExportAction::Download).is_shown());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_forking_clipboard_program_returns() {
        let clipboard = CommandClipboard::new(
            "sh",
            vec!["-c".into(), "cat >/dev/null; sleep 30 &".into()],
        );
        let written = tokio::time::timeout(Duration::from_secs(5), clipboard.write_text("x")).await;
        assert!(matches!(written, Ok(Ok(()))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_clipboard_program_is_denied() {
        let clipboard = CommandClipboard::new("sh", vec!["-c".into(), "cat >/dev/null; exit 3".into()]);
        let err = clipboard.write_text("x").await.unwrap_err();
        assert!(matches!(err, ExportError::ClipboardDenied(_)));
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        let file = ExportFile::new("../escape/tests.json", RULES_MEDIA_TYPE, "[]");

        let receipt = sink.offer(&file).await.unwrap();
        assert_eq!(receipt.path, dir.path().join("out").join("tests.json"));
        assert_eq!(receipt.bytes, 2);
        assert_eq!(receipt.sha256, sha256_hex(b"[]"));
        assert_eq!(std::fs::read_to_string(&receipt.path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_missing_clipboard_program() {
        let clipboard = CommandClipboard::new("dccrules-no-such-clipboard-program", vec![]);
        let err = clipboard.write_text("x").await.unwrap_err();
        assert!(matches!(err, ExportError::ClipboardUnavailable(_)));
    }
}
