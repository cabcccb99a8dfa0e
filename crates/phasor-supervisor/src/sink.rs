//! User-facing collaborators: the status sink and the notification surface.
//!
//! The supervisor and the server session only ever write to these; neither
//! reads back. Both are shared through `Arc<dyn ...>` handles owned by the
//! [`HostContext`](crate::HostContext).

use std::io::Write;
use std::sync::Mutex;

use phasor_config::SettingLocation;
use tracing::warn;

/// Append-only, user-visible log shared by runs and the server session.
pub trait StatusSink: Send + Sync {
    /// Removes everything shown so far.
    fn clear(&self);

    /// Appends one entry. `text` is shown verbatim and may span lines.
    fn append_line(&self, text: &str);

    /// Reveals the sink, optionally taking focus.
    fn show(&self, bring_to_front: bool);
}

/// Action attached to an error notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// Offer to open the setting that needs fixing.
    OpenSettings(SettingLocation),
}

/// Modal or toast error display.
pub trait Notifier: Send + Sync {
    /// Shows a plain error message.
    fn error(&self, message: &str);

    /// Shows an error message offering `action`.
    fn error_with_action(&self, message: &str, action: NotificationAction);
}

/// One recorded interaction with a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEntry {
    /// The sink was cleared.
    Cleared,
    /// A line was appended.
    Line(String),
    /// The sink was revealed.
    Shown {
        /// Whether focus was requested.
        bring_to_front: bool,
    },
}

/// Sink that keeps every interaction in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SinkEntry>>,
}

impl MemorySink {
    /// Builds an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded interaction, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<SinkEntry> {
        self.lock().clone()
    }

    /// Lines currently visible, i.e. appended since the last clear.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let entries = self.lock();
        let start = entries
            .iter()
            .rposition(|entry| matches!(entry, SinkEntry::Cleared))
            .map_or(0, |index| index + 1);
        entries
            .iter()
            .skip(start)
            .filter_map(|entry| match entry {
                SinkEntry::Line(text) => Some(text.clone()),
                SinkEntry::Cleared | SinkEntry::Shown { .. } => None,
            })
            .collect()
    }

    /// Whether nothing has been recorded at all.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SinkEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl StatusSink for MemorySink {
    fn clear(&self) {
        self.lock().push(SinkEntry::Cleared);
    }

    fn append_line(&self, text: &str) {
        self.lock().push(SinkEntry::Line(text.to_owned()));
    }

    fn show(&self, bring_to_front: bool) {
        self.lock().push(SinkEntry::Shown { bring_to_front });
    }
}

/// Sink that streams lines to a writer such as stdout.
///
/// A terminal cannot be cleared or focused meaningfully, so `clear` and
/// `show` do nothing.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write> WriterSink<W> {
    /// Wraps `writer`.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the writer, consuming the sink.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> StatusSink for WriterSink<W> {
    fn clear(&self) {}

    fn append_line(&self, text: &str) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(error) = writeln!(writer, "{text}").and_then(|()| writer.flush()) {
            warn!(
                target: "phasor_supervisor::sink",
                error = %error,
                "failed to write status line"
            );
        }
    }

    fn show(&self, _bring_to_front: bool) {}
}
