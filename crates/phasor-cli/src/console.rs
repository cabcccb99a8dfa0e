//! Console renditions of the status sink and the notifier.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use phasor_supervisor::{NotificationAction, Notifier, StatusSink, WriterSink};
use tracing::warn;

/// Status sink writing each line to stdout.
pub type ConsoleSink = WriterSink<io::Stdout>;

/// Notifier writing `error: ...` lines, with a settings hint when the
/// notification offers one.
#[derive(Debug)]
pub struct ConsoleNotifier<W> {
    writer: Mutex<W>,
}

impl<W: Write> ConsoleNotifier<W> {
    /// Wraps `writer`, normally stderr.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    fn write_lines(&self, lines: &[String]) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let written = lines
            .iter()
            .try_for_each(|line| writeln!(writer, "{line}"))
            .and_then(|()| writer.flush());
        if let Err(error) = written {
            warn!(
                target: "phasor_cli::console",
                error = %error,
                "failed to write notification"
            );
        }
    }
}

impl<W: Write + Send> Notifier for ConsoleNotifier<W> {
    fn error(&self, message: &str) {
        self.write_lines(&[format!("error: {message}")]);
    }

    fn error_with_action(&self, message: &str, action: NotificationAction) {
        let NotificationAction::OpenSettings(location) = action;
        self.write_lines(&[
            format!("error: {message}"),
            format!(
                "hint: set `{}` in the configuration file, the {} environment variable, or pass {}",
                location.key, location.env, location.flag
            ),
        ]);
    }
}

/// The user-facing collaborators handed to every command.
#[derive(Clone)]
pub struct Console {
    sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
}

impl Console {
    /// Bundles a sink and a notifier.
    #[must_use]
    pub fn new(sink: Arc<dyn StatusSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self { sink, notifier }
    }

    /// Status output on stdout and notifications on stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(
            Arc::new(ConsoleSink::new(io::stdout())),
            Arc::new(ConsoleNotifier::new(io::stderr())),
        )
    }

    /// Shared status sink.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn StatusSink> {
        Arc::clone(&self.sink)
    }

    /// Shared notifier.
    #[must_use]
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }
}
