//! In-memory log capture.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines written on the current thread.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Create an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route this thread's events at every level into the capture until the
    /// guard is dropped.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(Level::TRACE)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Every captured line.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.buf
            .lock()
            .map(|g| String::from_utf8_lossy(&g).lines().map(ToOwned::to_owned).collect())
            .unwrap_or_default()
    }

    /// Lines logged at `level` that contain `needle`.
    #[must_use]
    pub fn count(&self, level: Level, needle: &str) -> usize {
        let level = level.to_string();
        self.lines()
            .iter()
            .filter(|line| line.split_whitespace().next() == Some(level.as_str()))
            .filter(|line| line.contains(needle))
            .count()
    }
}

/// Writer handed out by [`LogCapture`].
#[derive(Debug)]
pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Ok(mut guard) = self.buf.lock() {
            guard.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_level_and_text() {
        let logs = LogCapture::new();
        {
            let _guard = logs.install();
            tracing::error!(chat_id = 1, "failed to deliver message");
            tracing::warn!("failed to deliver message");
            tracing::info!("alert relayed");
        }
        tracing::error!("after the guard");

        assert_eq!(logs.count(Level::ERROR, "failed to deliver"), 1);
        assert_eq!(logs.count(Level::WARN, "failed to deliver"), 1);
        assert_eq!(logs.count(Level::ERROR, ""), 1);
        assert_eq!(logs.lines().len(), 3);
    }
}
