//! Ordered progress output with a single writer task.

use std::io::Write;

use tokio::sync::mpsc;

use crate::message::Styled;

/// Messages accepted by the status writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Line(String),
    /// Stop the writer; nothing after this is written.
    Shutdown,
}

/// Handle for emitting status lines.
///
/// Cheaply cloneable; sending never blocks.
#[derive(Clone)]
pub struct StatusSink {
    tx: mpsc::UnboundedSender<StatusMessage>,
    color: bool,
}

impl StatusSink {
    /// Render and enqueue a styled line.
    pub fn emit(&self, line: Styled) {
        self.send(StatusMessage::Line(line.render(self.color)));
    }

    /// Enqueue unstyled text.
    pub fn emit_text(&self, text: impl Into<String>) {
        self.send(StatusMessage::Line(text.into()));
    }

    /// Ask the writer to stop after the lines already queued.
    pub fn shutdown(&self) {
        self.send(StatusMessage::Shutdown);
    }

    fn send(&self, message: StatusMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Status writer already stopped; dropping message");
        }
    }
}

/// Background task writing status lines in arrival order.
pub struct StatusWriter<W> {
    rx: mpsc::UnboundedReceiver<StatusMessage>,
    out: W,
}

impl<W: Write> StatusWriter<W> {
    /// Consume lines until a shutdown message arrives or every sink is dropped.
    ///
    /// Spawn with `tokio::spawn(writer.run())`.
    pub async fn run(mut self) -> W {
        while let Some(message) = self.rx.recv().await {
            match message {
                StatusMessage::Line(line) => {
                    if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
                        tracing::error!("Failed to write status line: {}", e);
                    }
                }
                StatusMessage::Shutdown => break,
            }
        }

        tracing::debug!("Status writer shutting down");
        self.out
    }
}

/// Create a connected status sink and writer.
pub fn status_channel<W: Write>(out: W, color: bool) -> (StatusSink, StatusWriter<W>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusSink { tx, color }, StatusWriter { rx, out })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Tone;

    #[tokio::test]
    async fn test_lines_written_in_order() {
        let (sink, writer) = status_channel(Vec::new(), false);
        sink.emit_text("first");
        sink.emit(Styled::new().push(Tone::Green, "second"));
        sink.shutdown();

        let out = writer.run().await;
        assert_eq!(String::from_utf8(out).unwrap(), "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_nothing_written_after_shutdown() {
        let (sink, writer) = status_channel(Vec::new(), false);
        sink.emit_text("before");
        sink.shutdown();
        sink.emit_text("after");

        let out = writer.run().await;
        assert_eq!(String::from_utf8(out).unwrap(), "before\n");
    }

    #[tokio::test]
    async fn test_colored_rendering() {
        let (sink, writer) = status_channel(Vec::new(), true);
        sink.emit(Styled::new().push(Tone::Red, "Error"));
        drop(sink);

        let out = String::from_utf8(writer.run().await).unwrap();
        assert!(out.contains("\x1b["));
        assert!(out.contains("Error"));
    }

    #[tokio::test]
    async fn test_emit_after_writer_dropped() {
        let (sink, writer) = status_channel(Vec::new(), false);
        drop(writer);
        // Should not panic
        sink.emit_text("lost");
    }
}
