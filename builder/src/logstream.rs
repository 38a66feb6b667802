/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use slipway_core::logsink::LogSink;
use entity::log_entry::LogLevel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

const FLUSH_INTERVAL: Duration = Duration::from_millis(300);

/// Buffers a build's log lines and ships them to the control plane in
/// batches: a 300 ms ticker plus an explicit flush at completion.
///
/// A flush groups buffered entries by level and issues one POST per level,
/// so each persisted entry keeps its level and per-level order survives.
/// Shipping failures are reported on the worker's own diagnostics and
/// never interrupt the build.
pub struct LogStreamer {
    build_id: Uuid,
    sink: Arc<dyn LogSink>,
    buffer: Arc<Mutex<Vec<(LogLevel, String)>>>,
    flusher: JoinHandle<()>,
}

impl LogStreamer {
    pub fn new(sink: Arc<dyn LogSink>, build_id: Uuid) -> Self {
        let buffer: Arc<Mutex<Vec<(LogLevel, String)>>> = Arc::new(Mutex::new(Vec::new()));

        let flusher = tokio::spawn({
            let sink = Arc::clone(&sink);
            let buffer = Arc::clone(&buffer);

            async move {
                let mut interval = tokio::time::interval(FLUSH_INTERVAL);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

                loop {
                    interval.tick().await;
                    flush_buffer(&*sink, build_id, &buffer).await;
                }
            }
        });

        Self {
            build_id,
            sink,
            buffer,
            flusher,
        }
    }

    pub async fn push(&self, level: LogLevel, message: impl Into<String>) {
        self.buffer.lock().await.push((level, message.into()));
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message).await;
    }

    pub async fn flush(&self) {
        flush_buffer(&*self.sink, self.build_id, &self.buffer).await;
    }

    /// Final flush; stops the background ticker.
    pub async fn close(self) {
        self.flush().await;
        self.flusher.abort();
    }
}

async fn flush_buffer(
    sink: &dyn LogSink,
    build_id: Uuid,
    buffer: &Mutex<Vec<(LogLevel, String)>>,
) {
    let drained: Vec<(LogLevel, String)> = {
        let mut buffer = buffer.lock().await;
        std::mem::take(&mut *buffer)
    };

    for (level, chunk) in group_by_level(drained) {
        if let Err(e) = sink.post_logs(build_id, &chunk, level).await {
            tracing::warn!(build = %build_id, error = %e, "Failed to ship log chunk");
        }
    }
}

/// One chunk per level, levels in first-seen order, lines within a level
/// in their original order.
fn group_by_level(entries: Vec<(LogLevel, String)>) -> Vec<(LogLevel, String)> {
    let mut groups: Vec<(LogLevel, Vec<String>)> = Vec::new();

    for (level, message) in entries {
        match groups.iter_mut().find(|(l, _)| *l == level) {
            Some((_, lines)) => lines.push(message),
            None => groups.push((level, vec![message])),
        }
    }

    groups
        .into_iter()
        .map(|(level, lines)| (level, lines.join("\n")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: LogLevel, message: &str) -> (LogLevel, String) {
        (level, message.to_string())
    }

    #[test]
    fn groups_by_level_in_first_seen_order() {
        let grouped = group_by_level(vec![
            entry(LogLevel::Info, "first"),
            entry(LogLevel::Error, "boom"),
            entry(LogLevel::Info, "second"),
            entry(LogLevel::Success, "done"),
        ]);

        assert_eq!(
            grouped,
            vec![
                (LogLevel::Info, "first\nsecond".to_string()),
                (LogLevel::Error, "boom".to_string()),
                (LogLevel::Success, "done".to_string()),
            ]
        );
    }

    #[test]
    fn preserves_order_within_a_level() {
        let grouped = group_by_level(vec![
            entry(LogLevel::Info, "1"),
            entry(LogLevel::Info, "2"),
            entry(LogLevel::Info, "3"),
        ]);

        assert_eq!(grouped, vec![(LogLevel::Info, "1\n2\n3".to_string())]);
    }

    #[test]
    fn empty_input_produces_no_groups() {
        assert!(group_by_level(Vec::new()).is_empty());
    }
}
