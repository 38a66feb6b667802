/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use entity::log_entry::LogLevel;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::consts::LOG_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Serialize)]
pub struct LogMessage {
    #[serde(rename = "buildId")]
    pub build_id: Uuid,
    pub data: String,
    pub level: LogLevel,
}

/// In-process fan-out of build log lines, one topic per build id.
///
/// Publishing never blocks: a topic is a bounded broadcast channel, and a
/// subscriber that falls more than the backlog behind loses the overwritten
/// messages. Entries published before a subscriber joins are not replayed;
/// catch-up goes through the persisted log list.
#[derive(Debug, Default)]
pub struct LogHub {
    topics: Mutex<HashMap<Uuid, broadcast::Sender<LogMessage>>>,
}

impl LogHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, build_id: Uuid) -> broadcast::Receiver<LogMessage> {
        let mut topics = self.topics.lock().unwrap();

        topics
            .entry(build_id)
            .or_insert_with(|| broadcast::channel(LOG_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, message: LogMessage) {
        let mut topics = self.topics.lock().unwrap();

        if let Some(sender) = topics.get(&message.build_id) {
            let build_id = message.build_id;

            if sender.send(message).is_err() {
                // Last subscriber is gone, drop the topic.
                topics.remove(&build_id);
            }
        }
    }

    pub fn subscriber_count(&self, build_id: Uuid) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(&build_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(build_id: Uuid, data: &str) -> LogMessage {
        LogMessage {
            build_id,
            data: data.to_string(),
            level: LogLevel::Info,
        }
    }

    #[tokio::test]
    async fn delivers_to_subscribers() {
        let hub = LogHub::new();
        let build_id = Uuid::new_v4();

        let mut rx = hub.subscribe(build_id);
        hub.publish(message(build_id, "cloning repository"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data, "cloning repository");
        assert_eq!(received.build_id, build_id);
    }

    #[tokio::test]
    async fn no_replay_for_late_subscribers() {
        let hub = LogHub::new();
        let build_id = Uuid::new_v4();

        // Nobody listening, message is dropped.
        hub.publish(message(build_id, "early line"));

        let mut rx = hub.subscribe(build_id);
        hub.publish(message(build_id, "late line"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data, "late line");
    }

    #[tokio::test]
    async fn topics_are_isolated_by_build() {
        let hub = LogHub::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut rx_first = hub.subscribe(first);
        let _rx_second = hub.subscribe(second);

        hub.publish(message(second, "other build"));
        hub.publish(message(first, "this build"));

        let received = rx_first.recv().await.unwrap();
        assert_eq!(received.data, "this build");
    }

    #[tokio::test]
    async fn dropped_subscribers_release_topic() {
        let hub = LogHub::new();
        let build_id = Uuid::new_v4();

        let rx = hub.subscribe(build_id);
        assert_eq!(hub.subscriber_count(build_id), 1);

        drop(rx);
        hub.publish(message(build_id, "into the void"));

        assert_eq!(hub.subscriber_count(build_id), 0);
    }
}
