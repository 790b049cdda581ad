//! Best-effort notification relay.
//!
//! A process-wide registry from user id to an open channel. Delivery is
//! fire-and-forget: if the recipient has no registered channel, or the
//! channel is closed, the event is dropped. No queueing, no replay.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{TaskStatus, TaskType};

/// Lifecycle events pushed to connected clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    TaskSubmitted {
        task_id: String,
        submitter_id: String,
        task_type: TaskType,
        title: String,
    },
    TaskAssigned {
        task_id: String,
        assignee_id: String,
        task_type: TaskType,
        title: String,
        deadline: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        assigner_id: String,
        title: String,
    },
    TaskReviewed {
        task_id: String,
        recipient_id: String,
        status: TaskStatus,
        points: i64,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        rejection_reason: Option<String>,
    },
}

/// Registry of live connections, keyed by user id. One channel per user;
/// re-registering replaces the previous channel.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Sender<Notification>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: impl Into<String>, channel: Sender<Notification>) {
        let mut connections = self.connections.lock().expect("registry poisoned");
        connections.insert(user_id.into(), channel);
    }

    pub fn unregister(&self, user_id: &str) {
        let mut connections = self.connections.lock().expect("registry poisoned");
        connections.remove(user_id);
    }

    /// Deliver to one recipient. Returns true on delivery; a missing or
    /// closed channel drops the event (closed channels are also evicted).
    pub fn send(&self, user_id: &str, notification: Notification) -> bool {
        let mut connections = self.connections.lock().expect("registry poisoned");
        match connections.get(user_id) {
            Some(channel) => {
                if channel.send(notification).is_ok() {
                    true
                } else {
                    connections.remove(user_id);
                    false
                }
            }
            None => false,
        }
    }

    /// Deliver one event to several recipients; returns the delivered count.
    pub fn broadcast(&self, user_ids: &[String], notification: &Notification) -> usize {
        user_ids
            .iter()
            .filter(|user_id| self.send(user_id, notification.clone()))
            .count()
    }

    pub fn connected_count(&self) -> usize {
        self.connections.lock().expect("registry poisoned").len()
    }
}
