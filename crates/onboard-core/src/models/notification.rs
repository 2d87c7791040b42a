//! Administrator-to-employee notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    /// Free-form category chosen by the sender (e.g. `info`, `action`).
    #[serde(default, alias = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Union two notification lists by id. A notification is read if either
/// side has read it. Output is ordered by creation time, then id.
pub fn merge_notifications(a: &[Notification], b: &[Notification]) -> Vec<Notification> {
    let mut merged: Vec<Notification> = Vec::with_capacity(a.len() + b.len());
    for n in a.iter().chain(b) {
        match merged.iter_mut().find(|m| m.id == n.id) {
            Some(existing) => existing.read |= n.read,
            None => merged.push(n.clone()),
        }
    }
    merged.sort_by(|x, y| x.created_at.cmp(&y.created_at).then(x.id.cmp(&y.id)));
    merged
}
