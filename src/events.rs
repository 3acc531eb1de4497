// src/events.rs
//! Change events describing tracker mutations, fanned out over a broadcast bus.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::item::Item;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Added,
    Removed,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Added => "added",
            ChangeAction::Removed => "removed",
        }
    }
}

/// Immutable record of one tracker mutation.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    pub item: Arc<Item>,
}

impl ChangeEvent {
    pub fn added(item: Arc<Item>) -> Self {
        Self {
            action: ChangeAction::Added,
            item,
        }
    }

    pub fn removed(item: Arc<Item>) -> Self {
        Self {
            action: ChangeAction::Removed,
            item,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.action.as_str(), self.item.id)
    }
}

/// Bounded broadcast of change events.
///
/// Publishing never waits: a subscriber that falls more than `capacity`
/// events behind loses the oldest ones and sees `Lagged` on its next receive.
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine; nobody is auditing yet.
        let _ = self.sender.send(event);
    }
}

/// Log every change event until all bus handles are dropped. Resolves to the
/// number of events logged; lagged events are skipped, not fatal.
pub fn spawn_change_logger(mut rx: broadcast::Receiver<ChangeEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut logged = 0;
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    tracing::info!(
                        target: "changes",
                        action = ev.action.as_str(),
                        id = ev.item.id,
                        from = ev.item.source().as_str(),
                        "{ev}"
                    );
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "changes", skipped, "change logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(target: "changes", logged, "change logger stopped");
        logged
    })
}
