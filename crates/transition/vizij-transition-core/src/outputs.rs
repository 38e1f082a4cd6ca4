//! Output contracts from a group.
//!
//! Outputs carry the keys whose interpolated state changed this frame and a
//! separate list of semantic lifecycle events. Hosts repaint the changed keys
//! and may react to events (for example, hard-removing a record once its exit
//! transition has ended).

use serde::{Deserialize, Serialize};

use crate::diff::RecordType;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum GroupEvent {
    /// A diff replaced the tracked set.
    SourceChanged {
        revision: u64,
        entered: usize,
        exiting: usize,
    },
    TransitionStarted {
        key: String,
        record_type: RecordType,
    },
    /// The record's last run finished (or there was nothing to animate).
    TransitionEnded {
        key: String,
        record_type: RecordType,
    },
    Hidden {
        key: String,
    },
    Removed {
        key: String,
    },
    /// Hard removal was refused because the key is still present upstream.
    RemovalRejected {
        key: String,
    },
}

/// Outputs returned by `NodeGroup::tick()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changed: Vec<String>,
    #[serde(default)]
    pub events: Vec<GroupEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changed.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, key: String) {
        self.changed.push(key);
    }

    #[inline]
    pub fn push_event(&mut self, event: GroupEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.events.is_empty()
    }

    /// Keys whose transition ended this frame, with the type they ended in.
    pub fn ended(&self) -> impl Iterator<Item = (&str, RecordType)> {
        self.events.iter().filter_map(|e| match e {
            GroupEvent::TransitionEnded { key, record_type } => Some((key.as_str(), *record_type)),
            _ => None,
        })
    }
}
