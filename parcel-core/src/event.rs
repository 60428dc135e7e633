use std::path::PathBuf;

use tokio::sync::mpsc::UnboundedSender;

use crate::segment::SegmentState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `total_size` is `None` when a plain GET runs against a resource of
    /// unknown length.
    Started {
        total_size: Option<u64>,
        segments: usize,
    },
    /// `bytes` were just written for `segment`.
    Progress { segment: usize, bytes: u64 },
    SegmentFinished { segment: usize, state: SegmentState },
    Merging,
    Completed { path: PathBuf, bytes: u64 },
}

/// Optional event sink handed to every stage. A dropped receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct Events(Option<UnboundedSender<Event>>);

impl Events {
    pub fn new(tx: UnboundedSender<Event>) -> Self {
        Events(Some(tx))
    }

    pub fn none() -> Self {
        Events(None)
    }

    pub fn send(&self, event: Event) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
