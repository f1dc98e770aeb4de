//! Store change notifications.

use std::sync::mpsc::{self, Receiver, Sender};

/// Something observable about a store changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEvent {
    /// Intervals were cleared or nesting was recomputed.
    ContentChanged,
    /// The rendered height may differ.
    HeightChanged,
    /// The store was expanded or collapsed.
    ExpandedChanged,
    /// The store was hidden or shown.
    HiddenChanged,
}

impl StoreEvent {
    /// Returns true for events after which the store's height has to be re-read.
    #[must_use]
    pub fn affects_height(self) -> bool {
        !matches!(self, Self::ContentChanged)
    }
}

/// Subscriber list of a store.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<Sender<StoreEvent>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: StoreEvent) {
        self.senders.retain(|tx| tx.send(event).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
