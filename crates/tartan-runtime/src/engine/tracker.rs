//! Response tracker.
//!
//! Remembers which outbound messages each action produced for an origin
//! message, so that a later edit can update them in place and a deletion can
//! remove them.
//!
//! Workers touch disjoint origins (the router guarantees it), so one mutex
//! around the whole map is enough. Entries only ever reflect operations the
//! chat driver confirmed.

use std::collections::HashMap;

use parking_lot::Mutex;
use tartan_core::MessageId;
use tartan_framework::ActionId;

use crate::cache::ArcCache;

/// One outbound message attributed to the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEntry {
    /// Action that produced the message.
    pub action: ActionId,
    /// The message the bot posted.
    pub outbound: MessageId,
}

impl ResponseEntry {
    /// Creates an entry.
    pub fn new(action: ActionId, outbound: MessageId) -> Self {
        Self { action, outbound }
    }
}

#[derive(Debug)]
enum Store {
    Bounded(ArcCache<MessageId, Vec<ResponseEntry>>),
    Unbounded(HashMap<MessageId, Vec<ResponseEntry>>),
}

/// Maps an origin message to the responses it produced.
#[derive(Debug)]
pub struct ResponseTracker {
    store: Mutex<Store>,
}

impl ResponseTracker {
    /// Creates a tracker holding at most `capacity` origins, or unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        let store = match capacity {
            Some(c) => Store::Bounded(ArcCache::new(c)),
            None => Store::Unbounded(HashMap::new()),
        };
        Self {
            store: Mutex::new(store),
        }
    }

    /// The responses recorded for `origin`, in the order they were produced.
    pub fn lookup(&self, origin: &MessageId) -> Option<Vec<ResponseEntry>> {
        match &mut *self.store.lock() {
            Store::Bounded(cache) => cache.get(origin).cloned(),
            Store::Unbounded(map) => map.get(origin).cloned(),
        }
    }

    /// Replaces `origin`'s record; an empty list removes it.
    pub fn replace(&self, origin: MessageId, entries: Vec<ResponseEntry>) {
        if entries.is_empty() {
            self.remove(&origin);
            return;
        }
        match &mut *self.store.lock() {
            Store::Bounded(cache) => cache.insert(origin, entries),
            Store::Unbounded(map) => {
                map.insert(origin, entries);
            }
        }
    }

    /// Forgets `origin`, returning what was recorded.
    pub fn remove(&self, origin: &MessageId) -> Option<Vec<ResponseEntry>> {
        match &mut *self.store.lock() {
            Store::Bounded(cache) => cache.remove(origin),
            Store::Unbounded(map) => map.remove(origin),
        }
    }

    /// Whether anything is recorded for `origin`.
    pub fn contains(&self, origin: &MessageId) -> bool {
        match &*self.store.lock() {
            Store::Bounded(cache) => cache.contains(origin),
            Store::Unbounded(map) => map.contains_key(origin),
        }
    }

    /// Number of tracked origins.
    pub fn len(&self) -> usize {
        match &*self.store.lock() {
            Store::Bounded(cache) => cache.len(),
            Store::Unbounded(map) => map.len(),
        }
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tartan_framework::ActionKind;

    use super::*;

    fn action(plugin: &str, index: usize) -> ActionId {
        ActionId::new(Arc::from(plugin), ActionKind::Command, index)
    }

    #[test]
    fn test_replace_lookup_and_remove() {
        for tracker in [ResponseTracker::new(None), ResponseTracker::new(Some(10))] {
            let origin = MessageId::new("C1", "100.0");
            assert!(tracker.lookup(&origin).is_none());

            tracker.replace(
                origin.clone(),
                vec![
                    ResponseEntry::new(action("version", 0), MessageId::new("C1", "200.0")),
                    ResponseEntry::new(action("echo", 0), MessageId::new("C1", "201.0")),
                ],
            );

            let entries = tracker.lookup(&origin).unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].outbound.timestamp, "200.0");
            assert_eq!(entries[1].action, action("echo", 0));

            assert_eq!(tracker.remove(&origin).map(|e| e.len()), Some(2));
            assert!(!tracker.contains(&origin));
            assert!(tracker.is_empty());
        }
    }

    #[test]
    fn test_replace_with_empty_removes() {
        let tracker = ResponseTracker::new(None);
        let origin = MessageId::new("C1", "100.0");
        tracker.replace(
            origin.clone(),
            vec![ResponseEntry::new(action("a", 0), MessageId::new("C1", "1.0"))],
        );
        assert!(tracker.contains(&origin));
        tracker.replace(origin.clone(), Vec::new());
        assert!(!tracker.contains(&origin));
    }

    #[test]
    fn test_bounded_tracker_evicts() {
        let tracker = ResponseTracker::new(Some(2));
        for i in 0..5 {
            tracker.replace(
                MessageId::new("C1", format!("{i}.0")),
                vec![ResponseEntry::new(action("a", 0), MessageId::new("C1", format!("9{i}.0")))],
            );
        }
        assert_eq!(tracker.len(), 2);
        assert!(tracker.contains(&MessageId::new("C1", "4.0")));
    }
}
