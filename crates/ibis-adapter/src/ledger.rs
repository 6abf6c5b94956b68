//! Dedup and sequence ledger.
//!
//! Maps durable long-form kernel message ids to compact short sequence
//! ids exposed on the wire, with reverse lookup, and caches media
//! descriptors so later re-requests (downloads) never re-parse the
//! original message. Allocation is monotonic and idempotent per kernel
//! message id: recall/reply/reaction events always land on the short id
//! the message was first assigned.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use ibis_kernel::Peer;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Cached media descriptor for one message element.
pub struct FileCacheEntry {
    pub peer: Peer,
    pub msg_id: String,
    pub element_id: String,
    pub file_name: String,
    pub file_size: String,
    pub file_uuid: String,
    /// Unix seconds of the carrying message.
    pub msg_time: u64,
}

#[derive(Default)]
struct LedgerState {
    next_short_id: i32,
    by_msg_id: HashMap<String, i32>,
    by_short_id: HashMap<i32, (Peer, String)>,
    files: HashMap<(String, String, String), FileCacheEntry>,
    sticker_names: HashMap<String, String>,
}

/// Process-wide ledger; interior mutability so the dispatch path can
/// share it with the decoder and classifier by reference.
#[derive(Default)]
pub struct SequenceLedger {
    state: Mutex<LedgerState>,
}

impl SequenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a short id for `msg_id`, or returns the one already
    /// assigned. Ids start at 1 and are never reused.
    pub fn assign(&self, peer: &Peer, msg_id: &str) -> i32 {
        let mut state = self.lock();
        if let Some(existing) = state.by_msg_id.get(msg_id) {
            return *existing;
        }
        state.next_short_id += 1;
        let short_id = state.next_short_id;
        state.by_msg_id.insert(msg_id.to_string(), short_id);
        state
            .by_short_id
            .insert(short_id, (peer.clone(), msg_id.to_string()));
        short_id
    }

    /// Short id previously assigned to `msg_id`, if any.
    pub fn short_id_of(&self, msg_id: &str) -> Option<i32> {
        self.lock().by_msg_id.get(msg_id).copied()
    }

    /// Reverse lookup: short id back to the kernel message handle.
    pub fn lookup(&self, short_id: i32) -> Option<(Peer, String)> {
        self.lock().by_short_id.get(&short_id).cloned()
    }

    pub fn add_file(&self, entry: FileCacheEntry) {
        let key = (
            entry.peer.peer_uid.clone(),
            entry.msg_id.clone(),
            entry.element_id.clone(),
        );
        self.lock().files.insert(key, entry);
    }

    pub fn file(&self, peer_uid: &str, msg_id: &str, element_id: &str) -> Option<FileCacheEntry> {
        let key = (
            peer_uid.to_string(),
            msg_id.to_string(),
            element_id.to_string(),
        );
        self.lock().files.get(&key).cloned()
    }

    /// Caches a sticker checksum -> display-name mapping for re-send.
    pub fn remember_sticker_name(&self, emoji_id: &str, name: &str) {
        if name.is_empty() {
            return;
        }
        self.lock()
            .sticker_names
            .insert(emoji_id.to_string(), name.to_string());
    }

    pub fn sticker_name(&self, emoji_id: &str) -> Option<String> {
        self.lock().sticker_names.get(emoji_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use ibis_kernel::ChatKind;

    use super::*;

    fn peer() -> Peer {
        Peer {
            chat: ChatKind::Group,
            peer_uid: "g1".into(),
        }
    }

    #[test]
    fn assign_is_idempotent_per_msg_id() {
        let ledger = SequenceLedger::new();
        let first = ledger.assign(&peer(), "m-1");
        let again = ledger.assign(&peer(), "m-1");
        assert_eq!(first, again);
        let other = ledger.assign(&peer(), "m-2");
        assert_ne!(first, other);
    }

    #[test]
    fn short_ids_are_monotonic_from_one() {
        let ledger = SequenceLedger::new();
        assert_eq!(ledger.assign(&peer(), "a"), 1);
        assert_eq!(ledger.assign(&peer(), "b"), 2);
        assert_eq!(ledger.assign(&peer(), "c"), 3);
    }

    #[test]
    fn reverse_lookup_round_trips() {
        let ledger = SequenceLedger::new();
        let short_id = ledger.assign(&peer(), "m-9");
        let (found_peer, found_id) = ledger.lookup(short_id).expect("assigned");
        assert_eq!(found_peer, peer());
        assert_eq!(found_id, "m-9");
        assert_eq!(ledger.short_id_of("m-9"), Some(short_id));
        assert_eq!(ledger.short_id_of("never-seen"), None);
    }

    #[test]
    fn file_cache_is_keyed_per_element() {
        let ledger = SequenceLedger::new();
        let entry = FileCacheEntry {
            peer: peer(),
            msg_id: "m-1".into(),
            element_id: "e-1".into(),
            file_name: "report.pdf".into(),
            file_size: "1024".into(),
            file_uuid: "uuid-1".into(),
            msg_time: 1_700_000_000,
        };
        ledger.add_file(entry.clone());
        assert_eq!(ledger.file("g1", "m-1", "e-1"), Some(entry));
        assert_eq!(ledger.file("g1", "m-1", "e-2"), None);
    }

    #[test]
    fn sticker_names_are_cached_and_empty_ignored() {
        let ledger = SequenceLedger::new();
        ledger.remember_sticker_name("ab12cd", "party");
        ledger.remember_sticker_name("ffffff", "");
        assert_eq!(ledger.sticker_name("ab12cd").as_deref(), Some("party"));
        assert_eq!(ledger.sticker_name("ffffff"), None);
    }

    #[test]
    fn concurrent_assignment_never_collides() {
        use std::sync::Arc;
        let ledger = Arc::new(SequenceLedger::new());
        let mut handles = Vec::new();
        for batch in 0..8 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|n| ledger.assign(&peer(), &format!("b{batch}-m{n}")))
                    .collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<i32> = handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("join"))
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
    }
}
