//! Group member cache.
//!
//! Backs card/role diffing and the classifier's title side effect.
//! Entries are `Arc`-wrapped and replaced wholesale on mutation, so a
//! transport fan-out reading a record mid-update always observes a
//! consistent snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ibis_kernel::{KernelBridge, MemberRecord};

type GroupMap = HashMap<String, HashMap<String, Arc<MemberRecord>>>;

#[derive(Default)]
pub struct MemberCache {
    groups: Mutex<GroupMap>,
}

impl MemberCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached record for `key` (public or internal id), fetching from
    /// the kernel on a miss. A bridge failure is a soft miss.
    pub async fn get(
        &self,
        bridge: &dyn KernelBridge,
        group: &str,
        key: &str,
    ) -> Option<Arc<MemberRecord>> {
        if key.is_empty() {
            return None;
        }
        if let Some(hit) = self.peek(group, key) {
            return Some(hit);
        }
        let fetched = bridge.group_member(group, key).await.ok().flatten()?;
        let record = Arc::new(fetched);
        self.insert(group, record.clone());
        Some(record)
    }

    /// Cache-only lookup by public or internal id.
    pub fn peek(&self, group: &str, key: &str) -> Option<Arc<MemberRecord>> {
        let groups = self.lock();
        let members = groups.get(group)?;
        if let Some(by_uin) = members.get(key) {
            return Some(by_uin.clone());
        }
        members
            .values()
            .find(|record| record.uid == key)
            .cloned()
    }

    pub fn insert(&self, group: &str, record: Arc<MemberRecord>) {
        self.lock()
            .entry(group.to_string())
            .or_default()
            .insert(record.uin.clone(), record);
    }

    /// Replaces the cached record with an updated card name.
    pub fn set_card(&self, group: &str, uin: &str, card: &str) {
        self.replace(group, uin, |record| record.card_name = card.to_string());
    }

    /// Replaces the cached record with a granted title. Documented side
    /// effect of title-grant classification.
    pub fn set_title(&self, group: &str, uin: &str, title: &str) {
        self.replace(group, uin, |record| {
            record.special_title = title.to_string();
        });
    }

    /// Overwrites the cached record from a member-updated batch.
    pub fn update(&self, group: &str, record: MemberRecord) {
        self.insert(group, Arc::new(record));
    }

    fn replace(&self, group: &str, uin: &str, mutate: impl FnOnce(&mut MemberRecord)) {
        let mut groups = self.lock();
        let Some(members) = groups.get_mut(group) else {
            return;
        };
        let Some(existing) = members.get(uin) else {
            return;
        };
        let mut updated = MemberRecord::clone(existing);
        mutate(&mut updated);
        members.insert(uin.to_string(), Arc::new(updated));
    }

    fn lock(&self) -> MutexGuard<'_, GroupMap> {
        self.groups
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use ibis_kernel::MemberRole;

    use super::*;

    fn record(uin: &str, uid: &str, card: &str) -> MemberRecord {
        MemberRecord {
            uid: uid.into(),
            uin: uin.into(),
            nick: "nick".into(),
            card_name: card.into(),
            role: MemberRole::Member,
            special_title: String::new(),
        }
    }

    #[test]
    fn peek_matches_public_and_internal_ids() {
        let cache = MemberCache::new();
        cache.insert("g1", Arc::new(record("10001", "u_a", "card")));
        assert!(cache.peek("g1", "10001").is_some());
        assert!(cache.peek("g1", "u_a").is_some());
        assert!(cache.peek("g1", "10002").is_none());
        assert!(cache.peek("g2", "10001").is_none());
    }

    #[test]
    fn set_card_replaces_record_copy_on_write() {
        let cache = MemberCache::new();
        cache.insert("g1", Arc::new(record("10001", "u_a", "old")));
        let before = cache.peek("g1", "10001").expect("cached");
        cache.set_card("g1", "10001", "new");
        let after = cache.peek("g1", "10001").expect("cached");
        // the old snapshot is untouched; readers holding it see a
        // consistent record
        assert_eq!(before.card_name, "old");
        assert_eq!(after.card_name, "new");
    }

    #[test]
    fn set_title_updates_only_existing_records() {
        let cache = MemberCache::new();
        cache.set_title("g1", "10001", "champion");
        assert!(cache.peek("g1", "10001").is_none());
        cache.insert("g1", Arc::new(record("10001", "u_a", "")));
        cache.set_title("g1", "10001", "champion");
        assert_eq!(
            cache.peek("g1", "10001").expect("cached").special_title,
            "champion"
        );
    }
}
