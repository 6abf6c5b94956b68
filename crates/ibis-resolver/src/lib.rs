//! Tiered, bidirectional identity resolution with a process-wide cache.
//!
//! The kernel speaks two incompatible identifier spaces: an opaque
//! internal id and a public numeric account id. Resolution queries a
//! fixed ladder of backend sources, cheapest first, short-circuiting on
//! the first hit and caching the pair in both directions. Exhausting
//! the ladder yields `None`; callers treat that as a soft failure and
//! omit or zero-fill the field — identity resolution never aborts event
//! translation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tracing::debug;

use ibis_kernel::KernelBridge;

/// Character marking a redacted value in slow-path profile results.
/// Masked values are rejected rather than cached.
const MASK_SENTINEL: char = '*';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolutionTier {
    GroupIndex,
    ProfileIndex,
    Convert,
    /// Full profile fetch; slowest, occasionally masked.
    ProfileFetch,
}

impl ResolutionTier {
    fn as_str(self) -> &'static str {
        match self {
            Self::GroupIndex => "group_index",
            Self::ProfileIndex => "profile_index",
            Self::Convert => "convert",
            Self::ProfileFetch => "profile_fetch",
        }
    }
}

/// Fixed priority order; all tiers run sequentially so an early hit
/// never issues a call to the expensive tail.
const TIER_ORDER: [ResolutionTier; 4] = [
    ResolutionTier::GroupIndex,
    ResolutionTier::ProfileIndex,
    ResolutionTier::Convert,
    ResolutionTier::ProfileFetch,
];

#[derive(Default)]
struct PairCache {
    to_public: HashMap<String, String>,
    to_internal: HashMap<String, String>,
}

/// Best-effort mapper between the kernel's internal ids and public
/// account ids. Cached pairs live for the process run; the platform
/// treats the mapping as near-permanent, so nothing is invalidated.
pub struct IdentityResolver {
    bridge: Arc<dyn KernelBridge>,
    cache: Mutex<PairCache>,
}

impl IdentityResolver {
    pub fn new(bridge: Arc<dyn KernelBridge>) -> Self {
        Self {
            bridge,
            cache: Mutex::new(PairCache::default()),
        }
    }

    /// Internal id -> public id.
    pub async fn resolve_public(&self, internal: &str) -> Option<String> {
        if internal.is_empty() {
            return None;
        }
        if let Some(hit) = self.lock_cache().to_public.get(internal) {
            return Some(hit.clone());
        }
        for tier in TIER_ORDER {
            match self.query_public(tier, internal).await {
                Ok(Some(public)) => {
                    self.store_pair(internal, &public);
                    return Some(public);
                }
                Ok(None) => {}
                Err(error) => {
                    debug!(internal, tier = tier.as_str(), %error, "public-id tier failed");
                }
            }
        }
        None
    }

    /// Public id -> internal id.
    pub async fn resolve_internal(&self, public: &str) -> Option<String> {
        if public.is_empty() {
            return None;
        }
        if let Some(hit) = self.lock_cache().to_internal.get(public) {
            return Some(hit.clone());
        }
        for tier in TIER_ORDER {
            match self.query_internal(tier, public).await {
                Ok(Some(internal)) => {
                    self.store_pair(&internal, public);
                    return Some(internal);
                }
                Ok(None) => {}
                Err(error) => {
                    debug!(public, tier = tier.as_str(), %error, "internal-id tier failed");
                }
            }
        }
        None
    }

    async fn query_public(&self, tier: ResolutionTier, internal: &str) -> Result<Option<String>> {
        let found = match tier {
            ResolutionTier::GroupIndex => self.bridge.group_index_public(internal).await?,
            ResolutionTier::ProfileIndex => self.bridge.profile_index_public(internal).await?,
            ResolutionTier::Convert => self.bridge.convert_public(internal).await?,
            ResolutionTier::ProfileFetch => {
                let profile = self.bridge.fetch_profile_by_internal(internal).await?;
                Some(profile.uin)
            }
        };
        Ok(found.filter(|value| usable(value)))
    }

    async fn query_internal(&self, tier: ResolutionTier, public: &str) -> Result<Option<String>> {
        let found = match tier {
            ResolutionTier::GroupIndex => self.bridge.group_index_internal(public).await?,
            ResolutionTier::ProfileIndex => self.bridge.profile_index_internal(public).await?,
            ResolutionTier::Convert => self.bridge.convert_internal(public).await?,
            ResolutionTier::ProfileFetch => {
                let profile = self.bridge.fetch_profile_by_public(public).await?;
                Some(profile.uid)
            }
        };
        Ok(found.filter(|value| usable(value)))
    }

    fn store_pair(&self, internal: &str, public: &str) {
        let mut cache = self.lock_cache();
        cache.to_public.insert(internal.to_string(), public.to_string());
        cache.to_internal.insert(public.to_string(), internal.to_string());
    }

    fn lock_cache(&self) -> MutexGuard<'_, PairCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn usable(value: &str) -> bool {
    !value.is_empty() && !value.contains(MASK_SENTINEL)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use ibis_kernel::{MediaUrlRequest, MemberRecord, Peer, RawMessage, TempChatInfo, UserProfile};

    use super::*;

    #[derive(Default)]
    struct TierLog {
        group: AtomicUsize,
        profile: AtomicUsize,
        convert: AtomicUsize,
        fetch: AtomicUsize,
    }

    struct ScriptedBridge {
        log: TierLog,
        group_hit: Option<String>,
        profile_hit: Option<String>,
        convert_hit: Option<String>,
        fetch_uin: Result<String, ()>,
    }

    impl ScriptedBridge {
        fn misses() -> Self {
            Self {
                log: TierLog::default(),
                group_hit: None,
                profile_hit: None,
                convert_hit: None,
                fetch_uin: Err(()),
            }
        }
    }

    #[async_trait]
    impl KernelBridge for ScriptedBridge {
        async fn group_index_public(&self, _internal: &str) -> Result<Option<String>> {
            self.log.group.fetch_add(1, Ordering::SeqCst);
            Ok(self.group_hit.clone())
        }

        async fn profile_index_public(&self, _internal: &str) -> Result<Option<String>> {
            self.log.profile.fetch_add(1, Ordering::SeqCst);
            Ok(self.profile_hit.clone())
        }

        async fn convert_public(&self, _internal: &str) -> Result<Option<String>> {
            self.log.convert.fetch_add(1, Ordering::SeqCst);
            Ok(self.convert_hit.clone())
        }

        async fn fetch_profile_by_internal(&self, internal: &str) -> Result<UserProfile> {
            self.log.fetch.fetch_add(1, Ordering::SeqCst);
            match &self.fetch_uin {
                Ok(uin) => Ok(UserProfile {
                    uid: internal.to_string(),
                    uin: uin.clone(),
                    nick: String::new(),
                }),
                Err(()) => bail!("profile fetch unavailable"),
            }
        }

        async fn group_index_internal(&self, _public: &str) -> Result<Option<String>> {
            self.log.group.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn profile_index_internal(&self, _public: &str) -> Result<Option<String>> {
            self.log.profile.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn convert_internal(&self, public: &str) -> Result<Option<String>> {
            self.log.convert.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("u_{public}")))
        }

        async fn fetch_profile_by_public(&self, public: &str) -> Result<UserProfile> {
            self.log.fetch.fetch_add(1, Ordering::SeqCst);
            Ok(UserProfile {
                uid: format!("u_{public}"),
                uin: public.to_string(),
                nick: String::new(),
            })
        }

        async fn group_member(&self, _group: &str, _member: &str) -> Result<Option<MemberRecord>> {
            Ok(None)
        }

        async fn media_url(&self, _request: MediaUrlRequest) -> Result<String> {
            Ok(String::new())
        }

        async fn fetch_by_sequence(
            &self,
            _peer: &Peer,
            _seq: &str,
            _count: u32,
        ) -> Result<Vec<RawMessage>> {
            Ok(Vec::new())
        }

        async fn fetch_single(&self, _peer: &Peer, _seq: &str) -> Result<Option<RawMessage>> {
            Ok(None)
        }

        async fn temp_chat_info(&self, _sender_uid: &str) -> Result<Option<TempChatInfo>> {
            Ok(None)
        }
    }

    fn resolver(bridge: ScriptedBridge) -> (IdentityResolver, Arc<ScriptedBridge>) {
        let bridge = Arc::new(bridge);
        (IdentityResolver::new(bridge.clone()), bridge)
    }

    #[tokio::test]
    async fn first_tier_hit_short_circuits() {
        let (resolver, bridge) = resolver(ScriptedBridge {
            group_hit: Some("10001".into()),
            ..ScriptedBridge::misses()
        });
        assert_eq!(resolver.resolve_public("u_a").await.as_deref(), Some("10001"));
        assert_eq!(bridge.log.group.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.log.profile.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.log.fetch.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_resolution_serves_from_cache() {
        let (resolver, bridge) = resolver(ScriptedBridge {
            convert_hit: Some("10002".into()),
            ..ScriptedBridge::misses()
        });
        let first = resolver.resolve_public("u_b").await;
        let second = resolver.resolve_public("u_b").await;
        assert_eq!(first, second);
        assert_eq!(bridge.log.convert.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forward_resolution_populates_reverse_cache() {
        let (resolver, bridge) = resolver(ScriptedBridge {
            profile_hit: Some("10003".into()),
            ..ScriptedBridge::misses()
        });
        assert_eq!(resolver.resolve_public("u_c").await.as_deref(), Some("10003"));
        assert_eq!(resolver.resolve_internal("10003").await.as_deref(), Some("u_c"));
        // reverse lookup never touched a tier
        assert_eq!(bridge.log.group.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.log.profile.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn masked_slow_path_result_is_rejected() {
        let (resolver, bridge) = resolver(ScriptedBridge {
            fetch_uin: Ok("100***01".into()),
            ..ScriptedBridge::misses()
        });
        assert_eq!(resolver.resolve_public("u_d").await, None);
        assert_eq!(bridge.log.fetch.load(Ordering::SeqCst), 1);
        // a rejected value must not be cached either
        assert_eq!(resolver.resolve_public("u_d").await, None);
        assert_eq!(bridge.log.fetch.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tier_error_falls_through_to_next() {
        let (resolver, _bridge) = resolver(ScriptedBridge {
            fetch_uin: Ok("10005".into()),
            ..ScriptedBridge::misses()
        });
        // group/profile/convert all miss, profile fetch answers
        assert_eq!(resolver.resolve_public("u_e").await.as_deref(), Some("10005"));
    }

    #[tokio::test]
    async fn exhausting_all_tiers_is_a_soft_miss() {
        let (resolver, _bridge) = resolver(ScriptedBridge::misses());
        assert_eq!(resolver.resolve_public("u_f").await, None);
    }

    #[tokio::test]
    async fn empty_input_resolves_to_none_without_queries() {
        let (resolver, bridge) = resolver(ScriptedBridge::misses());
        assert_eq!(resolver.resolve_public("").await, None);
        assert_eq!(bridge.log.group.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reverse_direction_walks_its_own_ladder() {
        let (resolver, bridge) = resolver(ScriptedBridge::misses());
        assert_eq!(
            resolver.resolve_internal("10006").await.as_deref(),
            Some("u_10006")
        );
        assert_eq!(bridge.log.convert.load(Ordering::SeqCst), 1);
    }
}
