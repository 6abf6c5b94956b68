//! Collaborator contract for calls back into the kernel.
//!
//! Implementations marshal each call over the kernel's invocation
//! mechanism with a source-specific timeout; a timed-out or failed call
//! surfaces as `Err` and is downgraded by the caller per that
//! component's failure policy. No call here is ever fatal to event
//! translation.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{MemberRecord, Peer, RawMessage, TempChatInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Minimal profile slice the resolver and decoder need.
pub struct UserProfile {
    pub uid: String,
    pub uin: String,
    pub nick: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Media kind for access-URL generation.
pub enum MediaKind {
    Image,
    Video,
    File,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Everything a backend needs to mint an access URL for one media
/// element without re-parsing the message.
pub struct MediaUrlRequest {
    pub kind: MediaKind,
    pub peer: Peer,
    pub msg_id: String,
    pub element_id: String,
    pub file_path: String,
    pub file_uuid: String,
}

/// Async seam to the kernel host process.
///
/// The four `*_public` / `*_internal` lookups are the identity-resolver
/// tiers, cheapest first; each returns `Ok(None)` on a clean miss. The
/// profile fetches are the slow fallback tier and may return masked
/// values the resolver must reject.
#[async_trait]
pub trait KernelBridge: Send + Sync {
    async fn group_index_public(&self, internal: &str) -> Result<Option<String>>;
    async fn profile_index_public(&self, internal: &str) -> Result<Option<String>>;
    async fn convert_public(&self, internal: &str) -> Result<Option<String>>;
    async fn fetch_profile_by_internal(&self, internal: &str) -> Result<UserProfile>;

    async fn group_index_internal(&self, public: &str) -> Result<Option<String>>;
    async fn profile_index_internal(&self, public: &str) -> Result<Option<String>>;
    async fn convert_internal(&self, public: &str) -> Result<Option<String>>;
    async fn fetch_profile_by_public(&self, public: &str) -> Result<UserProfile>;

    /// Group member lookup; `member` may be an internal or public id.
    async fn group_member(&self, group: &str, member: &str) -> Result<Option<MemberRecord>>;

    async fn media_url(&self, request: MediaUrlRequest) -> Result<String>;

    /// Bulk fetch by channel sequence, newest-first semantics match the
    /// kernel call this wraps.
    async fn fetch_by_sequence(
        &self,
        peer: &Peer,
        seq: &str,
        count: u32,
    ) -> Result<Vec<RawMessage>>;

    /// Single-message fetch by sequence; the fallback path when the
    /// bulk fetch misses or fails integrity checks.
    async fn fetch_single(&self, peer: &Peer, seq: &str) -> Result<Option<RawMessage>>;

    /// Originating-group attribution for a temp session sender.
    async fn temp_chat_info(&self, sender_uid: &str) -> Result<Option<TempChatInfo>>;
}
