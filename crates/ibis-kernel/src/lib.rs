//! Kernel-boundary data model and collaborator contracts.
//!
//! Defines the raw event payloads delivered by the chat kernel bridge
//! (messages, group notifies, friend requests, member updates) and the
//! async trait the translation layer calls back into for identity
//! lookups, media URL generation, and message re-fetch. The bridge
//! implementation itself lives outside this workspace; everything here
//! is the shape of the data crossing that seam.

pub mod bridge;
pub mod config;
pub mod types;

pub use bridge::{KernelBridge, MediaKind, MediaUrlRequest, UserProfile};
pub use config::{ConfigSnapshot, HttpPostSection, HttpSection, WsReverseSection, WsSection};
pub use types::{
    AtKind, ChatKind, Element, ElementPayload, FriendRequest, GroupNotify, GroupNotifyKind,
    GroupTip, GroupTipKind, JsonTip, MediaElement, MemberRecord, MemberRole, MsgRecord,
    NotifyActor, Peer, RawMessage, RevokeTip, SelfIdentity, ShutUpDetail, SystemTip,
    SystemTipBody, SystemTipKind, TempChatInfo, XmlTip, REQ_TYPE_AWAIT_PEER_CONFIRM,
};
