//! Public wire-protocol event types.
//!
//! Everything a delivery transport serializes lives here: the message
//! shape with its ordered content fragments, the notice/request event
//! taxonomy, meta events, and the canonical bracket-code text rendering
//! used for `raw_message`.

pub mod event;
pub mod message;
pub mod meta;
pub mod notice;
pub mod segment;

pub use event::WireEvent;
pub use message::{Sender, WireMessage};
pub use meta::{HeartbeatMeta, HeartbeatStatus, LifecycleMeta, MetaEvent};
pub use notice::{
    EmojiLike, EmojiLikeNotice, EssenceNotice, FriendAddNotice, FriendRecallNotice,
    FriendRequestEvent, GroupAdminNotice, GroupBanNotice, GroupCardNotice, GroupDecreaseNotice,
    GroupIncreaseNotice, GroupRecallNotice, GroupRequestEvent, GroupTitleNotice,
    GroupUploadNotice, NoticeEvent, PokeNotice, RequestEvent, UploadedFile,
};
pub use segment::{encode_fragments, Fragment};
