//! Notice and request event taxonomy.
//!
//! Exactly one notice is constructed from one raw kernel event, never
//! merged or split. Constructors stamp the event time and the literal
//! type tags so call sites only supply actor/target payloads.

use ibis_core::now_unix_secs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const POST_TYPE_NOTICE: &str = "notice";
pub const POST_TYPE_REQUEST: &str = "request";

fn event_time() -> i64 {
    now_unix_secs() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
/// Every notice the classifier can produce.
pub enum NoticeEvent {
    GroupIncrease(GroupIncreaseNotice),
    GroupDecrease(GroupDecreaseNotice),
    GroupBan(GroupBanNotice),
    GroupCard(GroupCardNotice),
    GroupAdmin(GroupAdminNotice),
    GroupTitle(GroupTitleNotice),
    GroupUpload(GroupUploadNotice),
    GroupRecall(GroupRecallNotice),
    FriendRecall(FriendRecallNotice),
    FriendAdd(FriendAddNotice),
    Poke(PokeNotice),
    EmojiLike(EmojiLikeNotice),
    Essence(EssenceNotice),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
/// Inbound approval requests surfaced to consumers.
pub enum RequestEvent {
    Friend(FriendRequestEvent),
    Group(GroupRequestEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupIncreaseNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    /// `approve` or `invite`.
    pub sub_type: String,
    pub group_id: i64,
    pub operator_id: i64,
    pub user_id: i64,
}

impl GroupIncreaseNotice {
    pub fn new(self_id: i64, group_id: i64, user_id: i64, operator_id: i64, sub_type: &str) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_increase".to_string(),
            sub_type: sub_type.to_string(),
            group_id,
            operator_id,
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDecreaseNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    /// `leave`, `kick`, or `kick_me`.
    pub sub_type: String,
    pub group_id: i64,
    pub operator_id: i64,
    pub user_id: i64,
}

impl GroupDecreaseNotice {
    pub fn new(self_id: i64, group_id: i64, user_id: i64, operator_id: i64, sub_type: &str) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_decrease".to_string(),
            sub_type: sub_type.to_string(),
            group_id,
            operator_id,
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBanNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    /// `ban` or `lift_ban`.
    pub sub_type: String,
    pub group_id: i64,
    pub operator_id: i64,
    /// Zero denotes a group-wide mute.
    pub user_id: i64,
    /// Seconds; `-1` means indefinite.
    pub duration: i64,
}

impl GroupBanNotice {
    pub fn new(
        self_id: i64,
        group_id: i64,
        user_id: i64,
        operator_id: i64,
        duration: i64,
        sub_type: &str,
    ) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_ban".to_string(),
            sub_type: sub_type.to_string(),
            group_id,
            operator_id,
            user_id,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCardNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub card_new: String,
    pub card_old: String,
}

impl GroupCardNotice {
    pub fn new(self_id: i64, group_id: i64, user_id: i64, card_new: &str, card_old: &str) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_card".to_string(),
            group_id,
            user_id,
            card_new: card_new.to_string(),
            card_old: card_old.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAdminNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    /// `set` or `unset`.
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
}

impl GroupAdminNotice {
    pub fn new(self_id: i64, group_id: i64, user_id: i64, sub_type: &str) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_admin".to_string(),
            sub_type: sub_type.to_string(),
            group_id,
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTitleNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub title: String,
}

impl GroupTitleNotice {
    pub fn new(self_id: i64, group_id: i64, user_id: i64, title: &str) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "notify".to_string(),
            sub_type: "title".to_string(),
            group_id,
            user_id,
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Descriptor of a file surfaced by an upload notice.
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub busid: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupUploadNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub file: UploadedFile,
}

impl GroupUploadNotice {
    pub fn new(self_id: i64, group_id: i64, user_id: i64, file: UploadedFile) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_upload".to_string(),
            group_id,
            user_id,
            file,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecallNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub operator_id: i64,
    pub message_id: i32,
}

impl GroupRecallNotice {
    pub fn new(self_id: i64, group_id: i64, user_id: i64, operator_id: i64, message_id: i32) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_recall".to_string(),
            group_id,
            user_id,
            operator_id,
            message_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRecallNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub user_id: i64,
    pub message_id: i32,
}

impl FriendRecallNotice {
    pub fn new(self_id: i64, user_id: i64, message_id: i32) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "friend_recall".to_string(),
            user_id,
            message_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendAddNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub user_id: i64,
}

impl FriendAddNotice {
    pub fn new(self_id: i64, user_id: i64) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "friend_add".to_string(),
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub sub_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub user_id: i64,
    pub target_id: i64,
    /// Raw detail items from the tip payload, passed through.
    pub raw_info: Value,
}

impl PokeNotice {
    pub fn new(
        self_id: i64,
        group_id: Option<i64>,
        user_id: i64,
        target_id: i64,
        raw_info: Value,
    ) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "notify".to_string(),
            sub_type: "poke".to_string(),
            group_id,
            user_id,
            target_id,
            raw_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One reaction entry on an emoji-like notice.
pub struct EmojiLike {
    pub emoji_id: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiLikeNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub message_id: i32,
    pub likes: Vec<EmojiLike>,
}

impl EmojiLikeNotice {
    pub fn new(
        self_id: i64,
        group_id: i64,
        user_id: i64,
        message_id: i32,
        likes: Vec<EmojiLike>,
    ) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "group_msg_emoji_like".to_string(),
            group_id,
            user_id,
            message_id,
            likes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssenceNotice {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub notice_type: String,
    pub sub_type: String,
    pub group_id: i64,
    pub message_id: i32,
    pub sender_id: i64,
}

impl EssenceNotice {
    pub fn new(self_id: i64, group_id: i64, message_id: i32, sender_id: i64) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_NOTICE.to_string(),
            notice_type: "essence".to_string(),
            sub_type: "add".to_string(),
            group_id,
            message_id,
            sender_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequestEvent {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub request_type: String,
    pub user_id: i64,
    pub comment: String,
    /// Opaque approval token: `requester-internal-id|request-time`.
    pub flag: String,
}

impl FriendRequestEvent {
    pub fn new(self_id: i64, user_id: i64, comment: &str, flag: &str) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_REQUEST.to_string(),
            request_type: "friend".to_string(),
            user_id,
            comment: comment.to_string(),
            flag: flag.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRequestEvent {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub request_type: String,
    /// `add` for join requests, `invite` when we are invited.
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitor_id: Option<i64>,
    /// Opaque approval token: `group|sequence|type-code`.
    pub flag: String,
}

impl GroupRequestEvent {
    pub fn new(
        self_id: i64,
        group_id: i64,
        user_id: i64,
        sub_type: &str,
        comment: Option<String>,
        invitor_id: Option<i64>,
        flag: &str,
    ) -> Self {
        Self {
            time: event_time(),
            self_id,
            post_type: POST_TYPE_REQUEST.to_string(),
            request_type: "group".to_string(),
            sub_type: sub_type.to_string(),
            group_id,
            user_id,
            comment,
            invitor_id,
            flag: flag.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrease_notice_serializes_flat() {
        let notice =
            NoticeEvent::GroupDecrease(GroupDecreaseNotice::new(1, 1000, 10001, 10002, "kick"));
        let value = serde_json::to_value(&notice).expect("serialize");
        assert_eq!(value["post_type"], "notice");
        assert_eq!(value["notice_type"], "group_decrease");
        assert_eq!(value["sub_type"], "kick");
        assert_eq!(value["operator_id"], 10002);
    }

    #[test]
    fn group_request_omits_absent_optionals() {
        let event = GroupRequestEvent::new(1, 1000, 10001, "invite", None, None, "1000|7|2");
        let value = serde_json::to_value(&event).expect("serialize");
        assert!(value.get("comment").is_none());
        assert!(value.get("invitor_id").is_none());
        assert_eq!(value["flag"], "1000|7|2");
    }

    #[test]
    fn ban_notice_carries_duration() {
        let notice = GroupBanNotice::new(1, 1000, 0, 10002, -1, "ban");
        let value = serde_json::to_value(&notice).expect("serialize");
        assert_eq!(value["duration"], -1);
        assert_eq!(value["user_id"], 0);
    }
}
