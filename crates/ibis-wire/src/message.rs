//! The wire message shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::segment::Fragment;

pub const MESSAGE_TYPE_PRIVATE: &str = "private";
pub const MESSAGE_TYPE_GROUP: &str = "group";
pub const SUB_TYPE_FRIEND: &str = "friend";
pub const SUB_TYPE_NORMAL: &str = "normal";
pub const SUB_TYPE_GROUP: &str = "group";
pub const POST_TYPE_MESSAGE: &str = "message";
pub const POST_TYPE_MESSAGE_SENT: &str = "message_sent";

const DEFAULT_FONT: i32 = 14;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Sender metadata carried on every wire message.
pub struct Sender {
    pub user_id: i64,
    pub nickname: String,
    pub card: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One fully constructed protocol message event.
pub struct WireMessage {
    pub self_id: i64,
    pub user_id: i64,
    pub time: i64,
    /// Short sequence id; stable for the message's lifetime and the
    /// handle recall/reply/reaction events refer back to.
    pub message_id: i32,
    pub real_id: i32,
    pub message_seq: i32,
    pub message_type: String,
    pub sub_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    /// Peer of a self-sent echo; absent on inbound messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i64>,
    pub sender: Sender,
    pub message: Vec<Fragment>,
    pub raw_message: String,
    pub font: i32,
    pub post_type: String,
    /// Raw kernel payload passthrough, populated only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl WireMessage {
    /// Skeleton with protocol defaults; the constructor in the adapter
    /// fills in chat-kind specifics and fragments.
    pub fn new(self_id: i64, user_id: i64, time: i64, short_id: i32) -> Self {
        Self {
            self_id,
            user_id,
            time,
            message_id: short_id,
            real_id: short_id,
            message_seq: short_id,
            message_type: MESSAGE_TYPE_PRIVATE.to_string(),
            sub_type: SUB_TYPE_FRIEND.to_string(),
            group_id: None,
            target_id: None,
            sender: Sender {
                user_id,
                ..Sender::default()
            },
            message: Vec::new(),
            raw_message: String::new(),
            font: DEFAULT_FONT,
            post_type: POST_TYPE_MESSAGE.to_string(),
            raw: None,
        }
    }
}
