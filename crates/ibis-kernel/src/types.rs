//! Raw kernel event payloads.
//!
//! These types mirror what the kernel bridge hands us: stringly-typed
//! ids and timestamps, variant-heavy message elements, and system-tip
//! payloads that embed JSON/XML microformats. Every numeric-looking
//! field stays a `String` here; parsing happens at translation time so
//! a malformed field degrades one event instead of poisoning a batch.

use serde::{Deserialize, Serialize};

/// Friend request type code for "we initiated, peer confirmation still
/// pending". Requests in this state are reported even when already
/// marked decided.
pub const REQ_TYPE_AWAIT_PEER_CONFIRM: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Chat kind of a message's peer.
pub enum ChatKind {
    Private,
    Group,
    /// Temporary one-on-one session spawned from a group.
    TempFromGroup,
}

impl ChatKind {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Private),
            2 => Some(Self::Group),
            100 => Some(Self::TempFromGroup),
            _ => None,
        }
    }

    pub fn as_code(self) -> u32 {
        match self {
            Self::Private => 1,
            Self::Group => 2,
            Self::TempFromGroup => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Addressing pair for kernel message lookups.
pub struct Peer {
    pub chat: ChatKind,
    pub peer_uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The bot account's own identity, captured at login.
pub struct SelfIdentity {
    pub uid: String,
    pub uin: String,
    #[serde(default)]
    pub nick: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Group member role as reported by the kernel.
pub enum MemberRole {
    Member,
    Admin,
    Owner,
}

impl MemberRole {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::Member),
            3 => Some(Self::Admin),
            4 => Some(Self::Owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Cached/reported state of one group member.
pub struct MemberRecord {
    pub uid: String,
    pub uin: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub card_name: String,
    pub role: MemberRole,
    #[serde(default)]
    pub special_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Originating-group attribution for a temp session.
pub struct TempChatInfo {
    pub group_code: String,
    pub from_nick: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Quoted-source record attached to a message for reply verification.
pub struct MsgRecord {
    pub msg_id: String,
    #[serde(default)]
    pub msg_seq: String,
    /// Random integrity nonce; must match a re-fetched copy for the
    /// quote to be considered verified.
    #[serde(default)]
    pub msg_random: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// One raw kernel message as delivered by the bridge.
#[serde(default)]
pub struct RawMessage {
    /// Durable long-form kernel message id.
    pub msg_id: String,
    pub msg_seq: String,
    pub msg_random: String,
    pub chat_type: u32,
    pub peer_uid: String,
    pub peer_uin: String,
    pub sender_uid: String,
    pub sender_uin: String,
    pub sender_nick: String,
    /// Group card name at send time; empty outside groups.
    pub sender_card: String,
    /// Unix seconds, stringly.
    pub msg_time: String,
    /// "0" when the message has not been recalled.
    pub recall_time: String,
    pub msg_type: u32,
    pub sub_msg_type: u32,
    pub records: Vec<MsgRecord>,
    pub elements: Vec<Element>,
}

impl RawMessage {
    pub fn chat(&self) -> Option<ChatKind> {
        ChatKind::from_code(self.chat_type)
    }

    pub fn peer(&self) -> Peer {
        Peer {
            chat: self.chat().unwrap_or(ChatKind::Private),
            peer_uid: self.peer_uid.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One element of a message's ordered content list.
pub struct Element {
    pub element_id: String,
    pub payload: ElementPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Mention kind carried by a text element.
pub enum AtKind {
    None,
    All,
    One,
}

impl Default for AtKind {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Shared descriptor fields for image/video/file/audio elements.
pub struct MediaElement {
    pub file_name: String,
    pub file_path: String,
    /// Stringly byte count; "0" or empty when unknown.
    pub file_size: String,
    pub file_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Exactly one populated branch per element instance.
pub enum ElementPayload {
    Text {
        content: String,
        #[serde(default)]
        at_kind: AtKind,
        /// Public id of the mention target; may be absent or "0".
        #[serde(default)]
        at_uin: String,
        /// Internal id of the mention target.
        #[serde(default)]
        at_uid: String,
    },
    Reply {
        /// Record id cross-referenced against [`RawMessage::records`].
        source_record_id: String,
        source_seq: String,
    },
    Image {
        #[serde(flatten)]
        media: MediaElement,
        #[serde(default)]
        sub_type: u32,
    },
    Video {
        #[serde(flatten)]
        media: MediaElement,
    },
    File {
        #[serde(flatten)]
        media: MediaElement,
        #[serde(default)]
        business_id: u32,
    },
    Audio {
        #[serde(flatten)]
        media: MediaElement,
    },
    /// Structured card payload, passed through opaquely.
    Ark { payload: String },
    Face {
        index: u32,
        #[serde(default)]
        result_id: String,
    },
    MarketFace {
        /// Checksum-like resource identifier; also keys the CDN path.
        emoji_id: String,
        package_id: String,
        key: String,
        #[serde(default)]
        display_name: String,
    },
    Markdown { content: String },
    /// Forwarded-bundle marker; the container id is the message's own.
    Forward,
    SystemTip(SystemTip),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Sub-kind code of a system tip.
pub enum SystemTipKind {
    Revoke,
    InviteMember,
    JsonTip,
    Other(u32),
}

impl SystemTipKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Revoke,
            12 => Self::InviteMember,
            17 => Self::JsonTip,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// System-generated, non-text notification riding in the message stream.
pub struct SystemTip {
    pub sub_kind: SystemTipKind,
    pub body: SystemTipBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Exactly one body per tip.
pub enum SystemTipBody {
    Group(GroupTip),
    Json(JsonTip),
    Xml(XmlTip),
    Revoke(RevokeTip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Structural group-tip type.
pub enum GroupTipKind {
    MemberIncrease,
    SelfKicked,
    Ban,
    Other(u32),
}

impl GroupTipKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::MemberIncrease,
            3 => Self::SelfKicked,
            8 => Self::Ban,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Mute detail on a ban-type group tip.
pub struct ShutUpDetail {
    /// Empty when the whole group is muted.
    pub member_uid: String,
    pub admin_uid: String,
    /// Seconds, stringly; "0" lifts the mute.
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Structural group tip (joins, self-kick, mutes).
pub struct GroupTip {
    pub kind: GroupTipKind,
    #[serde(default)]
    pub member_uid: String,
    #[serde(default)]
    pub admin_uid: String,
    #[serde(default)]
    pub shut_up: Option<ShutUpDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Embedded JSON microformat tagged with a numeric business id.
pub struct JsonTip {
    pub business_id: u32,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Embedded XML template payload.
pub struct XmlTip {
    pub template_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Recall marker carrying the recalling operator.
pub struct RevokeTip {
    pub operator_uid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Group notify record type.
pub enum GroupNotifyKind {
    JoinRequest,
    InviteMe,
    JoinRequestByInvite,
    MemberExit,
    KickMember,
    Other(u32),
}

impl GroupNotifyKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::JoinRequest,
            2 => Self::InviteMe,
            4 => Self::JoinRequestByInvite,
            7 => Self::MemberExit,
            11 => Self::KickMember,
            other => Self::Other(other),
        }
    }

    /// Stable numeric code used in the downstream approval flag.
    pub fn as_code(self) -> u32 {
        match self {
            Self::JoinRequest => 1,
            Self::InviteMe => 2,
            Self::JoinRequestByInvite => 4,
            Self::MemberExit => 7,
            Self::KickMember => 11,
            Self::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Actor slot on a group notify; `uid` empty when the slot is unused.
pub struct NotifyActor {
    pub uid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One group system-notify record.
pub struct GroupNotify {
    pub kind: GroupNotifyKind,
    pub group_code: String,
    #[serde(default)]
    pub group_name: String,
    /// Subject of the notify (leaver, requester, invitee).
    pub user1: NotifyActor,
    /// Second actor when present (kicker, inviter).
    #[serde(default)]
    pub user2: NotifyActor,
    /// Microsecond-resolution sequence; also part of the approval flag.
    pub seq: String,
    #[serde(default)]
    pub postscript: String,
    #[serde(default)]
    pub status: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// One friend request record.
pub struct FriendRequest {
    pub friend_uid: String,
    pub is_initiator: bool,
    pub is_decided: bool,
    pub req_type: u32,
    /// Unix seconds, stringly.
    pub req_time: String,
    pub ext_words: String,
}
