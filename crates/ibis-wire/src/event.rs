//! The outbound event envelope handed to transports.

use serde::Serialize;

use crate::message::WireMessage;
use crate::meta::MetaEvent;
use crate::notice::{NoticeEvent, RequestEvent};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
/// Any event the dispatcher can fan out. Serializes flat, exactly as
/// the inner event does.
pub enum WireEvent {
    Message(WireMessage),
    Notice(NoticeEvent),
    Request(RequestEvent),
    Meta(MetaEvent),
}

impl WireEvent {
    /// Heartbeats go to push transports only, never the poll queue.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, WireEvent::Meta(meta) if meta.is_heartbeat())
    }
}

impl From<WireMessage> for WireEvent {
    fn from(value: WireMessage) -> Self {
        Self::Message(value)
    }
}

impl From<NoticeEvent> for WireEvent {
    fn from(value: NoticeEvent) -> Self {
        Self::Notice(value)
    }
}

impl From<RequestEvent> for WireEvent {
    fn from(value: RequestEvent) -> Self {
        Self::Request(value)
    }
}

impl From<MetaEvent> for WireEvent {
    fn from(value: MetaEvent) -> Self {
        Self::Meta(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::HeartbeatMeta;
    use crate::notice::FriendAddNotice;

    #[test]
    fn envelope_serializes_inner_event_flat() {
        let event = WireEvent::Notice(NoticeEvent::FriendAdd(FriendAddNotice::new(1, 10001)));
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["notice_type"], "friend_add");
        assert!(value.get("Notice").is_none());
    }

    #[test]
    fn heartbeat_detection() {
        let beat = WireEvent::Meta(MetaEvent::Heartbeat(HeartbeatMeta::new(1, 1_000)));
        assert!(beat.is_heartbeat());
        let msg = WireEvent::Message(WireMessage::new(1, 2, 3, 4));
        assert!(!msg.is_heartbeat());
    }
}
