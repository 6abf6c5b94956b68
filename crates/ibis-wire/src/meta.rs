//! Meta events: heartbeat and lifecycle.

use ibis_core::now_unix_secs;
use serde::{Deserialize, Serialize};

pub const POST_TYPE_META: &str = "meta_event";
pub const META_HEARTBEAT: &str = "heartbeat";
pub const META_LIFECYCLE: &str = "lifecycle";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaEvent {
    Heartbeat(HeartbeatMeta),
    Lifecycle(LifecycleMeta),
}

impl MetaEvent {
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, MetaEvent::Heartbeat(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    pub online: bool,
    pub good: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatMeta {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub meta_event_type: String,
    pub status: HeartbeatStatus,
    /// Milliseconds until the next heartbeat.
    pub interval: u64,
}

impl HeartbeatMeta {
    pub fn new(self_id: i64, interval_ms: u64) -> Self {
        Self {
            time: now_unix_secs() as i64,
            self_id,
            post_type: POST_TYPE_META.to_string(),
            meta_event_type: META_HEARTBEAT.to_string(),
            status: HeartbeatStatus {
                online: true,
                good: true,
            },
            interval: interval_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleMeta {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub meta_event_type: String,
    /// `enable` or `connect`.
    pub sub_type: String,
}

impl LifecycleMeta {
    pub fn connect(self_id: i64) -> Self {
        Self::new(self_id, "connect")
    }

    pub fn enable(self_id: i64) -> Self {
        Self::new(self_id, "enable")
    }

    fn new(self_id: i64, sub_type: &str) -> Self {
        Self {
            time: now_unix_secs() as i64,
            self_id,
            post_type: POST_TYPE_META.to_string(),
            meta_event_type: META_LIFECYCLE.to_string(),
            sub_type: sub_type.to_string(),
        }
    }
}
