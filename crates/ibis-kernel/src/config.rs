//! Runtime configuration snapshot.
//!
//! A full snapshot arrives as a kernel event and replaces the previous
//! one atomically; the dispatcher diffs old against new to decide which
//! transports restart versus update in place. The value itself is
//! immutable once constructed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Poll-queue HTTP listener section.
pub struct HttpSection {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Outbound webhook-POST section.
pub struct HttpPostSection {
    pub enabled: bool,
    pub hosts: Vec<String>,
    pub secret: String,
    pub enable_heart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Forward (listening) websocket section.
pub struct WsSection {
    pub enabled: bool,
    pub port: u16,
}

impl Default for WsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Reverse (connecting) websocket section.
pub struct WsReverseSection {
    pub enabled: bool,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// All transport/runtime options in effect at one instant.
pub struct ConfigSnapshot {
    pub token: String,
    pub heart_interval_ms: u64,
    /// Seconds a message stays in the short-term cache; zero disables
    /// caching entirely.
    pub msg_cache_expire_secs: u64,
    pub report_self_message: bool,
    pub debug: bool,
    pub http: HttpSection,
    pub http_post: HttpPostSection,
    pub ws: WsSection,
    pub ws_reverse: WsReverseSection,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            token: String::new(),
            heart_interval_ms: 60_000,
            msg_cache_expire_secs: 120,
            report_self_message: false,
            debug: false,
            http: HttpSection::default(),
            http_post: HttpPostSection::default(),
            ws: WsSection::default(),
            ws_reverse: WsReverseSection::default(),
        }
    }
}
