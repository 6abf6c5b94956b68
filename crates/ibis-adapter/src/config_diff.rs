//! Config snapshot diffing.
//!
//! Pure decision logic: given the snapshot in effect and a freshly
//! delivered one, decide per transport whether it keeps running with
//! in-place settings, toggles, or needs a stop+start cycle. In-place
//! updates (token, secret, heartbeat interval, webhook hosts) are
//! applied unconditionally by the dispatcher and never appear here.

use ibis_kernel::ConfigSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    /// Keep running (or keep stopped); in-place settings suffice.
    Keep,
    Start,
    Stop,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDiff {
    pub http: TransportAction,
    pub http_post: TransportAction,
    pub ws: TransportAction,
    pub ws_reverse: TransportAction,
}

pub fn diff_snapshots(old: &ConfigSnapshot, new: &ConfigSnapshot) -> ConfigDiff {
    ConfigDiff {
        http: action(
            old.http.enabled,
            new.http.enabled,
            old.http.port != new.http.port,
        ),
        http_post: action(
            old.http_post.enabled,
            new.http_post.enabled,
            old.http_post.enable_heart != new.http_post.enable_heart,
        ),
        ws: action(old.ws.enabled, new.ws.enabled, old.ws.port != new.ws.port),
        ws_reverse: action(
            old.ws_reverse.enabled,
            new.ws_reverse.enabled,
            hosts_changed(&old.ws_reverse.hosts, &new.ws_reverse.hosts),
        ),
    }
}

fn action(was_enabled: bool, is_enabled: bool, needs_restart: bool) -> TransportAction {
    match (was_enabled, is_enabled) {
        (false, true) => TransportAction::Start,
        (true, false) => TransportAction::Stop,
        (true, true) if needs_restart => TransportAction::Restart,
        _ => TransportAction::Keep,
    }
}

fn hosts_changed(old: &[String], new: &[String]) -> bool {
    old.len() != new.len() || new.iter().any(|host| !old.contains(host))
}
