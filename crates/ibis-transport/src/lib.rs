//! Delivery transports for wire-protocol events.
//!
//! Four independently configurable sinks: a forward (listening)
//! websocket server, reverse (connecting) websocket clients, outbound
//! webhook POSTs, and an in-memory poll queue behind an HTTP listener.
//! Every push is a non-blocking handoff; a slow or failing sink never
//! blocks the dispatch path or a sibling transport.

pub mod auth;
pub mod poll;
pub mod webhook;
pub mod ws_reverse;
pub mod ws_server;

pub use auth::{sign_payload, token_allows};
pub use poll::{PollSettings, PollTransport};
pub use webhook::{DeliveryError, WebhookSettings, WebhookTransport};
pub use ws_reverse::{WsReverseSettings, WsReverseTransport};
pub use ws_server::{WsServerSettings, WsServerTransport};

/// Floor for heartbeat scheduling so a zero/garbage configured interval
/// cannot spin a tight loop.
pub(crate) const MIN_HEART_INTERVAL_MS: u64 = 1_000;

pub(crate) fn heart_interval(configured_ms: u64) -> std::time::Duration {
    std::time::Duration::from_millis(configured_ms.max(MIN_HEART_INTERVAL_MS))
}
