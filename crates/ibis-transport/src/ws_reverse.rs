//! Reverse websocket transport: one client connection per configured
//! host, reconnecting with a fixed delay, pushing events and periodic
//! heartbeats over each live connection.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use ibis_wire::meta::{HeartbeatMeta, LifecycleMeta};

use crate::heart_interval;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const RECONNECT_DELAY_MS: u64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsReverseSettings {
    pub hosts: Vec<String>,
    pub token: String,
    pub heart_interval_ms: u64,
    pub self_id: i64,
}

struct SharedState {
    settings: ArcSwap<WsReverseSettings>,
    events: broadcast::Sender<Arc<String>>,
}

struct ConnectionSet {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

pub struct WsReverseTransport {
    shared: Arc<SharedState>,
    connections: Mutex<Option<ConnectionSet>>,
}

impl WsReverseTransport {
    pub fn new(settings: WsReverseSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(SharedState {
                settings: ArcSwap::from_pointee(settings),
                events,
            }),
            connections: Mutex::new(None),
        }
    }

    /// Spawns one reconnecting client task per configured host.
    pub fn start(&self) {
        let mut connections = self.lock_connections();
        if connections.is_some() {
            return;
        }
        let (shutdown, shutdown_rx) = watch::channel(false);
        let hosts = self.shared.settings.load().hosts.clone();
        let tasks = hosts
            .into_iter()
            .map(|host| {
                let shared = self.shared.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(run_connection(shared, host, shutdown_rx))
            })
            .collect();
        *connections = Some(ConnectionSet { shutdown, tasks });
    }

    pub fn stop(&self) {
        if let Some(set) = self.lock_connections().take() {
            let _ = set.shutdown.send(true);
            for task in set.tasks {
                task.abort();
            }
        }
    }

    /// In-place settings update; host-list changes require a restart,
    /// token and heartbeat interval apply to the next connect/tick.
    pub fn update_settings(&self, settings: WsReverseSettings) {
        self.shared.settings.store(Arc::new(settings));
    }

    pub fn push(&self, payload: Arc<String>) {
        let _ = self.shared.events.send(payload);
    }

    pub fn is_running(&self) -> bool {
        self.lock_connections().is_some()
    }

    fn lock_connections(&self) -> MutexGuard<'_, Option<ConnectionSet>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run_connection(
    shared: Arc<SharedState>,
    host: String,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        match connect_once(&shared, &host).await {
            Ok(()) => debug!(host = %host, "reverse websocket session ended"),
            Err(error) => warn!(host = %host, %error, "reverse websocket connect failed"),
        }
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(std::time::Duration::from_millis(RECONNECT_DELAY_MS)) => {}
        }
    }
}

async fn connect_once(shared: &Arc<SharedState>, host: &str) -> Result<()> {
    let settings = shared.settings.load_full();
    let mut request = host
        .into_client_request()
        .with_context(|| format!("invalid reverse websocket host '{host}'"))?;
    let headers = request.headers_mut();
    headers.insert(
        "X-Self-ID",
        HeaderValue::from_str(&settings.self_id.to_string())
            .context("self id is not a valid header value")?,
    );
    headers.insert("X-Client-Role", HeaderValue::from_static("Universal"));
    if !settings.token.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", settings.token))
                .context("token is not a valid header value")?,
        );
    }
    let (stream, _response) = connect_async(request)
        .await
        .with_context(|| format!("failed to connect reverse websocket '{host}'"))?;
    let (mut sink, mut source) = stream.split();

    let hello = serde_json::to_string(&LifecycleMeta::connect(settings.self_id))
        .context("failed to serialize lifecycle event")?;
    sink.send(WsMessage::Text(hello.into()))
        .await
        .context("failed to send lifecycle event")?;

    let mut events = shared.events.subscribe();
    loop {
        let settings = shared.settings.load_full();
        tokio::select! {
            received = events.recv() => match received {
                Ok(payload) => {
                    sink.send(WsMessage::Text(payload.as_str().to_string().into()))
                        .await
                        .context("failed to push event")?;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(host = %host, skipped, "reverse websocket lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = tokio::time::sleep(heart_interval(settings.heart_interval_ms)) => {
                let beat = HeartbeatMeta::new(settings.self_id, settings.heart_interval_ms);
                let text = serde_json::to_string(&beat)
                    .context("failed to serialize heartbeat")?;
                sink.send(WsMessage::Text(text.into()))
                    .await
                    .context("failed to push heartbeat")?;
            }
            incoming = source.next() => match incoming {
                // action frames are out of scope for the event stream
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error).context("reverse websocket read failed"),
                None => return Ok(()),
            },
        }
    }
}
