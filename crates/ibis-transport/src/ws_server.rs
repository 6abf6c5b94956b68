//! Forward websocket transport: a listening server that pushes every
//! dispatched event to each connected, authenticated client and emits
//! heartbeats on the configured interval.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ibis_wire::meta::LifecycleMeta;

use crate::auth::token_allows;
use crate::heart_interval;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsServerSettings {
    pub port: u16,
    pub token: String,
    pub heart_interval_ms: u64,
    pub self_id: i64,
}

struct SharedState {
    settings: ArcSwap<WsServerSettings>,
    events: broadcast::Sender<Arc<String>>,
}

struct ListenerHandle {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct WsServerTransport {
    shared: Arc<SharedState>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl WsServerTransport {
    pub fn new(settings: WsServerSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(SharedState {
                settings: ArcSwap::from_pointee(settings),
                events,
            }),
            listener: Mutex::new(None),
        }
    }

    /// Binds the configured port and starts accepting upgrades.
    /// Idempotent: a second start while running is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.lock_listener().is_some() {
            return Ok(());
        }
        let port = self.shared.settings.load().port;
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind forward websocket port {port}"))?;
        let addr = listener
            .local_addr()
            .context("failed to resolve forward websocket bound address")?;
        let app = Router::new()
            .route("/", any(upgrade_handler))
            .route("/event", any(upgrade_handler))
            .with_state(self.shared.clone());
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(error) = serve.await {
                warn!(%error, "forward websocket server exited");
            }
        });
        *self.lock_listener() = Some(ListenerHandle {
            addr,
            shutdown,
            task,
        });
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.lock_listener().take() {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }
    }

    /// In-place settings update; takes effect without a restart for
    /// everything except the listen port.
    pub fn update_settings(&self, settings: WsServerSettings) {
        self.shared.settings.store(Arc::new(settings));
    }

    /// Non-blocking fan-out to all connected clients.
    pub fn push(&self, payload: Arc<String>) {
        let _ = self.shared.events.send(payload);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_listener().as_ref().map(|handle| handle.addr)
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<ListenerHandle>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn upgrade_handler(
    State(shared): State<Arc<SharedState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let settings = shared.settings.load_full();
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let query_token = params.get("access_token").map(String::as_str);
    if !token_allows(&settings.token, header_token, query_token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| client_session(socket, shared))
}

async fn client_session(mut socket: WebSocket, shared: Arc<SharedState>) {
    let mut events = shared.events.subscribe();
    let settings = shared.settings.load_full();
    if let Ok(hello) = serde_json::to_string(&LifecycleMeta::connect(settings.self_id)) {
        if socket.send(Message::Text(hello.into())).await.is_err() {
            return;
        }
    }
    loop {
        let settings = shared.settings.load_full();
        tokio::select! {
            received = events.recv() => match received {
                Ok(payload) => {
                    if socket
                        .send(Message::Text(payload.as_str().to_string().into()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "forward websocket client lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            _ = tokio::time::sleep(heart_interval(settings.heart_interval_ms)) => {
                let beat = ibis_wire::meta::HeartbeatMeta::new(
                    settings.self_id,
                    settings.heart_interval_ms,
                );
                let Ok(text) = serde_json::to_string(&beat) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            incoming = socket.recv() => match incoming {
                // inbound frames belong to the action surface, which is
                // handled elsewhere; the event stream ignores them
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> WsServerSettings {
        WsServerSettings {
            port: 0,
            token: String::new(),
            heart_interval_ms: 60_000,
            self_id: 10_000,
        }
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port_and_stop_releases() {
        let transport = WsServerTransport::new(settings());
        transport.start().await.expect("start");
        let addr = transport.local_addr().expect("bound");
        assert_ne!(addr.port(), 0);
        // double start is a no-op
        transport.start().await.expect("restart");
        assert_eq!(transport.local_addr(), Some(addr));
        transport.stop().await;
        assert!(transport.local_addr().is_none());
    }

    #[tokio::test]
    async fn push_without_clients_is_non_blocking() {
        let transport = WsServerTransport::new(settings());
        for n in 0..1_000 {
            transport.push(Arc::new(format!("{{\"n\":{n}}}")));
        }
    }
}
