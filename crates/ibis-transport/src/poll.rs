//! Poll transport: a bounded in-memory queue of pending events drained
//! by an authenticated HTTP request. Non-heartbeat events always land
//! here so late-polling consumers never miss traffic the push
//! transports already delivered.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::auth::token_allows;

/// Oldest events are dropped once the queue holds this many.
const QUEUE_LIMIT: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub port: u16,
    pub token: String,
}

struct SharedState {
    settings: ArcSwap<PollSettings>,
    queue: Mutex<VecDeque<Value>>,
}

struct ListenerHandle {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct PollTransport {
    shared: Arc<SharedState>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl PollTransport {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            shared: Arc::new(SharedState {
                settings: ArcSwap::from_pointee(settings),
                queue: Mutex::new(VecDeque::new()),
            }),
            listener: Mutex::new(None),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if self.lock_listener().is_some() {
            return Ok(());
        }
        let port = self.shared.settings.load().port;
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind poll listener port {port}"))?;
        let addr = listener
            .local_addr()
            .context("failed to resolve poll listener bound address")?;
        let app = Router::new()
            .route("/get_latest_events", get(take_events).post(take_events))
            .with_state(self.shared.clone());
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(error) = serve.await {
                warn!(%error, "poll listener exited");
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

    pub fn update_settings(&self, settings: PollSettings) {
        self.shared.settings.store(Arc::new(settings));
    }

    /// Queues one event, evicting the oldest beyond the bound. Events
    /// queue even while the listener is stopped.
    pub fn push_value(&self, event: Value) {
        let mut queue = self.lock_queue();
        if queue.len() >= QUEUE_LIMIT {
            queue.pop_front();
        }
        queue.push_back(event);
    }

    /// Drains up to `limit` pending events, FIFO; zero drains all.
    pub fn drain(&self, limit: usize) -> Vec<Value> {
        let mut queue = self.lock_queue();
        let take = if limit == 0 {
            queue.len()
        } else {
            limit.min(queue.len())
        };
        queue.drain(..take).collect()
    }

    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_listener().as_ref().map(|handle| handle.addr)
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Value>> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<ListenerHandle>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn take_events(
    State(shared): State<Arc<SharedState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let settings = shared.settings.load_full();
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let query_token = params.get("access_token").map(String::as_str);
    if !token_allows(&settings.token, header_token, query_token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "failed", "retcode": 1403})),
        );
    }
    let limit = params
        .get("limit")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let drained: Vec<Value> = {
        let mut queue = shared
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let take = if limit == 0 {
            queue.len()
        } else {
            limit.min(queue.len())
        };
        queue.drain(..take).collect()
    };
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "retcode": 0, "data": drained})),
    )
}
