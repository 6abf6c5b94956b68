//! Outbound webhook transport: one POST per event to each configured
//! destination, optionally signed with a shared secret, plus an
//! optional periodic heartbeat POST.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ibis_wire::meta::HeartbeatMeta;

use crate::auth::sign_payload;
use crate::heart_interval;

const POST_TIMEOUT_MS: u64 = 10_000;
const SIGNATURE_HEADER: &str = "x-signature";
const SELF_ID_HEADER: &str = "x-self-id";

#[derive(Debug, Error)]
/// Why one webhook destination did not take an event.
pub enum DeliveryError {
    #[error("failed to reach '{host}': {source}")]
    Unreachable {
        host: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("endpoint '{host}' answered {status}")]
    Rejected { host: String, status: StatusCode },
    #[error("failed to sign payload: {0}")]
    Signing(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    pub hosts: Vec<String>,
    pub secret: String,
    pub heart_interval_ms: u64,
    pub enable_heart: bool,
    pub self_id: i64,
}

struct SharedState {
    settings: ArcSwap<WebhookSettings>,
    client: Client,
}

struct HeartbeatHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct WebhookTransport {
    shared: Arc<SharedState>,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
}

impl WebhookTransport {
    pub fn new(settings: WebhookSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(POST_TIMEOUT_MS))
            .build()
            .context("failed to build webhook http client")?;
        Ok(Self {
            shared: Arc::new(SharedState {
                settings: ArcSwap::from_pointee(settings),
                client,
            }),
            heartbeat: Mutex::new(None),
        })
    }

    /// Starts the heartbeat task when enabled. Event delivery needs no
    /// running state; each push spawns its own fire-and-forget POSTs.
    pub fn start(&self) {
        let mut heartbeat = self.lock_heartbeat();
        if heartbeat.is_some() || !self.shared.settings.load().enable_heart {
            return;
        }
        let shared = self.shared.clone();
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                let settings = shared.settings.load_full();
                tokio::select! {
                    _ = shutdown_rx.changed() => return,
                    _ = tokio::time::sleep(heart_interval(settings.heart_interval_ms)) => {}
                }
                let beat = HeartbeatMeta::new(settings.self_id, settings.heart_interval_ms);
                match serde_json::to_string(&beat) {
                    Ok(body) => deliver(&shared, Arc::new(body)).await,
                    Err(error) => warn!(%error, "failed to serialize heartbeat"),
                }
            }
        });
        *heartbeat = Some(HeartbeatHandle { shutdown, task });
    }

    pub fn stop(&self) {
        if let Some(handle) = self.lock_heartbeat().take() {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }
    }

    /// In-place settings update; a heartbeat-enable flip requires a
    /// stop/start cycle, everything else applies to the next delivery.
    pub fn update_settings(&self, settings: WebhookSettings) {
        self.shared.settings.store(Arc::new(settings));
    }

    /// Fire-and-forget delivery to every configured host.
    pub fn push(&self, payload: Arc<String>) {
        if self.shared.settings.load().hosts.is_empty() {
            return;
        }
        let shared = self.shared.clone();
        tokio::spawn(async move {
            deliver(&shared, payload).await;
        });
    }

    fn lock_heartbeat(&self) -> MutexGuard<'_, Option<HeartbeatHandle>> {
        self.heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn deliver(shared: &Arc<SharedState>, payload: Arc<String>) {
    let settings = shared.settings.load_full();
    for host in &settings.hosts {
        if let Err(error) = post_one(shared, &settings, host, &payload).await {
            warn!(host = %host, %error, "webhook delivery failed");
        } else {
            debug!(host = %host, "webhook delivered");
        }
    }
}

async fn post_one(
    shared: &Arc<SharedState>,
    settings: &WebhookSettings,
    host: &str,
    payload: &str,
) -> Result<(), DeliveryError> {
    let mut request = shared
        .client
        .post(host)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(SELF_ID_HEADER, settings.self_id.to_string())
        .body(payload.to_string());
    if !settings.secret.is_empty() {
        request = request.header(SIGNATURE_HEADER, sign_payload(&settings.secret, payload)?);
    }
    let response = request
        .send()
        .await
        .map_err(|source| DeliveryError::Unreachable {
            host: host.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(DeliveryError::Rejected {
            host: host.to_string(),
            status,
        });
    }
    Ok(())
}
