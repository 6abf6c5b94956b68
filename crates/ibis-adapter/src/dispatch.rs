//! Adapter dispatcher.
//!
//! Process-wide coordinator: owns the translation context (resolver,
//! ledger, member cache), the short-term message cache, the current
//! config snapshot, and the delivery transports. Raw kernel event
//! batches come in serially; constructed wire events fan out to every
//! enabled transport independently. A failure while processing one
//! batch item is logged and never aborts the rest of the batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use ibis_core::{now_unix_ms, parse_num, unix_expired};
use ibis_kernel::{
    ConfigSnapshot, FriendRequest, GroupNotify, KernelBridge, MemberRecord, MemberRole,
    RawMessage, SelfIdentity, REQ_TYPE_AWAIT_PEER_CONFIRM,
};
use ibis_transport::{
    PollSettings, PollTransport, WebhookSettings, WebhookTransport, WsReverseSettings,
    WsReverseTransport, WsServerSettings, WsServerTransport,
};
use ibis_wire::notice::{
    FriendRequestEvent, GroupAdminNotice, GroupCardNotice, NoticeEvent, RequestEvent,
};
use ibis_wire::WireEvent;

use crate::classify;
use crate::config_diff::{diff_snapshots, TransportAction};
use crate::context::TranslateCtx;
use crate::decode;

struct CacheSlot {
    msg: Arc<RawMessage>,
    deadline_ms: u64,
}

pub struct AdapterDispatcher {
    ctx: TranslateCtx,
    config: ArcSwap<ConfigSnapshot>,
    start_time_ms: AtomicU64,
    cache: Mutex<HashMap<String, CacheSlot>>,
    ws: WsServerTransport,
    ws_reverse: WsReverseTransport,
    webhook: WebhookTransport,
    poll: PollTransport,
}

impl AdapterDispatcher {
    pub fn new(
        bridge: Arc<dyn KernelBridge>,
        self_info: SelfIdentity,
        config: ConfigSnapshot,
    ) -> Result<Self> {
        let ctx = TranslateCtx::new(bridge, self_info);
        let self_id = ctx.self_id();
        Ok(Self {
            ws: WsServerTransport::new(ws_settings(&config, self_id)),
            ws_reverse: WsReverseTransport::new(ws_reverse_settings(&config, self_id)),
            webhook: WebhookTransport::new(webhook_settings(&config, self_id))?,
            poll: PollTransport::new(poll_settings(&config)),
            config: ArcSwap::from_pointee(config),
            start_time_ms: AtomicU64::new(0),
            cache: Mutex::new(HashMap::new()),
            ctx,
        })
    }

    /// Marks process start (events older than this are discarded) and
    /// brings up every enabled transport. A transport that fails to
    /// start is logged and skipped; the rest still come up.
    pub async fn start(&self) {
        self.start_time_ms.store(now_unix_ms(), Ordering::SeqCst);
        let config = self.config.load_full();
        if config.ws.enabled {
            if let Err(error) = self.ws.start().await {
                warn!(%error, "forward websocket failed to start");
            }
        }
        if config.ws_reverse.enabled {
            self.ws_reverse.start();
        }
        if config.http.enabled {
            if let Err(error) = self.poll.start().await {
                warn!(%error, "poll listener failed to start");
            }
        }
        if config.http_post.enabled {
            self.webhook.start();
        }
        info!("adapter dispatcher started");
    }

    pub async fn stop(&self) {
        self.ws.stop().await;
        self.ws_reverse.stop();
        self.webhook.stop();
        self.poll.stop().await;
    }

    pub fn config(&self) -> Arc<ConfigSnapshot> {
        self.config.load_full()
    }

    pub fn ctx(&self) -> &TranslateCtx {
        &self.ctx
    }

    /// The poll queue; consumers drain it via the HTTP listener, tests
    /// and embedders may drain it directly.
    pub fn poll_transport(&self) -> &PollTransport {
        &self.poll
    }

    /// Fans one constructed event out to every enabled transport.
    /// Delivery is a non-blocking handoff per transport; heartbeats
    /// skip the poll queue.
    pub fn dispatch(&self, event: &WireEvent) {
        let value = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "failed to serialize outbound event");
                return;
            }
        };
        let payload = Arc::new(value.to_string());
        let config = self.config.load();
        if config.ws.enabled {
            self.ws.push(payload.clone());
        }
        if config.ws_reverse.enabled {
            self.ws_reverse.push(payload.clone());
        }
        if config.http_post.enabled {
            self.webhook.push(payload.clone());
        }
        if !event.is_heartbeat() {
            self.poll.push_value(value);
        }
    }

    pub async fn on_message_created(&self, batch: Vec<RawMessage>) {
        let config = self.config.load_full();
        let start_secs = self.start_time_ms.load(Ordering::SeqCst) / 1_000;
        for msg in batch {
            if (parse_num(&msg.msg_time).max(0) as u64) < start_secs {
                continue;
            }
            let peer = msg.peer();
            let short_id = self.ctx.ledger.assign(&peer, &msg.msg_id);
            let msg = Arc::new(msg);
            self.cache_message(&msg, config.msg_cache_expire_secs);

            match decode::build_message(&self.ctx, &msg, short_id, config.debug).await {
                Ok(mut wire) => {
                    let is_self = msg.sender_uin == self.ctx.self_info.uin;
                    let reportable = (config.debug || !wire.message.is_empty())
                        && (!is_self || config.report_self_message);
                    if reportable {
                        if is_self {
                            wire.target_id = Some(parse_num(&msg.peer_uin));
                        }
                        self.dispatch(&WireEvent::Message(wire));
                    }
                }
                Err(error) => {
                    warn!(%error, msg_id = %msg.msg_id, "message construction failed");
                }
            }

            // notice derivation runs independently of the message
            // itself; a card change can ride along a normal message
            if let Some(notice) = classify::group_notice(&self.ctx, &msg).await {
                self.dispatch(&WireEvent::Notice(notice));
            }
            if let Some(notice) = classify::private_notice(&self.ctx, &msg).await {
                self.dispatch(&WireEvent::Notice(notice));
            }
        }
    }

    pub async fn on_message_recalled(&self, batch: Vec<RawMessage>) {
        for msg in batch {
            if parse_num(&msg.recall_time) == 0 {
                continue;
            }
            // a recall of a message this process never assigned a short
            // id to has nothing external to reference; drop it
            let Some(short_id) = self.ctx.ledger.short_id_of(&msg.msg_id) else {
                debug!(msg_id = %msg.msg_id, "recall of unseen message dropped");
                continue;
            };
            if let Some(notice) = classify::recall_notice(&self.ctx, &msg, short_id).await {
                self.dispatch(&WireEvent::Notice(notice));
            }
        }
    }

    /// Sent-echo batches share the recall shape and handling.
    pub async fn on_message_echo(&self, batch: Vec<RawMessage>) {
        self.on_message_recalled(batch).await;
    }

    pub async fn on_group_notify(&self, batch: Vec<GroupNotify>) {
        let start_ms = self.start_time_ms.load(Ordering::SeqCst);
        for notify in batch {
            let notify_time_ms = (parse_num(&notify.seq).max(0) as u64) / 1_000;
            if notify_time_ms < start_ms {
                continue;
            }
            match classify::from_group_notify(&self.ctx, &notify).await {
                Some(event) => self.dispatch(&event),
                None => debug!(kind = ?notify.kind, "group notify not classified"),
            }
        }
    }

    pub async fn on_friend_request(&self, batch: Vec<FriendRequest>) {
        let start_secs = self.start_time_ms.load(Ordering::SeqCst) / 1_000;
        for request in batch {
            if request.is_initiator
                || (request.is_decided && request.req_type != REQ_TYPE_AWAIT_PEER_CONFIRM)
            {
                continue;
            }
            if (parse_num(&request.req_time).max(0) as u64) < start_secs {
                continue;
            }
            let user_id = match self.ctx.resolver.resolve_public(&request.friend_uid).await {
                Some(uin) => parse_num(&uin),
                None => {
                    warn!(uid = %request.friend_uid, "requester id resolution failed");
                    0
                }
            };
            let flag = format!("{}|{}", request.friend_uid, request.req_time);
            self.dispatch(&WireEvent::Request(RequestEvent::Friend(
                FriendRequestEvent::new(self.ctx.self_id(), user_id, &request.ext_words, &flag),
            )));
        }
    }

    pub async fn on_member_updated(&self, group: &str, members: Vec<MemberRecord>) {
        let group_id = parse_num(group);
        for member in members {
            let Some(existing) = self
                .ctx
                .members
                .get(self.ctx.bridge.as_ref(), group, &member.uin)
                .await
            else {
                continue;
            };
            if existing.card_name != member.card_name {
                self.dispatch(&WireEvent::Notice(NoticeEvent::GroupCard(
                    GroupCardNotice::new(
                        self.ctx.self_id(),
                        group_id,
                        parse_num(&member.uin),
                        &member.card_name,
                        &existing.card_name,
                    ),
                )));
            } else if existing.role != member.role {
                let sub_type = if member.role == MemberRole::Admin {
                    "set"
                } else {
                    "unset"
                };
                self.dispatch(&WireEvent::Notice(NoticeEvent::GroupAdmin(
                    GroupAdminNotice::new(
                        self.ctx.self_id(),
                        group_id,
                        parse_num(&member.uin),
                        sub_type,
                    ),
                )));
            }
            self.ctx.members.update(group, member);
        }
    }

    /// Applies a fresh config snapshot: settings update in place on
    /// every transport, then the per-transport diff decides who cycles,
    /// and finally the snapshot is swapped atomically.
    pub async fn on_config_updated(&self, new: ConfigSnapshot) {
        let old = self.config.load_full();
        let self_id = self.ctx.self_id();
        self.ws.update_settings(ws_settings(&new, self_id));
        self.ws_reverse
            .update_settings(ws_reverse_settings(&new, self_id));
        self.webhook
            .update_settings(webhook_settings(&new, self_id));
        self.poll.update_settings(poll_settings(&new));

        let diff = diff_snapshots(&old, &new);
        match diff.ws {
            TransportAction::Start => self.start_ws().await,
            TransportAction::Stop => self.ws.stop().await,
            TransportAction::Restart => {
                self.ws.stop().await;
                self.start_ws().await;
            }
            TransportAction::Keep => {}
        }
        match diff.ws_reverse {
            TransportAction::Start => self.ws_reverse.start(),
            TransportAction::Stop => self.ws_reverse.stop(),
            TransportAction::Restart => {
                self.ws_reverse.stop();
                self.ws_reverse.start();
            }
            TransportAction::Keep => {}
        }
        match diff.http {
            TransportAction::Start => self.start_poll().await,
            TransportAction::Stop => self.poll.stop().await,
            TransportAction::Restart => {
                self.poll.stop().await;
                self.start_poll().await;
            }
            TransportAction::Keep => {}
        }
        match diff.http_post {
            TransportAction::Start => self.webhook.start(),
            TransportAction::Stop => self.webhook.stop(),
            TransportAction::Restart => {
                self.webhook.stop();
                self.webhook.start();
            }
            TransportAction::Keep => {}
        }
        self.config.store(Arc::new(new));
    }

    /// Recently processed message, when still within its cache window.
    pub fn cached_message(&self, msg_id: &str) -> Option<Arc<RawMessage>> {
        let now = now_unix_ms();
        let cache = self.lock_cache();
        let slot = cache.get(msg_id)?;
        if unix_expired(Some(slot.deadline_ms), now) {
            return None;
        }
        Some(slot.msg.clone())
    }

    fn cache_message(&self, msg: &Arc<RawMessage>, expire_secs: u64) {
        if expire_secs == 0 {
            return;
        }
        let now = now_unix_ms();
        let mut cache = self.lock_cache();
        cache.retain(|_, slot| !unix_expired(Some(slot.deadline_ms), now));
        cache.insert(
            msg.msg_id.clone(),
            CacheSlot {
                msg: msg.clone(),
                deadline_ms: now + expire_secs * 1_000,
            },
        );
    }

    async fn start_ws(&self) {
        if let Err(error) = self.ws.start().await {
            warn!(%error, "forward websocket failed to start");
        }
    }

    async fn start_poll(&self) {
        if let Err(error) = self.poll.start().await {
            warn!(%error, "poll listener failed to start");
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, CacheSlot>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ws_settings(config: &ConfigSnapshot, self_id: i64) -> WsServerSettings {
    WsServerSettings {
        port: config.ws.port,
        token: config.token.clone(),
        heart_interval_ms: config.heart_interval_ms,
        self_id,
    }
}

fn ws_reverse_settings(config: &ConfigSnapshot, self_id: i64) -> WsReverseSettings {
    WsReverseSettings {
        hosts: config.ws_reverse.hosts.clone(),
        token: config.token.clone(),
        heart_interval_ms: config.heart_interval_ms,
        self_id,
    }
}

fn webhook_settings(config: &ConfigSnapshot, self_id: i64) -> WebhookSettings {
    WebhookSettings {
        hosts: config.http_post.hosts.clone(),
        secret: config.http_post.secret.clone(),
        heart_interval_ms: config.heart_interval_ms,
        enable_heart: config.http_post.enable_heart,
        self_id,
    }
}

fn poll_settings(config: &ConfigSnapshot) -> PollSettings {
    PollSettings {
        port: config.http.port,
        token: config.token.clone(),
    }
}
