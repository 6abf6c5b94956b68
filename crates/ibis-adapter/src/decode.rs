//! Message fragment decoder and wire-message constructor.
//!
//! Converts one raw kernel message's heterogeneous element list into an
//! ordered fragment sequence plus the canonical raw-text rendering, and
//! wraps it with sender metadata per chat kind. Fragment-level failures
//! (an unresolvable mention, an unverifiable quote, a media URL the
//! kernel refuses to mint) drop that fragment or degrade its fields;
//! they never fail the message.

use anyhow::Result;
use tracing::{debug, warn};

use ibis_core::{now_unix_secs, parse_num, parse_num_opt};
use ibis_kernel::{
    AtKind, ChatKind, Element, ElementPayload, MediaElement, MediaKind, MediaUrlRequest, Peer,
    RawMessage,
};
use ibis_wire::message::{
    MESSAGE_TYPE_GROUP, MESSAGE_TYPE_PRIVATE, POST_TYPE_MESSAGE_SENT, SUB_TYPE_FRIEND,
    SUB_TYPE_GROUP, SUB_TYPE_NORMAL,
};
use ibis_wire::{encode_fragments, Fragment, WireMessage};

use crate::context::TranslateCtx;

/// Large shared-archive channel whose quoted messages cannot be pinned
/// to an exact record; quote verification is skipped for it.
pub const QUOTE_VERIFY_EXEMPT_PEER: &str = "284840486";

/// Fallback group attribution for a temp session whose origin lookup
/// failed.
const TEMP_SESSION_FALLBACK_GROUP: i64 = 284840486;
const TEMP_SESSION_FALLBACK_NICK: &str = "temporary session";

const FACE_INDEX_DICE: u32 = 358;
const FACE_INDEX_RPS: u32 = 359;

/// Sticker CDN; the first two characters of the resource checksum pick
/// the partition directory.
const STICKER_CDN_BASE: &str = "https://gxh.vip.qq.com/club/item/parcel/item";

/// Builds the full wire message for one raw kernel message.
pub async fn build_message(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    short_id: i32,
    include_raw: bool,
) -> Result<WireMessage> {
    let time = parse_num_opt(&msg.msg_time)
        .filter(|value| *value > 0)
        .unwrap_or_else(|| now_unix_secs() as i64);
    let mut wire = WireMessage::new(ctx.self_id(), parse_num(&msg.sender_uin), time, short_id);
    wire.sender.nickname = msg.sender_nick.clone();
    wire.sender.card = msg.sender_card.clone();
    if msg.sender_uin == ctx.self_info.uin {
        wire.post_type = POST_TYPE_MESSAGE_SENT.to_string();
    }

    match msg.chat() {
        Some(ChatKind::Group) => {
            wire.message_type = MESSAGE_TYPE_GROUP.to_string();
            wire.sub_type = SUB_TYPE_NORMAL.to_string();
            wire.group_id = Some(parse_num(&msg.peer_uin));
            if let Some(member) = ctx
                .members
                .get(ctx.bridge.as_ref(), &msg.peer_uid, &msg.sender_uin)
                .await
            {
                wire.sender.role = Some(role_name(member.role).to_string());
                wire.sender.nickname = member.nick.clone();
            }
        }
        Some(ChatKind::Private) | None => {
            wire.message_type = MESSAGE_TYPE_PRIVATE.to_string();
            wire.sub_type = SUB_TYPE_FRIEND.to_string();
            match ctx.bridge.fetch_profile_by_internal(&msg.sender_uid).await {
                Ok(profile) => wire.sender.nickname = profile.nick,
                Err(error) => debug!(%error, "sender profile lookup failed; keeping kernel nick"),
            }
        }
        Some(ChatKind::TempFromGroup) => {
            wire.message_type = MESSAGE_TYPE_PRIVATE.to_string();
            wire.sub_type = SUB_TYPE_GROUP.to_string();
            match ctx.bridge.temp_chat_info(&msg.sender_uid).await {
                Ok(Some(info)) => {
                    wire.group_id = Some(parse_num(&info.group_code));
                    wire.sender.nickname = info.from_nick;
                }
                Ok(None) | Err(_) => {
                    wire.group_id = Some(TEMP_SESSION_FALLBACK_GROUP);
                    wire.sender.nickname = TEMP_SESSION_FALLBACK_NICK.to_string();
                }
            }
        }
    }

    wire.message = decode_fragments(ctx, msg).await;
    wire.raw_message = encode_fragments(&wire.message);
    if include_raw {
        wire.raw = serde_json::to_value(msg).ok();
    }
    Ok(wire)
}

/// Decodes the element list into ordered fragments; one pass, one
/// fragment at most per element, unrecognized kinds skipped.
pub async fn decode_fragments(ctx: &TranslateCtx, msg: &RawMessage) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    for element in &msg.elements {
        match &element.payload {
            ElementPayload::Text {
                at_kind: AtKind::All,
                ..
            } => {
                fragments.push(Fragment::At {
                    qq: "all".to_string(),
                    name: None,
                });
            }
            ElementPayload::Text {
                content,
                at_kind: AtKind::One,
                at_uin,
                at_uid,
            } => {
                if let Some(qq) = mention_target(ctx, msg, at_uin, at_uid).await {
                    fragments.push(Fragment::At {
                        qq,
                        name: Some(content.trim_start_matches('@').to_string()),
                    });
                }
            }
            ElementPayload::Text { content, .. } => {
                if !content.trim().is_empty() {
                    fragments.push(Fragment::Text {
                        text: content.clone(),
                    });
                }
            }
            ElementPayload::Reply {
                source_record_id,
                source_seq,
            } => match resolve_reply(ctx, msg, source_record_id, source_seq).await {
                Some(id) => fragments.push(Fragment::Reply { id }),
                None => {
                    debug!(seq = %source_seq, "quoted message unverifiable; reply dropped");
                }
            },
            ElementPayload::Image { media, sub_type } => {
                let url = media_url(ctx, msg, element, MediaKind::Image, media).await;
                fragments.push(Fragment::Image {
                    file: media.file_name.clone(),
                    sub_type: *sub_type,
                    url,
                    file_size: size_or_zero(&media.file_size),
                });
                register_file(ctx, msg, element, media);
            }
            ElementPayload::Video { media } => {
                let url = media_url(ctx, msg, element, MediaKind::Video, media).await;
                fragments.push(Fragment::Video {
                    file: media.file_name.clone(),
                    path: media.file_path.clone(),
                    url,
                    file_size: size_or_zero(&media.file_size),
                });
                register_file(ctx, msg, element, media);
            }
            ElementPayload::File { media, .. } => {
                let url = media_url(ctx, msg, element, MediaKind::File, media).await;
                fragments.push(Fragment::File {
                    file: media.file_name.clone(),
                    path: media.file_path.clone(),
                    file_id: media.file_uuid.clone(),
                    url,
                    file_size: size_or_zero(&media.file_size),
                });
                register_file(ctx, msg, element, media);
            }
            ElementPayload::Audio { media } => {
                let url = media_url(ctx, msg, element, MediaKind::Audio, media).await;
                fragments.push(Fragment::Record {
                    file: media.file_name.clone(),
                    path: media.file_path.clone(),
                    url,
                    file_size: size_or_zero(&media.file_size),
                });
                register_file(ctx, msg, element, media);
            }
            ElementPayload::Ark { payload } => fragments.push(Fragment::Json {
                data: payload.clone(),
            }),
            ElementPayload::Markdown { content } => fragments.push(Fragment::Markdown {
                data: content.clone(),
            }),
            ElementPayload::Face { index, result_id } => {
                fragments.push(match *index {
                    FACE_INDEX_DICE => Fragment::Dice {
                        result: result_id.clone(),
                    },
                    FACE_INDEX_RPS => Fragment::Rps {
                        result: result_id.clone(),
                    },
                    _ => Fragment::Face {
                        id: index.to_string(),
                    },
                });
            }
            ElementPayload::MarketFace {
                emoji_id,
                package_id,
                key,
                display_name,
            } => {
                fragments.push(Fragment::Mface {
                    summary: display_name.clone(),
                    url: sticker_url(emoji_id),
                    emoji_id: emoji_id.clone(),
                    emoji_package_id: package_id.clone(),
                    key: key.clone(),
                });
                ctx.ledger.remember_sticker_name(emoji_id, display_name);
            }
            ElementPayload::Forward => fragments.push(Fragment::Forward {
                id: msg.msg_id.clone(),
            }),
            ElementPayload::SystemTip(_) | ElementPayload::Unknown => {}
        }
    }
    fragments
}

/// Public id of a mention target: the element's own field when usable,
/// otherwise a group-membership lookup on the internal id. `None`
/// drops the fragment silently.
async fn mention_target(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    at_uin: &str,
    at_uid: &str,
) -> Option<String> {
    if !at_uin.is_empty() && at_uin != "0" {
        return Some(at_uin.to_string());
    }
    let member = ctx
        .members
        .get(ctx.bridge.as_ref(), &msg.peer_uid, at_uid)
        .await?;
    if member.uin.is_empty() {
        return None;
    }
    Some(member.uin.clone())
}

/// Verifies a quote against the local record list and a re-fetched
/// copy; on success returns the quoted message's short id.
async fn resolve_reply(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    source_record_id: &str,
    source_seq: &str,
) -> Option<String> {
    let record = msg
        .records
        .iter()
        .find(|record| record.msg_id == source_record_id)?;
    let peer = msg.peer();
    let mut quoted = match ctx.bridge.fetch_by_sequence(&peer, source_seq, 1).await {
        Ok(batch) => batch.into_iter().next(),
        Err(error) => {
            debug!(%error, seq = %source_seq, "bulk quote fetch failed");
            None
        }
    };
    let verified = |candidate: &RawMessage| candidate.msg_random == record.msg_random;
    if !quoted.as_ref().is_some_and(verified) {
        quoted = ctx
            .bridge
            .fetch_single(&peer, source_seq)
            .await
            .ok()
            .flatten();
    }
    if !quoted.as_ref().is_some_and(verified) && msg.peer_uin != QUOTE_VERIFY_EXEMPT_PEER {
        return None;
    }
    let quoted = quoted?;
    Some(ctx.ledger.assign(&peer, &quoted.msg_id).to_string())
}

async fn media_url(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    element: &Element,
    kind: MediaKind,
    media: &MediaElement,
) -> String {
    let request = MediaUrlRequest {
        kind,
        peer: msg.peer(),
        msg_id: msg.msg_id.clone(),
        element_id: element.element_id.clone(),
        file_path: media.file_path.clone(),
        file_uuid: media.file_uuid.clone(),
    };
    match ctx.bridge.media_url(request).await {
        Ok(url) => url,
        Err(error) => {
            warn!(%error, element = %element.element_id, "media url generation failed");
            String::new()
        }
    }
}

fn register_file(ctx: &TranslateCtx, msg: &RawMessage, element: &Element, media: &MediaElement) {
    ctx.ledger.add_file(crate::ledger::FileCacheEntry {
        peer: Peer {
            chat: msg.chat().unwrap_or(ChatKind::Private),
            peer_uid: msg.peer_uid.clone(),
        },
        msg_id: msg.msg_id.clone(),
        element_id: element.element_id.clone(),
        file_name: media.file_name.clone(),
        file_size: size_or_zero(&media.file_size),
        file_uuid: media.file_uuid.clone(),
        msg_time: parse_num(&msg.msg_time).max(0) as u64,
    });
}

fn sticker_url(emoji_id: &str) -> String {
    let dir = emoji_id.get(..2).unwrap_or(emoji_id);
    format!("{STICKER_CDN_BASE}/{dir}/{emoji_id}/raw300.gif")
}

fn size_or_zero(size: &str) -> String {
    if size.is_empty() {
        "0".to_string()
    } else {
        size.to_string()
    }
}

fn role_name(role: ibis_kernel::MemberRole) -> &'static str {
    match role {
        ibis_kernel::MemberRole::Owner => "owner",
        ibis_kernel::MemberRole::Admin => "admin",
        ibis_kernel::MemberRole::Member => "member",
    }
}
