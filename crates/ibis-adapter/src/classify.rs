//! Notification classifier.
//!
//! Pattern matcher over system-tip payloads and group-notify records.
//! Each raw event yields at most one typed notice; the first conclusive
//! match in priority order wins (structural group tips, then file
//! elements, then embedded JSON business ids, then XML templates).
//! Classification misses are not errors; they simply yield `None`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use ibis_core::parse_num;
use ibis_kernel::{
    ChatKind, ElementPayload, GroupNotify, GroupNotifyKind, GroupTip, GroupTipKind, JsonTip, Peer,
    RawMessage, RevokeTip, SystemTipBody, SystemTipKind, XmlTip,
};
use ibis_wire::notice::{
    EmojiLike, EmojiLikeNotice, EssenceNotice, FriendAddNotice, FriendRecallNotice,
    GroupBanNotice, GroupCardNotice, GroupDecreaseNotice, GroupIncreaseNotice, GroupRecallNotice,
    GroupRequestEvent, GroupTitleNotice, GroupUploadNotice, NoticeEvent, PokeNotice, RequestEvent,
    UploadedFile,
};
use ibis_wire::WireEvent;

use crate::context::TranslateCtx;

/// JSON business ids embedded in system tips.
const BUSINESS_ID_POKE: u32 = 1061;
const BUSINESS_ID_ESSENCE: u32 = 2401;
const BUSINESS_ID_TITLE: u32 = 2407;

/// XML template ids embedded in system tips.
const TEMPLATE_EMOJI_REACTION: &str = "10382";
const TEMPLATE_INVITED_MEMBER: &str = "10179";

/// Message type/sub-type pair marking a new-friend confirmation.
const MSG_TYPE_FRIEND_ADD: u32 = 5;
const SUB_MSG_TYPE_FRIEND_ADD: u32 = 12;

/// Group-side notice derivation for one raw message. Runs after (and
/// independently of) wire-message construction for the same message.
pub async fn group_notice(ctx: &TranslateCtx, msg: &RawMessage) -> Option<NoticeEvent> {
    if msg.chat() != Some(ChatKind::Group) {
        return None;
    }
    if let Some(event) = card_change(ctx, msg).await {
        return Some(event);
    }
    for element in &msg.elements {
        match &element.payload {
            ElementPayload::SystemTip(tip) => {
                let found = match &tip.body {
                    SystemTipBody::Group(group_tip) => group_tip_notice(ctx, msg, group_tip).await,
                    SystemTipBody::Json(json_tip) if tip.sub_kind == SystemTipKind::JsonTip => {
                        json_tip_notice(ctx, msg, json_tip).await
                    }
                    SystemTipBody::Xml(xml_tip) => {
                        xml_tip_notice(ctx, msg, tip.sub_kind, xml_tip).await
                    }
                    _ => None,
                };
                if let Some(event) = found {
                    return Some(event);
                }
            }
            ElementPayload::File { media, business_id } => {
                return Some(NoticeEvent::GroupUpload(GroupUploadNotice::new(
                    ctx.self_id(),
                    parse_num(&msg.peer_uid),
                    parse_num(&msg.sender_uin),
                    UploadedFile {
                        id: media.file_uuid.clone(),
                        name: media.file_name.clone(),
                        size: parse_num(&media.file_size),
                        busid: i64::from(*business_id),
                    },
                )));
            }
            _ => {}
        }
    }
    None
}

/// Private-side notice derivation: pokes and new-friend confirmations.
pub async fn private_notice(ctx: &TranslateCtx, msg: &RawMessage) -> Option<NoticeEvent> {
    if msg.chat() != Some(ChatKind::Private) {
        return None;
    }
    for element in &msg.elements {
        if let ElementPayload::SystemTip(tip) = &element.payload {
            if tip.sub_kind != SystemTipKind::JsonTip {
                continue;
            }
            if let SystemTipBody::Json(json_tip) = &tip.body {
                if json_tip.business_id == BUSINESS_ID_POKE {
                    if let Some(event) = poke_notice(ctx, json_tip, None).await {
                        return Some(event);
                    }
                }
            }
        }
    }
    if msg.msg_type == MSG_TYPE_FRIEND_ADD && msg.sub_msg_type == SUB_MSG_TYPE_FRIEND_ADD {
        return Some(NoticeEvent::FriendAdd(FriendAddNotice::new(
            ctx.self_id(),
            parse_num(&msg.peer_uin),
        )));
    }
    None
}

/// Recall derivation. `short_id` is the id assigned at message-created
/// time; recalls of never-seen messages are dropped by the dispatcher
/// before this runs.
pub async fn recall_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    short_id: i32,
) -> Option<NoticeEvent> {
    let revoke = msg.elements.iter().find_map(|element| {
        if let ElementPayload::SystemTip(tip) = &element.payload {
            if tip.sub_kind == SystemTipKind::Revoke {
                if let SystemTipBody::Revoke(revoke) = &tip.body {
                    return Some(revoke);
                }
            }
        }
        None
    })?;
    match msg.chat() {
        Some(ChatKind::Group) => Some(NoticeEvent::GroupRecall(group_recall(
            ctx, msg, revoke, short_id,
        ).await)),
        _ => Some(NoticeEvent::FriendRecall(FriendRecallNotice::new(
            ctx.self_id(),
            parse_num(&msg.sender_uin),
            short_id,
        ))),
    }
}

async fn group_recall(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    revoke: &RevokeTip,
    short_id: i32,
) -> GroupRecallNotice {
    let operator = ctx
        .members
        .get(ctx.bridge.as_ref(), &msg.peer_uid, &revoke.operator_uid)
        .await
        .map(|member| member.uin.clone())
        .filter(|uin| !uin.is_empty())
        .unwrap_or_else(|| msg.sender_uin.clone());
    GroupRecallNotice::new(
        ctx.self_id(),
        parse_num(&msg.peer_uid),
        parse_num(&msg.sender_uin),
        parse_num(&operator),
        short_id,
    )
}

/// Converts one group-notify record into a decrease notice or an
/// approval request event.
pub async fn from_group_notify(ctx: &TranslateCtx, notify: &GroupNotify) -> Option<WireEvent> {
    let group_id = parse_num(&notify.group_code);
    let flag = format!(
        "{}|{}|{}",
        notify.group_code,
        notify.seq,
        notify.kind.as_code()
    );
    match notify.kind {
        GroupNotifyKind::MemberExit | GroupNotifyKind::KickMember => {
            let member_uin = ctx
                .resolver
                .resolve_public(&notify.user1.uid)
                .await
                .unwrap_or_default();
            let mut operator_uin = member_uin.clone();
            let mut sub_type = "leave";
            if !notify.user2.uid.is_empty() {
                // a second actor means the member was removed by them
                if let Some(kicker) = ctx.resolver.resolve_public(&notify.user2.uid).await {
                    operator_uin = kicker;
                }
                sub_type = "kick";
            }
            Some(WireEvent::Notice(NoticeEvent::GroupDecrease(
                GroupDecreaseNotice::new(
                    ctx.self_id(),
                    group_id,
                    parse_num(&member_uin),
                    parse_num(&operator_uin),
                    sub_type,
                ),
            )))
        }
        GroupNotifyKind::JoinRequest | GroupNotifyKind::JoinRequestByInvite => {
            let requester = ctx
                .resolver
                .resolve_public(&notify.user1.uid)
                .await
                .unwrap_or_default();
            let invitor_id = if notify.kind == GroupNotifyKind::JoinRequestByInvite {
                match ctx.resolver.resolve_public(&notify.user2.uid).await {
                    Some(invitor) => Some(parse_num(&invitor)),
                    None => {
                        warn!(uid = %notify.user2.uid, "inviter id resolution failed");
                        None
                    }
                }
            } else {
                None
            };
            Some(WireEvent::Request(RequestEvent::Group(
                GroupRequestEvent::new(
                    ctx.self_id(),
                    group_id,
                    parse_num(&requester),
                    "add",
                    Some(notify.postscript.clone()),
                    invitor_id,
                    &flag,
                ),
            )))
        }
        GroupNotifyKind::InviteMe => {
            let inviter = ctx
                .resolver
                .resolve_public(&notify.user2.uid)
                .await
                .unwrap_or_default();
            Some(WireEvent::Request(RequestEvent::Group(
                GroupRequestEvent::new(
                    ctx.self_id(),
                    group_id,
                    parse_num(&inviter),
                    "invite",
                    None,
                    None,
                    &flag,
                ),
            )))
        }
        _ => None,
    }
}

async fn card_change(ctx: &TranslateCtx, msg: &RawMessage) -> Option<NoticeEvent> {
    if msg.sender_uin.is_empty() {
        return None;
    }
    let member = ctx
        .members
        .get(ctx.bridge.as_ref(), &msg.peer_uid, &msg.sender_uin)
        .await?;
    if member.card_name == msg.sender_card {
        return None;
    }
    let event = GroupCardNotice::new(
        ctx.self_id(),
        parse_num(&msg.peer_uid),
        parse_num(&msg.sender_uin),
        &msg.sender_card,
        &member.card_name,
    );
    ctx.members
        .set_card(&msg.peer_uid, &member.uin, &msg.sender_card);
    Some(NoticeEvent::GroupCard(event))
}

async fn group_tip_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    tip: &GroupTip,
) -> Option<NoticeEvent> {
    let group = msg.peer_uid.as_str();
    let group_id = parse_num(group);
    match tip.kind {
        GroupTipKind::MemberIncrease => {
            let member_uin = match public_id_of(ctx, group, &tip.member_uid).await {
                Some(uin) => uin,
                None => {
                    warn!(uid = %tip.member_uid, "new member id resolution failed");
                    return None;
                }
            };
            let operator_uin = public_id_of(ctx, group, &tip.admin_uid)
                .await
                .unwrap_or_else(|| member_uin.clone());
            Some(NoticeEvent::GroupIncrease(GroupIncreaseNotice::new(
                ctx.self_id(),
                group_id,
                parse_num(&member_uin),
                parse_num(&operator_uin),
                "approve",
            )))
        }
        GroupTipKind::Ban => {
            let shut_up = tip.shut_up.as_ref()?;
            let mut duration = parse_num(&shut_up.duration);
            let sub_type = if duration > 0 { "ban" } else { "lift_ban" };
            let member_uin = if shut_up.member_uid.is_empty() {
                // no member denotes a group-wide mute; the duration the
                // kernel reports for it is meaningless, so it is
                // normalized to indefinite
                if duration > 0 {
                    duration = -1;
                }
                "0".to_string()
            } else {
                public_id_of(ctx, group, &shut_up.member_uid).await?
            };
            let admin_uin = public_id_of(ctx, group, &shut_up.admin_uid).await?;
            Some(NoticeEvent::GroupBan(GroupBanNotice::new(
                ctx.self_id(),
                group_id,
                parse_num(&member_uin),
                parse_num(&admin_uin),
                duration,
                sub_type,
            )))
        }
        GroupTipKind::SelfKicked => self_kicked_notice(ctx, msg, tip).await,
        _ => None,
    }
}

/// The bot itself was removed (or left). Attribution is best effort: a
/// hard lookup failure still reports the membership loss as a generic
/// leave with an unknown operator.
async fn self_kicked_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    tip: &GroupTip,
) -> Option<NoticeEvent> {
    let group_id = parse_num(&msg.peer_uid);
    let self_uin = parse_num(&ctx.self_info.uin);
    match ctx.bridge.group_member(&msg.peer_uid, &tip.admin_uid).await {
        Ok(member) => {
            let operator_uin = match member.filter(|record| !record.uin.is_empty()) {
                Some(record) => Some(record.uin.clone()),
                None => ctx.resolver.resolve_internal(&tip.admin_uid).await,
            };
            operator_uin.map(|operator| {
                NoticeEvent::GroupDecrease(GroupDecreaseNotice::new(
                    ctx.self_id(),
                    group_id,
                    self_uin,
                    parse_num(&operator),
                    "kick_me",
                ))
            })
        }
        Err(error) => {
            warn!(%error, group = %msg.peer_uid, "kick operator lookup failed");
            Some(NoticeEvent::GroupDecrease(GroupDecreaseNotice::new(
                ctx.self_id(),
                group_id,
                self_uin,
                0,
                "leave",
            )))
        }
    }
}

async fn json_tip_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    tip: &JsonTip,
) -> Option<NoticeEvent> {
    match tip.business_id {
        BUSINESS_ID_POKE => poke_notice(ctx, tip, Some(parse_num(&msg.peer_uid))).await,
        BUSINESS_ID_ESSENCE => essence_notice(ctx, msg, tip).await,
        BUSINESS_ID_TITLE => title_notice(ctx, msg, tip),
        _ => None,
    }
}

async fn poke_notice(
    ctx: &TranslateCtx,
    tip: &JsonTip,
    group_id: Option<i64>,
) -> Option<NoticeEvent> {
    let payload: Value = serde_json::from_str(&tip.payload).ok()?;
    let items = payload.get("items")?.as_array()?;
    let with_uid: Vec<&Value> = items
        .iter()
        .filter(|item| {
            item.get("uid")
                .and_then(Value::as_str)
                .is_some_and(|uid| !uid.is_empty())
        })
        .collect();
    if with_uid.len() != 2 {
        return None;
    }
    let actor_uid = with_uid[0].get("uid").and_then(Value::as_str)?;
    let target_uid = with_uid[1].get("uid").and_then(Value::as_str)?;
    let actor = ctx
        .resolver
        .resolve_public(actor_uid)
        .await
        .unwrap_or_default();
    let target = ctx
        .resolver
        .resolve_public(target_uid)
        .await
        .unwrap_or_default();
    Some(NoticeEvent::Poke(PokeNotice::new(
        ctx.self_id(),
        group_id,
        parse_num(&actor),
        parse_num(&target),
        Value::Array(items.clone()),
    )))
}

async fn essence_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    tip: &JsonTip,
) -> Option<NoticeEvent> {
    let payload: Value = serde_json::from_str(&tip.payload).ok()?;
    let jump = payload
        .get("items")?
        .get(0)?
        .get("jp")?
        .as_str()?;
    let msg_seq = query_param(jump, "msgSeq")?;
    let group_code = query_param(jump, "groupCode")?;
    let peer = Peer {
        chat: ChatKind::Group,
        peer_uid: group_code,
    };
    let marked = ctx
        .bridge
        .fetch_by_sequence(&peer, &msg_seq, 1)
        .await
        .ok()?
        .into_iter()
        .next()?;
    let short_id = ctx.ledger.short_id_of(&marked.msg_id)?;
    Some(NoticeEvent::Essence(EssenceNotice::new(
        ctx.self_id(),
        parse_num(&msg.peer_uid),
        short_id,
        parse_num(&marked.sender_uin),
    )))
}

/// Title grant. Also updates the cached member record's title — an
/// explicit, documented side effect of classifying this tip.
fn title_notice(ctx: &TranslateCtx, msg: &RawMessage, tip: &JsonTip) -> Option<NoticeEvent> {
    let payload: Value = serde_json::from_str(&tip.payload).ok()?;
    let items = payload.get("items")?.as_array()?;
    let member_uin = items.get(1)?.get("param")?.get(0)?.as_str()?;
    let title = items.get(3)?.get("txt")?.as_str()?;
    ctx.members.set_title(&msg.peer_uid, member_uin, title);
    Some(NoticeEvent::GroupTitle(GroupTitleNotice::new(
        ctx.self_id(),
        parse_num(&msg.peer_uid),
        parse_num(member_uin),
        title,
    )))
}

async fn xml_tip_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    sub_kind: SystemTipKind,
    tip: &XmlTip,
) -> Option<NoticeEvent> {
    if tip.template_id == TEMPLATE_EMOJI_REACTION {
        return emoji_reaction_notice(ctx, msg, tip).await;
    }
    if sub_kind == SystemTipKind::InviteMember && tip.template_id == TEMPLATE_INVITED_MEMBER {
        return invited_member_notice(ctx, msg, tip);
    }
    None
}

async fn emoji_reaction_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    tip: &XmlTip,
) -> Option<NoticeEvent> {
    let sender_uin = capture(reaction_sender_re(), &tip.content)?;
    let msg_seq = capture(reaction_seq_re(), &tip.content)?;
    let emoji_id = capture(reaction_face_re(), &tip.content)?;
    let peer = Peer {
        chat: ChatKind::Group,
        peer_uid: msg.peer_uid.clone(),
    };
    let target = match ctx.bridge.fetch_by_sequence(&peer, &msg_seq, 1).await {
        Ok(batch) => batch.into_iter().next()?,
        Err(error) => {
            debug!(%error, seq = %msg_seq, "reaction target fetch failed");
            return None;
        }
    };
    let short_id = ctx.ledger.short_id_of(&target.msg_id)?;
    Some(NoticeEvent::EmojiLike(EmojiLikeNotice::new(
        ctx.self_id(),
        parse_num(&msg.peer_uid),
        parse_num(&sender_uin),
        short_id,
        vec![EmojiLike {
            emoji_id,
            count: 1,
        }],
    )))
}

/// Invite-style member increase parsed from the XML template: the two
/// `jp="<digits>"` attributes are inviter then invitee.
fn invited_member_notice(
    ctx: &TranslateCtx,
    msg: &RawMessage,
    tip: &XmlTip,
) -> Option<NoticeEvent> {
    let ids: Vec<String> = jp_attr_re()
        .captures_iter(&tip.content)
        .filter_map(|captures| captures.get(1).map(|id| id.as_str().to_string()))
        .collect();
    if ids.len() != 2 {
        return None;
    }
    Some(NoticeEvent::GroupIncrease(GroupIncreaseNotice::new(
        ctx.self_id(),
        parse_num(&msg.peer_uid),
        parse_num(&ids[1]),
        parse_num(&ids[0]),
        "invite",
    )))
}

/// Member lookup first, profile fetch second; `None` when both fail.
async fn public_id_of(ctx: &TranslateCtx, group: &str, uid: &str) -> Option<String> {
    if uid.is_empty() {
        return None;
    }
    if let Some(member) = ctx.members.get(ctx.bridge.as_ref(), group, uid).await {
        if !member.uin.is_empty() {
            return Some(member.uin.clone());
        }
    }
    match ctx.bridge.fetch_profile_by_internal(uid).await {
        Ok(profile) if !profile.uin.is_empty() => Some(profile.uin),
        Ok(_) => None,
        Err(error) => {
            debug!(%error, uid, "profile fallback failed");
            None
        }
    }
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str().to_string())
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then(|| value.to_string())
    })
}

fn reaction_sender_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<qq[^>]*\bjp="(\d+)""#).expect("static regex"))
}

fn reaction_seq_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bmsgseq="(\d+)""#).expect("static regex"))
}

fn reaction_face_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<face[^>]*\bid="(\d+)""#).expect("static regex"))
}

fn jp_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bjp="(\d+)""#).expect("static regex"))
}
