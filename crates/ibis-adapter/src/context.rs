//! Shared translation context.
//!
//! The process-wide caches live on the dispatcher and are passed here
//! by reference to the decoder and classifier instead of through
//! ambient global state.

use std::sync::Arc;

use ibis_core::parse_num;
use ibis_kernel::{KernelBridge, SelfIdentity};
use ibis_resolver::IdentityResolver;

use crate::ledger::SequenceLedger;
use crate::members::MemberCache;

#[derive(Clone)]
pub struct TranslateCtx {
    pub bridge: Arc<dyn KernelBridge>,
    pub resolver: Arc<IdentityResolver>,
    pub ledger: Arc<SequenceLedger>,
    pub members: Arc<MemberCache>,
    pub self_info: SelfIdentity,
}

impl TranslateCtx {
    pub fn new(bridge: Arc<dyn KernelBridge>, self_info: SelfIdentity) -> Self {
        Self {
            resolver: Arc::new(IdentityResolver::new(bridge.clone())),
            ledger: Arc::new(SequenceLedger::new()),
            members: Arc::new(MemberCache::new()),
            bridge,
            self_info,
        }
    }

    pub fn self_id(&self) -> i64 {
        parse_num(&self.self_info.uin)
    }
}
