pub mod client;

use std::future::Future;

use crate::audio::clip::EncodedClip;
use crate::error::Result;
use crate::kernel::event::{CallAck, ReplyRecord, SubscribeAck};
use crate::kernel::subscription::SubscriptionDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub enum CallRequest {
    Ring,
    RingWithVoice(EncodedClip),
}

/// The four server endpoints the client consumes.
pub trait ServerApi: Send + Sync + 'static {
    /// Any non-success status is a `Network` failure.
    fn post_call(&self, call: CallRequest) -> impl Future<Output = Result<CallAck>> + Send;

    fn subscribe(
        &self,
        subscription: &SubscriptionDescriptor,
    ) -> impl Future<Output = Result<SubscribeAck>> + Send;

    fn poll_reply(&self) -> impl Future<Output = Result<ReplyRecord>> + Send;

    /// Relays a reply choice as `{minutes: <label>}`.
    fn post_reply(&self, minutes: &str) -> impl Future<Output = Result<()>> + Send;
}
