//! GM-bound remote procedure calls.
//!
//! Clients that may not write a record (or may not run the GM's transitions)
//! forward their intent to the GM client over a [`RemoteChannel`].

mod call;
mod hub;

pub use call::{RemoteCall, RemoteReply};
pub use hub::{LocalRpcHub, RpcEnvelope, RpcInbox};

use async_trait::async_trait;

use crate::api::Result;

/// Transport towards the GM client.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    async fn call(&self, call: RemoteCall) -> Result<RemoteReply>;
}
