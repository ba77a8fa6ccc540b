//! In-process RPC transport towards the GM client.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{RemoteCall, RemoteChannel, RemoteReply};
use crate::api::{Result, RuntimeError};

/// One call waiting for the GM's answer.
pub struct RpcEnvelope {
    pub call: RemoteCall,
    pub reply: oneshot::Sender<RemoteReply>,
}

/// Sending side, cloned into every player client.
#[derive(Clone)]
pub struct LocalRpcHub {
    tx: mpsc::Sender<RpcEnvelope>,
}

/// Receiving side, drained by the GM client's RPC worker.
pub struct RpcInbox {
    rx: mpsc::Receiver<RpcEnvelope>,
}

impl LocalRpcHub {
    /// Creates a connected hub/inbox pair.
    pub fn channel(buffer: usize) -> (LocalRpcHub, RpcInbox) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (LocalRpcHub { tx }, RpcInbox { rx })
    }
}

impl RpcInbox {
    pub async fn recv(&mut self) -> Option<RpcEnvelope> {
        self.rx.recv().await
    }
}

#[async_trait]
impl RemoteChannel for LocalRpcHub {
    async fn call(&self, call: RemoteCall) -> Result<RemoteReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RpcEnvelope {
                call,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::RpcChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }
}
