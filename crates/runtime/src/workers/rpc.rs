use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::Result;
use crate::bridge::Commit;
use crate::engine::Engine;
use crate::rpc::{RemoteCall, RemoteReply, RpcEnvelope, RpcInbox};

/// Answers calls forwarded by player clients. Runs on the GM client only.
pub(crate) struct RpcWorker {
    engine: Arc<Engine>,
    inbox: RpcInbox,
}

impl RpcWorker {
    pub fn new(engine: Arc<Engine>, inbox: RpcInbox) -> Self {
        Self { engine, inbox }
    }

    pub async fn run(mut self) {
        debug!(target: "activation::rpc", "rpc worker started");
        while let Some(envelope) = self.inbox.recv().await {
            // Calls may wait on each other (a step can forward more work), so
            // each one gets its own task.
            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move { serve(&engine, envelope).await });
        }
        info!(target: "activation::rpc", "rpc inbox closed, stopping");
    }
}

async fn serve(engine: &Engine, envelope: RpcEnvelope) {
    let RpcEnvelope { call, reply } = envelope;
    let name = call.name();
    let record = call.record().clone();
    debug!(
        target: "activation::rpc",
        call = name,
        record = %record,
        requested_by = %call.requested_by(),
        "serving remote call"
    );

    let answer = match dispatch(engine, call).await {
        Ok(answer) => answer,
        Err(err) => {
            warn!(
                target: "activation::rpc",
                call = name,
                record = %record,
                error = %err,
                "remote call failed"
            );
            RemoteReply::Failed {
                reason: err.to_string(),
            }
        }
    };

    if reply.send(answer).is_err() {
        debug!(target: "activation::rpc", call = name, record = %record, "caller went away");
    }
}

async fn dispatch(engine: &Engine, call: RemoteCall) -> Result<RemoteReply> {
    match call {
        RemoteCall::Mutate {
            record,
            precondition,
            mutations,
            ..
        } => {
            let commit = engine.bridge.mutate(&record, precondition, mutations).await?;
            Ok(match commit {
                Commit::Applied { revision, .. } => RemoteReply::Committed { revision },
                Commit::Unchanged { .. } => RemoteReply::Unchanged,
                Commit::Stale => RemoteReply::Stale,
                Commit::Missing => RemoteReply::Missing,
            })
        }
        RemoteCall::RequestStep { record, .. } => {
            engine.step(&record).await?;
            Ok(RemoteReply::Stepped)
        }
        RemoteCall::Delete { record, .. } => Ok(if engine.bridge.delete(&record).await? {
            RemoteReply::Deleted
        } else {
            RemoteReply::Missing
        }),
    }
}
