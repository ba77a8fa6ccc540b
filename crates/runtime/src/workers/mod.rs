//! Background tasks spawned per client.
//!
//! The sync worker turns store change notifications into local step
//! requests and runs abandonment cleanup; the RPC worker (GM only) answers
//! calls forwarded by players.

mod rpc;
mod sync;

pub(crate) use rpc::RpcWorker;
pub(crate) use sync::SyncWorker;
