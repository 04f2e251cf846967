use crate::client::ClientResponse;
use crate::raft::{ClientId, Entry, NodeId};
use crate::rpc::{Rpc, TimeoutKind};

/// The output alphabet of the transition engine (§2, §6). The engine never
/// performs these itself -- it hands them back to the driver, which executes
/// them and feeds the results back in as new events.
pub enum Action<C, S> {
    /// Send an RPC to a single peer.
    SendRpc { to: NodeId, rpc: Rpc<C> },
    /// Send the same RPC to every peer.
    BroadcastRpc { rpc: Rpc<C> },
    /// Reply to a client request.
    RespondToClient {
        client_id: ClientId,
        response: ClientResponse<S>,
    },
    /// Restart the named timer; for `Election` the driver must sample a
    /// fresh value from the configured range (§5, §9).
    ResetTimeoutTimer(TimeoutKind),
    /// Durably append these entries to the log before any action depending
    /// on them becomes externally visible (§5 "driver obligation"). May
    /// implicitly subsume a truncation when the entries conflict with what
    /// is already on disk (§4.2, §6).
    AppendLogEntries(Vec<Entry<C>>),
}

/// Severity for a structured log message returned alongside a transition's
/// actions (§4.1, §9 observability note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogMsg {
    pub level: Level,
    pub message: String,
}

impl LogMsg {
    pub fn info(message: impl Into<String>) -> Self {
        LogMsg {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        LogMsg {
            level: Level::Debug,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        LogMsg {
            level: Level::Error,
            message: message.into(),
        }
    }
}
