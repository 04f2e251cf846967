use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::raft::{ClientId, LeaderRef, LogIndex, NodeId, ReadSerial};

/// The body of a request a client sends to what it believes is the leader
/// (§3, §6).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ClientRequestBody<C> {
    Read,
    Write(C),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientRequest<C> {
    pub client_id: ClientId,
    pub body: ClientRequestBody<C>,
}

/// The reply a client eventually receives (§3, §6).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ClientResponse<S> {
    Read(S),
    Write(LogIndex),
    Redirect(LeaderRef),
}

/// Leader-side bookkeeping for a write awaiting commit (§4.4, §9).
#[derive(Debug, Clone, Copy)]
pub struct PendingWrite {
    pub client_id: ClientId,
}

/// Leader-side bookkeeping for a linearizable read awaiting a
/// heartbeat-quorum (§4.4, §9).
#[derive(Debug, Clone)]
pub struct PendingRead {
    pub client_id: ClientId,
    pub acked_by: HashSet<NodeId>,
}

impl PendingRead {
    pub fn new(self_id: NodeId, client_id: ClientId) -> Self {
        let mut acked_by = HashSet::new();
        acked_by.insert(self_id);
        PendingRead {
            client_id,
            acked_by,
        }
    }

    pub fn ack(&mut self, node: NodeId) {
        self.acked_by.insert(node);
    }

    pub fn has_quorum(&self, quorum_size: usize) -> bool {
        self.acked_by.len() >= quorum_size
    }
}
