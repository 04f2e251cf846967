use std::collections::HashMap;

use crate::raft::{LogIndex, NodeId};

/// Per-peer replication progress a leader tracks (§3 LeaderState).
/// Generalizes the teacher's own `crate::progress::ReplicationProgress`
/// referenced from `candidate.rs`'s `Raft<Candidate> -> Raft<Leader>`
/// conversion.
#[derive(Debug, Clone)]
pub struct ReplicationProgress {
    next_index: HashMap<NodeId, LogIndex>,
    match_index: HashMap<NodeId, LogIndex>,
}

impl ReplicationProgress {
    /// `nodes` should include every peer except self; `last_log_index` is
    /// the leader's own last log index at the moment it assumes leadership
    /// (§4.3: "initialize nextIndex[p] := lastLogIndex + 1").
    pub fn new(peers: &[NodeId], last_log_index: LogIndex) -> Self {
        let mut next_index = HashMap::new();
        let mut match_index = HashMap::new();
        for &peer in peers {
            next_index.insert(peer, last_log_index + 1);
            match_index.insert(peer, 0);
        }
        ReplicationProgress {
            next_index,
            match_index,
        }
    }

    pub fn next_index(&self, peer: NodeId) -> LogIndex {
        *self.next_index.get(&peer).unwrap_or(&1)
    }

    pub fn match_index(&self, peer: NodeId) -> LogIndex {
        *self.match_index.get(&peer).unwrap_or(&0)
    }

    pub fn peers(&self) -> impl Iterator<Item = &NodeId> {
        self.next_index.keys()
    }

    /// Record a successful append: `matchIndex[p] = matchIdx`,
    /// `nextIndex[p] = matchIdx + 1` (§4.4).
    pub fn record_success(&mut self, peer: NodeId, match_index: LogIndex) {
        self.match_index.insert(peer, match_index);
        self.next_index.insert(peer, match_index + 1);
    }

    /// Record a rejected append, jumping `nextIndex` to the responder's
    /// reported last index when available, otherwise decrementing by one
    /// (§4.4, §9 "fast-backtrack granularity").
    pub fn record_failure(&mut self, peer: NodeId, responder_last_index: Option<LogIndex>) {
        let current = self.next_index(peer);
        let next = match responder_last_index {
            Some(idx) => idx + 1,
            None => current.saturating_sub(1).max(1),
        };
        self.next_index.insert(peer, next.max(1));
    }

    /// The largest `N` such that a majority of `match_index` values
    /// (including the leader's own `self_match_index`, always equal to its
    /// last log index) are `>= N` (§4.4 commit advancement rule, half of
    /// the computation -- the caller still filters by `log[N].term ==
    /// currentTerm`).
    pub fn majority_match_index(&self, quorum_size: usize, self_match_index: LogIndex) -> LogIndex {
        let mut indices: Vec<LogIndex> = self.match_index.values().copied().collect();
        indices.push(self_match_index);
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.get(quorum_size - 1).copied().unwrap_or(0)
    }
}
