use serde::{Deserialize, Serialize};

use crate::raft::{Entry, LogIndex, NodeId, ReadSerial, Term};

/// Leader → follower: replicate entries (possibly empty, i.e. a heartbeat)
/// and advance the follower's commit index (§4.2, §4.4, §6).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppendEntries<C> {
    pub term: Term,
    pub leader_id: NodeId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<Entry<C>>,
    pub leader_commit: LogIndex,
    /// Echoed back by the follower so the leader can tally a linearizable
    /// read's heartbeat-quorum (§4.4).
    pub read_request: Option<ReadSerial>,
}

impl<C> AppendEntries<C> {
    pub fn is_heartbeat(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Follower → leader: whether the append succeeded, plus enough information
/// for the leader to fast-backtrack on rejection (§4.2, §4.4).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppendEntriesResponse {
    pub term: Term,
    pub success: bool,
    /// On success: the index of the last new entry now present.
    /// On rejection: the responder's own last log index, to let the leader
    /// jump `nextIndex` directly instead of decrementing one at a time.
    pub match_index: LogIndex,
    pub read_request: Option<ReadSerial>,
}

/// Candidate → peer: request a vote for the current election (§4.2, §6).
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct RequestVote {
    pub term: Term,
    pub candidate_id: NodeId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

/// Peer → candidate: the vote decision.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct RequestVoteResponse {
    pub term: Term,
    pub vote_granted: bool,
}

/// The wire message envelope exchanged between nodes (§6).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Rpc<C> {
    AppendEntries(AppendEntries<C>),
    AppendEntriesResponse(AppendEntriesResponse),
    RequestVote(RequestVote),
    RequestVoteResponse(RequestVoteResponse),
}

impl<C> Rpc<C> {
    pub fn term(&self) -> Term {
        match self {
            Rpc::AppendEntries(r) => r.term,
            Rpc::AppendEntriesResponse(r) => r.term,
            Rpc::RequestVote(r) => r.term,
            Rpc::RequestVoteResponse(r) => r.term,
        }
    }
}

/// The kind of timer a `ResetTimeoutTimer` action refers to (§4, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Election,
    Heartbeat,
}

/// Events fed into the transition engine (§4.1).
pub enum Event<C> {
    Timeout(TimeoutKind),
    Message {
        from: NodeId,
        rpc: Rpc<C>,
    },
    ClientRequest(crate::client::ClientRequest<C>),
}
