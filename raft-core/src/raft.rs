use std::fmt;

use serde::{Deserialize, Serialize};
use slog::Logger;
use uuid::Uuid;

use crate::candidate::Candidate;
use crate::follower::Follower;
use crate::leader::Leader;

/// An id that uniquely identifies a node within a cluster.
pub type NodeId = u32;

/// A monotonically non-decreasing logical epoch. Zero is the term a node is
/// born into before ever starting an election.
pub type Term = u64;

/// A one-based position in the replicated log. Zero is the sentinel "before
/// the first entry" (§3): it is always valid to ask for the entry at index
/// zero and receive `None`.
pub type LogIndex = u64;

/// Identifies a read request while it collects heartbeat acks (§4.4).
pub type ReadSerial = u64;

/// Identifies a client across requests.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        ClientId(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who the leader currently believed to be is, as far as a given node knows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderRef {
    Unknown,
    Known(NodeId),
}

/// Who issued a log entry: a leader-affirmation no-op, or a client write.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issuer {
    Leader,
    Client(ClientId),
}

/// The payload of a log entry: either a host command, or the no-value
/// marker a new leader appends at the start of its term (§4.3, §4.6
/// glossary "No-value entry").
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum EntryValue<C> {
    Command(C),
    NoOp,
}

/// An entry in the replicated log (§3).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Entry<C> {
    pub index: LogIndex,
    pub term: Term,
    pub issuer: Issuer,
    pub value: EntryValue<C>,
}

/// Static, per-node configuration that does not change across the node's
/// lifetime plus any log/RSM lookups a particular event needs, pre-loaded so
/// the transition function itself stays pure (§4.7, §9).
#[derive(Debug, Clone)]
pub struct TransitionEnv<C, S> {
    /// The entry at the index the follower needs to validate an incoming
    /// `AppendEntries` against (`prevLogIndex`), if one exists.
    pub entry_at_prev_index: Option<Entry<C>>,
    /// The last entry currently in the log, used to compute
    /// `lastLogIndex`/`lastLogTerm` for `RequestVote` and for deriving
    /// `prevLogIndex`/`prevLogTerm` when a leader proposes a new entry.
    pub last_log_entry: Option<Entry<C>>,
    /// For each incoming `AppendEntries` entry, whether the follower's log
    /// already has a differing entry at that index (used to compute the
    /// truncation point, §4.2).
    pub conflicting_index: Option<LogIndex>,
    /// The applied RSM snapshot as of the moment this event is processed;
    /// served back to the client once a linearizable read's quorum closes.
    pub rsm_snapshot: S,
    /// Pre-loaded catch-up entries for the single peer a failed
    /// `AppendEntriesResponse` is about to be retried against, starting at
    /// the backtracked `nextIndex` through the leader's last log index
    /// (§4.4 fast-backtrack retry). Empty when the event isn't a leader
    /// processing a rejection.
    pub retry_entries: Vec<Entry<C>>,
    /// The (index, term) of the entry immediately preceding
    /// `retry_entries`, i.e. the new `prevLogIndex`/`prevLogTerm` for that
    /// retry.
    pub retry_prev: Option<(LogIndex, Term)>,
}

/// Persistent state common to all roles (§3). The log itself is not held
/// here: it is an abstract collaborator the engine only ever touches through
/// `AppendLogEntries` actions and the read-only snapshots in
/// [`TransitionEnv`] (§3 Ownership, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentState {
    pub current_term: Term,
    pub voted_for: Option<NodeId>,
}

impl Default for PersistentState {
    fn default() -> Self {
        PersistentState {
            current_term: 0,
            voted_for: None,
        }
    }
}

/// Shared behavior every role implements.
pub trait Role {
    /// Advance the term, clearing any role-specific election bookkeeping
    /// (§3: "advancing the term clears votedFor").
    fn term(&mut self, term: Term);
    fn role(&self) -> RaftRole;
    fn log(&self) -> &Logger;
}

pub enum RaftRole {
    Follower,
    Candidate,
    Leader,
}

impl fmt::Display for RaftRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaftRole::Follower => write!(f, "follower"),
            RaftRole::Candidate => write!(f, "candidate"),
            RaftRole::Leader => write!(f, "leader"),
        }
    }
}

/// The primary struct representing the state machine for a single role.
/// Contains fields common to every role; role-specific fields (match/next
/// indices, vote tally, pending client bookkeeping) live on `T`.
pub struct Raft<T: Role, C> {
    pub id: NodeId,
    pub logger: Logger,
    pub config: crate::config::RaftConfig,
    pub persistent: PersistentState,
    pub role: T,
    pub(crate) _command: std::marker::PhantomData<C>,
}

impl<T: Role, C> Raft<T, C> {
    /// Set the current term, clearing `votedFor` (§3, §4.1).
    pub fn term(&mut self, term: Term) {
        self.persistent.voted_for = None;
        self.persistent.current_term = term;
        self.role.term(term);
    }

    pub fn quorum_size(&self) -> usize {
        self.config.peers.len() / 2 + 1
    }
}

/// Since a transition can move the node to any other role, the result needs
/// to be general over the possible return types. We store the differently
/// sized per-role structs in an enum sized to the largest variant (mirrors
/// the teacher's own `RaftHandle`).
pub enum RaftHandle<C> {
    Follower(Raft<Follower, C>),
    Candidate(Raft<Candidate, C>),
    Leader(Raft<Leader<C>, C>),
}

impl<C> RaftHandle<C> {
    /// A fresh node starts as a Follower at term 0 with no known leader
    /// (§4.6 "Initial state").
    pub fn new(
        id: NodeId,
        config: crate::config::RaftConfig,
        logger: Logger,
    ) -> RaftHandle<C> {
        let role = Follower {
            current_leader: LeaderRef::Unknown,
            commit_index: 0,
            last_applied: 0,
            logger: logger.new(o!("role" => "follower")),
        };
        RaftHandle::Follower(Raft {
            id,
            logger,
            config,
            persistent: PersistentState::default(),
            role,
            _command: std::marker::PhantomData,
        })
    }

    pub fn id(&self) -> NodeId {
        match self {
            RaftHandle::Follower(r) => r.id,
            RaftHandle::Candidate(r) => r.id,
            RaftHandle::Leader(r) => r.id,
        }
    }

    pub fn current_term(&self) -> Term {
        match self {
            RaftHandle::Follower(r) => r.persistent.current_term,
            RaftHandle::Candidate(r) => r.persistent.current_term,
            RaftHandle::Leader(r) => r.persistent.current_term,
        }
    }

    pub fn commit_index(&self) -> LogIndex {
        match self {
            RaftHandle::Follower(r) => r.role.commit_index,
            RaftHandle::Candidate(r) => r.role.commit_index,
            RaftHandle::Leader(r) => r.role.commit_index,
        }
    }

    pub fn last_applied(&self) -> LogIndex {
        match self {
            RaftHandle::Follower(r) => r.role.last_applied,
            RaftHandle::Candidate(r) => r.role.last_applied,
            RaftHandle::Leader(r) => r.role.last_applied,
        }
    }

    pub fn role(&self) -> RaftRole {
        match self {
            RaftHandle::Follower(r) => r.role.role(),
            RaftHandle::Candidate(r) => r.role.role(),
            RaftHandle::Leader(r) => r.role.role(),
        }
    }
}
