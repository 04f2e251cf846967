use std::collections::HashMap;

use slog::Logger;

use crate::action::{Action, LogMsg};
use crate::client::{ClientRequestBody, ClientResponse, PendingRead, PendingWrite};
use crate::follower::Follower;
use crate::progress::ReplicationProgress;
use crate::raft::{
    ClientId, Entry, EntryValue, Issuer, LeaderRef, LogIndex, Raft, RaftHandle, RaftRole,
    ReadSerial, Role, Term, TransitionEnv,
};
use crate::rpc::{AppendEntries, Event, Rpc, TimeoutKind};

/// Volatile state specific to the Leader role (§3 LeaderState).
pub struct Leader<C> {
    pub progress: ReplicationProgress,
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    pub pending_writes: HashMap<LogIndex, PendingWrite>,
    pub pending_reads: HashMap<ReadSerial, PendingRead>,
    pub next_read_serial: ReadSerial,
    /// Cached so the engine can compute `prevLogIndex`/`prevLogTerm` for a
    /// freshly proposed entry without a log read (§3 LeaderState
    /// "lastLogEntry cache").
    pub last_log_entry: Option<Entry<C>>,
    pub logger: Logger,
}

impl<C> Role for Leader<C> {
    fn term(&mut self, _term: Term) {
        // A leader only ever advances its own term by discovering a higher
        // one, at which point it steps down entirely (handled by the
        // From<Raft<Leader<C>, C>> for Raft<Follower, C> conversion).
    }

    fn role(&self) -> RaftRole {
        RaftRole::Leader
    }

    fn log(&self) -> &Logger {
        &self.logger
    }
}

impl<C: Clone> Raft<Leader<C>, C> {
    /// §4.4 in full: heartbeat timeout, client writes and reads, and
    /// `AppendEntriesResponse` handling including the commit advancement
    /// rule and linearizable read quorum tallying.
    pub fn handle_event<S: Clone>(
        mut self,
        env: &TransitionEnv<C, S>,
        event: Event<C>,
    ) -> (RaftHandle<C>, Vec<Action<C, S>>, Vec<LogMsg>) {
        let mut actions = Vec::new();
        let mut logs = Vec::new();

        match event {
            Event::Timeout(TimeoutKind::Heartbeat) => {
                actions.push(self.heartbeat(env));
                actions.push(Action::ResetTimeoutTimer(TimeoutKind::Heartbeat));
                (RaftHandle::Leader(self), actions, logs)
            }
            Event::Timeout(TimeoutKind::Election) => (RaftHandle::Leader(self), actions, logs),
            Event::ClientRequest(req) => match req.body {
                ClientRequestBody::Write(cmd) => {
                    let (entry, mut write_actions) = self.propose_write(env, req.client_id, cmd);
                    actions.append(&mut write_actions);
                    logs.push(LogMsg::info(format!(
                        "proposing write at index {}",
                        entry.index
                    )));
                    (RaftHandle::Leader(self), actions, logs)
                }
                ClientRequestBody::Read => {
                    let serial = self.role.next_read_serial;
                    self.role.next_read_serial += 1;
                    self.role
                        .pending_reads
                        .insert(serial, PendingRead::new(self.id, req.client_id));

                    if self.role.progress.peers().count() == 0 {
                        // Single-node cluster: we are already the only
                        // member of our own quorum.
                        let pending = self.role.pending_reads.remove(&serial).unwrap();
                        actions.push(Action::RespondToClient {
                            client_id: pending.client_id,
                            response: ClientResponse::Read(env.rsm_snapshot.clone()),
                        });
                        return (RaftHandle::Leader(self), actions, logs);
                    }

                    actions.push(self.heartbeat_with_read(env, serial));
                    (RaftHandle::Leader(self), actions, logs)
                }
            },
            Event::Message { from, rpc } => match rpc {
                Rpc::AppendEntriesResponse(resp) => {
                    if !resp.success {
                        self.role
                            .progress
                            .record_failure(from, Some(resp.match_index));
                        actions.push(Action::SendRpc {
                            to: from,
                            rpc: Rpc::AppendEntries(AppendEntries {
                                term: self.persistent.current_term,
                                leader_id: self.id,
                                prev_log_index: env
                                    .retry_prev
                                    .map(|(idx, _)| idx)
                                    .unwrap_or(0),
                                prev_log_term: env
                                    .retry_prev
                                    .map(|(_, term)| term)
                                    .unwrap_or(0),
                                entries: env.retry_entries.clone(),
                                leader_commit: self.role.commit_index,
                                read_request: None,
                            }),
                        });
                        return (RaftHandle::Leader(self), actions, logs);
                    }

                    self.role.progress.record_success(from, resp.match_index);

                    let mut respond_actions = self.advance_commit_index(env);
                    actions.append(&mut respond_actions);

                    if let Some(serial) = resp.read_request {
                        if let Some(pending) = self.role.pending_reads.get_mut(&serial) {
                            pending.ack(from);
                            if pending.has_quorum(self.quorum_size()) {
                                let pending = self.role.pending_reads.remove(&serial).unwrap();
                                actions.push(Action::RespondToClient {
                                    client_id: pending.client_id,
                                    response: ClientResponse::Read(env.rsm_snapshot.clone()),
                                });
                            }
                        }
                    }

                    (RaftHandle::Leader(self), actions, logs)
                }
                Rpc::RequestVote(req) => {
                    actions.push(Action::SendRpc {
                        to: from,
                        rpc: Rpc::RequestVoteResponse(crate::rpc::RequestVoteResponse {
                            term: self.persistent.current_term,
                            vote_granted: false,
                        }),
                    });
                    let _ = req;
                    (RaftHandle::Leader(self), actions, logs)
                }
                Rpc::AppendEntries(req) => {
                    // Only possible if req.term < current_term (a stale
                    // leader); the universal higher-term rule would already
                    // have stepped us down otherwise.
                    let _ = req;
                    (RaftHandle::Leader(self), actions, logs)
                }
                Rpc::RequestVoteResponse(_) => (RaftHandle::Leader(self), actions, logs),
            },
        }
    }

    fn heartbeat<S>(&self, env: &TransitionEnv<C, S>) -> Action<C, S> {
        let (prev_index, prev_term) = env
            .last_log_entry
            .as_ref()
            .map(|e| (e.index, e.term))
            .unwrap_or((0, 0));
        Action::BroadcastRpc {
            rpc: Rpc::AppendEntries(AppendEntries {
                term: self.persistent.current_term,
                leader_id: self.id,
                prev_log_index: prev_index,
                prev_log_term: prev_term,
                entries: vec![],
                leader_commit: self.role.commit_index,
                read_request: None,
            }),
        }
    }

    fn heartbeat_with_read<S>(&self, env: &TransitionEnv<C, S>, serial: ReadSerial) -> Action<C, S> {
        let (prev_index, prev_term) = env
            .last_log_entry
            .as_ref()
            .map(|e| (e.index, e.term))
            .unwrap_or((0, 0));
        Action::BroadcastRpc {
            rpc: Rpc::AppendEntries(AppendEntries {
                term: self.persistent.current_term,
                leader_id: self.id,
                prev_log_index: prev_index,
                prev_log_term: prev_term,
                entries: vec![],
                leader_commit: self.role.commit_index,
                read_request: Some(serial),
            }),
        }
    }

    /// §4.4 "On ClientRequest(Write(cmd))".
    fn propose_write<S>(
        &mut self,
        env: &TransitionEnv<C, S>,
        client_id: ClientId,
        cmd: C,
    ) -> (Entry<C>, Vec<Action<C, S>>) {
        let (prev_index, prev_term) = env
            .last_log_entry
            .as_ref()
            .map(|e| (e.index, e.term))
            .unwrap_or((0, 0));
        let entry = Entry {
            index: prev_index + 1,
            term: self.persistent.current_term,
            issuer: Issuer::Client(client_id),
            value: EntryValue::Command(cmd),
        };
        self.role
            .pending_writes
            .insert(entry.index, PendingWrite { client_id });
        self.role.last_log_entry = Some(entry.clone());

        let mut actions = vec![
            Action::AppendLogEntries(vec![entry.clone()]),
            Action::BroadcastRpc {
                rpc: Rpc::AppendEntries(AppendEntries {
                    term: self.persistent.current_term,
                    leader_id: self.id,
                    prev_log_index: prev_index,
                    prev_log_term: prev_term,
                    entries: vec![entry.clone()],
                    leader_commit: self.role.commit_index,
                    read_request: None,
                }),
            },
        ];

        // Single-node cluster: our own append already constitutes a
        // majority (§8 boundary case) -- commit and respond right away.
        if self.role.progress.peers().count() == 0 {
            self.role.commit_index = entry.index;
            if let Some(pending) = self.role.pending_writes.remove(&entry.index) {
                actions.push(Action::RespondToClient {
                    client_id: pending.client_id,
                    response: ClientResponse::Write(entry.index),
                });
            }
        }

        (entry, actions)
    }

    /// §4.4 "Commit advancement rule": find the largest `N > commitIndex`
    /// with a majority `matchIndex >= N` whose entry is from the current
    /// term, then respond to any pending writes that just committed.
    fn advance_commit_index<S: Clone>(&mut self, env: &TransitionEnv<C, S>) -> Vec<Action<C, S>> {
        let self_match_index = self
            .role
            .last_log_entry
            .as_ref()
            .map(|e| e.index)
            .unwrap_or(0);
        let candidate_n = self
            .role
            .progress
            .majority_match_index(self.quorum_size(), self_match_index);

        let current_term_at_candidate = env
            .last_log_entry
            .as_ref()
            .filter(|e| e.index == candidate_n)
            .map(|e| e.term == self.persistent.current_term)
            .unwrap_or(candidate_n == 0);

        if candidate_n > self.role.commit_index && current_term_at_candidate {
            let previous = self.role.commit_index;
            self.role.commit_index = candidate_n;

            let mut actions = Vec::new();
            let committed: Vec<LogIndex> = self
                .role
                .pending_writes
                .keys()
                .copied()
                .filter(|idx| *idx > previous && *idx <= candidate_n)
                .collect();
            for idx in committed {
                if let Some(pending) = self.role.pending_writes.remove(&idx) {
                    actions.push(Action::RespondToClient {
                        client_id: pending.client_id,
                        response: ClientResponse::Write(idx),
                    });
                }
            }
            actions
        } else {
            Vec::new()
        }
    }
}

impl<C> From<Raft<Leader<C>, C>> for Raft<Follower, C> {
    fn from(val: Raft<Leader<C>, C>) -> Raft<Follower, C> {
        Raft {
            id: val.id,
            logger: val.logger.clone(),
            config: val.config,
            persistent: val.persistent,
            role: Follower {
                current_leader: LeaderRef::Unknown,
                commit_index: val.role.commit_index,
                last_applied: val.role.last_applied,
                logger: val.logger.new(o!("role" => "follower")),
            },
            _command: std::marker::PhantomData,
        }
    }
}
