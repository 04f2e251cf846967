use slog::Logger;

use crate::action::{Action, LogMsg};
use crate::client::{ClientRequestBody, ClientResponse};
use crate::election::{Election, ElectionStatus};
use crate::follower::Follower;
use crate::leader::Leader;
use crate::progress::ReplicationProgress;
use crate::raft::{
    EntryValue, Issuer, LeaderRef, LogIndex, Raft, RaftHandle, RaftRole, Role, Term, TransitionEnv,
};
use crate::rpc::{AppendEntries, Event, RequestVoteResponse, Rpc, TimeoutKind};

/// Volatile state specific to the Candidate role (§3 CandidateState).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub election: Election,
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    pub logger: Logger,
}

impl Role for Candidate {
    fn term(&mut self, _term: Term) {
        self.election.reset();
    }

    fn role(&self) -> RaftRole {
        RaftRole::Candidate
    }

    fn log(&self) -> &Logger {
        &self.logger
    }
}

impl<C: Clone> Raft<Candidate, C> {
    /// §4.3 in full: vote responses, rejecting vote requests while we have
    /// our own in flight, stepping down on a valid AppendEntries, election
    /// timeout retry, and the client-request redirect (no leader known).
    pub fn handle_event<S>(
        mut self,
        env: &TransitionEnv<C, S>,
        event: Event<C>,
    ) -> (RaftHandle<C>, Vec<Action<C, S>>, Vec<LogMsg>) {
        let mut actions = Vec::new();
        let mut logs = Vec::new();

        match event {
            Event::Timeout(TimeoutKind::Election) => {
                let (candidate, mut cand_actions) = self.retry_election(env);
                actions.append(&mut cand_actions);
                (RaftHandle::Candidate(candidate), actions, logs)
            }
            Event::Timeout(TimeoutKind::Heartbeat) => (RaftHandle::Candidate(self), actions, logs),
            Event::Message { from, rpc } => match rpc {
                Rpc::RequestVote(req) => {
                    // We're also seeking votes this term; reject rivals.
                    actions.push(Action::SendRpc {
                        to: from,
                        rpc: Rpc::RequestVoteResponse(RequestVoteResponse {
                            term: self.persistent.current_term,
                            vote_granted: false,
                        }),
                    });
                    let _ = req;
                    (RaftHandle::Candidate(self), actions, logs)
                }
                Rpc::RequestVoteResponse(resp) => {
                    if resp.term != self.persistent.current_term {
                        return (RaftHandle::Candidate(self), actions, logs);
                    }
                    self.role.election.vote(from, resp.vote_granted);
                    logs.push(LogMsg::info(format!(
                        "received vote from {}: granted={}",
                        from, resp.vote_granted
                    )));
                    match self.role.election.election_status() {
                        ElectionStatus::Elected => {
                            logs.push(LogMsg::info("elected leader"));
                            let (leader, mut leader_actions) = self.become_leader(env);
                            actions.append(&mut leader_actions);
                            (RaftHandle::Leader(leader), actions, logs)
                        }
                        ElectionStatus::Voting => (RaftHandle::Candidate(self), actions, logs),
                        ElectionStatus::Defeated => {
                            logs.push(LogMsg::info("defeated in election"));
                            self.persistent.voted_for = None;
                            (RaftHandle::Follower(Raft::from(self)), actions, logs)
                        }
                    }
                }
                Rpc::AppendEntries(req) => {
                    // A legitimate leader for this term or later: step down
                    // and re-dispatch as a follower (§4.3).
                    if req.term >= self.persistent.current_term {
                        let follower: Raft<Follower, C> = Raft::from(self);
                        let (handle, mut f_actions, mut f_logs) = follower.handle_event(
                            env,
                            Event::Message {
                                from,
                                rpc: Rpc::AppendEntries(req),
                            },
                        );
                        actions.append(&mut f_actions);
                        logs.append(&mut f_logs);
                        (handle, actions, logs)
                    } else {
                        (RaftHandle::Candidate(self), actions, logs)
                    }
                }
                Rpc::AppendEntriesResponse(_) => (RaftHandle::Candidate(self), actions, logs),
            },
            Event::ClientRequest(req) => {
                actions.push(Action::RespondToClient {
                    client_id: req.client_id,
                    response: ClientResponse::Redirect(LeaderRef::Unknown),
                });
                let _ = req.body;
                (RaftHandle::Candidate(self), actions, logs)
            }
        }
    }

    /// §4.3 "On ElectionTimeout": a new term, re-vote for self, broadcast a
    /// fresh `RequestVote`.
    fn retry_election<S>(self, env: &TransitionEnv<C, S>) -> (Raft<Candidate, C>, Vec<Action<C, S>>) {
        let follower: Raft<Follower, C> = Raft::from(self);
        let (handle, actions, _) = follower.handle_event(env, Event::Timeout(TimeoutKind::Election));
        match handle {
            RaftHandle::Candidate(candidate) => (candidate, actions),
            _ => unreachable!("follower election timeout always yields a candidate"),
        }
    }

    /// §4.3 "On reaching majority": initialize replication progress, append
    /// a no-value entry at the new term, and broadcast it.
    pub(crate) fn become_leader<S>(
        self,
        env: &TransitionEnv<C, S>,
    ) -> (Raft<Leader<C>, C>, Vec<Action<C, S>>) {
        let peers = self.config.other_peers();
        let last_log_index = env.last_log_entry.as_ref().map(|e| e.index).unwrap_or(0);
        let progress = ReplicationProgress::new(&peers, last_log_index);

        let no_op = crate::raft::Entry {
            index: last_log_index + 1,
            term: self.persistent.current_term,
            issuer: Issuer::Leader,
            value: EntryValue::NoOp,
        };

        let mut leader: Raft<Leader<C>, C> = Raft::from(self);
        leader.role.progress = progress;
        leader.role.last_log_entry = Some(no_op.clone());

        let prev_log_term = env.last_log_entry.as_ref().map(|e| e.term).unwrap_or(0);

        let actions = vec![
            Action::AppendLogEntries(vec![no_op.clone()]),
            Action::BroadcastRpc {
                rpc: Rpc::AppendEntries(AppendEntries {
                    term: leader.persistent.current_term,
                    leader_id: leader.id,
                    prev_log_index: last_log_index,
                    prev_log_term,
                    entries: vec![no_op],
                    leader_commit: leader.role.commit_index,
                    read_request: None,
                }),
            },
            Action::ResetTimeoutTimer(TimeoutKind::Heartbeat),
        ];

        (leader, actions)
    }
}

impl<C> From<Raft<Candidate, C>> for Raft<Follower, C> {
    fn from(val: Raft<Candidate, C>) -> Raft<Follower, C> {
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

impl<C> From<Raft<Candidate, C>> for Raft<Leader<C>, C> {
    fn from(val: Raft<Candidate, C>) -> Raft<Leader<C>, C> {
        let peers = val.config.other_peers();
        Raft {
            id: val.id,
            logger: val.logger.clone(),
            config: val.config,
            persistent: val.persistent,
            role: Leader {
                progress: ReplicationProgress::new(&peers, 0),
                commit_index: val.role.commit_index,
                last_applied: val.role.last_applied,
                pending_writes: Default::default(),
                pending_reads: Default::default(),
                next_read_serial: 0,
                last_log_entry: None,
                logger: val.logger.new(o!("role" => "leader")),
            },
            _command: std::marker::PhantomData,
        }
    }
}
