use slog::Logger;

use crate::action::{Action, LogMsg};
use crate::candidate::Candidate;
use crate::client::{ClientRequestBody, ClientResponse};
use crate::election::Election;
use crate::raft::{LeaderRef, LogIndex, Raft, RaftHandle, RaftRole, Role, Term, TransitionEnv};
use crate::rpc::{AppendEntriesResponse, Event, RequestVote, RequestVoteResponse, Rpc, TimeoutKind};

/// Volatile state specific to the Follower role (§3 FollowerState).
#[derive(Debug, Clone)]
pub struct Follower {
    pub current_leader: LeaderRef,
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    pub logger: Logger,
}

impl Role for Follower {
    fn term(&mut self, _term: Term) {
        // Advancing the term alone doesn't change who we think the leader
        // is -- that only changes on an accepted AppendEntries.
    }

    fn role(&self) -> RaftRole {
        RaftRole::Follower
    }

    fn log(&self) -> &Logger {
        &self.logger
    }
}

impl<C: Clone> Raft<Follower, C> {
    /// §4.2 in full: election timeout, RequestVote, AppendEntries, and the
    /// client-request redirect.
    pub fn handle_event<S>(
        mut self,
        env: &TransitionEnv<C, S>,
        event: Event<C>,
    ) -> (RaftHandle<C>, Vec<Action<C, S>>, Vec<LogMsg>) {
        let mut actions = Vec::new();
        let mut logs = Vec::new();

        match event {
            Event::Timeout(TimeoutKind::Election) => {
                logs.push(LogMsg::info("election timeout, becoming candidate"));
                let (candidate, mut cand_actions) = self.seek_election(env);
                actions.append(&mut cand_actions);

                // A single-node cluster's self-vote is already a majority
                // (§8 boundary case): promote to leader without waiting for
                // any vote response.
                if candidate.role.election.election_status() == crate::election::ElectionStatus::Elected {
                    logs.push(LogMsg::info("elected leader"));
                    let (leader, mut leader_actions) = candidate.become_leader(env);
                    actions.append(&mut leader_actions);
                    return (RaftHandle::Leader(leader), actions, logs);
                }

                (RaftHandle::Candidate(candidate), actions, logs)
            }
            Event::Timeout(TimeoutKind::Heartbeat) => (RaftHandle::Follower(self), actions, logs),
            Event::Message { from, rpc } => match rpc {
                Rpc::RequestVote(req) => {
                    let (granted, response_term) = self.decide_vote(&req, env);
                    if granted {
                        self.persistent.voted_for = Some(req.candidate_id);
                        actions.push(Action::ResetTimeoutTimer(TimeoutKind::Election));
                    }
                    logs.push(LogMsg::info(format!(
                        "vote request from {} in term {}: granted={}",
                        req.candidate_id, req.term, granted
                    )));
                    actions.push(Action::SendRpc {
                        to: from,
                        rpc: Rpc::RequestVoteResponse(RequestVoteResponse {
                            term: response_term,
                            vote_granted: granted,
                        }),
                    });
                    (RaftHandle::Follower(self), actions, logs)
                }
                Rpc::AppendEntries(req) => {
                    if req.term < self.persistent.current_term {
                        actions.push(Action::SendRpc {
                            to: from,
                            rpc: Rpc::AppendEntriesResponse(AppendEntriesResponse {
                                term: self.persistent.current_term,
                                success: false,
                                match_index: self.role.commit_index,
                                read_request: req.read_request,
                            }),
                        });
                        return (RaftHandle::Follower(self), actions, logs);
                    }

                    let has_prev = req.prev_log_index == 0
                        || env
                            .entry_at_prev_index
                            .as_ref()
                            .map(|e| e.term == req.prev_log_term)
                            .unwrap_or(false);

                    if !has_prev {
                        let last_index = env.last_log_entry.as_ref().map(|e| e.index).unwrap_or(0);
                        actions.push(Action::SendRpc {
                            to: from,
                            rpc: Rpc::AppendEntriesResponse(AppendEntriesResponse {
                                term: self.persistent.current_term,
                                success: false,
                                match_index: last_index,
                                read_request: req.read_request,
                            }),
                        });
                        return (RaftHandle::Follower(self), actions, logs);
                    }

                    // Truncate on conflict, then append whatever is new
                    // (idempotent): §4.2.
                    if let Some(conflict_at) = env.conflicting_index {
                        actions.push(Action::AppendLogEntries(
                            req.entries
                                .iter()
                                .filter(|e| e.index >= conflict_at)
                                .cloned()
                                .collect(),
                        ));
                    } else if !req.entries.is_empty() {
                        actions.push(Action::AppendLogEntries(req.entries.clone()));
                    }

                    let index_of_last_new_entry = req
                        .entries
                        .last()
                        .map(|e| e.index)
                        .unwrap_or(req.prev_log_index);

                    self.role.current_leader = LeaderRef::Known(req.leader_id);
                    self.role.commit_index = req.leader_commit.min(index_of_last_new_entry);
                    actions.push(Action::ResetTimeoutTimer(TimeoutKind::Election));
                    actions.push(Action::SendRpc {
                        to: from,
                        rpc: Rpc::AppendEntriesResponse(AppendEntriesResponse {
                            term: self.persistent.current_term,
                            success: true,
                            match_index: index_of_last_new_entry,
                            read_request: req.read_request,
                        }),
                    });
                    (RaftHandle::Follower(self), actions, logs)
                }
                _ => (RaftHandle::Follower(self), actions, logs),
            },
            Event::ClientRequest(req) => {
                let response = match req.body {
                    ClientRequestBody::Read | ClientRequestBody::Write(_) => {
                        ClientResponse::Redirect(self.role.current_leader)
                    }
                };
                actions.push(Action::RespondToClient {
                    client_id: req.client_id,
                    response,
                });
                (RaftHandle::Follower(self), actions, logs)
            }
        }
    }

    /// Whether to grant a vote (§4.2): reject stale terms, otherwise grant
    /// iff we haven't already voted for someone else this term and the
    /// candidate's log is at least as up to date as ours.
    fn decide_vote<S>(&self, req: &RequestVote, env: &TransitionEnv<C, S>) -> (bool, Term) {
        if req.term < self.persistent.current_term {
            return (false, self.persistent.current_term);
        }

        let (my_last_index, my_last_term) = env
            .last_log_entry
            .as_ref()
            .map(|e| (e.index, e.term))
            .unwrap_or((0, 0));

        let log_ok = req.last_log_term > my_last_term
            || (req.last_log_term == my_last_term && req.last_log_index >= my_last_index);

        let can_vote = match self.persistent.voted_for {
            None => true,
            Some(c) => c == req.candidate_id,
        };

        (can_vote && log_ok, req.term.max(self.persistent.current_term))
    }

    /// §4.2 "On ElectionTimeout": increment the term, vote for self,
    /// transition to Candidate, and broadcast `RequestVote`.
    fn seek_election<S>(self, env: &TransitionEnv<C, S>) -> (Raft<Candidate, C>, Vec<Action<C, S>>) {
        let (last_index, last_term) = env
            .last_log_entry
            .as_ref()
            .map(|e| (e.index, e.term))
            .unwrap_or((0, 0));

        let mut candidate: Raft<Candidate, C> = Raft::from(self);
        candidate.persistent.current_term += 1;
        candidate.persistent.voted_for = Some(candidate.id);
        candidate.role.election = Election::new(candidate.id, candidate.config.peers.len());

        let actions = vec![
            Action::BroadcastRpc {
                rpc: Rpc::RequestVote(RequestVote {
                    term: candidate.persistent.current_term,
                    candidate_id: candidate.id,
                    last_log_index: last_index,
                    last_log_term: last_term,
                }),
            },
            Action::ResetTimeoutTimer(TimeoutKind::Election),
        ];

        (candidate, actions)
    }
}

impl<C> From<Raft<Follower, C>> for Raft<Candidate, C> {
    fn from(val: Raft<Follower, C>) -> Raft<Candidate, C> {
        let cluster_size = val.config.peers.len();
        Raft {
            id: val.id,
            logger: val.logger.clone(),
            config: val.config,
            persistent: val.persistent,
            role: Candidate {
                election: Election::new(val.id, cluster_size),
                commit_index: val.role.commit_index,
                last_applied: val.role.last_applied,
                logger: val.logger.new(o!("role" => "candidate")),
            },
            _command: std::marker::PhantomData,
        }
    }
}
