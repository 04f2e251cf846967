//! A pure, deterministic implementation of the Raft consensus protocol's
//! core state machine: it accepts events (timeouts, peer RPCs, client
//! requests) and produces a new state plus a list of actions for a host
//! driver to execute (send RPCs, write the log, reply to clients, reset
//! timers). The engine itself never performs I/O, never blocks, and never
//! panics -- see [`handle_event`].

#[macro_use]
extern crate slog;

pub mod action;
pub mod candidate;
pub mod client;
pub mod config;
pub mod election;
pub mod follower;
pub mod fsm;
pub mod leader;
pub mod progress;
pub mod raft;
pub mod rpc;
pub mod store;

use action::{Action, LogMsg};
use raft::{RaftHandle, Term, TransitionEnv};
use rpc::{Event, Rpc};

/// The result of a single `handle_event` call: the node's new state, the
/// actions the driver must execute, and a structured log-message stream
/// (§4.1, §9).
pub struct Outcome<C, S> {
    pub raft: RaftHandle<C>,
    pub actions: Vec<Action<C, S>>,
    pub logs: Vec<LogMsg>,
}

/// The single pure operation the engine exposes (§4.1):
///
///     handleEvent(nodeState, env, persistentState, event)
///       -> (nodeState', persistentState', [Action], [LogMsg])
///
/// Here `nodeState`/`persistentState` are folded into one `RaftHandle`
/// value for convenience, since every role carries its own persistent
/// state alongside its volatile state.
///
/// Applies the universal pre-transition rule before any role-specific
/// handling: if an incoming RPC's term exceeds `currentTerm`, the node
/// updates its term, clears its vote, and steps down to Follower -- even
/// for an RPC that role-specific handling will otherwise reject (§4.1).
pub fn handle_event<C: Clone, S: Clone>(
    raft: RaftHandle<C>,
    env: &TransitionEnv<C, S>,
    event: Event<C>,
) -> Outcome<C, S> {
    let raft = apply_universal_term_rule(raft, &event);

    let (raft, actions, logs) = match raft {
        RaftHandle::Follower(r) => r.handle_event(env, event),
        RaftHandle::Candidate(r) => r.handle_event(env, event),
        RaftHandle::Leader(r) => r.handle_event(env, event),
    };

    Outcome {
        raft,
        actions,
        logs,
    }
}

fn apply_universal_term_rule<C>(raft: RaftHandle<C>, event: &Event<C>) -> RaftHandle<C> {
    let incoming_term = match event {
        Event::Message { rpc, .. } => Some(rpc_term(rpc)),
        _ => None,
    };

    let incoming_term = match incoming_term {
        Some(t) => t,
        None => return raft,
    };

    if incoming_term <= raft.current_term() {
        return raft;
    }

    match raft {
        RaftHandle::Follower(mut r) => {
            r.term(incoming_term);
            RaftHandle::Follower(r)
        }
        RaftHandle::Candidate(r) => {
            let mut follower: raft::Raft<follower::Follower, C> = raft::Raft::from(r);
            follower.term(incoming_term);
            RaftHandle::Follower(follower)
        }
        RaftHandle::Leader(r) => {
            let mut follower: raft::Raft<follower::Follower, C> = raft::Raft::from(r);
            follower.term(incoming_term);
            RaftHandle::Follower(follower)
        }
    }
}

fn rpc_term<C>(rpc: &Rpc<C>) -> Term {
    rpc.term()
}
