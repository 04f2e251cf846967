//! End-to-end scenarios over a simulated 3-node cluster, driving the pure
//! transition engine directly (no network, no real timers) the way a unit
//! test for the teacher's own `Apply` trait would.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use raft_core::action::Action;
use raft_core::client::{ClientRequest, ClientRequestBody, ClientResponse};
use raft_core::config::RaftConfig;
use raft_core::fsm::{drive_apply, Rsm};
use raft_core::raft::{ClientId, Entry, EntryValue, Issuer, LeaderRef, NodeId, RaftHandle, TransitionEnv};
use raft_core::rpc::{AppendEntries, Event, Rpc, TimeoutKind};
use raft_core::store::{LogStore, MemoryLogStore};
use raft_core_support::error::Result;
use raft_core_support::logger::get_root_logger;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Command {
    Set(String, i64),
    Incr(String),
}

#[derive(Debug, Default, Clone)]
struct KvStore(HashMap<String, i64>);

impl Rsm for KvStore {
    type Command = Command;
    type Snapshot = HashMap<String, i64>;

    fn apply_command(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::Set(k, v) => {
                self.0.insert(k, v);
            }
            Command::Incr(k) => {
                *self.0.entry(k).or_insert(0) += 1;
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> HashMap<String, i64> {
        self.0.clone()
    }
}

struct NodeSim {
    handle: Option<RaftHandle<Command>>,
    store: MemoryLogStore<Command>,
    rsm: KvStore,
    last_applied: u64,
}

struct Cluster {
    nodes: HashMap<NodeId, NodeSim>,
    queue: VecDeque<(NodeId, Event<Command>)>,
    client_responses: Vec<(ClientId, ClientResponse<HashMap<String, i64>>)>,
}

impl Cluster {
    fn new(ids: &[NodeId]) -> Self {
        let mut nodes = HashMap::new();
        for &id in ids {
            let config = RaftConfig {
                self_id: id,
                peers: ids.to_vec(),
                ..Default::default()
            };
            nodes.insert(
                id,
                NodeSim {
                    handle: Some(RaftHandle::new(id, config, get_root_logger())),
                    store: MemoryLogStore::new(),
                    rsm: KvStore::default(),
                    last_applied: 0,
                },
            );
        }
        Cluster {
            nodes,
            queue: VecDeque::new(),
            client_responses: Vec::new(),
        }
    }

    fn push(&mut self, to: NodeId, event: Event<Command>) {
        self.queue.push_back((to, event));
    }

    /// Drain the event queue, routing every resulting action back into
    /// either another node's queue or the client response log.
    fn run(&mut self) {
        while let Some((to, event)) = self.queue.pop_front() {
            self.dispatch(to, event);
        }
    }

    fn env_for(&self, id: NodeId, event: &Event<Command>) -> TransitionEnv<Command, HashMap<String, i64>> {
        let node = self.nodes.get(&id).unwrap();
        let last_log_entry = node.store.read_last_entry().unwrap();

        let mut entry_at_prev_index = None;
        let mut conflicting_index = None;
        if let Event::Message {
            rpc: Rpc::AppendEntries(req),
            ..
        } = event
        {
            entry_at_prev_index = node.store.read_entry(req.prev_log_index).unwrap();
            for candidate in &req.entries {
                if let Some(existing) = node.store.read_entry(candidate.index).unwrap() {
                    if existing.term != candidate.term {
                        conflicting_index = Some(candidate.index);
                        break;
                    }
                }
            }
        }

        let mut retry_entries = Vec::new();
        let mut retry_prev = None;
        if let Event::Message {
            rpc: Rpc::AppendEntriesResponse(resp),
            ..
        } = event
        {
            if !resp.success {
                let next_index = resp.match_index + 1;
                let last_index = node.store.last_index().unwrap();
                for idx in next_index..=last_index {
                    if let Some(e) = node.store.read_entry(idx).unwrap() {
                        retry_entries.push(e);
                    }
                }
                let prev = node.store.read_entry(resp.match_index).unwrap();
                retry_prev = Some((resp.match_index, prev.map(|e| e.term).unwrap_or(0)));
            }
        }

        TransitionEnv {
            entry_at_prev_index,
            last_log_entry,
            conflicting_index,
            rsm_snapshot: node.rsm.snapshot(),
            retry_entries,
            retry_prev,
        }
    }

    fn dispatch(&mut self, to: NodeId, event: Event<Command>) {
        let env = self.env_for(to, &event);
        let node = self.nodes.get_mut(&to).unwrap();
        let handle = node.handle.take().unwrap();
        let outcome = raft_core::handle_event(handle, &env, event);
        node.handle = Some(outcome.raft);

        for action in outcome.actions {
            match action {
                Action::SendRpc { to: dest, rpc } => {
                    self.queue.push_back((dest, Event::Message { from: to, rpc }));
                }
                Action::BroadcastRpc { rpc } => {
                    for peer in self.peer_ids_excluding(to) {
                        self.queue
                            .push_back((peer, Event::Message { from: to, rpc: rpc.clone() }));
                    }
                }
                Action::AppendLogEntries(entries) => {
                    let node = self.nodes.get_mut(&to).unwrap();
                    if let Some(first) = entries.first() {
                        if first.index <= node.store.last_index().unwrap() {
                            node.store.truncate_from(first.index).unwrap();
                        }
                    }
                    node.store.append_entries(entries).unwrap();
                }
                Action::RespondToClient { client_id, response } => {
                    self.client_responses.push((client_id, response));
                }
                Action::ResetTimeoutTimer(_) => {}
            }
            self.catch_up(to);
        }
    }

    fn peer_ids_excluding(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes.keys().copied().filter(|&p| p != id).collect()
    }

    fn catch_up(&mut self, id: NodeId) {
        let node = self.nodes.get_mut(&id).unwrap();
        let commit_index = node.handle.as_ref().unwrap().commit_index();
        drive_apply(&node.store, &mut node.rsm, &mut node.last_applied, commit_index).unwrap();
    }

    fn trigger_election(&mut self, id: NodeId) {
        self.push(id, Event::Timeout(TimeoutKind::Election));
        self.run();
    }

    fn trigger_heartbeat(&mut self, id: NodeId) {
        self.push(id, Event::Timeout(TimeoutKind::Heartbeat));
        self.run();
    }

    fn send_write(&mut self, to: NodeId, cmd: Command) -> ClientId {
        let client_id = ClientId::new();
        self.push(
            to,
            Event::ClientRequest(ClientRequest {
                client_id,
                body: ClientRequestBody::Write(cmd),
            }),
        );
        self.run();
        client_id
    }

    fn send_read(&mut self, to: NodeId) -> ClientId {
        let client_id = ClientId::new();
        self.push(
            to,
            Event::ClientRequest(ClientRequest {
                client_id,
                body: ClientRequestBody::Read,
            }),
        );
        self.run();
        client_id
    }

    fn response_for(&self, client_id: ClientId) -> Option<&ClientResponse<HashMap<String, i64>>> {
        self.client_responses
            .iter()
            .find(|(id, _)| *id == client_id)
            .map(|(_, r)| r)
    }
}

const N0: NodeId = 0;
const N1: NodeId = 1;
const N2: NodeId = 2;

#[test]
fn scenario_1_leader_election() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    cluster.trigger_election(N0);

    assert!(matches!(
        cluster.nodes[&N0].handle.as_ref().unwrap().role(),
        raft_core::raft::RaftRole::Leader
    ));
    for &peer in &[N1, N2] {
        assert!(matches!(
            cluster.nodes[&peer].handle.as_ref().unwrap().role(),
            raft_core::raft::RaftRole::Follower
        ));
    }
    for &id in &[N0, N1, N2] {
        assert_eq!(cluster.nodes[&id].store.last_index().unwrap(), 1);
        let entry = cluster.nodes[&id].store.read_entry(1).unwrap().unwrap();
        assert_eq!(entry.term, 1);
    }
}

#[test]
fn scenario_2_write_replication_and_apply() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    cluster.trigger_election(N0);

    let client = cluster.send_write(N0, Command::Set("test".into(), 1));
    cluster.trigger_heartbeat(N0);

    for &id in &[N0, N1, N2] {
        assert_eq!(cluster.nodes[&id].store.last_index().unwrap(), 2);
    }
    assert_eq!(cluster.nodes[&N0].handle.as_ref().unwrap().commit_index(), 2);

    for &id in &[N0, N1, N2] {
        assert_eq!(cluster.nodes[&id].rsm.snapshot().get("test"), Some(&1));
    }

    match cluster.response_for(client) {
        Some(ClientResponse::Write(idx)) => assert_eq!(*idx, 2),
        other => panic!("expected Write(2), got {:?}", other),
    }
}

#[test]
fn scenario_3_increment() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    cluster.trigger_election(N0);
    cluster.send_write(N0, Command::Set("test".into(), 1));
    cluster.trigger_heartbeat(N0);

    cluster.send_write(N0, Command::Incr("test".into()));
    cluster.trigger_heartbeat(N0);

    for &id in &[N0, N1, N2] {
        assert_eq!(cluster.nodes[&id].rsm.snapshot().get("test"), Some(&2));
    }
}

#[test]
fn scenario_4_multi_increment() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    cluster.trigger_election(N0);
    cluster.send_write(N0, Command::Set("test".into(), 1));
    cluster.trigger_heartbeat(N0);

    for _ in 0..10 {
        cluster.send_write(N0, Command::Incr("test".into()));
    }
    cluster.trigger_heartbeat(N0);

    for &id in &[N0, N1, N2] {
        assert_eq!(cluster.nodes[&id].rsm.snapshot().get("test"), Some(&11));
    }
}

#[test]
fn scenario_5_follower_redirect() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    cluster.trigger_election(N0);

    let client = cluster.send_write(N1, Command::Set("test".into(), 1));
    match cluster.response_for(client) {
        Some(ClientResponse::Redirect(LeaderRef::Known(leader))) => assert_eq!(*leader, N0),
        other => panic!("expected Redirect(Known(0)), got {:?}", other),
    }
}

#[test]
fn scenario_6_no_leader_redirect() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    let client = cluster.send_write(N1, Command::Set("test".into(), 1));
    match cluster.response_for(client) {
        Some(ClientResponse::Redirect(LeaderRef::Unknown)) => {}
        other => panic!("expected Redirect(Unknown), got {:?}", other),
    }
}

#[test]
fn scenario_7_leader_change() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    cluster.trigger_election(N0);
    cluster.trigger_election(N1);

    assert!(matches!(
        cluster.nodes[&N1].handle.as_ref().unwrap().role(),
        raft_core::raft::RaftRole::Leader
    ));
    assert_eq!(cluster.nodes[&N1].handle.as_ref().unwrap().current_term(), 2);
    for &peer in &[N0, N2] {
        assert!(matches!(
            cluster.nodes[&peer].handle.as_ref().unwrap().role(),
            raft_core::raft::RaftRole::Follower
        ));
    }
}

#[test]
fn scenario_8_linearizable_read() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);
    cluster.trigger_election(N0);
    cluster.send_write(N0, Command::Set("test".into(), 1));
    cluster.trigger_heartbeat(N0);

    let client = cluster.send_read(N0);
    match cluster.response_for(client) {
        Some(ClientResponse::Read(snapshot)) => assert_eq!(snapshot.get("test"), Some(&1)),
        other => panic!("expected Read snapshot, got {:?}", other),
    }
}

fn command_entry(index: u64, term: u64, cmd: Command) -> Entry<Command> {
    Entry {
        index,
        term,
        issuer: Issuer::Leader,
        value: EntryValue::Command(cmd),
    }
}

/// A scenario 7 variant (spec.md §9): a follower carries a stale entry left
/// over from an earlier leader at an index *past* one that already agrees
/// with the current leader, so the conflict the current leader's catch-up
/// append must truncate doesn't show up until partway through the batch.
#[test]
fn scenario_7_variant_conflicting_entries_truncated_mid_batch() {
    let mut cluster = Cluster::new(&[N0, N1, N2]);

    // N1's log: index 1 agrees with every leader so far, index 2 already
    // matches the current leader's term 2, but index 3 is a stale leftover
    // from a since-deposed term-1 leader that never got overwritten.
    {
        let node = cluster.nodes.get_mut(&N1).unwrap();
        node.store
            .append_entries(vec![
                command_entry(1, 1, Command::Set("test".into(), 0)),
                command_entry(2, 2, Command::Set("test".into(), 1)),
                command_entry(3, 1, Command::Set("test".into(), 99)),
            ])
            .unwrap();
    }

    // The current term-2 leader's catch-up append re-sends index 2
    // (matches, no conflict) followed by its own index 3 (conflicts with
    // N1's stale entry there).
    let append = AppendEntries {
        term: 2,
        leader_id: N0,
        prev_log_index: 1,
        prev_log_term: 1,
        entries: vec![
            command_entry(2, 2, Command::Set("test".into(), 1)),
            command_entry(3, 2, Command::Set("test".into(), 2)),
        ],
        leader_commit: 0,
        read_request: None,
    };
    cluster.push(N1, Event::Message { from: N0, rpc: Rpc::AppendEntries(append) });
    cluster.run();

    let store = &cluster.nodes[&N1].store;
    assert_eq!(store.last_index().unwrap(), 3);
    assert_eq!(store.read_entry(2).unwrap().unwrap().term, 2);
    assert_eq!(store.read_entry(3).unwrap().unwrap().term, 2);
    match store.read_entry(3).unwrap().unwrap().value {
        EntryValue::Command(Command::Set(_, v)) => assert_eq!(v, 2),
        other => panic!("expected Set(_, 2) at index 3, got {:?}", other),
    }
}
