use raft_core_support::error::Result;

use crate::raft::{EntryValue, LogIndex};
use crate::store::LogStore;

/// The host-supplied replicated state machine. Pure over `(prevState, cmd)
/// -> newState | error` (§4.5): deterministic given the same sequence of
/// committed commands on every node.
pub trait Rsm {
    type Command;
    type Snapshot;

    fn apply_command(&mut self, cmd: Self::Command) -> Result<()>;

    /// A read-only view served back to clients on a linearizable read.
    fn snapshot(&self) -> Self::Snapshot;
}

/// Advances `last_applied` up to `commit_index`, feeding each committed
/// command-bearing entry to the RSM in order and skipping no-value entries
/// (§4.5). Mirrors the teacher's own `Driver::exec` loop, adapted from
/// async instruction-channel consumption to a synchronous pull the host
/// driver calls whenever `commitIndex > lastApplied`.
pub fn drive_apply<C, R>(
    store: &dyn LogStore<C>,
    rsm: &mut R,
    last_applied: &mut LogIndex,
    commit_index: LogIndex,
) -> Result<()>
where
    R: Rsm<Command = C>,
{
    while *last_applied < commit_index {
        let next = *last_applied + 1;
        let entry = store.read_entry(next)?;
        if let Some(entry) = entry {
            if let EntryValue::Command(cmd) = entry.value {
                rsm.apply_command(cmd)?;
            }
        }
        *last_applied = next;
    }
    Ok(())
}
