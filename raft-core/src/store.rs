use raft_core_support::error::{Error, Result};

use crate::raft::{Entry, LogIndex};

/// Defines all log-persistence behavior the transition engine's driver must
/// provide. Keeping this generic over the backend (as the teacher's own `Io`
/// trait does) isolates the pure protocol logic from any one persistence
/// strategy and makes it easy to swap in an on-disk implementation without
/// touching the engine (§4.7).
pub trait LogStore<C> {
    /// Append to the tail. Entries' indices must be contiguous and strictly
    /// greater than the current last index.
    fn append_entries(&mut self, entries: Vec<Entry<C>>) -> Result<()>;

    /// Read the entry at `index`, or `None` if absent (index 0 is always
    /// absent by convention, §3).
    fn read_entry(&self, index: LogIndex) -> Result<Option<Entry<C>>>;

    /// Read the last entry in the log, or `None` if the log is empty.
    fn read_last_entry(&self) -> Result<Option<Entry<C>>>;

    /// Truncate the suffix `[index, ∞)`.
    fn truncate_from(&mut self, index: LogIndex) -> Result<()>;

    fn last_index(&self) -> Result<LogIndex> {
        Ok(self.read_last_entry()?.map(|e| e.index).unwrap_or(0))
    }

    fn last_term(&self) -> Result<u64> {
        Ok(self.read_last_entry()?.map(|e| e.term).unwrap_or(0))
    }
}

/// Simple in-memory log, used for tests and as a reference implementation
/// (mirrors the teacher's own `MemoryIo`).
#[derive(Debug, Default)]
pub struct MemoryLogStore<C> {
    entries: Vec<Entry<C>>,
}

impl<C> MemoryLogStore<C> {
    pub fn new() -> Self {
        MemoryLogStore {
            entries: Vec::new(),
        }
    }
}

impl<C: Clone> LogStore<C> for MemoryLogStore<C> {
    fn append_entries(&mut self, entries: Vec<Entry<C>>) -> Result<()> {
        for entry in entries {
            let expected = self.entries.last().map(|e| e.index + 1).unwrap_or(1);
            if entry.index != expected {
                return Err(Error::invariant(format!(
                    "non-contiguous append: expected index {}, got {}",
                    expected, entry.index
                )));
            }
            self.entries.push(entry);
        }
        Ok(())
    }

    fn read_entry(&self, index: LogIndex) -> Result<Option<Entry<C>>> {
        if index == 0 {
            return Ok(None);
        }
        Ok(self
            .entries
            .get((index - 1) as usize)
            .filter(|e| e.index == index)
            .cloned())
    }

    fn read_last_entry(&self) -> Result<Option<Entry<C>>> {
        Ok(self.entries.last().cloned())
    }

    fn truncate_from(&mut self, index: LogIndex) -> Result<()> {
        if index == 0 {
            self.entries.clear();
            return Ok(());
        }
        self.entries.retain(|e| e.index < index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raft::{EntryValue, Issuer};

    fn entry(index: LogIndex, term: u64) -> Entry<u8> {
        Entry {
            index,
            term,
            issuer: Issuer::Leader,
            value: EntryValue::NoOp,
        }
    }

    #[test]
    fn append_and_read() {
        let mut store = MemoryLogStore::new();
        store.append_entries(vec![entry(1, 1), entry(2, 1)]).unwrap();
        assert_eq!(store.last_index().unwrap(), 2);
        assert_eq!(store.read_entry(1).unwrap().unwrap().term, 1);
        assert!(store.read_entry(3).unwrap().is_none());
        assert!(store.read_entry(0).unwrap().is_none());
    }

    #[test]
    fn truncate_from_is_inclusive() {
        let mut store = MemoryLogStore::new();
        store
            .append_entries(vec![entry(1, 1), entry(2, 1), entry(3, 1)])
            .unwrap();
        store.truncate_from(2).unwrap();
        assert_eq!(store.last_index().unwrap(), 1);
        assert!(store.read_entry(2).unwrap().is_none());
    }

    #[test]
    fn rejects_non_contiguous_append() {
        let mut store: MemoryLogStore<u8> = MemoryLogStore::new();
        assert!(store.append_entries(vec![entry(2, 1)]).is_err());
    }
}
