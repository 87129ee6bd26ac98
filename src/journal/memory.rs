//! Ephemeral journal for `storage.mode: memory`

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Journal, JournalError, JournalRecord};
use crate::core_types::SeqNum;

/// Sequences records without storing them. State lives only in memory and
/// is lost on restart.
pub struct MemoryJournal {
    next_seq: AtomicU64,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(1),
        }
    }

    /// Number of records appended so far
    pub fn len(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst) - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, _record: &JournalRecord) -> Result<SeqNum, JournalError> {
        Ok(self.next_seq.fetch_add(1, Ordering::SeqCst))
    }
}
