//! File-backed journal (`wal/current.wal`)

use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::wal::WalWriter;
use super::{Journal, JournalError, JournalRecord};
use crate::core_types::SeqNum;

struct WalFile {
    writer: WalWriter<File>,
    /// Length of the file up to the last complete entry
    committed_len: u64,
}

impl WalFile {
    fn append(&mut self, record: &JournalRecord, sync: bool) -> Result<SeqNum, JournalError> {
        let payload = bincode::serialize(record)?;
        match self.write_durable(record, &payload, sync) {
            Ok(seq) => Ok(seq),
            Err(e) => {
                // Cut off any partial frame so later entries stay readable
                if let Err(trunc) = self.rewind() {
                    tracing::error!(error = %trunc, "Failed to truncate WAL after write error");
                }
                Err(e.into())
            }
        }
    }

    fn write_durable(
        &mut self,
        record: &JournalRecord,
        payload: &[u8],
        sync: bool,
    ) -> io::Result<SeqNum> {
        let seq = self.writer.write_entry(record.entry_type(), payload)?;
        self.writer.flush()?;
        if sync {
            self.writer.get_ref().sync_data()?;
        }
        self.committed_len = self.writer.get_mut().stream_position()?;
        Ok(seq)
    }

    fn rewind(&mut self) -> io::Result<()> {
        let file = self.writer.get_mut();
        file.set_len(self.committed_len)?;
        file.seek(SeekFrom::Start(self.committed_len))?;
        Ok(())
    }
}

/// Append-only binary journal.
///
/// Writes run on the blocking pool; a std mutex orders them, so the file
/// order equals the sequence order.
pub struct FileJournal {
    path: PathBuf,
    sync_on_append: bool,
    inner: Arc<Mutex<WalFile>>,
}

impl FileJournal {
    /// Open (or create) the WAL and continue numbering at `next_seq`.
    pub fn open(
        path: impl AsRef<Path>,
        next_seq: SeqNum,
        sync_on_append: bool,
    ) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        let committed_len = file.seek(SeekFrom::End(0))?;

        tracing::info!(
            path = %path.display(),
            next_seq,
            committed_len,
            "Opened WAL"
        );

        Ok(Self {
            path,
            sync_on_append,
            inner: Arc::new(Mutex::new(WalFile {
                writer: WalWriter::new(file, next_seq),
                committed_len,
            })),
        })
    }

    /// Discard all entries (after they are covered by a snapshot).
    /// Numbering continues at `next_seq`.
    pub fn reset(&self, next_seq: SeqNum) -> Result<(), JournalError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| JournalError::Unavailable("WAL writer poisoned".into()))?;
        let file = guard.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;
        let file = file.try_clone()?;
        guard.writer = WalWriter::new(file, next_seq);
        guard.committed_len = 0;
        tracing::info!(path = %self.path.display(), next_seq, "WAL truncated");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_seq(&self) -> Result<SeqNum, JournalError> {
        self.inner
            .lock()
            .map(|g| g.writer.next_seq())
            .map_err(|_| JournalError::Unavailable("WAL writer poisoned".into()))
    }
}

#[async_trait]
impl Journal for FileJournal {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn append(&self, record: &JournalRecord) -> Result<SeqNum, JournalError> {
        let inner = Arc::clone(&self.inner);
        let record = record.clone();
        let sync = self.sync_on_append;
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| JournalError::Unavailable("WAL writer poisoned".into()))?;
            guard.append(&record, sync)
        })
        .await
        .map_err(|e| JournalError::Unavailable(format!("WAL writer task failed: {}", e)))?
    }
}
