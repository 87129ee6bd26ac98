//! Ledger snapshot creation/loading
//!
//! Atomic snapshot creation with COMPLETE marker and CRC64 checksum
//! verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::account::Account;
use crate::core_types::SeqNum;
use crate::ledger::Transaction;

const STATE_FILE: &str = "state.bin";
const METADATA_FILE: &str = "metadata.json";
const COMPLETE_MARKER: &str = "COMPLETE";
const LATEST_POINTER: &str = "latest";
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Snapshots kept on disk after a successful write
const RETAINED_SNAPSHOTS: usize = 2;

/// Full ledger state. Transactions are in append order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerState {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub wal_seq_id: SeqNum,
    pub account_count: usize,
    pub transaction_count: usize,
    pub state_checksum: String,
    pub created_at: DateTime<Utc>,
}

pub struct LedgerSnapshotter {
    snapshot_dir: PathBuf,
}

impl LedgerSnapshotter {
    pub fn new(snapshot_dir: impl AsRef<Path>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.as_ref().to_path_buf(),
        }
    }

    /// Create an atomic snapshot covering every journal entry up to and
    /// including `wal_seq_id`.
    ///
    /// Protocol:
    /// 1. Create .tmp-{timestamp}/
    /// 2. Write state.bin (bincode) and fsync
    /// 3. Calculate CRC64 checksum
    /// 4. Write metadata.json
    /// 5. Write COMPLETE marker
    /// 6. Atomic rename to snapshot-{seq}/
    /// 7. Atomically replace the `latest` pointer file
    pub fn create_snapshot(&self, state: &LedgerState, wal_seq_id: SeqNum) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.snapshot_dir)?;

        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let tmp_dir = self.snapshot_dir.join(format!(".tmp-{}", timestamp));
        fs::create_dir_all(&tmp_dir)?;

        let state_bytes =
            bincode::serialize(state).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        {
            let file = File::create(tmp_dir.join(STATE_FILE))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&state_bytes)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        let metadata = SnapshotMetadata {
            format_version: SNAPSHOT_FORMAT_VERSION,
            wal_seq_id,
            account_count: state.accounts.len(),
            transaction_count: state.transactions.len(),
            state_checksum: calculate_crc64(&state_bytes),
            created_at: Utc::now(),
        };
        let metadata_json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(tmp_dir.join(METADATA_FILE), metadata_json)?;

        fs::write(tmp_dir.join(COMPLETE_MARKER), "")?;

        let name = format!("snapshot-{}", wal_seq_id);
        let final_dir = self.snapshot_dir.join(&name);
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        let pointer_tmp = self.snapshot_dir.join(format!(".{}.tmp", LATEST_POINTER));
        fs::write(&pointer_tmp, &name)?;
        fs::rename(&pointer_tmp, self.snapshot_dir.join(LATEST_POINTER))?;

        tracing::info!(
            seq_id = wal_seq_id,
            accounts = metadata.account_count,
            transactions = metadata.transaction_count,
            "Snapshot created"
        );

        if let Err(e) = self.prune(&name) {
            tracing::warn!(error = %e, "Failed to prune old snapshots");
        }

        Ok(final_dir)
    }

    /// Load the snapshot named by the `latest` pointer
    pub fn load_latest_snapshot(&self) -> io::Result<Option<(SnapshotMetadata, LedgerState)>> {
        let pointer = self.snapshot_dir.join(LATEST_POINTER);
        if !pointer.exists() {
            return Ok(None);
        }
        let name = fs::read_to_string(&pointer)?;
        let dir = self.snapshot_dir.join(name.trim());

        if !dir.join(COMPLETE_MARKER).exists() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete snapshot (missing COMPLETE marker)",
            ));
        }

        let metadata_json = fs::read_to_string(dir.join(METADATA_FILE))?;
        let metadata: SnapshotMetadata = serde_json::from_str(&metadata_json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let state_bytes = fs::read(dir.join(STATE_FILE))?;
        let calculated = calculate_crc64(&state_bytes);
        if calculated != metadata.state_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: expected {}, got {}",
                    metadata.state_checksum, calculated
                ),
            ));
        }

        let state: LedgerState = bincode::deserialize(&state_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Some((metadata, state)))
    }

    fn prune(&self, keep_latest: &str) -> io::Result<()> {
        let mut snapshots: Vec<(SeqNum, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.snapshot_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(seq) = name
                .strip_prefix("snapshot-")
                .and_then(|s| s.parse::<SeqNum>().ok())
            {
                if name != keep_latest {
                    snapshots.push((seq, entry.path()));
                }
            } else if name.starts_with(".tmp-") {
                // Leftover from an interrupted snapshot
                fs::remove_dir_all(entry.path())?;
            }
        }
        snapshots.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in snapshots.into_iter().skip(RETAINED_SNAPSHOTS - 1) {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }
}

fn calculate_crc64(data: &[u8]) -> String {
    use crc::{CRC_64_ECMA_182, Crc};

    const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);
    format!("{:016x}", CRC64.checksum(data))
}
