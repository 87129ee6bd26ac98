//! Binary WAL format
//!
//! - 20-byte naturally aligned header
//! - CRC32 checksum for integrity
//! - bincode serialization for payloads
//!
//! # Header Layout (20 bytes, little endian)
//!
//! ```text
//! ┌────────────┬───────────┬────────────────────────────────────┐
//! │ payload_len│ 4 bytes   │ Payload size                       │
//! │ entry_type │ 1 byte    │ Record kind (AccountCreated/...)   │
//! │ version    │ 1 byte    │ Payload format version (0-255)     │
//! │ reserved   │ 2 bytes   │ Zero                               │
//! │ seq_id     │ 8 bytes   │ Monotonic sequence                 │
//! │ checksum   │ 4 bytes   │ CRC32 of payload                   │
//! └────────────┴───────────┴────────────────────────────────────┘
//! ```

use crc32fast::Hasher;
use std::io::{self, Read, Write};

use crate::core_types::SeqNum;

// ============================================================
// CONSTANTS
// ============================================================

/// WAL Header size in bytes
pub const WAL_HEADER_SIZE: usize = 20;

/// Current payload format version
pub const WAL_FORMAT_VERSION: u8 = 1;

/// Upper bound for a single payload; larger lengths mean a corrupt header
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

// ============================================================
// WAL HEADER (20 bytes)
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalHeader {
    pub payload_len: u32,
    pub entry_type: u8,
    pub version: u8,
    pub seq_id: SeqNum,
    pub checksum: u32,
}

impl WalHeader {
    /// Create a new header with CRC32 checksum calculated from payload
    pub fn new(entry_type: WalEntryType, seq_id: SeqNum, payload: &[u8]) -> io::Result<Self> {
        let payload_len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_PAYLOAD_LEN)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("WAL payload too large: {} bytes", payload.len()),
                )
            })?;
        Ok(Self {
            payload_len,
            entry_type: entry_type as u8,
            version: WAL_FORMAT_VERSION,
            seq_id,
            checksum: crc32_checksum(payload),
        })
    }

    pub fn to_bytes(&self) -> [u8; WAL_HEADER_SIZE] {
        let mut buf = [0u8; WAL_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[4] = self.entry_type;
        buf[5] = self.version;
        // buf[6..8] reserved
        buf[8..16].copy_from_slice(&self.seq_id.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; WAL_HEADER_SIZE]) -> Self {
        Self {
            payload_len: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            entry_type: buf[4],
            version: buf[5],
            seq_id: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
            checksum: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        }
    }

    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.checksum == crc32_checksum(payload)
    }
}

// ============================================================
// ENTRY TYPES
// ============================================================

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalEntryType {
    AccountCreated = 1,
    AccountStatus = 2,
    BalanceAdjusted = 3,
    TransactionAppended = 4,
    TransactionStatus = 5,
    FundsMoved = 6,
}

impl TryFrom<u8> for WalEntryType {
    type Error = io::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::AccountCreated),
            2 => Ok(Self::AccountStatus),
            3 => Ok(Self::BalanceAdjusted),
            4 => Ok(Self::TransactionAppended),
            5 => Ok(Self::TransactionStatus),
            6 => Ok(Self::FundsMoved),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown WalEntryType: {}", value),
            )),
        }
    }
}

/// Calculate CRC32 checksum of data
#[inline]
pub fn crc32_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

// ============================================================
// WAL WRITER
// ============================================================

pub struct WalWriter<W: Write> {
    writer: W,
    next_seq: SeqNum,
}

impl<W: Write> WalWriter<W> {
    pub fn new(writer: W, start_seq: SeqNum) -> Self {
        Self {
            writer,
            next_seq: start_seq,
        }
    }

    /// Write one entry as a single buffer. The sequence only advances when
    /// the write succeeds.
    pub fn write_entry(&mut self, entry_type: WalEntryType, payload: &[u8]) -> io::Result<SeqNum> {
        let seq_id = self.next_seq;
        let header = WalHeader::new(entry_type, seq_id, payload)?;

        let mut frame = Vec::with_capacity(WAL_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(payload);
        self.writer.write_all(&frame)?;

        self.next_seq += 1;
        Ok(seq_id)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn next_seq(&self) -> SeqNum {
        self.next_seq
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

// ============================================================
// WAL READER
// ============================================================

pub struct WalReader<R: Read> {
    reader: R,
}

/// A single WAL entry (header + payload)
#[derive(Debug)]
pub struct WalEntry {
    pub header: WalHeader,
    pub payload: Vec<u8>,
}

impl<R: Read> WalReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the next entry, returns None at EOF.
    ///
    /// A truncated payload surfaces as `UnexpectedEof`, a checksum mismatch or
    /// implausible header as `InvalidData`.
    pub fn read_entry(&mut self) -> io::Result<Option<WalEntry>> {
        let mut header_buf = [0u8; WAL_HEADER_SIZE];
        match self.reader.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let header = WalHeader::from_bytes(&header_buf);
        if header.payload_len > MAX_PAYLOAD_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Implausible payload length {} at seq_id={}",
                    header.payload_len, header.seq_id
                ),
            ));
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        self.reader.read_exact(&mut payload)?;

        if !header.verify_checksum(&payload) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "CRC32 checksum mismatch at seq_id={}, expected={}, got={}",
                    header.seq_id,
                    header.checksum,
                    crc32_checksum(&payload)
                ),
            ));
        }

        Ok(Some(WalEntry { header, payload }))
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = WalHeader::new(WalEntryType::FundsMoved, 42, b"payload").unwrap();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), WAL_HEADER_SIZE);
        assert_eq!(&bytes[0..4], &7u32.to_le_bytes());
        assert_eq!(bytes[4], WalEntryType::FundsMoved as u8);
        assert_eq!(bytes[5], WAL_FORMAT_VERSION);
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(WalHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn test_write_then_read_entries() {
        let mut writer = WalWriter::new(Vec::new(), 1);
        assert_eq!(writer.write_entry(WalEntryType::AccountCreated, b"a").unwrap(), 1);
        assert_eq!(writer.write_entry(WalEntryType::FundsMoved, b"bb").unwrap(), 2);
        assert_eq!(writer.next_seq(), 3);

        let mut reader = WalReader::new(Cursor::new(writer.get_ref().clone()));
        let first = reader.read_entry().unwrap().unwrap();
        assert_eq!(first.header.seq_id, 1);
        assert_eq!(first.payload, b"a");
        let second = reader.read_entry().unwrap().unwrap();
        assert_eq!(
            WalEntryType::try_from(second.header.entry_type).unwrap(),
            WalEntryType::FundsMoved
        );
        assert!(reader.read_entry().unwrap().is_none());
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut writer = WalWriter::new(Vec::new(), 1);
        writer.write_entry(WalEntryType::AccountStatus, b"data").unwrap();
        let mut bytes = writer.get_ref().clone();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let err = WalReader::new(Cursor::new(bytes)).read_entry().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_payload_detected() {
        let mut writer = WalWriter::new(Vec::new(), 1);
        writer.write_entry(WalEntryType::AccountStatus, b"data").unwrap();
        let mut bytes = writer.get_ref().clone();
        bytes.truncate(bytes.len() - 2);

        let err = WalReader::new(Cursor::new(bytes)).read_entry().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_unknown_entry_type() {
        assert!(WalEntryType::try_from(0).is_err());
        assert!(WalEntryType::try_from(99).is_err());
    }
}
