//! Log entry codec
//!
//! # Record Format
//!
//! ```text
//! +-------------+------------+-----------+--------------+--------------+----------+-------------+
//! | size (u32)  | crc (u32)  | txn (u64) | commit (u64) | n_cmds (u32) | commands | size (u32)  |
//! +-------------+------------+-----------+--------------+--------------+----------+-------------+
//! ```
//!
//! All integers are little-endian. `size` is the length of the whole record
//! and is repeated as a footer so files can be walked from the end. The CRC
//! covers `txn` through the last command.

use serde::Serialize;

use super::checksum::{compute_checksum, verify_checksum};
use super::codec::{DecodeError, Decoder, Encoder, WalCodec};
use super::command::Command;
use super::errors::{WalError, WalResult};

/// Size prefix plus checksum
pub const ENTRY_HEADER_SIZE: usize = 8;

/// Trailing copy of the size prefix
pub const ENTRY_FOOTER_SIZE: usize = 4;

/// Header, txn id, commit ts, empty command vector and footer
pub const MIN_ENTRY_SIZE: usize = ENTRY_HEADER_SIZE + 8 + 8 + 4 + ENTRY_FOOTER_SIZE;

/// Upper bound accepted when decoding, so a corrupt size prefix cannot
/// request an absurd read.
pub const MAX_ENTRY_SIZE: usize = 1 << 30;

/// The durable record of one committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub txn_id: u64,
    pub commit_ts: u64,
    pub commands: Vec<Command>,
}

impl LogEntry {
    pub fn new(txn_id: u64, commit_ts: u64, commands: Vec<Command>) -> Self {
        Self {
            txn_id,
            commit_ts,
            commands,
        }
    }

    /// Read-only transactions produce entries with no commands; they are
    /// never written.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Exact serialized length of this entry
    pub fn size_in_bytes(&self) -> usize {
        ENTRY_HEADER_SIZE + 8 + 8 + self.commands.encoded_size() + ENTRY_FOOTER_SIZE
    }

    /// Appends the record to `buf` and returns the number of bytes produced.
    pub fn write_to(&self, buf: &mut Vec<u8>) -> usize {
        let start = buf.len();
        buf.extend_from_slice(&[0u8; ENTRY_HEADER_SIZE]);

        let body_start = buf.len();
        {
            let mut enc = Encoder::new(buf);
            enc.put_u64(self.txn_id);
            enc.put_u64(self.commit_ts);
            self.commands.encode(&mut enc);
        }
        let body_end = buf.len();

        let total = body_end - start + ENTRY_FOOTER_SIZE;
        let crc = compute_checksum(&buf[body_start..body_end]);
        buf[start..start + 4].copy_from_slice(&(total as u32).to_le_bytes());
        buf[start + 4..start + 8].copy_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&(total as u32).to_le_bytes());

        total
    }

    /// Serializes the entry, failing fatally if the bytes produced differ
    /// from [`size_in_bytes`](Self::size_in_bytes) or exceed
    /// [`MAX_ENTRY_SIZE`].
    pub fn serialize(&self) -> WalResult<Vec<u8>> {
        self.serialize_within(MAX_ENTRY_SIZE)
    }

    pub(crate) fn serialize_within(&self, max_size: usize) -> WalResult<Vec<u8>> {
        let expected = self.size_in_bytes();
        // readers reject anything larger, and the size prefix is a u32
        if expected > max_size {
            return Err(WalError::entry_too_large(expected, max_size));
        }
        let mut buf = Vec::with_capacity(expected);
        let actual = self.write_to(&mut buf);
        if actual != expected || buf.len() != expected {
            return Err(WalError::size_mismatch(expected, actual));
        }
        Ok(buf)
    }

    /// Decodes one record from the front of `bytes`.
    ///
    /// Returns the entry and the number of bytes it occupied.
    pub fn read(bytes: &[u8]) -> Result<(LogEntry, usize), DecodeError> {
        let size = read_size_prefix(bytes)?;
        if bytes.len() < size {
            return Err(DecodeError::Insufficient {
                needed: size,
                available: bytes.len(),
            });
        }

        let record = &bytes[..size];
        let footer = u32::from_le_bytes(copy4(&record[size - ENTRY_FOOTER_SIZE..])) as usize;
        if footer != size {
            return Err(DecodeError::malformed(format!(
                "size footer {} does not match size prefix {}",
                footer, size
            )));
        }

        let crc = u32::from_le_bytes(copy4(&record[4..8]));
        let body = &record[ENTRY_HEADER_SIZE..size - ENTRY_FOOTER_SIZE];
        if !verify_checksum(body, crc) {
            return Err(DecodeError::malformed("checksum mismatch"));
        }

        // The record length is known, so running short inside the body is
        // corruption rather than a torn write.
        let mut dec = Decoder::new(body);
        let entry = Self::decode_body(&mut dec).map_err(|e| match e {
            DecodeError::Insufficient { .. } => {
                DecodeError::malformed(format!("record body truncated: {}", e))
            }
            other => other,
        })?;
        if dec.remaining() != 0 {
            return Err(DecodeError::malformed(format!(
                "{} unread bytes after last command",
                dec.remaining()
            )));
        }
        Ok((entry, size))
    }

    fn decode_body(dec: &mut Decoder<'_>) -> Result<LogEntry, DecodeError> {
        let txn_id = dec.get_u64()?;
        let commit_ts = dec.get_u64()?;
        let commands = Vec::<Command>::decode(dec)?;
        Ok(LogEntry {
            txn_id,
            commit_ts,
            commands,
        })
    }

    /// `max_commit_ts` of the first checkpoint command in this entry
    pub fn checkpoint_ts(&self) -> Option<u64> {
        self.commands.iter().find_map(Command::checkpoint_ts)
    }
}

/// Reads and sanity-checks the leading size field of a record.
pub fn read_size_prefix(bytes: &[u8]) -> Result<usize, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::Insufficient {
            needed: 4,
            available: bytes.len(),
        });
    }
    validate_size(u32::from_le_bytes(copy4(&bytes[..4])) as usize)
}

/// Rejects sizes no well-formed record can have.
pub fn validate_size(size: usize) -> Result<usize, DecodeError> {
    if !(MIN_ENTRY_SIZE..=MAX_ENTRY_SIZE).contains(&size) {
        return Err(DecodeError::malformed(format!(
            "record size {} outside [{}, {}]",
            size, MIN_ENTRY_SIZE, MAX_ENTRY_SIZE
        )));
    }
    Ok(size)
}

fn copy4(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&bytes[..4]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::command::tests::every_command;

    fn sample() -> LogEntry {
        LogEntry::new(
            12,
            40,
            vec![Command::DropTable {
                db_name: "db1".into(),
                table_name: "t1".into(),
            }],
        )
    }

    #[test]
    fn test_round_trip_all_commands() {
        let entry = LogEntry::new(1, 2, every_command());
        let bytes = entry.serialize().unwrap();
        assert_eq!(bytes.len(), entry.size_in_bytes());
        let (decoded, used) = LogEntry::read(&bytes).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn test_empty_command_list_round_trips() {
        let entry = LogEntry::new(5, 9, vec![]);
        let bytes = entry.serialize().unwrap();
        assert_eq!(bytes.len(), MIN_ENTRY_SIZE);
        assert!(entry.is_empty());
        assert_eq!(LogEntry::read(&bytes).unwrap().0, entry);
    }

    #[test]
    fn test_oversized_entry_is_refused() {
        let entry = sample();
        let size = entry.size_in_bytes();
        assert_eq!(entry.serialize_within(size).unwrap().len(), size);

        let err = entry.serialize_within(size - 1).unwrap_err();
        assert_eq!(err.code(), crate::wal::WalErrorCode::AeroWalEntryTooLarge);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_truncated_record_is_insufficient() {
        let bytes = sample().serialize().unwrap();
        for cut in [0, 3, 8, bytes.len() - 1] {
            let err = LogEntry::read(&bytes[..cut]).unwrap_err();
            assert!(err.is_insufficient(), "cut at {} gave {:?}", cut, err);
        }
    }

    #[test]
    fn test_flipped_body_byte_is_malformed() {
        let mut bytes = sample().serialize().unwrap();
        bytes[ENTRY_HEADER_SIZE + 3] ^= 0xff;
        assert!(matches!(
            LogEntry::read(&bytes),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_footer_mismatch_is_malformed() {
        let mut bytes = sample().serialize().unwrap();
        let n = bytes.len();
        bytes[n - 1] = 0x7f;
        assert!(matches!(
            LogEntry::read(&bytes),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_read_consumes_only_first_record() {
        let first = sample();
        let second = LogEntry::new(13, 41, vec![]);
        let mut buf = Vec::new();
        first.write_to(&mut buf);
        second.write_to(&mut buf);
        let (decoded, used) = LogEntry::read(&buf).unwrap();
        assert_eq!(decoded, first);
        assert_eq!(LogEntry::read(&buf[used..]).unwrap().0, second);
    }

    #[test]
    fn test_checkpoint_ts() {
        let entry = LogEntry::new(
            3,
            9,
            vec![Command::Checkpoint {
                max_commit_ts: 7,
                catalog_path: "catalog".into(),
            }],
        );
        assert_eq!(entry.checkpoint_ts(), Some(7));
        assert_eq!(sample().checkpoint_ts(), None);
    }
}
