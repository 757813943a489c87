//! CRC32 over the body of a log entry
//!
//! The body is everything between the checksum field and the trailing size
//! footer: transaction id, commit timestamp, command count and commands.

use crc32fast::Hasher;

/// Computes the CRC32 (IEEE) of an entry body
pub fn compute_checksum(body: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(body);
    hasher.finalize()
}

pub fn verify_checksum(body: &[u8], expected: u32) -> bool {
    compute_checksum(body) == expected
}
