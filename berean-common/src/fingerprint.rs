//! Content fingerprint derivation
//!
//! Engagement records are identified by a deterministic hash of their
//! normalized content rather than a random id, so re-deriving the same
//! record from the same content (re-sync, re-import, re-generation)
//! always lands on the same row instead of creating a duplicate.

use sha2::{Digest, Sha256};

/// Fixed length of the returned hex prefix.
///
/// 16 hex characters = 64 bits of the SHA-256 digest. Collisions are only
/// possible within one (scope, type) pair, where record counts stay far
/// below the birthday bound for 64 bits.
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Field separator in the pre-hash concatenation
const SEPARATOR: char = '|';

/// Normalize one content field: trim surrounding whitespace, case-fold
fn normalize_field(field: &str) -> String {
    field.trim().to_lowercase()
}

/// Derive a deterministic content fingerprint.
///
/// The fingerprint is a function of the scope id (typically the owning
/// sermon or user-sermon pair), a record type discriminator, and the
/// normalized content fields, in order. Identical normalized inputs always
/// yield identical output; differences in case or surrounding whitespace
/// do not change the result.
pub fn fingerprint(scope_id: &str, record_type: &str, fields: &[&str]) -> String {
    let mut input = String::new();
    input.push_str(scope_id);
    input.push(SEPARATOR);
    input.push_str(record_type);
    for field in fields {
        input.push(SEPARATOR);
        input.push_str(&normalize_field(field));
    }

    let digest = Sha256::digest(input.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..FINGERPRINT_HEX_LEN].to_string()
}
