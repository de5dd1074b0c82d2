//! Append-only, hash-chained audit log.
//!
//! Every completed calculation appends exactly one immutable entry. Entries
//! are linked by SHA-256 over a canonical encoding of
//! `(inputs, outputs, metadata, prev_chain_hash)`:
//!
//! ```text
//! content_hash[n] = sha256(canonical({inputs, metadata, outputs, prev_chain_hash}))
//! chain_hash[n]   = content_hash[n]
//! prev_chain_hash[n] = chain_hash[n-1]        (genesis: 32 zero bytes, hex)
//! ```
//!
//! Any in-place modification of a stored entry breaks verification from
//! that entry onward. Mutation and deletion are refused at the store
//! boundary; the only mutator is `append`.

pub mod canonical;
mod sqlite;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub use canonical::{CanonicalError, canonical_json};
pub use sqlite::SqliteAuditStore;

/// Hash of the chain predecessor for the first entry: 32 zero bytes.
#[must_use]
pub fn genesis_hash() -> String {
    hex::encode([0u8; 32])
}

/// Lowercase hex SHA-256 of a byte string.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Errors raised by the audit store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditError {
    /// Underlying storage failure.
    #[error("audit storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// An attempt to mutate or delete an existing entry.
    #[error("audit entries are immutable: {detail}")]
    Immutable {
        /// What was attempted.
        detail: String,
    },

    /// The payload could not be canonically encoded.
    #[error("audit canonicalization failed: {0}")]
    Canonical(#[from] CanonicalError),

    /// A stored entry could not be decoded.
    #[error("audit entry {seq_id} is corrupt: {detail}")]
    Corrupt {
        /// Sequence id of the offending entry.
        seq_id: u64,
        /// What failed to decode.
        detail: String,
    },
}

/// Payload for a new audit entry; hashes and chain position are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// The calculation this entry records.
    pub calculation_id: Uuid,
    /// Engineer or system that performed the calculation.
    pub performer: String,
    /// Software version that produced the result.
    pub software_version: String,
    /// Calculation method version.
    pub calculation_method_version: String,
    /// Canonicalizable input snapshot. Safety decimals must already be
    /// strings.
    pub inputs: Value,
    /// Canonicalizable output snapshot.
    pub outputs: Value,
}

/// One immutable, chained audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log stream, starting at 1.
    pub seq_id: u64,
    /// Unique entry id.
    pub id: Uuid,
    /// The calculation this entry records.
    pub calculation_id: Uuid,
    /// When the calculation was performed. Strictly increasing per
    /// calculation id.
    pub performed_at: DateTime<Utc>,
    /// Engineer or system that performed the calculation.
    pub performer: String,
    /// SHA-256 of the canonical input snapshot.
    pub input_hash: String,
    /// SHA-256 of the canonical output snapshot.
    pub output_hash: String,
    /// SHA-256 over inputs, outputs, metadata, and the previous chain hash.
    pub content_hash: String,
    /// The chain hash of this entry; equals `content_hash`.
    pub chain_hash: String,
    /// Chain hash of the predecessor entry.
    pub prev_chain_hash: String,
    /// Software version recorded at append time.
    pub software_version: String,
    /// Calculation method version recorded at append time.
    pub calculation_method_version: String,
    /// Input snapshot as stored.
    pub inputs: Value,
    /// Output snapshot as stored.
    pub outputs: Value,
}

/// Result of verifying a chain range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainVerification {
    /// Every entry in the range verified.
    Ok {
        /// Number of entries checked.
        checked: u64,
    },
    /// Verification failed at the named entry; everything after it is
    /// untrustworthy.
    FirstBadAt {
        /// Sequence id of the first offending entry.
        seq_id: u64,
        /// Stored chain hash of that entry.
        chain_hash: String,
    },
}

/// The audit append/read capability handed to the orchestrator.
///
/// The outer process may substitute its own store; `append` must assign
/// `prev_chain_hash` from the current head atomically so that no two
/// appends share a predecessor.
pub trait AuditStore: Send + Sync {
    /// Appends one entry and returns it with hashes and chain position
    /// assigned.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] on storage or canonicalization failure.
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError>;

    /// Current chain head, or the genesis hash for an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] on storage failure.
    fn head(&self) -> Result<String, AuditError>;

    /// Most recent entry for a calculation id, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] on storage failure.
    fn entry_for(&self, calculation_id: Uuid) -> Result<Option<AuditEntry>, AuditError>;

    /// Reads up to `limit` entries with `seq_id >= from_seq`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] on storage failure.
    fn read_from(&self, from_seq: u64, limit: u64) -> Result<Vec<AuditEntry>, AuditError>;

    /// Recomputes content hashes and chain linkage from `from_seq` to the
    /// head.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] on storage failure; a broken chain is a
    /// successful verification with [`ChainVerification::FirstBadAt`].
    fn verify(&self, from_seq: u64) -> Result<ChainVerification, AuditError>;
}

/// Timestamp format used inside hashed metadata: RFC 3339, microseconds,
/// UTC `Z` suffix.
pub(crate) fn format_performed_at(performed_at: DateTime<Utc>) -> String {
    performed_at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Metadata object hashed into the content hash. No timestamp bits exist
/// outside `performed_at`.
fn metadata_value(
    calculation_id: Uuid,
    performed_at: DateTime<Utc>,
    performer: &str,
    software_version: &str,
    calculation_method_version: &str,
) -> Value {
    json!({
        "calculation_id": calculation_id.to_string(),
        "performed_at": format_performed_at(performed_at),
        "performer": performer,
        "software_version": software_version,
        "calculation_method_version": calculation_method_version,
    })
}

/// Computed hash triple for an entry.
#[derive(Debug)]
pub(crate) struct EntryHashes {
    pub input_hash: String,
    pub output_hash: String,
    pub content_hash: String,
}

/// Computes the input, output, and content hashes for an entry.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compute_hashes(
    inputs: &Value,
    outputs: &Value,
    calculation_id: Uuid,
    performed_at: DateTime<Utc>,
    performer: &str,
    software_version: &str,
    calculation_method_version: &str,
    prev_chain_hash: &str,
) -> Result<EntryHashes, CanonicalError> {
    let inputs_canonical = canonical_json(inputs)?;
    let outputs_canonical = canonical_json(outputs)?;

    let envelope = json!({
        "inputs": inputs,
        "metadata": metadata_value(
            calculation_id,
            performed_at,
            performer,
            software_version,
            calculation_method_version,
        ),
        "outputs": outputs,
        "prev_chain_hash": prev_chain_hash,
    });
    let envelope_canonical = canonical_json(&envelope)?;

    Ok(EntryHashes {
        input_hash: sha256_hex(inputs_canonical.as_bytes()),
        output_hash: sha256_hex(outputs_canonical.as_bytes()),
        content_hash: sha256_hex(envelope_canonical.as_bytes()),
    })
}

/// Recomputes the content hash of a stored entry from its stored payloads
/// and metadata.
///
/// # Errors
///
/// Returns [`CanonicalError`] if a stored payload cannot be canonically
/// encoded.
pub fn recompute_content_hash(entry: &AuditEntry) -> Result<String, CanonicalError> {
    let hashes = compute_hashes(
        &entry.inputs,
        &entry.outputs,
        entry.calculation_id,
        entry.performed_at,
        &entry.performer,
        &entry.software_version,
        &entry.calculation_method_version,
        &entry.prev_chain_hash,
    )?;
    Ok(hashes.content_hash)
}

/// Verifies a contiguous batch of entries against an expected predecessor
/// hash. Returns the updated predecessor for the next batch, or the first
/// offending entry.
pub(crate) fn verify_batch(
    entries: &[AuditEntry],
    mut expected_prev: String,
) -> Result<Result<String, ChainVerification>, CanonicalError> {
    for entry in entries {
        let bad = |entry: &AuditEntry| ChainVerification::FirstBadAt {
            seq_id: entry.seq_id,
            chain_hash: entry.chain_hash.clone(),
        };

        if entry.prev_chain_hash != expected_prev {
            return Ok(Err(bad(entry)));
        }
        let recomputed = recompute_content_hash(entry)?;
        if recomputed != entry.content_hash || entry.chain_hash != entry.content_hash {
            return Ok(Err(bad(entry)));
        }
        expected_prev = entry.chain_hash.clone();
    }
    Ok(Ok(expected_prev))
}
