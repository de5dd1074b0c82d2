// SQLite returns i64 for row ids; audit sequence ids are always
// non-negative.
#![allow(clippy::cast_sign_loss)]

//! `SQLite`-backed audit store.
//!
//! WAL mode allows readers to proceed concurrently with appends; appends
//! themselves are serialized on one connection so the chain head is fetched
//! and extended atomically. Immutability is enforced by `BEFORE UPDATE` /
//! `BEFORE DELETE` triggers in the schema, so even a caller holding raw SQL
//! access through this connection cannot rewrite history.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Timelike, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde_json::Value;
use uuid::Uuid;

use super::{
    AuditEntry, AuditError, AuditStore, ChainVerification, NewAuditEntry, canonical_json,
    compute_hashes, format_performed_at, genesis_hash, verify_batch,
};

/// Schema embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Batch size for chain verification reads.
const VERIFY_BATCH: u64 = 500;

/// The append-only `SQLite` audit store.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Opens or creates a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::initialize(conn)
    }

    /// Creates an in-memory store for tests.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, AuditError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, AuditError> {
        let _: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means another append panicked mid-flight; the
        // connection itself holds no partial transaction at that point.
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Strictly-increasing timestamp per calculation id, at microsecond
    /// resolution to match the hashed representation.
    fn next_performed_at(
        conn: &Connection,
        calculation_id: Uuid,
    ) -> Result<DateTime<Utc>, AuditError> {
        let now = Utc::now();
        let micros = now.timestamp_subsec_micros() * 1000;
        let now = now.with_nanosecond(micros).unwrap_or(now);

        let last: Option<String> = conn
            .query_row(
                "SELECT MAX(performed_at) FROM audit_entries WHERE calculation_id = ?1",
                params![calculation_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        if let Some(last) = last {
            let last = DateTime::parse_from_rfc3339(&last)
                .map_err(|e| AuditError::Corrupt {
                    seq_id: 0,
                    detail: format!("unparseable performed_at {last:?}: {e}"),
                })?
                .with_timezone(&Utc);
            if now <= last {
                return Ok(last + Duration::microseconds(1));
            }
        }
        Ok(now)
    }

    fn chain_head(conn: &Connection) -> Result<String, AuditError> {
        let head: Option<String> = conn
            .query_row(
                "SELECT chain_hash FROM audit_entries ORDER BY seq_id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(head.unwrap_or_else(genesis_hash))
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
        Ok(RawEntry {
            seq_id: row.get::<_, i64>(0)? as u64,
            entry_id: row.get(1)?,
            calculation_id: row.get(2)?,
            performed_at: row.get(3)?,
            performer: row.get(4)?,
            input_hash: row.get(5)?,
            output_hash: row.get(6)?,
            content_hash: row.get(7)?,
            chain_hash: row.get(8)?,
            prev_chain_hash: row.get(9)?,
            software_version: row.get(10)?,
            calculation_method_version: row.get(11)?,
            inputs_canonical: row.get(12)?,
            outputs_canonical: row.get(13)?,
        })
    }

    fn map_storage_error(err: rusqlite::Error) -> AuditError {
        if err.to_string().contains("immutable") {
            return AuditError::Immutable {
                detail: err.to_string(),
            };
        }
        AuditError::Storage(err)
    }
}

/// Column-level row image before decoding.
struct RawEntry {
    seq_id: u64,
    entry_id: String,
    calculation_id: String,
    performed_at: String,
    performer: String,
    input_hash: String,
    output_hash: String,
    content_hash: String,
    chain_hash: String,
    prev_chain_hash: String,
    software_version: String,
    calculation_method_version: String,
    inputs_canonical: String,
    outputs_canonical: String,
}

impl RawEntry {
    fn decode(self) -> Result<AuditEntry, AuditError> {
        let corrupt = |detail: String| AuditError::Corrupt {
            seq_id: self.seq_id,
            detail,
        };

        let id = Uuid::parse_str(&self.entry_id)
            .map_err(|e| corrupt(format!("entry id: {e}")))?;
        let calculation_id = Uuid::parse_str(&self.calculation_id)
            .map_err(|e| corrupt(format!("calculation id: {e}")))?;
        let performed_at = DateTime::parse_from_rfc3339(&self.performed_at)
            .map_err(|e| corrupt(format!("performed_at: {e}")))?
            .with_timezone(&Utc);
        let inputs: Value = serde_json::from_str(&self.inputs_canonical)
            .map_err(|e| corrupt(format!("inputs: {e}")))?;
        let outputs: Value = serde_json::from_str(&self.outputs_canonical)
            .map_err(|e| corrupt(format!("outputs: {e}")))?;

        Ok(AuditEntry {
            seq_id: self.seq_id,
            id,
            calculation_id,
            performed_at,
            performer: self.performer,
            input_hash: self.input_hash,
            output_hash: self.output_hash,
            content_hash: self.content_hash,
            chain_hash: self.chain_hash,
            prev_chain_hash: self.prev_chain_hash,
            software_version: self.software_version,
            calculation_method_version: self.calculation_method_version,
            inputs,
            outputs,
        })
    }
}

const SELECT_COLUMNS: &str = "seq_id, entry_id, calculation_id, performed_at, performer, \
     input_hash, output_hash, content_hash, chain_hash, prev_chain_hash, \
     software_version, calculation_method_version, inputs_canonical, outputs_canonical";

impl AuditStore for SqliteAuditStore {
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let prev_chain_hash = Self::chain_head(&tx)?;
        let performed_at = Self::next_performed_at(&tx, entry.calculation_id)?;
        let id = Uuid::new_v4();

        let hashes = compute_hashes(
            &entry.inputs,
            &entry.outputs,
            entry.calculation_id,
            performed_at,
            &entry.performer,
            &entry.software_version,
            &entry.calculation_method_version,
            &prev_chain_hash,
        )?;
        let inputs_canonical = canonical_json(&entry.inputs)?;
        let outputs_canonical = canonical_json(&entry.outputs)?;

        tx.execute(
            "INSERT INTO audit_entries (entry_id, calculation_id, performed_at, performer, \
             input_hash, output_hash, content_hash, chain_hash, prev_chain_hash, \
             software_version, calculation_method_version, inputs_canonical, outputs_canonical) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id.to_string(),
                entry.calculation_id.to_string(),
                format_performed_at(performed_at),
                entry.performer,
                hashes.input_hash,
                hashes.output_hash,
                hashes.content_hash,
                hashes.content_hash,
                prev_chain_hash,
                entry.software_version,
                entry.calculation_method_version,
                inputs_canonical,
                outputs_canonical,
            ],
        )
        .map_err(Self::map_storage_error)?;
        let seq_id = tx.last_insert_rowid() as u64;
        tx.commit()?;

        tracing::debug!(
            seq_id,
            calculation_id = %entry.calculation_id,
            chain_hash = %hashes.content_hash,
            "audit entry appended"
        );

        Ok(AuditEntry {
            seq_id,
            id,
            calculation_id: entry.calculation_id,
            performed_at,
            performer: entry.performer,
            input_hash: hashes.input_hash,
            output_hash: hashes.output_hash,
            content_hash: hashes.content_hash.clone(),
            chain_hash: hashes.content_hash,
            prev_chain_hash,
            software_version: entry.software_version,
            calculation_method_version: entry.calculation_method_version,
            inputs: entry.inputs,
            outputs: entry.outputs,
        })
    }

    fn head(&self) -> Result<String, AuditError> {
        Self::chain_head(&self.lock())
    }

    fn entry_for(&self, calculation_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM audit_entries \
             WHERE calculation_id = ?1 ORDER BY seq_id DESC LIMIT 1"
        ))?;
        let raw = stmt
            .query_row(params![calculation_id.to_string()], Self::row_to_entry)
            .optional()?;
        raw.map(RawEntry::decode).transpose()
    }

    fn read_from(&self, from_seq: u64, limit: u64) -> Result<Vec<AuditEntry>, AuditError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM audit_entries \
             WHERE seq_id >= ?1 ORDER BY seq_id ASC LIMIT ?2"
        ))?;
        let raws = stmt
            .query_map(params![from_seq, limit], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawEntry::decode).collect()
    }

    fn verify(&self, from_seq: u64) -> Result<ChainVerification, AuditError> {
        let from_seq = from_seq.max(1);
        let mut expected_prev = if from_seq == 1 {
            genesis_hash()
        } else {
            match self.read_from(from_seq - 1, 1)? {
                entries if entries.first().map(|e| e.seq_id) == Some(from_seq - 1) => {
                    entries[0].chain_hash.clone()
                },
                _ => genesis_hash(),
            }
        };

        let mut cursor = from_seq;
        let mut checked = 0u64;
        loop {
            let entries = self.read_from(cursor, VERIFY_BATCH)?;
            if entries.is_empty() {
                return Ok(ChainVerification::Ok { checked });
            }
            match verify_batch(&entries, expected_prev)? {
                Ok(next_prev) => {
                    expected_prev = next_prev;
                    checked += entries.len() as u64;
                },
                Err(first_bad) => return Ok(first_bad),
            }
            cursor = entries.last().map_or(cursor, |e| e.seq_id + 1);
        }
    }
}
