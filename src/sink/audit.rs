//! SQLite audit trail. The full decision is stored AES-GCM encrypted; only the columns needed
//! for retention and lookup stay in clear.

use super::DecisionSink;
use crate::decision::{Action, Decision};
use crate::error::SinkError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(secret: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(digest::digest(&digest::SHA256, secret).as_ref());
    out
}

fn crypto_err(e: impl std::fmt::Debug) -> SinkError {
    SinkError::Crypto(format!("{:?}", e))
}

fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, SinkError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(crypto_err)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher.encrypt((&nonce).into(), plaintext).map_err(crypto_err)?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn open_sealed(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>, SinkError> {
    let raw = BASE64.decode(encoded).map_err(crypto_err)?;
    if raw.len() < NONCE_LEN {
        return Err(SinkError::Crypto("payload too short".into()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(crypto_err)?;
    cipher.decrypt(nonce.into(), ct).map_err(crypto_err)
}

/// A stored row with its decrypted decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub subject_id: String,
    pub action: Action,
    pub decision: Decision,
}

pub struct AuditStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl AuditStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, SinkError> {
        Self::with_connection(Connection::open(path)?, secret)
    }

    pub fn in_memory(secret: &[u8]) -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?, secret)
    }

    fn with_connection(conn: Connection, secret: &[u8]) -> Result<Self, SinkError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                event_id TEXT,
                subject_id TEXT NOT NULL,
                action TEXT NOT NULL,
                final_score REAL NOT NULL,
                payload_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_ts ON decisions(ts);
            CREATE INDEX IF NOT EXISTS idx_decisions_subject ON decisions(subject_id);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    /// Store `decision` stamped `at`; returns the row id.
    pub fn insert(&self, decision: &Decision, at: DateTime<Utc>) -> Result<String, SinkError> {
        let id = Uuid::new_v4().to_string();
        let payload = serde_json::to_vec(decision)?;
        let enc = seal(&self.key, &payload)?;
        self.conn.lock().execute(
            "INSERT INTO decisions (id, ts, event_id, subject_id, action, final_score, payload_enc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                at.timestamp_millis(),
                decision.event_id(),
                decision.subject_id().unwrap_or_default(),
                decision.action.as_str(),
                decision.final_score,
                enc
            ],
        )?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<AuditRecord>, SinkError> {
        let row = self
            .conn
            .lock()
            .query_row(
                "SELECT ts, subject_id, payload_enc FROM decisions WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((ts, subject_id, enc)) = row else {
            return Ok(None);
        };
        let decision: Decision = serde_json::from_slice(&open_sealed(&self.key, &enc)?)?;
        let recorded_at = DateTime::from_timestamp_millis(ts)
            .ok_or_else(|| SinkError::Crypto(format!("corrupt timestamp {ts}")))?;
        Ok(Some(AuditRecord {
            id: id.to_string(),
            recorded_at,
            subject_id,
            action: decision.action,
            decision,
        }))
    }

    /// Row ids for `subject_id`, oldest first.
    pub fn ids_for_subject(&self, subject_id: &str) -> Result<Vec<String>, SinkError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id FROM decisions WHERE subject_id = ?1 ORDER BY ts, rowid")?;
        let ids = stmt
            .query_map(params![subject_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn count(&self) -> Result<u64, SinkError> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Retention: delete rows recorded before `cutoff`.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError> {
        let n = self.conn.lock().execute(
            "DELETE FROM decisions WHERE ts < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(n as u64)
    }
}

impl DecisionSink for AuditStore {
    fn record(&self, decision: &Decision) -> Result<(), SinkError> {
        self.insert(decision, Utc::now()).map(|_| ())
    }
}
