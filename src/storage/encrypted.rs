//! SQLite-backed alert journal with AES-GCM encryption of the alert payload.
//! Key derived from a deployment secret (in production: Secure Enclave / Keystore / DPAPI).

use crate::alerts::{Alert, AlertSink, SinkError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

type StoreResult<T> = Result<T, SinkError>;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, aes_gcm::Error> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| aes_gcm::Error)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher.encrypt((&nonce).into(), plaintext)?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> StoreResult<Vec<u8>> {
    let raw = BASE64.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err("payload too short".into());
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| format!("{:?}", e))?;
    cipher
        .decrypt(nonce.into(), ct)
        .map_err(|_| "alert payload failed to decrypt".into())
}

pub struct AlertJournal {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl AlertJournal {
    /// Open or create the journal at path. Key is derived from `secret`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                kind TEXT NOT NULL,
                src_ip TEXT NOT NULL,
                result_id TEXT NOT NULL,
                payload_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_ts ON alerts(ts);
            CREATE INDEX IF NOT EXISTS idx_alerts_src ON alerts(src_ip, ts);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| "journal lock poisoned".into())
    }

    /// Insert alert (payload stored encrypted; kind and source stay queryable)
    pub fn record(&self, alert: &Alert) -> StoreResult<()> {
        let payload = serde_json::to_string(alert)?;
        let enc = encrypt(&self.key, payload.as_bytes()).map_err(|e| format!("{:?}", e))?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO alerts (id, ts, kind, src_ip, result_id, payload_enc) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                alert.id,
                alert.ts.timestamp_millis(),
                alert.kind.as_str(),
                alert.source.ip,
                alert.result_id,
                enc
            ],
        )?;
        Ok(())
    }

    /// Read alert by id (decrypt payload)
    pub fn get(&self, id: &str) -> StoreResult<Option<Alert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT payload_enc FROM alerts WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => {
                let enc: String = row.get(0)?;
                Ok(Some(self.open_payload(&enc)?))
            }
            None => Ok(None),
        }
    }

    /// Most recent alerts for one source address, newest first.
    pub fn alerts_for_host(&self, src_ip: &str, limit: usize) -> StoreResult<Vec<Alert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT payload_enc FROM alerts WHERE src_ip = ?1 \
             ORDER BY ts DESC, rowid DESC LIMIT ?2",
        )?;
        let encs = stmt
            .query_map(params![src_ip, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        encs.iter().map(|enc| self.open_payload(enc)).collect()
    }

    pub fn count(&self) -> StoreResult<u64> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Retention: delete alerts older than the given epoch milliseconds
    pub fn prune_before(&self, ts_millis: i64) -> StoreResult<u64> {
        let n = self
            .conn()?
            .execute("DELETE FROM alerts WHERE ts < ?1", params![ts_millis])?;
        Ok(n as u64)
    }

    fn open_payload(&self, enc: &str) -> StoreResult<Alert> {
        let plain = decrypt(&self.key, enc)?;
        Ok(serde_json::from_slice(&plain)?)
    }
}

impl AlertSink for AlertJournal {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn emit(&self, alert: &Alert) -> Result<(), SinkError> {
        self.record(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ciphertext_round_trips_and_rejects_wrong_key() {
        let key = derive_key(b"k1");
        let enc = encrypt(&key, b"hello").unwrap();
        assert_eq!(decrypt(&key, &enc).unwrap(), b"hello");
        assert!(decrypt(&derive_key(b"k2"), &enc).is_err());
        assert!(decrypt(&key, "AAAA").is_err());
    }
}
