//! Records of purchase orders the core service refused.
//!
//! Records are kept indefinitely. Redis layout: one hash per record at
//! `errorRecord:<id>` (fields `id`, `code`, `message`) plus the set
//! `errorRecord` indexing every id; both are written in one MULTI/EXEC.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const INDEX_KEY: &str = "errorRecord";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: String,
    pub code: i16,
    pub message: String,
}

impl ErrorRecord {
    /// A new record with a fresh time-ordered id.
    pub fn new(code: i16, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorRecordStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("error record store lock poisoned")]
    Poisoned,
}

#[async_trait]
pub trait ErrorRecordStore: Send + Sync {
    async fn save(&self, record: &ErrorRecord) -> Result<(), ErrorRecordStoreError>;

    /// Every record, oldest first.
    async fn all(&self) -> Result<Vec<ErrorRecord>, ErrorRecordStoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryErrorRecordStore {
    records: Mutex<Vec<ErrorRecord>>,
}

impl InMemoryErrorRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ErrorRecordStore for InMemoryErrorRecordStore {
    async fn save(&self, record: &ErrorRecord) -> Result<(), ErrorRecordStoreError> {
        self.records
            .lock()
            .map_err(|_| ErrorRecordStoreError::Poisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<ErrorRecord>, ErrorRecordStoreError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| ErrorRecordStoreError::Poisoned)?
            .clone())
    }
}

/// Redis-backed store. The connection manager reconnects on its own, so one
/// handle is shared by all requests.
#[derive(Clone)]
pub struct RedisErrorRecordStore {
    conn: ConnectionManager,
}

impl RedisErrorRecordStore {
    pub async fn connect(redis_url: &str) -> Result<Self, ErrorRecordStoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to redis error record store");
        Ok(Self { conn })
    }
}

fn record_key(id: &str) -> String {
    format!("{INDEX_KEY}:{id}")
}

#[async_trait]
impl ErrorRecordStore for RedisErrorRecordStore {
    #[instrument(skip(self, record), fields(record_id = %record.id, code = record.code), err)]
    async fn save(&self, record: &ErrorRecord) -> Result<(), ErrorRecordStoreError> {
        let mut conn = self.conn.clone();
        let fields = [
            ("id", record.id.clone()),
            ("code", record.code.to_string()),
            ("message", record.message.clone()),
        ];
        redis::pipe()
            .atomic()
            .hset_multiple(record_key(&record.id), &fields)
            .ignore()
            .sadd(INDEX_KEY, &record.id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<ErrorRecord>, ErrorRecordStoreError> {
        let mut conn = self.conn.clone();
        let mut ids: Vec<String> = conn.smembers(INDEX_KEY).await?;
        ids.sort();

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let fields: HashMap<String, String> = conn.hgetall(record_key(&id)).await?;
            match decode_record(&id, &fields) {
                Some(record) => out.push(record),
                None => warn!(record_id = %id, "skipping incomplete error record"),
            }
        }
        Ok(out)
    }
}

fn decode_record(id: &str, fields: &HashMap<String, String>) -> Option<ErrorRecord> {
    let code = fields.get("code")?.parse().ok()?;
    let message = fields.get("message")?.clone();
    Some(ErrorRecord {
        id: id.to_string(),
        code,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_keeps_insertion_order() {
        let store = InMemoryErrorRecordStore::new();
        let first = ErrorRecord::new(402, "Payment Required.");
        let second = ErrorRecord::new(404, "No package found with this id: 9");
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        assert_eq!(store.all().await.unwrap(), vec![first, second]);
    }

    #[test]
    fn record_serializes_with_wire_names() {
        let record = ErrorRecord::new(403, "closed");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code"], 403);
        assert_eq!(json["message"], "closed");
        assert_eq!(json["id"], record.id.as_str());
    }

    #[test]
    fn hash_fields_decode_into_a_record() {
        let fields = HashMap::from([
            ("id".to_string(), "abc".to_string()),
            ("code".to_string(), "402".to_string()),
            ("message".to_string(), "low".to_string()),
        ]);
        let record = decode_record("abc", &fields).unwrap();
        assert_eq!(record.code, 402);
        assert_eq!(record_key(&record.id), "errorRecord:abc");

        let partial = HashMap::from([("code".to_string(), "x".to_string())]);
        assert!(decode_record("abc", &partial).is_none());
    }
}
