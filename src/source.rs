//! Message source adapter — reads inbound messages from the Messages.app
//! store (`chat.db`).
//!
//! The schema is owned by Messages.app and read here as-is: `message`
//! rows joined to `handle` for the sender identity. `message.date` uses
//! Apple's epoch (nanoseconds since 2001-01-01).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::debug;

use crate::error::SourceError;

/// Seconds between the Unix epoch and Apple's 2001-01-01 reference date.
const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// An inbound message as read from the store. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Store ROWID; unique and monotonic by arrival.
    pub id: i64,
    /// Sender identity (phone number or email, from `handle.id`).
    pub sender: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Read-only query interface over the external message store.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Inbound messages strictly newer than `since`, capped per call.
    ///
    /// Only messages not authored by the bot itself and with non-empty
    /// bodies are returned. Ordering is the adapter's choice; callers
    /// dedup by id and must tolerate either direction.
    async fn fetch_recent(&self, since: DateTime<Utc>) -> Result<Vec<InboundMessage>, SourceError>;
}

/// `MessageSource` backed by the Messages.app chat.db via libSQL.
pub struct ChatDbSource {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
    fetch_limit: u32,
}

impl ChatDbSource {
    /// Open the store. Fails fast on a missing or unopenable path.
    pub async fn open(path: &Path, fetch_limit: u32) -> Result<Self, SourceError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SourceError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let conn = db.connect().map_err(|e| SourceError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), "Message store opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
            fetch_limit,
        })
    }
}

#[async_trait]
impl MessageSource for ChatDbSource {
    async fn fetch_recent(&self, since: DateTime<Utc>) -> Result<Vec<InboundMessage>, SourceError> {
        let mut rows = self
            .conn
            .query(
                "SELECT message.ROWID, message.text, message.date, handle.id
                 FROM message
                 JOIN handle ON message.handle_id = handle.ROWID
                 WHERE message.is_from_me = 0
                   AND message.text IS NOT NULL
                   AND message.text <> ''
                   AND message.date > ?1
                 ORDER BY message.date DESC
                 LIMIT ?2",
                params![to_apple_ns(since), i64::from(self.fetch_limit)],
            )
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?
        {
            let id: i64 = row.get(0).map_err(|e| SourceError::BadRow(e.to_string()))?;
            let body: String = row.get(1).map_err(|e| SourceError::BadRow(e.to_string()))?;
            let date: i64 = row.get(2).map_err(|e| SourceError::BadRow(e.to_string()))?;
            let sender: String = row.get(3).map_err(|e| SourceError::BadRow(e.to_string()))?;

            messages.push(InboundMessage {
                id,
                sender,
                body,
                timestamp: from_apple_ns(date),
            });
        }

        Ok(messages)
    }
}

// ── Apple epoch conversion ──────────────────────────────────────────

/// Convert process time to the store's native epoch (ns since 2001-01-01).
pub fn to_apple_ns(ts: DateTime<Utc>) -> i64 {
    (ts.timestamp() - APPLE_EPOCH_OFFSET_SECS) * 1_000_000_000
        + i64::from(ts.timestamp_subsec_nanos())
}

/// Convert a store timestamp back to process time.
pub fn from_apple_ns(ns: i64) -> DateTime<Utc> {
    let secs = ns.div_euclid(1_000_000_000) + APPLE_EPOCH_OFFSET_SECS;
    let nanos = ns.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
