//! Integration tests for `ChatDbSource` against a real on-disk SQLite
//! fixture shaped like the Messages.app store.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use imessage_relay::source::{ChatDbSource, MessageSource, to_apple_ns};

/// Convert `Option<&str>` to a libsql Value (NULL when absent).
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    conn: libsql::Connection,
    path: std::path::PathBuf,
}

impl Fixture {
    /// A fresh chat.db with the subset of the schema the source reads.
    async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chat.db");

        let db = libsql::Builder::new_local(&path).build().await?;
        let conn = db.connect()?;
        conn.execute(
            "CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT NOT NULL)",
            (),
        )
        .await?;
        conn.execute(
            "CREATE TABLE message (
                ROWID INTEGER PRIMARY KEY,
                text TEXT,
                date INTEGER NOT NULL,
                is_from_me INTEGER NOT NULL,
                handle_id INTEGER NOT NULL
            )",
            (),
        )
        .await?;

        Ok(Self {
            _dir: dir,
            conn,
            path,
        })
    }

    async fn insert_handle(&self, rowid: i64, identity: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO handle (ROWID, id) VALUES (?1, ?2)",
                libsql::params![rowid, identity],
            )
            .await?;
        Ok(())
    }

    async fn insert_message(
        &self,
        rowid: i64,
        text: Option<&str>,
        date: DateTime<Utc>,
        is_from_me: i64,
        handle_id: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO message (ROWID, text, date, is_from_me, handle_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![rowid, opt_text(text), to_apple_ns(date), is_from_me, handle_id],
            )
            .await?;
        Ok(())
    }

    async fn source(&self, fetch_limit: u32) -> Result<ChatDbSource> {
        Ok(ChatDbSource::open(&self.path, fetch_limit).await?)
    }
}

#[tokio::test]
async fn maps_row_columns_onto_inbound_message() -> Result<()> {
    let fx = Fixture::new().await?;
    let now = Utc::now();

    fx.insert_handle(1, "+15551234567").await?;
    fx.insert_message(101, Some("hello there"), now, 0, 1).await?;

    let source = fx.source(20).await?;
    let messages = source.fetch_recent(now - Duration::seconds(300)).await?;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, 101);
    assert_eq!(messages[0].sender, "+15551234567");
    assert_eq!(messages[0].body, "hello there");
    assert_eq!(messages[0].timestamp, now);
    Ok(())
}

#[tokio::test]
async fn excludes_messages_from_the_bot_itself() -> Result<()> {
    let fx = Fixture::new().await?;
    let now = Utc::now();

    fx.insert_handle(1, "+15551234567").await?;
    fx.insert_message(101, Some("inbound"), now, 0, 1).await?;
    fx.insert_message(102, Some("our own reply"), now, 1, 1).await?;

    let source = fx.source(20).await?;
    let messages = source.fetch_recent(now - Duration::seconds(300)).await?;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "inbound");
    Ok(())
}

#[tokio::test]
async fn excludes_null_and_empty_bodies() -> Result<()> {
    let fx = Fixture::new().await?;
    let now = Utc::now();

    fx.insert_handle(1, "+15551234567").await?;
    fx.insert_message(101, None, now, 0, 1).await?;
    fx.insert_message(102, Some(""), now, 0, 1).await?;
    fx.insert_message(103, Some("real text"), now, 0, 1).await?;

    let source = fx.source(20).await?;
    let messages = source.fetch_recent(now - Duration::seconds(300)).await?;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, 103);
    Ok(())
}

#[tokio::test]
async fn watermark_is_an_exclusive_lower_bound() -> Result<()> {
    let fx = Fixture::new().await?;
    let since = Utc::now();

    fx.insert_handle(1, "+15551234567").await?;
    fx.insert_message(101, Some("at the watermark"), since, 0, 1).await?;
    fx.insert_message(102, Some("after it"), since + Duration::seconds(1), 0, 1)
        .await?;

    let source = fx.source(20).await?;
    let messages = source.fetch_recent(since).await?;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, 102);
    Ok(())
}

#[tokio::test]
async fn result_is_capped_to_the_newest_rows() -> Result<()> {
    let fx = Fixture::new().await?;
    let base = Utc::now();

    fx.insert_handle(1, "+15551234567").await?;
    for i in 0..25 {
        fx.insert_message(
            100 + i,
            Some(&format!("msg {i}")),
            base + Duration::seconds(i),
            0,
            1,
        )
        .await?;
    }

    let source = fx.source(20).await?;
    let messages = source.fetch_recent(base - Duration::seconds(300)).await?;

    assert_eq!(messages.len(), 20);
    // Newest-first ordering keeps the 20 most recent when the cap bites.
    assert_eq!(messages[0].body, "msg 24");
    assert_eq!(messages[19].body, "msg 5");
    Ok(())
}

#[tokio::test]
async fn messages_without_a_handle_row_are_skipped() -> Result<()> {
    let fx = Fixture::new().await?;
    let now = Utc::now();

    fx.insert_handle(1, "+15551234567").await?;
    fx.insert_message(101, Some("has a sender"), now, 0, 1).await?;
    fx.insert_message(102, Some("orphaned"), now, 0, 99).await?;

    let source = fx.source(20).await?;
    let messages = source.fetch_recent(now - Duration::seconds(300)).await?;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, 101);
    Ok(())
}

#[tokio::test]
async fn opening_a_bogus_path_fails() {
    let result = ChatDbSource::open(std::path::Path::new("/nonexistent/dir/chat.db"), 20).await;
    assert!(result.is_err());
}
