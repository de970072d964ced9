// Tollgate State Database
// SQLite-backed review store; paused reviews survive process restarts

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use tollgate_protocol::{ReviewDecision, ReviewId, ReviewRecord, ReviewStatus};

use crate::error::StateError;
use crate::store::ReviewStore;

type ReviewRow = (String, String, String, Option<String>, String, String);

const SELECT_COLUMNS: &str = "SELECT id, request, status, decision, created_at, updated_at FROM reviews";

/// State database handle
#[derive(Debug, Clone)]
pub struct ReviewDb {
  pool: SqlitePool,
}

impl ReviewDb {
  /// Open (creating if needed) the database at `path`.
  pub async fn open(path: &Path) -> Result<Self, StateError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| StateError::Database(sqlx::Error::Io(e)))?;
    }
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    debug!(path = %path.display(), "opened review database");
    Self::with_pool(pool).await
  }

  /// Private in-memory database; a single connection so every query sees the same data.
  pub async fn open_in_memory() -> Result<Self, StateError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect_with(options)
      .await?;
    Self::with_pool(pool).await
  }

  async fn with_pool(pool: SqlitePool) -> Result<Self, StateError> {
    // Run migrations
    sqlx::raw_sql(include_str!("schema.sql"))
      .execute(&pool)
      .await?;
    Ok(Self { pool })
  }

  /// Close the database
  pub async fn close(self) {
    self.pool.close().await;
  }
}

#[async_trait]
impl ReviewStore for ReviewDb {
  async fn insert(&self, record: &ReviewRecord) -> Result<(), StateError> {
    let decision = record
      .decision
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let result = sqlx::query(
      "INSERT INTO reviews (id, action, request, status, decision, created_at, updated_at) \
       VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.id.as_str())
    .bind(record.request.action())
    .bind(serde_json::to_string(&record.request)?)
    .bind(record.status.as_str())
    .bind(decision)
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(&self.pool)
    .await;

    match result {
      Ok(_) => Ok(()),
      Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
        Err(StateError::Duplicate(record.id.clone()))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn get(&self, id: &ReviewId) -> Result<Option<ReviewRecord>, StateError> {
    let row: Option<ReviewRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
      .bind(id.as_str())
      .fetch_optional(&self.pool)
      .await?;
    row.map(decode_row).transpose()
  }

  async fn list(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRecord>, StateError> {
    let rows: Vec<ReviewRow> = match status {
      Some(status) => {
        sqlx::query_as(&format!(
          "{SELECT_COLUMNS} WHERE status = ? ORDER BY created_at, id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?
      }
      None => {
        sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY created_at, id"))
          .fetch_all(&self.pool)
          .await?
      }
    };
    rows.into_iter().map(decode_row).collect()
  }

  async fn transition(
    &self,
    id: &ReviewId,
    from: ReviewStatus,
    to: ReviewStatus,
    decision: Option<&ReviewDecision>,
  ) -> Result<bool, StateError> {
    let decision = decision.map(serde_json::to_string).transpose()?;
    let result = sqlx::query(
      "UPDATE reviews SET status = ?, decision = COALESCE(?, decision), updated_at = ? \
       WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(decision)
    .bind(Utc::now().to_rfc3339())
    .bind(id.as_str())
    .bind(from.as_str())
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }
}

fn decode_row(row: ReviewRow) -> Result<ReviewRecord, StateError> {
  let (id, request, status, decision, created_at, updated_at) = row;
  Ok(ReviewRecord {
    request: serde_json::from_str(&request)?,
    status: ReviewStatus::from_str(&status).map_err(StateError::Corrupt)?,
    decision: decision
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?,
    created_at: parse_timestamp(&id, &created_at)?,
    updated_at: parse_timestamp(&id, &updated_at)?,
    id: ReviewId::from(id),
  })
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>, StateError> {
  DateTime::parse_from_rfc3339(value)
    .map(|ts| ts.with_timezone(&Utc))
    .map_err(|e| StateError::Corrupt(format!("review {id}: bad timestamp {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use serde_json::json;
  use tollgate_protocol::{ActionRequest, ReviewPolicy, ReviewRequest, ToolArgs};

  fn record(id: &str) -> ReviewRecord {
    let mut args = ToolArgs::new();
    args.insert("a".to_string(), json!(2));
    args.insert("b".to_string(), json!(3));
    ReviewRecord::pending(
      ReviewId::from(id),
      ReviewRequest::new(
        ActionRequest::new("add", args),
        ReviewPolicy::default(),
        "Please review the tool call",
      ),
    )
  }

  #[tokio::test]
  async fn records_round_trip_through_sqlite() {
    let db = ReviewDb::open_in_memory().await.unwrap();
    let original = record("r1");
    db.insert(&original).await.unwrap();

    let loaded = db.get(&original.id).await.unwrap().unwrap();
    assert_eq!(loaded.request, original.request);
    assert_eq!(loaded.status, ReviewStatus::Pending);
    assert_eq!(loaded.decision, None);
    assert!(db.get(&ReviewId::from("missing")).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn duplicate_insert_is_reported() {
    let db = ReviewDb::open_in_memory().await.unwrap();
    db.insert(&record("r1")).await.unwrap();
    assert!(matches!(
      db.insert(&record("r1")).await,
      Err(StateError::Duplicate(_))
    ));
  }

  #[tokio::test]
  async fn decision_survives_consumption() {
    let db = ReviewDb::open_in_memory().await.unwrap();
    let id = ReviewId::from("r1");
    db.insert(&record("r1")).await.unwrap();

    let decision = ReviewDecision::respond("skip");
    assert!(
      db.transition(&id, ReviewStatus::Pending, ReviewStatus::Resolved, Some(&decision))
        .await
        .unwrap()
    );
    assert!(
      !db
        .transition(&id, ReviewStatus::Pending, ReviewStatus::Cancelled, None)
        .await
        .unwrap()
    );
    assert!(
      db.transition(&id, ReviewStatus::Resolved, ReviewStatus::Consumed, None)
        .await
        .unwrap()
    );

    let stored = db.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReviewStatus::Consumed);
    assert_eq!(stored.decision, Some(decision));
  }

  #[tokio::test]
  async fn unsupported_decision_with_a_known_tag_stays_unsupported() {
    let db = ReviewDb::open_in_memory().await.unwrap();
    let id = ReviewId::from("u1");
    db.insert(&record("u1")).await.unwrap();

    let decision = ReviewDecision::Unsupported {
      kind: "accept".to_string(),
    };
    db.transition(&id, ReviewStatus::Pending, ReviewStatus::Resolved, Some(&decision))
      .await
      .unwrap();

    let stored = db.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.decision, Some(decision));
  }

  #[tokio::test]
  async fn pending_reviews_outlive_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("reviews.db");

    let db = ReviewDb::open(&path).await.unwrap();
    db.insert(&record("r1")).await.unwrap();
    db.insert(&record("r2")).await.unwrap();
    db.transition(&ReviewId::from("r2"), ReviewStatus::Pending, ReviewStatus::Expired, None)
      .await
      .unwrap();
    db.close().await;

    let reopened = ReviewDb::open(&path).await.unwrap();
    let pending = reopened.list(Some(ReviewStatus::Pending)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, ReviewId::from("r1"));
    assert_eq!(reopened.list(None).await.unwrap().len(), 2);
  }
}
