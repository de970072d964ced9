use tollgate_protocol::ReviewId;

/// Correlation store failures.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
  #[error("failed to encode review record: {0}")]
  Serde(#[from] serde_json::Error),
  #[error("corrupt review record: {0}")]
  Corrupt(String),
  #[error("review {0} already exists")]
  Duplicate(ReviewId),
}
