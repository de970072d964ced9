// Review Store
// Write-once, consume-once correlation records

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use tollgate_protocol::{ReviewDecision, ReviewId, ReviewRecord, ReviewStatus};

use crate::error::StateError;

/// Storage for correlation records.
///
/// Records are inserted once and only ever move forward through compare-and-set
/// transitions, so concurrent submitters and resolvers never overwrite each other.
#[async_trait]
pub trait ReviewStore: Send + Sync {
  /// Insert a new record; fails with [`StateError::Duplicate`] if the id is taken.
  async fn insert(&self, record: &ReviewRecord) -> Result<(), StateError>;

  async fn get(&self, id: &ReviewId) -> Result<Option<ReviewRecord>, StateError>;

  /// Records with the given status (all records when `None`), oldest first.
  async fn list(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRecord>, StateError>;

  /// Move `id` from `from` to `to`. Returns `false` when the record is missing or not in
  /// `from`. The stored decision is only replaced when one is supplied.
  async fn transition(
    &self,
    id: &ReviewId,
    from: ReviewStatus,
    to: ReviewStatus,
    decision: Option<&ReviewDecision>,
  ) -> Result<bool, StateError>;
}

/// In-process store; records vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryReviewStore {
  records: RwLock<HashMap<ReviewId, ReviewRecord>>,
}

impl MemoryReviewStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
  async fn insert(&self, record: &ReviewRecord) -> Result<(), StateError> {
    let mut records = self.records.write().await;
    if records.contains_key(&record.id) {
      return Err(StateError::Duplicate(record.id.clone()));
    }
    records.insert(record.id.clone(), record.clone());
    Ok(())
  }

  async fn get(&self, id: &ReviewId) -> Result<Option<ReviewRecord>, StateError> {
    Ok(self.records.read().await.get(id).cloned())
  }

  async fn list(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRecord>, StateError> {
    let records = self.records.read().await;
    let mut matching: Vec<ReviewRecord> = records
      .values()
      .filter(|record| status.is_none_or(|status| record.status == status))
      .cloned()
      .collect();
    matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(matching)
  }

  async fn transition(
    &self,
    id: &ReviewId,
    from: ReviewStatus,
    to: ReviewStatus,
    decision: Option<&ReviewDecision>,
  ) -> Result<bool, StateError> {
    let mut records = self.records.write().await;
    let Some(record) = records.get_mut(id) else {
      return Ok(false);
    };
    if record.status != from {
      return Ok(false);
    }
    record.status = to;
    if let Some(decision) = decision {
      record.decision = Some(decision.clone());
    }
    record.updated_at = Utc::now();
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use tollgate_protocol::{ActionRequest, ReviewPolicy, ReviewRequest, ToolArgs};

  fn record(id: &str) -> ReviewRecord {
    ReviewRecord::pending(
      ReviewId::from(id),
      ReviewRequest::new(
        ActionRequest::new("add", ToolArgs::new()),
        ReviewPolicy::default(),
        "Please review the tool call",
      ),
    )
  }

  #[tokio::test]
  async fn insert_is_write_once() {
    let store = MemoryReviewStore::new();
    store.insert(&record("r1")).await.unwrap();
    let err = store.insert(&record("r1")).await.unwrap_err();
    assert!(matches!(err, StateError::Duplicate(id) if id.as_str() == "r1"));
  }

  #[tokio::test]
  async fn transition_is_compare_and_set() {
    let store = MemoryReviewStore::new();
    let id = ReviewId::from("r1");
    store.insert(&record("r1")).await.unwrap();

    let decision = ReviewDecision::Accept;
    assert!(
      store
        .transition(&id, ReviewStatus::Pending, ReviewStatus::Resolved, Some(&decision))
        .await
        .unwrap()
    );
    // A second resolver loses the race.
    assert!(
      !store
        .transition(&id, ReviewStatus::Pending, ReviewStatus::Resolved, Some(&ReviewDecision::Ignore))
        .await
        .unwrap()
    );
    assert!(
      store
        .transition(&id, ReviewStatus::Resolved, ReviewStatus::Consumed, None)
        .await
        .unwrap()
    );

    let stored = store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReviewStatus::Consumed);
    assert_eq!(stored.decision, Some(ReviewDecision::Accept));
  }

  #[tokio::test]
  async fn transition_on_missing_record_is_false() {
    let store = MemoryReviewStore::new();
    assert!(
      !store
        .transition(
          &ReviewId::from("ghost"),
          ReviewStatus::Pending,
          ReviewStatus::Cancelled,
          None
        )
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn list_filters_by_status() {
    let store = MemoryReviewStore::new();
    store.insert(&record("a")).await.unwrap();
    store.insert(&record("b")).await.unwrap();
    store
      .transition(&ReviewId::from("b"), ReviewStatus::Pending, ReviewStatus::Cancelled, None)
      .await
      .unwrap();

    let pending = store.list(Some(ReviewStatus::Pending)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, ReviewId::from("a"));
    assert_eq!(store.list(None).await.unwrap().len(), 2);
  }
}
