// Review Broker
// In-process review session over a persistent correlation store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tollgate_config::ReviewConfig;
use tollgate_protocol::{
  ReviewDecision, ReviewEvent, ReviewId, ReviewRecord, ReviewRequest, ReviewStatus,
};
use tollgate_state::{MemoryReviewStore, ReviewStore, StateError};

use super::{ReviewError, ReviewSession};
use crate::tools::ToolContext;

const EVENT_CAPACITY: usize = 256;

type Resolution = Result<ReviewDecision, ReviewError>;
type Waiters = Mutex<HashMap<ReviewId, Waiter>>;

/// `seq` tells a registration apart from a later one under the same id.
struct Waiter {
  seq: u64,
  tx: oneshot::Sender<Resolution>,
}

struct BrokerInner {
  store: Arc<dyn ReviewStore>,
  /// Live parked invocations. An entry exists only while its `request` future is alive.
  waiters: Waiters,
  next_seq: AtomicU64,
  events: broadcast::Sender<ReviewEvent>,
}

/// Parks each review request on a oneshot channel keyed by its [`ReviewId`] and records
/// it in a [`ReviewStore`], so the paused state outlives the future that awaits it.
#[derive(Clone)]
pub struct ReviewBroker {
  inner: Arc<BrokerInner>,
  timeout: Option<Duration>,
  watch_interval: Duration,
}

impl ReviewBroker {
  pub fn new(store: Arc<dyn ReviewStore>) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      inner: Arc::new(BrokerInner {
        store,
        waiters: Mutex::new(HashMap::new()),
        next_seq: AtomicU64::new(0),
        events,
      }),
      timeout: None,
      watch_interval: ReviewConfig::default().watch_interval(),
    }
  }

  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryReviewStore::new()))
  }

  /// Broker using `review.timeout_secs` and `review.watch_interval_ms`.
  pub fn from_config(store: Arc<dyn ReviewStore>, config: &ReviewConfig) -> Self {
    Self::new(store)
      .with_timeout(config.timeout())
      .with_watch_interval(config.watch_interval())
  }

  /// Fail parked reviews with [`ReviewError::Expired`] after `timeout`.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// How often [`ReviewBroker::spawn_watch`] polls the store.
  pub fn with_watch_interval(mut self, interval: Duration) -> Self {
    self.watch_interval = interval;
    self
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  pub fn watch_interval(&self) -> Duration {
    self.watch_interval
  }

  pub fn store(&self) -> &Arc<dyn ReviewStore> {
    &self.inner.store
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
    self.inner.events.subscribe()
  }

  /// Reviews still waiting for a decision, oldest first.
  pub async fn pending(&self) -> Result<Vec<ReviewRecord>, ReviewError> {
    Ok(self.inner.store.list(Some(ReviewStatus::Pending)).await?)
  }

  /// Number of invocations currently parked in this process.
  pub fn waiting(&self) -> usize {
    self.waiters().len()
  }

  /// Record `decision` for `id` and wake the invocation parked on it, if any.
  ///
  /// When nothing in this process is waiting, the decision stays in the store and is
  /// returned to the host when it replays the call.
  pub async fn resolve(&self, id: &ReviewId, decision: ReviewDecision) -> Result<(), ReviewError> {
    record_decision(self.inner.store.as_ref(), id, &decision).await?;
    info!(review_id = %id, decision = decision.tag(), "review resolved");
    self.emit(ReviewEvent::Resolved {
      id: id.clone(),
      kind: decision.tag().to_string(),
    });
    if !self.deliver(id, Ok(decision)) {
      debug!(review_id = %id, "no live invocation for review; decision kept for replay");
    }
    Ok(())
  }

  /// Like [`ReviewBroker::resolve`], decoding the decision from review-surface JSON.
  pub async fn resolve_wire(&self, id: &ReviewId, value: Value) -> Result<(), ReviewError> {
    let decision = ReviewDecision::from_value(value)?;
    self.resolve(id, decision).await
  }

  /// Withdraw a pending review; its invocation fails with [`ReviewError::Cancelled`].
  pub async fn cancel(&self, id: &ReviewId) -> Result<(), ReviewError> {
    cancel_review(self.inner.store.as_ref(), id).await?;
    info!(review_id = %id, "review cancelled");
    self.emit(ReviewEvent::Cancelled { id: id.clone() });
    self.deliver(id, Err(ReviewError::Cancelled { id: id.clone() }));
    Ok(())
  }

  /// Deliver decisions and cancellations written to the store by another process to the
  /// invocations parked here. Returns how many were woken.
  pub async fn deliver_resolved(&self) -> Result<usize, ReviewError> {
    let parked: Vec<ReviewId> = self.waiters().keys().cloned().collect();
    let mut delivered = 0;

    for id in parked {
      let Some(record) = self.inner.store.get(&id).await? else {
        continue;
      };
      match (record.status, record.decision) {
        (ReviewStatus::Resolved, Some(decision)) => {
          let kind = decision.tag().to_string();
          if self.deliver(&id, Ok(decision)) {
            self.emit(ReviewEvent::Resolved { id, kind });
            delivered += 1;
          }
        }
        (ReviewStatus::Resolved, None) => {
          warn!(review_id = %id, "resolved review has no decision");
        }
        (ReviewStatus::Cancelled, _) => {
          let err = ReviewError::Cancelled { id: id.clone() };
          if self.deliver(&id, Err(err)) {
            self.emit(ReviewEvent::Cancelled { id });
            delivered += 1;
          }
        }
        _ => {}
      }
    }

    Ok(delivered)
  }

  /// Poll the store every [`ReviewBroker::watch_interval`] until `shutdown` fires.
  pub fn spawn_watch(&self, shutdown: CancellationToken) -> JoinHandle<()> {
    let broker = self.clone();
    let interval = self.watch_interval;
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = shutdown.cancelled() => break,
          _ = ticker.tick() => {
            if broker.waiting() == 0 {
              continue;
            }
            match broker.deliver_resolved().await {
              Ok(0) => {}
              Ok(count) => debug!(count, "delivered out-of-process review decisions"),
              Err(e) => warn!(error = %e, "failed to poll review store"),
            }
          }
        }
      }
      debug!("review watch stopped");
    })
  }

  fn waiters(&self) -> MutexGuard<'_, HashMap<ReviewId, Waiter>> {
    self
      .inner
      .waiters
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Park a waiter for `id`. It stays registered until it is delivered to or the
  /// returned guard is dropped.
  fn register(
    &self,
    id: &ReviewId,
  ) -> Result<(oneshot::Receiver<Resolution>, WaiterGuard<'_>), ReviewError> {
    let mut waiters = self.waiters();
    if waiters.contains_key(id) {
      return Err(ReviewError::DuplicateRequest(id.clone()));
    }
    let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = oneshot::channel();
    waiters.insert(id.clone(), Waiter { seq, tx });
    let guard = WaiterGuard {
      broker: self,
      id: id.clone(),
      seq,
    };
    Ok((rx, guard))
  }

  fn unregister(&self, id: &ReviewId, seq: u64) {
    let mut waiters = self.waiters();
    if waiters.get(id).is_some_and(|waiter| waiter.seq == seq) {
      waiters.remove(id);
    }
  }

  /// Remove and send under one lock, so once `unregister` returns no send is in flight.
  fn deliver(&self, id: &ReviewId, resolution: Resolution) -> bool {
    let mut waiters = self.waiters();
    match waiters.remove(id) {
      Some(waiter) => waiter.tx.send(resolution).is_ok(),
      None => false,
    }
  }

  fn emit(&self, event: ReviewEvent) {
    // No subscribers is fine.
    let _ = self.inner.events.send(event);
  }

  /// Retire a resolved record and hand its decision to the caller. Fails if another
  /// caller already consumed it.
  async fn consume(&self, id: &ReviewId, decision: ReviewDecision) -> Resolution {
    let consumed = self
      .inner
      .store
      .transition(id, ReviewStatus::Resolved, ReviewStatus::Consumed, None)
      .await?;
    if !consumed {
      warn!(review_id = %id, "decision already consumed by another invocation");
      return Err(ReviewError::DuplicateRequest(id.clone()));
    }
    debug!(review_id = %id, decision = decision.tag(), "review decision consumed");
    Ok(decision)
  }

  async fn finish(&self, id: &ReviewId, resolution: Resolution) -> Resolution {
    match resolution {
      Ok(decision) => self.consume(id, decision).await,
      Err(e) => Err(e),
    }
  }

  /// The parked future woke without a decision. A decision that beat the cancellation
  /// or timeout still wins.
  async fn abandon(
    &self,
    guard: &WaiterGuard<'_>,
    mut rx: oneshot::Receiver<Resolution>,
    status: ReviewStatus,
    err: ReviewError,
  ) -> Resolution {
    let id = &guard.id;
    guard.release();
    if let Ok(resolution) = rx.try_recv() {
      return self.finish(id, resolution).await;
    }

    let store = &self.inner.store;
    if store
      .transition(id, ReviewStatus::Pending, status, None)
      .await?
    {
      info!(review_id = %id, %status, "review abandoned");
      self.emit(match status {
        ReviewStatus::Expired => ReviewEvent::Expired { id: id.clone() },
        _ => ReviewEvent::Cancelled { id: id.clone() },
      });
      return Err(err);
    }

    match store.get(id).await? {
      Some(ReviewRecord {
        status: ReviewStatus::Resolved,
        decision: Some(decision),
        ..
      }) => self.consume(id, decision).await,
      _ => Err(err),
    }
  }

  async fn park(
    &self,
    id: &ReviewId,
    mut rx: oneshot::Receiver<Resolution>,
    guard: WaiterGuard<'_>,
    ctx: &ToolContext,
  ) -> Resolution {
    enum Wake {
      Received(Result<Resolution, oneshot::error::RecvError>),
      Cancelled,
      Expired(Duration),
    }

    let timeout = self.timeout;
    let expiry = async move {
      match timeout {
        Some(timeout) => {
          tokio::time::sleep(timeout).await;
          timeout
        }
        None => std::future::pending().await,
      }
    };

    let wake = tokio::select! {
      biased;
      received = &mut rx => Wake::Received(received),
      _ = ctx.cancellation.cancelled() => Wake::Cancelled,
      timeout = expiry => Wake::Expired(timeout),
    };

    match wake {
      Wake::Received(Ok(resolution)) => self.finish(id, resolution).await,
      Wake::Received(Err(_)) => Err(ReviewError::Abandoned(id.clone())),
      Wake::Cancelled => {
        let err = ReviewError::Cancelled { id: id.clone() };
        self.abandon(&guard, rx, ReviewStatus::Cancelled, err).await
      }
      Wake::Expired(timeout) => {
        let err = ReviewError::Expired {
          id: id.clone(),
          timeout,
        };
        self.abandon(&guard, rx, ReviewStatus::Expired, err).await
      }
    }
  }
}

#[async_trait]
impl ReviewSession for ReviewBroker {
  async fn request(
    &self,
    request: ReviewRequest,
    ctx: &ToolContext,
  ) -> Result<ReviewDecision, ReviewError> {
    let id = ctx
      .call_id
      .clone()
      .map(ReviewId::from)
      .unwrap_or_default();
    let store = &self.inner.store;

    let (rx, guard) = match store.get(&id).await? {
      None => {
        // Waiter first: once the record is visible a resolver can always find it.
        let (rx, guard) = self.register(&id)?;
        let record = ReviewRecord::pending(id.clone(), request.clone());
        if let Err(e) = store.insert(&record).await {
          return Err(match e {
            StateError::Duplicate(id) => ReviewError::DuplicateRequest(id),
            e => e.into(),
          });
        }
        info!(review_id = %id, tool = request.action(), "tool call awaiting review");
        self.emit(ReviewEvent::Requested {
          id: id.clone(),
          request,
        });
        (rx, guard)
      }
      Some(record) => match (record.status, record.decision) {
        (ReviewStatus::Resolved, Some(decision)) => {
          info!(review_id = %id, "replaying recorded review decision");
          return self.consume(&id, decision).await;
        }
        (ReviewStatus::Pending, _) => {
          let (rx, guard) = self.register(&id)?;
          // A resolver may have run between the read above and registering.
          if let Some(ReviewRecord {
            status: ReviewStatus::Resolved,
            decision: Some(decision),
            ..
          }) = store.get(&id).await?
          {
            drop(guard);
            return self.consume(&id, decision).await;
          }
          info!(review_id = %id, "re-attached to pending review");
          (rx, guard)
        }
        (status, _) => return Err(ReviewError::Retired { id, status }),
      },
    };

    self.park(&id, rx, guard, ctx).await
  }
}

/// Removes its waiter when the request future ends or is dropped, whether or not the
/// record was written. A written record stays pending.
struct WaiterGuard<'a> {
  broker: &'a ReviewBroker,
  id: ReviewId,
  seq: u64,
}

impl WaiterGuard<'_> {
  fn release(&self) {
    self.broker.unregister(&self.id, self.seq);
  }
}

impl Drop for WaiterGuard<'_> {
  fn drop(&mut self) {
    self.release();
  }
}

/// `Pending -> Resolved` with `decision`, reporting why when the record cannot take it.
pub async fn record_decision(
  store: &dyn ReviewStore,
  id: &ReviewId,
  decision: &ReviewDecision,
) -> Result<(), ReviewError> {
  if store
    .transition(id, ReviewStatus::Pending, ReviewStatus::Resolved, Some(decision))
    .await?
  {
    return Ok(());
  }
  Err(not_pending(store, id).await)
}

/// `Pending -> Cancelled`.
pub async fn cancel_review(store: &dyn ReviewStore, id: &ReviewId) -> Result<(), ReviewError> {
  if store
    .transition(id, ReviewStatus::Pending, ReviewStatus::Cancelled, None)
    .await?
  {
    return Ok(());
  }
  Err(not_pending(store, id).await)
}

async fn not_pending(store: &dyn ReviewStore, id: &ReviewId) -> ReviewError {
  match store.get(id).await {
    Ok(Some(record)) => ReviewError::AlreadyResolved {
      id: id.clone(),
      status: record.status,
    },
    Ok(None) => ReviewError::UnknownReview(id.clone()),
    Err(e) => e.into(),
  }
}
