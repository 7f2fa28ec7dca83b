//! [`CreatorLoader`] — request-scoped, batched creator resolution.
//!
//! Expanding a page of records resolves the creator identity of every
//! item. Issued naively that is one store call per item; this loader
//! coalesces all lookups registered within the same scheduling turn into
//! one `identities_by_ids` call and memoizes the results for the rest of
//! the request.
//!
//! A loader instance belongs to exactly one request. Sharing one across
//! requests would leak resolved identities between authorization
//! contexts, so [`crate::RosterService`] constructs a fresh instance per
//! operation.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex},
};

use muster_core::{
  Error, Result,
  identity::IdentitySummary,
  store::RecordStore,
};
use tokio::sync::Notify;
use uuid::Uuid;

struct LoaderState {
  /// Completed lookups, kept for the lifetime of the request. Missing
  /// identities are memoized as `None`, not dropped.
  resolved:    HashMap<Uuid, Option<IdentitySummary>>,
  /// Keys registered but not yet dispatched.
  pending:     HashSet<Uuid>,
  /// True while a batch is in flight; at most one at a time.
  dispatching: bool,
}

pub struct CreatorLoader<S> {
  store:      Arc<S>,
  state:      Mutex<LoaderState>,
  batch_done: Notify,
}

impl<S> CreatorLoader<S>
where
  S: RecordStore,
  S::Error: Into<Error>,
{
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      state: Mutex::new(LoaderState {
        resolved:    HashMap::new(),
        pending:     HashSet::new(),
        dispatching: false,
      }),
      batch_done: Notify::new(),
    }
  }

  /// Resolve one creator identity. Lookups issued concurrently within
  /// the same scheduling turn share a single store call; repeated keys
  /// reuse the memoized result.
  pub async fn load(&self, id: Uuid) -> Result<Option<IdentitySummary>> {
    {
      let mut state = self.state.lock().unwrap();
      if let Some(hit) = state.resolved.get(&id) {
        return Ok(hit.clone());
      }
      state.pending.insert(id);
    }

    // Suspend once so sibling lookups scheduled in this turn can
    // register their keys before anyone dispatches the batch.
    tokio::task::yield_now().await;

    loop {
      // Create the wakeup future before re-checking state; otherwise a
      // notify between check and await is lost.
      let notified = self.batch_done.notified();

      let batch = {
        let mut state = self.state.lock().unwrap();
        if let Some(hit) = state.resolved.get(&id) {
          return Ok(hit.clone());
        }
        if state.dispatching {
          None
        } else {
          state.dispatching = true;
          Some(state.pending.drain().collect::<Vec<_>>())
        }
      };

      match batch {
        Some(keys) => self.dispatch(keys).await?,
        None => notified.await,
      }
    }
  }

  /// Dispatch any pending keys immediately instead of waiting for a
  /// caller to resume. A no-op while a batch is already in flight or
  /// nothing is pending.
  pub async fn flush(&self) -> Result<()> {
    let batch = {
      let mut state = self.state.lock().unwrap();
      if state.dispatching || state.pending.is_empty() {
        None
      } else {
        state.dispatching = true;
        Some(state.pending.drain().collect::<Vec<_>>())
      }
    };
    match batch {
      Some(keys) => self.dispatch(keys).await,
      None => Ok(()),
    }
  }

  async fn dispatch(&self, keys: Vec<Uuid>) -> Result<()> {
    let fetched = self.store.identities_by_ids(&keys).await;
    let mut state = self.state.lock().unwrap();

    match fetched {
      Ok(identities) => {
        // Every requested key resolves; absentees to an explicit None.
        for key in &keys {
          state.resolved.insert(*key, None);
        }
        for identity in &identities {
          state
            .resolved
            .insert(identity.identity_id, Some(IdentitySummary::from(identity)));
        }
        state.dispatching = false;
        drop(state);
        self.batch_done.notify_waiters();
        Ok(())
      }
      Err(err) => {
        // Re-queue the drained keys so waiters can run their own
        // dispatch; this caller surfaces the failure.
        for key in keys {
          state.pending.insert(key);
        }
        state.dispatching = false;
        drop(state);
        self.batch_done.notify_waiters();
        Err(err.into())
      }
    }
  }
}
