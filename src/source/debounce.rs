//! Deferred execution of text searches.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use super::{ProjectBackend, SearchOutcome, SearchTicket};

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Runs the latest search once no newer one arrived for `delay`. Finished searches are posted
/// on the outcome channel.
///
/// Scheduling aborts the previously pending search, whether it is still waiting or already
/// talking to the backend. Dropping the debouncer aborts the pending search.
pub struct SearchDebouncer {
  backend: Arc<dyn ProjectBackend>,
  delay: Duration,
  sender: UnboundedSender<SearchOutcome>,
  pending: Option<JoinHandle<()>>,
}

impl SearchDebouncer {
  #[must_use]
  pub fn new(
    backend: Arc<dyn ProjectBackend>,
    delay: Duration,
    sender: UnboundedSender<SearchOutcome>,
  ) -> Self {
    Self {
      backend,
      delay,
      sender,
      pending: None,
    }
  }

  /// Whether a scheduled search has not posted its outcome yet.
  #[must_use]
  pub fn is_pending(&self) -> bool {
    self
      .pending
      .as_ref()
      .is_some_and(|handle| !handle.is_finished())
  }

  pub fn schedule(&mut self, ticket: SearchTicket) {
    self.cancel();
    debug!(
      "Search #{} scheduled in {:?}",
      ticket.generation, self.delay
    );
    let backend = self.backend.clone();
    let sender = self.sender.clone();
    let delay = self.delay;
    self.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let outcome = ticket.run(backend.as_ref()).await;
      let _ = sender.send(outcome);
    }));
  }

  /// Waits until the pending search has ended, whether it posted an outcome, was aborted or
  /// panicked.
  pub async fn finish(&mut self) {
    if let Some(handle) = self.pending.take()
      && let Err(e) = handle.await
      && !e.is_cancelled()
    {
      warn!("Search task failed: {e}");
    }
  }

  pub fn cancel(&mut self) {
    if let Some(handle) = self.pending.take()
      && !handle.is_finished()
    {
      debug!("Cancelling pending search");
      handle.abort();
    }
  }
}

impl Drop for SearchDebouncer {
  fn drop(&mut self) {
    self.cancel();
  }
}
