//! A live journey session: one controller behind a lock, plus the delayed advance timer.
//!
//! After a correct answer the controller hands out an `AdvanceTicket`; the session
//! applies it once the feedback window has elapsed. Restart, teardown and a newer
//! schedule abort the timer, and a ticket from an older epoch is ignored anyway.
//!
//! Content generation runs without the controller lock, so views, teardown and
//! restart stay responsive while a journey is loading.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::controller::{AdvanceTicket, Interaction, JourneyController, JourneyLoad, SessionError};
use crate::domain::{Attempt, JourneySource, Verdict};

pub struct LiveSession {
  id: String,
  controller: Mutex<JourneyController>,
  pending: StdMutex<Option<JoinHandle<()>>>,
  advance_delay: Duration,
  last_seen: StdMutex<Instant>,
  /// Bumped every time a scheduled advance lands.
  advanced: watch::Sender<u64>,
}

impl LiveSession {
  pub fn new(id: String, controller: JourneyController, advance_delay: Duration) -> Arc<Self> {
    let (advanced, _) = watch::channel(0);
    Arc::new(Self {
      id,
      controller: Mutex::new(controller),
      pending: StdMutex::new(None),
      advance_delay,
      last_seen: StdMutex::new(Instant::now()),
      advanced,
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Read access for building views.
  pub async fn controller(&self) -> MutexGuard<'_, JourneyController> {
    self.controller.lock().await
  }

  /// Notified after each applied delayed advance.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.advanced.subscribe()
  }

  #[instrument(level = "info", skip(self), fields(session = %self.id))]
  pub async fn start(&self, language: &str, level: u8) -> JourneySource {
    self.cancel_pending();
    let load = self.controller.lock().await.begin_start(language, level);
    self.finish_load(load).await
  }

  #[instrument(level = "info", skip(self), fields(session = %self.id))]
  pub async fn restart(&self, new_level: Option<u8>) -> JourneySource {
    self.cancel_pending();
    let load = self.controller.lock().await.begin_restart(new_level);
    self.finish_load(load).await
  }

  async fn finish_load(&self, load: JourneyLoad) -> JourneySource {
    let loaded = load.run().await;
    let source = loaded.source;
    if !self.controller.lock().await.install(loaded) {
      debug!(target: "journey", session = %self.id, "Load superseded while generating");
    }
    source
  }

  /// Validate and, on success, schedule the advance after the feedback delay.
  pub async fn submit(self: &Arc<Self>, attempt: Option<Attempt>) -> Result<Verdict, SessionError> {
    let outcome = self.controller.lock().await.submit_answer(attempt)?;
    if let Some(ticket) = outcome.advance {
      self.schedule_advance(ticket);
    }
    Ok(outcome.verdict)
  }

  pub async fn interact(&self, interaction: Interaction) -> Result<(), SessionError> {
    self.controller.lock().await.interact(interaction)
  }

  pub async fn retry(&self) -> Result<(), SessionError> {
    self.controller.lock().await.retry_current_round()
  }

  pub async fn teardown(&self) {
    self.cancel_pending();
    self.controller.lock().await.teardown();
  }

  fn schedule_advance(self: &Arc<Self>, ticket: AdvanceTicket) {
    let weak = Arc::downgrade(self);
    let delay = self.advance_delay;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let Some(session) = weak.upgrade() else { return };
      let applied = session.controller.lock().await.apply_advance(ticket);
      if applied {
        session.advanced.send_modify(|n| *n += 1);
      }
      debug!(target: "journey", session = %session.id, applied, "Delayed advance fired");
    });

    let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(previous) = pending.replace(handle) {
      previous.abort();
    }
  }

  fn cancel_pending(&self) {
    let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(handle) = pending.take() {
      handle.abort();
      debug!(target: "journey", session = %self.id, "Cancelled pending advance");
    }
  }

  pub fn touch(&self) {
    *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
  }

  pub fn idle_for(&self) -> Duration {
    self.last_seen.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
  }
}

impl Drop for LiveSession {
  fn drop(&mut self) {
    if let Some(handle) = self.pending.get_mut().ok().and_then(Option::take) {
      handle.abort();
    }
  }
}
