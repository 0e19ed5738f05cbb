//! Rate-limited external queue
//!
//! One queue per validator. Callers push links and await their results; a single
//! drain task takes fixed-size batches in submission order, probes each batch
//! concurrently, and waits `delay` after a batch completes before starting the
//! next one. The drain task exits when the queue is empty and is respawned by
//! the next submission. A drain task that panics is restarted by its
//! supervisor; the batch it held resolves as dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::models::{ScannedLink, ValidationResult};
use crate::ports::Prober;
use crate::validator::check_link;

type Waiter = oneshot::Sender<ValidationResult>;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(ScannedLink, Waiter)>,
    draining: bool,
    last_batch_done: Option<Instant>,
}

pub struct RateLimitedQueue {
    prober: Arc<dyn Prober>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    delay: Duration,
    state: Mutex<QueueState>,
    batches_drained: AtomicU64,
}

impl RateLimitedQueue {
    pub fn new(
        prober: Arc<dyn Prober>,
        clock: Arc<dyn Clock>,
        batch_size: usize,
        delay: Duration,
    ) -> Self {
        Self {
            prober,
            clock,
            batch_size: batch_size.max(1),
            delay,
            state: Mutex::new(QueueState::default()),
            batches_drained: AtomicU64::new(0),
        }
    }

    /// Queues `links` behind anything already waiting and resolves once all of
    /// them have been probed. Results come back in the order given.
    pub async fn submit(self: &Arc<Self>, links: Vec<ScannedLink>) -> Vec<ValidationResult> {
        if links.is_empty() {
            return Vec::new();
        }

        let mut waiting = Vec::with_capacity(links.len());
        let start_drain = {
            let mut state = self.state.lock().await;
            for link in links {
                let (tx, rx) = oneshot::channel();
                waiting.push((link.url.clone(), rx));
                state.pending.push_back((link, tx));
            }
            !std::mem::replace(&mut state.draining, true)
        };

        if start_drain {
            self.spawn_drainer();
        }

        let mut results = Vec::with_capacity(waiting.len());
        for (url, rx) in waiting {
            match rx.await {
                Ok(result) => results.push(result),
                Err(_) => {
                    warn!("External check for {} was dropped", url);
                    results.push(ValidationResult::probe_failure(
                        url,
                        "check dropped before completion",
                        self.clock.now_utc(),
                    ));
                }
            }
        }
        results
    }

    pub async fn pending(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Number of batches sent since creation.
    pub fn batches_drained(&self) -> u64 {
        self.batches_drained.load(Ordering::Relaxed)
    }

    /// Runs `drain` in its own task and restarts it if it panics, so the
    /// `draining` flag never stays set without a live drainer.
    fn spawn_drainer(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let drainer = Arc::clone(&queue);
                let Err(e) = tokio::spawn(async move { drainer.drain().await }).await else {
                    return;
                };
                error!("External drain task failed: {}", e);

                let mut state = queue.state.lock().await;
                if state.pending.is_empty() {
                    state.draining = false;
                    return;
                }
            }
        });
    }

    async fn drain(&self) {
        loop {
            let (batch, not_before) = {
                let mut state = self.state.lock().await;
                if state.pending.is_empty() {
                    state.draining = false;
                    return;
                }
                let take = self.batch_size.min(state.pending.len());
                let batch: Vec<_> = state.pending.drain(..take).collect();
                (batch, state.last_batch_done.map(|done| done + self.delay))
            };

            if let Some(at) = not_before {
                tokio::time::sleep_until(at).await;
            }

            let number = self.batches_drained.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Draining external batch #{} ({} links)", number, batch.len());

            let results = join_all(
                batch
                    .iter()
                    .map(|(link, _)| check_link(self.prober.as_ref(), link, self.clock.as_ref())),
            )
            .await;

            for ((_, waiter), result) in batch.into_iter().zip(results) {
                // Receiver gone means the caller stopped waiting; nothing to do
                let _ = waiter.send(result);
            }

            self.state.lock().await.last_batch_done = Some(Instant::now());
        }
    }
}
