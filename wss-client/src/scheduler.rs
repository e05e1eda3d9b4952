//! Self-rescheduling poll loop, one per command stream.
//!
//! A stream runs one session immediately on [`PollStream::start`], hands the
//! aggregate to its handler, then sleeps `interval` after the connection
//! closed before running the next session. The gap is measured from close,
//! so a slow server stretches the period instead of stacking sessions.
//!
//! Every `start` bumps the stream's generation. A session from an older
//! generation still delivers its result but never reschedules, which keeps
//! at most one timer alive per stream.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};
use wss_protocol::{AggregateResult, Aggregator, BackendReply};

use crate::transport::{Connector, SessionOutcome};

/// Whether a reply may contribute records to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Render,
    Suppress,
}

/// Receives the results of one stream. Called from the session task.
pub trait CycleHandler: Send + Sync {
    /// Consulted for every successful reply before it is merged.
    fn on_reply(&self, _reply: &BackendReply) -> Disposition {
        Disposition::Render
    }

    fn on_complete(&self, outcome: &SessionOutcome, result: &AggregateResult);
}

struct StreamState {
    payload: String,
    interval: Duration,
    generation: u64,
    stopped: bool,
    timer: Option<JoinHandle<()>>,
    handler: Option<Arc<dyn CycleHandler>>,
}

pub struct PollStream<C> {
    key: String,
    address: String,
    connector: Arc<C>,
    aggregator: Arc<Aggregator>,
    log_replies: bool,
    state: Mutex<StreamState>,
}

impl<C: Connector> PollStream<C> {
    pub fn new(
        key: impl Into<String>,
        address: impl Into<String>,
        connector: Arc<C>,
        aggregator: Arc<Aggregator>,
        log_replies: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            address: address.into(),
            connector,
            aggregator,
            log_replies,
            state: Mutex::new(StreamState {
                payload: String::new(),
                interval: Duration::ZERO,
                generation: 0,
                stopped: true,
                timer: None,
                handler: None,
            }),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cancel any pending timer and run a session right away. A zero
    /// interval runs exactly once.
    pub fn start(
        self: &Arc<Self>,
        payload: impl Into<String>,
        interval: Duration,
        handler: Arc<dyn CycleHandler>,
    ) {
        let generation = {
            let mut state = self.lock();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.generation += 1;
            state.stopped = false;
            state.payload = payload.into();
            state.interval = interval;
            state.handler = Some(handler);
            state.generation
        };
        debug!(stream = %self.key, generation, ?interval, "stream started");

        let stream = Arc::clone(self);
        tokio::spawn(stream.run_cycle(generation));
    }

    /// Clear the pending timer. In-flight sessions still deliver.
    pub fn stop(&self) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if !state.stopped {
            debug!(stream = %self.key, "stream stopped");
        }
        state.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn has_pending_timer(&self) -> bool {
        self.lock()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.lock().interval
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    async fn run_cycle(self: Arc<Self>, generation: u64) {
        let (payload, handler) = {
            let state = self.lock();
            (state.payload.clone(), state.handler.clone())
        };

        let outcome = self.connector.exchange(&self.address, &payload).await;
        if self.log_replies {
            for message in &outcome.messages {
                info!(stream = %self.key, "{message}");
            }
        }

        let result = match &handler {
            Some(handler) => self.aggregator.aggregate_with(&outcome.messages, |reply| {
                handler.on_reply(reply) == Disposition::Render
            }),
            None => self.aggregator.aggregate(&outcome.messages),
        };
        debug!(
            stream = %self.key,
            generation,
            opened = outcome.opened,
            status = ?result.status,
            "session closed"
        );

        if let Some(handler) = &handler {
            handler.on_complete(&outcome, &result);
        }
        self.reschedule(generation);
    }

    fn reschedule(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || state.stopped || state.interval.is_zero() {
            return;
        }

        let interval = state.interval;
        let stream = Arc::clone(self);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if stream.claim(generation) {
                stream.run_cycle(generation).await;
            }
        }));
    }

    /// The timer fired: detach it so `stop` cannot abort the session it starts.
    fn claim(&self, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation || state.stopped {
            return false;
        }
        state.timer = None;
        true
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
