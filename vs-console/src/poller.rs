//! Trace-event polling engine
//!
//! Repeatedly fetches the trace-events feed and hands raw batches to a
//! subscriber. An "after" floor advances with each non-empty page so later
//! cycles only request rows the loop has not seen. Deduplication against
//! already-held ids stays with the consumer; fetch failures are logged and
//! the loop keeps going.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError};
use trace_types::{TraceEvent, TraceEventQuery};

/// Batches buffered before a stalled subscriber stalls the poll loop itself.
const DELIVERY_BUFFER: usize = 16;

/// Where poll cycles get their events. `ApiClient` is the real transport;
/// tests substitute a scripted one.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self, query: &TraceEventQuery) -> Result<Vec<TraceEvent>, ApiError>;
}

#[async_trait]
impl EventSource for ApiClient {
    async fn fetch_events(&self, query: &TraceEventQuery) -> Result<Vec<TraceEvent>, ApiError> {
        self.fetch_trace_events(query).await
    }
}

/// Repeating fetch cycle over an `EventSource`.
///
/// Each instance owns its own floor and lifecycle; nothing is shared across
/// instances. `start` hands back a [`Subscription`] carrying the deliveries.
pub struct EventPoller {
    source: Arc<dyn EventSource>,
    interval: Duration,
    page_limit: u32,
    after: Arc<Mutex<Option<DateTime<Utc>>>>,
    active: Mutex<Option<CancellationToken>>,
}

impl EventPoller {
    pub fn new(source: Arc<dyn EventSource>, interval: Duration, page_limit: u32) -> Self {
        Self {
            source,
            interval,
            page_limit,
            after: Arc::new(Mutex::new(None)),
            active: Mutex::new(None),
        }
    }

    /// Begin polling. Returns `None` while a previous run is still active,
    /// so calling it twice is a no-op.
    ///
    /// The first fetch happens immediately. Each later cycle is scheduled
    /// only after the previous one completes, so cycles never overlap and
    /// consecutive starts are spaced at least `interval` apart.
    pub fn start(&self) -> Option<Subscription> {
        let mut active = self.active.lock().expect("poller lock poisoned");
        if active.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return None;
        }

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        *active = Some(token.clone());

        let worker = PollWorker {
            source: Arc::clone(&self.source),
            interval: self.interval,
            page_limit: self.page_limit,
            after: Arc::clone(&self.after),
            token: token.clone(),
            tx,
        };
        tokio::spawn(worker.run());

        Some(Subscription { rx, token })
    }

    /// Prevent scheduling of the next cycle. Idempotent. An in-flight
    /// request is not aborted; its floor update and delivery still land.
    pub fn stop(&self) {
        if let Some(token) = self.active.lock().expect("poller lock poisoned").as_ref() {
            token.cancel();
        }
    }

    /// Clear the stored floor so the next fetch re-requests the stream from
    /// the beginning. Does not start or stop polling.
    pub fn reset(&self) {
        *self.after.lock().expect("poller lock poisoned") = None;
    }

    /// Current floor, for diagnostics.
    pub fn floor(&self) -> Option<DateTime<Utc>> {
        *self.after.lock().expect("poller lock poisoned")
    }

    pub fn is_polling(&self) -> bool {
        self.active
            .lock()
            .expect("poller lock poisoned")
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

struct PollWorker {
    source: Arc<dyn EventSource>,
    interval: Duration,
    page_limit: u32,
    after: Arc<Mutex<Option<DateTime<Utc>>>>,
    token: CancellationToken,
    tx: mpsc::Sender<Vec<TraceEvent>>,
}

impl PollWorker {
    async fn run(self) {
        loop {
            self.cycle().await;
            if self.token.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    async fn cycle(&self) {
        let query = TraceEventQuery {
            after: *self.after.lock().expect("poller lock poisoned"),
            limit: Some(self.page_limit),
            ..Default::default()
        };

        match self.source.fetch_events(&query).await {
            Ok(events) => {
                if events.is_empty() {
                    return;
                }

                // Newest-first page: the head timestamp is the next floor.
                *self.after.lock().expect("poller lock poisoned") = Some(events[0].timestamp);

                if self.tx.send(events).await.is_err() {
                    // Subscriber dropped its receiver; nothing left to feed.
                    self.token.cancel();
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Trace event poll failed");
            }
        }
    }
}

/// Live feed of delivered batches. Dropping it cancels the polling loop
/// behind it.
pub struct Subscription {
    rx: mpsc::Receiver<Vec<TraceEvent>>,
    token: CancellationToken,
}

impl Subscription {
    /// Next delivered batch, or `None` once polling has stopped and the
    /// buffer is drained.
    pub async fn recv(&mut self) -> Option<Vec<TraceEvent>> {
        self.rx.recv().await
    }

    /// Stop the polling loop feeding this subscription.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl futures::Stream for Subscription {
    type Item = Vec<TraceEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<TraceEvent>, ApiError>>>,
        queries: Mutex<Vec<TraceEventQuery>>,
        in_flight: AtomicBool,
        overlapped: AtomicBool,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(
            delay: Duration,
            responses: Vec<Result<Vec<TraceEvent>, ApiError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                queries: Mutex::new(Vec::new()),
                in_flight: AtomicBool::new(false),
                overlapped: AtomicBool::new(false),
                delay,
            })
        }

        fn queries(&self) -> Vec<TraceEventQuery> {
            self.queries.lock().unwrap().clone()
        }

        async fn wait_for_queries(&self, count: usize) {
            while self.queries.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn fetch_events(
            &self,
            query: &TraceEventQuery,
        ) -> Result<Vec<TraceEvent>, ApiError> {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            self.queries.lock().unwrap().push(query.clone());
            tokio::time::sleep(self.delay).await;

            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()));
            self.in_flight.store(false, Ordering::SeqCst);
            response
        }
    }

    fn event_at(id: &str, secs: i64) -> TraceEvent {
        TraceEvent {
            id: id.to_string(),
            event_type: trace_types::EVENT_MESSAGE_RECEIVED.to_string(),
            actor: "dialogue_agent".to_string(),
            data: serde_json::Map::new(),
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_never_overlap_under_slow_responses() {
        // Responses take longer than the interval; the loop must wait for
        // each to finish instead of stacking requests.
        let source = ScriptedSource::new(
            Duration::from_millis(2_500),
            vec![
                Ok(vec![event_at("e1", 1)]),
                Ok(vec![event_at("e2", 2)]),
                Ok(vec![event_at("e3", 3)]),
            ],
        );
        let poller = EventPoller::new(source.clone(), Duration::from_millis(1_000), 50);

        let mut sub = poller.start().unwrap();
        for _ in 0..3 {
            assert!(sub.recv().await.is_some());
        }
        drop(sub);

        assert!(
            !source.overlapped.load(Ordering::SeqCst),
            "a fetch started while another was in flight"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_floor_tracks_head_of_last_batch() {
        let source = ScriptedSource::new(
            Duration::ZERO,
            // Newest first within the page.
            vec![Ok(vec![event_at("b", 20), event_at("a", 10)])],
        );
        let poller = EventPoller::new(source.clone(), Duration::from_millis(1_000), 50);

        let mut sub = poller.start().unwrap();
        assert_eq!(sub.recv().await.unwrap().len(), 2);
        source.wait_for_queries(2).await;
        drop(sub);

        let queries = source.queries();
        assert_eq!(queries[0].after, None);
        assert_eq!(queries[0].limit, Some(50));
        assert_eq!(queries[1].after, Some(DateTime::from_timestamp(20, 0).unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_floor() {
        let source = ScriptedSource::new(
            Duration::ZERO,
            vec![Ok(vec![event_at("e1", 20)])],
        );
        let poller = EventPoller::new(source.clone(), Duration::from_millis(1_000), 50);

        let mut sub = poller.start().unwrap();
        assert!(sub.recv().await.is_some());
        source.wait_for_queries(2).await;
        assert!(source.queries()[1].after.is_some());

        poller.reset();
        source.wait_for_queries(3).await;
        drop(sub);

        assert_eq!(source.queries()[2].after, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop_until_stopped() {
        let source = ScriptedSource::new(Duration::ZERO, Vec::new());
        let poller = EventPoller::new(source, Duration::from_millis(1_000), 50);

        let sub = poller.start();
        assert!(sub.is_some());
        assert!(poller.is_polling());
        assert!(poller.start().is_none());

        poller.stop();
        assert!(!poller.is_polling());
        assert!(poller.start().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_inflight_cycle_land() {
        let source = ScriptedSource::new(
            Duration::from_millis(500),
            vec![Ok(vec![event_at("e1", 5)])],
        );
        let poller = EventPoller::new(source.clone(), Duration::from_millis(1_000), 50);

        let mut sub = poller.start().unwrap();
        // Let the first fetch get airborne, then stop mid-flight.
        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop();

        assert_eq!(sub.recv().await.unwrap().len(), 1);
        assert_eq!(sub.recv().await, None);
        assert_eq!(poller.floor(), Some(DateTime::from_timestamp(5, 0).unwrap()));
        assert_eq!(source.queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_event_then_silence() {
        let event = TraceEvent {
            id: "e1".to_string(),
            event_type: trace_types::EVENT_SIM_STARTED.to_string(),
            actor: "sim".to_string(),
            data: serde_json::Map::new(),
            timestamp: "2024-01-01T00:00:01Z".parse().unwrap(),
        };
        let source = ScriptedSource::new(Duration::ZERO, vec![Ok(vec![event])]);
        let poller = EventPoller::new(source, Duration::from_millis(1_000), 50);

        let mut sub = poller.start().unwrap();
        let batch = sub.next().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "e1");

        // Later cycles return empty pages, so nothing further is queued.
        poller.stop();
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_keeps_polling() {
        let source = ScriptedSource::new(
            Duration::ZERO,
            vec![
                Err(ApiError::Network("connection refused".to_string())),
                Ok(vec![event_at("e1", 7)]),
            ],
        );
        let poller = EventPoller::new(source.clone(), Duration::from_millis(1_000), 50);

        let mut sub = poller.start().unwrap();
        let batch = sub.recv().await.unwrap();
        assert_eq!(batch[0].id, "e1");
        drop(sub);

        let queries = source.queries();
        assert!(queries.len() >= 2);
        // A failed cycle must not advance the floor.
        assert_eq!(queries[1].after, None);
    }
}
