//! Change detector.
//!
//! Owns the watermark and runs poll cycles: query everything edited after the
//! watermark, notify each record in query order, then move the watermark to
//! the cycle's start time. Cycles never overlap: one worker runs them back to
//! back and sleeps the poll interval between the end of one cycle and the
//! start of the next.
//!
//! Delivery is best-effort. A record whose notification fails is logged and
//! not retried, because the watermark still moves past it. A failed query
//! leaves the watermark untouched so the next cycle asks the same question.

use crate::error::BridgeResult;
use crate::notifier::Notifier;
use crate::query::ChangeSource;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records returned by the query.
    pub records: usize,
    /// Notifications delivered.
    pub delivered: usize,
    /// Notifications that failed and were dropped.
    pub failed: usize,
}

/// Poll-classify-notify state machine.
pub struct ChangeDetector {
    source: Arc<dyn ChangeSource>,
    notifier: Arc<dyn Notifier>,
    store_id: String,
    destination: String,
    watermark: DateTime<Utc>,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("store_id", &self.store_id)
            .field("destination", &self.destination)
            .field("watermark", &self.watermark)
            .finish()
    }
}

impl ChangeDetector {
    /// Create a detector whose watermark starts at the current time, so
    /// anything changed before startup is never announced.
    pub fn new(
        source: Arc<dyn ChangeSource>,
        notifier: Arc<dyn Notifier>,
        store_id: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            source,
            notifier,
            store_id: store_id.into(),
            destination: destination.into(),
            watermark: Utc::now(),
        }
    }

    /// Start from an explicit watermark instead of now.
    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = watermark;
        self
    }

    /// Everything edited at or before this instant counts as processed.
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Run one cycle starting now.
    pub async fn run_cycle(&mut self) -> BridgeResult<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle whose start time is `cycle_start`.
    ///
    /// On query failure the error is returned and the watermark is unchanged.
    /// Delivery failures are counted in the report and never abort the cycle.
    #[instrument(
        name = "poll_cycle",
        skip(self, cycle_start),
        fields(store = %self.store_id, since = %self.watermark)
    )]
    pub async fn run_cycle_at(&mut self, cycle_start: DateTime<Utc>) -> BridgeResult<CycleReport> {
        let records = self
            .source
            .query_changed_since(&self.store_id, self.watermark)
            .await?;

        let mut report = CycleReport {
            records: records.len(),
            ..CycleReport::default()
        };

        // Sequential on purpose: notifications must land in query order.
        for record in &records {
            let kind = record.kind();
            let message = record.notification();

            match self
                .notifier
                .send(&self.destination, &message.text(), None)
                .await
            {
                Ok(delivery) => {
                    report.delivered += 1;
                    info!(
                        record_id = %record.id,
                        %kind,
                        title = record.display_title(),
                        ts = %delivery.ts,
                        "Notified Slack about {} document",
                        kind
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        record_id = %record.id,
                        %kind,
                        error = %e,
                        "Dropping notification after delivery failure"
                    );
                }
            }
        }

        self.advance(cycle_start);
        Ok(report)
    }

    /// Move the watermark forward; a start time behind it (clock step) is ignored.
    fn advance(&mut self, to: DateTime<Utc>) {
        if to > self.watermark {
            self.watermark = to;
        }
    }
}

/// Handle to a running poller task.
#[derive(Debug)]
pub struct PollerHandle {
    join: JoinHandle<()>,
    cancel: CancellationToken,
    watermark: watch::Receiver<DateTime<Utc>>,
}

impl PollerHandle {
    /// Watermark as of the last finished cycle.
    pub fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop polling and wait for the task. An in-flight cycle is abandoned
    /// without moving the watermark.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.join.await
    }
}

/// Spawn the single poll worker. The first cycle runs immediately.
pub fn spawn_poller(
    detector: ChangeDetector,
    interval: Duration,
    cancel: CancellationToken,
) -> PollerHandle {
    let (tx, rx) = watch::channel(detector.watermark());
    let token = cancel.clone();
    let join = tokio::spawn(poll_loop(detector, interval, token, tx));

    PollerHandle {
        join,
        cancel,
        watermark: rx,
    }
}

async fn poll_loop(
    mut detector: ChangeDetector,
    interval: Duration,
    cancel: CancellationToken,
    watermark_tx: watch::Sender<DateTime<Utc>>,
) {
    info!(
        interval_secs = interval.as_secs_f64(),
        destination = detector.destination(),
        "Change poller started"
    );

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Change poller shutting down mid-cycle");
                return;
            }
            outcome = detector.run_cycle() => outcome,
        };

        match outcome {
            Ok(report) if report.records > 0 => info!(
                records = report.records,
                delivered = report.delivered,
                failed = report.failed,
                watermark = %detector.watermark(),
                "Poll cycle complete"
            ),
            Ok(_) => debug!(watermark = %detector.watermark(), "No changes"),
            Err(e) => error!(
                error = %e,
                watermark = %detector.watermark(),
                "Change query failed; retrying next cycle"
            ),
        }
        watermark_tx.send_replace(detector.watermark());

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Change poller shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::notifier::Delivery;
    use crate::record::tests::{record, ts};
    use crate::record::ChangeRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store answering "edited after" queries like Notion does.
    #[derive(Default)]
    struct FakeStore {
        records: Mutex<Vec<ChangeRecord>>,
        queries: Mutex<Vec<DateTime<Utc>>>,
        fail_next: AtomicBool,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeStore {
        fn with(records: Vec<ChangeRecord>) -> Self {
            Self {
                records: Mutex::new(records),
                ..Self::default()
            }
        }

        fn queries(&self) -> Vec<DateTime<Utc>> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChangeSource for FakeStore {
        async fn query_changed_since(
            &self,
            store_id: &str,
            since: DateTime<Utc>,
        ) -> BridgeResult<Vec<ChangeRecord>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.queries.lock().unwrap().push(since);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(BridgeError::QueryFailed {
                    store_id: store_id.to_string(),
                    message: "service unavailable".to_string(),
                });
            }

            let mut hits: Vec<_> = self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.last_edited_time > since)
                .cloned()
                .collect();
            hits.sort_by(|a, b| b.last_edited_time.cmp(&a.last_edited_time));
            Ok(hits)
        }
    }

    /// Records every send; fails the sends whose 1-based index is listed.
    #[derive(Default)]
    struct FakeNotifier {
        sent: Mutex<Vec<(String, String)>>,
        attempts: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl FakeNotifier {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(
            &self,
            destination: &str,
            text: &str,
            _thread_ts: Option<&str>,
        ) -> BridgeResult<Delivery> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&n) {
                return Err(BridgeError::DeliveryFailed {
                    channel: destination.to_string(),
                    message: "channel_not_found".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), text.to_string()));
            Ok(Delivery {
                channel: "C1".to_string(),
                ts: format!("1700000000.{:06}", n),
            })
        }
    }

    fn detector(
        store: &Arc<FakeStore>,
        notifier: &Arc<FakeNotifier>,
        watermark: &str,
    ) -> ChangeDetector {
        ChangeDetector::new(store.clone(), notifier.clone(), "db-1", "notion-page-updates")
            .with_watermark(ts(watermark))
    }

    fn three_records() -> Vec<ChangeRecord> {
        vec![
            record("t1", "2024-01-01T00:00:00Z", "2024-01-01T00:00:01Z"),
            record("t3", "2024-01-01T00:00:03Z", "2024-01-01T00:00:03Z"),
            record("t2", "2024-01-01T00:00:00Z", "2024-01-01T00:00:02Z"),
        ]
    }

    #[tokio::test]
    async fn test_notifies_in_descending_modification_order() {
        let store = Arc::new(FakeStore::with(three_records()));
        let notifier = Arc::new(FakeNotifier::default());
        let mut d = detector(&store, &notifier, "2024-01-01T00:00:00Z");

        let report = d.run_cycle_at(ts("2024-01-01T00:00:05Z")).await.unwrap();

        assert_eq!(report, CycleReport { records: 3, delivered: 3, failed: 0 });
        let texts = notifier.texts();
        assert!(texts[0].contains("*Doc t3*"));
        assert!(texts[1].contains("*Doc t2*"));
        assert!(texts[2].contains("*Doc t1*"));
        assert!(texts[0].starts_with("🆕 New document created"));
        assert!(texts[1].starts_with("📝 Document updated"));
        assert!(notifier
            .sent
            .lock()
            .unwrap()
            .iter()
            .all(|(dest, _)| dest == "notion-page-updates"));
    }

    #[tokio::test]
    async fn test_second_cycle_without_changes_is_silent() {
        let store = Arc::new(FakeStore::with(three_records()));
        let notifier = Arc::new(FakeNotifier::default());
        let mut d = detector(&store, &notifier, "2024-01-01T00:00:00Z");

        d.run_cycle_at(ts("2024-01-01T00:00:05Z")).await.unwrap();
        let second = d.run_cycle_at(ts("2024-01-01T00:00:10Z")).await.unwrap();

        assert_eq!(second.records, 0);
        assert_eq!(notifier.texts().len(), 3);
        assert_eq!(
            store.queries(),
            vec![ts("2024-01-01T00:00:00Z"), ts("2024-01-01T00:00:05Z")]
        );
    }

    #[tokio::test]
    async fn test_record_edited_again_reappears() {
        let store = Arc::new(FakeStore::with(three_records()));
        let notifier = Arc::new(FakeNotifier::default());
        let mut d = detector(&store, &notifier, "2024-01-01T00:00:00Z");

        d.run_cycle_at(ts("2024-01-01T00:00:05Z")).await.unwrap();
        store.records.lock().unwrap().push(record(
            "t1",
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:07Z",
        ));
        let report = d.run_cycle_at(ts("2024-01-01T00:00:10Z")).await.unwrap();

        assert_eq!(report.delivered, 1);
        assert!(notifier.texts()[3].starts_with("📝 Document updated: *Doc t1*"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_isolated() {
        let store = Arc::new(FakeStore::with(three_records()));
        let notifier = Arc::new(FakeNotifier {
            fail_on: vec![2],
            ..FakeNotifier::default()
        });
        let mut d = detector(&store, &notifier, "2024-01-01T00:00:00Z");

        let report = d.run_cycle_at(ts("2024-01-01T00:00:05Z")).await.unwrap();

        assert_eq!(report, CycleReport { records: 3, delivered: 2, failed: 1 });
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 3);
        let texts = notifier.texts();
        assert!(texts[0].contains("*Doc t3*"));
        assert!(texts[1].contains("*Doc t1*"));
        assert_eq!(d.watermark(), ts("2024-01-01T00:00:05Z"));

        // The failed record is not retried later.
        d.run_cycle_at(ts("2024-01-01T00:00:10Z")).await.unwrap();
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_query_failure_keeps_watermark() {
        let store = Arc::new(FakeStore::with(three_records()));
        store.fail_next.store(true, Ordering::SeqCst);
        let notifier = Arc::new(FakeNotifier::default());
        let mut d = detector(&store, &notifier, "2024-01-01T00:00:00Z");

        let failed = d.run_cycle_at(ts("2024-01-01T00:00:05Z")).await;
        assert!(matches!(failed, Err(BridgeError::QueryFailed { .. })));
        assert_eq!(d.watermark(), ts("2024-01-01T00:00:00Z"));
        assert!(notifier.texts().is_empty());

        let report = d.run_cycle_at(ts("2024-01-01T00:00:10Z")).await.unwrap();
        assert_eq!(report.delivered, 3);

        let queries = store.queries();
        assert_eq!(queries[0], queries[1]);
        assert_eq!(d.watermark(), ts("2024-01-01T00:00:10Z"));
    }

    #[tokio::test]
    async fn test_watermark_never_regresses() {
        let store = Arc::new(FakeStore::default());
        let notifier = Arc::new(FakeNotifier::default());
        let mut d = detector(&store, &notifier, "2024-01-01T00:00:00Z");

        let starts = [
            "2024-01-01T00:00:05Z",
            "2024-01-01T00:00:03Z",
            "2024-01-01T00:00:09Z",
        ];
        let mut previous = d.watermark();
        for start in starts {
            d.run_cycle_at(ts(start)).await.unwrap();
            assert!(d.watermark() >= previous);
            previous = d.watermark();
        }
        assert_eq!(d.watermark(), ts("2024-01-01T00:00:09Z"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_poller_runs_eagerly_then_on_interval() {
        let store = Arc::new(FakeStore::default());
        let notifier = Arc::new(FakeNotifier::default());
        let d = ChangeDetector::new(store.clone(), notifier.clone(), "db-1", "updates");
        let start = d.watermark();

        let handle = spawn_poller(d, Duration::from_secs(5), CancellationToken::new());
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(store.queries().len(), 3);
        assert!(handle.watermark() >= start);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let store = Arc::new(FakeStore {
            delay: Some(Duration::from_secs(12)),
            ..FakeStore::default()
        });
        let notifier = Arc::new(FakeNotifier::default());
        let d = ChangeDetector::new(store.clone(), notifier.clone(), "db-1", "updates");

        let handle = spawn_poller(d, Duration::from_secs(5), CancellationToken::new());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(store.queries().len() >= 3);
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_through_shared_token() {
        let store = Arc::new(FakeStore::default());
        let notifier = Arc::new(FakeNotifier::default());
        let d = ChangeDetector::new(store, notifier, "db-1", "updates");
        let token = CancellationToken::new();

        let handle = spawn_poller(d, Duration::from_secs(5), token.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_finished());
        handle.shutdown().await.unwrap();
    }
}
