//! Intake driver: feeds the shared fusion state from the configured links.
//!
//! Three independent tasks, all writing through `FusionService::ingest`:
//! the one-shot bulk snapshot, the push subscription, and the weather loop
//! (periodic, or woken by a manual rescan). None of them can fail the
//! process; transport trouble only flips the link status flags.

use std::sync::Arc;
use std::time::Duration;

use ouro_core::time::now_unix_millis;
use ouro_core::{Feed, FeedStatus, FusionService, IngestOutcome, Source, TelemetryEvent};
use ouro_link::{
    Backoff, GeoLocator, LinkConfig, PushSubscription, SnapshotClient, StreamUpdate, WeatherClient,
};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub type SharedFusion = Arc<Mutex<FusionService>>;

/// Offer one event and log what happened to it.
pub fn ingest_logged(svc: &mut FusionService, event: &TelemetryEvent) -> IngestOutcome {
    let outcome = svc.ingest(event);
    match &outcome {
        IngestOutcome::Applied => {
            tracing::debug!(id = %event.id, source = %event.source, observed_at = event.observed_at, "applied")
        }
        IngestOutcome::Stale { held, incoming } => {
            tracing::debug!(id = %event.id, source = %event.source, held, incoming, "stale event dropped")
        }
        IngestOutcome::Ignored { reason } => {
            tracing::warn!(id = %event.id, source = %event.source, %reason, "event ignored")
        }
    }
    outcome
}

pub struct Driver {
    state: SharedFusion,
    config: LinkConfig,
    rescan: Arc<Notify>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Driver {
    pub fn new(
        state: SharedFusion,
        config: LinkConfig,
        rescan: Arc<Notify>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            config,
            rescan,
            cancel,
            tracker: TaskTracker::new(),
        }
    }

    /// Start every configured intake task.
    pub fn start(&self) -> anyhow::Result<()> {
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        if let Some(url) = &self.config.snapshot_url {
            let client = SnapshotClient::new(url, timeout)?;
            let state = self.state.clone();
            let cancel = self.cancel.clone();
            self.tracker.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = bulk_load(&state, &client) => {}
                }
            });
        }

        if let Some(url) = &self.config.stream_url {
            let backoff = Backoff::new(
                Duration::from_millis(self.config.reconnect_initial_ms),
                Duration::from_millis(self.config.reconnect_max_ms),
            );
            let subscription = PushSubscription::new(url, timeout, backoff)?;
            let (tx, rx) = mpsc::channel(64);
            self.tracker.spawn(subscription.run(tx, self.cancel.clone()));
            self.tracker.spawn(consume_stream(self.state.clone(), rx));
        }

        let weather = WeatherClient::new(&self.config.weather_url, timeout)?;
        let geo = GeoLocator::new(
            self.config.position,
            self.config.position_url.clone(),
            Duration::from_millis(self.config.geoposition_timeout_ms),
        )?;
        self.tracker.spawn(weather_loop(
            self.state.clone(),
            weather,
            geo,
            self.rescan.clone(),
            interval(self.config.weather_interval_secs),
            self.cancel.clone(),
        ));

        self.tracker.close();
        Ok(())
    }

    /// Cancel all tasks and wait for them to wind down.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn interval(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// One bulk load. Failure marks the snapshot link offline.
pub async fn bulk_load(state: &SharedFusion, client: &SnapshotClient) {
    match client.fetch(now_unix_millis()).await {
        Ok(events) => {
            let mut svc = state.lock().await;
            let applied = events
                .iter()
                .filter(|e| ingest_logged(&mut svc, e).is_applied())
                .count();
            svc.set_feed_status(Feed::Snapshot, FeedStatus::Online);
            tracing::info!(url = client.url(), received = events.len(), applied, "bulk load complete");
        }
        Err(e) => {
            tracing::warn!(url = client.url(), error = %e, "bulk load failed");
            state
                .lock()
                .await
                .set_feed_status(Feed::Snapshot, FeedStatus::Offline);
        }
    }
}

async fn consume_stream(state: SharedFusion, mut rx: mpsc::Receiver<StreamUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut svc = state.lock().await;
        match update {
            StreamUpdate::Connected => svc.set_feed_status(Feed::Stream, FeedStatus::Online),
            StreamUpdate::Disconnected(_) => svc.set_feed_status(Feed::Stream, FeedStatus::Offline),
            StreamUpdate::Event(event) => {
                ingest_logged(&mut svc, &event);
            }
        }
    }
}

/// One weather scan: locate, fetch, ingest. Failure marks the advisory
/// offline; the last mode and inputs are kept.
pub async fn scan_weather(state: &SharedFusion, weather: &WeatherClient, geo: &GeoLocator) {
    state.lock().await.begin_weather_scan();

    let position = geo.locate().await;
    match weather.scan(position).await {
        Ok(reading) => {
            let value = match serde_json::to_value(&reading) {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode weather reading");
                    state.lock().await.weather_offline();
                    return;
                }
            };
            let event = TelemetryEvent::observed_on_arrival(Source::Weather, value, now_unix_millis());
            finish_scan(&mut *state.lock().await, &event);
        }
        Err(e) => {
            tracing::warn!(error = %e, "weather scan failed");
            state.lock().await.weather_offline();
        }
    }
}

/// Fold a scanned reading in and leave the scanning state. A reading that
/// loses to a newer pushed one still counts as a successful scan.
fn finish_scan(svc: &mut FusionService, event: &TelemetryEvent) -> IngestOutcome {
    let outcome = ingest_logged(svc, event);
    match outcome {
        IngestOutcome::Ignored { .. } => svc.weather_offline(),
        _ => svc.weather_online(),
    }
    outcome
}

async fn weather_loop(
    state: SharedFusion,
    weather: WeatherClient,
    geo: GeoLocator,
    rescan: Arc<Notify>,
    every: Option<Duration>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = scan_weather(&state, &weather, &geo) => {}
        }

        let wait_periodic = async {
            match every {
                Some(every) => tokio::time::sleep(every).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = rescan.notified() => tracing::debug!("manual weather rescan"),
            _ = wait_periodic => tracing::debug!("periodic weather rescan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interval_zero_disables() {
        assert_eq!(interval(0), None);
        assert_eq!(interval(5), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_ingest_logged_passes_outcome_through() {
        let mut svc = FusionService::default();
        let event = TelemetryEvent::new(Source::Backlog, json!(12), 10, 10);
        assert!(ingest_logged(&mut svc, &event).is_applied());
        let older = TelemetryEvent::new(Source::Backlog, json!(3), 5, 11);
        assert!(matches!(ingest_logged(&mut svc, &older), IngestOutcome::Stale { .. }));
    }

    #[test]
    fn test_scan_behind_pushed_reading_goes_online() {
        let mut svc = FusionService::default();
        let pushed = TelemetryEvent::new(Source::Weather, json!({"temperatureC": 29}), 9_000, 9_000);
        ingest_logged(&mut svc, &pushed);
        svc.begin_weather_scan();

        let scanned = TelemetryEvent::new(Source::Weather, json!({"temperatureC": 22}), 4_000, 4_000);
        assert!(matches!(finish_scan(&mut svc, &scanned), IngestOutcome::Stale { .. }));

        let model = svc.snapshot();
        assert_eq!(model.link.weather, FeedStatus::Online);
        assert_eq!(model.advisory.temperature_c, 29.0);
        assert_ne!(model.advisory.station_name, "SCANNING...");
    }

    #[test]
    fn test_unusable_scan_goes_offline() {
        let mut svc = FusionService::default();
        svc.begin_weather_scan();
        let scanned = TelemetryEvent::new(Source::Weather, json!({"humidity": 80}), 1, 1);
        finish_scan(&mut svc, &scanned);
        assert_eq!(svc.snapshot().link.weather, FeedStatus::Offline);
    }

    #[tokio::test]
    async fn test_stream_updates_drive_link_status() {
        let state: SharedFusion = Arc::new(Mutex::new(FusionService::default()));
        let (tx, rx) = mpsc::channel(8);
        let consumer = tokio::spawn(consume_stream(state.clone(), rx));

        tx.send(StreamUpdate::Connected).await.unwrap();
        tx.send(StreamUpdate::Event(TelemetryEvent::new(Source::Backlog, json!(99), 1, 1)))
            .await
            .unwrap();
        drop(tx);
        consumer.await.unwrap();

        let model = state.lock().await.snapshot();
        assert_eq!(model.link.stream, FeedStatus::Online);
        assert_eq!(model.backlog, Some(99));
    }

    #[tokio::test]
    async fn test_failed_scan_goes_offline() {
        let state: SharedFusion = Arc::new(Mutex::new(FusionService::default()));
        let weather = WeatherClient::new("http://127.0.0.1:9/wx", Duration::from_millis(500)).unwrap();
        let geo = GeoLocator::new(None, None, Duration::from_millis(10)).unwrap();

        scan_weather(&state, &weather, &geo).await;

        let model = state.lock().await.snapshot();
        assert_eq!(model.advisory.station_name, "OFFLINE");
        assert_eq!(model.advisory.tips, vec!["SIGNAL LOST"]);
        assert_eq!(model.link.weather, FeedStatus::Offline);
    }

    #[tokio::test]
    async fn test_failed_bulk_load_marks_offline() {
        let state: SharedFusion = Arc::new(Mutex::new(FusionService::default()));
        let client = SnapshotClient::new("http://127.0.0.1:9/snap", Duration::from_millis(500)).unwrap();
        bulk_load(&state, &client).await;
        assert_eq!(state.lock().await.snapshot().link.snapshot, FeedStatus::Offline);
    }
}
