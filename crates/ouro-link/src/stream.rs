//! Push subscription over server-sent events.
//!
//! Each SSE `data:` payload is one wire event. The subscription reconnects
//! with capped exponential backoff until cancelled or until the receiving
//! side goes away.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use ouro_core::TelemetryEvent;
use ouro_core::time::now_unix_millis;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{LinkError, Result};
use crate::wire::{MissingStamp, decode_str};

/// What the subscription reports to its consumer.
#[derive(Debug)]
pub enum StreamUpdate {
    Connected,
    Event(TelemetryEvent),
    Disconnected(String),
}

/// Capped exponential backoff.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    /// Delay before the next attempt; doubles up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

enum SessionEnd {
    Closed,
    ReceiverGone,
}

pub struct PushSubscription {
    http: reqwest::Client,
    url: String,
    backoff: Backoff,
}

impl PushSubscription {
    pub fn new(url: &str, connect_timeout: Duration, backoff: Backoff) -> Result<Self> {
        // No overall timeout: the response body is open-ended.
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            backoff,
        })
    }

    /// Run until `cancel` fires or `tx` is closed.
    pub async fn run(mut self, tx: mpsc::Sender<StreamUpdate>, cancel: CancellationToken) {
        loop {
            let reason = tokio::select! {
                _ = cancel.cancelled() => return,
                session = self.session(&tx) => match session {
                    Ok(SessionEnd::ReceiverGone) => return,
                    Ok(SessionEnd::Closed) => "stream closed by server".to_string(),
                    Err(e) => e.to_string(),
                },
            };

            let delay = self.backoff.next_delay();
            tracing::warn!(url = %self.url, %reason, retry_ms = delay.as_millis() as u64, "push stream down");
            if tx.send(StreamUpdate::Disconnected(reason)).await.is_err() {
                return;
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn session(&mut self, tx: &mpsc::Sender<StreamUpdate>) -> Result<SessionEnd> {
        let response = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        self.backoff.reset();
        tracing::info!(url = %self.url, "push stream connected");
        if tx.send(StreamUpdate::Connected).await.is_err() {
            return Ok(SessionEnd::ReceiverGone);
        }

        let mut events = response.bytes_stream().eventsource();
        while let Some(item) = events.next().await {
            let message = item.map_err(|e| LinkError::InvalidData(e.to_string()))?;
            if message.data.trim().is_empty() {
                continue;
            }
            match decode_str(&message.data, now_unix_millis(), MissingStamp::Arrival) {
                Ok(event) => {
                    tracing::debug!(id = %event.id, source = %event.source, "push event");
                    if tx.send(StreamUpdate::Event(event)).await.is_err() {
                        return Ok(SessionEnd::ReceiverGone);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "dropping push event"),
            }
        }
        Ok(SessionEnd::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(450));
        let delays: Vec<u128> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 450, 450]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_cap_below_initial() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_cancelled_subscription_returns() {
        let sub = PushSubscription::new(
            "http://127.0.0.1:9/events",
            Duration::from_millis(50),
            Backoff::new(Duration::from_secs(60), Duration::from_secs(60)),
        )
        .unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), sub.run(tx, cancel))
            .await
            .expect("run should return once cancelled");
    }

    #[tokio::test]
    async fn test_unreachable_reports_disconnect() {
        let sub = PushSubscription::new(
            "http://127.0.0.1:9/events",
            Duration::from_millis(200),
            Backoff::new(Duration::from_secs(60), Duration::from_secs(60)),
        )
        .unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sub.run(tx, cancel.clone()));

        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("an update before the timeout");
        assert!(matches!(update, Some(StreamUpdate::Disconnected(_))));

        cancel.cancel();
        task.await.unwrap();
    }
}
