//! Bulk snapshot fetch.
//!
//! The snapshot body is either a JSON array of wire events or an object keyed
//! by source name, whose values are wire events, lists of them, or bare
//! payloads. Rows that fail to decode are skipped; an empty body is simply
//! no update.

use std::time::Duration;

use ouro_core::{Source, TelemetryEvent};
use serde_json::Value;

use crate::error::Result;
use crate::wire::{MissingStamp, decode};

pub struct SnapshotClient {
    http: reqwest::Client,
    url: String,
}

impl SnapshotClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode one snapshot.
    pub async fn fetch(&self, received_at: u64) -> Result<Vec<TelemetryEvent>> {
        let body: Value = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let events = parse_snapshot(&body, received_at);
        tracing::debug!(url = %self.url, count = events.len(), "snapshot fetched");
        Ok(events)
    }
}

/// Decode a snapshot body. Undecodable rows are logged and dropped.
pub fn parse_snapshot(body: &Value, received_at: u64) -> Vec<TelemetryEvent> {
    let mut events = Vec::new();
    match body {
        Value::Array(rows) => {
            for row in rows {
                push_row(&mut events, row, None, received_at);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                let Some(source) = Source::from_name(key) else {
                    tracing::warn!(key = %key, "snapshot key names no source, skipping");
                    continue;
                };
                match value {
                    Value::Null => {}
                    Value::Array(rows) => {
                        for row in rows {
                            push_row(&mut events, row, Some(source), received_at);
                        }
                    }
                    Value::Object(_) => push_row(&mut events, value, Some(source), received_at),
                    bare => events.push(TelemetryEvent::new(source, bare.clone(), 0, received_at)),
                }
            }
        }
        Value::Null => {}
        other => tracing::warn!(body = %other, "snapshot body is neither array nor object"),
    }
    events
}

fn push_row(events: &mut Vec<TelemetryEvent>, row: &Value, source: Option<Source>, received_at: u64) {
    match decode(row, source, received_at, MissingStamp::Epoch) {
        Ok(event) => events.push(event),
        Err(e) => tracing::warn!(error = %e, "dropping snapshot row"),
    }
}
