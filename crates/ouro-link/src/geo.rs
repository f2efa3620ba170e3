//! Device position lookup with a bounded wait.

use std::time::Duration;

use serde::Deserialize;

use crate::config::FixedPosition;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct PositionBody {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude", alias = "lng")]
    lon: f64,
}

pub struct GeoLocator {
    fixed: Option<FixedPosition>,
    url: Option<String>,
    http: reqwest::Client,
    wait: Duration,
}

impl GeoLocator {
    pub fn new(fixed: Option<FixedPosition>, url: Option<String>, wait: Duration) -> Result<Self> {
        Ok(Self {
            fixed,
            url,
            http: reqwest::Client::builder().build()?,
            wait,
        })
    }

    /// Current position, or `None` when unknown. A lookup that outlives the
    /// wait is abandoned; that is not an error.
    pub async fn locate(&self) -> Option<FixedPosition> {
        if let Some(fixed) = self.fixed {
            return Some(fixed);
        }
        let url = self.url.as_deref()?;

        match tokio::time::timeout(self.wait, self.fetch(url)).await {
            Ok(Ok(position)) => Some(position),
            Ok(Err(e)) => {
                tracing::warn!(url, error = %e, "position lookup failed");
                None
            }
            Err(_) => {
                tracing::debug!(url, wait_ms = self.wait.as_millis() as u64, "position lookup timed out");
                None
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<FixedPosition> {
        let body: PositionBody = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.position())
    }
}

impl PositionBody {
    fn position(&self) -> FixedPosition {
        FixedPosition {
            lat: self.lat,
            lon: self.lon,
        }
    }
}
