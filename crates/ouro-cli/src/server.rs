use std::sync::Arc;

use ouro_core::time::now_unix_millis;
use ouro_core::{SignalColor, Source};
use ouro_link::{MissingStamp, decode};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Notify;

use crate::driver::{SharedFusion, ingest_logged};

#[derive(Clone)]
pub struct OuroServer {
    state: SharedFusion,
    rescan: Arc<Notify>,
    tool_router: ToolRouter<Self>,
}

impl OuroServer {
    pub fn new(state: SharedFusion, rescan: Arc<Notify>) -> Self {
        Self {
            state,
            rescan,
            tool_router: Self::tool_router(),
        }
    }
}

fn json_result(value: &serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct OverrideRequest {
    /// Signal color to force: RED, YELLOW, BLUE or GREEN. Omit to toggle
    /// between WAR_TIME and NORMAL.
    color: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IngestRequest {
    /// Feed name, e.g. "backlog", "biometric", "operator_signal", "weather"
    source: String,
    /// Event payload as delivered by the feed
    payload: serde_json::Value,
    /// Upstream timestamp, ISO-8601 or Unix milliseconds. Defaults to now.
    observed_at: Option<serde_json::Value>,
}

#[tool_router]
impl OuroServer {
    #[tool(
        description = "Current fused read model: operating mode, bio metrics, sector occupancy, weather advisory, threat count, mission, pulse, insight and link status."
    )]
    async fn ouro_snapshot(&self) -> Result<CallToolResult, McpError> {
        let model = self.state.lock().await.snapshot();
        let json = serde_json::to_value(&model)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(json_result(&json))
    }

    #[tool(
        description = "Manual mode override. With a color, forces that signal; without one, toggles WAR_TIME <-> NORMAL. Holds until the next real operator signal."
    )]
    async fn ouro_override(
        &self,
        Parameters(req): Parameters<OverrideRequest>,
    ) -> Result<CallToolResult, McpError> {
        let color = match req.color.as_deref() {
            None => None,
            Some(raw) => Some(SignalColor::parse(raw).ok_or_else(|| {
                McpError::invalid_params(
                    format!("unknown color '{raw}', expected RED, YELLOW, BLUE or GREEN"),
                    None,
                )
            })?),
        };

        let mut svc = self.state.lock().await;
        let mode = svc.override_mode(color);
        tracing::info!(%mode, "manual override");
        Ok(json_result(&serde_json::json!({
            "mode": mode,
            "origin": svc.governor().origin(),
            "governed_mode": svc.governor().governed_mode(),
        })))
    }

    #[tool(description = "Request an immediate weather rescan. The advisory reads 'scanning' until it completes.")]
    async fn ouro_rescan(&self) -> Result<CallToolResult, McpError> {
        self.state.lock().await.begin_weather_scan();
        self.rescan.notify_one();
        Ok(json_result(&serde_json::json!({ "requested": true })))
    }

    #[tool(
        description = "Offer one telemetry event, as a push feed would. Older-than-held events for the same source are rejected."
    )]
    async fn ouro_ingest(
        &self,
        Parameters(req): Parameters<IngestRequest>,
    ) -> Result<CallToolResult, McpError> {
        let source = Source::from_name(&req.source).ok_or_else(|| {
            McpError::invalid_params(format!("unknown source '{}'", req.source), None)
        })?;

        let mut wire = serde_json::json!({
            "source": source.as_str(),
            "payload": req.payload,
        });
        if let Some(ts) = req.observed_at {
            wire["observedAt"] = ts;
        }
        let event = decode(&wire, None, now_unix_millis(), MissingStamp::Arrival)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let outcome = ingest_logged(&mut *self.state.lock().await, &event);
        Ok(json_result(&serde_json::json!({
            "id": event.id,
            "source": event.source,
            "observed_at": event.observed_at,
            "result": outcome,
        })))
    }
}

#[tool_handler]
impl ServerHandler for OuroServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Ouroboros fuses calendar, backlog, biometric, weather and operator-signal telemetry \
                 into one operating mode (NORMAL, WARNING, WAR_TIME, RECOVERY) plus derived views.\n\n\
                 - ouro_snapshot: read the current state. It is always renderable, even with every feed down.\n\
                 - ouro_override: force or toggle the mode by hand. The next operator signal clears it.\n\
                 - ouro_rescan: refresh the weather advisory now.\n\
                 - ouro_ingest: push one event by hand, e.g. {source: \"backlog\", payload: 42}.\n\n\
                 Backlog above 200 shows the threat counter as OVERRUN but never changes the mode."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ouro_core::FusionService;
    use tokio::sync::Mutex;

    fn make_server() -> OuroServer {
        OuroServer::new(
            Arc::new(Mutex::new(FusionService::default())),
            Arc::new(Notify::new()),
        )
    }

    fn text_from_result(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn parse_result(result: &CallToolResult) -> serde_json::Value {
        let text = text_from_result(result);
        serde_json::from_str(&text).expect("handler should return valid JSON")
    }

    async fn ingest(server: &OuroServer, source: &str, payload: serde_json::Value, ts: u64) -> serde_json::Value {
        let result = server
            .ouro_ingest(Parameters(IngestRequest {
                source: source.to_string(),
                payload,
                observed_at: Some(serde_json::json!(ts)),
            }))
            .await
            .unwrap();
        parse_result(&result)
    }

    #[tokio::test]
    async fn test_snapshot_initial() {
        let server = make_server();
        let json = parse_result(&server.ouro_snapshot().await.unwrap());
        assert_eq!(json["mode"], "NORMAL");
        assert_eq!(json["threatCount"]["status"], "SCANNING");
        assert_eq!(json["bioMetrics"][0]["value"], "No Data Available");
        assert_eq!(json["occupancy"]["activeSectorIndex"], -1);
    }

    #[tokio::test]
    async fn test_ingest_then_snapshot() {
        let server = make_server();
        let json = ingest(&server, "Anki_Backlog", serde_json::json!(201), 10).await;
        assert_eq!(json["result"]["outcome"], "applied");

        let stale = ingest(&server, "backlog", serde_json::json!(5), 9).await;
        assert_eq!(stale["result"]["outcome"], "stale");

        let snap = parse_result(&server.ouro_snapshot().await.unwrap());
        assert_eq!(snap["backlog"], 201);
        assert_eq!(snap["threatCount"]["status"], "OVERRUN");
        assert_eq!(snap["mode"], "NORMAL");
    }

    #[tokio::test]
    async fn test_ingest_rejects_unknown_source() {
        let server = make_server();
        let err = server
            .ouro_ingest(Parameters(IngestRequest {
                source: "stocks".into(),
                payload: serde_json::json!(1),
                observed_at: None,
            }))
            .await
            .unwrap_err();
        assert!(err.message.contains("unknown source"));
    }

    #[tokio::test]
    async fn test_override_toggle_and_signal() {
        let server = make_server();
        let toggled = parse_result(
            &server
                .ouro_override(Parameters(OverrideRequest { color: None }))
                .await
                .unwrap(),
        );
        assert_eq!(toggled["mode"], "WAR_TIME");
        assert_eq!(toggled["origin"], "manual");

        let snap = parse_result(&server.ouro_snapshot().await.unwrap());
        assert_eq!(snap["advisory"]["status"], "scanning");
        assert_eq!(snap["combat"], true);

        ingest(&server, "operator_signal", serde_json::json!({"color": "YELLOW"}), 1).await;
        let snap = parse_result(&server.ouro_snapshot().await.unwrap());
        assert_eq!(snap["mode"], "WARNING");
        assert_eq!(snap["modeOrigin"], "governed");
    }

    #[tokio::test]
    async fn test_override_bad_color() {
        let server = make_server();
        let err = server
            .ouro_override(Parameters(OverrideRequest {
                color: Some("PURPLE".into()),
            }))
            .await
            .unwrap_err();
        assert!(err.message.contains("PURPLE"));
    }

    #[tokio::test]
    async fn test_rescan_wakes_driver() {
        let server = make_server();
        let rescan = server.rescan.clone();
        let waiter = tokio::spawn(async move { rescan.notified().await });

        let json = parse_result(&server.ouro_rescan().await.unwrap());
        assert_eq!(json["requested"], true);
        tokio::time::timeout(std::time::Duration::from_secs(2), waiter)
            .await
            .expect("rescan should notify")
            .unwrap();
    }

    #[test]
    fn test_server_info() {
        let server = make_server();
        let info = server.get_info();
        assert!(info.instructions.is_some());
        assert!(info.capabilities.tools.is_some());
    }
}
