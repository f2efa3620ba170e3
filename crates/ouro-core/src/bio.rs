//! Dual-format biometric advisory parser.
//!
//! Upstream advisories arrive either as a typed object (`diagnosis` /
//! `directives` sections) or as loosely formatted prose such as
//! `"**Sleep:** 6.8h. HRV: 58; Risks: low attention. Verdict: Stable"`.
//! The payload shape is resolved once into [`BioPayload`]; each shape has its
//! own pure parser. The result is never empty.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::BIO_VALUE_MAX_LEN;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*#>•]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Free-text keys in chain order. Each value ends where the next key begins.
static TEXT_KEYS: LazyLock<[(Regex, &'static str, BioCategory); 4]> = LazyLock::new(|| {
    let label = |key: &str| Regex::new(&format!(r"(?i){key}[:\s]+")).unwrap();
    [
        (label("Sleep"), "SLEEP", BioCategory::Sleep),
        (label("HRV"), "HRV", BioCategory::Hrv),
        (label("Risks"), "RISKS", BioCategory::Risk),
        (label("Verdict"), "VERDICT", BioCategory::Verdict),
    ]
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BioCategory {
    Sleep,
    Hrv,
    Risk,
    Verdict,
    Neutral,
    Training,
    Nutrition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioMetric {
    pub label: String,
    pub value: String,
    pub category: BioCategory,
}

impl BioMetric {
    pub fn new(label: &str, value: impl Into<String>, category: BioCategory) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
            category,
        }
    }

    /// The single metric shown when nothing could be recovered.
    pub fn no_data() -> Self {
        Self::new("STATUS", "No Data Available", BioCategory::Neutral)
    }
}

/// A raw advisory after runtime shape inspection.
#[derive(Clone, Debug, PartialEq)]
pub enum BioPayload {
    Structured(Map<String, Value>),
    Text(String),
    Empty,
}

impl BioPayload {
    /// Classify a raw JSON payload. Strings that hold a JSON object are
    /// treated as structured.
    pub fn classify(raw: &Value) -> Self {
        match raw {
            Value::Object(map) => BioPayload::Structured(map.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.starts_with('{')
                    && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed)
                {
                    return BioPayload::Structured(map);
                }
                BioPayload::Text(s.clone())
            }
            _ => BioPayload::Empty,
        }
    }
}

/// Pick the advisory out of a physiology row: `analysis_summary`, then
/// `advice`, then the row itself.
pub fn advisory_payload(row: &Value) -> &Value {
    if let Value::Object(map) = row {
        for key in ["analysis_summary", "advice"] {
            if let Some(v) = map.get(key)
                && is_truthy(v)
            {
                return v;
            }
        }
    }
    row
}

/// Parse a raw biometric payload into metrics. Never returns an empty list.
pub fn parse(raw: &Value) -> Vec<BioMetric> {
    parse_payload(&BioPayload::classify(raw))
}

/// Parse an already classified payload. First applicable branch wins.
pub fn parse_payload(payload: &BioPayload) -> Vec<BioMetric> {
    let metrics = match payload {
        BioPayload::Structured(map) => parse_structured(map),
        BioPayload::Text(text) => parse_text(text),
        BioPayload::Empty => Vec::new(),
    };
    if metrics.is_empty() {
        vec![BioMetric::no_data()]
    } else {
        metrics
    }
}

/// Structured branch: fixed field order, one metric per present field.
pub fn parse_structured(map: &Map<String, Value>) -> Vec<BioMetric> {
    let fields: [(&str, &str, &str, BioCategory); 4] = [
        ("diagnosis", "tcm_state", "TCM STATE", BioCategory::Verdict),
        ("diagnosis", "summary", "ANALYSIS", BioCategory::Neutral),
        ("directives", "training", "TRAINING", BioCategory::Training),
        ("directives", "nutrition", "NUTRITION", BioCategory::Nutrition),
    ];

    fields
        .iter()
        .filter_map(|(section, field, label, category)| {
            let value = map.get(*section)?.get(*field)?;
            let text = field_text(value)?;
            Some(BioMetric::new(label, text, *category))
        })
        .collect()
}

/// Free-text branch: label-delimited extraction over the cleaned string.
pub fn parse_text(raw: &str) -> Vec<BioMetric> {
    let clean = normalize(raw);
    let keys = &*TEXT_KEYS;
    let mut metrics = Vec::new();

    for (i, (pattern, label, category)) in keys.iter().enumerate() {
        let Some(m) = pattern.find(&clean) else {
            continue;
        };
        let start = m.end();
        let end = keys
            .get(i + 1)
            .and_then(|(next, _, _)| next.find(&clean[start..]))
            .map(|next| start + next.start())
            .unwrap_or(clean.len());

        if let Some(value) = tidy_value(&clean[start..end]) {
            metrics.push(BioMetric::new(label, value, *category));
        }
    }

    metrics
}

/// Collapse markup punctuation and whitespace runs to single spaces.
fn normalize(raw: &str) -> String {
    let stripped = MARKUP.replace_all(raw, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn tidy_value(raw: &str) -> Option<String> {
    let value = raw.trim();
    let value = value
        .strip_suffix('.')
        .or_else(|| value.strip_suffix(';'))
        .unwrap_or(value);
    let value = if value.chars().count() > BIO_VALUE_MAX_LEN {
        value.split('(').next().unwrap_or(value).trim()
    } else {
        value
    };
    (!value.is_empty()).then(|| value.to_string())
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(metrics: &[BioMetric]) -> Vec<&str> {
        metrics.iter().map(|m| m.label.as_str()).collect()
    }

    #[test]
    fn test_structured_all_fields_in_order() {
        let raw = json!({
            "directives": { "nutrition": "Warm congee", "training": "Zone 2, 30 min" },
            "diagnosis": { "summary": "Mild fatigue", "tcm_state": "Qi deficiency" }
        });
        let metrics = parse(&raw);
        assert_eq!(labels(&metrics), vec!["TCM STATE", "ANALYSIS", "TRAINING", "NUTRITION"]);
        assert_eq!(metrics[0].category, BioCategory::Verdict);
        assert_eq!(metrics[1].category, BioCategory::Neutral);
        assert_eq!(metrics[3].value, "Warm congee");
    }

    #[test]
    fn test_structured_training_only() {
        let metrics = parse(&json!({ "directives": { "training": "Rest day" } }));
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].category, BioCategory::Training);
        assert_eq!(metrics[0].value, "Rest day");
    }

    #[test]
    fn test_structured_never_falls_through_to_text() {
        // An object whose only content looks like prose still yields the fallback.
        let metrics = parse(&json!({ "note": "Sleep: 7h HRV: 60" }));
        assert_eq!(metrics, vec![BioMetric::no_data()]);
    }

    #[test]
    fn test_structured_blank_fields_ignored() {
        let metrics = parse(&json!({ "diagnosis": { "tcm_state": "  ", "summary": "ok" } }));
        assert_eq!(labels(&metrics), vec!["ANALYSIS"]);
    }

    #[test]
    fn test_text_all_keys() {
        let metrics = parse(&json!("Sleep: 6.8h HRV: 58 Risks: Low attention Verdict: Stable"));
        assert_eq!(labels(&metrics), vec!["SLEEP", "HRV", "RISKS", "VERDICT"]);
        assert_eq!(metrics[0].value, "6.8h");
        assert_eq!(metrics[1].value, "58");
        assert_eq!(metrics[2].value, "Low attention");
        assert_eq!(metrics[3].value, "Stable");
        assert_eq!(metrics[2].category, BioCategory::Risk);
    }

    #[test]
    fn test_text_markup_and_trailing_punctuation() {
        let raw = "## Report\n> **Sleep:** 7h 10m.\n• **HRV** 61;\n**Risks:** none.\n**Verdict:** Train hard.";
        let metrics = parse_text(raw);
        assert_eq!(labels(&metrics), vec!["SLEEP", "HRV", "RISKS", "VERDICT"]);
        assert_eq!(metrics[0].value, "7h 10m");
        assert_eq!(metrics[1].value, "61");
        assert_eq!(metrics[2].value, "none");
        assert_eq!(metrics[3].value, "Train hard");
    }

    #[test]
    fn test_text_missing_link_runs_to_end() {
        // Without a Risks label the HRV value runs to the end of the string.
        let metrics = parse_text("HRV: 61; Verdict: go");
        assert_eq!(metrics[0].value, "61; Verdict: go");
        assert_eq!(metrics[1].value, "go");
    }

    #[test]
    fn test_text_case_insensitive_labels() {
        let metrics = parse_text("sleep: 5h hrv: 40 RISKS: burnout verdict: rest");
        assert_eq!(labels(&metrics), vec!["SLEEP", "HRV", "RISKS", "VERDICT"]);
        assert_eq!(metrics[2].value, "burnout");
    }

    #[test]
    fn test_text_next_label_searched_after_current() {
        // "HRV" appears before "Sleep"; the sleep value must still end at the
        // HRV label that follows it, not the earlier one.
        let metrics = parse_text("HRV: 55 Sleep: 8h HRV trend: flat");
        assert_eq!(metrics[0].label, "SLEEP");
        assert_eq!(metrics[0].value, "8h");
        assert_eq!(metrics[1].label, "HRV");
        assert_eq!(metrics[1].value, "55 Sleep: 8h HRV trend: flat");
    }

    #[test]
    fn test_text_long_value_cut_at_parenthesis() {
        let raw = "Verdict: Stable overall with minor deficits that should resolve within days (see appendix for detail)";
        let metrics = parse_text(raw);
        assert_eq!(
            metrics[0].value,
            "Stable overall with minor deficits that should resolve within days"
        );
    }

    #[test]
    fn test_text_without_keys_falls_back() {
        assert_eq!(parse(&json!("All good today")), vec![BioMetric::no_data()]);
    }

    #[test]
    fn test_empty_inputs_fall_back() {
        for raw in [Value::Null, json!(""), json!({}), json!([]), json!(42)] {
            assert_eq!(parse(&raw), vec![BioMetric::no_data()], "input {raw}");
        }
    }

    #[test]
    fn test_json_string_is_structured() {
        let raw = json!(r#"{"directives":{"nutrition":"Ginger tea"}}"#);
        let metrics = parse(&raw);
        assert_eq!(labels(&metrics), vec!["NUTRITION"]);
    }

    #[test]
    fn test_advisory_payload_unwraps_envelope() {
        let row = json!({ "analysis_summary": "", "advice": "Sleep: 6h", "other": 1 });
        assert_eq!(advisory_payload(&row), &json!("Sleep: 6h"));

        let structured = json!({ "analysis_summary": { "directives": { "training": "Walk" } } });
        assert_eq!(parse(advisory_payload(&structured))[0].value, "Walk");

        let bare = json!("Verdict: ok");
        assert_eq!(advisory_payload(&bare), &bare);
    }
}
