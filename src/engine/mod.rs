pub mod assignment;
pub mod intake;
pub mod otp;
pub mod queries;
pub mod status;

use std::time::Instant;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::models::order::OrderId;
use crate::state::AppState;

fn observe_latency(state: &AppState, operation: &str, start: Instant) {
    state
        .metrics
        .workflow_latency_seconds
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
}

/// Treats absent and blank strings alike.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Form clients send ids and codes either as JSON numbers or as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

fn order_id_from_any<'de, D>(deserializer: D) -> Result<Option<OrderId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(id)) => Ok(Some(id)),
        Some(NumberOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid order id: {text}"))),
    }
}

fn text_from_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<NumberOrText>::deserialize(deserializer)?.map(|value| match value {
            NumberOrText::Number(number) => number.to_string(),
            NumberOrText::Text(text) => text,
        }),
    )
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::{order_id_from_any, text_from_any};

    #[derive(Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "order_id_from_any")]
        id: Option<i64>,
        #[serde(default, deserialize_with = "text_from_any")]
        code: Option<String>,
    }

    fn parse(value: serde_json::Value) -> Result<Body, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn string_and_number_ids_agree() {
        let numeric = parse(serde_json::json!({"id": 42})).unwrap();
        let text = parse(serde_json::json!({"id": " 42 "})).unwrap();
        assert_eq!(numeric.id, Some(42));
        assert_eq!(text.id, Some(42));
    }

    #[test]
    fn absent_null_and_blank_ids_are_missing() {
        assert_eq!(parse(serde_json::json!({})).unwrap().id, None);
        assert_eq!(parse(serde_json::json!({"id": null})).unwrap().id, None);
        assert_eq!(parse(serde_json::json!({"id": ""})).unwrap().id, None);
    }

    #[test]
    fn non_numeric_id_is_an_error() {
        assert!(parse(serde_json::json!({"id": "abc"})).is_err());
    }

    #[test]
    fn numeric_code_becomes_text() {
        let body = parse(serde_json::json!({"code": 4821})).unwrap();
        assert_eq!(body.code.as_deref(), Some("4821"));
    }
}
