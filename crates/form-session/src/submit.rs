use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tracking::TrackingContext;

/// Hard deadline for the submission round-trip.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Error code synthesized when the response cannot be interpreted.
pub const CODE_BAD_RESPONSE: &str = "BAD_RESPONSE";
/// Server-signaled code that starts a cooldown.
pub const CODE_RATE_LIMIT: &str = "RATE_LIMIT";

/// Body posted to the submission endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRequest {
    pub meta: SubmissionMeta,
    pub answers: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMeta {
    pub submitted_at: String,
    pub tracking: TrackingContext,
}

/// Transport-level failure reported by a submission client. The engine adds
/// its own timeout on top, so clients only report reachability.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network unavailable: {0}")]
    Unreachable(String),
}

/// Abstract async call to the submission endpoint. Implementations deliver
/// the raw response body; interpreting it is the session's job. One request
/// is in flight at a time and there is no automatic retry.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, TransportError>;
}

/// Structured result after discriminating the response body.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted {
        submission_id: String,
        analysis_html: String,
    },
    Rejected {
        error_code: String,
        user_message: Option<String>,
        retry_after_seconds: Option<u64>,
    },
}

/// Parses a response body. Anything that is not JSON carrying a boolean
/// `ok` discriminator collapses into a `BAD_RESPONSE` rejection rather than
/// an error.
pub fn interpret_response(body: &str) -> SubmitOutcome {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return bad_response();
    };
    let Some(ok) = value.get("ok").and_then(Value::as_bool) else {
        return bad_response();
    };

    if ok {
        SubmitOutcome::Accepted {
            submission_id: string_at(&value, "submissionId"),
            analysis_html: string_at(&value, "analysis_html"),
        }
    } else {
        SubmitOutcome::Rejected {
            error_code: string_at(&value, "error_code"),
            user_message: value
                .get("message_user")
                .and_then(Value::as_str)
                .map(str::to_string),
            retry_after_seconds: value
                .pointer("/details/retry_after_seconds")
                .and_then(seconds_of),
        }
    }
}

fn bad_response() -> SubmitOutcome {
    SubmitOutcome::Rejected {
        error_code: CODE_BAD_RESPONSE.to_string(),
        user_message: None,
        retry_after_seconds: None,
    }
}

fn string_at(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn seconds_of(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_well_formed_success() {
        let outcome =
            interpret_response(r#"{"ok":true,"submissionId":"abc123","analysis_html":"<p>ok</p>"}"#);
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                submission_id: "abc123".into(),
                analysis_html: "<p>ok</p>".into(),
            }
        );
    }

    #[test]
    fn non_json_bodies_are_bad_responses() {
        let outcome = interpret_response("<html>502</html>");
        assert!(matches!(
            outcome,
            SubmitOutcome::Rejected { error_code, .. } if error_code == CODE_BAD_RESPONSE
        ));
    }

    #[test]
    fn missing_ok_discriminator_is_a_bad_response() {
        let outcome = interpret_response(r#"{"status":"fine"}"#);
        assert!(matches!(
            outcome,
            SubmitOutcome::Rejected { error_code, .. } if error_code == CODE_BAD_RESPONSE
        ));
    }

    #[test]
    fn rejection_carries_code_message_and_retry_delay() {
        let outcome = interpret_response(
            r#"{"ok":false,"error_code":"RATE_LIMIT","message_user":"Slow down.","details":{"retry_after_seconds":30}}"#,
        );
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                error_code: "RATE_LIMIT".into(),
                user_message: Some("Slow down.".into()),
                retry_after_seconds: Some(30),
            }
        );
    }

    #[test]
    fn retry_delay_accepts_numeric_strings() {
        let outcome = interpret_response(
            r#"{"ok":false,"error_code":"RATE_LIMIT","details":{"retry_after_seconds":"45"}}"#,
        );
        assert!(matches!(
            outcome,
            SubmitOutcome::Rejected { retry_after_seconds: Some(45), .. }
        ));
    }
}
