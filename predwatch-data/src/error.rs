use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `predwatch-data`.
///
/// Every variant leaves the affected stream's store and cursor untouched; the poll loop
/// treats them identically for control flow and only uses the detail for diagnostics.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: ErrorBody },

    #[error("failed to decode feed payload: {0}")]
    Decode(String),

    #[error("invalid feed url: {0}")]
    Url(String),
}

impl FeedError {
    /// Determine if the failure is likely to clear up on its own (network blip, 5xx).
    ///
    /// The scheduler retries every failure on cadence regardless; this only informs
    /// the severity of the operator-facing diagnostic.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Request(_) => true,
            FeedError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Request(value.to_string())
        }
    }
}

impl From<url::ParseError> for FeedError {
    fn from(value: url::ParseError) -> Self {
        Self::Url(value.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Diagnostic body of a non-2xx response, classified by content type.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum ErrorBody {
    Json(String),
    Html(String),
    Text(String),
}

/// Longest diagnostic retained from an error body.
const MAX_DIAGNOSTIC_LEN: usize = 300;

impl ErrorBody {
    /// Classify a raw error body using the response `Content-Type` header.
    pub fn classify(content_type: Option<&str>, body: &str) -> Self {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

        if content_type.contains("json") {
            let message = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|value| {
                    ["error", "detail", "message"]
                        .iter()
                        .find_map(|key| value.get(*key).map(json_to_text))
                })
                .unwrap_or_else(|| body.trim().to_string());
            Self::Json(truncate(&message))
        } else if content_type.contains("html") {
            let title = html_title(body).unwrap_or_else(|| body.trim().to_string());
            Self::Html(truncate(&title))
        } else {
            Self::Text(truncate(body.trim()))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ErrorBody::Json(_) => "json",
            ErrorBody::Html(_) => "html",
            ErrorBody::Text(_) => "text",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorBody::Json(message) | ErrorBody::Html(message) | ErrorBody::Text(message) => {
                message
            }
        }
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind(), self.message())
    }
}

impl From<(StatusCode, ErrorBody)> for FeedError {
    fn from((status, body): (StatusCode, ErrorBody)) -> Self {
        Self::Status {
            status: status.as_u16(),
            body,
        }
    }
}

fn json_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn html_title(body: &str) -> Option<String> {
    let lower = body.to_ascii_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = lower[start..].find("</title>")? + start;
    let title = body[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_classify() {
        struct TestCase {
            content_type: Option<&'static str>,
            body: &'static str,
            expected: ErrorBody,
        }

        let tests = vec![
            TestCase {
                // TC0: json body with detail field
                content_type: Some("application/json"),
                body: r#"{"detail":"symbol not found"}"#,
                expected: ErrorBody::Json("symbol not found".to_string()),
            },
            TestCase {
                // TC1: json content type but body is not json
                content_type: Some("application/json; charset=utf-8"),
                body: "  upstream timeout ",
                expected: ErrorBody::Json("upstream timeout".to_string()),
            },
            TestCase {
                // TC2: html error page uses the title
                content_type: Some("text/html"),
                body: "<html><head><TITLE>502 Bad Gateway</TITLE></head><body>nginx</body></html>",
                expected: ErrorBody::Html("502 Bad Gateway".to_string()),
            },
            TestCase {
                // TC3: missing content type is plain text
                content_type: None,
                body: "Internal Server Error\n",
                expected: ErrorBody::Text("Internal Server Error".to_string()),
            },
            TestCase {
                // TC4: json error field that is not a string
                content_type: Some("application/json"),
                body: r#"{"error":{"code":7}}"#,
                expected: ErrorBody::Json(r#"{"code":7}"#.to_string()),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = ErrorBody::classify(test.content_type, test.body);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_error_body_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let ErrorBody::Text(message) = ErrorBody::classify(Some("text/plain"), &body) else {
            panic!("expected text body");
        };
        assert_eq!(message.chars().count(), MAX_DIAGNOSTIC_LEN + 1);
    }

    #[test]
    fn test_feed_error_is_transient() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: transport failure
                input: FeedError::Request("connection refused".to_string()),
                expected: true,
            },
            TestCase {
                // TC1: 503 from upstream
                input: FeedError::Status {
                    status: 503,
                    body: ErrorBody::Text("busy".to_string()),
                },
                expected: true,
            },
            TestCase {
                // TC2: 404 is not transient
                input: FeedError::Status {
                    status: 404,
                    body: ErrorBody::Json("unknown symbol".to_string()),
                },
                expected: false,
            },
            TestCase {
                // TC3: undecodable body
                input: FeedError::Decode("expected value at line 1".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_transient(), test.expected, "TC{} failed", index);
        }
    }
}
