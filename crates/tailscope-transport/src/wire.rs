//! Response decoding and status classification

use reqwest::StatusCode;
use serde::Deserialize;

use tailscope_core::{Cursor, Event, FetchBatch, FetchError};

/// Longest body excerpt carried in an error message
const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBatch {
    events: Vec<Event>,
    next_cursor: Cursor,
}

/// Decode a `{ "events": [...], "nextCursor": ... }` body
///
/// Any malformed event fails the whole batch so the cursor is not advanced
/// past events that were never seen.
pub fn decode_batch(body: &[u8]) -> Result<FetchBatch, FetchError> {
    let wire: WireBatch =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(FetchBatch {
        events: wire.events,
        next_cursor: wire.next_cursor,
    })
}

/// Map a non-success status to a fetch error
pub fn classify_status(status: StatusCode, body: &[u8]) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let mut message = format!("server responded with status {}", status);
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        let preview: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
        message.push_str(": ");
        message.push_str(&preview);
    }

    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(message),
        _ => FetchError::Network(message),
    })
}

pub(crate) fn map_request_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Network("request timed out".to_string())
    } else if error.is_connect() {
        FetchError::Network(format!("connection failed: {}", error))
    } else if error.is_decode() {
        FetchError::Parse(error.to_string())
    } else {
        FetchError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailscope_core::{EventCategory, EventPayload, FetchErrorKind};

    #[test]
    fn test_decode_batch() {
        let body = br#"{
            "events": [
                {"timestamp": 10, "category": "query", "status": "success",
                 "payload": {"path": "users:list", "executionTimeMs": 4.2}},
                {"timestamp": 11, "category": "network",
                 "payload": {"method": "GET", "url": "https://api.example.com", "statusCode": 200}}
            ],
            "nextCursor": 1700000000011
        }"#;
        let batch = decode_batch(body).unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.next_cursor, Cursor::from(1_700_000_000_011));
        assert_eq!(batch.events[0].category, EventCategory::Query);
        assert!(matches!(batch.events[1].payload, EventPayload::Network(_)));
    }

    #[test]
    fn test_decode_text_cursor_and_empty_events() {
        let batch = decode_batch(br#"{"events": [], "nextCursor": "c-42"}"#).unwrap();
        assert!(batch.events.is_empty());
        assert_eq!(batch.next_cursor, Cursor::from("c-42"));
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        let err = decode_batch(b"<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);

        let err = decode_batch(br#"{"events": []}"#).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);

        // One bad event fails the batch
        let err = decode_batch(
            br#"{"events": [{"timestamp": 1, "category": "teleport"}], "nextCursor": 2}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK, b""), None);

        let err = classify_status(StatusCode::UNAUTHORIZED, b"bad token").unwrap();
        assert_eq!(err.kind(), FetchErrorKind::Auth);
        assert!(err.to_string().contains("bad token"));

        let err = classify_status(StatusCode::FORBIDDEN, b"").unwrap();
        assert_eq!(err.kind(), FetchErrorKind::Auth);

        let err = classify_status(StatusCode::BAD_GATEWAY, b"").unwrap();
        assert_eq!(err.kind(), FetchErrorKind::Network);
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(5_000);
        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, body.as_bytes()).unwrap();
        assert!(err.to_string().len() < 400);
    }
}
