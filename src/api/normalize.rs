// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error body normalization.

use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::error::ApiError;

/// Used when neither the body nor the status says anything useful.
pub const GENERIC_MESSAGE: &str = "Unexpected error, please try again";

/// Body fields checked for a message, in order.
const MESSAGE_FIELDS: [&str; 2] = ["message", "error"];

/// Pick a human-readable message for a failed response.
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) {
        for name in MESSAGE_FIELDS {
            if let Some(Value::String(text)) = fields.get(name) {
                if !text.trim().is_empty() {
                    return text.clone();
                }
            }
        }
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| GENERIC_MESSAGE.to_string())
}

/// Consume a failed response into an [`ApiError`].
pub async fn from_response(response: Response) -> ApiError {
    let status = response.status();
    // An unreadable body still yields a status-based message.
    let body = response.bytes().await.unwrap_or_default();
    ApiError::new(status, error_message(status, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_field_wins() {
        let body = br#"{"status":409,"error":"Conflict","message":"Barcode already exists"}"#;
        assert_eq!(
            error_message(StatusCode::CONFLICT, body),
            "Barcode already exists"
        );
    }

    #[test]
    fn error_field_is_second_choice() {
        let body = br#"{"error":"Insufficient stock"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Insufficient stock"
        );

        let blank_message = br#"{"message":"  ","error":"Insufficient stock"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, blank_message),
            "Insufficient stock"
        );
    }

    #[test]
    fn status_text_when_body_has_nothing() {
        assert_eq!(error_message(StatusCode::NOT_FOUND, b""), "Not Found");
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, b"<html>upstream</html>"),
            "Bad Gateway"
        );
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, br#"{"message": 42}"#),
            "Forbidden"
        );
    }

    #[test]
    fn generic_message_for_unknown_status() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(error_message(status, b"{}"), GENERIC_MESSAGE);
    }
}
