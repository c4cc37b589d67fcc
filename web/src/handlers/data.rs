//! Static demo data endpoint.
//!
//! Served by the data service and mirrored by the ticket server. The landing
//! client deserializes the same type.

use axum::Json;
use serde::{Deserialize, Serialize};

/// Message carried by the demo payload.
pub const DATA_MESSAGE: &str = "Ovo je neki podatak";

/// Value carried by the demo payload.
pub const DATA_VALUE: i64 = 33;

/// `{"message": "...", "value": 33}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPayload {
    /// Human-readable message.
    pub message: String,
    /// Numeric value.
    pub value: i64,
}

impl Default for DataPayload {
    fn default() -> Self {
        Self {
            message: DATA_MESSAGE.to_string(),
            value: DATA_VALUE,
        }
    }
}

/// `GET /data`
#[allow(clippy::unused_async)]
pub async fn data_handler() -> Json<DataPayload> {
    Json(DataPayload::default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn payload_matches_wire_format() {
        let Json(payload) = data_handler().await;
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"message": "Ovo je neki podatak", "value": 33})
        );
    }
}
