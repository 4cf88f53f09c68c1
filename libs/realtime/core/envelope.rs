//! Wire envelope
//!
//! Every frame on the socket is one JSON object:
//! `{ "event": string, "data": any, "timestamp": ISO-8601 }`.

use crate::traits::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire unit exchanged with the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: String,
}

impl Envelope {
    /// Build an envelope stamped with the current UTC time
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Parse a text frame
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to a text frame
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.event, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_envelope_has_iso_timestamp() {
        let envelope = Envelope::new("subscribe", json!({ "channel": "orders:r1" }));

        assert_eq!(envelope.event(), "subscribe");
        assert_eq!(envelope.data()["channel"], "orders:r1");
        assert!(chrono::DateTime::parse_from_rfc3339(envelope.timestamp()).is_ok());
        assert!(envelope.timestamp().ends_with('Z'));
    }

    #[test]
    fn test_encoded_shape() {
        let envelope = Envelope::new("x", json!({}));
        let value: Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["event"], "x");
        assert_eq!(object["data"], json!({}));
        assert!(object["timestamp"].is_string());
    }

    #[test]
    fn test_decode_tolerates_missing_data_and_timestamp() {
        let envelope = Envelope::decode(r#"{"event":"order.created"}"#).unwrap();
        assert_eq!(envelope.event(), "order.created");
        assert!(envelope.data().is_null());
        assert_eq!(envelope.timestamp(), "");
    }

    #[test]
    fn test_decode_rejects_non_envelopes() {
        assert!(Envelope::decode("not json").is_err());
        assert!(Envelope::decode(r#"{"data":{}}"#).is_err());
        assert!(Envelope::decode(r#"{"event":42}"#).is_err());
        assert!(Envelope::decode("[1,2,3]").is_err());
    }
}
