use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unit of distribution on a bus: a JSON payload plus routing metadata.
///
/// The payload is kept as raw JSON so producers and consumers in different
/// services only share the wire shape, not Rust types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    message_id: Uuid,
    channel: String,
    published_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl Envelope {
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            channel: channel.into(),
            published_at: Utc::now(),
            payload,
        }
    }

    /// Serialize `value` into a new envelope.
    pub fn wrap<T: Serialize>(
        channel: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(channel, serde_json::to_value(value)?))
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn into_payload(self) -> serde_json::Value {
        self.payload
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    #[test]
    fn wrap_then_decode_payload() {
        let env = Envelope::wrap("notification", &Ping { n: 3 }).unwrap();
        assert_eq!(env.channel(), "notification");
        assert_eq!(env.decode::<Ping>().unwrap(), Ping { n: 3 });
    }

    #[test]
    fn wire_form_is_camel_case() {
        let env = Envelope::new("notification", serde_json::json!({}));
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("messageId").is_some());
        assert!(json.get("publishedAt").is_some());
    }
}
