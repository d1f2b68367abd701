//! Conversion logic between DTOs and domain events.

use serde_json::Value;

use crate::domain::Event;
use crate::infrastructure::dto::websocket as dto;

// ========================================
// Domain Event → DTO
// ========================================

impl From<&Event> for dto::EventDto {
    fn from(event: &Event) -> Self {
        match event {
            Event::System { message } => Self {
                r#type: dto::MessageType::System,
                message: message.clone(),
                sender: None,
                timestamp: None,
            },
            Event::Chat {
                message,
                sender,
                timestamp,
            } => Self {
                r#type: dto::MessageType::Message,
                message: message.clone(),
                sender: Some(sender.as_str().to_string()),
                timestamp: Some(timestamp.value()),
            },
        }
    }
}

/// Encode an event into its JSON wire representation
pub fn encode_event(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(&dto::EventDto::from(event))
}

// ========================================
// Raw payload → message text
// ========================================

/// Extract the message text from an inbound payload
///
/// A JSON object with a string `message` field yields that field. Anything
/// else (plain text, arrays, scalars, other objects) yields the raw payload
/// verbatim. Client-supplied `type`, `sender` and `timestamp` are ignored.
pub fn decode_inbound_message(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(mut fields)) => match fields.remove("message") {
            Some(Value::String(message)) => message,
            _ => {
                tracing::debug!("JSON payload has no string `message`, using raw text");
                raw.to_string()
            }
        },
        Ok(_) => {
            tracing::debug!("JSON payload is not an object, using raw text");
            raw.to_string()
        }
        Err(e) => {
            tracing::debug!("Payload is not JSON ({}), using raw text", e);
            raw.to_string()
        }
    }
}
