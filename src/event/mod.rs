use crate::state::{BusLocation, Notification};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod validation;
#[cfg(test)]
mod tests;

pub use validation::{validate_bus_location, DecodeError};

/// Topic carrying live bus telemetry
pub const BUS_LOCATION_TOPIC: &str = "bus-location";

/// Topic carrying operator notifications
pub const NOTIFICATION_TOPIC: &str = "notification";

/// Wire envelope shared by every feed message.
///
/// ```json
/// { "type": "bus-location", "data": { "busId": "bus-1", ... } }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub topic: String,

    /// Topic-specific payload
    #[serde(default)]
    pub data: Value,
}

/// A decoded feed message, typed per topic
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent {
    BusLocation(BusLocation),
    Notification(Notification),
    /// Any topic without a typed payload; delivered as raw JSON
    Other { topic: String, data: Value },
}

impl FeedEvent {
    pub fn topic(&self) -> &str {
        match self {
            FeedEvent::BusLocation(_) => BUS_LOCATION_TOPIC,
            FeedEvent::Notification(_) => NOTIFICATION_TOPIC,
            FeedEvent::Other { topic, .. } => topic,
        }
    }

    /// Decode a text frame into a typed event.
    ///
    /// Known topics must carry a well-formed payload; bus telemetry is also
    /// range-checked. Unknown topics pass through untouched.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, DecodeError> {
        let Envelope { topic, data } = envelope;

        if topic.is_empty() {
            return Err(DecodeError::MissingTopic);
        }

        match topic.as_str() {
            BUS_LOCATION_TOPIC => {
                let bus: BusLocation = serde_json::from_value(data).map_err(|e| {
                    DecodeError::InvalidPayload {
                        topic: topic.clone(),
                        reason: e.to_string(),
                    }
                })?;
                validate_bus_location(&bus)?;
                Ok(FeedEvent::BusLocation(bus))
            }
            NOTIFICATION_TOPIC => {
                let notification: Notification = serde_json::from_value(data).map_err(|e| {
                    DecodeError::InvalidPayload {
                        topic: topic.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(FeedEvent::Notification(notification))
            }
            _ => Ok(FeedEvent::Other { topic, data }),
        }
    }

    pub fn to_envelope(&self) -> serde_json::Result<Envelope> {
        let data = match self {
            FeedEvent::BusLocation(bus) => serde_json::to_value(bus)?,
            FeedEvent::Notification(notification) => serde_json::to_value(notification)?,
            FeedEvent::Other { data, .. } => data.clone(),
        };
        Ok(Envelope {
            topic: self.topic().to_string(),
            data,
        })
    }

    /// Encode as a wire envelope (used by test servers and tooling)
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_envelope()?)
    }
}
