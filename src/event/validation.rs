use crate::state::BusLocation;
use std::fmt;

/// Reasons an inbound frame is dropped
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Not a JSON envelope at all
    Malformed(String),
    MissingTopic,
    /// Known topic whose payload has the wrong shape
    InvalidPayload { topic: String, reason: String },
    /// Well-formed payload carrying an impossible value
    InvalidValue { field: &'static str, value: f64 },
    /// Binary frame that is not UTF-8
    NotUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(reason) => write!(f, "malformed envelope: {}", reason),
            DecodeError::MissingTopic => write!(f, "envelope type is required"),
            DecodeError::InvalidPayload { topic, reason } => {
                write!(f, "invalid payload for topic '{}': {}", topic, reason)
            }
            DecodeError::InvalidValue { field, value } => {
                write!(f, "invalid value for '{}': {}", field, value)
            }
            DecodeError::NotUtf8 => write!(f, "binary frame is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Range-checks bus telemetry.
///
/// Rules:
/// - lat in [-90, 90], lng in [-180, 180], both finite
/// - heading in [0, 360)
/// - speed finite and non-negative
///
/// Occupancy above capacity is accepted.
pub fn validate_bus_location(bus: &BusLocation) -> Result<(), DecodeError> {
    if !bus.lat.is_finite() || !(-90.0..=90.0).contains(&bus.lat) {
        return Err(DecodeError::InvalidValue {
            field: "lat",
            value: bus.lat,
        });
    }
    if !bus.lng.is_finite() || !(-180.0..=180.0).contains(&bus.lng) {
        return Err(DecodeError::InvalidValue {
            field: "lng",
            value: bus.lng,
        });
    }
    if !bus.heading.is_finite() || !(0.0..360.0).contains(&bus.heading) {
        return Err(DecodeError::InvalidValue {
            field: "heading",
            value: bus.heading,
        });
    }
    if !bus.speed.is_finite() || bus.speed < 0.0 {
        return Err(DecodeError::InvalidValue {
            field: "speed",
            value: bus.speed,
        });
    }
    Ok(())
}
