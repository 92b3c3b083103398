//! Sensor data categories streamed by the VR client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a streamed VR sensor frame.
///
/// The wire representation is the SCREAMING_SNAKE string used by the
/// device protocol (e.g. `"MOVEMENT"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VrDataType {
    /// Controller and body movement samples.
    Movement,
    /// Eye tracking samples.
    Gaze,
    /// Discrete hand gesture events.
    Gesture,
    /// Object interaction events inside the therapy scene.
    Interaction,
    /// Biometric readings (heart rate, skin response).
    Biometric,
}

impl VrDataType {
    /// Returns the wire-format string for this data type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movement => "MOVEMENT",
            Self::Gaze => "GAZE",
            Self::Gesture => "GESTURE",
            Self::Interaction => "INTERACTION",
            Self::Biometric => "BIOMETRIC",
        }
    }

    /// Returns the scoring model family used to analyze this data type.
    ///
    /// Interaction and biometric frames fall back to the movement model.
    #[must_use]
    pub const fn model_family(&self) -> &'static str {
        match self {
            Self::Movement | Self::Interaction | Self::Biometric => "movement",
            Self::Gaze => "gaze",
            Self::Gesture => "gesture",
        }
    }
}

impl fmt::Display for VrDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_screaming_snake() {
        let json = serde_json::to_string(&VrDataType::Movement).unwrap_or_default();
        assert_eq!(json, "\"MOVEMENT\"");
        let parsed: Result<VrDataType, _> = serde_json::from_str("\"BIOMETRIC\"");
        assert_eq!(parsed.ok(), Some(VrDataType::Biometric));
    }

    #[test]
    fn unknown_data_type_rejected() {
        let parsed: Result<VrDataType, _> = serde_json::from_str("\"TELEPATHY\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn model_family_fallback() {
        assert_eq!(VrDataType::Gaze.model_family(), "gaze");
        assert_eq!(VrDataType::Interaction.model_family(), "movement");
        assert_eq!(VrDataType::Biometric.model_family(), "movement");
    }
}
