use serde::{Deserialize, Serialize};
use std::fmt;

/// Device slot used when the caller does not discriminate devices.
pub const DEFAULT_DEVICE_ID: &str = "default";

const MAX_DEVICE_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeviceIdError {
    #[error("device id longer than 128 characters")]
    TooLong,
    #[error("device id contains whitespace or control characters")]
    InvalidCharacter,
}

impl DeviceId {
    /// Absent, empty and blank ids all collapse to [`DEFAULT_DEVICE_ID`].
    pub fn from_optional(raw: Option<&str>) -> Result<Self, DeviceIdError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(id) => Self::parse(id),
        }
    }

    pub fn parse(id: &str) -> Result<Self, DeviceIdError> {
        if id.chars().count() > MAX_DEVICE_ID_LEN {
            return Err(DeviceIdError::TooLong);
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DeviceIdError::InvalidCharacter);
        }
        Ok(DeviceId(id.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId(DEFAULT_DEVICE_ID.to_owned())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
