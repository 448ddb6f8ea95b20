use super::{DeviceId, UserId};
use serde::{Deserialize, Serialize};

/// Server-side state of one `(user, device)` session. Expiry is carried by the
/// store TTL, not by the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub device_id: DeviceId,
    /// Digest of the only refresh token currently accepted for this device.
    pub hashed_refresh_token: String,
    pub cached_access_token: String,
}
