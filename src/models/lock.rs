use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Edit lock held by a user on a drawing
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct DrawingLock {
    pub drawing_id: String,
    pub user_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DrawingLock {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Request body for acquiring or releasing a lock
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LockRequest {
    pub user_id: String,
}

/// Current lock state of a drawing
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LockStatusResponse {
    pub drawing_id: String,
    pub locked: bool,
    pub lock: Option<DrawingLock>,
}

/// Response returned after releasing a lock
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LockReleaseResponse {
    pub success: bool,
}
