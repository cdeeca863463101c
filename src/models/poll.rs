use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response returned when a long-polling session is opened
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct PollOpenResponse {
    pub sid: String,
}
