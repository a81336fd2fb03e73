use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consumer::ConsumerState;

/// Identity and state snapshot of a consumer, returned for `GET_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    /// Identifier assigned at startup, stable for the process lifetime
    pub consumer_id: Uuid,
    /// Display name
    pub name: String,
    /// Name of the queue this consumer drains
    pub queue_name: String,
    /// Current state machine position
    pub state: ConsumerState,
    /// Host the consumer process runs on, when resolvable
    pub host_name: Option<String>,
    /// Most recent command-handling error, if any
    pub last_error: Option<String>,
    /// When the consumer loop started
    pub started_at: DateTime<Utc>,
}
