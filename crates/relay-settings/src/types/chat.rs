//! Message and room settings.

use serde::{Deserialize, Serialize};

/// Message validation and history settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageSettings {
    /// Maximum message length in characters.
    pub max_length: usize,
    /// History page size when the caller gives none.
    pub history_default_limit: usize,
    /// Upper bound on the history page size.
    pub history_max_limit: usize,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            max_length: 1000,
            history_default_limit: 50,
            history_max_limit: 100,
        }
    }
}

/// Room bootstrap settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Name of the public room created at startup.
    pub default_room_name: String,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            default_room_name: "General".to_string(),
        }
    }
}
