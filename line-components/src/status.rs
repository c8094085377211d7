use serde::{Deserialize, Serialize};
use std::fmt;

/// What a station is doing. Sources never starve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting on an empty input buffer.
    Starving,
    /// Working on (or, for a source, creating) an item.
    Processing,
    /// Holding a finished item while the output buffer is full.
    Blocked,
    /// Down until repaired.
    Failed,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Starving, Status::Processing, Status::Blocked, Status::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Starving => "starving",
            Status::Processing => "processing",
            Status::Blocked => "blocked",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
