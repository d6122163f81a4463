use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Run state of a scan group. A missing status record reads as `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GroupStatus {
    #[default]
    Stopped,
    Started,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Stopped => "stopped",
            GroupStatus::Started => "started",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(GroupStatus::Stopped),
            "started" => Ok(GroupStatus::Started),
            other => Err(ModelError::UnknownVariant {
                kind: "group status",
                value: other.to_string(),
            }),
        }
    }
}
