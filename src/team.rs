//! Teams: the belligerents a unit or statue can belong to.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TeamId(pub u32);

/// Information about a team, as reported by the server's `start` handshake.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Team {
    #[serde(rename = "teamID")]
    pub id: TeamId,
    pub name: String,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.name, self.id.0)
    }
}
