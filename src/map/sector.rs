//! Sectors: square regions of the map with a controlling team.

use serde::{Deserialize, Serialize};

use crate::geometry::Location;
use crate::team::TeamId;

/// A square tile region of size `sector_size`, whose controlling team the server reports
/// each turn.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sector {
    pub top_left: Location,
    pub controlling_team: Option<TeamId>,
}

impl Sector {
    pub fn new(top_left: Location) -> Self {
        Self {
            top_left,
            controlling_team: None,
        }
    }
}
