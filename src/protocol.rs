//! The wire protocol: newline-delimited JSON frames exchanged with the game server.
//!
//! [`ServerMessage`] and [`ClientCommand`] are tagged on the `command` field, matching the
//! server's vocabulary exactly (`loginConfirm`, `start`, `nextTurn`, `keyframe`,
//! `missedTurn`, `error`, `login`, `makeTurn`). Entity payloads reuse
//! [`crate::state::EntityUpdate`] directly — its field names already line up with the wire.

use serde::{Deserialize, Serialize};

use crate::action::ActionRecord;
use crate::entity::EntityId;
use crate::geometry::Location;
use crate::map::{Map, Terrain};
use crate::state::EntityUpdate;
use crate::team::{Team, TeamId};

/// A `start.initialState.sectors[i]` or `nextTurn.changedSectors[i]` entry.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorDto {
    pub top_left: Location,
    #[serde(rename = "controllingTeamID")]
    pub controlling_team_id: Option<TeamId>,
}

impl SectorDto {
    pub fn into_pair(self) -> (Location, Option<TeamId>) {
        (self.top_left, self.controlling_team_id)
    }
}

/// `start.initialState`: everything needed to build the map and seed the entity table.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialStateDto {
    pub width: u32,
    pub height: u32,
    /// One array per row; each element is a single-character [`Terrain::from_char`] code.
    pub tiles: Vec<Vec<String>>,
    pub sector_size: u32,
    pub entities: Vec<EntityUpdate>,
    pub sectors: Vec<SectorDto>,
}

impl InitialStateDto {
    /// Build the map this payload describes. Fails only if a cell contains a string
    /// that isn't a single recognised terrain code.
    pub fn build_map(&self) -> Result<Map, char> {
        let tiles = self
            .tiles
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        let c = cell.chars().next().unwrap_or('\0');
                        Terrain::from_char(c).ok_or(c)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Map::new(self.width, self.height, tiles, self.sector_size))
    }
}

/// The `keyframe.state` payload: enough of a reference state to validate the live mirror
/// against, without re-sending terrain that never changes.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeStateDto {
    pub entities: Vec<EntityUpdate>,
    pub sectors: Vec<SectorDto>,
}

/// Messages the server sends, tagged by `command`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ServerMessage {
    LoginConfirm {
        #[serde(rename = "teamID")]
        team_id: TeamId,
    },
    Start {
        teams: Vec<Team>,
        initial_state: InitialStateDto,
    },
    NextTurn {
        turn: u64,
        #[serde(default)]
        changed: Vec<EntityUpdate>,
        #[serde(default)]
        dead: Vec<EntityId>,
        #[serde(default)]
        changed_sectors: Vec<SectorDto>,
        #[serde(rename = "lastTeamID")]
        last_team_id: Option<TeamId>,
        #[serde(rename = "nextTeamID")]
        next_team_id: TeamId,
        #[serde(default)]
        failed: Vec<EntityId>,
        #[serde(default)]
        reasons: Vec<String>,
        #[serde(rename = "winnerID")]
        winner_id: Option<TeamId>,
    },
    Keyframe {
        state: KeyframeStateDto,
    },
    MissedTurn {
        turn: u64,
    },
    Error {
        reason: String,
    },
}

/// Commands the client sends, tagged by `command`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ClientCommand {
    Login {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    MakeTurn {
        turn: u64,
        actions: Vec<ActionRecord>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_omits_key_when_absent() {
        let cmd = ClientCommand::Login {
            name: "bot".into(),
            key: None,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "login");
        assert!(json.get("key").is_none());
    }

    #[test]
    fn next_turn_parses_minimal_frame() {
        let raw = r#"{"command":"nextTurn","turn":3,"nextTeamID":0}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::NextTurn {
                turn,
                next_team_id,
                changed,
                dead,
                ..
            } => {
                assert_eq!(turn, 3);
                assert_eq!(next_team_id, TeamId(0));
                assert!(changed.is_empty());
                assert!(dead.is_empty());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn initial_state_builds_map_from_tile_rows() {
        let dto = InitialStateDto {
            width: 2,
            height: 1,
            tiles: vec![vec!["G".to_string(), "D".to_string()]],
            sector_size: 2,
            entities: vec![],
            sectors: vec![],
        };
        let map = dto.build_map().unwrap();
        assert_eq!(map.tile_at(Location::new(0, 0)), Some(Terrain::Grass));
        assert_eq!(map.tile_at(Location::new(1, 0)), Some(Terrain::Dirt));
    }
}
