//! Queued actions: the records a bot accumulates on [`crate::state::State::action_queue`]
//! and that get serialized into a `makeTurn` command's `actions` array.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionRecord {
    Move { id: EntityId, dx: i32, dy: i32 },
    Build { id: EntityId, dx: i32, dy: i32 },
    Throw { id: EntityId, dx: i32, dy: i32 },
    Pickup {
        id: EntityId,
        #[serde(rename = "pickupID")]
        pickup_id: EntityId,
    },
    Disintegrate { id: EntityId },
}

impl ActionRecord {
    /// The id of the entity performing this action.
    pub fn actor(&self) -> EntityId {
        match *self {
            ActionRecord::Move { id, .. }
            | ActionRecord::Build { id, .. }
            | ActionRecord::Throw { id, .. }
            | ActionRecord::Pickup { id, .. }
            | ActionRecord::Disintegrate { id } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pickup_serializes_with_wire_field_names() {
        let record = ActionRecord::Pickup {
            id: EntityId(1),
            pickup_id: EntityId(2),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "pickup");
        assert_eq!(json["pickupID"], 2);
    }

    #[test]
    fn move_serializes_dx_dy() {
        let record = ActionRecord::Move {
            id: EntityId(1),
            dx: 1,
            dy: 0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "move");
        assert_eq!(json["dx"], 1);
        assert_eq!(json["dy"], 0);
    }
}
