//! Constants and the pure trajectory computation the speculation engine leans on.
//!
//! The actual mutating logic (`apply_move`, `apply_throw`, etc.) lives on
//! [`crate::state::State`] since it needs direct access to `entities` and `map`; this module
//! holds the tunable numbers and the one piece of geometry worth testing in isolation.

use crate::entity::EntityId;
use crate::geometry::{Direction, Location};
use crate::map::Map;

pub const THROW_RANGE: i32 = 7;
pub const THROW_ENTITY_DAMAGE: u16 = 4;
pub const THROW_ENTITY_RECOIL: u16 = 2;
pub const THROW_ENTITY_DIRT: u16 = 1;

pub const MOVE_COOLDOWN: u64 = 1;
pub const BUILD_COOLDOWN: u64 = 10;
pub const PICKUP_COOLDOWN: u64 = 10;
pub const THROW_COOLDOWN: u64 = 10;

/// Where a thrown entity ends up, and what (if anything) it hit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ThrowTrajectory {
    pub landing: Location,
    pub hit: Option<EntityId>,
}

/// Walk up to `THROW_RANGE` cells from `start` in `dir`, stopping at the first off-map or
/// occupied cell. The thrown entity lands one cell short of whatever stopped it.
pub(crate) fn throw_trajectory(map: &Map, start: Location, dir: Direction) -> ThrowTrajectory {
    let mut cell = start + dir;
    for _ in 0..THROW_RANGE {
        if !map.location_on_map(cell) || map.is_occupied(cell) {
            break;
        }
        cell = cell + dir;
    }
    let hit = if map.location_on_map(cell) {
        map.entity_at(cell)
    } else {
        None
    };
    let landing = cell.offset(-dir.dx, -dir.dy);
    ThrowTrajectory { landing, hit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Terrain;

    fn grass_map(w: u32, h: u32) -> Map {
        Map::new(w, h, vec![vec![Terrain::Grass; w as usize]; h as usize], w)
    }

    #[test]
    fn clear_throw_lands_at_range_limit() {
        let map = grass_map(20, 1);
        let t = throw_trajectory(&map, Location::new(0, 0), Direction::EAST);
        assert_eq!(t.landing, Location::new(THROW_RANGE, 0));
        assert_eq!(t.hit, None);
    }

    #[test]
    fn throw_stops_short_of_an_occupant() {
        let mut map = grass_map(20, 1);
        map.set_occupant(Location::new(3, 0), EntityId(42));
        let t = throw_trajectory(&map, Location::new(0, 0), Direction::EAST);
        assert_eq!(t.landing, Location::new(2, 0));
        assert_eq!(t.hit, Some(EntityId(42)));
    }

    #[test]
    fn throw_stops_at_map_edge() {
        let map = grass_map(4, 1);
        let t = throw_trajectory(&map, Location::new(0, 0), Direction::EAST);
        assert_eq!(t.landing, Location::new(3, 0));
        assert_eq!(t.hit, None);
    }
}
