//! The game map: a fixed-size tile grid partitioned into sectors.

pub mod sector;
pub mod terrain;

pub use sector::Sector;
pub use terrain::Terrain;

use std::collections::HashMap;

use thiserror::Error;

use crate::entity::EntityId;
use crate::geometry::Location;
use crate::team::TeamId;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("location {loc} is outside the map bounds ({width}x{height})")]
    OutOfBounds { loc: Location, width: u32, height: u32 },

    #[error("sector top-left {loc} is not {sector_size}-aligned")]
    MisalignedSector { loc: Location, sector_size: u32 },

    #[error("no sector registered at top-left {loc}")]
    NoSuchSector { loc: Location },
}

/// An immutable tile grid with two mutable indices layered on top: which team controls
/// each sector, and which entity (if any) occupies each cell.
#[derive(Clone, Debug)]
pub struct Map {
    width: u32,
    height: u32,
    tiles: Vec<Vec<Terrain>>,
    sector_size: u32,
    sectors: HashMap<Location, Sector>,
    /// Surface occupancy: the entity id standing on each cell, excluding held entities.
    occupied: HashMap<Location, EntityId>,
}

impl Map {
    pub fn new(width: u32, height: u32, tiles: Vec<Vec<Terrain>>, sector_size: u32) -> Self {
        let mut sectors = HashMap::new();
        let mut x = 0;
        while x < width {
            let mut y = 0;
            while y < height {
                let top_left = Location::new(x as i32, y as i32);
                sectors.insert(top_left, Sector::new(top_left));
                y += sector_size;
            }
            x += sector_size;
        }

        Self {
            width,
            height,
            tiles,
            sector_size,
            sectors,
            occupied: HashMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub fn location_on_map(&self, loc: Location) -> bool {
        loc.x >= 0 && loc.y >= 0 && (loc.x as u32) < self.width && (loc.y as u32) < self.height
    }

    pub fn tile_at(&self, loc: Location) -> Option<Terrain> {
        if !self.location_on_map(loc) {
            return None;
        }
        self.tiles
            .get(loc.y as usize)
            .and_then(|row| row.get(loc.x as usize))
            .copied()
    }

    /// The entity id occupying `loc`'s surface, if any. Held entities never appear here.
    pub fn entity_at(&self, loc: Location) -> Option<EntityId> {
        self.occupied.get(&loc).copied()
    }

    pub fn is_occupied(&self, loc: Location) -> bool {
        self.occupied.contains_key(&loc)
    }

    pub(crate) fn set_occupant(&mut self, loc: Location, id: EntityId) {
        self.occupied.insert(loc, id);
    }

    pub(crate) fn clear_occupant(&mut self, loc: Location) {
        self.occupied.remove(&loc);
    }

    /// Clear `loc` only if it is still occupied by `id`; this is the defensive variant
    /// used when killing entities, where a stale location could otherwise clobber
    /// whatever has since moved in.
    pub(crate) fn clear_occupant_if(&mut self, loc: Location, id: EntityId) {
        if self.occupied.get(&loc) == Some(&id) {
            self.occupied.remove(&loc);
        }
    }

    pub(crate) fn occupied_iter(&self) -> impl Iterator<Item = (&Location, &EntityId)> {
        self.occupied.iter()
    }

    /// The sector this location belongs to, keyed by its `sector_size`-aligned top-left.
    pub fn sector_at(&self, loc: Location) -> Result<&Sector, MapError> {
        if !self.location_on_map(loc) {
            return Err(MapError::OutOfBounds {
                loc,
                width: self.width,
                height: self.height,
            });
        }
        let s = self.sector_size as i32;
        let top_left = Location::new(loc.x - loc.x.rem_euclid(s), loc.y - loc.y.rem_euclid(s));
        self.sectors
            .get(&top_left)
            .ok_or(MapError::NoSuchSector { loc: top_left })
    }

    pub fn sectors(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.values()
    }

    /// Apply a `changedSectors` update: look up each sector by its top-left and set its
    /// controlling team.
    pub(crate) fn update_sectors(
        &mut self,
        updates: impl IntoIterator<Item = (Location, Option<TeamId>)>,
    ) -> Result<(), MapError> {
        for (top_left, controlling_team) in updates {
            if top_left.x.rem_euclid(self.sector_size as i32) != 0
                || top_left.y.rem_euclid(self.sector_size as i32) != 0
            {
                return Err(MapError::MisalignedSector {
                    loc: top_left,
                    sector_size: self.sector_size,
                });
            }
            let sector = self
                .sectors
                .get_mut(&top_left)
                .ok_or(MapError::NoSuchSector { loc: top_left })?;
            sector.controlling_team = controlling_team;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grass_map(w: u32, h: u32, sector_size: u32) -> Map {
        let tiles = vec![vec![Terrain::Grass; w as usize]; h as usize];
        Map::new(w, h, tiles, sector_size)
    }

    #[test]
    fn sectors_exactly_tile_the_map() {
        let map = grass_map(4, 4, 2);
        assert_eq!(map.sectors().count(), 4);
        for sector in map.sectors() {
            assert_eq!(sector.top_left.x % 2, 0);
            assert_eq!(sector.top_left.y % 2, 0);
        }
    }

    #[test]
    fn sector_at_rounds_down_to_alignment() {
        let map = grass_map(4, 4, 2);
        let sector = map.sector_at(Location::new(3, 1)).unwrap();
        assert_eq!(sector.top_left, Location::new(2, 0));
    }

    #[test]
    fn location_on_map_rejects_negative_and_overflow() {
        let map = grass_map(2, 1, 2);
        assert!(map.location_on_map(Location::new(0, 0)));
        assert!(map.location_on_map(Location::new(1, 0)));
        assert!(!map.location_on_map(Location::new(2, 0)));
        assert!(!map.location_on_map(Location::new(-1, 0)));
    }

    #[test]
    fn occupancy_clear_if_is_defensive() {
        let mut map = grass_map(2, 2, 2);
        let loc = Location::new(0, 0);
        map.set_occupant(loc, EntityId(1));
        map.set_occupant(loc, EntityId(2));
        map.clear_occupant_if(loc, EntityId(1));
        assert_eq!(map.entity_at(loc), Some(EntityId(2)));
        map.clear_occupant_if(loc, EntityId(2));
        assert_eq!(map.entity_at(loc), None);
    }
}
