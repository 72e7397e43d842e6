//! Entities: throwers, statues, and hedges.

use serde::{Deserialize, Serialize};

use crate::geometry::Location;
use crate::team::TeamId;

/// Positive integer, globally unique within a game.
///
/// Server-assigned ids and speculatively-minted ids (see [`crate::state::State::build_statue`])
/// share the same id space; the client only ever mints ids strictly above the highest id it
/// has observed from the server.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EntityId(pub u64);

/// The default HP newly-built statues start with, absent a server override.
pub const DEFAULT_STATUE_HP: u16 = 10;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Thrower,
    Statue,
    Hedge,
}

impl EntityType {
    /// Immobile entities never move or are thrown; they only ever occupy the one cell
    /// they were created or built on.
    pub fn is_mobile(self) -> bool {
        matches!(self, EntityType::Thrower)
    }
}

/// A single game object: a thrower, a statue, or a hedge.
///
/// Entities store only the **ids** of the entities they hold or are held by; there is no
/// cyclic object graph. Resolve `holding`/`held_by` through [`crate::state::State`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub type_: EntityType,
    pub team: TeamId,
    pub location: Location,
    pub hp: u16,
    pub cooldown_end: Option<u64>,
    pub holding: Option<EntityId>,
    pub held_by: Option<EntityId>,
    pub holding_end: Option<u64>,
    /// Set by the speculation engine the instant HP reaches zero; such entities are
    /// removed from `State::entities` in the same step, so this flag is only ever
    /// observed transiently, while a caller still holds a clone of the dying entity.
    #[serde(skip)]
    pub disintegrated: bool,
}

impl Entity {
    pub fn new(id: EntityId, type_: EntityType, team: TeamId, location: Location, hp: u16) -> Self {
        Self {
            id,
            type_,
            team,
            location,
            hp,
            cooldown_end: None,
            holding: None,
            held_by: None,
            holding_end: None,
            disintegrated: false,
        }
    }

    /// Turns remaining before this entity may act again.
    pub fn cooldown(&self, turn: u64) -> u64 {
        match self.cooldown_end {
            None => 0,
            Some(end) if end <= turn => 0,
            Some(end) => end - turn,
        }
    }

    /// Turns remaining until a held entity is auto-dropped, or `0` if not held.
    pub fn turns_until_drop(&self, turn: u64) -> u64 {
        match self.holding_end {
            Some(end) if end > turn => end - turn,
            _ => 0,
        }
    }

    pub fn is_thrower(&self) -> bool {
        self.type_ == EntityType::Thrower
    }

    pub fn is_statue(&self) -> bool {
        self.type_ == EntityType::Statue
    }

    pub fn is_holding(&self) -> bool {
        self.holding.is_some()
    }

    pub fn is_held(&self) -> bool {
        self.held_by.is_some()
    }

    /// A thrower with no cooldown, not held, and not mid-disintegration can act.
    pub fn can_act(&self, turn: u64) -> bool {
        self.cooldown(turn) == 0
            && self.is_thrower()
            && self.held_by.is_none()
            && !self.disintegrated
    }

    /// Whether another entity could legally pick this one up, ignoring distance and
    /// who's asking.
    pub fn can_be_picked(&self) -> bool {
        self.is_thrower() && self.holding.is_none() && self.held_by.is_none()
    }

    /// Whether `self` can pick up `other`, checking everything that doesn't require
    /// consulting the map: both entities' flags and the 8-neighbourhood distance.
    pub fn can_pickup(&self, other: &Entity, turn: u64) -> bool {
        if other.id == self.id {
            return false;
        }
        self.can_act(turn)
            && self.holding.is_none()
            && other.can_be_picked()
            && !other.disintegrated
            && self.location.distance_squared(other.location) <= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thrower(id: u64, team: u32, loc: Location) -> Entity {
        Entity::new(EntityId(id), EntityType::Thrower, TeamId(team), loc, 10)
    }

    #[test]
    fn cooldown_counts_down_to_zero() {
        let mut e = thrower(1, 0, Location::new(0, 0));
        e.cooldown_end = Some(5);
        assert_eq!(e.cooldown(3), 2);
        assert_eq!(e.cooldown(5), 0);
        assert_eq!(e.cooldown(6), 0);
    }

    #[test]
    fn can_act_requires_thrower_no_cooldown_not_held() {
        let mut e = thrower(1, 0, Location::new(0, 0));
        assert!(e.can_act(0));

        e.cooldown_end = Some(5);
        assert!(!e.can_act(0));
        assert!(e.can_act(5));

        e.cooldown_end = None;
        e.held_by = Some(EntityId(99));
        assert!(!e.can_act(0));
    }

    #[test]
    fn can_pickup_checks_distance_and_flags() {
        let a = thrower(1, 0, Location::new(0, 0));
        let adjacent = thrower(2, 0, Location::new(1, 1));
        let far = thrower(3, 0, Location::new(5, 5));

        assert!(a.can_pickup(&adjacent, 0));
        assert!(!a.can_pickup(&far, 0));
        assert!(!a.can_pickup(&a.clone(), 0));
    }

    #[test]
    fn cannot_pickup_already_held_entity() {
        let a = thrower(1, 0, Location::new(0, 0));
        let mut held = thrower(2, 0, Location::new(1, 0));
        held.held_by = Some(EntityId(7));
        assert!(!a.can_pickup(&held, 0));
    }
}
