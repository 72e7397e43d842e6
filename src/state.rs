//! The authoritative (or speculative) client-side mirror of the game world.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::ActionRecord;
use crate::entity::{Entity, EntityId, EntityType, DEFAULT_STATUE_HP};
use crate::error::StateError;
use crate::geometry::{Direction, Location};
use crate::map::{Map, Terrain};
use crate::speculation::{
    self, throw_trajectory, BUILD_COOLDOWN, MOVE_COOLDOWN, PICKUP_COOLDOWN, THROW_COOLDOWN,
};
use crate::team::{Team, TeamId};

/// A single entity's worth of a `nextTurn.changed` or `start.initialState.entities` payload.
///
/// Fields absent on the wire mean "unchanged" for `type_`/`team_id` (only legal once the
/// entity already exists) and "none" for everything else.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityUpdate {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub type_: Option<EntityType>,
    #[serde(rename = "teamID")]
    pub team_id: Option<TeamId>,
    pub location: Location,
    pub hp: u16,
    pub cooldown_end: Option<u64>,
    pub holding_end: Option<u64>,
    #[serde(rename = "heldBy")]
    pub held_by: Option<EntityId>,
    pub holding: Option<EntityId>,
}

/// The world as the client currently understands it: every live entity, the map, the
/// teams, and the bot's own queue of not-yet-submitted actions.
///
/// `State` is a plain value: cloning it (see [`State::clone`]) produces a fully independent
/// snapshot with no back-reference to the connection that produced it.
#[derive(Clone, Debug)]
pub struct State {
    turn: u64,
    entities: HashMap<EntityId, Entity>,
    map: Map,
    teams: HashMap<TeamId, Team>,
    my_team: TeamId,
    action_queue: Vec<ActionRecord>,
    max_id: u64,
    /// Whether `queue_*` methods apply their effect to this State immediately, or merely
    /// record it for the server to confirm.
    speculate: bool,
}

impl State {
    pub fn new(map: Map, teams: HashMap<TeamId, Team>, my_team: TeamId, speculate: bool) -> Self {
        Self {
            turn: 0,
            entities: HashMap::new(),
            map,
            teams,
            my_team,
            action_queue: Vec::new(),
            max_id: 0,
            speculate,
        }
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn my_team(&self) -> TeamId {
        self.my_team
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_at_location(&self, loc: Location) -> Option<EntityId> {
        self.map.entity_at(loc)
    }

    pub fn action_queue(&self) -> &[ActionRecord] {
        &self.action_queue
    }

    /// Drain the queue for submission in a `makeTurn` command. Called by the protocol
    /// driver, never by bot code directly.
    pub(crate) fn drain_action_queue(&mut self) -> Vec<ActionRecord> {
        std::mem::take(&mut self.action_queue)
    }

    pub(crate) fn set_turn(&mut self, turn: u64) {
        self.turn = turn;
    }

    /// Switch whether `queue_*` apply their effect immediately. Used by [`crate::game::Game`]
    /// to hand out snapshots that do or don't speculate, independent of the live mirror's
    /// own setting.
    pub fn set_speculate(&mut self, speculate: bool) {
        self.speculate = speculate;
    }

    // ---- world mutation: update_entities / kill_entities / build_statue / validate ----

    pub fn update_entities(
        &mut self,
        updates: impl IntoIterator<Item = EntityUpdate>,
    ) -> Result<(), StateError> {
        for update in updates {
            self.update_entity(update)?;
        }
        Ok(())
    }

    fn update_entity(&mut self, update: EntityUpdate) -> Result<(), StateError> {
        let id = update.id;
        self.max_id = self.max_id.max(id.0);

        let type_ = match (update.type_, self.entities.get(&id).map(|e| e.type_)) {
            (Some(new), Some(prev)) if new != prev => {
                return Err(StateError::ImmutableFieldChanged {
                    id,
                    field: "type",
                    old: format!("{prev:?}"),
                    new: format!("{new:?}"),
                })
            }
            (Some(new), _) => new,
            (None, Some(prev)) => prev,
            (None, None) => return Err(StateError::MissingField { id, field: "type" }),
        };

        let team = match (update.team_id, self.entities.get(&id).map(|e| e.team)) {
            (Some(new), Some(prev)) if new != prev => {
                return Err(StateError::ImmutableFieldChanged {
                    id,
                    field: "team",
                    old: format!("{prev:?}"),
                    new: format!("{new:?}"),
                })
            }
            (Some(new), _) => new,
            (None, Some(prev)) => prev,
            (None, None) => return Err(StateError::MissingField { id, field: "team" }),
        };
        if !self.teams.contains_key(&team) {
            return Err(StateError::UnknownTeam { team });
        }

        if let Some(old) = self.entities.get(&id) {
            if old.held_by.is_none() {
                self.map.clear_occupant_if(old.location, id);
            }
        }

        let entity = self
            .entities
            .entry(id)
            .or_insert_with(|| Entity::new(id, type_, team, update.location, update.hp));
        entity.type_ = type_;
        entity.team = team;
        entity.location = update.location;
        entity.hp = update.hp;
        entity.cooldown_end = update.cooldown_end;
        entity.holding_end = update.holding_end;
        entity.held_by = update.held_by;
        entity.holding = update.holding;

        if entity.held_by.is_none() {
            self.map.set_occupant(update.location, id);
        }

        Ok(())
    }

    pub fn kill_entities(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        for id in ids {
            if let Some(entity) = self.entities.remove(&id) {
                if entity.held_by.is_none() {
                    self.map.clear_occupant_if(entity.location, id);
                }
            }
        }
    }

    /// Mint and place a new statue belonging to `my_team`. Speculative only; the server
    /// will assign its own id for the real entity on the next `nextTurn`.
    pub(crate) fn build_statue(&mut self, loc: Location) -> EntityId {
        self.max_id += 1;
        let id = EntityId(self.max_id);
        let entity = Entity::new(id, EntityType::Statue, self.my_team, loc, DEFAULT_STATUE_HP);
        self.entities.insert(id, entity);
        self.map.set_occupant(loc, id);
        id
    }

    pub(crate) fn update_sectors(
        &mut self,
        updates: impl IntoIterator<Item = (Location, Option<TeamId>)>,
    ) -> Result<(), StateError> {
        self.map.update_sectors(updates).map_err(StateError::from)
    }

    /// Check the `occupied` ⇔ `entities` bijection (excluding held entities) in both
    /// directions. This is the predicate a `keyframe` reconciliation runs.
    pub fn validate(&self) -> Result<(), StateError> {
        for entity in self.entities.values() {
            if entity.held_by.is_some() {
                continue;
            }
            match self.map.entity_at(entity.location) {
                Some(id) if id == entity.id => {}
                other => {
                    return Err(StateError::OccupancyMismatch {
                        loc: entity.location,
                        map_says: other,
                        entity: entity.id,
                    })
                }
            }
        }
        for (loc, id) in self.map.occupied_iter() {
            let entity = self
                .entities
                .get(id)
                .ok_or(StateError::DanglingOccupant { loc: *loc, id: *id })?;
            if entity.location != *loc || entity.held_by.is_some() {
                return Err(StateError::OccupancyMismatch {
                    loc: *loc,
                    map_says: Some(*id),
                    entity: entity.id,
                });
            }
        }
        Ok(())
    }

    /// Compare a `keyframe` payload against the live mirror: every entity and sector the
    /// keyframe names must agree with what we already believe.
    pub fn validate_keyframe(
        &self,
        entities: &[EntityUpdate],
        sectors: &[(Location, Option<TeamId>)],
    ) -> Result<(), StateError> {
        if entities.len() != self.entities.len() {
            return Err(StateError::KeyframeEntityCountMismatch {
                expected: self.entities.len(),
                got: entities.len(),
            });
        }
        for update in entities {
            let live = self
                .entities
                .get(&update.id)
                .ok_or(StateError::KeyframeUnknownEntity { id: update.id })?;
            let matches = live.location == update.location
                && live.hp == update.hp
                && live.held_by == update.held_by
                && live.holding == update.holding;
            if !matches {
                return Err(StateError::KeyframeEntityMismatch { id: update.id });
            }
        }
        for (top_left, controlling_team) in sectors {
            let live_sector = self.map.sector_at(*top_left)?;
            if live_sector.controlling_team != *controlling_team {
                return Err(StateError::KeyframeSectorMismatch { loc: *top_left });
            }
        }
        Ok(())
    }

    // ---- legality predicates needing map/occupancy context ----

    pub fn can_move(&self, id: EntityId, dir: Direction) -> bool {
        let Some(entity) = self.entities.get(&id) else {
            return false;
        };
        entity.can_act(self.turn) && self.cell_is_free(entity.location + dir)
    }

    pub fn can_build(&self, id: EntityId, dir: Direction) -> bool {
        self.can_move(id, dir)
    }

    pub fn can_pickup(&self, id: EntityId, other: EntityId) -> bool {
        let (Some(entity), Some(target)) = (self.entities.get(&id), self.entities.get(&other))
        else {
            return false;
        };
        entity.can_pickup(target, self.turn)
    }

    pub fn can_throw(&self, id: EntityId, dir: Direction) -> bool {
        let Some(entity) = self.entities.get(&id) else {
            return false;
        };
        entity.is_holding() && entity.can_act(self.turn) && self.cell_is_free(entity.location + dir)
    }

    fn cell_is_free(&self, loc: Location) -> bool {
        self.map.location_on_map(loc) && !self.map.is_occupied(loc)
    }

    /// Entities within strict Euclidean distance `r`, excluding self and (unless
    /// `include_held`) held entities.
    pub fn entities_within_distance(
        &self,
        id: EntityId,
        r: f64,
        include_held: bool,
    ) -> Vec<EntityId> {
        let Some(origin) = self.entities.get(&id) else {
            return Vec::new();
        };
        self.entities
            .values()
            .filter(|e| e.id != id)
            .filter(|e| include_held || e.held_by.is_none())
            .filter(|e| origin.location.distance(e.location) < r)
            .map(|e| e.id)
            .collect()
    }

    /// Despite the name, this forwards `distance.powi(2)` straight into the linear-distance
    /// filter rather than computing a true squared-distance threshold. Kept for parity with
    /// the wire protocol's source material; callers relying on the quirk keep working.
    pub fn entities_within_distance_squared(&self, id: EntityId, distance: f64) -> Vec<EntityId> {
        self.entities_within_distance(id, distance * distance, false)
    }

    // ---- action queue ----

    pub fn queue_move(&mut self, id: EntityId, dir: Direction) {
        let legal = self.can_move(id, dir);
        debug_assert!(legal, "queue_move: {id:?} cannot legally move {dir:?}");
        self.action_queue.push(ActionRecord::Move {
            id,
            dx: dir.dx,
            dy: dir.dy,
        });
        if self.speculate && legal {
            self.apply_move(id, dir);
        }
    }

    pub fn queue_build(&mut self, id: EntityId, dir: Direction) {
        let legal = self.can_build(id, dir);
        debug_assert!(legal, "queue_build: {id:?} cannot legally build {dir:?}");
        self.action_queue.push(ActionRecord::Build {
            id,
            dx: dir.dx,
            dy: dir.dy,
        });
        if self.speculate && legal {
            self.apply_build(id, dir);
        }
    }

    pub fn queue_throw(&mut self, id: EntityId, dir: Direction) {
        let legal = self.can_throw(id, dir);
        debug_assert!(legal, "queue_throw: {id:?} cannot legally throw {dir:?}");
        self.action_queue.push(ActionRecord::Throw {
            id,
            dx: dir.dx,
            dy: dir.dy,
        });
        if self.speculate && legal {
            self.apply_throw(id, dir);
        }
    }

    pub fn queue_pickup(&mut self, id: EntityId, other: EntityId) {
        let legal = self.can_pickup(id, other);
        debug_assert!(
            legal,
            "queue_pickup: {id:?} cannot legally pick up {other:?}"
        );
        self.action_queue.push(ActionRecord::Pickup {
            id,
            pickup_id: other,
        });
        if self.speculate && legal {
            self.apply_pickup(id, other);
        }
    }

    pub fn queue_disintegrate(&mut self, id: EntityId) {
        self.action_queue.push(ActionRecord::Disintegrate { id });
        if self.speculate {
            self.apply_disintegrate(id);
        }
    }

    // ---- speculation engine ----

    fn apply_move(&mut self, id: EntityId, dir: Direction) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let old_loc = entity.location;
        let new_loc = old_loc + dir;
        let holding = entity.holding;
        let turn = self.turn;

        self.map.clear_occupant_if(old_loc, id);
        if let Some(e) = self.entities.get_mut(&id) {
            e.location = new_loc;
            e.cooldown_end = Some(turn + MOVE_COOLDOWN);
        }
        if let Some(held_id) = holding {
            if let Some(held) = self.entities.get_mut(&held_id) {
                held.location = new_loc;
            }
        }
        self.map.set_occupant(new_loc, id);
    }

    fn apply_build(&mut self, id: EntityId, dir: Direction) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let target = entity.location + dir;
        let turn = self.turn;
        if let Some(e) = self.entities.get_mut(&id) {
            e.cooldown_end = Some(turn + BUILD_COOLDOWN);
        }
        self.build_statue(target);
    }

    fn apply_pickup(&mut self, id: EntityId, other: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let self_loc = entity.location;
        let turn = self.turn;

        if let Some(o) = self.entities.get(&other) {
            self.map.clear_occupant_if(o.location, other);
        }
        if let Some(o) = self.entities.get_mut(&other) {
            o.held_by = Some(id);
            o.location = self_loc;
        }
        if let Some(e) = self.entities.get_mut(&id) {
            e.holding = Some(other);
            e.holding_end = Some(turn + PICKUP_COOLDOWN);
            e.cooldown_end = Some(turn + PICKUP_COOLDOWN);
        }
    }

    fn apply_throw(&mut self, id: EntityId, dir: Direction) {
        let Some(thrower) = self.entities.get(&id) else {
            return;
        };
        let thrower_loc = thrower.location;
        let Some(held_id) = thrower.holding else {
            return;
        };
        let turn = self.turn;

        if let Some(t) = self.entities.get_mut(&id) {
            t.holding = None;
            t.holding_end = None;
        }
        if let Some(h) = self.entities.get_mut(&held_id) {
            h.held_by = None;
        }

        let trajectory = throw_trajectory(&self.map, thrower_loc, dir);

        if let Some(target_id) = trajectory.hit {
            self.deal_damage(target_id, speculation::THROW_ENTITY_DAMAGE);
            self.deal_damage(held_id, speculation::THROW_ENTITY_RECOIL);
        }

        if let Some(held) = self.entities.get_mut(&held_id) {
            held.location = trajectory.landing;
        }

        if self.map.tile_at(trajectory.landing) == Some(Terrain::Dirt) {
            self.deal_damage(held_id, speculation::THROW_ENTITY_DIRT);
        }

        if self.entities.contains_key(&held_id) {
            self.map.set_occupant(trajectory.landing, held_id);
        }

        if let Some(t) = self.entities.get_mut(&id) {
            t.cooldown_end = Some(turn + THROW_COOLDOWN);
        }
    }

    fn apply_disintegrate(&mut self, id: EntityId) {
        let Some(hp) = self.entities.get(&id).map(|e| e.hp) else {
            return;
        };
        self.deal_damage(id, hp + 1);
    }

    /// Subtract `amount` from `id`'s HP; if it drops to zero or below, release whatever it
    /// was holding back onto the map and remove it from `entities`.
    fn deal_damage(&mut self, id: EntityId, amount: u16) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        entity.hp = entity.hp.saturating_sub(amount);
        if entity.hp > 0 {
            return;
        }

        let (location, held_by, holding) = (entity.location, entity.held_by, entity.holding);
        if held_by.is_none() {
            self.map.clear_occupant_if(location, id);
        }
        if let Some(carried_id) = holding {
            if let Some(carried) = self.entities.get_mut(&carried_id) {
                carried.held_by = None;
            }
            self.map.set_occupant(location, carried_id);
        }
        if let Some(e) = self.entities.get_mut(&id) {
            e.disintegrated = true;
        }
        self.entities.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Location;
    use crate::map::Terrain;

    fn grass_map(w: u32, h: u32) -> Map {
        Map::new(w, h, vec![vec![Terrain::Grass; w as usize]; h as usize], w)
    }

    fn sample_state() -> State {
        let mut teams = HashMap::new();
        teams.insert(TeamId(0), Team::new(TeamId(0), "Red"));
        teams.insert(TeamId(1), Team::new(TeamId(1), "Blue"));
        State::new(grass_map(10, 10), teams, TeamId(0), true)
    }

    fn thrower_update(id: u64, team: u32, loc: Location) -> EntityUpdate {
        EntityUpdate {
            id: EntityId(id),
            type_: Some(EntityType::Thrower),
            team_id: Some(TeamId(team)),
            location: loc,
            hp: 10,
            cooldown_end: None,
            holding_end: None,
            held_by: None,
            holding: None,
        }
    }

    #[test]
    fn update_entities_populates_occupancy() {
        let mut state = sample_state();
        state
            .update_entities([thrower_update(1, 0, Location::new(2, 2))])
            .unwrap();
        assert_eq!(state.entity_at_location(Location::new(2, 2)), Some(EntityId(1)));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn update_entities_rejects_type_change() {
        let mut state = sample_state();
        state
            .update_entities([thrower_update(1, 0, Location::new(0, 0))])
            .unwrap();
        let mut bad = thrower_update(1, 0, Location::new(0, 1));
        bad.type_ = Some(EntityType::Statue);
        assert!(matches!(
            state.update_entities([bad]),
            Err(StateError::ImmutableFieldChanged { .. })
        ));
    }

    #[test]
    fn move_then_move_back_restores_occupancy() {
        let mut state = sample_state();
        state
            .update_entities([thrower_update(1, 0, Location::new(2, 2))])
            .unwrap();
        state.queue_move(EntityId(1), Direction::EAST);
        assert_eq!(state.entity(EntityId(1)).unwrap().location, Location::new(3, 2));
        state.queue_move(EntityId(1), Direction::WEST);
        assert_eq!(state.entity(EntityId(1)).unwrap().location, Location::new(2, 2));
        assert_eq!(state.entity_at_location(Location::new(2, 2)), Some(EntityId(1)));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn cannot_move_into_occupied_cell() {
        let mut state = sample_state();
        state
            .update_entities([
                thrower_update(1, 0, Location::new(0, 0)),
                thrower_update(2, 1, Location::new(1, 0)),
            ])
            .unwrap();
        assert!(!state.can_move(EntityId(1), Direction::EAST));
    }

    #[test]
    fn build_statue_mints_id_above_server_max() {
        let mut state = sample_state();
        state
            .update_entities([thrower_update(5, 0, Location::new(0, 0))])
            .unwrap();
        state.queue_build(EntityId(5), Direction::EAST);
        let built = state.entity_at_location(Location::new(1, 0)).unwrap();
        assert!(built.0 > 5);
        assert_eq!(state.entity(built).unwrap().type_, EntityType::Statue);
    }

    #[test]
    fn pickup_then_throw_back_restores_held_entity() {
        let mut state = sample_state();
        state
            .update_entities([
                thrower_update(1, 0, Location::new(0, 0)),
                thrower_update(2, 0, Location::new(1, 0)),
            ])
            .unwrap();
        state.queue_pickup(EntityId(1), EntityId(2));
        assert_eq!(state.entity(EntityId(2)).unwrap().held_by, Some(EntityId(1)));
        assert_eq!(state.entity_at_location(Location::new(1, 0)), None);

        state.queue_throw(EntityId(1), Direction::EAST);
        assert_eq!(state.entity(EntityId(1)).unwrap().holding, None);
        let thrown_loc = state.entity(EntityId(2)).unwrap().location;
        assert_eq!(state.entity_at_location(thrown_loc), Some(EntityId(2)));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn throw_into_occupant_deals_damage_and_recoil() {
        let mut state = sample_state();
        state
            .update_entities([
                thrower_update(1, 0, Location::new(0, 0)),
                thrower_update(2, 0, Location::new(1, 0)),
                thrower_update(3, 1, Location::new(3, 0)),
            ])
            .unwrap();
        state.queue_pickup(EntityId(1), EntityId(2));
        state.queue_throw(EntityId(1), Direction::EAST);

        assert_eq!(state.entity(EntityId(3)).unwrap().hp, 6);
        assert_eq!(state.entity(EntityId(2)).unwrap().hp, 8);
        assert_eq!(state.entity(EntityId(2)).unwrap().location, Location::new(2, 0));
    }

    #[test]
    fn fatal_damage_removes_entity_and_frees_cell() {
        let mut state = sample_state();
        state
            .update_entities([thrower_update(1, 0, Location::new(0, 0))])
            .unwrap();
        state.queue_disintegrate(EntityId(1));
        assert!(state.entity(EntityId(1)).is_none());
        assert_eq!(state.entity_at_location(Location::new(0, 0)), None);
    }

    #[test]
    fn kill_entities_is_defensive_about_stale_occupancy() {
        let mut state = sample_state();
        state
            .update_entities([thrower_update(1, 0, Location::new(0, 0))])
            .unwrap();
        state.queue_move(EntityId(1), Direction::EAST);
        // entity 1 now at (1,0); killing by id should never clobber whatever else sits at (0,0).
        state.kill_entities([EntityId(1)]);
        assert_eq!(state.entity_at_location(Location::new(1, 0)), None);
    }
}
