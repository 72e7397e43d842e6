//! Error types.
//!
//! Two families, per the library's error handling design: [`StateError`] covers problems
//! applying a server frame to the world mirror (a subset of which are fatal [`ProtocolError`]s
//! once wrapped by [`crate::game::Game`]); everything else illegal that a *bot* attempts
//! (queuing an action on an entity that can't perform it) is a `debug_assert!` at the call
//! site, not a typed error, per the spec's error handling design.

use thiserror::Error;

use crate::entity::EntityId;
use crate::geometry::Location;
use crate::map::MapError;

/// Something went wrong applying a server update to the world mirror.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("entity {id:?} has no prior state and the update omitted its {field}")]
    MissingField { id: EntityId, field: &'static str },

    #[error("entity {id:?}'s {field} changed from {old} to {new}, but {field} is immutable")]
    ImmutableFieldChanged {
        id: EntityId,
        field: &'static str,
        old: String,
        new: String,
    },

    #[error("entity update named unknown team {team:?}")]
    UnknownTeam { team: crate::team::TeamId },

    #[error(transparent)]
    Map(#[from] MapError),

    #[error("occupancy mismatch at {loc}: map says {map_says:?}, entity {entity:?} disagrees")]
    OccupancyMismatch {
        loc: Location,
        map_says: Option<EntityId>,
        entity: EntityId,
    },

    #[error("map occupancy at {loc} points at entity {id:?}, which no longer exists")]
    DanglingOccupant { loc: Location, id: EntityId },

    #[error("keyframe lists {got} entities, live mirror has {expected}")]
    KeyframeEntityCountMismatch { expected: usize, got: usize },

    #[error("keyframe references entity {id:?}, which the live mirror doesn't have")]
    KeyframeUnknownEntity { id: EntityId },

    #[error("keyframe disagrees with the live mirror about entity {id:?}")]
    KeyframeEntityMismatch { id: EntityId },

    #[error("keyframe disagrees with the live mirror about the sector at {loc}")]
    KeyframeSectorMismatch { loc: Location },
}

/// A fatal protocol-level failure: malformed frames, a server-sent `error`, or a keyframe
/// that disagrees with the live mirror. All of these end the game.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("server reported an error: {reason}")]
    ServerError { reason: String },

    #[error("unexpected frame: expected {expected}, got {got}")]
    UnexpectedFrame { expected: &'static str, got: String },

    #[error("keyframe reconciliation failed: {0}")]
    KeyframeMismatch(#[source] StateError),

    #[error("the connection closed before the handshake completed")]
    HandshakeIncomplete,

    #[error("map tile grid contains unrecognised terrain code {0:?}")]
    UnknownTerrain(char),

    #[error(transparent)]
    State(#[from] StateError),
}

/// The single error type exposed at the [`crate::game::Game`] API boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}
