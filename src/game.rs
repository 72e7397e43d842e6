//! The protocol driver: owns the transport, performs the login handshake, and drives the
//! turn loop that keeps [`State`] in sync with the server.

use std::collections::HashSet;

use futures::stream::{self, Stream};

use crate::config::Config;
use crate::error::{Error, ProtocolError};
use crate::protocol::{ClientCommand, SectorDto, ServerMessage};
use crate::state::State;
use crate::team::TeamId;
use crate::transport::{Connection, Frame};

/// Connects to the game server, mirrors its authoritative state, and exposes a cursor of
/// per-turn snapshots via [`Game::turns`].
pub struct Game {
    connection: Connection,
    state: State,
    winner: Option<TeamId>,
    missed_turns: HashSet<u64>,
}

impl Game {
    /// Connect, log in as `name`, and drive frames until it's this bot's first turn.
    ///
    /// Resolves the endpoint and login key from the environment; see [`Config::from_env`].
    pub async fn connect(name: impl Into<String>, speculate: bool) -> Result<Self, Error> {
        Self::connect_with(Config::from_env(), name, speculate).await
    }

    /// As [`Game::connect`], but against an explicit [`Config`] rather than the
    /// environment. Exists so tests can point at an in-process fake server.
    pub async fn connect_with(
        config: Config,
        name: impl Into<String>,
        speculate: bool,
    ) -> Result<Self, Error> {
        let mut connection = Connection::open(&config).await?;

        connection
            .send(&ClientCommand::Login {
                name: name.into(),
                key: config.key.clone(),
            })
            .await?;

        let team_id = match recv_one(&mut connection).await? {
            ServerMessage::LoginConfirm { team_id } => team_id,
            other => return Err(unexpected("loginConfirm", &other)),
        };

        let (teams, initial_state) = match recv_one(&mut connection).await? {
            ServerMessage::Start {
                teams,
                initial_state,
            } => (teams, initial_state),
            other => return Err(unexpected("start", &other)),
        };

        let map = initial_state
            .build_map()
            .map_err(ProtocolError::UnknownTerrain)?;
        let teams_map = teams.into_iter().map(|t| (t.id, t)).collect();

        let mut state = State::new(map, teams_map, team_id, speculate);
        state
            .update_entities(initial_state.entities)
            .map_err(ProtocolError::from)?;
        state
            .update_sectors(initial_state.sectors.into_iter().map(SectorDto::into_pair))
            .map_err(ProtocolError::from)?;

        let mut game = Self {
            connection,
            state,
            winner: None,
            missed_turns: HashSet::new(),
        };
        game.drain_until_ready().await?;
        Ok(game)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn winner(&self) -> Option<TeamId> {
        self.winner
    }

    /// Submit the queued actions for the current turn and drive frames until it's this
    /// bot's turn again. Returns `false` once the game has ended (a winner was announced,
    /// or the transport closed).
    pub async fn next_turn(&mut self) -> Result<bool, Error> {
        let turn = self.state.turn();
        if self.missed_turns.remove(&turn) {
            tracing::warn!(turn, "skipping makeTurn: server already reported this turn missed");
            self.state.drain_action_queue();
        } else {
            let actions = self.state.drain_action_queue();
            self.connection
                .send(&ClientCommand::MakeTurn { turn, actions })
                .await?;
        }
        self.drain_until_ready().await
    }

    /// A lazy sequence of per-turn snapshots, one per call to [`Game::next_turn`].
    ///
    /// `speculate` controls whether the yielded snapshot applies the bot's own queued
    /// actions immediately. Every snapshot is an independent clone regardless of `copy`:
    /// aliasing the live mirror across an `.await` the driver itself also mutates isn't
    /// expressible safely without a shared-mutability cell, so `copy` is accepted for
    /// interface parity but has no observable effect.
    pub fn turns(self, copy: bool, speculate: bool) -> impl Stream<Item = State> {
        let _ = copy;
        stream::unfold(Some(self), move |slot| async move {
            let mut game = slot?;
            if game.winner.is_some() {
                return None;
            }
            match game.next_turn().await {
                Ok(true) => {
                    let mut snapshot = game.state.clone();
                    snapshot.set_speculate(speculate);
                    Some((snapshot, Some(game)))
                }
                Ok(false) => None,
                Err(err) => {
                    tracing::error!(error = %err, "turn stream ending after a protocol error");
                    None
                }
            }
        })
    }

    async fn drain_until_ready(&mut self) -> Result<bool, Error> {
        loop {
            match self.connection.poll().await {
                Frame::Timeout => continue,
                Frame::Closed => return Ok(false),
                Frame::Error(err) => return Err(err.into()),
                Frame::Message(msg) => {
                    if let Some(ready) = self.dispatch(msg)? {
                        return Ok(ready);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, msg: ServerMessage) -> Result<Option<bool>, Error> {
        match msg {
            ServerMessage::NextTurn {
                turn,
                changed,
                dead,
                changed_sectors,
                last_team_id,
                next_team_id,
                failed,
                reasons,
                winner_id,
            } => {
                self.state
                    .update_entities(changed)
                    .map_err(ProtocolError::from)?;
                self.state.kill_entities(dead);
                self.state
                    .update_sectors(changed_sectors.into_iter().map(SectorDto::into_pair))
                    .map_err(ProtocolError::from)?;
                self.state.set_turn(turn + 1);

                if last_team_id == Some(self.state.my_team()) {
                    for (id, reason) in failed.iter().zip(reasons.iter()) {
                        tracing::warn!(entity = ?id, reason = %reason, "action rejected by server");
                    }
                }

                if let Some(winner) = winner_id {
                    self.winner = Some(winner);
                    return Ok(Some(false));
                }

                if next_team_id == self.state.my_team() && !self.connection.has_buffered_frame() {
                    return Ok(Some(true));
                }
                Ok(None)
            }
            ServerMessage::Keyframe { state } => {
                let sectors: Vec<_> = state
                    .sectors
                    .into_iter()
                    .map(SectorDto::into_pair)
                    .collect();
                self.state
                    .validate_keyframe(&state.entities, &sectors)
                    .map_err(ProtocolError::KeyframeMismatch)?;
                Ok(None)
            }
            ServerMessage::MissedTurn { turn } => {
                tracing::warn!(turn, "server reports a missed turn");
                self.missed_turns.insert(turn);
                Ok(None)
            }
            ServerMessage::Error { reason } => Err(ProtocolError::ServerError { reason }.into()),
            other @ (ServerMessage::LoginConfirm { .. } | ServerMessage::Start { .. }) => {
                Err(unexpected("nextTurn/keyframe/missedTurn/error", &other))
            }
        }
    }
}

async fn recv_one(connection: &mut Connection) -> Result<ServerMessage, Error> {
    loop {
        match connection.poll().await {
            Frame::Message(msg) => return Ok(msg),
            Frame::Timeout => continue,
            Frame::Error(err) => return Err(err.into()),
            Frame::Closed => return Err(ProtocolError::HandshakeIncomplete.into()),
        }
    }
}

fn unexpected(expected: &'static str, got: &ServerMessage) -> Error {
    ProtocolError::UnexpectedFrame {
        expected,
        got: format!("{got:?}"),
    }
    .into()
}
