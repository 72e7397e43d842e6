//! Tile terrain.

use serde::{Deserialize, Serialize};

/// The two terrain kinds the wire protocol's map grid is built from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Terrain {
    Grass,
    Dirt,
}

impl Terrain {
    /// Parse the single-character tile codes the `start.initialState.tiles` grid uses.
    pub fn from_char(c: char) -> Option<Terrain> {
        match c {
            'G' => Some(Terrain::Grass),
            'D' => Some(Terrain::Dirt),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Terrain::Grass => 'G',
            Terrain::Dirt => 'D',
        }
    }
}
