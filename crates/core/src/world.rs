//! Tiled world file and chunk addressing.
//!
//! The game world is an infinite grid of `chunk_<x>_<y>.json` maps. Chunk
//! `(0, 0)` is the web tile at the configured world centre; neighbouring
//! chunks are the neighbouring web tiles at the same zoom.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tile::TileCoord;
use crate::{Config, Error, Result};

/// Regular expression Tiled uses to place chunk files in the world.
pub const CHUNK_PATTERN: &str = r"chunk_(\-?\d+)_(\-?\d+)\.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldFile {
    pub patterns: Vec<WorldPattern>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldPattern {
    pub regexp: String,
    pub multiplier_x: u32,
    pub multiplier_y: u32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl WorldFile {
    /// World whose chunks are `tile_resolution * cell_pixels` pixels wide.
    pub fn for_config(config: &Config) -> Self {
        let size = config.chunk_pixels();
        Self {
            patterns: vec![WorldPattern {
                regexp: CHUNK_PATTERN.to_string(),
                multiplier_x: size,
                multiplier_y: size,
                offset_x: 0,
                offset_y: 0,
            }],
            kind: "world".to_string(),
        }
    }
}

/// [`CHUNK_PATTERN`] anchored to a whole file name.
fn chunk_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(&format!("^{}$", CHUNK_PATTERN)).ok())
        .as_ref()
}

/// Position of a chunk relative to the world centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i64,
    pub y: i64,
}

impl ChunkCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn file_name(&self) -> String {
        format!("chunk_{}_{}.json", self.x, self.y)
    }

    /// Parse the final component of a chunk path, e.g. `maps/chunk_-1_2.json`.
    ///
    /// Only names the world file's [`CHUNK_PATTERN`] matches are accepted.
    pub fn from_path(path: &str) -> Result<Self> {
        let invalid = || Error::InvalidChunkName(path.to_string());
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let captures = chunk_name_pattern()
            .and_then(|pattern| pattern.captures(name))
            .ok_or_else(invalid)?;
        Ok(Self::new(
            captures[1].parse().map_err(|_| invalid())?,
            captures[2].parse().map_err(|_| invalid())?,
        ))
    }

    /// Web tile shown by this chunk, given the tile at the world centre.
    pub fn to_tile(&self, center: &TileCoord) -> Result<TileCoord> {
        let limit = 1_i64 << center.z.min(32);
        let x = i64::from(center.x) + self.x;
        let y = i64::from(center.y) + self.y;
        if !(0..limit).contains(&x) || !(0..limit).contains(&y) {
            return Err(Error::InvalidChunkName(format!(
                "{} falls outside zoom {}",
                self.file_name(),
                center.z
            )));
        }
        Ok(TileCoord::new(x as u32, y as u32, center.z))
    }
}
