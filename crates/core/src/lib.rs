//! Core library for turning OpenStreetMap features into Tiled tile maps.
//!
//! A web tile's features are rasterized onto a uniform cell grid and merged
//! into a two-layer map (`ground` and `meter1`), plus an object layer of
//! events derived from the features. The result is a Tiled JSON document
//! ready to be loaded by a game engine.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use tiled_maps_core::generate::{generate_map, write_map};
//! use tiled_maps_core::source::GeoJsonFeatures;
//! use tiled_maps_core::tile::TileCoord;
//! use tiled_maps_core::{Config, TileCatalog};
//!
//! let config = Config::default();
//! let catalog = TileCatalog::scan_folder("game/spritesheets").unwrap();
//! let features = GeoJsonFeatures::from_path("milan.geojson").unwrap();
//! let path = Path::new("game/maps/generated/chunk_0_0.json");
//!
//! let map = generate_map(
//!     &TileCoord::new(137763, 93816, 18),
//!     &config,
//!     &features,
//!     &config.bounds_source(),
//!     &catalog,
//!     path,
//! )
//! .unwrap();
//! write_map(&map, path).unwrap();
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub mod catalog;
pub mod document;
#[cfg(test)]
mod fixtures;
pub mod generate;
pub mod grid;
pub mod rasterize;
pub mod render;
pub mod source;
pub mod tile;
pub mod world;

pub use catalog::TileCatalog;
pub use document::{TiledDocument, TiledMap};
pub use generate::{generate_map, write_map};

use crate::source::WebMercatorBounds;

/// Errors that can occur while generating a map
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tile named '{0}' not found in any tileset")]
    TileNotFound(String),

    #[error("Cell ({x}, {y}) is outside layer '{layer}' ({width}x{height})")]
    CellOutOfRange {
        layer: String,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[error("Cell size must be finite and positive, got {width} x {height}")]
    InvalidCellSize { width: f64, height: f64 },

    #[error("Global tile id {0} does not belong to any tileset")]
    UnknownTile(u32),

    #[error("Invalid tileset {path}: {reason}")]
    InvalidTileset { path: PathBuf, reason: String },

    #[error("Feature source failed: {0}")]
    FeatureSource(String),

    #[error("Bounds source failed: {0}")]
    BoundsSource(String),

    #[error("Invalid chunk: {0}")]
    InvalidChunkName(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Default number of cells along each side of a map chunk
pub const DEFAULT_TILE_RESOLUTION: u32 = 32;

/// Default pixel size of one cell
pub const DEFAULT_CELL_PIXELS: u32 = 32;

/// Configuration for map generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cells along each side of the generated map
    pub tile_resolution: u32,
    /// Pixel width and height of one cell (the map's `tilewidth`)
    pub cell_pixels: u32,
    /// Incoming tile rows are TMS (y grows northwards)
    pub swap_y: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_resolution: DEFAULT_TILE_RESOLUTION,
            cell_pixels: DEFAULT_CELL_PIXELS,
            swap_y: false,
        }
    }
}

impl Config {
    /// Set the number of cells per side.
    pub fn with_tile_resolution(mut self, cells: u32) -> Self {
        self.tile_resolution = cells;
        self
    }

    /// Set the pixel size of one cell.
    pub fn with_cell_pixels(mut self, pixels: u32) -> Self {
        self.cell_pixels = pixels;
        self
    }

    /// Treat tile rows as TMS.
    pub fn with_swap_y(mut self, swap_y: bool) -> Self {
        self.swap_y = swap_y;
        self
    }

    /// Pixel size of a whole chunk.
    pub fn chunk_pixels(&self) -> u32 {
        self.tile_resolution * self.cell_pixels
    }

    /// Web-mercator bounds source matching this configuration.
    pub fn bounds_source(&self) -> WebMercatorBounds {
        WebMercatorBounds::new(self.swap_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.tile_resolution, 32);
        assert_eq!(config.cell_pixels, 32);
        assert!(!config.swap_y);
        assert_eq!(config.chunk_pixels(), 1024);
    }

    #[test]
    fn test_config_builders() {
        let config = Config::default()
            .with_tile_resolution(64)
            .with_cell_pixels(16)
            .with_swap_y(true);
        assert_eq!(config.chunk_pixels(), 1024);
        assert!(config.bounds_source().swap_y);
    }

    #[test]
    fn test_error_messages() {
        let err = Error::CellOutOfRange {
            layer: "ground".to_string(),
            x: 32,
            y: 0,
            width: 32,
            height: 32,
        };
        assert_eq!(err.to_string(), "Cell (32, 0) is outside layer 'ground' (32x32)");
        assert_eq!(
            Error::TileNotFound("lava".to_string()).to_string(),
            "Tile named 'lava' not found in any tileset"
        );
    }
}
