//! Map generation pipeline.
//!
//! For one web tile:
//! 1. Allocate an empty map with zero-filled `ground` and `meter1` layers
//! 2. Ask the bounds source for the tile envelope and derive the cell size
//! 3. Rasterize every feature from the feature source, in order
//! 4. Merge each raster into the map (see [`TiledMap::merge`])
//!
//! Any collaborator or catalog error aborts the tile; no partial map is
//! returned.

use std::fs;
use std::path::Path;

use crate::catalog::TileCatalog;
use crate::document::TiledMap;
use crate::rasterize::rasterize;
use crate::source::{BoundsSource, FeatureSource};
use crate::tile::TileCoord;
use crate::{Config, Result};

/// Counters reported after generating a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub features: usize,
    pub rasterized: usize,
    pub ignored: usize,
    pub overlay_dropped: usize,
    pub skipped_cells: usize,
    pub events: usize,
}

/// Generate the map for `tile`.
///
/// `map_path` is where the map will be stored; tileset sources are written
/// relative to its directory.
pub fn generate_map(
    tile: &TileCoord,
    config: &Config,
    features: &dyn FeatureSource,
    bounds: &dyn BoundsSource,
    catalog: &TileCatalog,
    map_path: &Path,
) -> Result<TiledMap> {
    generate_map_with_stats(tile, config, features, bounds, catalog, map_path).map(|(map, _)| map)
}

/// [`generate_map`], also returning what happened to the features.
pub fn generate_map_with_stats(
    tile: &TileCoord,
    config: &Config,
    features: &dyn FeatureSource,
    bounds: &dyn BoundsSource,
    catalog: &TileCatalog,
    map_path: &Path,
) -> Result<(TiledMap, GenerationStats)> {
    let cells = config.tile_resolution;
    let mut map = TiledMap::new(
        cells,
        cells,
        config.cell_pixels,
        catalog.build_references(map_path)?,
    );

    let tile_bounds = bounds.tile_bounds(tile, cells)?;
    let (cell_width, cell_height) = tile_bounds.cell_size(cells);

    let geo = tile.bounds();
    log::info!(
        "Generating tile {} ({:.5}, {:.5}) to ({:.5}, {:.5})",
        tile,
        geo.lng_min,
        geo.lat_min,
        geo.lng_max,
        geo.lat_max
    );
    log::debug!(
        "  Bounds: x {}..{}, y {}..{}; cell {:.3} x {:.3}",
        tile_bounds.min_x,
        tile_bounds.max_x,
        tile_bounds.min_y,
        tile_bounds.max_y,
        cell_width,
        cell_height
    );

    let mut stats = GenerationStats::default();
    for feature in features.features(tile, &tile_bounds)? {
        let feature = feature?;
        stats.features += 1;

        let Some(raster) = rasterize(&feature, catalog, &tile_bounds, cell_width, cell_height)?
        else {
            stats.ignored += 1;
            continue;
        };
        stats.rasterized += 1;

        let outcome = map.merge(raster);
        if outcome.overlay_dropped {
            log::debug!("Feature {} lost its overlay claim", feature.id);
            stats.overlay_dropped += 1;
        }
        stats.skipped_cells += outcome.skipped_cells;
        stats.events += outcome.events;
    }

    log::info!(
        "Tile {}: {} features, {} rasterized, {} ignored, {} events",
        tile,
        stats.features,
        stats.rasterized,
        stats.ignored,
        stats.events
    );
    if stats.skipped_cells > 0 {
        log::warn!(
            "Tile {}: {} cell writes fell outside the map",
            tile,
            stats.skipped_cells
        );
    }

    Ok((map, stats))
}

/// Write the map document to `path` and its event payloads next to it.
pub fn write_map(map: &TiledMap, path: &Path) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }

    fs::write(path, serde_json::to_vec(&map.to_document())?)?;
    for (file_name, content) in map.event_payloads() {
        fs::write(dir.join(&file_name), content)?;
    }

    log::debug!(
        "Wrote {} with {} event files",
        path.display(),
        map.events().len()
    );
    Ok(())
}
