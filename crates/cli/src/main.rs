//! CLI for tiled-maps - Turn OpenStreetMap features into Tiled chunk maps
//!
//! This is a thin wrapper around the tiled-maps-core library.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tiled_maps_core::render::render_document;
use tiled_maps_core::source::GeoJsonFeatures;
use tiled_maps_core::tile::TileCoord;
use tiled_maps_core::world::{ChunkCoord, WorldFile};
use tiled_maps_core::{generate_map, write_map, Config, TileCatalog, TiledDocument, TiledMap};

#[derive(Parser, Debug)]
#[command(
    name = "tiled-maps",
    about = "Generate Tiled maps from OpenStreetMap features",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the map of one web tile
    Generate {
        /// Tile column
        x: u32,
        /// Tile row
        y: u32,
        /// Zoom level
        z: u8,

        /// Output map file
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Generate a chunk of the game world, addressed from the world centre
    Chunk {
        /// Chunk file name or path, e.g. chunk_-1_2.json
        #[arg(value_name = "CHUNK")]
        chunk: String,

        /// Directory the chunk is written to
        #[arg(short, long, default_value = "game/maps/generated")]
        output_dir: PathBuf,

        #[command(flatten)]
        center: CenterArgs,

        #[command(flatten)]
        sources: SourceArgs,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Write the Tiled world file laying out the chunks
    World {
        /// Output world file
        #[arg(value_name = "OUTPUT", default_value = "game/maps/generated/chunks.world")]
        output: PathBuf,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Render an existing map file to PNG
    Render {
        /// Input map file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output PNG file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Folder holding the tileset JSON files
        #[arg(long, default_value = "game/spritesheets")]
        tilesets: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// GeoJSON FeatureCollection in web-mercator coordinates
    #[arg(long, value_name = "GEOJSON")]
    features: PathBuf,

    /// Folder holding the tileset JSON files
    #[arg(long, default_value = "game/spritesheets")]
    tilesets: PathBuf,

    /// Also render the generated map to this PNG file
    #[arg(long)]
    png: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GridArgs {
    /// Cells along each side of a map
    #[arg(long, env = "TILE_RESOLUTION", default_value = "32")]
    tile_resolution: u32,

    /// Pixel size of one cell
    #[arg(long, env = "CELL_PIXEL_SIZE", default_value = "32")]
    cell_pixels: u32,

    /// Tile rows are TMS (y grows northwards)
    #[arg(long)]
    swap_y: bool,
}

impl GridArgs {
    fn config(&self) -> Result<Config> {
        if self.tile_resolution == 0 || self.cell_pixels == 0 {
            anyhow::bail!(
                "Tile resolution and cell size must be positive, got {} and {}",
                self.tile_resolution,
                self.cell_pixels
            );
        }
        Ok(Config::default()
            .with_tile_resolution(self.tile_resolution)
            .with_cell_pixels(self.cell_pixels)
            .with_swap_y(self.swap_y))
    }
}

#[derive(Args, Debug)]
struct CenterArgs {
    /// Zoom level of the game world
    #[arg(long, env = "GAME_ZOOM_LEVEL", default_value = "18")]
    zoom: u8,

    /// Tile column of chunk (0, 0)
    #[arg(long, env = "WORLD_CENTER_X", default_value = "137763")]
    center_x: u32,

    /// Tile row of chunk (0, 0)
    #[arg(long, env = "WORLD_CENTER_Y", default_value = "93816")]
    center_y: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    match cli.command {
        Command::Generate {
            x,
            y,
            z,
            output,
            sources,
            grid,
        } => {
            let config = grid.config()?;
            generate(&TileCoord::new(x, y, z), &config, &sources, &output)?;
        }
        Command::Chunk {
            chunk,
            output_dir,
            center,
            sources,
            grid,
        } => {
            let config = grid.config()?;
            let coord = ChunkCoord::from_path(&chunk).context("Failed to parse chunk name")?;
            let center = TileCoord::new(center.center_x, center.center_y, center.zoom);
            let tile = coord
                .to_tile(&center)
                .context("Failed to locate chunk in the world")?;
            log::info!("Chunk {} is tile {}", coord.file_name(), tile);
            generate(&tile, &config, &sources, &output_dir.join(coord.file_name()))?;
        }
        Command::World { output, grid } => {
            let world = WorldFile::for_config(&grid.config()?);
            if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            let content =
                serde_json::to_string_pretty(&world).context("Failed to serialize world")?;
            fs::write(&output, content)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            log::info!("Wrote world file {}", output.display());
        }
        Command::Render {
            input,
            output,
            tilesets,
        } => {
            let catalog = load_catalog(&tilesets)?;
            let content = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let doc: TiledDocument = serde_json::from_slice(&content)
                .with_context(|| format!("Failed to parse map {}", input.display()))?;
            render(&doc, &catalog, &output)?;
        }
    }

    Ok(())
}

fn load_catalog(folder: &Path) -> Result<TileCatalog> {
    let catalog = TileCatalog::scan_folder(folder)
        .with_context(|| format!("Failed to load tilesets from {}", folder.display()))?;
    log::debug!(
        "Loaded {} tilesets, {} tiles",
        catalog.tilesets().len(),
        catalog.max_gid()
    );
    Ok(catalog)
}

fn generate(tile: &TileCoord, config: &Config, sources: &SourceArgs, output: &Path) -> Result<()> {
    let catalog = load_catalog(&sources.tilesets)?;
    let features = GeoJsonFeatures::from_path(&sources.features).context("Failed to load features")?;

    let map: TiledMap = generate_map(
        tile,
        config,
        &features,
        &config.bounds_source(),
        &catalog,
        output,
    )
    .with_context(|| format!("Failed to generate tile {}", tile))?;

    write_map(&map, output).with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {}", output.display());

    if let Some(png) = &sources.png {
        render(&map.to_document(), &catalog, png)?;
    }
    Ok(())
}

fn render(doc: &TiledDocument, catalog: &TileCatalog, output: &Path) -> Result<()> {
    let image = render_document(doc, catalog).context("Failed to render map")?;
    image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Rendered {}", output.display());
    Ok(())
}
