//! Tileset catalog: symbolic tile names to global tile ids.
//!
//! Global ids follow Tiled's `firstgid` scheme. Tilesets are numbered in
//! catalog order starting at 1, each one reserving `tilecount` ids. Both
//! [`TileCatalog::resolve`] and [`TileCatalog::build_references`] walk the
//! same [`TileCatalog::first_gids`] sequence, so the ids written into a map
//! always agree with the tileset references written next to them.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Reference from a map to an external tileset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetRef {
    pub firstgid: u32,
    pub source: String,
}

/// A `{name, type, value}` custom property as stored by Tiled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TileProperty {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: Value,
}

/// Per-tile definition inside a tileset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TileDefinition {
    pub id: u32,
    #[serde(default)]
    pub properties: Vec<TileProperty>,
    #[serde(default)]
    animation: Option<Value>,
}

impl TileDefinition {
    /// Value of the `name` property, if the tile has one.
    pub fn name(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == "name")
            .and_then(|p| p.value.as_str())
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }
}

/// A Tiled tileset loaded from its JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tileset {
    /// File the tileset was read from; `image` is relative to its parent.
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(default)]
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub imagewidth: u32,
    #[serde(default)]
    pub imageheight: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub columns: u32,
    pub tilecount: u32,
    #[serde(default)]
    pub margin: u32,
    #[serde(default)]
    pub spacing: u32,
    #[serde(default)]
    pub tiles: Vec<TileDefinition>,
}

impl Tileset {
    /// Build a tileset from its JSON representation.
    ///
    /// Animated tile definitions are dropped: they never carry a usable
    /// static name.
    pub fn from_value(path: impl Into<PathBuf>, value: Value) -> Result<Self> {
        let path = path.into();
        let mut tileset: Tileset =
            serde_json::from_value(value).map_err(|e| Error::InvalidTileset {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if tileset.columns == 0 {
            return Err(Error::InvalidTileset {
                path,
                reason: "tileset has zero columns".to_string(),
            });
        }
        if let Some(tile) = tileset.tiles.iter().find(|t| t.id >= tileset.tilecount) {
            return Err(Error::InvalidTileset {
                path,
                reason: format!(
                    "tile id {} is outside tilecount {}",
                    tile.id, tileset.tilecount
                ),
            });
        }
        tileset.tiles.retain(|t| !t.is_animated());
        tileset.path = path;
        Ok(tileset)
    }

    /// Local id of the first tile whose `name` property equals `name`.
    pub fn local_id(&self, name: &str) -> Option<u32> {
        self.tiles
            .iter()
            .find(|t| t.name() == Some(name))
            .map(|t| t.id)
    }

    /// Absolute-or-relative path of the tileset image.
    pub fn image_path(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) => parent.join(&self.image),
            None => PathBuf::from(&self.image),
        }
    }
}

/// Pixel rectangle of one tile inside its tileset image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    pub image: PathBuf,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Ordered collection of tilesets with a lazily filled name cache.
///
/// The cache only ever grows and every entry is derived deterministically
/// from the tilesets, so a catalog can be shared read-only between threads.
#[derive(Debug, Default)]
pub struct TileCatalog {
    tilesets: Vec<Tileset>,
    names: RwLock<HashMap<String, u32>>,
}

impl TileCatalog {
    pub fn new(tilesets: Vec<Tileset>) -> Self {
        Self {
            tilesets,
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Load every tileset JSON file in `folder`.
    ///
    /// Files are read in sorted order so ids do not depend on directory
    /// listing order. JSON files whose `type` is not `"tileset"` are skipped.
    pub fn scan_folder(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(folder)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tilesets = Vec::new();
        for path in paths {
            let raw: Value = serde_json::from_slice(&fs::read(&path)?)?;
            if raw.get("type").and_then(Value::as_str) != Some("tileset") {
                log::debug!("Skipping {}: not a tileset", path.display());
                continue;
            }
            let tileset = Tileset::from_value(&path, raw)?;
            log::debug!(
                "Loaded tileset '{}' from {} ({} tiles)",
                tileset.name,
                path.display(),
                tileset.tilecount
            );
            tilesets.push(tileset);
        }

        log::info!("Loaded {} tilesets from {}", tilesets.len(), folder.display());
        Ok(Self::new(tilesets))
    }

    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    /// `(firstgid, tileset)` pairs in catalog order.
    ///
    /// Tilesets whose `firstgid` would not fit in a `u32` are not addressable
    /// and end the sequence.
    pub fn first_gids(&self) -> impl Iterator<Item = (u32, &Tileset)> + '_ {
        self.tilesets.iter().scan(Some(1_u32), |next, tileset| {
            let first = (*next)?;
            *next = first.checked_add(tileset.tilecount);
            Some((first, tileset))
        })
    }

    /// Highest global id any tileset in the catalog can produce.
    pub fn max_gid(&self) -> u32 {
        self.tilesets
            .iter()
            .fold(0_u32, |total, t| total.saturating_add(t.tilecount))
    }

    /// Global id of the tile named `name`.
    ///
    /// The first tileset (in catalog order) exposing the name wins. Hits are
    /// memoized for the lifetime of the catalog.
    pub fn resolve(&self, name: &str) -> Result<u32> {
        if let Some(gid) = self
            .names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(*gid);
        }

        let gid = self
            .first_gids()
            .find_map(|(first, tileset)| {
                tileset
                    .local_id(name)
                    .and_then(|local| first.checked_add(local))
            })
            .ok_or_else(|| Error::TileNotFound(name.to_string()))?;

        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), gid);
        Ok(gid)
    }

    /// Tileset references for a map stored at `map_path`.
    ///
    /// Sources are relative to the map's directory, with `/` separators.
    pub fn build_references(&self, map_path: impl AsRef<Path>) -> Result<Vec<TilesetRef>> {
        let base = map_path.as_ref().parent().unwrap_or_else(|| Path::new(""));
        self.first_gids()
            .map(|(firstgid, tileset)| {
                Ok(TilesetRef {
                    firstgid,
                    source: relative_path(&tileset.path, base)?,
                })
            })
            .collect()
    }

    /// Image and pixel rectangle of the tile with global id `gid`.
    pub fn locate(&self, gid: u32) -> Option<TileSource> {
        let (first, tileset) = self
            .first_gids()
            .find(|(first, tileset)| gid >= *first && gid - first < tileset.tilecount)?;
        let local = gid - first;
        let col = local % tileset.columns;
        let row = local / tileset.columns;
        Some(TileSource {
            image: tileset.image_path(),
            x: tileset.margin + col * (tileset.tilewidth + tileset.spacing),
            y: tileset.margin + row * (tileset.tileheight + tileset.spacing),
            width: tileset.tilewidth,
            height: tileset.tileheight,
        })
    }
}

/// `target` expressed relative to the directory `base`.
fn relative_path(target: &Path, base: &Path) -> Result<String> {
    let target = lexical_absolute(target)?;
    let base = lexical_absolute(base)?;

    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = target
        .iter()
        .zip(&base)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); base.len() - common];
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    if parts.is_empty() {
        return Ok(".".to_string());
    }
    Ok(parts.join("/"))
}

/// Absolute path with `.` and `..` removed, without touching the filesystem.
fn lexical_absolute(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    })?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    #[test]
    fn test_first_gids_are_prefix_sums() {
        let catalog = fixtures::catalog();
        let gids: Vec<u32> = catalog.first_gids().map(|(gid, _)| gid).collect();
        assert_eq!(gids, vec![1, 5, 21]);
    }

    #[test]
    fn test_resolve_offsets_by_firstgid() {
        let catalog = fixtures::catalog();
        assert_eq!(catalog.resolve("wall_bright").unwrap(), 5);
        assert_eq!(catalog.resolve("dirt_a").unwrap(), 6);
        assert_eq!(catalog.resolve("tree_small_6").unwrap(), 15);
        assert_eq!(catalog.resolve("flowers").unwrap(), 21 + 2);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let catalog = fixtures::catalog();
        let first = catalog.resolve("water_a").unwrap();
        let second = catalog.resolve("water_a").unwrap();
        assert_eq!(first, second);
        assert_eq!(catalog.names.read().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_first_tileset_wins() {
        // "park_a" is also declared by the last fixture tileset
        let catalog = fixtures::catalog();
        assert_eq!(catalog.resolve("park_a").unwrap(), 9);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let catalog = fixtures::catalog();
        match catalog.resolve("lava") {
            Err(Error::TileNotFound(name)) => assert_eq!(name, "lava"),
            other => panic!("Expected TileNotFound, got {:?}", other),
        }
        // misses are not cached
        assert!(catalog.names.read().unwrap().is_empty());
    }

    #[test]
    fn test_build_references() {
        let catalog = fixtures::catalog();
        let refs = catalog
            .build_references("/game/maps/generated/chunk_0_0.json")
            .unwrap();

        assert_eq!(
            refs,
            vec![
                TilesetRef {
                    firstgid: 1,
                    source: "../../spritesheets/plain.json".to_string()
                },
                TilesetRef {
                    firstgid: 5,
                    source: "../../spritesheets/terrain.json".to_string()
                },
                TilesetRef {
                    firstgid: 21,
                    source: "../../spritesheets/nature.json".to_string()
                },
            ]
        );

        for pair in refs.windows(2) {
            assert!(pair[1].firstgid > pair[0].firstgid);
        }
    }

    #[test]
    fn test_reference_gaps_equal_tilecounts() {
        let catalog = fixtures::catalog();
        let refs = catalog.build_references("/game/maps/m.json").unwrap();
        for (pair, tileset) in refs.windows(2).zip(catalog.tilesets()) {
            assert_eq!(pair[1].firstgid - pair[0].firstgid, tileset.tilecount);
        }
        assert_eq!(catalog.max_gid(), 4 + 16 + 8);
    }

    #[test]
    fn test_relative_path_same_directory() {
        assert_eq!(
            relative_path(Path::new("/a/b/set.json"), Path::new("/a/b")).unwrap(),
            "set.json"
        );
        assert_eq!(
            relative_path(Path::new("/a/b/./c/../set.json"), Path::new("/a/b/")).unwrap(),
            "set.json"
        );
        assert_eq!(relative_path(Path::new("/a/b"), Path::new("/a/b")).unwrap(), ".");
    }

    #[test]
    fn test_locate() {
        let catalog = fixtures::catalog();

        // terrain.json: 8 columns, 16px tiles, 1px margin and spacing
        let source = catalog.locate(5 + 9).unwrap();
        assert_eq!(source.image, PathBuf::from("/game/spritesheets/terrain.png"));
        assert_eq!((source.x, source.y), (1 + 17, 1 + 17));
        assert_eq!((source.width, source.height), (16, 16));

        assert_eq!(catalog.locate(0), None);
        assert_eq!(catalog.locate(29), None);
        assert!(catalog.locate(28).is_some());
    }

    #[test]
    fn test_animated_tiles_are_dropped() {
        let tileset = Tileset::from_value(
            "/x/anim.json",
            json!({
                "image": "anim.png",
                "tilewidth": 32,
                "tileheight": 32,
                "columns": 2,
                "tilecount": 4,
                "tiles": [
                    {"id": 0, "properties": [{"name": "name", "type": "string", "value": "waves"}],
                     "animation": [{"tileid": 0, "duration": 100}]},
                    {"id": 1, "properties": [{"name": "name", "type": "string", "value": "still"}]}
                ]
            }),
        )
        .unwrap();

        assert_eq!(tileset.tiles.len(), 1);
        assert_eq!(tileset.local_id("still"), Some(1));
        assert_eq!(tileset.local_id("waves"), None);
    }

    #[test]
    fn test_invalid_tileset() {
        let result = Tileset::from_value("/x/bad.json", json!({"image": "a.png"}));
        assert!(matches!(result, Err(Error::InvalidTileset { .. })));

        let zero_columns = Tileset::from_value(
            "/x/zero.json",
            json!({"image": "a.png", "tilewidth": 8, "tileheight": 8, "columns": 0, "tilecount": 0}),
        );
        assert!(matches!(zero_columns, Err(Error::InvalidTileset { .. })));
    }

    #[test]
    fn test_tile_id_beyond_tilecount_is_rejected() {
        let result = Tileset::from_value(
            "/x/short.json",
            json!({
                "image": "a.png",
                "tilewidth": 8,
                "tileheight": 8,
                "columns": 2,
                "tilecount": 4,
                "tiles": [
                    {"id": 3, "properties": [{"name": "name", "type": "string", "value": "last"}]},
                    {"id": 4, "properties": [{"name": "name", "type": "string", "value": "stray"}]}
                ]
            }),
        );
        match result {
            Err(Error::InvalidTileset { path, reason }) => {
                assert_eq!(path, PathBuf::from("/x/short.json"));
                assert_eq!(reason, "tile id 4 is outside tilecount 4");
            }
            other => panic!("expected InvalidTileset, got {:?}", other),
        }
    }

    #[test]
    fn test_gids_stop_at_u32_range() {
        let sheet = |file: &str, tilecount: u32, tile: &str| {
            Tileset::from_value(
                file,
                json!({
                    "image": "a.png",
                    "tilewidth": 8,
                    "tileheight": 8,
                    "columns": 4,
                    "tilecount": tilecount,
                    "tiles": [
                        {"id": 1, "properties": [{"name": "name", "type": "string", "value": tile}]}
                    ]
                }),
            )
            .unwrap()
        };
        let catalog = TileCatalog::new(vec![
            sheet("/x/huge.json", u32::MAX - 1, "grass"),
            sheet("/x/edge.json", 4, "rock"),
            sheet("/x/beyond.json", 4, "sand"),
        ]);

        let gids: Vec<u32> = catalog.first_gids().map(|(gid, _)| gid).collect();
        assert_eq!(gids, vec![1, u32::MAX]);
        assert_eq!(catalog.max_gid(), u32::MAX);
        assert_eq!(catalog.resolve("grass").unwrap(), 2);
        assert!(matches!(catalog.resolve("rock"), Err(Error::TileNotFound(_))));
        assert!(matches!(catalog.resolve("sand"), Err(Error::TileNotFound(_))));

        let edge = catalog.locate(u32::MAX).unwrap();
        assert_eq!(edge.image, PathBuf::from("/x/a.png"));
        assert_eq!((edge.x, edge.y), (0, 0));
        assert_eq!(catalog.build_references("/x/maps/chunk_0_0.json").unwrap().len(), 2);
    }

    #[test]
    fn test_scan_folder() {
        let dir = tempfile::tempdir().unwrap();
        let tileset = |name: &str, tile: &str| {
            json!({
                "type": "tileset",
                "name": name,
                "image": format!("{name}.png"),
                "tilewidth": 32,
                "tileheight": 32,
                "columns": 2,
                "tilecount": 4,
                "tiles": [{"id": 3, "properties": [{"name": "name", "type": "string", "value": tile}]}]
            })
        };
        fs::write(dir.path().join("b.json"), tileset("b", "second").to_string()).unwrap();
        fs::write(dir.path().join("a.json"), tileset("a", "first").to_string()).unwrap();
        fs::write(dir.path().join("map.json"), json!({"type": "map"}).to_string()).unwrap();
        fs::write(dir.path().join("notes.txt"), "not json").unwrap();

        let catalog = TileCatalog::scan_folder(dir.path()).unwrap();

        assert_eq!(catalog.tilesets().len(), 2);
        assert_eq!(catalog.tilesets()[0].name, "a");
        assert_eq!(catalog.resolve("first").unwrap(), 4);
        assert_eq!(catalog.resolve("second").unwrap(), 8);
        assert_eq!(catalog.tilesets()[0].image_path(), dir.path().join("a.png"));

        let refs = catalog.build_references(dir.path().join("map.json")).unwrap();
        assert_eq!(refs[0].source, "a.json");
        assert_eq!(refs[1].source, "b.json");
    }

    #[test]
    fn test_scan_missing_folder() {
        let result = TileCatalog::scan_folder("/nonexistent/spritesheets");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
