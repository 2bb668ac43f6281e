//! In-memory tile map and its Tiled JSON exchange document.
//!
//! A [`TiledMap`] owns two fixed tile layers, `ground` and `meter1`, plus the
//! events attached while features are processed. It is mutated in place and
//! frozen once with [`TiledMap::to_document`], which enumerates exactly the
//! fields the Tiled map format needs.
//!
//! # Merge rule
//!
//! [`TiledMap::merge`] applies one feature's raster:
//! - ground cells always overwrite (last feature wins);
//! - overlay cells are written only if *every* overlay cell of the feature is
//!   currently empty, otherwise the whole overlay contribution is dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::TilesetRef;
use crate::rasterize::FeatureRaster;
use crate::{Error, Result};

/// Tiled version strings written into every document.
pub const TILED_VERSION: &str = "1.10.2";
pub const FORMAT_VERSION: &str = "1.10";

/// Reserved event property pointing at the companion content file.
pub const EVENT_PATH_PROPERTY: &str = "event_path";

/// The two tile layers of a generated map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Terrain surface.
    Ground,
    /// Decorations standing on the ground, e.g. trees.
    Overlay,
}

impl LayerKind {
    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Ground => "ground",
            LayerKind::Overlay => "meter1",
        }
    }
}

/// Row-major grid of global tile ids, `0` meaning empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub id: u32,
    pub name: String,
    width: u32,
    height: u32,
    data: Vec<u32>,
}

impl TileLayer {
    pub fn new(id: u32, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            name: name.into(),
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Flat offset of `(x, y)`, bounds-checked on both axes.
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|i| self.data[i])
    }

    /// True for empty cells and for coordinates outside the layer.
    pub fn is_empty(&self, x: i32, y: i32) -> bool {
        self.get(x, y).map_or(true, |gid| gid == 0)
    }

    pub fn set(&mut self, x: i32, y: i32, gid: u32) -> Result<()> {
        let index = self.index(x, y).ok_or_else(|| Error::CellOutOfRange {
            layer: self.name.clone(),
            x,
            y,
            width: self.width,
            height: self.height,
        })?;
        self.data[index] = gid;
        Ok(())
    }

    /// Non-empty cells as `(x, y, gid)`, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let width = self.width.max(1) as usize;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, gid)| **gid != 0)
            .map(move |(i, gid)| ((i % width) as u32, (i / width) as u32, *gid))
    }
}

/// Typed value of an event property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PropertyValue {
    fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Bool(_) => "bool",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            PropertyValue::String(s) => Value::from(s.as_str()),
            PropertyValue::Int(i) => Value::from(*i),
            PropertyValue::Float(f) => Value::from(*f),
            PropertyValue::Bool(b) => Value::from(*b),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

/// A point marker placed on a grid cell, with externally stored content.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub x: i32,
    pub y: i32,
    pub name: String,
    /// Object class, e.g. `road`.
    pub kind: String,
    /// Rendered in order, followed by the reserved `event_path`.
    pub properties: Vec<(String, PropertyValue)>,
    pub content: Value,
}

impl Event {
    /// Companion file holding this event's content.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }
}

/// What a call to [`TiledMap::merge`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub ground_cells: usize,
    pub overlay_cells: usize,
    pub overlay_dropped: bool,
    pub skipped_cells: usize,
    pub events: usize,
}

/// Generated map under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TiledMap {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    ground: TileLayer,
    overlay: TileLayer,
    tilesets: Vec<TilesetRef>,
    events: Vec<Event>,
}

impl TiledMap {
    /// Empty `width x height` map with zero-filled layers.
    pub fn new(width: u32, height: u32, tile_pixels: u32, tilesets: Vec<TilesetRef>) -> Self {
        Self {
            width,
            height,
            tile_width: tile_pixels,
            tile_height: tile_pixels,
            ground: TileLayer::new(1, LayerKind::Ground.name(), width, height),
            overlay: TileLayer::new(2, LayerKind::Overlay.name(), width, height),
            tilesets,
            events: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layer(&self, kind: LayerKind) -> &TileLayer {
        match kind {
            LayerKind::Ground => &self.ground,
            LayerKind::Overlay => &self.overlay,
        }
    }

    fn layer_mut(&mut self, kind: LayerKind) -> &mut TileLayer {
        match kind {
            LayerKind::Ground => &mut self.ground,
            LayerKind::Overlay => &mut self.overlay,
        }
    }

    pub fn tilesets(&self) -> &[TilesetRef] {
        &self.tilesets
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Write `gid` at `(x, y)`; out-of-range cells are rejected untouched.
    pub fn set_cell(&mut self, kind: LayerKind, x: i32, y: i32, gid: u32) -> Result<()> {
        self.layer_mut(kind).set(x, y, gid)
    }

    /// See [`TileLayer::is_empty`]: out-of-range counts as empty.
    pub fn is_empty(&self, kind: LayerKind, x: i32, y: i32) -> bool {
        self.layer(kind).is_empty(x, y)
    }

    /// Append an event. Names are not deduplicated.
    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Apply one feature's raster following the module-level merge rule.
    ///
    /// Out-of-range cells are logged and skipped; they never fail the merge.
    pub fn merge(&mut self, raster: FeatureRaster) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for (&(x, y), &gid) in &raster.ground {
            if self.write_or_warn(LayerKind::Ground, x, y, gid) {
                outcome.ground_cells += 1;
            } else {
                outcome.skipped_cells += 1;
            }
        }

        let claimable = raster
            .overlay
            .keys()
            .all(|&(x, y)| self.is_empty(LayerKind::Overlay, x, y));
        if claimable {
            for (&(x, y), &gid) in &raster.overlay {
                if self.write_or_warn(LayerKind::Overlay, x, y, gid) {
                    outcome.overlay_cells += 1;
                } else {
                    outcome.skipped_cells += 1;
                }
            }
        } else {
            outcome.overlay_dropped = true;
        }

        outcome.events = raster.events.len();
        self.events.extend(raster.events);
        outcome
    }

    fn write_or_warn(&mut self, kind: LayerKind, x: i32, y: i32, gid: u32) -> bool {
        match self.set_cell(kind, x, y, gid) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Skipping cell write: {}", e);
                false
            }
        }
    }

    /// Freeze the map into the Tiled exchange document.
    ///
    /// Events, if any, become a trailing object layer; each object sits at
    /// `grid * tile pixel size` and carries an `event_path` property.
    pub fn to_document(&self) -> TiledDocument {
        let mut layers = vec![
            DocumentLayer::from_tile_layer(&self.ground),
            DocumentLayer::from_tile_layer(&self.overlay),
        ];

        let objects: Vec<MapObject> = self
            .events
            .iter()
            .zip(1..)
            .map(|(event, id)| self.event_object(event, id))
            .collect();
        let next_object_id = objects.len() as u32 + 1;

        if !objects.is_empty() {
            layers.push(DocumentLayer::ObjectGroup(ObjectGroup {
                draworder: "topdown".to_string(),
                id: layers.len() as u32 + 1,
                name: "events".to_string(),
                objects,
                opacity: 1.0,
                visible: true,
                x: 0,
                y: 0,
            }));
        }

        TiledDocument {
            compressionlevel: -1,
            height: self.height,
            width: self.width,
            infinite: false,
            nextlayerid: layers.len() as u32 + 1,
            nextobjectid: next_object_id,
            layers,
            orientation: "orthogonal".to_string(),
            renderorder: "right-down".to_string(),
            tiledversion: TILED_VERSION.to_string(),
            tileheight: self.tile_height,
            tilewidth: self.tile_width,
            tilesets: self.tilesets.clone(),
            kind: "map".to_string(),
            version: FORMAT_VERSION.to_string(),
        }
    }

    fn event_object(&self, event: &Event, id: u32) -> MapObject {
        let mut properties: Vec<ObjectProperty> = event
            .properties
            .iter()
            .map(|(name, value)| ObjectProperty {
                name: name.clone(),
                kind: value.type_name().to_string(),
                value: value.to_json(),
            })
            .collect();
        properties.push(ObjectProperty {
            name: EVENT_PATH_PROPERTY.to_string(),
            kind: "string".to_string(),
            value: Value::from(event.file_name()),
        });

        MapObject {
            id,
            name: event.name.clone(),
            kind: event.kind.clone(),
            x: f64::from(event.x) * f64::from(self.tile_width),
            y: f64::from(event.y) * f64::from(self.tile_height),
            width: f64::from(self.tile_width),
            height: f64::from(self.tile_height),
            rotation: 0.0,
            visible: true,
            properties,
        }
    }

    /// `(file name, serialized content)` for every event, in insertion order.
    pub fn event_payloads(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.events
            .iter()
            .map(|event| (event.file_name(), format!("{:#}", event.content)))
    }
}

/// Tiled JSON map document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiledDocument {
    pub compressionlevel: i32,
    pub height: u32,
    pub width: u32,
    pub infinite: bool,
    pub layers: Vec<DocumentLayer>,
    pub nextlayerid: u32,
    pub nextobjectid: u32,
    pub orientation: String,
    pub renderorder: String,
    pub tiledversion: String,
    pub tileheight: u32,
    pub tilewidth: u32,
    pub tilesets: Vec<TilesetRef>,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
}

impl TiledDocument {
    pub fn tile_layers(&self) -> impl Iterator<Item = &DocumentTileLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            DocumentLayer::TileLayer(tiles) => Some(tiles),
            DocumentLayer::ObjectGroup(_) => None,
        })
    }

    pub fn object_groups(&self) -> impl Iterator<Item = &ObjectGroup> {
        self.layers.iter().filter_map(|layer| match layer {
            DocumentLayer::ObjectGroup(group) => Some(group),
            DocumentLayer::TileLayer(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DocumentLayer {
    #[serde(rename = "tilelayer")]
    TileLayer(DocumentTileLayer),
    #[serde(rename = "objectgroup")]
    ObjectGroup(ObjectGroup),
}

impl DocumentLayer {
    fn from_tile_layer(layer: &TileLayer) -> Self {
        DocumentLayer::TileLayer(DocumentTileLayer {
            data: layer.data.clone(),
            height: layer.height,
            width: layer.width,
            id: layer.id,
            name: layer.name.clone(),
            opacity: 1.0,
            visible: true,
            x: 0,
            y: 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTileLayer {
    pub data: Vec<u32>,
    pub height: u32,
    pub width: u32,
    pub id: u32,
    pub name: String,
    pub opacity: f64,
    pub visible: bool,
    pub x: i32,
    pub y: i32,
}

impl DocumentTileLayer {
    /// Non-empty cells as `(x, y, gid)`.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let width = self.width.max(1) as usize;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, gid)| **gid != 0)
            .map(move |(i, gid)| ((i % width) as u32, (i / width) as u32, *gid))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectGroup {
    pub draworder: String,
    pub id: u32,
    pub name: String,
    pub objects: Vec<MapObject>,
    pub opacity: f64,
    pub visible: bool,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub visible: bool,
    pub properties: Vec<ObjectProperty>,
}

impl MapObject {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}
