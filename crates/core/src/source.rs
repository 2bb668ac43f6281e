//! Collaborators feeding the generator: tile bounds and features.
//!
//! Both are traits so that a spatial database, a file, or a test fixture can
//! stand behind them. Errors from either abort generation unchanged.

use std::fs;
use std::path::Path;

use geojson::{feature::Id, GeoJson};
use serde_json::{Map, Value};

use crate::grid::GridBounds;
use crate::rasterize::{Feature, Tags};
use crate::tile::TileCoord;
use crate::{Error, Result};

/// Supplies the projected bounding box of a web tile.
pub trait BoundsSource {
    /// Bounds of `tile`, to be split into `cells x cells` grid cells.
    fn tile_bounds(&self, tile: &TileCoord, cells: u32) -> Result<GridBounds>;
}

/// Supplies the features that may intersect a tile.
pub trait FeatureSource {
    /// Features overlapping `bounds`, the projected envelope of `tile`.
    fn features<'a>(
        &'a self,
        tile: &TileCoord,
        bounds: &GridBounds,
    ) -> Result<Box<dyn Iterator<Item = Result<Feature>> + 'a>>;
}

/// Closed-form EPSG:3857 tile envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebMercatorBounds {
    /// Interpret incoming rows as TMS (y grows northwards).
    pub swap_y: bool,
}

impl WebMercatorBounds {
    pub fn new(swap_y: bool) -> Self {
        Self { swap_y }
    }
}

impl BoundsSource for WebMercatorBounds {
    fn tile_bounds(&self, tile: &TileCoord, _cells: u32) -> Result<GridBounds> {
        if tile.z > 30 || u64::from(tile.x) >= 1 << tile.z || u64::from(tile.y) >= 1 << tile.z {
            return Err(Error::BoundsSource(format!("tile {} is outside the world", tile)));
        }
        let tile = if self.swap_y { tile.flip_y() } else { *tile };
        Ok(tile.mercator_bounds())
    }
}

/// Fixed bounds, whatever the tile. Handy for local projections.
impl BoundsSource for GridBounds {
    fn tile_bounds(&self, _tile: &TileCoord, _cells: u32) -> Result<GridBounds> {
        Ok(*self)
    }
}

/// In-memory features, yielded in order when their bounding box overlaps
/// the tile.
impl FeatureSource for Vec<Feature> {
    fn features<'a>(
        &'a self,
        _tile: &TileCoord,
        bounds: &GridBounds,
    ) -> Result<Box<dyn Iterator<Item = Result<Feature>> + 'a>> {
        let bounds = *bounds;
        Ok(Box::new(
            self.iter()
                .filter(move |f| overlaps(f, &bounds))
                .cloned()
                .map(Ok),
        ))
    }
}

fn overlaps(feature: &Feature, bounds: &GridBounds) -> bool {
    GridBounds::of_geometry(&feature.geometry).is_some_and(|b| b.overlaps(bounds))
}

/// Features read from a GeoJSON FeatureCollection.
///
/// Coordinates must already be in the bounds source's projection. Each
/// feature's id comes from the GeoJSON `id` or an `osm_id` property; its tags
/// from a nested `tags` object plus every scalar property.
#[derive(Debug, Clone, Default)]
pub struct GeoJsonFeatures {
    features: Vec<Feature>,
}

impl GeoJsonFeatures {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let features = Self::parse(&content)
            .map_err(|e| Error::FeatureSource(format!("{}: {}", path.display(), e)))?;
        log::info!("Loaded {} features from {}", features.len(), path.display());
        Ok(features)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let geojson: GeoJson = content
            .parse()
            .map_err(|e: geojson::Error| Error::FeatureSource(e.to_string()))?;

        let raw = match geojson {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(Error::FeatureSource(
                    "expected a Feature or FeatureCollection".to_string(),
                ))
            }
        };

        let mut features = Vec::with_capacity(raw.len());
        for (index, feature) in raw.into_iter().enumerate() {
            let Some(geometry) = feature.geometry else {
                log::debug!("Skipping feature #{}: no geometry", index);
                continue;
            };
            let geometry: geo::Geometry<f64> = geometry
                .try_into()
                .map_err(|e: geojson::Error| Error::FeatureSource(e.to_string()))?;
            let properties = feature.properties.unwrap_or_default();
            let id = feature_id(feature.id.as_ref(), &properties).unwrap_or(index as i64);
            features.push(Feature::new(id, geometry, tags_from_properties(&properties)));
        }

        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FeatureSource for GeoJsonFeatures {
    fn features<'a>(
        &'a self,
        tile: &TileCoord,
        bounds: &GridBounds,
    ) -> Result<Box<dyn Iterator<Item = Result<Feature>> + 'a>> {
        self.features.features(tile, bounds)
    }
}

fn feature_id(id: Option<&Id>, properties: &Map<String, Value>) -> Option<i64> {
    match id {
        Some(Id::Number(n)) => n.as_i64(),
        Some(Id::String(s)) => s.parse().ok(),
        None => None,
    }
    .or_else(|| match properties.get("osm_id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn scalar_tag(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Nested `tags` entries override top-level properties with the same key.
fn tags_from_properties(properties: &Map<String, Value>) -> Tags {
    let mut tags: Tags = properties
        .iter()
        .filter(|(key, _)| key.as_str() != "osm_id")
        .filter_map(|(key, value)| scalar_tag(value).map(|v| (key.clone(), v)))
        .collect();
    if let Some(Value::Object(nested)) = properties.get("tags") {
        tags.extend(
            nested
                .iter()
                .filter_map(|(key, value)| scalar_tag(value).map(|v| (key.clone(), v))),
        );
    }
    tags
}
