//! Feature classification and rasterization.
//!
//! A feature is classified by the first entry of [`CLASSIFICATION_RULES`]
//! whose predicate accepts its tags. The predicates overlap (a way can carry
//! both `building` and `highway`), so the table order is part of the
//! behavior. The class then decides which tiles the occupied cells get and
//! whether an event is derived.
//!
//! A cell is occupied only if its footprint intersects the geometry itself,
//! not just the geometry's bounding box. Contact along a cell edge alone does
//! not count while the geometry reaches into the interior of other cells.

use std::collections::{BTreeMap, HashMap};

use geo::{Geometry, Relate};
use serde_json::json;

use crate::catalog::TileCatalog;
use crate::document::Event;
use crate::grid::{covered_cells, GridBounds};
use crate::Result;

/// OSM-style tag mapping.
pub type Tags = HashMap<String, String>;

/// Grid cell `(x, y)`; may fall outside the map for multi-cell decorations.
pub type Cell = (i32, i32);

/// Road name used when a road has no `name` tag.
pub const UNNAMED_ROAD: &str = "unnamed road";

/// Decorative tiles of a tree, by offset from the occupied cell.
pub const TREE_CLUSTER: [(i32, i32, &str); 6] = [
    (0, -1, "tree_small_1"),
    (1, -1, "tree_small_2"),
    (0, 0, "tree_small_3"),
    (1, 0, "tree_small_4"),
    (0, 1, "tree_small_5"),
    (1, 1, "tree_small_6"),
];

/// One geographic entity to rasterize.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: i64,
    pub geometry: Geometry<f64>,
    pub tags: Tags,
}

impl Feature {
    pub fn new(id: i64, geometry: Geometry<f64>, tags: Tags) -> Self {
        Self { id, geometry, tags }
    }

    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// What a feature is drawn as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureClass {
    Building,
    Footway,
    Road,
    Water,
    Grass,
    Tree,
}

impl FeatureClass {
    /// Ground tile for classes painted on the ground layer.
    pub fn ground_tile(self) -> Option<&'static str> {
        match self {
            FeatureClass::Building => Some("wall_bright"),
            FeatureClass::Footway => Some("dirt_a"),
            FeatureClass::Road => Some("paved_road_a"),
            FeatureClass::Water => Some("water_a"),
            FeatureClass::Grass => Some("park_a"),
            FeatureClass::Tree => None,
        }
    }
}

type TagPredicate = fn(&Tags) -> bool;

fn tag_in(tags: &Tags, key: &str, values: &[&str]) -> bool {
    tags.get(key).is_some_and(|v| values.contains(&v.as_str()))
}

/// Ordered `(class, predicate)` table; the first match wins.
pub const CLASSIFICATION_RULES: [(FeatureClass, TagPredicate); 6] = [
    (FeatureClass::Building, |tags| tags.contains_key("building")),
    (FeatureClass::Footway, |tags| {
        tag_in(tags, "highway", &["footway", "pedestrian"])
    }),
    (FeatureClass::Road, |tags| {
        tag_in(tags, "highway", &["residential", "primary", "secondary"])
    }),
    (FeatureClass::Water, |tags| tag_in(tags, "natural", &["water"])),
    (FeatureClass::Grass, |tags| tag_in(tags, "landuse", &["grass"])),
    (FeatureClass::Tree, |tags| tag_in(tags, "natural", &["tree"])),
];

/// Class of a tag mapping, `None` when no rule applies.
pub fn classify(tags: &Tags) -> Option<FeatureClass> {
    CLASSIFICATION_RULES
        .iter()
        .find(|(_, matches)| matches(tags))
        .map(|(class, _)| *class)
}

/// Cell writes and events produced by one feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRaster {
    pub ground: BTreeMap<Cell, u32>,
    pub overlay: BTreeMap<Cell, u32>,
    pub events: Vec<Event>,
}

impl FeatureRaster {
    pub fn is_empty(&self) -> bool {
        self.ground.is_empty() && self.overlay.is_empty() && self.events.is_empty()
    }
}

/// Cells of `tile` whose footprint intersects the feature geometry.
///
/// Cells the geometry only grazes along an edge or corner are left out,
/// unless that is all the geometry touches (a point or a line lying on a
/// grid line).
pub fn occupied_cells(
    geometry: &Geometry<f64>,
    tile: &GridBounds,
    cell_width: f64,
    cell_height: f64,
) -> Result<Vec<Cell>> {
    let Some(bounds) = GridBounds::of_geometry(geometry) else {
        return Ok(Vec::new());
    };

    let mut inside = Vec::new();
    let mut grazed = Vec::new();
    for (x, y, cell) in covered_cells(tile, &bounds, cell_width, cell_height)? {
        let matrix = geometry.relate(&cell);
        if !matrix.is_intersects() {
            continue;
        }
        if matrix.is_touches() {
            grazed.push((x, y));
        } else {
            inside.push((x, y));
        }
    }

    Ok(if inside.is_empty() { grazed } else { inside })
}

/// Rasterize one feature, `None` if it matches no classification rule.
///
/// # Errors
///
/// Tile names missing from the catalog are fatal: the rasterizer only asks
/// for names every spritesheet set is expected to provide.
pub fn rasterize(
    feature: &Feature,
    catalog: &TileCatalog,
    tile: &GridBounds,
    cell_width: f64,
    cell_height: f64,
) -> Result<Option<FeatureRaster>> {
    let Some(class) = classify(&feature.tags) else {
        return Ok(None);
    };
    log::trace!("Feature {} classified as {:?}", feature.id, class);

    let cells = occupied_cells(&feature.geometry, tile, cell_width, cell_height)?;
    let mut raster = FeatureRaster::default();

    if let Some(name) = class.ground_tile() {
        let gid = catalog.resolve(name)?;
        raster.ground = cells.iter().map(|&cell| (cell, gid)).collect();
    }

    match class {
        FeatureClass::Road => raster.events.extend(road_event(feature, &cells)),
        FeatureClass::Tree => {
            let cluster = TREE_CLUSTER
                .iter()
                .map(|&(dx, dy, name)| catalog.resolve(name).map(|gid| (dx, dy, gid)))
                .collect::<Result<Vec<_>>>()?;
            for &(x, y) in &cells {
                for &(dx, dy, gid) in &cluster {
                    raster.overlay.insert((x + dx, y + dy), gid);
                }
            }
        }
        _ => {}
    }

    Ok(Some(raster))
}

/// Event at the mean occupied cell of a road, truncated towards zero.
fn road_event(feature: &Feature, cells: &[Cell]) -> Option<Event> {
    if cells.is_empty() {
        return None;
    }
    let count = cells.len() as i64;
    let (sum_x, sum_y) = cells.iter().fold((0_i64, 0_i64), |(sx, sy), &(x, y)| {
        (sx + i64::from(x), sy + i64::from(y))
    });
    let road_name = feature.tag("name").unwrap_or(UNNAMED_ROAD);

    Some(Event {
        x: (sum_x / count) as i32,
        y: (sum_y / count) as i32,
        name: format!("road_{}", feature.id.unsigned_abs()),
        kind: "road".to_string(),
        properties: vec![("roadname".to_string(), road_name.into())],
        content: json!({
            "script": [
                {"action": "say", "text": format!("You are walking on {road_name}.")}
            ]
        }),
    })
}
