//! Shared in-memory fixtures for unit tests.
//!
//! The catalog mirrors the layout of a real spritesheet folder: an unnamed
//! tileset first (so named ids are offset), then the terrain sheet that holds
//! every tile the rasterizer asks for, then a nature sheet that repeats one
//! name to exercise first-match resolution.
//!
//! | name                | gid |
//! |---------------------|-----|
//! | wall_bright         | 5   |
//! | dirt_a              | 6   |
//! | paved_road_a        | 7   |
//! | water_a             | 8   |
//! | park_a              | 9   |
//! | tree_small_1..6     | 10..=15 |
//! | flowers             | 23  |

use geo::{Coord, Geometry, LineString, Point, Polygon, Rect};
use serde_json::{json, Value};

use crate::catalog::{TileCatalog, Tileset};
use crate::grid::GridBounds;
use crate::rasterize::{Feature, Tags};

fn named_tiles(names: &[(u32, &str)]) -> Value {
    Value::Array(
        names
            .iter()
            .map(|(id, name)| {
                json!({"id": id, "properties": [{"name": "name", "type": "string", "value": name}]})
            })
            .collect(),
    )
}

pub fn catalog() -> TileCatalog {
    let plain = json!({
        "name": "plain",
        "image": "plain.png",
        "tilewidth": 32,
        "tileheight": 32,
        "columns": 2,
        "tilecount": 4
    });
    let terrain = json!({
        "name": "terrain",
        "image": "terrain.png",
        "imagewidth": 137,
        "imageheight": 35,
        "tilewidth": 16,
        "tileheight": 16,
        "margin": 1,
        "spacing": 1,
        "columns": 8,
        "tilecount": 16,
        "tiles": named_tiles(&[
            (0, "wall_bright"),
            (1, "dirt_a"),
            (2, "paved_road_a"),
            (3, "water_a"),
            (4, "park_a"),
            (5, "tree_small_1"),
            (6, "tree_small_2"),
            (7, "tree_small_3"),
            (8, "tree_small_4"),
            (9, "tree_small_5"),
            (10, "tree_small_6"),
        ])
    });
    let nature = json!({
        "name": "nature",
        "image": "nature.png",
        "tilewidth": 32,
        "tileheight": 32,
        "columns": 4,
        "tilecount": 8,
        "tiles": named_tiles(&[(2, "flowers"), (4, "park_a")])
    });

    TileCatalog::new(vec![
        Tileset::from_value("/game/spritesheets/plain.json", plain).unwrap(),
        Tileset::from_value("/game/spritesheets/terrain.json", terrain).unwrap(),
        Tileset::from_value("/game/spritesheets/nature.json", nature).unwrap(),
    ])
}

/// 32x32 unit cells with the origin at the south-west corner.
pub fn tile_bounds() -> GridBounds {
    GridBounds::new(0.0, 32.0, 0.0, 32.0)
}

pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Projected rectangle strictly inside grid cells `x0..=x1`, rows `y0..=y1`
/// of [`tile_bounds`].
pub fn cells_polygon(x0: i32, y0: i32, x1: i32, y1: i32) -> Geometry<f64> {
    let left = f64::from(x0) + 0.25;
    let right = f64::from(x1) + 0.75;
    let top = 32.0 - f64::from(y0) - 0.25;
    let bottom = 32.0 - f64::from(y1) - 0.75;
    Geometry::Polygon(Polygon::new(
        LineString::from(vec![
            Coord { x: left, y: bottom },
            Coord { x: right, y: bottom },
            Coord { x: right, y: top },
            Coord { x: left, y: top },
            Coord { x: left, y: bottom },
        ]),
        vec![],
    ))
}

/// Projected rectangle exactly covering grid cells `x0..=x1`, rows
/// `y0..=y1`, edges on the grid lines.
pub fn exact_cells(x0: i32, y0: i32, x1: i32, y1: i32) -> Geometry<f64> {
    let left = f64::from(x0);
    let right = f64::from(x1 + 1);
    let top = 32.0 - f64::from(y0);
    let bottom = 32.0 - f64::from(y1 + 1);
    let rect = Rect::new(Coord { x: left, y: bottom }, Coord { x: right, y: top });
    Geometry::Polygon(rect.to_polygon())
}

/// Straight line between two projected points.
pub fn line(from: (f64, f64), to: (f64, f64)) -> Geometry<f64> {
    Geometry::LineString(LineString::from(vec![from, to]))
}

/// Horizontal line through the middle of row `y`, from column `x0` to `x1`.
pub fn row_line(x0: i32, x1: i32, y: i32) -> Geometry<f64> {
    let mid = 32.0 - f64::from(y) - 0.5;
    Geometry::LineString(LineString::from(vec![
        Coord {
            x: f64::from(x0) + 0.5,
            y: mid,
        },
        Coord {
            x: f64::from(x1) + 0.5,
            y: mid,
        },
    ]))
}

/// Point in the middle of cell `(x, y)`.
pub fn cell_point(x: i32, y: i32) -> Geometry<f64> {
    Geometry::Point(Point::new(f64::from(x) + 0.5, 32.0 - f64::from(y) - 0.5))
}

pub fn feature(id: i64, geometry: Geometry<f64>, pairs: &[(&str, &str)]) -> Feature {
    Feature::new(id, geometry, tags(pairs))
}
