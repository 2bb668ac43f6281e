//! Web tile coordinates and their bounds.
//!
//! A map chunk is generated for one z/x/y web tile. The cell grid is laid over
//! the tile's EPSG:3857 envelope, which is what the feature geometries are
//! expressed in; the lng/lat bounds are only used for logging.

use std::f64::consts::PI;

use crate::grid::GridBounds;

/// Equatorial radius used by EPSG:3857, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the side of the EPSG:3857 square world, in meters.
pub const MERCATOR_HALF_EXTENT: f64 = PI * EARTH_RADIUS;

/// Tile coordinates: x, y, and zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    /// Create a new tile coordinate
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Row of this tile in the opposite y convention (XYZ <-> TMS).
    pub fn flip_y(&self) -> Self {
        let n = 1_u64 << self.z;
        let y = (n - 1).saturating_sub(u64::from(self.y));
        Self::new(self.x, y as u32, self.z)
    }

    /// Get the bounding box of this tile in geographic coordinates (lng/lat)
    pub fn bounds(&self) -> TileBounds {
        let n = 2_f64.powi(self.z as i32);
        let lng_min = (self.x as f64) / n * 360.0 - 180.0;
        let lng_max = (self.x as f64 + 1.0) / n * 360.0 - 180.0;

        let lat_rad = |y: f64| {
            let y_rad = PI * (1.0 - 2.0 * y / n);
            y_rad.sinh().atan().to_degrees()
        };

        let lat_max = lat_rad(self.y as f64);
        let lat_min = lat_rad(self.y as f64 + 1.0);

        TileBounds {
            lng_min,
            lat_min,
            lng_max,
            lat_max,
        }
    }

    /// Envelope of this tile in EPSG:3857 meters, rows counted from the north.
    pub fn mercator_bounds(&self) -> GridBounds {
        let span = 2.0 * MERCATOR_HALF_EXTENT / 2_f64.powi(self.z as i32);
        let min_x = -MERCATOR_HALF_EXTENT + self.x as f64 * span;
        let max_y = MERCATOR_HALF_EXTENT - self.y as f64 * span;
        GridBounds::new(min_x, min_x + span, max_y - span, max_y)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Geographic bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub lng_min: f64,
    pub lat_min: f64,
    pub lng_max: f64,
    pub lat_max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_bounds() {
        // Tile 0,0,0 should cover the whole world
        let tile = TileCoord::new(0, 0, 0);
        let bounds = tile.bounds();

        assert!((bounds.lng_min - (-180.0)).abs() < 0.0001);
        assert!((bounds.lng_max - 180.0).abs() < 0.0001);
        // Lat bounds are Web Mercator limits (~85.05 degrees)
        assert!(bounds.lat_min < -85.0);
        assert!(bounds.lat_max > 85.0);
        assert!((bounds.lng_max - bounds.lng_min - 360.0).abs() < 0.0001);
    }

    #[test]
    fn test_mercator_bounds_world() {
        let bounds = TileCoord::new(0, 0, 0).mercator_bounds();

        assert!((bounds.min_x + MERCATOR_HALF_EXTENT).abs() < 1e-6);
        assert!((bounds.max_x - MERCATOR_HALF_EXTENT).abs() < 1e-6);
        assert!((bounds.min_y + MERCATOR_HALF_EXTENT).abs() < 1e-6);
        assert!((bounds.max_y - MERCATOR_HALF_EXTENT).abs() < 1e-6);
    }

    #[test]
    fn test_mercator_bounds_north_west_quadrant() {
        // XYZ rows grow southwards, so 0/0 at zoom 1 is the north-west quarter
        let bounds = TileCoord::new(0, 0, 1).mercator_bounds();

        assert!((bounds.min_x + MERCATOR_HALF_EXTENT).abs() < 1e-6);
        assert!(bounds.max_x.abs() < 1e-6);
        assert!(bounds.min_y.abs() < 1e-6);
        assert!((bounds.max_y - MERCATOR_HALF_EXTENT).abs() < 1e-6);
    }

    #[test]
    fn test_mercator_bounds_match_geographic_bounds() {
        // La Scala, Milan
        let tile = TileCoord::new(137763, 93816, 18);
        let merc = tile.mercator_bounds();
        let geo = tile.bounds();

        let lng_min = merc.min_x / EARTH_RADIUS * 180.0 / PI;
        assert!((lng_min - geo.lng_min).abs() < 1e-9);
        assert!(merc.max_x > merc.min_x);
        assert!(merc.max_y > merc.min_y);
        assert!(((merc.max_x - merc.min_x) - (merc.max_y - merc.min_y)).abs() < 1e-6);
    }

    #[test]
    fn test_flip_y() {
        assert_eq!(TileCoord::new(3, 0, 2).flip_y(), TileCoord::new(3, 3, 2));
        assert_eq!(TileCoord::new(3, 1, 2).flip_y(), TileCoord::new(3, 2, 2));
        assert_eq!(TileCoord::new(0, 0, 0).flip_y(), TileCoord::new(0, 0, 0));

        let tile = TileCoord::new(137763, 168327, 18);
        assert_eq!(tile.flip_y().flip_y(), tile);
    }

    #[test]
    fn test_display() {
        assert_eq!(TileCoord::new(5, 7, 3).to_string(), "3/5/7");
    }
}
