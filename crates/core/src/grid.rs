//! Uniform cell grid laid over a tile's projected bounding box.
//!
//! Geography is cartesian (y grows northwards) while the grid follows the
//! rendering convention (row 0 is the northern edge, rows grow southwards).
//! [`covered_cells`] is the only place where that flip happens.
//!
//! # Edge convention
//!
//! Spans are half-open in grid space: every cell owns its left and top edges
//! and none of its right and bottom edges. The tile follows the same rule, so
//! its right and bottom edges belong to the neighbouring tiles. A feature box
//! ending exactly on a grid line therefore stops at the cell before it. A
//! degenerate span (a point, or a line along a grid line) yields the cell
//! owning that coordinate. Callers refine candidates with a real
//! intersection test.

use geo::{BoundingRect, Coord, Geometry, Polygon, Rect};

use crate::{Error, Result};

/// Axis-aligned box in projected units, in `(min_x, max_x, min_y, max_y)` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl GridBounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Bounding box of a geometry, `None` for empty geometries.
    pub fn of_geometry(geom: &Geometry<f64>) -> Option<Self> {
        geom.bounding_rect().map(Self::from)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when the two boxes share at least one point.
    pub fn overlaps(&self, other: &GridBounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Size of one cell when the box is split into `cells` columns and rows.
    pub fn cell_size(&self, cells: u32) -> (f64, f64) {
        let cells = f64::from(cells.max(1));
        (self.width() / cells, self.height() / cells)
    }
}

impl From<Rect<f64>> for GridBounds {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y)
    }
}

/// One candidate cell: grid column, grid row and the cell's footprint.
pub type CoveredCell = (i32, i32, Polygon<f64>);

/// Enumerate the grid cells of `tile` that may intersect a feature with
/// bounding box `feature`.
///
/// Cells come out in row-major order (north to south, west to east). The
/// returned iterator is lazy and `Clone`, so it can be restarted.
///
/// # Errors
///
/// [`Error::InvalidCellSize`] unless both cell dimensions are finite and
/// strictly positive.
pub fn covered_cells(
    tile: &GridBounds,
    feature: &GridBounds,
    cell_width: f64,
    cell_height: f64,
) -> Result<CoveredCells> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(cell_width) || !valid(cell_height) {
        return Err(Error::InvalidCellSize {
            width: cell_width,
            height: cell_height,
        });
    }

    let column_count = span_count(tile.width(), cell_width);
    let row_count = span_count(tile.height(), cell_height);

    let cols = cell_span(
        (feature.min_x - tile.min_x) / cell_width,
        (feature.max_x - tile.min_x) / cell_width,
        column_count,
    );
    // y axis flip: the northern edge is row 0
    let rows = cell_span(
        (tile.max_y - feature.max_y) / cell_height,
        (tile.max_y - feature.min_y) / cell_height,
        row_count,
    );

    let (Some((col_start, col_end)), Some((row_start, row_end))) = (cols, rows) else {
        return Ok(CoveredCells::empty(*tile, cell_width, cell_height));
    };

    Ok(CoveredCells {
        tile: *tile,
        cell_width,
        cell_height,
        col_start,
        col_end,
        row_end,
        col: col_start,
        row: row_start,
    })
}

/// First and last cell index of the grid-space span `lo..hi`, clipped to
/// `0..count`. `None` when nothing of the span falls inside.
fn cell_span(lo: f64, hi: f64, count: i32) -> Option<(i32, i32)> {
    if lo.is_nan() || hi.is_nan() || lo > hi {
        return None;
    }
    let start = lo.floor();
    let end = if hi > lo { hi.ceil() - 1.0 } else { start };

    let start = start.max(0.0);
    let end = end.min(f64::from(count - 1));
    (start <= end).then(|| (start as i32, end as i32))
}

/// Number of whole cells along one side, at least one.
fn span_count(extent: f64, cell: f64) -> i32 {
    let count = (extent / cell).round();
    if count.is_finite() && count >= 1.0 {
        count.min(f64::from(i32::MAX)) as i32
    } else {
        1
    }
}

/// Lazy row-major scan over candidate cells, see [`covered_cells`].
#[derive(Debug, Clone)]
pub struct CoveredCells {
    tile: GridBounds,
    cell_width: f64,
    cell_height: f64,
    col_start: i32,
    col_end: i32,
    row_end: i32,
    col: i32,
    row: i32,
}

impl CoveredCells {
    fn empty(tile: GridBounds, cell_width: f64, cell_height: f64) -> Self {
        Self {
            tile,
            cell_width,
            cell_height,
            col_start: 0,
            col_end: 0,
            row_end: -1,
            col: 0,
            row: 0,
        }
    }

    /// Footprint of the cell at grid column `x`, row `y`.
    pub fn cell_polygon(&self, x: i32, y: i32) -> Polygon<f64> {
        cell_rect(&self.tile, self.cell_width, self.cell_height, x, y).to_polygon()
    }
}

impl Iterator for CoveredCells {
    type Item = CoveredCell;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row > self.row_end {
            return None;
        }
        let (x, y) = (self.col, self.row);
        if self.col == self.col_end {
            self.col = self.col_start;
            self.row += 1;
        } else {
            self.col += 1;
        }
        Some((x, y, self.cell_polygon(x, y)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.row > self.row_end {
            return (0, Some(0));
        }
        let width = (self.col_end - self.col_start + 1) as usize;
        let full_rows = (self.row_end - self.row) as usize;
        let remaining = full_rows * width + (self.col_end - self.col + 1) as usize;
        (remaining, Some(remaining))
    }
}

/// Projected rectangle covered by grid cell `(x, y)` of `tile`.
pub fn cell_rect(tile: &GridBounds, cell_width: f64, cell_height: f64, x: i32, y: i32) -> Rect<f64> {
    let left = tile.min_x + f64::from(x) * cell_width;
    let top = tile.max_y - f64::from(y) * cell_height;
    Rect::new(
        Coord {
            x: left,
            y: top - cell_height,
        },
        Coord {
            x: left + cell_width,
            y: top,
        },
    )
}
