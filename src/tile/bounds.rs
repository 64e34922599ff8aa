//! Tile and geographic bounds
//!
//! `TileBounds` is an inclusive rectangle of tiles at one zoom level. In
//! tile-id space it is not one range but one strip per row, so intersection
//! with an id range has to look at the rows the range touches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

use super::{grid_size, TileId, TileRange};

// =============================================================================
// Tile Bounds
// =============================================================================

/// Inclusive rectangle of tiles `[min_col, max_col] × [min_row, max_row]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileBounds {
    pub zoom: u32,
    pub min_col: u64,
    pub min_row: u64,
    pub max_col: u64,
    pub max_row: u64,
}

impl TileBounds {
    /// Create a validated rectangle
    ///
    /// Fails with `InvalidCoordinate` if a corner is outside the zoom's grid
    /// or the rectangle is inverted.
    pub fn new(zoom: u32, min_col: u64, min_row: u64, max_col: u64, max_row: u64) -> Result<Self> {
        let side = grid_size(zoom)?;

        for (col, row) in [(min_col, min_row), (max_col, max_row)] {
            if col >= side || row >= side {
                return Err(VaultError::InvalidCoordinate {
                    zoom,
                    col: i64::try_from(col).unwrap_or(i64::MAX),
                    row: i64::try_from(row).unwrap_or(i64::MAX),
                });
            }
        }

        if min_col > max_col || min_row > max_row {
            return Err(VaultError::InvalidBounds(format!(
                "inverted tile bounds: cols {}..={} rows {}..={}",
                min_col, max_col, min_row, max_row
            )));
        }

        Ok(Self {
            zoom,
            min_col,
            min_row,
            max_col,
            max_row,
        })
    }

    /// The whole grid at `zoom`
    pub fn full(zoom: u32) -> Result<Self> {
        let side = grid_size(zoom)?;
        Self::new(zoom, 0, 0, side - 1, side - 1)
    }

    /// Convert a geographic rectangle to the tiles it touches
    ///
    /// Uses an equal-angle global grid: 2^zoom columns over 360° of longitude
    /// and 2^zoom rows over 180° of latitude, row 0 at the south edge. Edges
    /// that fall exactly on a tile boundary do not pull in the next tile.
    pub fn from_geographic(bounds: &Bounds, zoom: u32) -> Result<Self> {
        bounds.validate()?;
        let side = grid_size(zoom)?;
        let last = (side - 1) as f64;
        let scale = side as f64;

        let min_col = (((bounds.w + 180.0) / 360.0) * scale).floor().clamp(0.0, last);
        let min_row = (((bounds.s + 90.0) / 180.0) * scale).floor().clamp(0.0, last);
        let max_col = ((((bounds.e + 180.0) / 360.0) * scale).ceil() - 1.0).clamp(min_col, last);
        let max_row = ((((bounds.n + 90.0) / 180.0) * scale).ceil() - 1.0).clamp(min_row, last);

        Self::new(
            zoom,
            min_col as u64,
            min_row as u64,
            max_col as u64,
            max_row as u64,
        )
    }

    /// Parse `min_col,min_row,max_col,max_row` (the `Display` form)
    pub fn parse(zoom: u32, s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VaultError::InvalidBounds(format!("{:?}: {}", s, e)))?;

        match values.as_slice() {
            [min_col, min_row, max_col, max_row] => {
                Self::new(zoom, *min_col, *min_row, *max_col, *max_row)
            }
            _ => Err(VaultError::InvalidBounds(format!(
                "expected 4 comma-separated values, got {:?}",
                s
            ))),
        }
    }

    pub fn width(&self) -> u64 {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> u64 {
        self.max_row - self.min_row + 1
    }

    /// Number of tiles in the rectangle
    pub fn tile_count(&self) -> u64 {
        self.width() * self.height()
    }

    pub fn contains(&self, col: u64, row: u64) -> bool {
        col >= self.min_col && col <= self.max_col && row >= self.min_row && row <= self.max_row
    }

    /// Check whether a tile id at this zoom lies in the rectangle
    pub fn contains_tile_id(&self, id: TileId) -> bool {
        let side = 1u64 << self.zoom;
        let row = id >> self.zoom;
        row < side && self.contains(id & (side - 1), row)
    }

    /// Smallest id range enclosing the rectangle (lower-left to upper-right)
    pub fn id_range(&self) -> TileRange {
        let side = 1u64 << self.zoom;
        TileRange::new(
            self.min_row * side + self.min_col,
            self.max_row * side + self.max_col,
        )
    }

    /// Check whether any tile of `range` lies in the rectangle
    pub fn intersects_range(&self, range: &TileRange) -> bool {
        let side = 1u64 << self.zoom;
        let mask = side - 1;
        let last = side * side - 1;

        if range.start > last {
            return false;
        }
        let end = range.end.min(last);

        let first_row = range.start >> self.zoom;
        let last_row = end >> self.zoom;

        let lo_row = first_row.max(self.min_row);
        let hi_row = last_row.min(self.max_row);
        if lo_row > hi_row {
            return false;
        }

        // Any row strictly inside the range spans the full grid width
        if hi_row - lo_row >= 2 {
            return true;
        }

        [lo_row, hi_row].iter().any(|&row| {
            let lo_col = if row == first_row { range.start & mask } else { 0 };
            let hi_col = if row == last_row { end & mask } else { mask };
            lo_col <= self.max_col && hi_col >= self.min_col
        })
    }

    /// Per-row id strips of the rectangle that overlap `range`, ascending
    pub fn clip_range(&self, range: &TileRange) -> Vec<TileRange> {
        let side = 1u64 << self.zoom;
        let last = side * side - 1;
        if range.start > last {
            return Vec::new();
        }

        let lo_row = (range.start >> self.zoom).max(self.min_row);
        let hi_row = (range.end.min(last) >> self.zoom).min(self.max_row);

        let mut strips = Vec::new();
        let mut row = lo_row;
        while row <= hi_row {
            let strip = TileRange::new(row * side + self.min_col, row * side + self.max_col);
            if let Some(part) = strip.intersection(range) {
                strips.push(part);
            }
            row += 1;
        }
        strips
    }
}

impl fmt::Display for TileBounds {
    /// `min_col,min_row,max_col,max_row`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_col, self.min_row, self.max_col, self.max_row
        )
    }
}

// =============================================================================
// Geographic Bounds
// =============================================================================

/// WGS84 rectangle in degrees: west, south, east, north
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub w: f64,
    pub s: f64,
    pub e: f64,
    pub n: f64,
}

impl Bounds {
    pub const fn new(w: f64, s: f64, e: f64, n: f64) -> Self {
        Self { w, s, e, n }
    }

    /// The whole globe
    pub const fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.w, self.s, self.e, self.n].iter().all(|v| v.is_finite());
        if !finite || self.w > self.e || self.s > self.n {
            return Err(VaultError::InvalidBounds(format!(
                "geographic bounds {} are not a valid rectangle",
                self
            )));
        }
        Ok(())
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::world()
    }
}

impl fmt::Display for Bounds {
    /// `w,s,e,n`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.w, self.s, self.e, self.n)
    }
}

impl FromStr for Bounds {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VaultError::InvalidBounds(format!("{:?}: {}", s, e)))?;

        match values.as_slice() {
            [w, s, e, n] => Ok(Bounds::new(*w, *s, *e, *n)),
            _ => Err(VaultError::InvalidBounds(format!(
                "expected 4 comma-separated values, got {:?}",
                s
            ))),
        }
    }
}
