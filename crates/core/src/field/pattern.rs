//! Pattern domain: the tiled, infinitely scrolling cloud elevation grid
//!
//! The domain is a square grid of `tiles_per_side * tile_size + 1` cells per
//! side (the midpoint-displacement recursion needs `2^k + 1` sub-grids). The
//! on-screen window (the region actually queried by sites) is surrounded by
//! exactly one tile of off-screen buffer on every side, so wind can shift the
//! pattern a full tile before exposing unbuilt territory.
//!
//! Cells are `Option<f64>`: `None` marks a cell the tile builder has not
//! populated yet, replacing the legacy magic-number sentinel and its fragile
//! threshold comparison.
//!
//! The domain is sized once, from the bounding box of the sites registered at
//! construction, and never resized. Sites registered later do not grow it.

use std::io;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::CloudConfig;
use crate::field::tile::build_tile;
use crate::geo::{GeoBounds, KM_PER_DEGREE};

/// One side of the pattern domain, used to name off-screen margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    /// Row 0 side (maximum latitude).
    North,
    /// Last-row side (minimum latitude).
    South,
    /// Column 0 side (minimum longitude).
    West,
    /// Last-column side (maximum longitude).
    East,
}

impl Edge {
    pub(crate) const ALL: [Edge; 4] = [Edge::North, Edge::South, Edge::West, Edge::East];
}

/// Outcome of the post-rebuild trim pass along one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TrimOutcome {
    /// Cells blanked because they fell outside the consistent populated range.
    pub blanked: usize,
    /// Holes left inside the consistent range (boundary inconsistency).
    pub residual_holes: usize,
}

/// The cloud elevation grid plus its geographic anchoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudField {
    tile_size: usize,
    tiles_per_side: usize,
    /// Side length in cells: `tiles_per_side * tile_size + 1`.
    size: usize,
    resolution_m: f64,
    /// Bounding box of the sites the domain was sized from. Queries outside
    /// this box are rejected.
    site_bounds: GeoBounds,
    /// Geographic box covered by the on-screen window, expanded symmetrically
    /// from `site_bounds` so the window spans a whole number of tiles.
    domain_bounds: GeoBounds,
    /// First pixel index of the on-screen window (row and column).
    on_screen_start: usize,
    /// On-screen window length in pixels: `(tiles_per_side - 2) * tile_size`.
    on_screen_len: usize,
    /// Row-major cells; `None` = not yet populated.
    cells: Vec<Option<f64>>,
}

impl CloudField {
    /// Size the domain from a site bounding box. Cells start unpopulated;
    /// call [`CloudField::build_initial`] to generate the first field.
    pub(crate) fn from_bounds(site_bounds: GeoBounds, config: &CloudConfig) -> Self {
        let tile_size = config.tile_size;
        let (ns_m, ew_m) = site_bounds.extent_m();
        let extent_px = ns_m.max(ew_m) / config.ground_resolution_m;
        let on_screen_tiles = ((extent_px / tile_size as f64).ceil() as usize).max(1);
        let tiles_per_side = on_screen_tiles + 2;
        let size = tiles_per_side * tile_size + 1;
        let on_screen_len = on_screen_tiles * tile_size;

        // Expand the geographic box symmetrically so the on-screen window
        // maps to a whole number of tiles centered on the original sites.
        let (center_lat, center_lon) = site_bounds.center();
        let window_km = on_screen_len as f64 * config.ground_resolution_m / 1000.0;
        let half_lat = window_km / KM_PER_DEGREE / 2.0;
        let half_lon =
            window_km / (KM_PER_DEGREE * site_bounds.min_lat.to_radians().cos()) / 2.0;
        let domain_bounds = GeoBounds {
            min_lat: center_lat - half_lat,
            max_lat: center_lat + half_lat,
            min_lon: center_lon - half_lon,
            max_lon: center_lon + half_lon,
        };

        CloudField {
            tile_size,
            tiles_per_side,
            size,
            resolution_m: config.ground_resolution_m,
            site_bounds,
            domain_bounds,
            on_screen_start: tile_size,
            on_screen_len,
            cells: vec![None; size * size],
        }
    }

    /// Generate the initial field: one tile builder pass over every tile,
    /// on-screen and buffer alike.
    pub(crate) fn build_initial(&mut self, rng: &mut rand::rngs::StdRng) {
        for tile_row in 0..self.tiles_per_side {
            for tile_col in 0..self.tiles_per_side {
                build_tile(
                    &mut self.cells,
                    self.size,
                    tile_row * self.tile_size,
                    tile_col * self.tile_size,
                    self.tile_size,
                    rng,
                );
            }
        }
    }

    /// Side length in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tile side length in pixels.
    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Number of tiles along one side (on-screen tiles plus two buffer tiles).
    pub fn tiles_per_side(&self) -> usize {
        self.tiles_per_side
    }

    /// Ground resolution (m per pixel).
    pub fn resolution_m(&self) -> f64 {
        self.resolution_m
    }

    /// First pixel index of the on-screen window.
    pub fn on_screen_start(&self) -> usize {
        self.on_screen_start
    }

    /// On-screen window length in pixels.
    pub fn on_screen_len(&self) -> usize {
        self.on_screen_len
    }

    /// Row and column ranges of the on-screen window.
    pub fn on_screen_window(&self) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let end = self.on_screen_start + self.on_screen_len;
        (self.on_screen_start..end, self.on_screen_start..end)
    }

    /// Bounding box of the sites the domain was sized from.
    pub fn site_bounds(&self) -> GeoBounds {
        self.site_bounds
    }

    /// Geographic box covered by the on-screen window.
    pub fn domain_bounds(&self) -> GeoBounds {
        self.domain_bounds
    }

    #[inline]
    pub(crate) fn idx(&self, row: usize, col: usize) -> usize {
        row * self.size + col
    }

    /// Cell value, `None` when unpopulated.
    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.cells[self.idx(row, col)]
    }

    pub(crate) fn cells(&self) -> &[Option<f64>] {
        &self.cells
    }

    /// Whether every cell of the domain holds a sample. The on-screen window
    /// plus its one-tile buffer is the whole domain, so this is the
    /// post-advection integrity invariant.
    pub fn fully_populated(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Min and max over populated cells, `None` when nothing is populated.
    pub fn populated_min_max(&self) -> Option<(f64, f64)> {
        self.cells
            .par_iter()
            .filter_map(|c| *c)
            .map(|v| (v, v))
            .reduce_with(|a, b| (a.0.min(b.0), a.1.max(b.1)))
    }

    /// Translate every cell by `(row_shift, col_shift)` pixels. Destinations
    /// outside the domain are dropped; cells no source lands on become
    /// unpopulated.
    pub(crate) fn shift(&mut self, row_shift: isize, col_shift: isize) {
        if row_shift == 0 && col_shift == 0 {
            return;
        }
        let size = self.size as isize;
        let mut shifted = vec![None; self.cells.len()];
        for row in 0..self.size {
            for col in 0..self.size {
                if let Some(value) = self.cells[self.idx(row, col)] {
                    let new_row = row as isize + row_shift;
                    let new_col = col as isize + col_shift;
                    if (0..size).contains(&new_row) && (0..size).contains(&new_col) {
                        shifted[(new_row * size + new_col) as usize] = Some(value);
                    }
                }
            }
        }
        self.cells = shifted;
    }

    /// Margin cell ranges for an edge, excluding the boundary row/column
    /// shared with the neighboring tile (rows, cols).
    fn margin_ranges(&self, edge: Edge) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let t = self.tile_size;
        let size = self.size;
        match edge {
            Edge::North => (0..t, 0..size),
            Edge::South => (size - t..size, 0..size),
            Edge::West => (0..size, 0..t),
            Edge::East => (0..size, size - t..size),
        }
    }

    /// Whether the off-screen margin along an edge contains unpopulated
    /// cells (i.e. the shift exposed it).
    pub(crate) fn margin_has_holes(&self, edge: Edge) -> bool {
        let (rows, cols) = self.margin_ranges(edge);
        rows.clone()
            .any(|r| cols.clone().any(|c| self.cells[self.idx(r, c)].is_none()))
    }

    /// Regenerate the tile row/column backing an edge margin. Populated
    /// cells are never touched; only vacated cells receive fresh fractal
    /// values. Returns the number of tiles visited.
    pub(crate) fn rebuild_margin(&mut self, edge: Edge, rng: &mut rand::rngs::StdRng) -> usize {
        let last = self.tiles_per_side - 1;
        let mut built = 0;
        for i in 0..self.tiles_per_side {
            let (tile_row, tile_col) = match edge {
                Edge::North => (0, i),
                Edge::South => (last, i),
                Edge::West => (i, 0),
                Edge::East => (i, last),
            };
            build_tile(
                &mut self.cells,
                self.size,
                tile_row * self.tile_size,
                tile_col * self.tile_size,
                self.tile_size,
                rng,
            );
            built += 1;
        }
        built
    }

    /// Trim pass after an edge rebuild: probe three strips perpendicular to
    /// the rebuilt edge (outer margin edge, mid-margin, shared tile
    /// boundary), find the tightest contiguous index range populated on all
    /// three, and blank margin cells outside that range so a partially built
    /// neighbor cannot leak an inconsistent edge on-screen.
    pub(crate) fn trim_margin(&mut self, edge: Edge) -> TrimOutcome {
        let t = self.tile_size;
        let size = self.size;
        // Strip positions along the margin depth axis.
        let strips = match edge {
            Edge::North | Edge::West => [0, t / 2, t],
            Edge::South | Edge::East => [size - 1, size - 1 - t / 2, size - 1 - t],
        };

        let populated_across = |i: usize| {
            strips.iter().all(|&s| {
                let (row, col) = match edge {
                    Edge::North | Edge::South => (s, i),
                    Edge::West | Edge::East => (i, s),
                };
                self.cells[row * size + col].is_some()
            })
        };

        // Longest contiguous run of perpendicular indices populated on all
        // three strips.
        let mut best = 0..0;
        let mut run_start = None;
        for i in 0..=size {
            if i < size && populated_across(i) {
                run_start.get_or_insert(i);
            } else if let Some(start) = run_start.take() {
                if i - start > best.len() {
                    best = start..i;
                }
            }
        }

        let (rows, cols) = self.margin_ranges(edge);
        let mut outcome = TrimOutcome::default();
        for row in rows {
            for col in cols.clone() {
                let along = match edge {
                    Edge::North | Edge::South => col,
                    Edge::West | Edge::East => row,
                };
                let idx = row * size + col;
                if best.contains(&along) {
                    if self.cells[idx].is_none() {
                        outcome.residual_holes += 1;
                    }
                } else if self.cells[idx].take().is_some() {
                    outcome.blanked += 1;
                }
            }
        }
        outcome
    }

    /// Sweep every tile and regenerate any that still contains holes. Covers
    /// shifts larger than one tile, where vacated cells extend past the
    /// margin the edge rebuild restored.
    pub(crate) fn fill_holes(&mut self, rng: &mut rand::rngs::StdRng) -> usize {
        let mut built = 0;
        for tile_row in 0..self.tiles_per_side {
            for tile_col in 0..self.tiles_per_side {
                let row0 = tile_row * self.tile_size;
                let col0 = tile_col * self.tile_size;
                let has_hole = (row0..=row0 + self.tile_size).any(|r| {
                    (col0..=col0 + self.tile_size).any(|c| self.cells[self.idx(r, c)].is_none())
                });
                if has_hole {
                    build_tile(
                        &mut self.cells,
                        self.size,
                        row0,
                        col0,
                        self.tile_size,
                        rng,
                    );
                    built += 1;
                }
            }
        }
        built
    }

    /// Map a geographic point to grid indices by linear interpolation against
    /// the domain bounds. The caller is responsible for rejecting points
    /// outside the site bounding box first.
    pub(crate) fn grid_position(&self, latitude: f64, longitude: f64) -> (usize, usize) {
        let bounds = self.domain_bounds;
        let lat_span = bounds.max_lat - bounds.min_lat;
        let lon_span = bounds.max_lon - bounds.min_lon;
        let row_f = self.on_screen_start as f64
            + (bounds.max_lat - latitude) / lat_span * self.on_screen_len as f64;
        let col_f = self.on_screen_start as f64
            + (longitude - bounds.min_lon) / lon_span * self.on_screen_len as f64;
        let row = (row_f.floor() as usize).min(self.size - 1);
        let col = (col_f.floor() as usize).min(self.size - 1);
        (row, col)
    }

    /// Dump the raw grid as comma-separated rows. Unpopulated cells are
    /// written as empty fields. Offline diagnostics only.
    pub fn write_csv<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_grid_csv(writer, self.size, &self.cells)
    }
}

/// A grid derived from the pattern domain (normalized, binary or fuzzy).
/// Fully recomputed by each classifier/shading pass; carries no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    size: usize,
    cells: Vec<Option<f64>>,
}

impl Pattern {
    pub(crate) fn new(size: usize, cells: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(cells.len(), size * size);
        Pattern { size, cells }
    }

    /// Side length in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cell value, `None` where the pattern domain is unpopulated.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells[row * self.size + col]
    }

    pub(crate) fn cells(&self) -> &[Option<f64>] {
        &self.cells
    }

    /// Dump as comma-separated rows, empty fields for unpopulated cells.
    pub fn write_csv<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write_grid_csv(writer, self.size, &self.cells)
    }
}

fn write_grid_csv<W: io::Write>(
    writer: &mut W,
    size: usize,
    cells: &[Option<f64>],
) -> io::Result<()> {
    for row in 0..size {
        for col in 0..size {
            if col > 0 {
                write!(writer, ",")?;
            }
            if let Some(value) = cells[row * size + col] {
                write!(writer, "{value}")?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}
