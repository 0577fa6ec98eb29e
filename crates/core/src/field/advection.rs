//! Wind-driven advection of the cloud pattern
//!
//! Each tick the measured wind is converted into an integer pixel shift of
//! the whole pattern. Sub-pixel motion accumulates in residues so a small
//! sustained wind still moves the field eventually. After the shift, any
//! off-screen margin the motion exposed is regenerated tile-by-tile and
//! trimmed, so the on-screen window plus its one-tile buffer is fully
//! populated again by the time the tick completes.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::field::pattern::{CloudField, Edge};

/// Wind measurement plus the sub-pixel shift residues carried across ticks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindState {
    /// Wind speed as last handed to the controller (m/s, after the cloud
    /// speed factor was applied).
    pub speed: f64,
    /// Wind direction as measured (compass degrees, before the remap into
    /// the engine's internal angle convention).
    pub direction_deg: f64,
    /// Accumulated fractional column shift not yet applied.
    col_residue: f64,
    /// Accumulated fractional row shift not yet applied.
    row_residue: f64,
}

impl WindState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick of wind into the residues and extract the integer pixel
    /// shift to apply, `(row_shift, col_shift)`.
    pub(crate) fn update(
        &mut self,
        speed: f64,
        direction_deg: f64,
        elapsed_s: f64,
        resolution_m: f64,
    ) -> (isize, isize) {
        self.speed = speed;
        self.direction_deg = direction_deg;

        let direction = remap_direction_deg(direction_deg).to_radians();
        let pixels = speed * elapsed_s / resolution_m;
        self.col_residue += pixels * direction.cos();
        self.row_residue += pixels * direction.sin();

        let col_shift = self.col_residue.trunc();
        let row_shift = self.row_residue.trunc();
        self.col_residue -= col_shift;
        self.row_residue -= row_shift;
        (row_shift as isize, col_shift as isize)
    }
}

/// Remap a compass wind direction into the engine's internal angle
/// convention: subtract 180°, negate after subtracting 90°, wrap into
/// [-360°, 360°).
fn remap_direction_deg(compass_deg: f64) -> f64 {
    let mut direction = -((compass_deg - 180.0) - 90.0);
    while direction >= 360.0 {
        direction -= 360.0;
    }
    while direction < -360.0 {
        direction += 360.0;
    }
    direction
}

/// What one advection tick did to the pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvectStats {
    /// Integer pixel shift applied this tick.
    pub row_shift: isize,
    pub col_shift: isize,
    /// Tiles the builder visited while restoring exposed territory.
    pub tiles_rebuilt: usize,
    /// Cells blanked by the trim pass.
    pub cells_trimmed: usize,
    /// Holes the rebuild/trim sequence failed to eliminate. Downstream
    /// queries treat them as "no data / assume clear".
    pub residual_holes: usize,
}

impl AdvectStats {
    /// Whether the tick moved the pattern at all.
    pub fn shifted(&self) -> bool {
        self.row_shift != 0 || self.col_shift != 0
    }
}

/// Advance the pattern one tick under the given wind.
///
/// A tick that produces no integer shift does no work and leaves the field
/// byte-for-byte unchanged.
pub(crate) fn advect(
    field: &mut CloudField,
    wind: &mut WindState,
    speed: f64,
    direction_deg: f64,
    elapsed_s: f64,
    rng: &mut StdRng,
) -> AdvectStats {
    let (row_shift, col_shift) = wind.update(speed, direction_deg, elapsed_s, field.resolution_m());
    if row_shift == 0 && col_shift == 0 {
        return AdvectStats::default();
    }

    let mut stats = AdvectStats {
        row_shift,
        col_shift,
        ..AdvectStats::default()
    };

    field.shift(row_shift, col_shift);

    // Regenerate the margin(s) the shift exposed, then trim away anything a
    // partially built neighbor left inconsistent.
    for edge in Edge::ALL {
        if field.margin_has_holes(edge) {
            stats.tiles_rebuilt += field.rebuild_margin(edge, rng);
            let trim = field.trim_margin(edge);
            stats.cells_trimmed += trim.blanked;
            if trim.residual_holes > 0 {
                warn!(
                    ?edge,
                    residual_holes = trim.residual_holes,
                    "trim pass left unpopulated cells near rebuilt edge"
                );
            }
        }
    }

    // A shift larger than one tile (or a trim blank) can leave holes past
    // the rebuilt margins; sweep and regenerate affected tiles.
    stats.tiles_rebuilt += field.fill_holes(rng);

    if !field.fully_populated() {
        let holes = field.cells().iter().filter(|c| c.is_none()).count();
        stats.residual_holes = holes;
        warn!(
            holes,
            "advection left unpopulated cells; queries there assume clear sky"
        );
    }

    debug!(
        row_shift,
        col_shift,
        tiles_rebuilt = stats.tiles_rebuilt,
        "advected cloud pattern"
    );
    stats
}
