//! Midpoint-displacement tile builder
//!
//! Populates one square tile of `tile_size + 1` cells on a side with fractal
//! elevation values, the unit of generation for the cloud pattern. A
//! diamond-square variant: each recursion level fills sub-square centers with
//! the mean of the four corners plus a normal perturbation, then the four
//! edge midpoints with the mean of the center and the two adjacent corners
//! plus a perturbation.
//!
//! Cells that are already populated are never overwritten. This is what makes
//! tiles seamless: a tile built next to an existing one inherits the shared
//! edge exactly, and an edge rebuild after advection only fills the cells the
//! shift vacated.
//!
//! The perturbation magnitude decays by `0.5^(0.5 * (2 - D))` per level, with
//! fractal dimension `D = 1.9` over the first three levels and `D = 1.33`
//! below that. The rough large-scale / smooth small-scale profile is what
//! clusters the field into cumulus-like blobs instead of uniform noise.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Roughness of the fractal field: standard deviation of the corner seeds and
/// starting point of the per-level perturbation decay. The field is min-max
/// normalized before classification, so only the decay profile matters, not
/// the absolute scale.
pub(crate) const FRACTAL_SIGMA: f64 = 100.0;

/// Fractal dimension for the first `COARSE_LEVELS` recursion levels.
const COARSE_FRACTAL_DIM: f64 = 1.9;

/// Fractal dimension below the coarse levels.
const FINE_FRACTAL_DIM: f64 = 1.33;

/// Number of recursion levels generated at the coarse dimension.
const COARSE_LEVELS: u32 = 3;

#[inline]
fn cell_value(cells: &[Option<f64>], idx: usize) -> f64 {
    debug_assert!(cells[idx].is_some(), "cell read before population");
    cells[idx].unwrap_or(0.0)
}

/// Populate the tile whose top-left corner cell is at `(row0, col0)`.
///
/// `cells` is the full pattern grid, row-major with side length `grid_size`;
/// the tile occupies rows `row0..=row0 + tile_size` and the matching columns.
/// `tile_size` must be a power of two and the tile must lie inside the grid;
/// both are guaranteed by the domain layout.
pub(crate) fn build_tile(
    cells: &mut [Option<f64>],
    grid_size: usize,
    row0: usize,
    col0: usize,
    tile_size: usize,
    rng: &mut StdRng,
) {
    debug_assert!(tile_size.is_power_of_two());
    debug_assert!(row0 + tile_size < grid_size && col0 + tile_size < grid_size);

    let idx = |r: usize, c: usize| r * grid_size + c;

    // Seed unpopulated corners; corners shared with a neighboring tile stay.
    for (r, c) in [
        (row0, col0),
        (row0, col0 + tile_size),
        (row0 + tile_size, col0),
        (row0 + tile_size, col0 + tile_size),
    ] {
        if cells[idx(r, c)].is_none() {
            let z: f64 = rng.sample(StandardNormal);
            cells[idx(r, c)] = Some(z * FRACTAL_SIGMA);
        }
    }

    let mut sigma = FRACTAL_SIGMA;
    let mut step = tile_size;
    let mut level: u32 = 0;

    while step > 1 {
        let half = step / 2;
        let dim = if level < COARSE_LEVELS {
            COARSE_FRACTAL_DIM
        } else {
            FINE_FRACTAL_DIM
        };
        sigma *= 0.5_f64.powf(0.5 * (2.0 - dim));

        let mut r = row0;
        while r < row0 + tile_size {
            let mut c = col0;
            while c < col0 + tile_size {
                // Diamond step: sub-square center from its four corners.
                let center_idx = idx(r + half, c + half);
                let corner_mean = (cell_value(cells, idx(r, c))
                    + cell_value(cells, idx(r, c + step))
                    + cell_value(cells, idx(r + step, c))
                    + cell_value(cells, idx(r + step, c + step)))
                    / 4.0;
                if cells[center_idx].is_none() {
                    let z: f64 = rng.sample(StandardNormal);
                    cells[center_idx] = Some(corner_mean + z * sigma);
                }
                let center = cell_value(cells, center_idx);

                // Square step: edge midpoints from the center and the two
                // adjacent corners. Midpoints shared with a neighboring
                // sub-square or tile keep their first value.
                let midpoints = [
                    (idx(r, c + half), idx(r, c), idx(r, c + step)),
                    (
                        idx(r + step, c + half),
                        idx(r + step, c),
                        idx(r + step, c + step),
                    ),
                    (idx(r + half, c), idx(r, c), idx(r + step, c)),
                    (
                        idx(r + half, c + step),
                        idx(r, c + step),
                        idx(r + step, c + step),
                    ),
                ];
                for (mid_idx, corner_a, corner_b) in midpoints {
                    if cells[mid_idx].is_none() {
                        let mean = (center
                            + cell_value(cells, corner_a)
                            + cell_value(cells, corner_b))
                            / 3.0;
                        let z: f64 = rng.sample(StandardNormal);
                        cells[mid_idx] = Some(mean + z * sigma);
                    }
                }

                c += step;
            }
            r += step;
        }

        step = half;
        level += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn empty_grid(size: usize) -> Vec<Option<f64>> {
        vec![None; size * size]
    }

    #[test]
    fn test_tile_fully_populated() {
        let tile = 8;
        let size = 2 * tile + 1;
        let mut cells = empty_grid(size);
        let mut rng = StdRng::seed_from_u64(7);

        build_tile(&mut cells, size, 0, 0, tile, &mut rng);

        for r in 0..=tile {
            for c in 0..=tile {
                assert!(cells[r * size + c].is_some(), "hole at ({r}, {c})");
            }
        }
        // Cells outside the tile untouched
        assert!(cells[tile + 1].is_none());
        assert!(cells[(tile + 1) * size].is_none());
    }

    #[test]
    fn test_seam_continuity() {
        let tile = 8;
        let size = 2 * tile + 1;
        let mut cells = empty_grid(size);
        let mut rng = StdRng::seed_from_u64(42);

        build_tile(&mut cells, size, 0, 0, tile, &mut rng);
        let shared: Vec<Option<f64>> = (0..=tile).map(|r| cells[r * size + tile]).collect();
        assert!(shared.iter().all(Option::is_some));

        // Building the adjacent tile must leave the shared column untouched
        build_tile(&mut cells, size, 0, tile, tile, &mut rng);
        for r in 0..=tile {
            assert_eq!(cells[r * size + tile], shared[r], "seam moved at row {r}");
        }
        // And the new tile is complete
        for r in 0..=tile {
            for c in tile..=2 * tile {
                assert!(cells[r * size + c].is_some());
            }
        }
    }

    #[test]
    fn test_populated_cells_never_overwritten() {
        let tile = 4;
        let size = tile + 1;
        let mut cells = empty_grid(size);
        cells[0] = Some(1.25);
        cells[2 * size + 2] = Some(-3.5);
        let mut rng = StdRng::seed_from_u64(1);

        build_tile(&mut cells, size, 0, 0, tile, &mut rng);

        assert_eq!(cells[0], Some(1.25));
        assert_eq!(cells[2 * size + 2], Some(-3.5));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let tile = 8;
        let size = tile + 1;

        let mut a = empty_grid(size);
        let mut rng_a = StdRng::seed_from_u64(99);
        build_tile(&mut a, size, 0, 0, tile, &mut rng_a);

        let mut b = empty_grid(size);
        let mut rng_b = StdRng::seed_from_u64(99);
        build_tile(&mut b, size, 0, 0, tile, &mut rng_b);

        assert_eq!(a, b);
    }
}
