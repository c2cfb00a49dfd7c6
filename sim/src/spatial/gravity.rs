/*
 * Epidemic Simulation Using Synthetic Populations (ESUSP)
 * Copyright (c)  2022. Sam Ralph
 *
 * This file is part of ESUSP.
 *
 * ESUSP is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, version 3 of the License.
 *
 * ESUSP is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with ESUSP.  If not, see <https://www.gnu.org/licenses/>.
 *
 */

use log::{debug, info};
use rand::rngs::SmallRng;

use crate::random::draw_from_cdf;
use crate::spatial::neighborhood::NeighborhoodGrid;

/// Parameters of the gravity weighted destination choice
#[derive(Copy, Clone, Debug)]
pub struct GravityConfig {
    /// Destinations beyond this are never considered; negative disables
    /// geography entirely (the degenerate population-weighted model)
    pub max_distance_km: f64,
    pub min_distance_km: f64,
    pub max_destinations: usize,
    pub pop_exponent: f64,
    pub dist_exponent: f64,
}

impl Default for GravityConfig {
    fn default() -> Self {
        GravityConfig {
            max_distance_km: 25.0,
            min_distance_km: 4.0,
            max_destinations: 128,
            pop_exponent: 1.0,
            dist_exponent: 3.0,
        }
    }
}

/// Per source patch: destination patch coordinates and the matching cdf
#[derive(Clone, Debug, Default)]
struct PatchCdf {
    destinations: Vec<(usize, usize)>,
    cdf: Vec<f64>,
}

/// Gravity weighted neighborhood destination sampling
///
/// Built once after the population and neighborhood places are known;
/// immutable afterwards
pub struct GravityModel {
    cols: usize,
    null_model: bool,
    patch_cdfs: Vec<PatchCdf>,
}

impl GravityModel {
    pub fn build(grid: &NeighborhoodGrid, config: &GravityConfig) -> GravityModel {
        if config.max_distance_km < 0.0 {
            return Self::build_null_model(grid);
        }
        let mut patch_cdfs = vec![PatchCdf::default(); grid.rows() * grid.cols()];
        let max_offset = (config.max_distance_km / grid.patch_size_km()).ceil() as i64;
        let mut populated_sources = 0_usize;
        for src in grid.patches() {
            if src.popsize == 0 {
                continue;
            }
            populated_sources += 1;
            let mut weighted: Vec<((usize, usize), f64)> = Vec::new();
            let row_lo = (src.row as i64 - max_offset).max(0) as usize;
            let col_lo = (src.col as i64 - max_offset).max(0) as usize;
            let row_hi = ((src.row as i64 + max_offset) as usize).min(grid.rows() - 1);
            let col_hi = ((src.col as i64 + max_offset) as usize).min(grid.cols() - 1);
            for row in row_lo..=row_hi {
                for col in col_lo..=col_hi {
                    let dest = match grid.patch(row, col) {
                        Some(patch) if patch.popsize > 0 => patch,
                        _ => continue,
                    };
                    let dx = src.center_x - dest.center_x;
                    let dy = src.center_y - dest.center_y;
                    let dist = (dx * dx + dy * dy).sqrt();
                    if dist > config.max_distance_km {
                        continue;
                    }
                    let gravity = (dest.popsize as f64).powf(config.pop_exponent)
                        / (1.0 + (dist / config.min_distance_km).powf(config.dist_exponent));
                    weighted.push(((row, col), gravity));
                }
            }
            // keep the strongest destinations only
            weighted.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            weighted.truncate(config.max_destinations);

            let total: f64 = weighted.iter().map(|(_, w)| w).sum();
            let mut cdf = Vec::with_capacity(weighted.len());
            let mut destinations = Vec::with_capacity(weighted.len());
            let mut running = 0.0;
            for (dest, weight) in &weighted {
                running += weight / total;
                cdf.push(running);
                destinations.push(*dest);
            }
            patch_cdfs[src.row * grid.cols() + src.col] = PatchCdf { destinations, cdf };
        }
        info!(
            "Gravity model built for {} populated patches (max offset {} patches)",
            populated_sources, max_offset
        );
        GravityModel {
            cols: grid.cols(),
            null_model: false,
            patch_cdfs,
        }
    }

    /// Every source shares one population-weighted cdf over all patches
    fn build_null_model(grid: &NeighborhoodGrid) -> GravityModel {
        let mut destinations = Vec::new();
        let mut weights = Vec::new();
        for patch in grid.patches() {
            if patch.popsize > 0 {
                destinations.push((patch.row, patch.col));
                weights.push(patch.popsize as f64);
            }
        }
        let total: f64 = weights.iter().sum();
        let mut cdf = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        for weight in &weights {
            running += weight / total;
            cdf.push(running);
        }
        debug!("Null gravity model over {} populated patches", destinations.len());
        GravityModel {
            cols: grid.cols(),
            null_model: true,
            patch_cdfs: vec![PatchCdf { destinations, cdf }],
        }
    }

    fn cdf_for(&self, row: usize, col: usize) -> &PatchCdf {
        if self.null_model {
            &self.patch_cdfs[0]
        } else {
            &self.patch_cdfs[row * self.cols + col]
        }
    }

    /// Samples the destination patch for a trip starting at (row, col)
    pub fn sample_destination(
        &self,
        row: usize,
        col: usize,
        rng: &mut SmallRng,
    ) -> Option<(usize, usize)> {
        let patch = self.cdf_for(row, col);
        if patch.cdf.is_empty() {
            return None;
        }
        let index = draw_from_cdf(rng, &patch.cdf);
        Some(patch.destinations[index])
    }

    /// The normalised probabilities for one source patch, heaviest first
    pub fn destination_probabilities(&self, row: usize, col: usize) -> Vec<((usize, usize), f64)> {
        let patch = self.cdf_for(row, col);
        let mut previous = 0.0;
        patch
            .destinations
            .iter()
            .zip(&patch.cdf)
            .map(|(dest, cumulative)| {
                let p = cumulative - previous;
                previous = *cumulative;
                (*dest, p)
            })
            .collect()
    }

    /// The cdf rows, used by the quality control checks
    pub fn cdfs(&self) -> impl Iterator<Item = &[f64]> {
        self.patch_cdfs.iter().map(|patch| patch.cdf.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use crate::geo::Projection;
    use crate::random::{substream, STREAM_SCHEDULE};
    use crate::spatial::gravity::{GravityConfig, GravityModel};
    use crate::spatial::neighborhood::NeighborhoodGrid;
    use crate::spatial::BoundingBox;

    /// A single row of 1 km patches with the given population per patch
    fn strip_grid(pops: &[u32]) -> NeighborhoodGrid {
        let bounds = BoundingBox {
            min_lat: 0.0,
            max_lat: 0.00001,
            min_lon: 0.0,
            max_lon: pops.len() as f64 / 111.325,
        };
        let mut grid = NeighborhoodGrid::new(bounds, Projection::centered_at(0.0), 1.0);
        for (index, pop) in pops.iter().enumerate() {
            grid.patch_mut(0, index).unwrap().popsize = *pop;
        }
        grid
    }

    #[test]
    fn cdf_is_monotone_and_ends_at_one() {
        let grid = strip_grid(&[50, 100, 100, 100, 100]);
        let model = GravityModel::build(&grid, &GravityConfig::default());
        for cdf in model.cdfs() {
            if cdf.is_empty() {
                continue;
            }
            for window in cdf.windows(2) {
                assert!(window[0] <= window[1] + 1e-12, "cdf must be nondecreasing");
            }
            assert!((cdf.last().unwrap() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn probabilities_follow_the_gravity_formula() {
        // source at col 0, destinations at 1, 2 and 4 km with pop 100 each
        let grid = strip_grid(&[1, 100, 100, 0, 100]);
        let config = GravityConfig {
            max_distance_km: 10.0,
            min_distance_km: 1.0,
            max_destinations: 8,
            pop_exponent: 1.0,
            dist_exponent: 2.0,
        };
        let model = GravityModel::build(&grid, &config);
        let probabilities = model.destination_probabilities(0, 0);
        // raw weights: the source itself (d=0) 1/(1+0)=1, then
        // 100/(1+1)=50, 100/(1+4)=20 and 100/(1+16)=100/17
        let w = [1.0, 50.0, 20.0, 100.0 / 17.0];
        let total: f64 = w.iter().sum();
        for ((dest, p), expected) in probabilities
            .iter()
            .filter(|((_, col), _)| *col != 0)
            .zip([w[1] / total, w[2] / total, w[3] / total])
        {
            assert!(
                (p - expected).abs() < 1e-9,
                "destination {:?} got {} expected {}",
                dest,
                p,
                expected
            );
        }
    }

    #[test]
    fn sampling_matches_the_cdf() {
        let grid = strip_grid(&[1, 100, 100, 0, 100]);
        let config = GravityConfig {
            max_distance_km: 10.0,
            min_distance_km: 1.0,
            max_destinations: 8,
            pop_exponent: 1.0,
            dist_exponent: 2.0,
        };
        let model = GravityModel::build(&grid, &config);
        let expected = model.destination_probabilities(0, 0);
        let mut rng = substream(7, STREAM_SCHEDULE, 0, 0);
        let draws = 100_000;
        let mut counts = std::collections::HashMap::new();
        for _ in 0..draws {
            let dest = model.sample_destination(0, 0, &mut rng).unwrap();
            *counts.entry(dest).or_insert(0_u32) += 1;
        }
        for (dest, p) in expected {
            let observed = f64::from(*counts.get(&dest).unwrap_or(&0)) / draws as f64;
            assert!(
                (observed - p).abs() < 0.01,
                "destination {:?}: observed {} expected {}",
                dest,
                observed,
                p
            );
        }
    }

    #[test]
    fn null_model_ignores_the_source_patch() {
        let grid = strip_grid(&[50, 150, 0, 0, 0]);
        let config = GravityConfig {
            max_distance_km: -1.0,
            ..GravityConfig::default()
        };
        let model = GravityModel::build(&grid, &config);
        let from_first = model.destination_probabilities(0, 0);
        let from_last = model.destination_probabilities(0, 4);
        assert_eq!(from_first, from_last);
        let p: f64 = from_first
            .iter()
            .find(|((_, col), _)| *col == 1)
            .map(|(_, p)| *p)
            .unwrap();
        assert!((p - 0.75).abs() < 1e-9);
    }
}
