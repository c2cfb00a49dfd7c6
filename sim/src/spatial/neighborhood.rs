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

use geo_types::Point;
use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::geo::Projection;
use crate::models::place::{PlaceId, PlaceInfo, PlaceSubtype};
use crate::registry::PlaceRegistry;
use crate::spatial::BoundingBox;

/// A cell of the neighborhood grid
///
/// Owns the households centered in the cell and, when populated, one
/// Neighborhood place that residents and visitors mix in
#[derive(Clone, Debug, Default)]
pub struct NeighborhoodPatch {
    pub row: usize,
    pub col: usize,
    /// Patch center in projected km coordinates
    pub center_x: f64,
    pub center_y: f64,
    pub households: Vec<PlaceId>,
    pub neighborhood: Option<PlaceId>,
    pub popsize: u32,
    /// Workplaces attended by residents, the candidate pool for local job assignment
    pub workplaces_attended: Vec<PlaceId>,
}

impl NeighborhoodPatch {
    /// Picks a workplace from those attended by residents of this patch
    pub fn select_workplace(&self, rng: &mut SmallRng) -> Option<PlaceId> {
        self.workplaces_attended.choose(rng).copied()
    }
}

/// The fine grid driving neighborhood choice; immutable after `prepare`
pub struct NeighborhoodGrid {
    bounds: BoundingBox,
    projection: Projection,
    patch_size_km: f64,
    min_x: f64,
    min_y: f64,
    rows: usize,
    cols: usize,
    patches: Vec<NeighborhoodPatch>,
}

impl NeighborhoodGrid {
    pub fn new(bounds: BoundingBox, projection: Projection, patch_size_km: f64) -> NeighborhoodGrid {
        let min_x = projection.x(bounds.min_lon);
        let min_y = projection.y(bounds.min_lat);
        let max_x = projection.x(bounds.max_lon);
        let max_y = projection.y(bounds.max_lat);
        let rows = ((max_y - min_y) / patch_size_km).ceil().max(1.0) as usize;
        let cols = ((max_x - min_x) / patch_size_km).ceil().max(1.0) as usize;
        let mut patches = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                patches.push(NeighborhoodPatch {
                    row,
                    col,
                    center_x: min_x + (col as f64 + 0.5) * patch_size_km,
                    center_y: min_y + (row as f64 + 0.5) * patch_size_km,
                    ..NeighborhoodPatch::default()
                });
            }
        }
        debug!(
            "Neighborhood grid: {} rows x {} cols at {} km",
            rows, cols, patch_size_km
        );
        NeighborhoodGrid {
            bounds,
            projection,
            patch_size_km,
            min_x,
            min_y,
            rows,
            cols,
            patches,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn patch_size_km(&self) -> f64 {
        self.patch_size_km
    }

    pub fn row_col_for(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        if !self.bounds.contains(lat, lon) {
            return None;
        }
        let row = ((self.projection.y(lat) - self.min_y) / self.patch_size_km) as usize;
        let col = ((self.projection.x(lon) - self.min_x) / self.patch_size_km) as usize;
        if row < self.rows && col < self.cols {
            Some((row, col))
        } else {
            None
        }
    }

    pub fn patch(&self, row: usize, col: usize) -> Option<&NeighborhoodPatch> {
        if row < self.rows && col < self.cols {
            Some(&self.patches[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn patch_mut(&mut self, row: usize, col: usize) -> Option<&mut NeighborhoodPatch> {
        if row < self.rows && col < self.cols {
            Some(&mut self.patches[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn patch_for(&self, lat: f64, lon: f64) -> Option<&NeighborhoodPatch> {
        let (row, col) = self.row_col_for(lat, lon)?;
        self.patch(row, col)
    }

    pub fn patches(&self) -> impl Iterator<Item = &NeighborhoodPatch> {
        self.patches.iter()
    }

    /// Files a household under its enclosing patch; out-of-box households
    /// are a capacity warning and stay unpatched
    pub fn add_household(&mut self, household: PlaceId, location: Point<f64>) -> Option<(usize, usize)> {
        match self.row_col_for(location.y(), location.x()) {
            Some((row, col)) => {
                self.patches[row * self.cols + col].households.push(household);
                Some((row, col))
            }
            None => {
                warn!(
                    "Household {} at ({}, {}) is outside the simulation region",
                    household,
                    location.y(),
                    location.x()
                );
                None
            }
        }
    }

    /// Creates one Neighborhood place per populated patch
    pub fn make_neighborhoods(&mut self, registry: &mut PlaceRegistry) {
        let mut created = 0_usize;
        for index in 0..self.patches.len() {
            let (popsize, row, col, center_x, center_y) = {
                let patch = &self.patches[index];
                (patch.popsize, patch.row, patch.col, patch.center_x, patch.center_y)
            };
            if popsize == 0 {
                continue;
            }
            let label = format!("N-{:04}-{:04}", row, col);
            let location = Point::new(
                self.projection.longitude(center_x),
                self.projection.latitude(center_y),
            );
            let id = registry.add(
                &label,
                PlaceSubtype::None,
                location,
                0,
                PlaceInfo::Neighborhood,
            );
            self.patches[index].neighborhood = Some(id);
            created += 1;
        }
        debug!("Created {} neighborhood places", created);
    }

    /// Tallies patch populations and the workplaces attended by residents,
    /// from the current household rosters
    pub fn record_activity_groups(
        &mut self,
        registry: &PlaceRegistry,
        workplace_of: impl Fn(crate::models::person::PersonId) -> Option<PlaceId>,
    ) {
        for patch in &mut self.patches {
            patch.popsize = 0;
            patch.workplaces_attended.clear();
            for household in &patch.households {
                let place = registry.place(*household);
                patch.popsize += place.size();
                for person in &place.enrollees {
                    if let Some(workplace) = workplace_of(*person) {
                        if !patch.workplaces_attended.contains(&workplace) {
                            patch.workplaces_attended.push(workplace);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use geo_types::Point;

    use crate::geo::Projection;
    use crate::spatial::neighborhood::NeighborhoodGrid;
    use crate::spatial::BoundingBox;

    fn test_grid() -> NeighborhoodGrid {
        let bounds = BoundingBox {
            min_lat: 40.0,
            max_lat: 40.1,
            min_lon: -80.1,
            max_lon: -80.0,
        };
        NeighborhoodGrid::new(bounds, Projection::centered_at(40.05), 1.0)
    }

    #[test]
    fn lookup_inside_and_outside_the_box() {
        let grid = test_grid();
        assert!(grid.row_col_for(40.05, -80.05).is_some());
        assert!(grid.row_col_for(41.0, -80.05).is_none());
        assert!(grid.patch_for(40.05, -80.05).is_some());
    }

    #[test]
    fn corners_map_to_corner_patches() {
        let grid = test_grid();
        let (row, col) = grid.row_col_for(40.0, -80.1).unwrap();
        assert_eq!((row, col), (0, 0));
        let (row, col) = grid.row_col_for(40.1, -80.0).unwrap();
        assert_eq!(row, grid.rows() - 1);
        assert_eq!(col, grid.cols() - 1);
    }

    #[test]
    fn out_of_box_household_is_unpatched() {
        let mut grid = test_grid();
        let placed = grid.add_household(
            crate::models::place::PlaceId(0),
            Point::new(-85.0, 40.05),
        );
        assert!(placed.is_none());
    }
}
