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
use log::debug;

use crate::geo::Projection;
use crate::models::place::{PlaceId, PlaceKind};
use crate::registry::PlaceRegistry;
use crate::spatial::BoundingBox;

/// A coarse cell indexing workplaces and hospitals for proximity queries
#[derive(Clone, Debug, Default)]
pub struct RegionalPatch {
    pub row: usize,
    pub col: usize,
    pub workplaces: Vec<PlaceId>,
    pub hospitals: Vec<PlaceId>,
    pub popsize: u32,
}

/// The coarse grid; shares the population bounding box with the
/// neighborhood grid and is immutable after `prepare`
pub struct RegionalGrid {
    bounds: BoundingBox,
    projection: Projection,
    patch_size_km: f64,
    min_x: f64,
    min_y: f64,
    rows: usize,
    cols: usize,
    patches: Vec<RegionalPatch>,
}

impl RegionalGrid {
    pub fn new(bounds: BoundingBox, projection: Projection, patch_size_km: f64) -> RegionalGrid {
        let min_x = projection.x(bounds.min_lon);
        let min_y = projection.y(bounds.min_lat);
        let max_x = projection.x(bounds.max_lon);
        let max_y = projection.y(bounds.max_lat);
        let rows = ((max_y - min_y) / patch_size_km).ceil().max(1.0) as usize;
        let cols = ((max_x - min_x) / patch_size_km).ceil().max(1.0) as usize;
        let mut patches = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                patches.push(RegionalPatch {
                    row,
                    col,
                    ..RegionalPatch::default()
                });
            }
        }
        debug!("Regional grid: {} rows x {} cols at {} km", rows, cols, patch_size_km);
        RegionalGrid {
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

    pub fn patch_for(&self, lat: f64, lon: f64) -> Option<&RegionalPatch> {
        let (row, col) = self.row_col_for(lat, lon)?;
        Some(&self.patches[row * self.cols + col])
    }

    pub fn add_workplace(&mut self, workplace: PlaceId, location: Point<f64>) {
        if let Some((row, col)) = self.row_col_for(location.y(), location.x()) {
            self.patches[row * self.cols + col].workplaces.push(workplace);
        }
    }

    pub fn add_hospital(&mut self, hospital: PlaceId, location: Point<f64>) {
        if let Some((row, col)) = self.row_col_for(location.y(), location.x()) {
            self.patches[row * self.cols + col].hospitals.push(hospital);
        }
    }

    pub fn add_person_at(&mut self, lat: f64, lon: f64) {
        if let Some((row, col)) = self.row_col_for(lat, lon) {
            self.patches[row * self.cols + col].popsize += 1;
        }
    }

    /// Candidate places of the given kind in the patch containing the
    /// center plus its eight neighbours
    fn candidates_near(&self, lat: f64, lon: f64, kind: PlaceKind) -> Vec<PlaceId> {
        let mut results = Vec::new();
        let (row, col) = match self.row_col_for(lat, lon) {
            Some(cell) => cell,
            None => return results,
        };
        for dr in -1_i64..=1 {
            for dc in -1_i64..=1 {
                let r = row as i64 + dr;
                let c = col as i64 + dc;
                if r < 0 || c < 0 || r as usize >= self.rows || c as usize >= self.cols {
                    continue;
                }
                let patch = &self.patches[r as usize * self.cols + c as usize];
                match kind {
                    PlaceKind::Workplace => results.extend_from_slice(&patch.workplaces),
                    PlaceKind::Hospital => results.extend_from_slice(&patch.hospitals),
                    _ => {}
                }
            }
        }
        results
    }

    /// Finds the workplace whose headcount is closest to the staff target
    /// among candidates in the same or adjacent patches
    pub fn nearby_workplace(
        &self,
        registry: &PlaceRegistry,
        location: Point<f64>,
        staff_target: u32,
    ) -> Option<PlaceId> {
        self.candidates_near(location.y(), location.x(), PlaceKind::Workplace)
            .into_iter()
            .min_by_key(|id| {
                let size = registry.place(*id).size();
                (size as i64 - staff_target as i64).abs()
            })
    }

    /// All places of `kind` within `radius_km` of the center, nearest first
    pub fn nearby_places(
        &self,
        registry: &PlaceRegistry,
        center: Point<f64>,
        radius_km: f64,
        kind: PlaceKind,
    ) -> Vec<PlaceId> {
        let reach = (radius_km / self.patch_size_km).ceil() as i64 + 1;
        let (row, col) = match self.row_col_for(center.y(), center.x()) {
            Some(cell) => cell,
            None => return Vec::new(),
        };
        let mut found: Vec<(PlaceId, f64)> = Vec::new();
        for dr in -reach..=reach {
            for dc in -reach..=reach {
                let r = row as i64 + dr;
                let c = col as i64 + dc;
                if r < 0 || c < 0 || r as usize >= self.rows || c as usize >= self.cols {
                    continue;
                }
                let patch = &self.patches[r as usize * self.cols + c as usize];
                let ids = match kind {
                    PlaceKind::Workplace => &patch.workplaces,
                    PlaceKind::Hospital => &patch.hospitals,
                    _ => continue,
                };
                for id in ids {
                    let distance = self.projection.distance_km(center, registry.place(*id).location);
                    if distance <= radius_km {
                        found.push((*id, distance));
                    }
                }
            }
        }
        found.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        found.into_iter().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use geo_types::Point;

    use crate::geo::Projection;
    use crate::models::place::{HospitalInfo, PlaceInfo, PlaceKind, PlaceSubtype, WorkplaceInfo};
    use crate::registry::PlaceRegistry;
    use crate::spatial::regional::RegionalGrid;
    use crate::spatial::BoundingBox;

    fn setup() -> (RegionalGrid, PlaceRegistry) {
        let bounds = BoundingBox {
            min_lat: 40.0,
            max_lat: 40.5,
            min_lon: -80.5,
            max_lon: -80.0,
        };
        let grid = RegionalGrid::new(bounds, Projection::centered_at(40.25), 20.0);
        (grid, PlaceRegistry::new(1))
    }

    #[test]
    fn nearby_workplace_prefers_closest_headcount() {
        let (mut grid, mut registry) = setup();
        let location = Point::new(-80.25, 40.25);
        let small = registry.add(
            "W-small",
            PlaceSubtype::None,
            location,
            0,
            PlaceInfo::Workplace(WorkplaceInfo::default()),
        );
        let big = registry.add(
            "W-big",
            PlaceSubtype::None,
            location,
            0,
            PlaceInfo::Workplace(WorkplaceInfo::default()),
        );
        for i in 0..3 {
            registry.enroll(small, crate::models::person::PersonId(i));
        }
        for i in 10..60 {
            registry.enroll(big, crate::models::person::PersonId(i));
        }
        grid.add_workplace(small, location);
        grid.add_workplace(big, location);
        assert_eq!(grid.nearby_workplace(&registry, location, 45), Some(big));
        assert_eq!(grid.nearby_workplace(&registry, location, 4), Some(small));
    }

    #[test]
    fn nearby_places_respects_the_radius() {
        let (mut grid, mut registry) = setup();
        let center = Point::new(-80.25, 40.25);
        let near = registry.add(
            "HOSP-near",
            PlaceSubtype::None,
            Point::new(-80.25, 40.26),
            0,
            PlaceInfo::Hospital(HospitalInfo::default()),
        );
        let far = registry.add(
            "HOSP-far",
            PlaceSubtype::None,
            Point::new(-80.02, 40.48),
            0,
            PlaceInfo::Hospital(HospitalInfo::default()),
        );
        grid.add_hospital(near, registry.place(near).location);
        grid.add_hospital(far, registry.place(far).location);
        let within = grid.nearby_places(&registry, center, 5.0, PlaceKind::Hospital);
        assert_eq!(within, vec![near]);
        let all = grid.nearby_places(&registry, center, 100.0, PlaceKind::Hospital);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], near, "results should be nearest first");
    }
}
