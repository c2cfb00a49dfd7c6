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

pub mod gravity;
pub mod neighborhood;
pub mod regional;

use geo_types::Point;

/// Geographic bounding box of the loaded population
#[derive(Copy, Clone, Debug)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Computes the box enclosing every given point, padded slightly so
    /// border locations still fall inside a patch
    pub fn enclosing<'a>(points: impl Iterator<Item = &'a Point<f64>>) -> Option<BoundingBox> {
        let mut bounds: Option<BoundingBox> = None;
        for point in points {
            let (lon, lat) = (point.x(), point.y());
            bounds = Some(match bounds {
                None => BoundingBox {
                    min_lat: lat,
                    max_lat: lat,
                    min_lon: lon,
                    max_lon: lon,
                },
                Some(b) => BoundingBox {
                    min_lat: b.min_lat.min(lat),
                    max_lat: b.max_lat.max(lat),
                    min_lon: b.min_lon.min(lon),
                    max_lon: b.max_lon.max(lon),
                },
            });
        }
        bounds.map(|b| BoundingBox {
            min_lat: b.min_lat - 0.001,
            max_lat: b.max_lat + 0.001,
            min_lon: b.min_lon - 0.001,
            max_lon: b.max_lon + 0.001,
        })
    }

    pub fn mean_latitude(&self) -> f64 {
        (self.min_lat + self.max_lat) / 2.0
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use geo_types::Point;

    use super::BoundingBox;

    #[test]
    fn enclosing_covers_all_points() {
        let points = vec![Point::new(-80.1, 40.3), Point::new(-79.8, 40.6)];
        let bounds = BoundingBox::enclosing(points.iter()).unwrap();
        assert!(bounds.contains(40.3, -80.1));
        assert!(bounds.contains(40.6, -79.8));
        assert!(!bounds.contains(41.0, -80.0));
        assert!(BoundingBox::enclosing([].iter()).is_none());
    }
}
