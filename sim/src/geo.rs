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

/// Kilometres per degree of latitude, assuming a spherical earth
pub const KM_PER_DEG_LAT: f64 = 111.325;

/// Flat projection of geographic coordinates onto a km grid
///
/// The km-per-degree-longitude scale is fixed at the mean latitude of the
/// population, which is accurate enough at simulation scale (tens of km)
#[derive(Copy, Clone, Debug)]
pub struct Projection {
    km_per_deg_longitude: f64,
}

impl Projection {
    pub fn centered_at(mean_latitude: f64) -> Projection {
        Projection {
            km_per_deg_longitude: KM_PER_DEG_LAT * mean_latitude.to_radians().cos(),
        }
    }

    pub fn x(&self, longitude: f64) -> f64 {
        (longitude + 180.0) * self.km_per_deg_longitude
    }

    pub fn y(&self, latitude: f64) -> f64 {
        (latitude + 90.0) * KM_PER_DEG_LAT
    }

    pub fn longitude(&self, x: f64) -> f64 {
        x / self.km_per_deg_longitude - 180.0
    }

    pub fn latitude(&self, y: f64) -> f64 {
        y / KM_PER_DEG_LAT - 90.0
    }

    /// Euclidean distance in km between two lat/lon points under this projection
    pub fn distance_km(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        let dx = self.x(a.x()) - self.x(b.x());
        let dy = self.y(a.y()) - self.y(b.y());
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use geo_types::Point;

    use super::{Projection, KM_PER_DEG_LAT};

    #[test]
    fn one_degree_of_latitude() {
        let projection = Projection::centered_at(40.0);
        let a = Point::new(-80.0, 40.0);
        let b = Point::new(-80.0, 41.0);
        assert!((projection.distance_km(a, b) - KM_PER_DEG_LAT).abs() < 1e-9);
    }

    #[test]
    fn projection_round_trips() {
        let projection = Projection::centered_at(40.44);
        let lon = -79.99;
        let lat = 40.44;
        assert!((projection.longitude(projection.x(lon)) - lon).abs() < 1e-9);
        assert!((projection.latitude(projection.y(lat)) - lat).abs() < 1e-9);
    }
}
