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

use std::f64::consts::PI;

use log::debug;

/// All-disease seasonal modulation of the contact rate
///
/// Equals 1 at the configured peak day, falling to `1 - reduction` at the
/// trough half a year away, clipped at 0
pub struct Seasonality {
    multipliers: Option<Vec<f64>>,
}

impl Seasonality {
    pub fn new(seasonal_reduction: f64, peak_day_of_year: u32) -> Seasonality {
        if seasonal_reduction <= 0.0 {
            return Seasonality { multipliers: None };
        }
        let mut multipliers = vec![1.0; 367];
        for day in 1..=366_i64 {
            let days_from_peak = (peak_day_of_year as i64 - day).abs();
            let value = (1.0 - seasonal_reduction)
                + seasonal_reduction * 0.5 * (1.0 + (days_from_peak as f64 * 2.0 * PI / 365.0).cos());
            multipliers[day as usize] = value.max(0.0);
        }
        debug!(
            "Seasonality enabled: reduction {} peaking on day {}",
            seasonal_reduction, peak_day_of_year
        );
        Seasonality {
            multipliers: Some(multipliers),
        }
    }

    pub fn disabled() -> Seasonality {
        Seasonality { multipliers: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.multipliers.is_some()
    }

    pub fn multiplier(&self, day_of_year: u32) -> f64 {
        match &self.multipliers {
            Some(multipliers) => multipliers[day_of_year.clamp(1, 366) as usize],
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Seasonality;

    #[test]
    fn peak_day_is_one_and_trough_is_reduced() {
        let seasonality = Seasonality::new(0.3, 15);
        assert!((seasonality.multiplier(15) - 1.0).abs() < 1e-9);
        // trough is roughly half a year from the peak
        let trough = seasonality.multiplier(15 + 182);
        assert!((trough - 0.7).abs() < 1e-3, "trough was {}", trough);
        for day in 1..=366 {
            let m = seasonality.multiplier(day);
            assert!((0.0..=1.0).contains(&m));
        }
    }

    #[test]
    fn full_reduction_clips_at_zero() {
        let seasonality = Seasonality::new(1.0, 1);
        let trough = seasonality.multiplier(183);
        assert!(trough >= 0.0 && trough < 1e-3);
    }

    #[test]
    fn disabled_is_identity() {
        let seasonality = Seasonality::new(0.0, 15);
        assert!(!seasonality.is_enabled());
        assert!((seasonality.multiplier(100) - 1.0).abs() < 1e-12);
    }
}
