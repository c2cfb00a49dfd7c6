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

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::models::person::PersonId;
use crate::models::place::PlaceId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Susceptible,
    Exposed,
    Infectious,
    Recovered,
    Immune,
    Dead,
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Susceptible => write!(f, "Susceptible to Infection"),
            HealthStatus::Exposed => write!(f, "Exposed"),
            HealthStatus::Infectious => write!(f, "Infectious"),
            HealthStatus::Recovered => write!(f, "Recovered"),
            HealthStatus::Immune => write!(f, "Immune"),
            HealthStatus::Dead => write!(f, "Dead"),
        }
    }
}

/// One person's state with respect to one disease
#[derive(Clone, Debug)]
pub struct HealthState {
    pub status: HealthStatus,
    /// Simulation day of exposure, -1 when never exposed
    pub exposure_day: i32,
    /// Day infectiousness began, -1 when not yet infectious
    pub infectious_day: i32,
    /// Day symptoms began, -1 when asymptomatic so far
    pub symptoms_day: i32,
    /// Whether this infection will ever turn symptomatic
    pub will_be_symptomatic: bool,
    pub infector: Option<PersonId>,
    pub exposure_place: Option<PlaceId>,
    /// Count of infections attributed to this person as the source
    pub secondary_infections: u32,
}

impl Default for HealthState {
    fn default() -> Self {
        HealthState {
            status: HealthStatus::Susceptible,
            exposure_day: -1,
            infectious_day: -1,
            symptoms_day: -1,
            will_be_symptomatic: false,
            infector: None,
            exposure_place: None,
            secondary_infections: 0,
        }
    }
}

impl HealthState {
    pub fn is_susceptible(&self) -> bool {
        self.status == HealthStatus::Susceptible
    }

    pub fn is_infectious(&self) -> bool {
        self.status == HealthStatus::Infectious
    }

    pub fn is_symptomatic(&self) -> bool {
        self.status == HealthStatus::Infectious && self.symptoms_day >= 0
    }

    /// Whether this person has ever been exposed (the attack-rate numerator)
    pub fn ever_exposed(&self) -> bool {
        self.exposure_day >= 0
    }

    pub fn days_symptomatic(&self, day: u32) -> i32 {
        if self.symptoms_day < 0 {
            -1
        } else {
            day as i32 - self.symptoms_day
        }
    }

    /// Records a new exposure; the caller has already won the per-day latch
    pub fn become_exposed(
        &mut self,
        day: u32,
        infector: Option<PersonId>,
        place: Option<PlaceId>,
        will_be_symptomatic: bool,
    ) {
        debug_assert!(self.is_susceptible());
        self.status = HealthStatus::Exposed;
        self.exposure_day = day as i32;
        self.infector = infector;
        self.exposure_place = place;
        self.will_be_symptomatic = will_be_symptomatic;
    }
}
