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

use enum_map::{Enum, EnumMap};
use strum_macros::EnumIter;

use load_population::records::Sex;

use crate::models::health::HealthState;
use crate::models::place::PlaceId;

/// Stable index of a person in the population
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonId(pub u32);

impl PersonId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "person {}", self.0)
    }
}

/// The eight favorite place slots an agent can visit on a day
#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum, EnumIter)]
pub enum ActivitySlot {
    Household,
    Neighborhood,
    School,
    Classroom,
    Workplace,
    Office,
    Hospital,
    AdHoc,
}

impl ActivitySlot {
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// One day's schedule as a bit per favorite place slot
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule(u8);

impl Schedule {
    pub fn none() -> Schedule {
        Schedule(0)
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn set(&mut self, slot: ActivitySlot, on: bool) {
        if on {
            self.0 |= slot.bit();
        } else {
            self.0 &= !slot.bit();
        }
    }

    pub fn is_on(self, slot: ActivitySlot) -> bool {
        self.0 & slot.bit() != 0
    }

    pub fn any(self) -> bool {
        self.0 != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
pub enum ActivityProfile {
    Preschool,
    Student,
    Teacher,
    Worker,
    WeekendWorker,
    Retired,
    Unemployed,
    CollegeStudent,
    Military,
    Prisoner,
    NursingHomeResident,
    Undefined,
}

impl ActivityProfile {
    /// Prisoners and nursing home residents stay indoors
    pub fn stays_indoors(self) -> bool {
        matches!(
            self,
            ActivityProfile::Prisoner | ActivityProfile::NursingHomeResident
        )
    }
}

/// Chronic conditions modifying healthcare seeking probabilities
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChronicConditions {
    pub asthma: bool,
    pub copd: bool,
    pub chronic_renal_disease: bool,
    pub diabetes: bool,
    pub heart_disease: bool,
    pub hypertension: bool,
    pub hypercholesterolemia: bool,
}

impl ChronicConditions {
    pub fn any(&self) -> bool {
        self.asthma
            || self.copd
            || self.chronic_renal_disease
            || self.diabetes
            || self.heart_disease
            || self.hypertension
            || self.hypercholesterolemia
    }
}

pub type FavoritePlaces = EnumMap<ActivitySlot, Option<PlaceId>>;

/// A single agent
///
/// All links to places are non-owning `PlaceId` indices into the registry
#[derive(Clone, Debug)]
pub struct Person {
    id: PersonId,
    pub label: String,
    pub age: u32,
    pub sex: Sex,
    pub race: u8,
    /// Relationship to the head of household (0 = head)
    pub relationship: u8,
    pub profile: ActivityProfile,
    pub favorite_places: FavoritePlaces,
    /// Favorite places saved while traveling or hospitalized
    pub saved_places: Option<FavoritePlaces>,
    /// Home neighborhood patch (row, col), fixed after setup
    pub home_patch: Option<(usize, usize)>,
    pub health: Vec<HealthState>,
    pub alive: bool,

    // daily schedule state
    pub schedule: Schedule,
    /// Last day the schedule was computed, making updates idempotent per day
    pub schedule_updated: i32,

    // sick leave state
    pub sick_leave_available: bool,
    pub sick_days_remaining: f64,
    pub sick_leave_decision_has_been_made: bool,
    pub sick_leave_decision: bool,
    pub my_sick_days_absent: u32,
    pub my_sick_days_present: u32,

    // travel and hospitalization state
    pub is_traveling: bool,
    pub is_traveling_outside: bool,
    pub return_from_travel_day: i32,
    pub is_hospitalized: bool,
    pub hospitalization_ends_day: i32,
    pub is_isolated: bool,

    pub grade: u32,
    pub works_at_hospital: bool,

    // hygiene and risk factors
    pub wears_face_mask: bool,
    pub washes_hands: bool,
    pub chronic: ChronicConditions,
    pub is_pregnant: bool,
}

impl Person {
    pub fn new(id: PersonId, label: String, age: u32, sex: Sex, race: u8, relationship: u8, diseases: usize) -> Person {
        Person {
            id,
            label,
            age,
            sex,
            race,
            relationship,
            profile: ActivityProfile::Undefined,
            favorite_places: EnumMap::default(),
            saved_places: None,
            home_patch: None,
            health: vec![HealthState::default(); diseases],
            alive: true,
            schedule: Schedule::none(),
            schedule_updated: -1,
            sick_leave_available: false,
            sick_days_remaining: 0.0,
            sick_leave_decision_has_been_made: false,
            sick_leave_decision: false,
            my_sick_days_absent: 0,
            my_sick_days_present: 0,
            is_traveling: false,
            is_traveling_outside: false,
            return_from_travel_day: -1,
            is_hospitalized: false,
            hospitalization_ends_day: -1,
            is_isolated: false,
            grade: 0,
            works_at_hospital: false,
            wears_face_mask: false,
            washes_hands: false,
            chronic: ChronicConditions::default(),
            is_pregnant: false,
        }
    }

    pub fn id(&self) -> PersonId {
        self.id
    }

    /// Only the population may renumber a person, after a swap-remove
    pub(crate) fn set_id(&mut self, id: PersonId) {
        self.id = id;
    }

    pub fn is_adult(&self) -> bool {
        self.age >= crate::config::ADULT_AGE
    }

    pub fn is_student(&self) -> bool {
        matches!(
            self.profile,
            ActivityProfile::Student | ActivityProfile::CollegeStudent
        )
    }

    pub fn is_teacher(&self) -> bool {
        self.profile == ActivityProfile::Teacher
    }

    pub fn place(&self, slot: ActivitySlot) -> Option<PlaceId> {
        self.favorite_places[slot]
    }

    pub fn household(&self) -> Option<PlaceId> {
        self.favorite_places[ActivitySlot::Household]
    }

    pub fn neighborhood(&self) -> Option<PlaceId> {
        self.favorite_places[ActivitySlot::Neighborhood]
    }

    pub fn school(&self) -> Option<PlaceId> {
        self.favorite_places[ActivitySlot::School]
    }

    pub fn workplace(&self) -> Option<PlaceId> {
        self.favorite_places[ActivitySlot::Workplace]
    }

    pub fn is_susceptible(&self, disease: usize) -> bool {
        self.health[disease].is_susceptible()
    }

    pub fn is_infectious(&self, disease: usize) -> bool {
        self.health[disease].is_infectious()
    }

    /// Symptomatic with respect to any disease
    pub fn is_symptomatic(&self) -> bool {
        self.health.iter().any(|state| state.is_symptomatic())
    }

    pub fn days_symptomatic(&self, day: u32) -> i32 {
        self.health
            .iter()
            .map(|state| state.days_symptomatic(day))
            .max()
            .unwrap_or(-1)
    }

    /// Saves the favorite place slots before travel or hospitalization
    pub fn store_favorite_places(&mut self) {
        debug_assert!(self.saved_places.is_none());
        self.saved_places = Some(self.favorite_places.clone());
    }

    /// Restores the exact tuple saved by `store_favorite_places`
    pub fn restore_favorite_places(&mut self) {
        if let Some(saved) = self.saved_places.take() {
            self.favorite_places = saved;
        }
    }

    pub fn clear_favorite_places(&mut self) {
        self.favorite_places = EnumMap::default();
    }
}

impl Display for Person {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Person {} ({}), age {}, profile {:?}",
            self.id.0, self.label, self.age, self.profile
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::{ActivitySlot, Schedule};

    #[test]
    fn schedule_bits_are_distinct() {
        let mut seen = 0_u8;
        for slot in ActivitySlot::iter() {
            assert_eq!(seen & slot.bit(), 0);
            seen |= slot.bit();
        }
        assert_eq!(seen, 0xff);
    }

    #[test]
    fn schedule_set_and_clear() {
        let mut schedule = Schedule::none();
        assert!(!schedule.any());
        schedule.set(ActivitySlot::Household, true);
        schedule.set(ActivitySlot::Hospital, true);
        assert!(schedule.is_on(ActivitySlot::Household));
        assert!(schedule.is_on(ActivitySlot::Hospital));
        assert!(!schedule.is_on(ActivitySlot::Workplace));
        schedule.set(ActivitySlot::Hospital, false);
        assert!(!schedule.is_on(ActivitySlot::Hospital));
        schedule.clear();
        assert!(!schedule.any());
    }
}
