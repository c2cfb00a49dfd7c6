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

use std::collections::HashMap;

use dashmap::DashSet;
use geo_types::Point;
use log::debug;

use crate::models::person::PersonId;
use crate::models::place::{Place, PlaceId, PlaceInfo, PlaceKind, PlaceSubtype};
use crate::transmission::vector::VectorState;

/// How a visitor shows up in a place's per-day lists
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VisitorRole {
    Susceptible,
    Infectious,
    /// Neither susceptible nor infectious; only tracked for the vector model
    Other,
}

/// Per (place, disease) transient visitor lists, cleared at end of day
#[derive(Clone, Debug, Default)]
pub struct DayState {
    pub susceptibles: Vec<PersonId>,
    pub infectious: Vec<PersonId>,
    pub other_visitors: u32,
}

impl DayState {
    pub fn is_empty(&self) -> bool {
        self.susceptibles.is_empty() && self.infectious.is_empty() && self.other_visitors == 0
    }

    pub fn visitors_today(&self) -> Vec<PersonId> {
        let mut merged = Vec::with_capacity(self.susceptibles.len() + self.infectious.len());
        merged.extend_from_slice(&self.susceptibles);
        merged.extend_from_slice(&self.infectious);
        merged
    }
}

/// One infectious place's work item for the transmission sweep
pub struct PlaceWork {
    pub place: PlaceId,
    /// Visitor state per registered disease, taken out of the registry
    pub diseases: Vec<(usize, DayState)>,
    pub vector: Option<VectorState>,
}

/// Owns every place, partitioned by kind, with label lookup tables
///
/// During the agent phase the registry is only read; per-day visitor lists
/// are filled from per-thread buffers between the phases, and infectious
/// place registration goes through a concurrent set so it can happen from
/// any thread without locks on the places themselves
pub struct PlaceRegistry {
    pub places: Vec<Place>,
    households: Vec<PlaceId>,
    neighborhoods: Vec<PlaceId>,
    schools: Vec<PlaceId>,
    workplaces: Vec<PlaceId>,
    hospitals: Vec<PlaceId>,
    household_labels: HashMap<String, PlaceId>,
    school_labels: HashMap<String, PlaceId>,
    workplace_labels: HashMap<String, PlaceId>,
    hospital_labels: HashMap<String, PlaceId>,
    census_tracts: Vec<String>,
    census_tract_lookup: HashMap<String, usize>,
    /// [place * n_diseases + disease]
    day_states: Vec<DayState>,
    vector_states: Vec<Option<VectorState>>,
    infectious_today: DashSet<(u32, u8)>,
    n_diseases: usize,
    prepared: bool,
}

impl PlaceRegistry {
    pub fn new(n_diseases: usize) -> PlaceRegistry {
        PlaceRegistry {
            places: Vec::new(),
            households: Vec::new(),
            neighborhoods: Vec::new(),
            schools: Vec::new(),
            workplaces: Vec::new(),
            hospitals: Vec::new(),
            household_labels: HashMap::new(),
            school_labels: HashMap::new(),
            workplace_labels: HashMap::new(),
            hospital_labels: HashMap::new(),
            census_tracts: Vec::new(),
            census_tract_lookup: HashMap::new(),
            day_states: Vec::new(),
            vector_states: Vec::new(),
            infectious_today: DashSet::new(),
            n_diseases,
            prepared: false,
        }
    }

    pub fn n_diseases(&self) -> usize {
        self.n_diseases
    }

    /// Adds a place, deduplicating by label within the household, school and
    /// workplace tables
    pub fn add(
        &mut self,
        label: &str,
        subtype: PlaceSubtype,
        location: Point<f64>,
        county_fips: u32,
        info: PlaceInfo,
    ) -> PlaceId {
        let kind = info.kind();
        let table = match kind {
            PlaceKind::Household => Some(&self.household_labels),
            PlaceKind::School => Some(&self.school_labels),
            PlaceKind::Workplace => Some(&self.workplace_labels),
            PlaceKind::Hospital => Some(&self.hospital_labels),
            _ => None,
        };
        if let Some(existing) = table.and_then(|t| t.get(label)) {
            return *existing;
        }
        let id = PlaceId(self.places.len() as u32);
        let mut place = Place::new(id, label.to_string(), subtype, location, county_fips, info);
        // places created mid-run (new classrooms and offices) still need
        // their per-day state slots
        if self.prepared {
            place.total_infections = vec![0; self.n_diseases];
            for _ in 0..self.n_diseases {
                self.day_states.push(DayState::default());
            }
            if !self.vector_states.is_empty() {
                self.vector_states.push(None);
            }
        }
        self.places.push(place);
        match kind {
            PlaceKind::Household => {
                self.households.push(id);
                self.household_labels.insert(label.to_string(), id);
            }
            PlaceKind::Neighborhood => self.neighborhoods.push(id),
            PlaceKind::School => {
                self.schools.push(id);
                self.school_labels.insert(label.to_string(), id);
            }
            PlaceKind::Workplace => {
                self.workplaces.push(id);
                self.workplace_labels.insert(label.to_string(), id);
            }
            PlaceKind::Hospital => {
                self.hospitals.push(id);
                self.hospital_labels.insert(label.to_string(), id);
            }
            PlaceKind::Classroom | PlaceKind::Office => {}
        }
        id
    }

    pub fn lookup_household(&self, label: &str) -> Option<PlaceId> {
        self.household_labels.get(label).copied()
    }

    pub fn lookup_school(&self, label: &str) -> Option<PlaceId> {
        self.school_labels.get(label).copied()
    }

    pub fn lookup_workplace(&self, label: &str) -> Option<PlaceId> {
        self.workplace_labels.get(label).copied()
    }

    pub fn lookup_hospital(&self, label: &str) -> Option<PlaceId> {
        self.hospital_labels.get(label).copied()
    }

    pub fn households(&self) -> &[PlaceId] {
        &self.households
    }

    pub fn neighborhoods(&self) -> &[PlaceId] {
        &self.neighborhoods
    }

    pub fn schools(&self) -> &[PlaceId] {
        &self.schools
    }

    pub fn workplaces(&self) -> &[PlaceId] {
        &self.workplaces
    }

    pub fn hospitals(&self) -> &[PlaceId] {
        &self.hospitals
    }

    pub fn place(&self, id: PlaceId) -> &Place {
        &self.places[id.index()]
    }

    pub fn place_mut(&mut self, id: PlaceId) -> &mut Place {
        &mut self.places[id.index()]
    }

    /// Interns a census tract code
    pub fn census_tract_index(&mut self, tract: &str) -> usize {
        if let Some(index) = self.census_tract_lookup.get(tract) {
            return *index;
        }
        let index = self.census_tracts.len();
        self.census_tracts.push(tract.to_string());
        self.census_tract_lookup.insert(tract.to_string(), index);
        index
    }

    pub fn census_tracts(&self) -> &[String] {
        &self.census_tracts
    }

    /// Enrolls a person; a no-op if already enrolled
    pub fn enroll(&mut self, place: PlaceId, person: PersonId) {
        let place = &mut self.places[place.index()];
        if !place.enrollees.contains(&person) {
            place.enrollees.push(person);
        }
    }

    /// Renumbers a roster entry after a population swap-remove
    pub fn replace_enrollee(&mut self, place: PlaceId, old: PersonId, new: PersonId) {
        let place = &mut self.places[place.index()];
        if let Some(entry) = place.enrollees.iter_mut().find(|entry| **entry == old) {
            *entry = new;
        }
    }

    /// Removes at most one occurrence of the person from the place
    pub fn unenroll(&mut self, place: PlaceId, person: PersonId) {
        let place = &mut self.places[place.index()];
        if let Some(position) = place.enrollees.iter().position(|p| *p == person) {
            place.enrollees.swap_remove(position);
        } else {
            debug!("Unenroll of {} from {} found nothing", person, place.label);
        }
    }

    /// Resolves openness through the container chain (a classroom is open
    /// iff its school is)
    pub fn is_open(&self, place: PlaceId, day: u32) -> bool {
        match self.place(place).container {
            Some(container) => self.is_open(container, day),
            None => self.place(place).is_open(day),
        }
    }

    /// Policy hook: whether the place admits visitors for this disease today
    pub fn should_be_open(&self, place: PlaceId, day: u32, _disease: usize) -> bool {
        self.is_open(place, day)
    }

    /// Sizes the per-day state tables; must be called once all places exist
    pub fn prepare(&mut self) {
        for place in &mut self.places {
            place.orig_size = place.enrollees.len() as u32;
            place.total_infections = vec![0; self.n_diseases];
        }
        self.day_states = vec![DayState::default(); self.places.len() * self.n_diseases];
        self.prepared = true;
        debug!(
            "Prepared registry day states for {} places and {} diseases",
            self.places.len(),
            self.n_diseases
        );
    }

    /// Installs the mosquito compartments, one per non-neighborhood place
    pub fn install_vector_states(&mut self, states: Vec<Option<VectorState>>) {
        assert_eq!(states.len(), self.places.len());
        self.vector_states = states;
    }

    pub fn vector_state(&self, place: PlaceId) -> Option<&VectorState> {
        self.vector_states.get(place.index()).and_then(Option::as_ref)
    }

    pub fn vector_state_mut(&mut self, place: PlaceId) -> Option<&mut VectorState> {
        self.vector_states
            .get_mut(place.index())
            .and_then(Option::as_mut)
    }

    pub fn vector_places(&self) -> impl Iterator<Item = PlaceId> + '_ {
        self.vector_states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_some())
            .map(|(index, _)| PlaceId(index as u32))
    }

    fn state_index(&self, place: PlaceId, disease: usize) -> usize {
        place.index() * self.n_diseases + disease
    }

    pub fn day_state(&self, place: PlaceId, disease: usize) -> &DayState {
        &self.day_states[self.state_index(place, disease)]
    }

    /// Appends a visitor to the place's per-day lists for one disease
    pub fn push_visitor(
        &mut self,
        place: PlaceId,
        disease: usize,
        role: VisitorRole,
        person: PersonId,
    ) {
        let index = self.state_index(place, disease);
        let state = &mut self.day_states[index];
        match role {
            VisitorRole::Susceptible => state.susceptibles.push(person),
            VisitorRole::Infectious => state.infectious.push(person),
            VisitorRole::Other => state.other_visitors += 1,
        }
    }

    /// Idempotent registration; callable concurrently from the agent phase.
    /// Places with no enrolled members are never registered.
    pub fn register_infectious_place(&self, place: PlaceId, disease: usize) {
        if self.place(place).size() == 0 {
            return;
        }
        self.infectious_today.insert((place.0, disease as u8));
    }

    pub fn is_registered_infectious(&self, place: PlaceId, disease: usize) -> bool {
        self.infectious_today.contains(&(place.0, disease as u8))
    }

    /// Drains today's registrations into per-place work items
    ///
    /// Work items and their visitor lists are sorted so the sweep is
    /// deterministic whatever order threads filled the buffers in
    pub fn take_day_work(&mut self) -> Vec<PlaceWork> {
        let mut registered: Vec<(u32, u8)> = self.infectious_today.iter().map(|e| *e).collect();
        self.infectious_today.clear();
        registered.sort_unstable();

        let mut work: Vec<PlaceWork> = Vec::new();
        for (place_raw, disease) in registered {
            let place = PlaceId(place_raw);
            let index = self.state_index(place, disease as usize);
            let mut state = std::mem::take(&mut self.day_states[index]);
            state.susceptibles.sort_unstable();
            state.infectious.sort_unstable();
            match work.last_mut() {
                Some(entry) if entry.place == place => {
                    entry.diseases.push((disease as usize, state));
                }
                _ => {
                    let vector = self
                        .vector_states
                        .get_mut(place.index())
                        .and_then(Option::take);
                    work.push(PlaceWork {
                        place,
                        diseases: vec![(disease as usize, state)],
                        vector,
                    });
                }
            }
        }
        work
    }

    /// Returns taken vector states after the sweep
    pub fn restore_vector_states(&mut self, work: &mut Vec<PlaceWork>) {
        for item in work {
            if let Some(vector) = item.vector.take() {
                self.vector_states[item.place.index()] = Some(vector);
            }
        }
    }

    /// Clears any per-day state left over outside the registered set
    pub fn reset_day(&mut self) {
        for state in &mut self.day_states {
            if !state.is_empty() {
                *state = DayState::default();
            }
        }
        self.infectious_today.clear();
    }
}

#[cfg(test)]
mod tests {
    use geo_types::Point;

    use crate::models::person::PersonId;
    use crate::models::place::{HouseholdInfo, PlaceInfo, PlaceSubtype};
    use crate::registry::{PlaceRegistry, VisitorRole};

    fn registry_with_household() -> (PlaceRegistry, crate::models::place::PlaceId) {
        let mut registry = PlaceRegistry::new(1);
        let home = registry.add(
            "H1",
            PlaceSubtype::None,
            Point::new(-79.9, 40.4),
            42003,
            PlaceInfo::Household(HouseholdInfo::default()),
        );
        (registry, home)
    }

    #[test]
    fn add_deduplicates_by_label() {
        let (mut registry, home) = registry_with_household();
        let duplicate = registry.add(
            "H1",
            PlaceSubtype::None,
            Point::new(0.0, 0.0),
            42003,
            PlaceInfo::Household(HouseholdInfo::default()),
        );
        assert_eq!(home, duplicate);
        assert_eq!(registry.households().len(), 1);
    }

    #[test]
    fn enroll_is_idempotent_and_unenroll_removes_one() {
        let (mut registry, home) = registry_with_household();
        let person = PersonId(0);
        registry.enroll(home, person);
        registry.enroll(home, person);
        assert_eq!(registry.place(home).size(), 1);
        registry.unenroll(home, person);
        assert_eq!(registry.place(home).size(), 0);
        // removing again is a no-op
        registry.unenroll(home, person);
        assert_eq!(registry.place(home).size(), 0);
    }

    #[test]
    fn infectious_registration_is_idempotent() {
        let (mut registry, home) = registry_with_household();
        registry.enroll(home, PersonId(0));
        registry.prepare();
        registry.register_infectious_place(home, 0);
        registry.register_infectious_place(home, 0);
        registry.push_visitor(home, 0, VisitorRole::Infectious, PersonId(0));
        let work = registry.take_day_work();
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].diseases.len(), 1);
        assert_eq!(work[0].diseases[0].1.infectious.len(), 1);
    }

    #[test]
    fn empty_place_is_never_registered() {
        let (mut registry, home) = registry_with_household();
        registry.prepare();
        registry.register_infectious_place(home, 0);
        assert!(registry.take_day_work().is_empty());
    }

    #[test]
    fn visitors_today_merges_both_lists() {
        let (mut registry, home) = registry_with_household();
        registry.enroll(home, PersonId(0));
        registry.enroll(home, PersonId(1));
        registry.prepare();
        registry.push_visitor(home, 0, VisitorRole::Susceptible, PersonId(0));
        registry.push_visitor(home, 0, VisitorRole::Infectious, PersonId(1));
        assert_eq!(registry.day_state(home, 0).visitors_today().len(), 2);
    }
}
