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
use std::sync::atomic::{AtomicI32, Ordering};

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use load_population::records::Sex;

use crate::activities::{initialize_sick_leave, SickLeaveConfig};
use crate::config::{ADULT_AGE, MAX_GRADE, RETIREMENT_AGE, RETIREMENT_PROB, SCHOOL_AGE};
use crate::models::health::HealthStatus;
use crate::models::person::{ActivityProfile, ActivitySlot, Person, PersonId};
use crate::models::place::{
    ClassroomInfo, OfficeInfo, PlaceId, PlaceInfo, PlaceKind, PlaceSubtype,
};
use crate::registry::PlaceRegistry;
use crate::spatial::neighborhood::NeighborhoodGrid;
use crate::statistics::{SickLeaveCensus, Statistics};

/// Per (person, disease) first-writer-wins exposure latch
///
/// Each slot stores the last day the person was claimed for exposure, so
/// the place phase can run in parallel without double-exposing anyone
pub struct ExposureLatches {
    slots: Vec<AtomicI32>,
    n_diseases: usize,
}

impl ExposureLatches {
    pub fn new(n_people: usize, n_diseases: usize) -> ExposureLatches {
        let mut slots = Vec::with_capacity(n_people * n_diseases);
        slots.resize_with(n_people * n_diseases, || AtomicI32::new(-1));
        ExposureLatches { slots, n_diseases }
    }

    fn slot(&self, person: PersonId, disease: usize) -> &AtomicI32 {
        &self.slots[person.index() * self.n_diseases + disease]
    }

    /// Returns true exactly once per (person, disease, day)
    pub fn try_claim(&self, person: PersonId, disease: usize, day: u32) -> bool {
        self.slot(person, disease).fetch_max(day as i32, Ordering::Relaxed) < day as i32
    }

    pub fn claimed(&self, person: PersonId, disease: usize, day: u32) -> bool {
        self.slot(person, disease).load(Ordering::Relaxed) == day as i32
    }

    fn push_person(&mut self) {
        for _ in 0..self.n_diseases {
            self.slots.push(AtomicI32::new(-1));
        }
    }

    fn swap_remove_person(&mut self, person: PersonId) {
        let start = person.index() * self.n_diseases;
        for offset in (0..self.n_diseases).rev() {
            self.slots.swap_remove(start + offset);
        }
    }
}

/// Demographic events posted by the external model, drained daily
#[derive(Clone, Debug)]
pub enum DemographicEvent {
    Birth { household: PlaceId },
    Death { person: PersonId },
    Migration { person: PersonId },
}

/// Sizes for the lazily created sub-places
#[derive(Copy, Clone, Debug)]
pub struct DynamicsConfig {
    pub classroom_size: u32,
    pub office_size: u32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        DynamicsConfig {
            classroom_size: 40,
            office_size: 50,
        }
    }
}

/// Owns every person; all place-to-person links index into `people`
pub struct Population {
    pub people: Vec<Person>,
    pub latches: ExposureLatches,
    event_queue: HashMap<u32, Vec<DemographicEvent>>,
    n_diseases: usize,
}

impl Population {
    pub fn new(n_diseases: usize) -> Population {
        Population {
            people: Vec::new(),
            latches: ExposureLatches::new(0, n_diseases),
            event_queue: HashMap::new(),
            n_diseases,
        }
    }

    pub fn n_diseases(&self) -> usize {
        self.n_diseases
    }

    pub fn size(&self) -> usize {
        self.people.len()
    }

    pub fn person(&self, id: PersonId) -> &Person {
        &self.people[id.index()]
    }

    pub fn person_mut(&mut self, id: PersonId) -> &mut Person {
        &mut self.people[id.index()]
    }

    pub fn add_person(
        &mut self,
        label: String,
        age: u32,
        sex: Sex,
        race: u8,
        relationship: u8,
    ) -> PersonId {
        let id = PersonId(self.people.len() as u32);
        self.people
            .push(Person::new(id, label, age, sex, race, relationship, self.n_diseases));
        self.latches.push_person();
        id
    }

    pub fn post_event(&mut self, day: u32, event: DemographicEvent) {
        self.event_queue.entry(day).or_default().push(event);
    }

    /// Advances every person's health timelines by one day
    pub fn update_health(&mut self, diseases: &[crate::disease::Disease], day: u32) {
        use rayon::prelude::*;
        self.people.par_iter_mut().for_each(|person| {
            if !person.alive {
                return;
            }
            for disease in diseases {
                disease.update_health(&mut person.health[disease.id()], day);
            }
        });
    }

    /// Unenrolls the person everywhere, restoring any saved favorite places first
    pub fn terminate(&mut self, person_id: PersonId, registry: &mut PlaceRegistry) {
        // while away, the person is enrolled only at the host/hospital places
        let away_places: Vec<PlaceId> = {
            let person = &mut self.people[person_id.index()];
            if (person.is_traveling && !person.is_traveling_outside) || person.is_hospitalized {
                let current = person.favorite_places.values().flatten().copied().collect();
                person.restore_favorite_places();
                person.is_hospitalized = false;
                person.is_traveling = false;
                current
            } else {
                Vec::new()
            }
        };
        for place in away_places {
            registry.unenroll(place, person_id);
        }
        let (places, grade, was_student) = {
            let person = &mut self.people[person_id.index()];
            person.alive = false;
            let places: Vec<PlaceId> = person.favorite_places.values().flatten().copied().collect();
            (places, person.grade as usize, person.is_student())
        };
        for place in places {
            if was_student && registry.place(place).kind() == PlaceKind::School {
                if let Some(school) = registry.place_mut(place).school_mut() {
                    if grade < school.students_in_grade.len() && school.students_in_grade[grade] > 0
                    {
                        school.students_in_grade[grade] -= 1;
                    }
                }
            }
            registry.unenroll(place, person_id);
        }
        let person = &mut self.people[person_id.index()];
        person.clear_favorite_places();
        person.schedule.clear();
    }

    /// Terminates the person and releases their slot entirely
    ///
    /// The tail person is swap-moved into the vacated index; every place
    /// roster referencing the moved person is fixed up to the new id
    pub fn remove_person(&mut self, person_id: PersonId, registry: &mut PlaceRegistry) {
        self.terminate(person_id, registry);
        let last = self.people.len() - 1;
        let moved_from = PersonId(last as u32);
        self.people.swap_remove(person_id.index());
        self.latches.swap_remove_person(person_id);
        if person_id != moved_from {
            let places: Vec<PlaceId> = {
                let moved = &mut self.people[person_id.index()];
                moved.set_id(person_id);
                let mut places: Vec<PlaceId> =
                    moved.favorite_places.values().flatten().copied().collect();
                // while away, the enrolled places are the saved ones
                if let Some(saved) = &moved.saved_places {
                    places.extend(saved.values().flatten().copied());
                }
                places
            };
            for place in places {
                registry.replace_enrollee(place, moved_from, person_id);
            }
        }
    }

    /// Drains the day's birth, death and migration queues
    pub fn apply_demographic_events(
        &mut self,
        day: u32,
        registry: &mut PlaceRegistry,
        statistics: &Statistics,
    ) {
        let events = match self.event_queue.remove(&day) {
            Some(events) => events,
            None => return,
        };
        debug!("Applying {} demographic events on day {}", events.len(), day);
        for event in events {
            match event {
                DemographicEvent::Birth { household } => {
                    let label = format!("B{}-{}", day, self.people.len());
                    let id = self.add_person(label, 0, Sex::Female, 0, 3);
                    self.people[id.index()].profile = ActivityProfile::Preschool;
                    self.people[id.index()].favorite_places[ActivitySlot::Household] =
                        Some(household);
                    registry.enroll(household, id);
                }
                DemographicEvent::Death { person } => {
                    for health in &mut self.people[person.index()].health {
                        health.status = HealthStatus::Dead;
                    }
                    statistics
                        .tallies
                        .deaths
                        .fetch_add(1, Ordering::Relaxed);
                    self.terminate(person, registry);
                }
                DemographicEvent::Migration { person } => {
                    self.terminate(person, registry);
                }
            }
        }
    }
}

/// Grade for a student of the given age, clamped to the school's range
pub fn grade_for_age(age: u32) -> u32 {
    age.clamp(1, MAX_GRADE)
}

/// Withdraws the person from school and classroom
pub fn withdraw_from_school(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
) {
    let person = &mut people[person_id.index()];
    if let Some(school) = person.favorite_places[ActivitySlot::School] {
        let grade = person.grade as usize;
        if let Some(info) = registry.place_mut(school).school_mut() {
            if person.profile != ActivityProfile::Teacher
                && grade < info.students_in_grade.len()
                && info.students_in_grade[grade] > 0
            {
                info.students_in_grade[grade] -= 1;
            }
        }
        registry.unenroll(school, person_id);
    }
    if let Some(classroom) = person.favorite_places[ActivitySlot::Classroom] {
        registry.unenroll(classroom, person_id);
    }
    person.favorite_places[ActivitySlot::School] = None;
    person.favorite_places[ActivitySlot::Classroom] = None;
}

/// Withdraws the person from their workplace and office
pub fn withdraw_from_workplace(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
) {
    let person = &mut people[person_id.index()];
    if let Some(workplace) = person.favorite_places[ActivitySlot::Workplace] {
        registry.unenroll(workplace, person_id);
    }
    if let Some(office) = person.favorite_places[ActivitySlot::Office] {
        registry.unenroll(office, person_id);
    }
    person.favorite_places[ActivitySlot::Workplace] = None;
    person.favorite_places[ActivitySlot::Office] = None;
    person.works_at_hospital = false;
}

/// Picks a school in the household's county covering the student's grade,
/// preferring schools whose grade still has room
pub fn assign_school(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
    config: &DynamicsConfig,
    rng: &mut SmallRng,
    statistics: &Statistics,
) {
    let (grade, county) = {
        let person = &people[person_id.index()];
        let county = person
            .household()
            .map(|household| registry.place(household).county_fips)
            .unwrap_or(0);
        (grade_for_age(person.age), county)
    };
    let mut candidates: Vec<PlaceId> = Vec::new();
    let mut fallback: Vec<PlaceId> = Vec::new();
    for school_id in registry.schools() {
        let place = registry.place(*school_id);
        let info = match place.school() {
            Some(info) => info,
            None => continue,
        };
        if grade > info.max_grade {
            continue;
        }
        if !info.grade_has_room(grade) {
            continue;
        }
        if place.county_fips == county {
            candidates.push(*school_id);
        } else {
            fallback.push(*school_id);
        }
    }
    let chosen = candidates
        .choose(rng)
        .or_else(|| fallback.choose(rng))
        .copied();
    let school_id = match chosen {
        Some(school) => school,
        None => {
            warn!("No school found for {} (grade {})", person_id, grade);
            statistics.note_warning();
            return;
        }
    };
    {
        let person = &mut people[person_id.index()];
        person.grade = grade;
        person.favorite_places[ActivitySlot::School] = Some(school_id);
    }
    registry.enroll(school_id, person_id);
    if let Some(info) = registry.place_mut(school_id).school_mut() {
        info.students_in_grade[grade as usize] += 1;
    }
    assign_classroom(people, person_id, registry, config, statistics);
}

/// Places the student into a classroom of their grade, creating one when
/// every existing classroom is full
pub fn assign_classroom(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
    config: &DynamicsConfig,
    statistics: &Statistics,
) {
    if config.classroom_size == 0 {
        return;
    }
    let (school_id, grade) = {
        let person = &people[person_id.index()];
        match person.favorite_places[ActivitySlot::School] {
            Some(school) => (school, person.grade),
            None => return,
        }
    };
    let existing = registry
        .place(school_id)
        .school()
        .and_then(|info| {
            info.classrooms[grade as usize]
                .iter()
                .find(|classroom| registry.place(**classroom).size() < config.classroom_size)
                .copied()
        });
    let classroom = match existing {
        Some(classroom) => classroom,
        None => {
            let label = {
                let school = registry.place(school_id);
                let count = school
                    .school()
                    .map(|info| info.classrooms[grade as usize].len())
                    .unwrap_or(0);
                format!("{}-C{:02}-{:02}", school.label, grade, count)
            };
            let location = registry.place(school_id).location;
            let county = registry.place(school_id).county_fips;
            let classroom = registry.add(
                &label,
                PlaceSubtype::None,
                location,
                county,
                PlaceInfo::Classroom(ClassroomInfo {
                    school: school_id,
                    age_level: grade,
                }),
            );
            registry.place_mut(classroom).container = Some(school_id);
            if let Some(info) = registry.place_mut(school_id).school_mut() {
                info.classrooms[grade as usize].push(classroom);
            } else {
                statistics.note_warning();
            }
            classroom
        }
    };
    registry.enroll(classroom, person_id);
    people[person_id.index()].favorite_places[ActivitySlot::Classroom] = Some(classroom);
}

/// Finds a job at a workplace attended by the home patch's residents
pub fn assign_workplace(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
    grid: &NeighborhoodGrid,
    config: &DynamicsConfig,
    rng: &mut SmallRng,
    statistics: &Statistics,
) {
    let workplace = {
        let person = &people[person_id.index()];
        person
            .home_patch
            .and_then(|(row, col)| grid.patch(row, col))
            .and_then(|patch| patch.select_workplace(rng))
    };
    match workplace {
        Some(workplace) => {
            people[person_id.index()].favorite_places[ActivitySlot::Workplace] = Some(workplace);
            people[person_id.index()].works_at_hospital =
                registry.place(workplace).kind() == PlaceKind::Hospital;
            registry.enroll(workplace, person_id);
            assign_office(people, person_id, registry, config);
        }
        None => {
            // tolerated: the person simply has no workplace this year
            warn!("No nearby workplace for {}", person_id);
            statistics.note_warning();
        }
    }
}

/// Places the worker into an office, creating one when all are full
pub fn assign_office(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
    config: &DynamicsConfig,
) {
    if config.office_size == 0 {
        return;
    }
    let workplace_id = match people[person_id.index()].favorite_places[ActivitySlot::Workplace] {
        Some(workplace) => workplace,
        None => return,
    };
    if registry.place(workplace_id).kind() != PlaceKind::Workplace {
        return;
    }
    let existing = registry
        .place(workplace_id)
        .workplace()
        .and_then(|info| {
            info.offices
                .iter()
                .find(|office| registry.place(**office).size() < config.office_size)
                .copied()
        });
    let office = match existing {
        Some(office) => office,
        None => {
            let label = {
                let workplace = registry.place(workplace_id);
                let count = workplace
                    .workplace()
                    .map(|info| info.offices.len())
                    .unwrap_or(0);
                format!("{}-O{:03}", workplace.label, count)
            };
            let location = registry.place(workplace_id).location;
            let county = registry.place(workplace_id).county_fips;
            let office = registry.add(
                &label,
                PlaceSubtype::None,
                location,
                county,
                PlaceInfo::Office(OfficeInfo {
                    workplace: workplace_id,
                }),
            );
            registry.place_mut(office).container = Some(workplace_id);
            if let Some(info) = registry.place_mut(workplace_id).workplace_mut() {
                info.offices.push(office);
            }
            office
        }
    };
    registry.enroll(office, person_id);
    people[person_id.index()].favorite_places[ActivitySlot::Office] = Some(office);
}

/// Converts every worker of a workplace into teaching staff of the school
///
/// Used at build time to staff schools from the nearest suitably sized
/// workplace; school age workers are skipped
pub fn turn_workers_into_teachers(
    people: &mut [Person],
    workplace_id: PlaceId,
    school_id: PlaceId,
    registry: &mut PlaceRegistry,
) -> u32 {
    let workers: Vec<PersonId> = registry.place(workplace_id).enrollees.clone();
    let mut new_teachers = 0;
    for worker in workers {
        if people[worker.index()].age < ADULT_AGE {
            continue;
        }
        withdraw_from_workplace(people, worker, registry);
        let person = &mut people[worker.index()];
        person.profile = ActivityProfile::Teacher;
        person.favorite_places[ActivitySlot::School] = Some(school_id);
        registry.enroll(school_id, worker);
        new_teachers += 1;
    }
    if let Some(info) = registry.place_mut(school_id).school_mut() {
        info.staff_size += new_teachers;
    }
    debug!(
        "{} workers reassigned from {} to school {}",
        new_teachers,
        registry.place(workplace_id).label,
        registry.place(school_id).label
    );
    new_teachers
}

/// The August 1 profile re-evaluation for one person
#[allow(clippy::too_many_arguments)]
pub fn update_profile(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
    grid: &NeighborhoodGrid,
    config: &DynamicsConfig,
    sick_leave: &SickLeaveConfig,
    census: &SickLeaveCensus,
    statistics: &Statistics,
    rng: &mut SmallRng,
) {
    let age = people[person_id.index()].age;

    // group quarters residents inherit the household's profile
    if let Some(household) = people[person_id.index()].household() {
        let place = registry.place(household);
        let gq_profile = match place.subtype {
            PlaceSubtype::College => Some(ActivityProfile::CollegeStudent),
            PlaceSubtype::MilitaryBase => Some(ActivityProfile::Military),
            PlaceSubtype::Prison => Some(ActivityProfile::Prisoner),
            PlaceSubtype::NursingHome => Some(ActivityProfile::NursingHomeResident),
            _ => None,
        };
        if let Some(profile) = gq_profile {
            if people[person_id.index()].profile != profile {
                let gq_workplace = place.household().and_then(|info| info.group_quarters_workplace);
                withdraw_from_school(people, person_id, registry);
                withdraw_from_workplace(people, person_id, registry);
                people[person_id.index()].profile = profile;
                if let Some(workplace) = gq_workplace {
                    people[person_id.index()].favorite_places[ActivitySlot::Workplace] =
                        Some(workplace);
                    registry.enroll(workplace, person_id);
                }
            }
            return;
        }
    }

    // students finishing college move into the workforce
    if people[person_id.index()].profile == ActivityProfile::CollegeStudent {
        if rng.gen::<f64>() < 0.25 {
            withdraw_from_school(people, person_id, registry);
            withdraw_from_workplace(people, person_id, registry);
            become_worker(people, person_id, registry, grid, config, sick_leave, census, statistics, rng);
        }
        return;
    }

    if people[person_id.index()].profile == ActivityProfile::Preschool
        && (SCHOOL_AGE..ADULT_AGE).contains(&age)
    {
        withdraw_from_workplace(people, person_id, registry);
        people[person_id.index()].profile = ActivityProfile::Student;
        assign_school(people, person_id, registry, config, rng, statistics);
        return;
    }

    if people[person_id.index()].profile == ActivityProfile::Student {
        update_student(people, person_id, registry, grid, config, sick_leave, census, statistics, rng);
        return;
    }

    // conversion to civilian life
    if people[person_id.index()].profile == ActivityProfile::Prisoner {
        withdraw_from_school(people, person_id, registry);
        withdraw_from_workplace(people, person_id, registry);
        become_worker(people, person_id, registry, grid, config, sick_leave, census, statistics, rng);
        return;
    }

    if people[person_id.index()].profile == ActivityProfile::Worker
        && people[person_id.index()].workplace().is_none()
    {
        assign_workplace(people, person_id, registry, grid, config, rng, statistics);
        let workplace_size = workplace_size_of(people, person_id, registry);
        initialize_sick_leave(&mut people[person_id.index()], workplace_size, sick_leave, census, rng);
    }

    if people[person_id.index()].profile != ActivityProfile::Retired && age >= RETIREMENT_AGE {
        if rng.gen::<f64>() < RETIREMENT_PROB {
            if people[person_id.index()].is_teacher() {
                withdraw_from_school(people, person_id, registry);
            }
            withdraw_from_workplace(people, person_id, registry);
            people[person_id.index()].profile = ActivityProfile::Retired;
            initialize_sick_leave(&mut people[person_id.index()], 0, sick_leave, census, rng);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update_student(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
    grid: &NeighborhoodGrid,
    config: &DynamicsConfig,
    sick_leave: &SickLeaveConfig,
    census: &SickLeaveCensus,
    statistics: &Statistics,
    rng: &mut SmallRng,
) {
    let age = people[person_id.index()].age;
    let school = people[person_id.index()].school();

    match school {
        Some(school_id) => {
            let max_grade = registry
                .place(school_id)
                .school()
                .map(|info| info.max_grade)
                .unwrap_or(MAX_GRADE);
            if max_grade < age {
                withdraw_from_school(people, person_id, registry);
                if age < ADULT_AGE {
                    assign_school(people, person_id, registry, config, rng, statistics);
                } else {
                    // time to leave school and find a job
                    become_worker(
                        people, person_id, registry, grid, config, sick_leave, census, statistics, rng,
                    );
                }
                return;
            }
            let grade = grade_for_age(age);
            if people[person_id.index()].grade != grade {
                let has_room = registry
                    .place(school_id)
                    .school()
                    .map(|info| info.grade_has_room(grade))
                    .unwrap_or(false);
                withdraw_from_school(people, person_id, registry);
                if has_room {
                    // move up a grade within the same school
                    let person = &mut people[person_id.index()];
                    person.grade = grade;
                    person.favorite_places[ActivitySlot::School] = Some(school_id);
                    registry.enroll(school_id, person_id);
                    if let Some(info) = registry.place_mut(school_id).school_mut() {
                        info.students_in_grade[grade as usize] += 1;
                    }
                    assign_classroom(people, person_id, registry, config, statistics);
                } else {
                    assign_school(people, person_id, registry, config, rng, statistics);
                }
            }
        }
        None => {
            if age < ADULT_AGE {
                assign_school(people, person_id, registry, config, rng, statistics);
            } else {
                become_worker(
                    people, person_id, registry, grid, config, sick_leave, census, statistics, rng,
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn become_worker(
    people: &mut [Person],
    person_id: PersonId,
    registry: &mut PlaceRegistry,
    grid: &NeighborhoodGrid,
    config: &DynamicsConfig,
    sick_leave: &SickLeaveConfig,
    census: &SickLeaveCensus,
    statistics: &Statistics,
    rng: &mut SmallRng,
) {
    people[person_id.index()].profile = ActivityProfile::Worker;
    assign_workplace(people, person_id, registry, grid, config, rng, statistics);
    let workplace_size = workplace_size_of(people, person_id, registry);
    initialize_sick_leave(&mut people[person_id.index()], workplace_size, sick_leave, census, rng);
}

fn workplace_size_of(people: &[Person], person_id: PersonId, registry: &PlaceRegistry) -> u32 {
    let person = &people[person_id.index()];
    if let Some(workplace) = person.workplace() {
        registry.place(workplace).size()
    } else if person.is_teacher() {
        person
            .school()
            .and_then(|school| registry.place(school).school())
            .map(|info| info.staff_size)
            .unwrap_or(0)
    } else {
        0
    }
}

/// July 31: every student leaves their school for the summer rollover
pub fn end_school_year(people: &mut [Person], registry: &mut PlaceRegistry) {
    let students: Vec<PersonId> = people
        .iter()
        .filter(|person| person.alive && person.profile == ActivityProfile::Student)
        .map(Person::id)
        .collect();
    info!("School year end: withdrawing {} students", students.len());
    for student in students {
        withdraw_from_school(people, student, registry);
    }
}

/// August 1: everyone ages one year and profiles are re-evaluated
#[allow(clippy::too_many_arguments)]
pub fn start_school_year(
    population: &mut Population,
    registry: &mut PlaceRegistry,
    grid: &NeighborhoodGrid,
    config: &DynamicsConfig,
    sick_leave: &SickLeaveConfig,
    census: &SickLeaveCensus,
    statistics: &Statistics,
    seed: u64,
    day: u32,
) {
    info!("School year start: re-evaluating profiles");
    let ids: Vec<PersonId> = population
        .people
        .iter()
        .filter(|person| person.alive)
        .map(Person::id)
        .collect();
    for person_id in ids {
        population.people[person_id.index()].age += 1;
        let mut rng = crate::random::substream(
            seed,
            crate::random::STREAM_DYNAMICS,
            person_id.0 as u64,
            day as u64,
        );
        update_profile(
            &mut population.people,
            person_id,
            registry,
            grid,
            config,
            sick_leave,
            census,
            statistics,
            &mut rng,
        );
    }
}

#[cfg(test)]
mod tests {
    use geo_types::Point;

    use load_population::records::Sex;

    use crate::models::person::{ActivitySlot, PersonId};
    use crate::models::place::{HouseholdInfo, PlaceId, PlaceInfo, PlaceSubtype};
    use crate::registry::PlaceRegistry;

    use super::{grade_for_age, ExposureLatches, Population};

    fn setup(members: u32) -> (Population, PlaceRegistry, PlaceId) {
        let mut registry = PlaceRegistry::new(1);
        let home = registry.add(
            "H1",
            PlaceSubtype::None,
            Point::new(-79.99, 40.44),
            42003,
            PlaceInfo::Household(HouseholdInfo::default()),
        );
        let mut population = Population::new(1);
        for index in 0..members {
            let id = population.add_person(format!("P{}", index), 30, Sex::Male, 1, 0);
            population.people[id.index()].favorite_places[ActivitySlot::Household] = Some(home);
            registry.enroll(home, id);
        }
        (population, registry, home)
    }

    #[test]
    fn grades_are_clamped_to_the_school_range() {
        assert_eq!(grade_for_age(0), 1);
        assert_eq!(grade_for_age(5), 5);
        assert_eq!(grade_for_age(17), 17);
        assert_eq!(grade_for_age(30), 17);
    }

    #[test]
    fn latch_claims_exactly_once_per_day() {
        let latches = ExposureLatches::new(2, 1);
        assert!(latches.try_claim(PersonId(0), 0, 3));
        assert!(!latches.try_claim(PersonId(0), 0, 3));
        assert!(latches.claimed(PersonId(0), 0, 3));
        assert!(!latches.claimed(PersonId(1), 0, 3));
        // the next day is claimable again
        assert!(latches.try_claim(PersonId(0), 0, 4));
    }

    #[test]
    fn terminate_unenrolls_everywhere() {
        let (mut population, mut registry, home) = setup(3);
        population.terminate(PersonId(1), &mut registry);
        assert!(!population.people[1].alive);
        assert_eq!(registry.place(home).size(), 2);
        assert!(!registry.place(home).enrollees.contains(&PersonId(1)));
        assert!(population.people[1].favorite_places.values().all(Option::is_none));
    }

    #[test]
    fn swap_remove_fixes_roster_ids() {
        let (mut population, mut registry, home) = setup(3);
        population.remove_person(PersonId(0), &mut registry);
        assert_eq!(population.size(), 2);
        // the tail person was renumbered into the vacated slot
        assert_eq!(population.people[0].label, "P2");
        assert_eq!(population.people[0].id(), PersonId(0));
        let roster = &registry.place(home).enrollees;
        assert_eq!(roster.len(), 2);
        assert!(roster.contains(&PersonId(0)));
        assert!(roster.contains(&PersonId(1)));
    }
}
