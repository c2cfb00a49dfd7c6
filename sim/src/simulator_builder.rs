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

use anyhow::{Context, Result};
use geo_types::Point;
use log::{debug, info, warn};
use num_format::ToFormattedString;
use rand::seq::SliceRandom;
use rand::Rng;

use load_population::records::GroupQuartersType;
use load_population::SyntheticPopulation;

use crate::activities::{initialize_sick_leave, ActivityConfig, ActivityEngine};
use crate::calendar::{Calendar, Date};
use crate::config::{
    ADULT_AGE, NUMBER_FORMATTING, RETIREMENT_AGE, SCHOOL_AGE, WEEKEND_WORKER_FRACTION,
};
use crate::disease::Disease;
use crate::geo::Projection;
use crate::models::health::HealthState;
use crate::models::person::{ActivityProfile, ActivitySlot, Person, PersonId};
use crate::models::place::{
    HospitalInfo, HouseholdInfo, PlaceInfo, PlaceKind, PlaceSubtype, SchoolInfo, WorkplaceInfo,
};
use crate::population::{self, DynamicsConfig, Population};
use crate::random::{substream, STREAM_BUILD};
use crate::registry::PlaceRegistry;
use crate::seasonality::Seasonality;
use crate::simulator::{Simulator, Timer};
use crate::spatial::gravity::{GravityConfig, GravityModel};
use crate::spatial::neighborhood::NeighborhoodGrid;
use crate::spatial::regional::RegionalGrid;
use crate::spatial::BoundingBox;
use crate::statistics::Statistics;
use crate::transmission::vector::{VectorConfig, VectorState};
use crate::transmission::{TransmissionConfig, TransmissionEngine};
use crate::travel::{TravelConfig, TravelModel};
use crate::params::Params;
use crate::SimError;

/// Builds a runnable `Simulator` from the loaded population tables and the
/// parameter table, phase by phase
pub struct SimulatorBuilder {
    data: SyntheticPopulation,
    params: Params,
}

impl SimulatorBuilder {
    pub fn new(data: SyntheticPopulation, params: Params) -> SimulatorBuilder {
        SimulatorBuilder { data, params }
    }

    pub fn build(self) -> Result<Simulator> {
        let mut timer = Timer::default();
        let params = &self.params;

        let n_diseases: usize = params.get_or("diseases", 1)?;
        let seed: u64 = params.get_or("seed", 123_456)?;
        let total_days: u32 = params.get("days").context("Total days must be configured")?;
        let start_date = Date::parse(&params.get_or("start_date", String::from("2020-01-01"))?)?;

        let mut diseases = Vec::with_capacity(n_diseases);
        for d in 0..n_diseases {
            diseases.push(Disease::from_params(d, params)?);
        }

        let mut registry = PlaceRegistry::new(n_diseases);
        let mut population = Population::new(n_diseases);

        self.create_places(&mut registry)?;
        timer.code_block_finished(&format!("Created {} places", registry.places.len()));

        self.create_people(&mut registry, &mut population)?;
        timer.code_block_finished(&format!(
            "Created {} people",
            population.size().to_formatted_string(&NUMBER_FORMATTING)
        ));

        // grids share the bounding box of the household locations
        let household_locations: Vec<Point<f64>> = registry
            .households()
            .iter()
            .map(|id| registry.place(*id).location)
            .collect();
        let bounds = BoundingBox::enclosing(household_locations.iter()).ok_or(
            SimError::InitializationError {
                message: String::from("Population bounding box"),
            },
        )?;
        let projection = Projection::centered_at(bounds.mean_latitude());
        let mut neighborhood_grid = NeighborhoodGrid::new(
            bounds,
            projection,
            params.get_or("neighborhood_patch_size", 1.0)?,
        );
        let mut regional_grid =
            RegionalGrid::new(bounds, projection, params.get_or("regional_patch_size", 20.0)?);
        for household in registry.households() {
            let place = registry.place(*household);
            let size = place.size();
            neighborhood_grid.add_household(*household, place.location);
            for _ in 0..size {
                regional_grid.add_person_at(place.location.y(), place.location.x());
            }
        }
        for workplace in registry.workplaces() {
            regional_grid.add_workplace(*workplace, registry.place(*workplace).location);
        }
        for hospital in registry.hospitals() {
            regional_grid.add_hospital(*hospital, registry.place(*hospital).location);
        }
        timer.code_block_finished("Built the regional and neighborhood grids");

        // the loaded enrollment is the baseline for the grade capacity rule
        for school in registry.schools().to_vec() {
            if let Some(info) = registry.place_mut(school).school_mut() {
                info.orig_students_in_grade = info.students_in_grade.clone();
            }
        }

        self.assign_initial_profiles(&mut registry, &mut population, seed)?;

        let statistics = {
            let mut statistics = Statistics::new(n_diseases);
            let incomes: Vec<u32> = registry
                .households()
                .iter()
                .filter_map(|id| registry.place(*id).household().map(|info| info.income))
                .collect();
            statistics.prepare(population.size() as u32, incomes);
            statistics
        };

        self.staff_schools(&mut registry, &mut population, &regional_grid, seed)?;
        self.staff_hospitals(&mut registry, &mut population, &regional_grid)?;
        timer.code_block_finished("Staffed schools and hospitals");

        // patch membership, populations and the per-patch job pools
        neighborhood_grid.record_activity_groups(&registry, |person| {
            population.people[person.index()].workplace()
        });
        neighborhood_grid.make_neighborhoods(&mut registry);
        self.assign_home_patches(&mut registry, &mut population, &neighborhood_grid);
        timer.code_block_finished("Built neighborhoods");

        let dynamics_config = DynamicsConfig {
            classroom_size: params.get_or("school_classroom_size", 40)?,
            office_size: params.get_or("office_size", 50)?,
        };
        let activity_config = ActivityConfig::from_params(params)?;
        self.assign_classrooms_and_offices(
            &mut registry,
            &mut population,
            &dynamics_config,
            &statistics,
            seed,
        );
        self.initialize_sick_leave_for_workers(
            &mut registry,
            &mut population,
            &activity_config,
            &statistics,
            seed,
        );
        timer.code_block_finished("Assigned classrooms, offices and sick leave");

        self.sample_risk_factors(&mut population, seed)?;
        self.assign_visitation_hospitals(&mut registry, &regional_grid, &statistics)?;
        self.assign_shelter_windows(&mut registry, seed)?;

        let transmission_config = TransmissionConfig::from_params(params)?;
        registry.prepare();
        let vector_config = if transmission_config.enable_vector {
            let config = VectorConfig::from_params(params)?;
            let states = registry
                .places
                .iter()
                .map(|place| {
                    if place.is_neighborhood() {
                        None
                    } else {
                        Some(VectorState::new(&config, place.orig_size.max(place.size()), n_diseases))
                    }
                })
                .collect();
            registry.install_vector_states(states);
            Some(config)
        } else {
            None
        };

        let gravity_config = GravityConfig {
            max_distance_km: params.get_or("neighborhood_max_distance", 25.0)?,
            min_distance_km: params.get_or("neighborhood_min_distance", 4.0)?,
            max_destinations: params.get_or("neighborhood_max_destinations", 128)?,
            pop_exponent: params.get_or("neighborhood_population_exponent", 1.0)?,
            dist_exponent: params.get_or("neighborhood_distance_exponent", 3.0)?,
        };
        let gravity = GravityModel::build(&neighborhood_grid, &gravity_config);
        timer.code_block_finished("Built the gravity model");

        let seasonality = if params.get_or("seasonal_reduction", 0.0)? > 0.0 {
            Seasonality::new(
                params.get("seasonal_reduction")?,
                params.get_or("seasonal_peak_day_of_year", 1)?,
            )
        } else {
            Seasonality::disabled()
        };

        let mut simulator = Simulator {
            population,
            registry,
            neighborhood_grid,
            regional_grid,
            gravity,
            diseases,
            activities: ActivityEngine::new(activity_config),
            transmission: TransmissionEngine::new(transmission_config, seasonality, vector_config),
            travel: TravelModel::new(TravelConfig::from_params(params)?),
            dynamics_config,
            statistics,
            calendar: Calendar::new(start_date),
            seed,
            total_days,
            rr_delay: params.get_or("rr_delay", 10)?,
        };

        self.apply_initial_infections(&mut simulator)?;
        timer.code_block_finished("Applied initial infections");

        debug!(
            "Starting Statistics: There are {} total people, {} places",
            simulator
                .population
                .size()
                .to_formatted_string(&NUMBER_FORMATTING),
            simulator
                .registry
                .places
                .len()
                .to_formatted_string(&NUMBER_FORMATTING)
        );
        Ok(simulator)
    }

    /// Households, group quarters, schools, workplaces and hospitals
    fn create_places(&self, registry: &mut PlaceRegistry) -> Result<()> {
        for record in &self.data.households {
            let census_tract = registry.census_tract_index(&record.census_tract);
            let county = county_of_tract(&record.census_tract);
            registry.add(
                &record.label,
                PlaceSubtype::None,
                Point::new(record.longitude, record.latitude),
                county,
                PlaceInfo::Household(HouseholdInfo {
                    income: record.income,
                    deme: record.deme,
                    census_tract,
                    ..HouseholdInfo::default()
                }),
            );
        }
        for record in &self.data.group_quarters {
            let census_tract = registry.census_tract_index(&record.census_tract);
            let county = county_of_tract(&record.census_tract);
            let subtype = match record.gq_type {
                GroupQuartersType::College => PlaceSubtype::College,
                GroupQuartersType::Military => PlaceSubtype::MilitaryBase,
                GroupQuartersType::Prison => PlaceSubtype::Prison,
                GroupQuartersType::NursingHome => PlaceSubtype::NursingHome,
            };
            let location = Point::new(record.longitude, record.latitude);
            // residents of one group quarters share a workplace
            let workplace_label = format!("{}-GQ-WP", record.label);
            let workplace = registry.add(
                &workplace_label,
                subtype,
                location,
                county,
                PlaceInfo::Workplace(WorkplaceInfo::default()),
            );
            registry.add(
                &record.label,
                subtype,
                location,
                county,
                PlaceInfo::Household(HouseholdInfo {
                    census_tract,
                    group_quarters_units: record.capacity,
                    group_quarters_workplace: Some(workplace),
                    ..HouseholdInfo::default()
                }),
            );
        }
        for record in &self.data.schools {
            let county = record.county_fips.parse().unwrap_or(0);
            registry.add(
                &record.label,
                PlaceSubtype::None,
                Point::new(record.longitude, record.latitude),
                county,
                PlaceInfo::School(SchoolInfo::new(county)),
            );
        }
        for record in &self.data.workplaces {
            registry.add(
                &record.label,
                PlaceSubtype::None,
                Point::new(record.longitude, record.latitude),
                0,
                PlaceInfo::Workplace(WorkplaceInfo::default()),
            );
        }
        for record in &self.data.hospitals {
            registry.add(
                &record.label,
                PlaceSubtype::None,
                Point::new(record.longitude, record.latitude),
                0,
                PlaceInfo::Hospital(HospitalInfo {
                    workers: record.workers,
                    physicians: record.physicians,
                    beds: record.beds,
                }),
            );
        }
        Ok(())
    }

    /// People, linked to their household, school and workplace by label
    ///
    /// Records referencing an unknown household are logged and skipped
    fn create_people(
        &self,
        registry: &mut PlaceRegistry,
        population: &mut Population,
    ) -> Result<()> {
        let mut skipped = 0_usize;
        for record in &self.data.people {
            let household = match registry.lookup_household(&record.household) {
                Some(household) => household,
                None => {
                    let error = SimError::DataIntegrity {
                        context: format!("references unknown household {}", record.household),
                        label: record.label.clone(),
                    };
                    warn!("{:?}; skipping", error);
                    skipped += 1;
                    continue;
                }
            };
            let id = population.add_person(
                record.label.clone(),
                record.age,
                record.sex,
                record.race,
                record.relationship,
            );
            population.people[id.index()].favorite_places[ActivitySlot::Household] =
                Some(household);
            registry.enroll(household, id);

            if let Some(school_label) = &record.school {
                match registry.lookup_school(school_label) {
                    Some(school) => {
                        let grade = population::grade_for_age(record.age);
                        let student_fits = registry
                            .place(school)
                            .school()
                            .map(|info| grade <= info.max_grade)
                            .unwrap_or(false);
                        if student_fits {
                            population.people[id.index()].favorite_places[ActivitySlot::School] =
                                Some(school);
                            population.people[id.index()].grade = grade;
                            registry.enroll(school, id);
                            if let Some(info) = registry.place_mut(school).school_mut() {
                                info.students_in_grade[grade as usize] += 1;
                            }
                        } else {
                            let error = SimError::DataIntegrity {
                                context: format!(
                                    "is too old for school {}; leaving unassigned",
                                    school_label
                                ),
                                label: record.label.clone(),
                            };
                            warn!("{:?}", error);
                        }
                    }
                    None => {
                        let error = SimError::DataIntegrity {
                            context: format!("references unknown school {}", school_label),
                            label: record.label.clone(),
                        };
                        warn!("{:?}", error);
                    }
                }
            }
            if let Some(workplace_label) = &record.workplace {
                match registry.lookup_workplace(workplace_label) {
                    Some(workplace) => {
                        population.people[id.index()].favorite_places[ActivitySlot::Workplace] =
                            Some(workplace);
                        registry.enroll(workplace, id);
                    }
                    None => {
                        let error = SimError::DataIntegrity {
                            context: format!("references unknown workplace {}", workplace_label),
                            label: record.label.clone(),
                        };
                        warn!("{:?}", error);
                    }
                }
            }
        }
        if skipped > 0 {
            warn!("Skipped {} people with unknown households", skipped);
        }
        Ok(())
    }

    /// The initial activity profile, from age, enrollment and group quarters
    fn assign_initial_profiles(
        &self,
        registry: &mut PlaceRegistry,
        population: &mut Population,
        seed: u64,
    ) -> Result<()> {
        let ids: Vec<PersonId> = population.people.iter().map(Person::id).collect();
        for id in ids {
            let mut rng = substream(seed, STREAM_BUILD, id.0 as u64, 1);
            let (age, has_school, has_workplace, household) = {
                let person = &population.people[id.index()];
                (
                    person.age,
                    person.school().is_some(),
                    person.workplace().is_some(),
                    person.household(),
                )
            };
            let gq = household.and_then(|household| {
                let place = registry.place(household);
                match place.subtype {
                    PlaceSubtype::College => Some((ActivityProfile::CollegeStudent, place)),
                    PlaceSubtype::MilitaryBase => Some((ActivityProfile::Military, place)),
                    PlaceSubtype::Prison => Some((ActivityProfile::Prisoner, place)),
                    PlaceSubtype::NursingHome => Some((ActivityProfile::NursingHomeResident, place)),
                    _ => None,
                }
            });
            if let Some((profile, place)) = gq {
                let workplace = place.household().and_then(|info| info.group_quarters_workplace);
                let person = &mut population.people[id.index()];
                person.profile = profile;
                if let Some(workplace) = workplace {
                    person.favorite_places[ActivitySlot::Workplace] = Some(workplace);
                    registry.enroll(workplace, id);
                }
                continue;
            }
            let person = &mut population.people[id.index()];
            person.profile = if age == 0 {
                ActivityProfile::Preschool
            } else if has_school {
                ActivityProfile::Student
            } else if age < SCHOOL_AGE {
                ActivityProfile::Preschool
            } else if has_workplace {
                if rng.gen::<f64>() < WEEKEND_WORKER_FRACTION {
                    ActivityProfile::WeekendWorker
                } else {
                    ActivityProfile::Worker
                }
            } else if age >= RETIREMENT_AGE {
                ActivityProfile::Retired
            } else {
                ActivityProfile::Unemployed
            };
        }
        Ok(())
    }

    /// Converts the workers of a suitably sized nearby workplace into each
    /// school's teaching staff
    fn staff_schools(
        &self,
        registry: &mut PlaceRegistry,
        population: &mut Population,
        regional_grid: &RegionalGrid,
        _seed: u64,
    ) -> Result<()> {
        let fixed_staff: u32 = self.params.get_or("school_fixed_staff", 0)?;
        let staff_ratio: f64 = self.params.get_or("school_staff_ratio", 15.5)?;
        for school in registry.schools().to_vec() {
            let (location, students) = {
                let place = registry.place(school);
                let students: u32 = place
                    .school()
                    .map(|info| info.orig_students_in_grade.iter().sum())
                    .unwrap_or(0);
                (place.location, students)
            };
            if students == 0 {
                continue;
            }
            let mut staff_target = fixed_staff;
            if staff_ratio > 0.0 {
                staff_target += (0.5 + f64::from(students) / staff_ratio) as u32;
            }
            match regional_grid.nearby_workplace(registry, location, staff_target) {
                Some(workplace) => {
                    population::turn_workers_into_teachers(
                        &mut population.people,
                        workplace,
                        school,
                        registry,
                    );
                }
                None => {
                    warn!(
                        "No nearby workplace found to staff school {}",
                        registry.place(school).label
                    );
                }
            }
        }
        Ok(())
    }

    /// Points the workers of a nearby workplace at each hospital
    fn staff_hospitals(
        &self,
        registry: &mut PlaceRegistry,
        population: &mut Population,
        regional_grid: &RegionalGrid,
    ) -> Result<()> {
        for hospital in registry.hospitals().to_vec() {
            let (location, staff_target) = {
                let place = registry.place(hospital);
                (
                    place.location,
                    place.hospital().map(|info| info.workers).unwrap_or(0),
                )
            };
            if staff_target == 0 {
                continue;
            }
            let workplace = match regional_grid.nearby_workplace(registry, location, staff_target) {
                Some(workplace) => workplace,
                None => {
                    warn!(
                        "No nearby workplace found to staff hospital {}",
                        registry.place(hospital).label
                    );
                    continue;
                }
            };
            let workers = registry.place(workplace).enrollees.clone();
            for worker in workers {
                if population.people[worker.index()].age < ADULT_AGE {
                    continue;
                }
                population::withdraw_from_workplace(&mut population.people, worker, registry);
                let person = &mut population.people[worker.index()];
                person.favorite_places[ActivitySlot::Workplace] = Some(hospital);
                person.works_at_hospital = true;
                registry.enroll(hospital, worker);
            }
        }
        Ok(())
    }

    /// Home patch assignment plus enrollment in the home neighborhood
    fn assign_home_patches(
        &self,
        registry: &mut PlaceRegistry,
        population: &mut Population,
        grid: &NeighborhoodGrid,
    ) {
        let mut unpatched = 0_usize;
        for index in 0..population.people.len() {
            let id = PersonId(index as u32);
            let household = match population.people[index].household() {
                Some(household) => household,
                None => continue,
            };
            let location = registry.place(household).location;
            match grid.row_col_for(location.y(), location.x()) {
                Some((row, col)) => {
                    population.people[index].home_patch = Some((row, col));
                    if let Some(neighborhood) =
                        grid.patch(row, col).and_then(|patch| patch.neighborhood)
                    {
                        population.people[index].favorite_places[ActivitySlot::Neighborhood] =
                            Some(neighborhood);
                        registry.enroll(neighborhood, id);
                    }
                }
                None => unpatched += 1,
            }
        }
        if unpatched > 0 {
            warn!("{} people live outside the simulation region", unpatched);
        }
    }

    fn assign_classrooms_and_offices(
        &self,
        registry: &mut PlaceRegistry,
        population: &mut Population,
        config: &DynamicsConfig,
        statistics: &Statistics,
        _seed: u64,
    ) {
        let ids: Vec<PersonId> = population.people.iter().map(Person::id).collect();
        for id in ids {
            let person = &population.people[id.index()];
            if person.profile == ActivityProfile::Student && person.school().is_some() {
                population::assign_classroom(
                    &mut population.people,
                    id,
                    registry,
                    config,
                    statistics,
                );
            } else if person.workplace().is_some() {
                population::assign_office(&mut population.people, id, registry, config);
            }
        }
    }

    fn initialize_sick_leave_for_workers(
        &self,
        registry: &mut PlaceRegistry,
        population: &mut Population,
        config: &ActivityConfig,
        statistics: &Statistics,
        seed: u64,
    ) {
        for index in 0..population.people.len() {
            let workplace_size = {
                let person = &population.people[index];
                if let Some(workplace) = person.workplace() {
                    registry.place(workplace).size()
                } else if person.is_teacher() {
                    person
                        .school()
                        .and_then(|school| registry.place(school).school())
                        .map(|info| info.staff_size)
                        .unwrap_or(0)
                } else {
                    continue;
                }
            };
            let mut rng = substream(seed, STREAM_BUILD, index as u64, 2);
            initialize_sick_leave(
                &mut population.people[index],
                workplace_size,
                &config.sick_leave,
                &statistics.sick_leave_census,
                &mut rng,
            );
        }
    }

    /// Face masks, hand washing, chronic conditions and pregnancy
    fn sample_risk_factors(&self, population: &mut Population, seed: u64) -> Result<()> {
        let params = &self.params;
        let face_mask_compliance: f64 = params.get_or("face_mask_compliance", 0.0)?;
        let hand_washing_compliance: f64 = params.get_or("hand_washing_compliance", 0.0)?;
        let asthma: f64 = params.get_or("asthma_prob", 0.0)?;
        let copd: f64 = params.get_or("copd_prob", 0.0)?;
        let renal: f64 = params.get_or("chronic_renal_disease_prob", 0.0)?;
        let diabetes: f64 = params.get_or("diabetes_prob", 0.0)?;
        let heart: f64 = params.get_or("heart_disease_prob", 0.0)?;
        let hypertension: f64 = params.get_or("hypertension_prob", 0.0)?;
        let hypercholesterolemia: f64 = params.get_or("hypercholesterolemia_prob", 0.0)?;
        let pregnancy: f64 = params.get_or("pregnancy_prob", 0.0)?;
        for (index, person) in population.people.iter_mut().enumerate() {
            let mut rng = substream(seed, STREAM_BUILD, index as u64, 3);
            person.wears_face_mask = rng.gen::<f64>() < face_mask_compliance;
            person.washes_hands = rng.gen::<f64>() < hand_washing_compliance;
            person.chronic.asthma = rng.gen::<f64>() < asthma;
            person.chronic.copd = rng.gen::<f64>() < copd;
            person.chronic.chronic_renal_disease = rng.gen::<f64>() < renal;
            person.chronic.diabetes = rng.gen::<f64>() < diabetes;
            person.chronic.heart_disease = rng.gen::<f64>() < heart;
            person.chronic.hypertension = rng.gen::<f64>() < hypertension;
            person.chronic.hypercholesterolemia = rng.gen::<f64>() < hypercholesterolemia;
            person.is_pregnant = person.sex == load_population::records::Sex::Female
                && (18..45).contains(&person.age)
                && rng.gen::<f64>() < pregnancy;
        }
        Ok(())
    }

    /// Nearest adequate hospital for each household, within the radius
    fn assign_visitation_hospitals(
        &self,
        registry: &mut PlaceRegistry,
        regional_grid: &RegionalGrid,
        statistics: &Statistics,
    ) -> Result<()> {
        if !self.params.get_flag("enable_hospitals")? || registry.hospitals().is_empty() {
            return Ok(());
        }
        let radius: f64 = self.params.get_or("hospitalization_radius", 25.0)?;
        let min_beds: u32 = self.params.get_or("min_hospital_beds", 0)?;
        let mut unserved = 0_usize;
        for household in registry.households().to_vec() {
            let location = registry.place(household).location;
            let chosen = regional_grid
                .nearby_places(registry, location, radius, PlaceKind::Hospital)
                .into_iter()
                .find(|hospital| {
                    registry
                        .place(*hospital)
                        .hospital()
                        .map(|info| info.beds >= min_beds)
                        .unwrap_or(false)
                });
            match chosen {
                Some(hospital) => {
                    if let Some(info) = registry.place_mut(household).household_mut() {
                        info.visitation_hospital = Some(hospital);
                    }
                }
                None => {
                    unserved += 1;
                    statistics.note_warning();
                }
            }
        }
        if unserved > 0 {
            warn!("{} households have no hospital within reach", unserved);
        }
        Ok(())
    }

    /// Sheltering windows for complying households
    fn assign_shelter_windows(&self, registry: &mut PlaceRegistry, seed: u64) -> Result<()> {
        if !self.params.get_flag("enable_household_shelter")? {
            return Ok(());
        }
        let start: i32 = self.params.get_or("shelter_start_day", 0)?;
        let end: i32 = self.params.get_or("shelter_end_day", 0)?;
        let compliance: f64 = self.params.get_or("shelter_compliance", 1.0)?;
        let mut sheltering = 0_usize;
        for household in registry.households().to_vec() {
            let mut rng = substream(seed, STREAM_BUILD, household.0 as u64, 4);
            if rng.gen::<f64>() < compliance {
                if let Some(info) = registry.place_mut(household).household_mut() {
                    info.shelter_start_day = start;
                    info.shelter_end_day = end;
                    sheltering += 1;
                }
            }
        }
        info!(
            "{} households will shelter between days {} and {}",
            sheltering, start, end
        );
        Ok(())
    }

    /// Seeds the configured number of primary cases per disease
    fn apply_initial_infections(&self, simulator: &mut Simulator) -> Result<()> {
        for d in 0..simulator.diseases.len() {
            let primary_cases = simulator.diseases[d].primary_cases;
            if primary_cases == 0 {
                continue;
            }
            let mut rng = substream(simulator.seed, STREAM_BUILD, d as u64, 5);
            let mut candidates: Vec<PersonId> = simulator
                .population
                .people
                .iter()
                .filter(|person| person.alive && person.health[d].is_susceptible())
                .map(Person::id)
                .collect();
            candidates.shuffle(&mut rng);
            for seed_case in candidates.into_iter().take(primary_cases as usize) {
                let will_be_symptomatic = simulator.diseases[d].draw_symptomatic(&mut rng);
                let health: &mut HealthState =
                    &mut simulator.population.people[seed_case.index()].health[d];
                health.become_exposed(0, None, None, will_be_symptomatic);
                let (income, county, tract, school, age) = {
                    let person = &simulator.population.people[seed_case.index()];
                    let (income, county, tract) = match person.household() {
                        Some(household) => {
                            let place = simulator.registry.place(household);
                            (
                                place.household().map(|info| info.income).unwrap_or(0),
                                place.county_fips,
                                place.household().map(|info| info.census_tract).unwrap_or(0),
                            )
                        }
                        None => (0, 0, 0),
                    };
                    (income, county, tract, person.school(), person.age)
                };
                simulator.statistics.record_exposure(
                    d,
                    0,
                    county,
                    tract as usize,
                    income,
                    school,
                    age,
                    will_be_symptomatic,
                );
            }
            info!("Seeded {} primary cases of disease {}", primary_cases, d);
        }
        Ok(())
    }
}

/// The county FIPS is the leading five digits of the tract code
fn county_of_tract(census_tract: &str) -> u32 {
    census_tract
        .get(0..5)
        .and_then(|prefix| prefix.parse().ok())
        .unwrap_or(0)
}
