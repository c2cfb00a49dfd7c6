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

use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;

use crate::activities::{ActivityEngine, DayBuffer, MembershipEvent, ScheduleContext};
use crate::calendar::Calendar;
use crate::config::DEBUG_ITERATION_PRINT;
use crate::disease::Disease;
use crate::models::health::HealthStatus;
use crate::models::person::ActivitySlot;
use crate::population::{self, DynamicsConfig, Population};
use crate::random::{substream, STREAM_HEALTH, STREAM_SCHEDULE, STREAM_SPREAD};
use crate::registry::PlaceRegistry;
use crate::spatial::gravity::GravityModel;
use crate::spatial::neighborhood::NeighborhoodGrid;
use crate::spatial::regional::RegionalGrid;
use crate::statistics::Statistics;
use crate::transmission::{SpreadContext, SpreadResult, TransmissionEngine};
use crate::travel::TravelModel;

/// Simple wall clock for logging how long each build phase takes
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    block_start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        let now = Instant::now();
        Timer {
            start: now,
            block_start: now,
        }
    }
}

impl Timer {
    pub fn code_block_finished(&mut self, message: &str) {
        info!(
            "{} in {:?} (total {:?})",
            message,
            self.block_start.elapsed(),
            self.start.elapsed()
        );
        self.block_start = Instant::now();
    }
}

/// The assembled simulation: population, places, grids and engines
///
/// Built by `SimulatorBuilder`; `run` drives the per day loop
pub struct Simulator {
    pub population: Population,
    pub registry: PlaceRegistry,
    pub neighborhood_grid: NeighborhoodGrid,
    pub regional_grid: RegionalGrid,
    pub gravity: GravityModel,
    pub diseases: Vec<Disease>,
    pub activities: ActivityEngine,
    pub transmission: TransmissionEngine,
    pub travel: TravelModel,
    pub dynamics_config: DynamicsConfig,
    pub statistics: Statistics,
    pub calendar: Calendar,
    pub seed: u64,
    pub total_days: u32,
    pub rr_delay: u32,
}

impl Simulator {
    /// Runs the configured number of days, stopping early once every
    /// disease has burned out
    pub fn run(&mut self) -> Result<()> {
        let mut timer = Timer::default();
        info!("Starting simulation for {} days...", self.total_days);
        for day in 0..self.total_days {
            let keep_going = self
                .step(day)
                .context(format!("Simulation failed on day {}", day))?;
            if day % DEBUG_ITERATION_PRINT == 0 {
                info!("{}", self.statistics);
            }
            if !keep_going {
                info!("Disease finished as no one has the disease");
                break;
            }
        }
        timer.code_block_finished("Simulation finished");
        Ok(())
    }

    /// Applies a single simulated day
    ///
    /// Returns false once no disease remains in the population
    pub fn step(&mut self, day: u32) -> Result<bool> {
        self.calendar.advance_to(day);
        self.statistics.next_day(day);
        self.registry.reset_day();

        let is_weekday = self.calendar.is_weekday();
        let day_of_year = self.calendar.day_of_year();

        // vector populations evolve before anyone moves
        if self.transmission.config.enable_vector {
            self.update_vector_populations(day);
        }

        // health progression, then the parallel agent phase
        self.population.update_health(&self.diseases, day);

        let buffers: Vec<DayBuffer> = {
            let ctx = ScheduleContext {
                registry: &self.registry,
                grid: &self.neighborhood_grid,
                gravity: &self.gravity,
                diseases: &self.diseases,
                statistics: &self.statistics,
                day,
                is_weekday,
            };
            let activities = &self.activities;
            let seed = self.seed;
            self.population
                .people
                .par_iter_mut()
                .enumerate()
                .fold(DayBuffer::default, |mut buffer, (index, person)| {
                    let mut rng = substream(seed, STREAM_SCHEDULE, index as u64, day as u64);
                    activities.update_person(person, &ctx, &mut buffer, &mut rng);
                    buffer
                })
                .collect()
        };

        // sequential merge: place membership first, then the visitor lists
        let mut visit_count = 0_usize;
        for buffer in &buffers {
            for event in &buffer.events {
                match *event {
                    MembershipEvent::Enroll(place, person) => self.registry.enroll(place, person),
                    MembershipEvent::Unenroll(place, person) => {
                        self.registry.unenroll(place, person)
                    }
                    MembershipEvent::SetHospitalizedMember(household, flag) => {
                        if let Some(info) = self.registry.place_mut(household).household_mut() {
                            info.has_hospitalized_member = flag;
                        }
                    }
                }
            }
        }
        for buffer in buffers {
            visit_count += buffer.visits.len();
            for visit in buffer.visits {
                self.registry
                    .push_visitor(visit.place, visit.disease, visit.role, visit.person);
            }
        }

        // parallel place phase over the registered infectious places
        let mut work = self.registry.take_day_work();
        let results: Vec<SpreadResult> = {
            let ctx = SpreadContext {
                registry: &self.registry,
                people: &self.population.people,
                diseases: &self.diseases,
                latches: &self.population.latches,
                day,
                day_of_year,
                weekend: !is_weekday,
            };
            let transmission = &self.transmission;
            let seed = self.seed;
            work.par_iter_mut()
                .map(|item| {
                    let mut rng = substream(seed, STREAM_SPREAD, item.place.0 as u64, day as u64);
                    transmission.spread(item, &ctx, &mut rng)
                })
                .collect()
        };
        for (item, result) in work.iter().zip(&results) {
            if result.active {
                self.registry.place_mut(item.place).record_infectious_day(day);
            }
        }
        self.registry.restore_vector_states(&mut work);

        let exposure_count: usize = results.iter().map(|result| result.exposures.len()).sum();
        debug!(
            "Day {}: {} visits, {} infectious places, {} exposures",
            day,
            visit_count,
            work.len(),
            exposure_count
        );
        for result in results {
            for exposure in result.exposures {
                self.apply_exposure(exposure, day);
            }
        }

        // travel, calendar triggers and demographic events close the day
        self.travel.update(day, &mut self.population, self.seed);
        if self.calendar.is_school_year_end() {
            population::end_school_year(&mut self.population.people, &mut self.registry);
        }
        if self.calendar.is_school_year_start() {
            population::start_school_year(
                &mut self.population,
                &mut self.registry,
                &self.neighborhood_grid,
                &self.dynamics_config,
                &self.activities.config.sick_leave,
                &self.statistics.sick_leave_census,
                &self.statistics,
                self.seed,
                day,
            );
        }
        self.population
            .apply_demographic_events(day, &mut self.registry, &self.statistics);

        self.statistics
            .snapshot(day, &self.population.people, &self.diseases, self.rr_delay);
        Ok(self.statistics.disease_exists())
    }

    fn apply_exposure(&mut self, exposure: crate::transmission::Exposure, day: u32) {
        let d = exposure.disease;
        let (household_income, county, tract) = {
            let person = &self.population.people[exposure.infectee.index()];
            match person.household() {
                Some(household) => {
                    let place = self.registry.place(household);
                    let info = place.household();
                    (
                        info.map(|info| info.income).unwrap_or(0),
                        place.county_fips,
                        info.map(|info| info.census_tract).unwrap_or(0),
                    )
                }
                None => (0, 0, 0),
            }
        };
        let mut rng = substream(self.seed, STREAM_HEALTH, exposure.infectee.0 as u64, day as u64);
        let will_be_symptomatic = self.diseases[d].draw_symptomatic(&mut rng);

        let (school, age) = {
            let person = &mut self.population.people[exposure.infectee.index()];
            if !person.health[d].is_susceptible() {
                return;
            }
            person.health[d].become_exposed(
                day,
                exposure.infector,
                Some(exposure.place),
                will_be_symptomatic,
            );
            // a vector borne infection locks out the other diseases
            if exposure.from_vector {
                for (other, health) in person.health.iter_mut().enumerate() {
                    if other != d && health.status == HealthStatus::Susceptible {
                        health.status = HealthStatus::Immune;
                    }
                }
            }
            (person.school(), person.age)
        };
        if let Some(infector) = exposure.infector {
            self.population.people[infector.index()].health[d].secondary_infections += 1;
        }
        self.registry.place_mut(exposure.place).total_infections[d] += 1;
        self.statistics.record_exposure(
            d,
            day,
            county,
            tract as usize,
            household_income,
            school,
            age,
            will_be_symptomatic,
        );
    }

    fn update_vector_populations(&mut self, day: u32) {
        let config = match &self.transmission.vector_config {
            Some(config) => config.clone(),
            None => return,
        };
        let places: Vec<crate::models::place::PlaceId> = self.registry.vector_places().collect();
        for place in places {
            let mut rng = substream(self.seed, STREAM_SPREAD, u64::from(place.0) << 32, day as u64);
            let infectious = {
                let state = match self.registry.vector_state_mut(place) {
                    Some(state) => state,
                    None => continue,
                };
                state.update_population(&config, day, &mut rng);
                state
                    .i_vectors
                    .iter()
                    .enumerate()
                    .filter(|(_, count)| **count > 0)
                    .map(|(disease, _)| disease)
                    .collect::<Vec<usize>>()
            };
            for disease in infectious {
                self.registry.register_infectious_place(place, disease);
            }
        }
    }

    /// End of run bookkeeping: logs the outcome and the warning tally
    pub fn finalize(&self) {
        for disease in &self.diseases {
            info!(
                "Disease {} ({}): final attack rate {:.4}",
                disease.id(),
                disease.name,
                self.statistics.attack_rate(disease.id())
            );
        }
        let warnings = self.statistics.warning_count();
        if warnings > 0 {
            info!(
                "{} warnings were recorded during the run (degraded fidelity)",
                warnings
            );
        }
    }

    /// Dumps the simulation state for post mortem debugging
    pub fn error_dump_json(&self, filename: &str) -> Result<()> {
        use serde_json::json;
        let places: Vec<serde_json::Value> = self
            .registry
            .places
            .iter()
            .map(|place| {
                json!({
                    "label": place.label,
                    "kind": place.kind().to_string(),
                    "size": place.size(),
                    "first_infectious_day": place.first_infectious_day,
                    "last_infectious_day": place.last_infectious_day,
                    "total_infections": place.total_infections,
                })
            })
            .collect();
        let people: Vec<serde_json::Value> = self
            .population
            .people
            .iter()
            .map(|person| {
                json!({
                    "label": person.label,
                    "age": person.age,
                    "profile": format!("{:?}", person.profile),
                    "schedule": person.schedule.bits(),
                    "health": person
                        .health
                        .iter()
                        .map(|health| health.status.to_string())
                        .collect::<Vec<String>>(),
                })
            })
            .collect();
        let file = std::fs::File::create(filename)
            .context(format!("Failed to create dump file: '{}'", filename))?;
        serde_json::to_writer(file, &json!({ "people": people, "places": places }))
            .context("Failed to write simulation dump")?;
        Ok(())
    }

    /// Convenience accessor used by the schedule assertions in tests and
    /// by the reporter
    pub fn schedule_of(&self, person: usize) -> crate::models::person::Schedule {
        self.population.people[person].schedule
    }

    pub fn favorite_place_of(
        &self,
        person: usize,
        slot: ActivitySlot,
    ) -> Option<crate::models::place::PlaceId> {
        self.population.people[person].favorite_places[slot]
    }
}

#[cfg(test)]
mod tests {
    use load_population::records::{HospitalRecord, HouseholdRecord, PersonRecord, Sex, WorkplaceRecord};
    use load_population::SyntheticPopulation;

    use crate::activities::DayBuffer;
    use crate::activities::ScheduleContext;
    use crate::models::person::{ActivityProfile, ActivitySlot};
    use crate::params::Params;
    use crate::random::{substream, STREAM_SCHEDULE};
    use crate::simulator::Simulator;
    use crate::simulator_builder::SimulatorBuilder;

    fn household_record(label: &str) -> HouseholdRecord {
        HouseholdRecord {
            label: label.to_string(),
            latitude: 40.44,
            longitude: -79.99,
            census_tract: "4200314010".to_string(),
            race: 1,
            income: 50_000,
            deme: 0,
        }
    }

    fn person_record(label: &str, household: &str, age: u32) -> PersonRecord {
        PersonRecord {
            label: label.to_string(),
            household: household.to_string(),
            age,
            sex: Sex::Female,
            race: 1,
            relationship: 0,
            school: None,
            workplace: None,
        }
    }

    fn base_params() -> Params {
        let mut params = Params::new();
        params.set("days", "30");
        params.set("seed", "42");
        params.set("diseases", "1");
        params.set("start_date", "2020-01-06"); // a Monday
        params.set("transmissibility[0]", "1.0");
        params.set("latent_days[0]", "2");
        params.set("infectious_days[0]", "4");
        params.set("days_to_symptoms[0]", "0");
        params.set("prob_symptomatic[0]", "1.0");
        params.set("household_contacts[0]", "1.0");
        params.set("primary_cases[0]", "1");
        params
    }

    fn single_household(members: u32) -> SyntheticPopulation {
        SyntheticPopulation {
            households: vec![household_record("H1")],
            group_quarters: vec![],
            people: (0..members)
                .map(|i| person_record(&format!("P{}", i), "H1", 30 + i))
                .collect(),
            schools: vec![],
            workplaces: vec![],
            hospitals: vec![],
        }
    }

    fn build(data: SyntheticPopulation, params: Params) -> Simulator {
        SimulatorBuilder::new(data, params).build().unwrap()
    }

    #[test]
    fn single_household_saturates() {
        // one index case, perfect transmission: everyone is exposed within days
        let mut simulator = build(single_household(4), base_params());
        for day in 0..8 {
            simulator.step(day).unwrap();
        }
        assert!(
            (simulator.statistics.attack_rate(0) - 1.0).abs() < 1e-12,
            "attack rate was {}",
            simulator.statistics.attack_rate(0)
        );
        // every exposure is attributed to the household
        let household = simulator.registry.lookup_household("H1").unwrap();
        let place = simulator.registry.place(household);
        assert_eq!(place.total_infections[0], 3);
        assert!(place.first_infectious_day >= 0);
        assert!(place.last_infectious_day >= place.first_infectious_day);
    }

    #[test]
    fn isolated_infector_stops_the_chain() {
        let mut params = base_params();
        params.set("enable_isolation", "1");
        params.set("isolation_rate", "1.0");
        params.set("isolation_delay", "0");
        let mut simulator = build(single_household(4), params);
        for day in 0..12 {
            simulator.step(day).unwrap();
        }
        assert!(
            (simulator.statistics.attack_rate(0) - 0.25).abs() < 1e-12,
            "only the index case should be exposed, attack rate was {}",
            simulator.statistics.attack_rate(0)
        );
        let isolated = simulator
            .population
            .people
            .iter()
            .filter(|person| person.is_isolated)
            .count();
        assert_eq!(isolated, 1);
    }

    #[test]
    fn zero_transmissibility_produces_zero_exposures() {
        let mut params = base_params();
        params.set("transmissibility[0]", "0.0");
        let mut simulator = build(single_household(6), params);
        for day in 0..10 {
            simulator.step(day).unwrap();
        }
        assert!((simulator.statistics.attack_rate(0) - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn hospitalization_cycle_restores_favorite_places() {
        let mut params = base_params();
        params.set("enable_hospitals", "1");
        params.set("hospitalization_length_of_stay", "2");
        params.set("hospitalization_prob[0]_ages", "120");
        params.set("hospitalization_prob[0]_values", "1.0");
        // recovery lands on the discharge day, so the agent is not
        // immediately re-admitted while still symptomatic
        params.set("infectious_days[0]", "2");
        let mut data = single_household(1);
        data.hospitals.push(HospitalRecord {
            label: "HOSP1".to_string(),
            workers: 0,
            physicians: 2,
            beds: 20,
            latitude: 40.44,
            longitude: -79.99,
        });
        let mut simulator = build(data, params);
        let original_places = simulator.population.people[0].favorite_places.clone();
        assert!(original_places[ActivitySlot::Household].is_some());

        simulator.step(0).unwrap();
        simulator.step(1).unwrap();
        // infectious and symptomatic on day 2: hospitalized for two days
        simulator.step(2).unwrap();
        assert!(simulator.population.people[0].is_hospitalized);
        assert_eq!(
            simulator.schedule_of(0).bits(),
            ActivitySlot::Hospital.bit(),
            "hospital should be the only place on the schedule"
        );
        simulator.step(3).unwrap();
        assert!(simulator.population.people[0].is_hospitalized);
        assert_eq!(simulator.schedule_of(0).bits(), ActivitySlot::Hospital.bit());
        // discharge day: the saved tuple comes back verbatim
        simulator.step(4).unwrap();
        assert!(!simulator.population.people[0].is_hospitalized);
        assert_eq!(simulator.population.people[0].favorite_places, original_places);
        assert!(simulator.schedule_of(0).is_on(ActivitySlot::Household));
    }

    #[test]
    fn weekend_worker_goes_to_work_on_saturday() {
        let mut params = base_params();
        params.set("start_date", "2020-01-04"); // a Saturday
        params.set("primary_cases[0]", "0");
        let mut data = SyntheticPopulation {
            households: vec![household_record("H1"), household_record("H2")],
            group_quarters: vec![],
            people: vec![
                person_record("P0", "H1", 40),
                person_record("P1", "H2", 40),
            ],
            schools: vec![],
            workplaces: vec![WorkplaceRecord {
                label: "W1".to_string(),
                latitude: 40.44,
                longitude: -79.99,
            }],
            hospitals: vec![],
        };
        for person in &mut data.people {
            person.workplace = Some("W1".to_string());
        }
        let mut simulator = build(data, params);
        simulator.population.people[0].profile = ActivityProfile::WeekendWorker;
        simulator.population.people[1].profile = ActivityProfile::Worker;
        simulator.step(0).unwrap();
        assert!(
            simulator.schedule_of(0).is_on(ActivitySlot::Workplace),
            "weekend workers work on Saturday"
        );
        assert!(
            !simulator.schedule_of(1).is_on(ActivitySlot::Workplace),
            "regular workers stay home on Saturday"
        );
    }

    #[test]
    fn schedule_update_is_idempotent() {
        let mut simulator = build(single_household(2), base_params());
        let ctx = ScheduleContext {
            registry: &simulator.registry,
            grid: &simulator.neighborhood_grid,
            gravity: &simulator.gravity,
            diseases: &simulator.diseases,
            statistics: &simulator.statistics,
            day: 0,
            is_weekday: true,
        };
        let mut rng = substream(42, STREAM_SCHEDULE, 0, 0);
        let mut buffer = DayBuffer::default();
        let activities = &simulator.activities;
        activities.update_person(&mut simulator.population.people[0], &ctx, &mut buffer, &mut rng);
        let mask = simulator.population.people[0].schedule;
        let visits = buffer.visits.len();
        assert!(visits > 0);
        // the second call on the same day neither changes the mask nor
        // records another visit
        activities.update_person(&mut simulator.population.people[0], &ctx, &mut buffer, &mut rng);
        assert_eq!(simulator.population.people[0].schedule, mask);
        assert_eq!(buffer.visits.len(), visits);
    }

    #[test]
    fn enrollment_is_consistent_after_a_day() {
        let mut simulator = build(single_household(5), base_params());
        simulator.step(0).unwrap();
        for person in &simulator.population.people {
            for (_, place) in person.favorite_places.iter() {
                if let Some(place) = place {
                    assert!(
                        simulator
                            .registry
                            .place(*place)
                            .enrollees
                            .contains(&person.id()),
                        "{} should be enrolled at {}",
                        person.id(),
                        place
                    );
                }
            }
        }
    }

    #[test]
    fn scheduled_people_join_exactly_one_visitor_list() {
        let mut params = base_params();
        params.set("primary_cases[0]", "0");
        let mut simulator = build(single_household(3), params);
        simulator.step(0).unwrap();
        for person in &simulator.population.people {
            for slot in [ActivitySlot::Household, ActivitySlot::Neighborhood] {
                if !person.schedule.is_on(slot) {
                    continue;
                }
                let place = person.favorite_places[slot].unwrap();
                let state = simulator.registry.day_state(place, 0);
                let appearances = state
                    .susceptibles
                    .iter()
                    .chain(state.infectious.iter())
                    .filter(|visitor| **visitor == person.id())
                    .count();
                assert_eq!(appearances, 1, "{} at {}", person.id(), place);
            }
        }
    }

    #[test]
    fn dead_end_population_ends_the_run() {
        let mut params = base_params();
        params.set("primary_cases[0]", "0");
        let mut simulator = build(single_household(3), params);
        assert!(!simulator.step(0).unwrap(), "no disease means no more work");
    }
}
