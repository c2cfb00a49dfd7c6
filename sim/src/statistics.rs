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
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::disease::Disease;
use crate::models::health::HealthStatus;
use crate::models::person::Person;
use crate::models::place::PlaceId;

/// Age bands used for the stratified exposure counts
pub const AGE_GROUP_BOUNDS: [u32; 4] = [4, 17, 49, 64];
pub const AGE_GROUP_COUNT: usize = AGE_GROUP_BOUNDS.len() + 1;

pub fn age_group(age: u32) -> usize {
    AGE_GROUP_BOUNDS
        .iter()
        .position(|bound| age <= *bound)
        .unwrap_or(AGE_GROUP_BOUNDS.len())
}

/// Counters shared across the parallel agent phase, reset daily
#[derive(Default)]
pub struct DayTallies {
    pub sick_days_absent: AtomicU32,
    pub sick_days_present: AtomicU32,
    pub school_sick_days_absent: AtomicU32,
    pub school_sick_days_present: AtomicU32,
    pub deaths: AtomicU32,
}

impl DayTallies {
    fn reset(&self) {
        self.sick_days_absent.store(0, Ordering::Relaxed);
        self.sick_days_present.store(0, Ordering::Relaxed);
        self.school_sick_days_absent.store(0, Ordering::Relaxed);
        self.school_sick_days_present.store(0, Ordering::Relaxed);
    }
}

/// Employees with and without sick leave, by workplace size class
#[derive(Default)]
pub struct SickLeaveCensus {
    pub with_sick_leave: [AtomicU32; 4],
    pub without_sick_leave: [AtomicU32; 4],
}

/// One emitted report row, per day per disease
#[derive(Clone, Debug, Serialize)]
pub struct DailySnapshot {
    pub day: u32,
    pub disease: usize,
    pub susceptible: u32,
    pub exposed: u32,
    pub infectious: u32,
    pub symptomatic: u32,
    pub recovered: u32,
    pub immune: u32,
    pub dead: u32,
    pub incidence: u32,
    pub symptomatic_incidence: u32,
    pub attack_rate: f64,
    pub prevalence: u32,
    /// Cohort reproductive number of the cohort exposed RR_delay days ago
    pub rr: f64,
}

/// First infection day and running exposure total, teacher style
type FirstAndCount = (u32, u32);

#[derive(Default)]
struct DiseaseAccumulator {
    total_ever_exposed: u32,
    incidence_today: u32,
    symptomatic_incidence_today: u32,
    counties_exposed: HashMap<u32, FirstAndCount>,
    tracts_exposed: HashMap<u32, FirstAndCount>,
    schools_exposed: HashMap<u32, FirstAndCount>,
    income_quartiles_exposed: [u32; 4],
    age_groups_exposed: [u32; AGE_GROUP_COUNT],
}

fn bump(map: &mut HashMap<u32, FirstAndCount>, key: u32, day: u32) {
    let entry = map.entry(key).or_insert((day, 0));
    entry.1 += 1;
}

/// All run level statistics, owned by the simulation
///
/// The atomics are the only fields touched from parallel phases
pub struct Statistics {
    day: u32,
    population_size: u32,
    income_quartile_breaks: [u32; 3],
    pub tallies: DayTallies,
    pub sick_leave_census: SickLeaveCensus,
    per_disease: Vec<DiseaseAccumulator>,
    snapshots: Vec<DailySnapshot>,
    warnings: AtomicU32,
}

impl Statistics {
    pub fn new(n_diseases: usize) -> Statistics {
        let mut per_disease = Vec::new();
        per_disease.resize_with(n_diseases, DiseaseAccumulator::default);
        Statistics {
            day: 0,
            population_size: 0,
            income_quartile_breaks: [0; 3],
            tallies: DayTallies::default(),
            sick_leave_census: SickLeaveCensus::default(),
            per_disease,
            snapshots: Vec::new(),
            warnings: AtomicU32::new(0),
        }
    }

    /// Fixes the population size and income quartile break points
    pub fn prepare(&mut self, population_size: u32, mut household_incomes: Vec<u32>) {
        self.population_size = population_size;
        if !household_incomes.is_empty() {
            household_incomes.sort_unstable();
            let n = household_incomes.len();
            self.income_quartile_breaks = [
                household_incomes[n / 4],
                household_incomes[n / 2],
                household_incomes[3 * n / 4],
            ];
        }
    }

    pub fn income_quartile(&self, income: u32) -> usize {
        self.income_quartile_breaks
            .iter()
            .position(|b| income <= *b)
            .unwrap_or(3)
    }

    pub fn next_day(&mut self, day: u32) {
        self.day = day;
        self.tallies.reset();
        for accumulator in &mut self.per_disease {
            accumulator.incidence_today = 0;
            accumulator.symptomatic_incidence_today = 0;
        }
    }

    pub fn note_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Records one new exposure with its stratification keys
    #[allow(clippy::too_many_arguments)]
    pub fn record_exposure(
        &mut self,
        disease: usize,
        day: u32,
        county_fips: u32,
        census_tract: usize,
        household_income: u32,
        school: Option<PlaceId>,
        age: u32,
        will_be_symptomatic: bool,
    ) {
        let quartile = self.income_quartile(household_income);
        let accumulator = &mut self.per_disease[disease];
        accumulator.total_ever_exposed += 1;
        accumulator.incidence_today += 1;
        if will_be_symptomatic {
            accumulator.symptomatic_incidence_today += 1;
        }
        bump(&mut accumulator.counties_exposed, county_fips, day);
        bump(&mut accumulator.tracts_exposed, census_tract as u32, day);
        if let Some(school) = school {
            bump(&mut accumulator.schools_exposed, school.0, day);
        }
        accumulator.income_quartiles_exposed[quartile] += 1;
        accumulator.age_groups_exposed[age_group(age)] += 1;
    }

    /// Compiles the end of day report rows from the population state
    pub fn snapshot(&mut self, day: u32, people: &[Person], diseases: &[Disease], rr_delay: u32) {
        for disease in diseases {
            let d = disease.id();
            let mut susceptible = 0;
            let mut exposed = 0;
            let mut infectious = 0;
            let mut symptomatic = 0;
            let mut recovered = 0;
            let mut immune = 0;
            let mut dead = 0;
            let mut cohort_size = 0_u32;
            let mut cohort_secondary = 0_u32;
            let cohort_exposure_day = day as i64 - rr_delay as i64;
            for person in people {
                let health = &person.health[d];
                match health.status {
                    HealthStatus::Susceptible => susceptible += 1,
                    HealthStatus::Exposed => exposed += 1,
                    HealthStatus::Infectious => {
                        infectious += 1;
                        if health.is_symptomatic() {
                            symptomatic += 1;
                        }
                    }
                    HealthStatus::Recovered => recovered += 1,
                    HealthStatus::Immune => immune += 1,
                    HealthStatus::Dead => dead += 1,
                }
                if cohort_exposure_day >= 0 && health.exposure_day == cohort_exposure_day as i32 {
                    cohort_size += 1;
                    cohort_secondary += health.secondary_infections;
                }
            }
            let accumulator = &self.per_disease[d];
            self.snapshots.push(DailySnapshot {
                day,
                disease: d,
                susceptible,
                exposed,
                infectious,
                symptomatic,
                recovered,
                immune,
                dead,
                incidence: accumulator.incidence_today,
                symptomatic_incidence: accumulator.symptomatic_incidence_today,
                attack_rate: if self.population_size > 0 {
                    f64::from(accumulator.total_ever_exposed) / f64::from(self.population_size)
                } else {
                    0.0
                },
                prevalence: exposed + infectious,
                rr: if cohort_size > 0 {
                    f64::from(cohort_secondary) / f64::from(cohort_size)
                } else {
                    0.0
                },
            });
        }
    }

    pub fn latest(&self, disease: usize) -> Option<&DailySnapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|snapshot| snapshot.disease == disease)
    }

    pub fn snapshots(&self) -> &[DailySnapshot] {
        &self.snapshots
    }

    pub fn attack_rate(&self, disease: usize) -> f64 {
        if self.population_size == 0 {
            return 0.0;
        }
        f64::from(self.per_disease[disease].total_ever_exposed) / f64::from(self.population_size)
    }

    /// Returns true if at least one person still carries any disease
    pub fn disease_exists(&self) -> bool {
        self.snapshots
            .iter()
            .rev()
            .take(self.per_disease.len())
            .any(|snapshot| snapshot.exposed > 0 || snapshot.infectious > 0)
    }

    pub fn counties_exposed(&self, disease: usize) -> &HashMap<u32, FirstAndCount> {
        &self.per_disease[disease].counties_exposed
    }

    pub fn tracts_exposed(&self, disease: usize) -> &HashMap<u32, FirstAndCount> {
        &self.per_disease[disease].tracts_exposed
    }

    pub fn schools_exposed(&self, disease: usize) -> &HashMap<u32, FirstAndCount> {
        &self.per_disease[disease].schools_exposed
    }

    pub fn income_quartiles_exposed(&self, disease: usize) -> [u32; 4] {
        self.per_disease[disease].income_quartiles_exposed
    }

    pub fn age_groups_exposed(&self, disease: usize) -> [u32; AGE_GROUP_COUNT] {
        self.per_disease[disease].age_groups_exposed
    }

    pub fn summarise(&self) {
        for (d, accumulator) in self.per_disease.iter().enumerate() {
            println!("Disease {}: attack rate {:.4}", d, self.attack_rate(d));
            println!("Counties exposed:");
            for (county, (first, total)) in &accumulator.counties_exposed {
                println!(
                    "         {} first infected at {} with total {}",
                    county, first, total
                );
            }
        }
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Day: {}", self.day)?;
        for (d, _) in self.per_disease.iter().enumerate() {
            if let Some(snapshot) = self.latest(d) {
                write!(
                    f,
                    ", [{}] Susceptible: {}, Exposed: {}, Infectious: {}, Recovered: {}",
                    d, snapshot.susceptible, snapshot.exposed, snapshot.infectious, snapshot.recovered
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{age_group, Statistics};

    #[test]
    fn age_groups_cover_all_ages() {
        assert_eq!(age_group(0), 0);
        assert_eq!(age_group(4), 0);
        assert_eq!(age_group(5), 1);
        assert_eq!(age_group(17), 1);
        assert_eq!(age_group(30), 2);
        assert_eq!(age_group(64), 3);
        assert_eq!(age_group(90), 4);
    }

    #[test]
    fn income_quartiles_split_the_distribution() {
        let mut statistics = Statistics::new(1);
        statistics.prepare(8, vec![10, 20, 30, 40, 50, 60, 70, 80]);
        assert_eq!(statistics.income_quartile(10), 0);
        assert_eq!(statistics.income_quartile(35), 1);
        assert_eq!(statistics.income_quartile(55), 2);
        assert_eq!(statistics.income_quartile(99), 3);
    }

    #[test]
    fn exposures_accumulate_into_strata() {
        let mut statistics = Statistics::new(1);
        statistics.prepare(100, vec![10, 20, 30, 40]);
        statistics.next_day(3);
        statistics.record_exposure(0, 3, 42003, 0, 10, None, 7, true);
        statistics.record_exposure(0, 3, 42003, 1, 80, None, 40, false);
        assert!((statistics.attack_rate(0) - 0.02).abs() < 1e-12);
        assert_eq!(statistics.counties_exposed(0).get(&42003), Some(&(3, 2)));
        assert_eq!(statistics.income_quartiles_exposed(0)[0], 1);
        assert_eq!(statistics.age_groups_exposed(0)[1], 1);
        assert_eq!(statistics.age_groups_exposed(0)[2], 1);
    }
}
