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

use log::debug;
use rand::Rng;

use crate::activities::{start_traveling, start_traveling_outside, stop_traveling};
use crate::models::person::PersonId;
use crate::params::{AgeMap, Params};
use crate::population::Population;
use crate::random::{draw_from_cdf, stochastic_round, substream, STREAM_TRAVEL};
use crate::SimError;

#[derive(Clone, Debug)]
pub struct TravelConfig {
    pub enabled: bool,
    /// Expected trips per person per day
    pub trip_rate: f64,
    /// Fraction of trips leaving the simulated region entirely
    pub outside_fraction: f64,
    pub travel_age_prob: AgeMap,
    /// cdf over trip durations; index i is P(duration <= i + 1 days)
    pub duration_cdf: Vec<f64>,
}

impl TravelConfig {
    pub fn from_params(params: &Params) -> Result<TravelConfig, SimError> {
        let duration_cdf = if params.contains("travel_duration_cdf") {
            params.get_list("travel_duration_cdf")?
        } else {
            vec![0.2, 0.4, 0.6, 0.8, 1.0]
        };
        Ok(TravelConfig {
            enabled: params.get_flag("enable_travel")?,
            trip_rate: params.get_or("travel_trip_rate", 0.0)?,
            outside_fraction: params.get_or("travel_outside_fraction", 0.2)?,
            travel_age_prob: params.get_age_map("travel_age_prob")?,
            duration_cdf,
        })
    }
}

/// Short-term travel: trips substitute the traveler's home/work tuple with
/// the host's until the queued return day
pub struct TravelModel {
    config: TravelConfig,
    return_queue: HashMap<u32, Vec<PersonId>>,
}

impl TravelModel {
    pub fn new(config: TravelConfig) -> TravelModel {
        TravelModel {
            config,
            return_queue: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Initiates today's trips, then brings home everyone due back
    pub fn update(&mut self, day: u32, population: &mut Population, seed: u64) {
        if !self.config.enabled {
            return;
        }
        let mut rng = substream(seed, STREAM_TRAVEL, 0, day as u64);
        let population_size = population.size();
        if population_size > 1 {
            let trips = stochastic_round(&mut rng, population_size as f64 * self.config.trip_rate);
            let mut started = 0;
            for _ in 0..trips {
                // select a willing traveler, by age
                let mut traveler = None;
                for _ in 0..100 {
                    let candidate = PersonId(rng.gen_range(0..population_size) as u32);
                    let person = population.person(candidate);
                    if !person.alive || person.is_traveling || person.is_hospitalized {
                        continue;
                    }
                    let age_prob = self.config.travel_age_prob.find_value(person.age);
                    if age_prob > 0.0 && rng.gen::<f64>() < age_prob {
                        traveler = Some(candidate);
                        break;
                    }
                }
                let traveler = match traveler {
                    Some(traveler) => traveler,
                    None => continue,
                };

                if rng.gen::<f64>() < self.config.outside_fraction {
                    start_traveling_outside(population.person_mut(traveler));
                } else {
                    // find a host living in a different household
                    let mut host_places = None;
                    for _ in 0..100 {
                        let candidate = PersonId(rng.gen_range(0..population_size) as u32);
                        let host = population.person(candidate);
                        if !host.alive || host.is_traveling || candidate == traveler {
                            continue;
                        }
                        if host.household() == population.person(traveler).household() {
                            continue;
                        }
                        host_places = Some(host.favorite_places.clone());
                        break;
                    }
                    match host_places {
                        Some(host_places) => {
                            start_traveling(population.person_mut(traveler), &host_places)
                        }
                        None => continue,
                    }
                }

                let duration = draw_from_cdf(&mut rng, &self.config.duration_cdf) as u32 + 1;
                let return_day = day + duration;
                population.person_mut(traveler).return_from_travel_day = return_day as i32;
                self.return_queue.entry(return_day).or_default().push(traveler);
                started += 1;
            }
            if started > 0 {
                debug!("Day {}: {} travelers departed", day, started);
            }
        }

        // process travelers who are returning home
        if let Some(returning) = self.return_queue.remove(&day) {
            debug!("Day {}: {} travelers returning", day, returning.len());
            for person_id in returning {
                let person = population.person_mut(person_id);
                // terminated people were already restored
                if person.alive && person.is_traveling {
                    stop_traveling(person);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::activities::{start_traveling, start_traveling_outside, stop_traveling};
    use crate::models::person::{ActivityProfile, ActivitySlot, Person, PersonId};
    use crate::models::place::PlaceId;

    use load_population::records::Sex;

    fn worker(id: u32) -> Person {
        let mut person = Person::new(
            PersonId(id),
            format!("P{}", id),
            30,
            Sex::Female,
            1,
            0,
            1,
        );
        person.profile = ActivityProfile::Worker;
        person.favorite_places[ActivitySlot::Household] = Some(PlaceId(id));
        person.favorite_places[ActivitySlot::Neighborhood] = Some(PlaceId(id + 10));
        person.favorite_places[ActivitySlot::Workplace] = Some(PlaceId(id + 20));
        person
    }

    #[test]
    fn travel_round_trip_is_the_identity_on_favorite_places() {
        let mut traveler = worker(0);
        let host = worker(1);
        let before = traveler.favorite_places.clone();
        start_traveling(&mut traveler, &host.favorite_places);
        assert!(traveler.is_traveling);
        assert_eq!(
            traveler.favorite_places[ActivitySlot::Household],
            Some(PlaceId(1))
        );
        assert_eq!(
            traveler.favorite_places[ActivitySlot::Workplace],
            Some(PlaceId(21))
        );
        stop_traveling(&mut traveler);
        assert!(!traveler.is_traveling);
        assert_eq!(traveler.favorite_places, before);
    }

    #[test]
    fn outside_travel_clears_every_slot() {
        let mut traveler = worker(0);
        let before = traveler.favorite_places.clone();
        start_traveling_outside(&mut traveler);
        assert!(traveler.is_traveling_outside);
        assert!(traveler.favorite_places.values().all(Option::is_none));
        stop_traveling(&mut traveler);
        assert_eq!(traveler.favorite_places, before);
    }

    #[test]
    fn non_workers_do_not_borrow_the_hosts_workplace() {
        let mut traveler = worker(0);
        traveler.profile = ActivityProfile::Retired;
        let host = worker(1);
        start_traveling(&mut traveler, &host.favorite_places);
        assert_eq!(traveler.favorite_places[ActivitySlot::Workplace], None);
        assert_eq!(
            traveler.favorite_places[ActivitySlot::Household],
            Some(PlaceId(1))
        );
    }

    #[test]
    fn hospitalized_people_do_not_travel() {
        let mut traveler = worker(0);
        traveler.is_hospitalized = true;
        let host = worker(1);
        start_traveling(&mut traveler, &host.favorite_places);
        assert!(!traveler.is_traveling);
        assert!(traveler.saved_places.is_none());
    }
}
