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

use rand::rngs::SmallRng;
use rand::Rng;

use crate::params::Params;
use crate::random::stochastic_round;
use crate::SimError;

/// Pupal development time in days by water temperature, after Focks
const TEMPERATURES: [f64; 8] = [15.0, 20.0, 22.0, 24.0, 26.0, 28.0, 30.0, 32.0];
const DEVELOPMENT_TIMES: [f64; 8] = [8.49, 3.11, 4.06, 3.3, 2.66, 2.04, 1.46, 0.92];

/// Mosquito population parameters shared by every place
#[derive(Clone, Debug)]
pub struct VectorConfig {
    pub infection_efficiency: f64,
    pub transmission_efficiency: f64,
    pub bite_rate: f64,
    pub death_rate: f64,
    pub birth_rate: f64,
    pub incubation_rate: f64,
    pub pupae_per_host: f64,
    pub life_span: f64,
    pub success_rate: f64,
    pub female_ratio: f64,
    pub temperature: f64,
    /// Fraction of susceptible vectors born infectious during the seeding window
    pub seeds: f64,
    pub day_start_seed: u32,
    pub day_end_seed: u32,
}

impl VectorConfig {
    pub fn from_params(params: &Params) -> Result<VectorConfig, SimError> {
        Ok(VectorConfig {
            infection_efficiency: params.get_or("vector_infection_efficiency", 0.2)?,
            transmission_efficiency: params.get_or("vector_transmission_efficiency", 0.3)?,
            bite_rate: params.get_or("vector_bite_rate", 0.76)?,
            death_rate: params.get_or("vector_death_rate", 1.0 / 18.0)?,
            birth_rate: params.get_or("vector_birth_rate", 1.0 / 18.0)?,
            incubation_rate: params.get_or("vector_incubation_rate", 1.0 / 11.0)?,
            pupae_per_host: params.get_or("vector_pupae_per_host", 1.02)?,
            life_span: params.get_or("vector_life_span", 18.0)?,
            success_rate: params.get_or("vector_success_rate", 0.83)?,
            female_ratio: params.get_or("vector_female_ratio", 0.5)?,
            temperature: params.get_or("vector_temperature", 26.0)?,
            seeds: params.get_or("mosquito_seeds", 0.0)?,
            day_start_seed: params.get_or("vector_day_start_seed", 0)?,
            day_end_seed: params.get_or("vector_day_end_seed", 0)?,
        })
    }

    /// Interpolated development time for the configured temperature
    fn development_time(&self) -> f64 {
        let temperature = self.temperature.min(32.0);
        let mut development = 1.0;
        for window in 1..TEMPERATURES.len() {
            if temperature <= TEMPERATURES[window] {
                let t0 = TEMPERATURES[window - 1];
                let t1 = TEMPERATURES[window];
                let d0 = DEVELOPMENT_TIMES[window - 1];
                let d1 = DEVELOPMENT_TIMES[window];
                development = d0 + (d1 - d0) / (t1 - t0) * (temperature - t0);
                break;
            }
        }
        development
    }

    /// Female vectors per host; zero below the 18 degree threshold
    pub fn vectors_per_host(&self) -> f64 {
        if self.temperature <= 18.0 {
            return 0.0;
        }
        self.pupae_per_host * self.female_ratio * self.success_rate * self.life_span
            / self.development_time()
    }

    pub fn seeds_active(&self, day: u32) -> f64 {
        if day < self.day_start_seed || day > self.day_end_seed {
            0.0
        } else {
            self.seeds
        }
    }
}

/// Per place mosquito compartments: susceptible vectors plus per-disease
/// exposed and infectious counts
#[derive(Clone, Debug, Default)]
pub struct VectorState {
    pub s_vectors: i64,
    pub e_vectors: Vec<i64>,
    pub i_vectors: Vec<i64>,
    pub n_vectors: i64,
    /// Unique human visitors seen today, the denominator of the bite rates
    pub n_hosts: u32,
    pub vectors_infected_today: bool,
}

impl VectorState {
    pub fn new(config: &VectorConfig, orig_hosts: u32, n_diseases: usize) -> VectorState {
        let n_vectors = (f64::from(orig_hosts) * config.vectors_per_host()) as i64;
        VectorState {
            s_vectors: n_vectors,
            e_vectors: vec![0; n_diseases],
            i_vectors: vec![0; n_diseases],
            n_vectors,
            n_hosts: 0,
            vectors_infected_today: false,
        }
    }

    pub fn has_infectious_vectors(&self) -> bool {
        self.i_vectors.iter().any(|count| *count > 0)
    }

    /// Infects vectors from today's infectious hosts, splitting the new
    /// infections across diseases by host share (Chao and Longini)
    pub fn infect_vectors(&mut self, config: &VectorConfig, infectious_hosts: &[usize]) {
        if self.s_vectors == 0 || self.vectors_infected_today {
            return;
        }
        let total_infectious: usize = infectious_hosts.iter().sum();
        if total_infectious == 0 || self.n_hosts == 0 {
            return;
        }
        self.vectors_infected_today = true;
        let prob_infection = 1.0
            - (1.0 - config.infection_efficiency)
                .powf(config.bite_rate * total_infectious as f64 / f64::from(self.n_hosts));
        let total_infections = (prob_infection * self.s_vectors as f64) as i64;
        for (disease, hosts) in infectious_hosts.iter().enumerate() {
            let strain_infections =
                (total_infections as f64 * (*hosts as f64 / total_infectious as f64)) as i64;
            self.e_vectors[disease] += strain_infections;
            self.s_vectors -= strain_infections;
        }
    }

    /// How many host exposures today's infectious vectors produce
    pub fn host_exposures(
        &self,
        config: &VectorConfig,
        disease: usize,
        susceptible_hosts: usize,
        rng: &mut SmallRng,
    ) -> u32 {
        if susceptible_hosts == 0
            || self.i_vectors[disease] == 0
            || self.n_hosts == 0
            || config.transmission_efficiency == 0.0
        {
            return 0;
        }
        let prob_infection = 1.0
            - (1.0 - config.transmission_efficiency).powf(
                config.bite_rate * self.i_vectors[disease] as f64 / f64::from(self.n_hosts),
            );
        stochastic_round(rng, susceptible_hosts as f64 * prob_infection)
    }

    /// Daily birth, death, seeding and maturation of the compartments
    pub fn update_population(&mut self, config: &VectorConfig, day: u32, rng: &mut SmallRng) {
        if self.n_vectors <= 0 {
            return;
        }
        // new vectors are born susceptible
        self.s_vectors += ((config.birth_rate * self.n_vectors as f64)
            - (config.death_rate * self.s_vectors as f64))
            .floor() as i64;
        // but some are born infectious during the seeding window
        let seeds = config.seeds_active(day);
        let mut born_infectious = vec![0_i64; self.e_vectors.len()];
        for born in born_infectious.iter_mut() {
            *born = (self.s_vectors as f64 * seeds).ceil() as i64;
            self.s_vectors -= *born;
        }
        if self.s_vectors < 0 {
            self.s_vectors = 0;
        }
        self.n_vectors = self.s_vectors;
        for disease in 0..self.e_vectors.len() {
            // exposed vectors die or mature; small counts are drawn one by one
            self.e_vectors[disease] -=
                small_count_events(self.e_vectors[disease], config.death_rate, rng);
            let become_infectious =
                small_count_events(self.e_vectors[disease], config.incubation_rate, rng);
            self.e_vectors[disease] = (self.e_vectors[disease] - become_infectious).max(0);
            self.i_vectors[disease] -=
                (config.death_rate * self.i_vectors[disease] as f64).floor() as i64;
            self.i_vectors[disease] += become_infectious + born_infectious[disease];
            if self.i_vectors[disease] < 0 {
                self.i_vectors[disease] = 0;
            }
            self.n_vectors += self.e_vectors[disease] + self.i_vectors[disease];
        }
        self.vectors_infected_today = false;
        self.n_hosts = 0;
    }
}

/// Events out of `count` at `rate`; exact draws for small counts
fn small_count_events(count: i64, rate: f64, rng: &mut SmallRng) -> i64 {
    if count < 10 {
        let mut events = 0;
        for _ in 0..count {
            if rng.gen::<f64>() < rate {
                events += 1;
            }
        }
        events
    } else {
        (rate * count as f64).floor() as i64
    }
}

#[cfg(test)]
mod tests {
    use crate::params::Params;
    use crate::random::{substream, STREAM_SPREAD};

    use super::{VectorConfig, VectorState};

    fn config(seeds: f64, end: u32) -> VectorConfig {
        let mut params = Params::new();
        params.set("mosquito_seeds", &seeds.to_string());
        params.set("vector_day_start_seed", "0");
        params.set("vector_day_end_seed", &end.to_string());
        VectorConfig::from_params(&params).unwrap()
    }

    #[test]
    fn cold_places_have_no_vectors() {
        let mut params = Params::new();
        params.set("vector_temperature", "15");
        let config = VectorConfig::from_params(&params).unwrap();
        assert_eq!(config.vectors_per_host(), 0.0);
        let state = VectorState::new(&config, 100, 1);
        assert_eq!(state.n_vectors, 0);
    }

    #[test]
    fn seeding_window_produces_infectious_vectors() {
        let config = config(0.1, 4);
        let mut state = VectorState::new(&config, 4, 1);
        assert!(state.n_vectors > 0);
        let mut rng = substream(11, STREAM_SPREAD, 0, 0);
        for day in 0..5 {
            state.update_population(&config, day, &mut rng);
        }
        assert!(
            state.has_infectious_vectors(),
            "seeding for 5 days should infect some vectors: {:?}",
            state
        );
        // outside the window no further seeds arrive
        assert_eq!(config.seeds_active(5), 0.0);
    }

    #[test]
    fn infectious_hosts_infect_vectors() {
        let config = config(0.0, 0);
        let mut state = VectorState::new(&config, 100, 2);
        state.n_hosts = 100;
        let initial_s = state.s_vectors;
        state.infect_vectors(&config, &[10, 0]);
        assert!(state.e_vectors[0] > 0);
        assert_eq!(state.e_vectors[1], 0);
        assert_eq!(state.s_vectors + state.e_vectors[0], initial_s);
        // a second call on the same day is a no-op
        let exposed = state.e_vectors[0];
        state.infect_vectors(&config, &[10, 0]);
        assert_eq!(state.e_vectors[0], exposed);
    }

    #[test]
    fn infectious_vectors_expose_hosts() {
        let config = config(0.0, 0);
        let mut state = VectorState::new(&config, 50, 1);
        state.n_hosts = 50;
        state.i_vectors[0] = 40;
        let mut rng = substream(3, STREAM_SPREAD, 1, 0);
        let exposures = state.host_exposures(&config, 0, 30, &mut rng);
        assert!(exposures > 0);
        assert_eq!(state.host_exposures(&config, 0, 0, &mut rng), 0);
    }
}
