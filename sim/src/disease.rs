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

use enum_map::EnumMap;
use rand::rngs::SmallRng;
use rand::Rng;
use strum::IntoEnumIterator;

use crate::models::health::{HealthState, HealthStatus};
use crate::models::place::PlaceKind;
use crate::params::{AgeMap, Params};
use crate::SimError;

/// Per place kind contact transmission probabilities between age groups
///
/// Group bounds are inclusive upper ages; the matrix is square in the
/// number of groups. The default is a single group with probability 1
#[derive(Clone, Debug)]
pub struct ContactProbMatrix {
    age_bounds: Vec<u32>,
    probs: Vec<Vec<f64>>,
}

impl Default for ContactProbMatrix {
    fn default() -> Self {
        ContactProbMatrix {
            age_bounds: vec![u32::MAX],
            probs: vec![vec![1.0]],
        }
    }
}

impl ContactProbMatrix {
    pub fn new(age_bounds: Vec<u32>, probs: Vec<Vec<f64>>) -> ContactProbMatrix {
        assert_eq!(age_bounds.len(), probs.len());
        ContactProbMatrix { age_bounds, probs }
    }

    fn group_for(&self, age: u32) -> usize {
        self.age_bounds
            .iter()
            .position(|bound| age <= *bound)
            .unwrap_or(self.age_bounds.len() - 1)
    }

    pub fn prob(&self, infector_age: u32, infectee_age: u32) -> f64 {
        self.probs[self.group_for(infectee_age)][self.group_for(infector_age)]
    }
}

/// One circulating disease: transmission parameters plus the simple
/// exposure -> infectious -> recovered progression collaborator
#[derive(Clone, Debug)]
pub struct Disease {
    id: usize,
    pub name: String,
    pub transmissibility: f64,
    pub contacts_per_day: EnumMap<PlaceKind, f64>,
    /// Neighborhood contact multiplier applied on weekends
    pub weekend_contact_rate: f64,
    pub contact_prob: EnumMap<PlaceKind, ContactProbMatrix>,
    /// Days from exposure to infectiousness
    pub latent_days: u32,
    pub infectious_days: u32,
    /// Days from infectiousness to symptom onset
    pub days_to_symptoms: u32,
    pub prob_symptomatic: f64,
    pub asymptomatic_infectivity: f64,
    /// Added to the age baseline when deciding to seek healthcare
    pub hospitalization_prob: AgeMap,
    pub outpatient_healthcare_prob: AgeMap,
    /// Transmission multiplier when the infector wears a face mask
    pub face_mask_transmission_modifier: f64,
    /// Susceptibility multiplier when the infectee washes hands
    pub hand_washing_susceptibility_modifier: f64,
    /// Initial exposures seeded on day 0
    pub primary_cases: u32,
}

impl Disease {
    pub fn from_params(id: usize, params: &Params) -> Result<Disease, SimError> {
        let name = params.get_indexed_or("disease_name", id, format!("disease{}", id))?;
        let mut contacts_per_day = EnumMap::default();
        let mut contact_prob: EnumMap<PlaceKind, ContactProbMatrix> = EnumMap::default();
        for kind in PlaceKind::iter() {
            let prefix = match kind {
                PlaceKind::Household => "household",
                PlaceKind::Neighborhood => "neighborhood",
                PlaceKind::School => "school",
                PlaceKind::Classroom => "classroom",
                PlaceKind::Workplace => "workplace",
                PlaceKind::Office => "office",
                PlaceKind::Hospital => "hospital",
            };
            contacts_per_day[kind] =
                params.get_indexed_or(&format!("{}_contacts", prefix), id, 0.0)?;
            let groups_key = format!("{}_prob_groups[{}]", prefix, id);
            if params.contains(&groups_key) {
                let bounds: Vec<u32> = params.get_list(&groups_key)?;
                let values: Vec<f64> =
                    params.get_list(&format!("{}_prob_values[{}]", prefix, id))?;
                if values.len() != bounds.len() * bounds.len() {
                    return Err(SimError::Configuration {
                        key: groups_key,
                        message: format!(
                            "Expected {} matrix entries, found {}",
                            bounds.len() * bounds.len(),
                            values.len()
                        ),
                    });
                }
                let probs = values
                    .chunks(bounds.len())
                    .map(|row| row.to_vec())
                    .collect();
                contact_prob[kind] = ContactProbMatrix::new(bounds, probs);
            }
        }
        Ok(Disease {
            id,
            name,
            transmissibility: params.get_indexed_or("transmissibility", id, 1.0)?,
            contacts_per_day,
            weekend_contact_rate: params.get_indexed_or("weekend_contact_rate", id, 1.5)?,
            contact_prob,
            latent_days: params.get_indexed_or("latent_days", id, 2)?,
            infectious_days: params.get_indexed_or("infectious_days", id, 6)?,
            days_to_symptoms: params.get_indexed_or("days_to_symptoms", id, 1)?,
            prob_symptomatic: params.get_indexed_or("prob_symptomatic", id, 0.67)?,
            asymptomatic_infectivity: params.get_indexed_or("asymptomatic_infectivity", id, 0.5)?,
            hospitalization_prob: params
                .get_age_map(&format!("hospitalization_prob[{}]", id))?,
            outpatient_healthcare_prob: params
                .get_age_map(&format!("outpatient_healthcare_prob[{}]", id))?,
            face_mask_transmission_modifier: params
                .get_indexed_or("face_mask_transmission_modifier", id, 1.0)?,
            hand_washing_susceptibility_modifier: params
                .get_indexed_or("hand_washing_susceptibility_modifier", id, 1.0)?,
            primary_cases: params.get_indexed_or("primary_cases", id, 0)?,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// How infectious this person is today, 0 when not infectious
    pub fn infectivity(&self, health: &HealthState) -> f64 {
        if !health.is_infectious() {
            return 0.0;
        }
        if health.is_symptomatic() {
            1.0
        } else {
            self.asymptomatic_infectivity
        }
    }

    pub fn susceptibility(&self, health: &HealthState) -> f64 {
        if health.is_susceptible() {
            1.0
        } else {
            0.0
        }
    }

    pub fn transmission_prob(&self, kind: PlaceKind, infector_age: u32, infectee_age: u32) -> f64 {
        self.contact_prob[kind].prob(infector_age, infectee_age)
    }

    /// Advances the exposure -> infectious -> recovered timeline by one day
    pub fn update_health(&self, health: &mut HealthState, day: u32) {
        match health.status {
            HealthStatus::Exposed => {
                if day as i32 - health.exposure_day >= self.latent_days as i32 {
                    health.status = HealthStatus::Infectious;
                    health.infectious_day = day as i32;
                    if health.will_be_symptomatic && self.days_to_symptoms == 0 {
                        health.symptoms_day = day as i32;
                    }
                }
            }
            HealthStatus::Infectious => {
                if health.will_be_symptomatic
                    && health.symptoms_day < 0
                    && day as i32 - health.infectious_day >= self.days_to_symptoms as i32
                {
                    health.symptoms_day = day as i32;
                }
                if day as i32 - health.infectious_day >= self.infectious_days as i32 {
                    health.status = HealthStatus::Recovered;
                }
            }
            _ => {}
        }
    }

    /// Draws whether a fresh infection will turn symptomatic
    pub fn draw_symptomatic(&self, rng: &mut SmallRng) -> bool {
        rng.gen::<f64>() < self.prob_symptomatic
    }
}

#[cfg(test)]
mod tests {
    use crate::models::health::{HealthState, HealthStatus};
    use crate::models::place::PlaceKind;
    use crate::params::Params;

    use super::{ContactProbMatrix, Disease};

    fn disease() -> Disease {
        let mut params = Params::new();
        params.set("latent_days[0]", "2");
        params.set("infectious_days[0]", "4");
        params.set("days_to_symptoms[0]", "1");
        Disease::from_params(0, &params).unwrap()
    }

    #[test]
    fn progression_follows_the_configured_timeline() {
        let disease = disease();
        let mut health = HealthState::default();
        health.become_exposed(3, None, None, true);
        disease.update_health(&mut health, 4);
        assert_eq!(health.status, HealthStatus::Exposed);
        disease.update_health(&mut health, 5);
        assert_eq!(health.status, HealthStatus::Infectious);
        assert!(!health.is_symptomatic());
        disease.update_health(&mut health, 6);
        assert!(health.is_symptomatic());
        disease.update_health(&mut health, 9);
        assert_eq!(health.status, HealthStatus::Recovered);
        assert!(!health.is_symptomatic());
        assert!(health.ever_exposed());
    }

    #[test]
    fn asymptomatic_cases_shed_less() {
        let disease = disease();
        let mut health = HealthState::default();
        health.become_exposed(0, None, None, false);
        disease.update_health(&mut health, 2);
        assert!(health.is_infectious());
        assert!((disease.infectivity(&health) - 0.5).abs() < 1e-12);
        assert!((disease.susceptibility(&health) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn contact_matrix_groups_by_age() {
        let matrix = ContactProbMatrix::new(
            vec![17, u32::MAX],
            vec![vec![0.8, 0.3], vec![0.2, 0.5]],
        );
        // infectee age selects the row, infector age the column
        assert!((matrix.prob(10, 12) - 0.8).abs() < 1e-12);
        assert!((matrix.prob(40, 12) - 0.3).abs() < 1e-12);
        assert!((matrix.prob(10, 40) - 0.2).abs() < 1e-12);
        assert!((matrix.prob(40, 40) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn default_matrix_is_uniform() {
        let disease = disease();
        assert!((disease.transmission_prob(PlaceKind::Household, 5, 80) - 1.0).abs() < 1e-12);
    }
}
