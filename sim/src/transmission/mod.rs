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

pub mod vector;

use lazy_static::lazy_static;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use crate::config::MAX_AGE;
use crate::disease::Disease;
use crate::models::person::{Person, PersonId};
use crate::models::place::{PlaceId, PlaceKind};
use crate::params::Params;
use crate::population::ExposureLatches;
use crate::random::stochastic_round;
use crate::registry::{PlaceRegistry, PlaceWork};
use crate::seasonality::Seasonality;
use crate::transmission::vector::VectorConfig;
use crate::SimError;

lazy_static! {
    /// POLYMOD style age mixing matrix: strong on the diagonal band,
    /// a low background rate everywhere else
    static ref PROB_CONTACT: Vec<Vec<f64>> = {
        let mut matrix = vec![vec![0.05; MAX_AGE + 1]; MAX_AGE + 1];
        for i in 0..=MAX_AGE {
            for j in i.saturating_sub(4)..=(i + 4).min(MAX_AGE) {
                matrix[i][j] = 1.0 - 0.2 * (i as f64 - j as f64).abs();
            }
        }
        matrix
    };
}

/// Which transmission models are switched on for this run
#[derive(Clone, Debug, Default)]
pub struct TransmissionConfig {
    pub enable_density_transmission: bool,
    pub enable_max_infectees: bool,
    pub max_infectees_per_source: u32,
    pub enable_age_structured: bool,
    pub enable_vector: bool,
}

impl TransmissionConfig {
    pub fn from_params(params: &Params) -> Result<TransmissionConfig, SimError> {
        Ok(TransmissionConfig {
            enable_density_transmission: params
                .get_flag("enable_neighborhood_density_transmission")?,
            enable_max_infectees: params.get_flag("enable_density_transmission_maximum_infectees")?,
            max_infectees_per_source: params.get_or("density_transmission_maximum_infectees", 10)?,
            enable_age_structured: params.get_flag("enable_age_structured_transmission")?,
            enable_vector: params.get_flag("enable_vector_transmission")?,
        })
    }
}

/// A new exposure produced by the sweep, applied after the place phase
#[derive(Clone, Debug)]
pub struct Exposure {
    pub infectee: PersonId,
    pub infector: Option<PersonId>,
    pub place: PlaceId,
    pub disease: usize,
    pub from_vector: bool,
}

/// The outcome of sweeping one registered place
#[derive(Default)]
pub struct SpreadResult {
    pub exposures: Vec<Exposure>,
    /// Whether any disease passed the gates, recording an infectious day
    pub active: bool,
}

/// Shared read-only context for the parallel place phase
pub struct SpreadContext<'a> {
    pub registry: &'a PlaceRegistry,
    pub people: &'a [Person],
    pub diseases: &'a [Disease],
    pub latches: &'a ExposureLatches,
    pub day: u32,
    pub day_of_year: u32,
    pub weekend: bool,
}

pub struct TransmissionEngine {
    pub config: TransmissionConfig,
    pub seasonality: Seasonality,
    pub vector_config: Option<VectorConfig>,
}

impl TransmissionEngine {
    pub fn new(
        config: TransmissionConfig,
        seasonality: Seasonality,
        vector_config: Option<VectorConfig>,
    ) -> TransmissionEngine {
        TransmissionEngine {
            config,
            seasonality,
            vector_config,
        }
    }

    /// Sweeps one infectious place, producing the day's exposures there
    ///
    /// Visitor lists arrive sorted; every tie-break goes through `rng`,
    /// a substream keyed by (place, day)
    pub fn spread(
        &self,
        work: &mut PlaceWork,
        ctx: &SpreadContext,
        rng: &mut SmallRng,
    ) -> SpreadResult {
        let mut result = SpreadResult::default();
        let place = ctx.registry.place(work.place);

        // the vector pathway aggregates infectious hosts over every disease
        let infectious_hosts: Vec<usize> = if self.config.enable_vector {
            let mut counts = vec![0_usize; ctx.registry.n_diseases()];
            for (d, state) in &work.diseases {
                counts[*d] = state.infectious.len();
            }
            counts
        } else {
            Vec::new()
        };

        for index in 0..work.diseases.len() {
            let d = work.diseases[index].0;
            let disease = &ctx.diseases[d];
            if disease.transmissibility == 0.0 {
                continue;
            }
            if !ctx.registry.is_open(work.place, ctx.day)
                || !ctx.registry.should_be_open(work.place, ctx.day, d)
            {
                continue;
            }
            result.active = true;

            if self.config.enable_vector {
                if let (Some(config), Some(vector)) = (&self.vector_config, work.vector.as_mut()) {
                    let state = &mut work.diseases[index].1;
                    let visitors = state.susceptibles.len()
                        + state.infectious.len()
                        + state.other_visitors as usize;
                    vector.n_hosts = vector.n_hosts.max(visitors as u32);
                    vector.infect_vectors(config, &infectious_hosts);
                    let e_hosts =
                        vector.host_exposures(config, d, state.susceptibles.len(), rng) as usize;
                    state.susceptibles.shuffle(rng);
                    for infectee in state.susceptibles.iter().take(e_hosts) {
                        if ctx.people[infectee.index()].health[d].is_susceptible()
                            && ctx.latches.try_claim(*infectee, d, ctx.day)
                        {
                            result.exposures.push(Exposure {
                                infectee: *infectee,
                                infector: None,
                                place: work.place,
                                disease: d,
                                from_vector: true,
                            });
                        }
                    }
                }
                continue;
            }

            let state = &mut work.diseases[index].1;
            if state.susceptibles.is_empty() {
                continue;
            }
            let contact_rate = self.contact_rate(place.kind(), disease, ctx.weekend);
            let exposures = match place.kind() {
                PlaceKind::Household => self.pairwise_model(work.place, d, contact_rate, ctx, rng),
                PlaceKind::Neighborhood if self.config.enable_density_transmission => self
                    .density_model(
                        work.place,
                        d,
                        contact_rate,
                        &mut state.susceptibles,
                        &mut state.infectious,
                        ctx,
                        rng,
                    ),
                PlaceKind::Neighborhood => self.default_model(
                    work.place,
                    d,
                    contact_rate,
                    &state.susceptibles,
                    &mut state.infectious,
                    ctx,
                    rng,
                ),
                _ if self.config.enable_age_structured => self.age_structured_model(
                    work.place,
                    d,
                    &mut state.susceptibles,
                    &mut state.infectious,
                    ctx,
                    rng,
                ),
                _ => self.default_model(
                    work.place,
                    d,
                    contact_rate,
                    &state.susceptibles,
                    &mut state.infectious,
                    ctx,
                    rng,
                ),
            };
            result.exposures.extend(exposures);
        }
        result
    }

    /// Expected susceptible contacts per infectious visitor
    fn contact_rate(&self, kind: PlaceKind, disease: &Disease, weekend: bool) -> f64 {
        let mut contacts = disease.contacts_per_day[kind] * disease.transmissibility;
        // neighborhood mixing intensifies on weekends
        if kind == PlaceKind::Neighborhood && weekend {
            contacts *= disease.weekend_contact_rate;
        }
        contacts
    }

    /// One infector/infectee transmission attempt behind the per-day latch
    #[allow(clippy::too_many_arguments)]
    fn attempt_transmission(
        &self,
        transmission_prob: f64,
        infector: Option<&Person>,
        infectee: PersonId,
        place: PlaceId,
        disease_id: usize,
        ctx: &SpreadContext,
        rng: &mut SmallRng,
        out: &mut Vec<Exposure>,
    ) -> bool {
        let disease = &ctx.diseases[disease_id];
        let target = &ctx.people[infectee.index()];
        let health = &target.health[disease_id];
        if !health.is_susceptible() {
            return false;
        }
        let mut susceptibility = disease.susceptibility(health);
        if target.washes_hands {
            susceptibility *= disease.hand_washing_susceptibility_modifier;
        }
        let mut transmission_prob = transmission_prob;
        if let Some(infector) = infector {
            if infector.wears_face_mask {
                transmission_prob *= disease.face_mask_transmission_modifier;
            }
        }
        if self.seasonality.is_enabled() {
            transmission_prob *= self.seasonality.multiplier(ctx.day_of_year);
        }
        let infection_prob = transmission_prob * susceptibility;
        if rng.gen::<f64>() < infection_prob && ctx.latches.try_claim(infectee, disease_id, ctx.day)
        {
            out.push(Exposure {
                infectee,
                infector: infector.map(Person::id),
                place,
                disease: disease_id,
                from_vector: false,
            });
            return true;
        }
        false
    }

    /// The Chao style default model with larger-than-visible target sampling
    #[allow(clippy::too_many_arguments)]
    fn default_model(
        &self,
        place_id: PlaceId,
        d: usize,
        contact_rate: f64,
        susceptibles: &[PersonId],
        infectious: &mut Vec<PersonId>,
        ctx: &SpreadContext,
        rng: &mut SmallRng,
    ) -> Vec<Exposure> {
        let mut exposures = Vec::new();
        let place = ctx.registry.place(place_id);
        let disease = &ctx.diseases[d];
        // contacts can land on enrolled members who are not visiting today
        let number_targets = (place.size().saturating_sub(1) as usize).max(susceptibles.len());
        infectious.shuffle(rng);

        for infector_id in infectious.iter() {
            let infector = &ctx.people[infector_id.index()];
            let infectivity = disease.infectivity(&infector.health[d]);
            let contact_count = stochastic_round(rng, contact_rate * infectivity);

            let mut sampling: BTreeMap<usize, u32> = BTreeMap::new();
            let mut contact = 0;
            while contact < contact_count {
                contact += 1;
                let pos = rng.gen_range(0..number_targets);
                if pos >= susceptibles.len() {
                    // wasted contact: landed on the invisible remainder
                    continue;
                }
                if susceptibles[pos] == *infector_id {
                    if susceptibles.len() > 1 {
                        contact -= 1; // redraw
                        continue;
                    }
                    break; // nobody else to contact
                }
                *sampling.entry(pos).or_insert(0) += 1;
            }

            for (pos, times_drawn) in sampling {
                let infectee = susceptibles[pos];
                let transmission_prob = disease.transmission_prob(
                    place.kind(),
                    infector.age,
                    ctx.people[infectee.index()].age,
                );
                for _ in 0..times_drawn {
                    self.attempt_transmission(
                        transmission_prob,
                        Some(infector),
                        infectee,
                        place_id,
                        d,
                        ctx,
                        rng,
                        &mut exposures,
                    );
                }
            }
        }
        exposures
    }

    /// Household transmission: every infector meets every housemate
    fn pairwise_model(
        &self,
        place_id: PlaceId,
        d: usize,
        contact_prob: f64,
        ctx: &SpreadContext,
        rng: &mut SmallRng,
    ) -> Vec<Exposure> {
        let mut exposures = Vec::new();
        let place = ctx.registry.place(place_id);
        let disease = &ctx.diseases[d];
        let mut enrollees = place.enrollees.clone();
        enrollees.sort_unstable();
        enrollees.shuffle(rng);

        for infector_pos in 0..enrollees.len() {
            let infector = &ctx.people[enrollees[infector_pos].index()];
            if !infector.health[d].is_infectious() {
                continue;
            }
            let infectivity = disease.infectivity(&infector.health[d]);
            for pos in 0..enrollees.len() {
                if pos == infector_pos {
                    continue;
                }
                let infectee = enrollees[pos];
                if !ctx.people[infectee.index()].health[d].is_susceptible() {
                    continue;
                }
                let pair_prob = disease.transmission_prob(
                    place.kind(),
                    infector.age,
                    ctx.people[infectee.index()].age,
                );
                self.attempt_transmission(
                    pair_prob * infectivity * contact_prob,
                    Some(infector),
                    infectee,
                    place_id,
                    d,
                    ctx,
                    rng,
                    &mut exposures,
                );
            }
        }
        exposures
    }

    /// Density limited neighborhood model with per-source saturation
    #[allow(clippy::too_many_arguments)]
    fn density_model(
        &self,
        place_id: PlaceId,
        d: usize,
        contact_rate: f64,
        susceptibles: &mut Vec<PersonId>,
        infectious: &mut Vec<PersonId>,
        ctx: &SpreadContext,
        rng: &mut SmallRng,
    ) -> Vec<Exposure> {
        let mut exposures = Vec::new();
        let disease = &ctx.diseases[d];
        let sus_hosts = susceptibles.len();
        let mut inf_hosts = infectious.len();
        if inf_hosts == 0 {
            return exposures;
        }

        // each host's chance of at least one infectious contact
        let prob_infection = 1.0 - (1.0 - contact_rate).powi(inf_hosts as i32);
        let exposed = stochastic_round(rng, sus_hosts as f64 * prob_infection) as usize;

        let mut infectee_count = vec![0_u32; inf_hosts];
        susceptibles.shuffle(rng);

        for infectee in susceptibles.iter().take(exposed.min(sus_hosts)) {
            if inf_hosts == 0 {
                break;
            }
            let health = &ctx.people[infectee.index()].health[d];
            if !health.is_susceptible() || ctx.latches.claimed(*infectee, d, ctx.day) {
                continue;
            }
            let infector_pos = rng.gen_range(0..inf_hosts);
            let infector = &ctx.people[infectious[infector_pos].index()];
            let transmission_prob = disease.infectivity(&infector.health[d]);
            if self.attempt_transmission(
                transmission_prob,
                Some(infector),
                *infectee,
                place_id,
                d,
                ctx,
                rng,
                &mut exposures,
            ) {
                infectee_count[infector_pos] += 1;
                // a saturated infector is swap-removed from the live pool,
                // carrying its counter along
                if self.config.enable_max_infectees
                    && self.config.max_infectees_per_source <= infectee_count[infector_pos]
                {
                    infectious.swap(infector_pos, inf_hosts - 1);
                    infectee_count.swap(infector_pos, inf_hosts - 1);
                    inf_hosts -= 1;
                }
            }
        }
        exposures
    }

    /// Age structured force-of-infection model over integer age buckets
    #[allow(clippy::too_many_arguments)]
    fn age_structured_model(
        &self,
        place_id: PlaceId,
        d: usize,
        susceptibles: &mut Vec<PersonId>,
        infectious: &mut Vec<PersonId>,
        ctx: &SpreadContext,
        rng: &mut SmallRng,
    ) -> Vec<Exposure> {
        let mut exposures = Vec::new();
        let place = ctx.registry.place(place_id);
        let disease = &ctx.diseases[d];
        let buckets = MAX_AGE + 1;
        let age_of = |person: PersonId| (ctx.people[person.index()].age as usize).min(MAX_AGE);

        infectious.sort_by_key(|person| (age_of(*person), *person));

        let mut n = vec![0_usize; buckets];
        let mut start = vec![usize::MAX; buckets];
        let mut s = vec![0_usize; buckets];
        let mut size = vec![0_usize; buckets];
        let mut infectivity_of_group = vec![0.0_f64; buckets];
        let mut infectivity_of_agent = vec![0.0_f64; infectious.len()];

        for (pos, person) in infectious.iter().enumerate() {
            let age = age_of(*person);
            n[age] += 1;
            if start[age] == usize::MAX {
                start[age] = pos;
            }
            let infectivity = disease.infectivity(&ctx.people[person.index()].health[d]);
            infectivity_of_group[age] += infectivity;
            infectivity_of_agent[pos] = infectivity;
            size[age] += 1;
        }
        for person in susceptibles.iter() {
            let age = age_of(*person);
            s[age] += 1;
            size[age] += 1;
        }

        // p[i][j]: chance someone in group i is infected by group j;
        // empty or infection-free groups exert no force
        let force = disease.transmissibility * place.intimacy();
        let mut p = vec![vec![0.0_f64; buckets]; buckets];
        for i in 0..buckets {
            if s[i] == 0 {
                continue;
            }
            for j in 0..buckets {
                if size[j] == 0 || n[j] == 0 {
                    continue;
                }
                p[i][j] = force * PROB_CONTACT[i][j] * infectivity_of_group[j] / size[j] as f64;
            }
        }

        let mut infectee_count = vec![0_u32; buckets];
        for i in 0..buckets {
            if s[i] == 0 {
                continue;
            }
            let mut product = 1.0;
            for j in 0..buckets {
                if n[j] == 0 || p[i][j] == 0.0 {
                    continue;
                }
                product *= (1.0 - p[i][j]).powi(n[j] as i32);
            }
            infectee_count[i] = stochastic_round(rng, s[i] as f64 * (1.0 - product));
        }

        // turn each row into a cdf over infector age groups
        for row in p.iter_mut() {
            let mut total = 0.0;
            for value in row.iter_mut() {
                *value += total;
                total = *value;
            }
        }

        susceptibles.shuffle(rng);
        for infectee in susceptibles.iter() {
            let age = age_of(*infectee);
            if infectee_count[age] == 0 {
                continue;
            }
            // the budgeted contact is consumed whether or not it infects
            infectee_count[age] -= 1;
            let health = &ctx.people[infectee.index()].health[d];
            if rng.gen::<f64>() >= disease.susceptibility(health) {
                continue;
            }
            let row_total = p[age][MAX_AGE];
            if row_total <= 0.0 {
                continue;
            }
            // pick the infector's age group from the row cdf
            let r = rng.gen::<f64>() * row_total;
            let group = match p[age].iter().position(|&cumulative| r < cumulative) {
                Some(group) => group,
                None => continue,
            };
            if start[group] == usize::MAX || infectivity_of_group[group] <= 0.0 {
                continue;
            }
            // then the individual, weighted by infectivity
            let mut remaining = rng.gen::<f64>() * infectivity_of_group[group];
            let mut pos = start[group];
            let group_end = start[group] + n[group] - 1;
            while pos < group_end && infectivity_of_agent[pos] < remaining {
                remaining -= infectivity_of_agent[pos];
                pos += 1;
            }
            let infector = infectious[pos];
            if ctx.latches.try_claim(*infectee, d, ctx.day) {
                exposures.push(Exposure {
                    infectee: *infectee,
                    infector: Some(infector),
                    place: place_id,
                    disease: d,
                    from_vector: false,
                });
            }
        }
        exposures
    }
}
