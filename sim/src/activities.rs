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

use std::sync::atomic::Ordering;

use rand::rngs::SmallRng;
use rand::Rng;
use strum::IntoEnumIterator;

use crate::config::{
    HOSPITAL_STAFF_WEEKEND_PROB, HOSPITAL_VISIT_HOUSEMATE_PROB, MEDIUM_COMPANY_MAXSIZE,
    MID_COMPANY_MAXSIZE, SICK_LEAVE_PROB_LARGE, SICK_LEAVE_PROB_MID, SICK_LEAVE_PROB_SMALL,
    SICK_LEAVE_PROB_XLARGE, SMALL_COMPANY_MAXSIZE,
};
use crate::disease::Disease;
use crate::models::person::{ActivityProfile, ActivitySlot, Person, PersonId};
use crate::models::place::PlaceId;
use crate::params::{AgeMap, Params};
use crate::registry::{PlaceRegistry, VisitorRole};
use crate::spatial::gravity::GravityModel;
use crate::spatial::neighborhood::NeighborhoodGrid;
use crate::statistics::{SickLeaveCensus, Statistics};
use crate::SimError;

/// Sick leave draw parameters, split between workplaces with a leave
/// policy (SLA) and without one (SLU)
#[derive(Clone, Debug)]
pub struct SickLeaveConfig {
    pub sla_absent_prob: f64,
    pub slu_absent_prob: f64,
    pub sla_mean_sick_days: f64,
    pub slu_mean_sick_days: f64,
    pub flu_days: f64,
}

impl SickLeaveConfig {
    pub fn from_params(params: &Params) -> Result<SickLeaveConfig, SimError> {
        Ok(SickLeaveConfig {
            sla_absent_prob: params.get_or("sla_absent_prob", 0.58)?,
            slu_absent_prob: params.get_or("slu_absent_prob", 0.40)?,
            sla_mean_sick_days: params.get_or("sla_mean_sick_days_absent", 2.0)?,
            slu_mean_sick_days: params.get_or("slu_mean_sick_days_absent", 1.5)?,
            flu_days: params.get_or("flu_days", 2.0)?,
        })
    }
}

/// Multipliers applied to the healthcare seeking probabilities; each
/// condition is applied exactly once
#[derive(Clone, Debug)]
pub struct ChronicCareMultipliers {
    pub asthma: f64,
    pub copd: f64,
    pub chronic_renal_disease: f64,
    pub diabetes: f64,
    pub heart_disease: f64,
    pub hypertension: f64,
    pub hypercholesterolemia: f64,
    pub pregnancy: f64,
}

impl ChronicCareMultipliers {
    pub fn from_params(params: &Params) -> Result<ChronicCareMultipliers, SimError> {
        Ok(ChronicCareMultipliers {
            asthma: params.get_or("asthma_hospitalization_prob_mult", 1.0)?,
            copd: params.get_or("copd_hospitalization_prob_mult", 1.0)?,
            chronic_renal_disease: params
                .get_or("chronic_renal_disease_hospitalization_prob_mult", 1.0)?,
            diabetes: params.get_or("diabetes_hospitalization_prob_mult", 1.0)?,
            heart_disease: params.get_or("heart_disease_hospitalization_prob_mult", 1.0)?,
            hypertension: params.get_or("hypertension_hospitalization_prob_mult", 1.0)?,
            hypercholesterolemia: params
                .get_or("hypercholesterolemia_hospitalization_prob_mult", 1.0)?,
            pregnancy: params.get_or("pregnancy_hospitalization_prob_mult", 1.0)?,
        })
    }

    fn apply(&self, person: &Person, mut prob: f64) -> f64 {
        if person.chronic.asthma {
            prob *= self.asthma;
        }
        if person.chronic.copd {
            prob *= self.copd;
        }
        if person.chronic.chronic_renal_disease {
            prob *= self.chronic_renal_disease;
        }
        if person.chronic.diabetes {
            prob *= self.diabetes;
        }
        if person.chronic.heart_disease {
            prob *= self.heart_disease;
        }
        if person.chronic.hypertension {
            prob *= self.hypertension;
        }
        if person.chronic.hypercholesterolemia {
            prob *= self.hypercholesterolemia;
        }
        if person.is_pregnant {
            prob *= self.pregnancy;
        }
        prob
    }
}

/// Everything the daily scheduler needs to know from the parameter table
#[derive(Clone, Debug)]
pub struct ActivityConfig {
    pub enable_isolation: bool,
    pub isolation_rate: f64,
    pub isolation_delay: u32,
    pub enable_hospitals: bool,
    pub enable_household_shelter: bool,
    pub enable_default_sick_behavior: bool,
    pub default_sick_day_prob: f64,
    pub work_absenteeism: f64,
    pub school_absenteeism: f64,
    pub hospitalization_length_of_stay: u32,
    /// Age keyed baselines, before the per disease add-ons
    pub hospitalization_prob: AgeMap,
    pub outpatient_healthcare_prob: AgeMap,
    pub chronic_multipliers: ChronicCareMultipliers,
    pub sick_leave: SickLeaveConfig,
    /// With vector transmission every visitor matters, not just S and I
    pub track_all_visitors: bool,
}

impl ActivityConfig {
    pub fn from_params(params: &Params) -> Result<ActivityConfig, SimError> {
        Ok(ActivityConfig {
            enable_isolation: params.get_flag("enable_isolation")?,
            isolation_rate: params.get_or("isolation_rate", 0.0)?,
            isolation_delay: params.get_or("isolation_delay", 1)?,
            enable_hospitals: params.get_flag("enable_hospitals")?,
            enable_household_shelter: params.get_flag("enable_household_shelter")?,
            enable_default_sick_behavior: params.get_flag("enable_default_sick_behavior")?,
            default_sick_day_prob: params.get_or("sick_day_prob", 0.0)?,
            work_absenteeism: params.get_or("work_absenteeism", 0.0)?,
            school_absenteeism: params.get_or("school_absenteeism", 0.0)?,
            hospitalization_length_of_stay: params.get_or("hospitalization_length_of_stay", 2)?,
            hospitalization_prob: params.get_age_map("hospitalization_prob")?,
            outpatient_healthcare_prob: params.get_age_map("outpatient_healthcare_prob")?,
            chronic_multipliers: ChronicCareMultipliers::from_params(params)?,
            sick_leave: SickLeaveConfig::from_params(params)?,
            track_all_visitors: params.get_flag("enable_vector_transmission")?,
        })
    }
}

/// One favorite place visit recorded by the agent phase
#[derive(Copy, Clone, Debug)]
pub struct Visit {
    pub place: PlaceId,
    pub person: PersonId,
    pub disease: usize,
    pub role: VisitorRole,
}

/// Place membership changes that must wait for the sequential merge step,
/// because the agent phase may not touch place state
#[derive(Copy, Clone, Debug)]
pub enum MembershipEvent {
    Enroll(PlaceId, PersonId),
    Unenroll(PlaceId, PersonId),
    SetHospitalizedMember(PlaceId, bool),
}

/// Per thread output buffer of the agent phase
#[derive(Default)]
pub struct DayBuffer {
    pub visits: Vec<Visit>,
    pub events: Vec<MembershipEvent>,
}

/// Read-only context shared by every agent update of one day
pub struct ScheduleContext<'a> {
    pub registry: &'a PlaceRegistry,
    pub grid: &'a NeighborhoodGrid,
    pub gravity: &'a GravityModel,
    pub diseases: &'a [Disease],
    pub statistics: &'a Statistics,
    pub day: u32,
    pub is_weekday: bool,
}

/// The per-agent per-day scheduler
pub struct ActivityEngine {
    pub config: ActivityConfig,
}

impl ActivityEngine {
    pub fn new(config: ActivityConfig) -> ActivityEngine {
        ActivityEngine { config }
    }

    /// Computes today's schedule for one agent and records their visits
    ///
    /// Idempotent per (agent, day): a second call neither changes the mask
    /// nor records any additional visit
    pub fn update_person(
        &self,
        person: &mut Person,
        ctx: &ScheduleContext,
        buffer: &mut DayBuffer,
        rng: &mut SmallRng,
    ) {
        if !person.alive {
            return;
        }
        // traveling abroad: invisible to domestic transmission today
        if person.is_traveling_outside {
            return;
        }
        if ctx.day as i32 <= person.schedule_updated {
            return;
        }

        let infectious_any = person.health.iter().any(|health| health.is_infectious());

        // enter isolation once symptomatic past the delay; once isolated,
        // remain isolated
        if infectious_any && self.config.enable_isolation && !person.is_isolated {
            let symptomatic_days = person.days_symptomatic(ctx.day);
            if person.is_symptomatic()
                && symptomatic_days >= self.config.isolation_delay as i32
                && rng.gen::<f64>() < self.config.isolation_rate
            {
                person.is_isolated = true;
            }
        }

        self.update_schedule(person, ctx, buffer, rng);

        if infectious_any
            && person.is_symptomatic()
            && !person.is_hospitalized
            && !person.is_isolated
        {
            self.decide_whether_to_stay_home(person, ctx, rng);
            if self.config.enable_hospitals {
                self.decide_whether_to_seek_healthcare(person, ctx, buffer, rng);
            }
        }

        self.record_visits(person, ctx, buffer);
    }

    /// Gating, the provisional schedule and the daily neighborhood choice
    fn update_schedule(
        &self,
        person: &mut Person,
        ctx: &ScheduleContext,
        buffer: &mut DayBuffer,
        rng: &mut SmallRng,
    ) {
        person.schedule_updated = ctx.day as i32;
        person.schedule.clear();

        // if isolated, visit nowhere today
        if person.is_isolated {
            return;
        }

        if self.config.enable_hospitals
            && person.is_hospitalized
            && person.hospitalization_ends_day != ctx.day as i32
        {
            person.schedule.set(ActivitySlot::Hospital, true);
            return;
        }
        if self.config.enable_hospitals
            && person.is_hospitalized
            && person.hospitalization_ends_day == ctx.day as i32
        {
            self.end_hospitalization(person, buffer);
        }

        // always visit the household
        person.schedule.set(ActivitySlot::Household, true);

        if self.config.enable_household_shelter {
            if let Some(household) = person.household() {
                let sheltering = ctx
                    .registry
                    .place(household)
                    .household()
                    .map(|info| info.is_sheltering_today(ctx.day))
                    .unwrap_or(false);
                if sheltering {
                    return;
                }
            }
        }

        // prisoners and nursing home residents stay indoors
        if !person.profile.stays_indoors() {
            person.schedule.set(ActivitySlot::Neighborhood, true);
        }

        if ctx.is_weekday {
            if person.place(ActivitySlot::School).is_some() {
                person.schedule.set(ActivitySlot::School, true);
            }
            if person.place(ActivitySlot::Classroom).is_some() {
                person.schedule.set(ActivitySlot::Classroom, true);
            }
            if person.place(ActivitySlot::Workplace).is_some() {
                person.schedule.set(ActivitySlot::Workplace, true);
            }
            if person.place(ActivitySlot::Office).is_some() {
                person.schedule.set(ActivitySlot::Office, true);
            }
        } else if matches!(
            person.profile,
            ActivityProfile::WeekendWorker | ActivityProfile::Student
        ) {
            if person.place(ActivitySlot::Workplace).is_some() {
                person.schedule.set(ActivitySlot::Workplace, true);
            }
            if person.place(ActivitySlot::Office).is_some() {
                person.schedule.set(ActivitySlot::Office, true);
            }
        } else if person.works_at_hospital && rng.gen::<f64>() < HOSPITAL_STAFF_WEEKEND_PROB {
            if person.place(ActivitySlot::Workplace).is_some() {
                person.schedule.set(ActivitySlot::Workplace, true);
            }
            if person.place(ActivitySlot::Office).is_some() {
                person.schedule.set(ActivitySlot::Office, true);
            }
        }

        // maybe visit a hospitalized housemate
        if self.config.enable_hospitals && !person.profile.stays_indoors() {
            if let Some(household) = person.household() {
                if let Some(info) = ctx.registry.place(household).household() {
                    if info.has_hospitalized_member
                        && rng.gen::<f64>() < HOSPITAL_VISIT_HOUSEMATE_PROB
                    {
                        if let Some(hospital) = info.visitation_hospital {
                            person.favorite_places[ActivitySlot::AdHoc] = Some(hospital);
                            person.schedule.set(ActivitySlot::AdHoc, true);
                        }
                    }
                }
            }
        }

        // background absenteeism
        if self.config.work_absenteeism > 0.0
            && person.schedule.is_on(ActivitySlot::Workplace)
            && rng.gen::<f64>() < self.config.work_absenteeism
        {
            person.schedule.set(ActivitySlot::Workplace, false);
            person.schedule.set(ActivitySlot::Office, false);
        }
        if self.config.school_absenteeism > 0.0
            && person.schedule.is_on(ActivitySlot::School)
            && rng.gen::<f64>() < self.config.school_absenteeism
        {
            person.schedule.set(ActivitySlot::School, false);
            person.schedule.set(ActivitySlot::Classroom, false);
        }

        // which neighborhood is visited today is gravity sampled
        // from the agent's home patch
        if person.schedule.is_on(ActivitySlot::Neighborhood) {
            if let Some((row, col)) = person.home_patch {
                if let Some((dest_row, dest_col)) = ctx.gravity.sample_destination(row, col, rng) {
                    if let Some(patch) = ctx.grid.patch(dest_row, dest_col) {
                        if let Some(neighborhood) = patch.neighborhood {
                            person.favorite_places[ActivitySlot::Neighborhood] = Some(neighborhood);
                        }
                    }
                }
            }
            if person.place(ActivitySlot::Neighborhood).is_none() {
                person.schedule.set(ActivitySlot::Neighborhood, false);
            }
        }
    }

    /// A symptomatic adult with sick leave burns their sick-days budget;
    /// everyone else falls back to the default behavior
    fn decide_whether_to_stay_home(
        &self,
        person: &mut Person,
        ctx: &ScheduleContext,
        rng: &mut SmallRng,
    ) {
        let is_a_workday = person.schedule.is_on(ActivitySlot::Workplace)
            || (person.is_teacher() && person.schedule.is_on(ActivitySlot::School));

        let stay_home = if person.is_adult() {
            if self.config.enable_default_sick_behavior {
                self.default_sick_leave_behavior(person, rng)
            } else if is_a_workday {
                if person.sick_days_remaining > 0.0 {
                    let stay = rng.gen::<f64>() < person.sick_days_remaining;
                    person.sick_days_remaining -= 1.0;
                    stay
                } else {
                    false
                }
            } else {
                rng.gen::<f64>() < self.config.default_sick_day_prob
            }
        } else {
            // sick child: default behavior
            self.default_sick_leave_behavior(person, rng)
        };

        let tallies = &ctx.statistics.tallies;
        if is_a_workday {
            if stay_home {
                tallies.sick_days_absent.fetch_add(1, Ordering::Relaxed);
                person.my_sick_days_absent += 1;
            } else {
                tallies.sick_days_present.fetch_add(1, Ordering::Relaxed);
                person.my_sick_days_present += 1;
            }
        }
        if !person.is_teacher() && person.schedule.is_on(ActivitySlot::School) {
            if stay_home {
                tallies.school_sick_days_absent.fetch_add(1, Ordering::Relaxed);
                person.my_sick_days_absent += 1;
            } else {
                tallies.school_sick_days_present.fetch_add(1, Ordering::Relaxed);
                person.my_sick_days_present += 1;
            }
        }

        if stay_home {
            // withdraw to the household
            for slot in ActivitySlot::iter() {
                if slot != ActivitySlot::Household {
                    person.schedule.set(slot, false);
                }
            }
        }
    }

    /// The one-shot latched default sick day decision
    fn default_sick_leave_behavior(&self, person: &mut Person, rng: &mut SmallRng) -> bool {
        if person.sick_leave_decision_has_been_made {
            return person.sick_leave_decision;
        }
        let stay_home = rng.gen::<f64>() < self.config.default_sick_day_prob;
        person.sick_leave_decision = stay_home;
        person.sick_leave_decision_has_been_made = true;
        stay_home
    }

    /// Age baseline plus disease add-ons, scaled by chronic
    /// conditions and pregnancy; hospitalization wins over outpatient care
    fn decide_whether_to_seek_healthcare(
        &self,
        person: &mut Person,
        ctx: &ScheduleContext,
        buffer: &mut DayBuffer,
        rng: &mut SmallRng,
    ) {
        if person.is_hospitalized {
            return;
        }
        let is_a_workday = person.schedule.is_on(ActivitySlot::Workplace)
            || (person.is_teacher() && person.schedule.is_on(ActivitySlot::School));

        let r = rng.gen::<f64>();
        let mut hospitalization_prob = self.config.hospitalization_prob.find_value(person.age);
        let mut outpatient_prob = self.config.outpatient_healthcare_prob.find_value(person.age);
        for disease in ctx.diseases {
            if person.health[disease.id()].is_symptomatic() {
                hospitalization_prob += disease.hospitalization_prob.find_value(person.age);
                outpatient_prob += disease.outpatient_healthcare_prob.find_value(person.age);
            }
        }
        hospitalization_prob = self.config.chronic_multipliers.apply(person, hospitalization_prob);
        outpatient_prob = self.config.chronic_multipliers.apply(person, outpatient_prob);

        if r < hospitalization_prob {
            person.schedule.clear();
            person.schedule.set(ActivitySlot::Hospital, true);
            self.start_hospitalization(
                person,
                ctx,
                buffer,
                self.config.hospitalization_length_of_stay,
            );
            if is_a_workday {
                ctx.statistics
                    .tallies
                    .sick_days_absent
                    .fetch_add(1, Ordering::Relaxed);
                person.my_sick_days_absent += 1;
            }
        } else if r < outpatient_prob {
            let hospital = person.place(ActivitySlot::Hospital).or_else(|| {
                person
                    .household()
                    .and_then(|household| ctx.registry.place(household).household())
                    .and_then(|info| info.visitation_hospital)
            });
            let hospital = match hospital {
                Some(hospital) => hospital,
                None => {
                    ctx.statistics.note_warning();
                    return;
                }
            };
            if person.place(ActivitySlot::Hospital) != Some(hospital) {
                person.favorite_places[ActivitySlot::Hospital] = Some(hospital);
                buffer.events.push(MembershipEvent::Enroll(hospital, person.id()));
            }
            person.schedule.set(ActivitySlot::Household, true);
            person.schedule.set(ActivitySlot::Workplace, false);
            person.schedule.set(ActivitySlot::Office, false);
            person.schedule.set(ActivitySlot::School, false);
            person.schedule.set(ActivitySlot::Classroom, false);
            person.schedule.set(ActivitySlot::Neighborhood, true);
            person.schedule.set(ActivitySlot::Hospital, true);
            person.schedule.set(ActivitySlot::AdHoc, false);
        }
    }

    /// Admits the person, saving their favorite places until discharge
    pub fn start_hospitalization(
        &self,
        person: &mut Person,
        ctx: &ScheduleContext,
        buffer: &mut DayBuffer,
        length_of_stay: u32,
    ) {
        if !self.config.enable_hospitals || person.is_hospitalized {
            return;
        }
        debug_assert!(length_of_stay > 0);
        // hospitalization trumps travel
        if person.is_traveling {
            stop_traveling(person);
        }
        let hospital = person.place(ActivitySlot::Hospital).or_else(|| {
            person
                .household()
                .and_then(|household| ctx.registry.place(household).household())
                .and_then(|info| info.visitation_hospital)
        });
        let hospital = match hospital {
            Some(hospital) => hospital,
            None => {
                ctx.statistics.note_warning();
                return;
            }
        };
        let household = person.household();
        person.store_favorite_places();
        person.clear_favorite_places();
        person.favorite_places[ActivitySlot::Hospital] = Some(hospital);
        buffer.events.push(MembershipEvent::Enroll(hospital, person.id()));
        person.is_hospitalized = true;
        person.hospitalization_ends_day = (ctx.day + length_of_stay) as i32;
        if let Some(household) = household {
            buffer
                .events
                .push(MembershipEvent::SetHospitalizedMember(household, true));
        }
    }

    /// Discharges the person, restoring the saved favorite places verbatim
    pub fn end_hospitalization(&self, person: &mut Person, buffer: &mut DayBuffer) {
        if !self.config.enable_hospitals || !person.is_hospitalized {
            return;
        }
        person.is_hospitalized = false;
        person.hospitalization_ends_day = -1;
        if let Some(hospital) = person.place(ActivitySlot::Hospital) {
            buffer
                .events
                .push(MembershipEvent::Unenroll(hospital, person.id()));
        }
        person.restore_favorite_places();
        if let Some(household) = person.household() {
            buffer
                .events
                .push(MembershipEvent::SetHospitalizedMember(household, false));
        }
    }

    /// Files one visit per on-schedule place per disease, registering
    /// places that receive an infectious visitor
    fn record_visits(&self, person: &Person, ctx: &ScheduleContext, buffer: &mut DayBuffer) {
        if !person.schedule.any() {
            return;
        }
        for slot in ActivitySlot::iter() {
            if !person.schedule.is_on(slot) {
                continue;
            }
            let place = match person.place(slot) {
                Some(place) => place,
                None => continue,
            };
            for disease in ctx.diseases {
                let d = disease.id();
                let health = &person.health[d];
                let role = if health.is_infectious() {
                    ctx.registry.register_infectious_place(place, d);
                    VisitorRole::Infectious
                } else if health.is_susceptible() {
                    VisitorRole::Susceptible
                } else if self.config.track_all_visitors {
                    VisitorRole::Other
                } else {
                    continue;
                };
                buffer.visits.push(Visit {
                    place,
                    person: person.id(),
                    disease: d,
                    role,
                });
            }
        }
    }
}

/// Substitutes the traveler's home slots with the host's for the trip
pub fn start_traveling(person: &mut Person, host_places: &crate::models::person::FavoritePlaces) {
    if person.is_hospitalized {
        return;
    }
    person.store_favorite_places();
    person.clear_favorite_places();
    person.favorite_places[ActivitySlot::Household] = host_places[ActivitySlot::Household];
    person.favorite_places[ActivitySlot::Neighborhood] = host_places[ActivitySlot::Neighborhood];
    if matches!(
        person.profile,
        ActivityProfile::Worker | ActivityProfile::WeekendWorker
    ) {
        person.favorite_places[ActivitySlot::Workplace] = host_places[ActivitySlot::Workplace];
        person.favorite_places[ActivitySlot::Office] = host_places[ActivitySlot::Office];
    }
    person.is_traveling = true;
}

/// Marks the traveler as abroad: no domestic places at all for the trip
pub fn start_traveling_outside(person: &mut Person) {
    if person.is_hospitalized {
        return;
    }
    person.store_favorite_places();
    person.clear_favorite_places();
    person.is_traveling = true;
    person.is_traveling_outside = true;
}

/// Restores the exact favorite place tuple saved at departure
pub fn stop_traveling(person: &mut Person) {
    if person.saved_places.is_some() {
        person.restore_favorite_places();
    }
    person.is_traveling = false;
    person.is_traveling_outside = false;
    person.return_from_travel_day = -1;
}

/// Initializes the sick leave state from the workplace size class
pub fn initialize_sick_leave(
    person: &mut Person,
    workplace_size: u32,
    config: &SickLeaveConfig,
    census: &SickLeaveCensus,
    rng: &mut SmallRng,
) {
    person.my_sick_days_absent = 0;
    person.my_sick_days_present = 0;
    person.sick_leave_decision_has_been_made = false;
    person.sick_leave_decision = false;
    person.sick_days_remaining = 0.0;
    person.sick_leave_available = false;

    if workplace_size > 0 {
        let (probability, class_index) = if workplace_size <= SMALL_COMPANY_MAXSIZE {
            (SICK_LEAVE_PROB_SMALL, 0)
        } else if workplace_size <= MID_COMPANY_MAXSIZE {
            (SICK_LEAVE_PROB_MID, 1)
        } else if workplace_size <= MEDIUM_COMPANY_MAXSIZE {
            (SICK_LEAVE_PROB_LARGE, 2)
        } else {
            (SICK_LEAVE_PROB_XLARGE, 3)
        };
        person.sick_leave_available = rng.gen::<f64>() < probability;
        let bucket = if person.sick_leave_available {
            &census.with_sick_leave[class_index]
        } else {
            &census.without_sick_leave[class_index]
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    // expected sick days for a flu-like illness
    if person.sick_leave_available {
        if rng.gen::<f64>() < config.sla_absent_prob {
            person.sick_days_remaining = config.sla_mean_sick_days + config.flu_days;
        }
    } else if rng.gen::<f64>() < config.slu_absent_prob {
        person.sick_days_remaining = config.slu_mean_sick_days + config.flu_days;
    } else if rng.gen::<f64>() < config.sla_absent_prob - config.slu_absent_prob {
        person.sick_days_remaining = config.flu_days;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use load_population::records::Sex;

    use crate::models::person::{Person, PersonId};
    use crate::params::Params;
    use crate::random::{substream, STREAM_BUILD};
    use crate::statistics::SickLeaveCensus;

    use super::{initialize_sick_leave, ChronicCareMultipliers, SickLeaveConfig};

    fn adult() -> Person {
        Person::new(PersonId(0), "P0".to_string(), 40, Sex::Male, 1, 0, 1)
    }

    #[test]
    fn sick_leave_budget_comes_from_the_configured_means() {
        let config = SickLeaveConfig {
            sla_absent_prob: 1.0,
            slu_absent_prob: 1.0,
            sla_mean_sick_days: 3.0,
            slu_mean_sick_days: 1.0,
            flu_days: 2.0,
        };
        let census = SickLeaveCensus::default();
        let mut rng = substream(1, STREAM_BUILD, 0, 0);
        let mut person = adult();
        initialize_sick_leave(&mut person, 10, &config, &census, &mut rng);
        // with both absent probabilities at 1 the budget is mean + flu days
        let expected = if person.sick_leave_available {
            config.sla_mean_sick_days + config.flu_days
        } else {
            config.slu_mean_sick_days + config.flu_days
        };
        assert!((person.sick_days_remaining - expected).abs() < 1e-12);
        let counted: u32 = census
            .with_sick_leave
            .iter()
            .chain(census.without_sick_leave.iter())
            .map(|bucket| bucket.load(Ordering::Relaxed))
            .sum();
        assert_eq!(counted, 1);
    }

    #[test]
    fn no_workplace_means_no_sick_leave() {
        let config = SickLeaveConfig {
            sla_absent_prob: 0.0,
            slu_absent_prob: 0.0,
            sla_mean_sick_days: 3.0,
            slu_mean_sick_days: 1.0,
            flu_days: 2.0,
        };
        let census = SickLeaveCensus::default();
        let mut rng = substream(1, STREAM_BUILD, 1, 0);
        let mut person = adult();
        initialize_sick_leave(&mut person, 0, &config, &census, &mut rng);
        assert!(!person.sick_leave_available);
        let counted: u32 = census
            .with_sick_leave
            .iter()
            .chain(census.without_sick_leave.iter())
            .map(|bucket| bucket.load(Ordering::Relaxed))
            .sum();
        assert_eq!(counted, 0);
    }

    #[test]
    fn each_chronic_condition_multiplies_exactly_once() {
        let mut params = Params::new();
        params.set("diabetes_hospitalization_prob_mult", "2.0");
        params.set("heart_disease_hospitalization_prob_mult", "3.0");
        let multipliers = ChronicCareMultipliers::from_params(&params).unwrap();
        let mut person = adult();
        person.chronic.diabetes = true;
        person.chronic.heart_disease = true;
        let adjusted = multipliers.apply(&person, 0.01);
        assert!((adjusted - 0.06).abs() < 1e-12, "got {}", adjusted);
    }

    #[test]
    fn pregnancy_multiplier_applies_without_chronic_conditions() {
        let mut params = Params::new();
        params.set("pregnancy_hospitalization_prob_mult", "4.0");
        let multipliers = ChronicCareMultipliers::from_params(&params).unwrap();
        let mut person = adult();
        person.is_pregnant = true;
        assert!((multipliers.apply(&person, 0.1) - 0.4).abs() < 1e-12);
    }
}
