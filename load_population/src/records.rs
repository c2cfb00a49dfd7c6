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

use serde::Deserialize;

/// The sex of a person as recorded in the synthetic population
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub enum Sex {
    #[serde(rename = "M", alias = "m", alias = "1")]
    Male,
    #[serde(rename = "F", alias = "f", alias = "2")]
    Female,
}

/// Group quarters subtypes, used both for residences and their attached workplaces
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub enum GroupQuartersType {
    #[serde(rename = "C", alias = "college")]
    College,
    #[serde(rename = "M", alias = "military")]
    Military,
    #[serde(rename = "P", alias = "prison")]
    Prison,
    #[serde(rename = "N", alias = "nursing_home")]
    NursingHome,
}

/// A single household, with the location used to position it on the grids
#[derive(Clone, Debug, Deserialize)]
pub struct HouseholdRecord {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Census tract FIPS code (the first 5 digits are the county FIPS)
    pub census_tract: String,
    pub race: u8,
    pub income: u32,
    /// Partition identifier used for travel selection
    #[serde(default)]
    pub deme: u8,
}

/// A group quarters residence (dorm, barracks, prison or nursing home)
///
/// Each unit of `capacity` residents becomes one household-like unit
#[derive(Clone, Debug, Deserialize)]
pub struct GroupQuartersRecord {
    pub label: String,
    pub gq_type: GroupQuartersType,
    pub latitude: f64,
    pub longitude: f64,
    pub census_tract: String,
    pub capacity: u32,
}

/// A person, linked to their places by label
///
/// Empty school/workplace fields are deserialized as `None`
#[derive(Clone, Debug, Deserialize)]
pub struct PersonRecord {
    pub label: String,
    pub household: String,
    pub age: u32,
    pub sex: Sex,
    pub race: u8,
    /// Relationship to the head of household (0 = head)
    pub relationship: u8,
    pub school: Option<String>,
    pub workplace: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SchoolRecord {
    pub label: String,
    /// County FIPS code, matched against the household county at assignment
    pub county_fips: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkplaceRecord {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HospitalRecord {
    pub label: String,
    pub workers: u32,
    pub physicians: u32,
    pub beds: u32,
    pub latitude: f64,
    pub longitude: f64,
}
