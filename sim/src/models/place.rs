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

use std::fmt::{Display, Formatter};

use enum_map::Enum;
use geo_types::Point;
use strum_macros::EnumIter;

use crate::config::MAX_GRADE;
use crate::models::person::PersonId;

/// Stable index of a place in the registry
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceId(pub u32);

impl PlaceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for PlaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "place {}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Enum, EnumIter)]
pub enum PlaceKind {
    Household,
    Neighborhood,
    School,
    Classroom,
    Workplace,
    Office,
    Hospital,
}

impl PlaceKind {
    /// Closeness of contacts at this kind of place, used by the
    /// age-structured transmission model
    pub fn intimacy(self) -> f64 {
        match self {
            PlaceKind::Household => 1.0,
            PlaceKind::Neighborhood => 0.0025,
            PlaceKind::School | PlaceKind::Classroom => 0.025,
            PlaceKind::Workplace | PlaceKind::Office | PlaceKind::Hospital => 0.01,
        }
    }
}

impl Display for PlaceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaceKind::Household => "Household",
            PlaceKind::Neighborhood => "Neighborhood",
            PlaceKind::School => "School",
            PlaceKind::Classroom => "Classroom",
            PlaceKind::Workplace => "Workplace",
            PlaceKind::Office => "Office",
            PlaceKind::Hospital => "Hospital",
        };
        write!(f, "{}", name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaceSubtype {
    None,
    College,
    MilitaryBase,
    Prison,
    NursingHome,
    HealthcareClinic,
}

/// Size classes used for sick leave availability
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkplaceSizeClass {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

#[derive(Clone, Debug, Default)]
pub struct HouseholdInfo {
    pub income: u32,
    pub deme: u8,
    /// Index into the registry's census tract table
    pub census_tract: usize,
    pub group_quarters_units: u32,
    /// Sheltering window, empty by default
    pub shelter_start_day: i32,
    pub shelter_end_day: i32,
    /// Extended absence flag, set while any resident is hospitalized
    pub has_hospitalized_member: bool,
    pub visitation_hospital: Option<PlaceId>,
    /// The shared workplace for group quarters residents
    pub group_quarters_workplace: Option<PlaceId>,
}

impl HouseholdInfo {
    pub fn is_sheltering_today(&self, day: u32) -> bool {
        self.shelter_start_day <= day as i32 && (day as i32) < self.shelter_end_day
    }
}

#[derive(Clone, Debug)]
pub struct SchoolInfo {
    pub county_fips: u32,
    /// Student counts per grade as loaded, the baseline for the capacity rule
    pub orig_students_in_grade: Vec<u32>,
    pub students_in_grade: Vec<u32>,
    /// Classroom rosters per grade, created lazily as students enroll
    pub classrooms: Vec<Vec<PlaceId>>,
    pub max_grade: u32,
    pub staff_size: u32,
}

impl SchoolInfo {
    pub fn new(county_fips: u32) -> SchoolInfo {
        let grades = MAX_GRADE as usize + 1;
        SchoolInfo {
            county_fips,
            orig_students_in_grade: vec![0; grades],
            students_in_grade: vec![0; grades],
            classrooms: vec![Vec::new(); grades],
            max_grade: MAX_GRADE,
            staff_size: 0,
        }
    }

    /// The 150% rule: a grade can grow to at most 1.5x its original size
    pub fn grade_has_room(&self, grade: u32) -> bool {
        let grade = grade as usize;
        if grade >= self.students_in_grade.len() {
            return false;
        }
        let orig = self.orig_students_in_grade[grade];
        orig == 0 || (self.students_in_grade[grade] as f64) < 1.5 * orig as f64
    }
}

#[derive(Copy, Clone, Debug)]
pub struct ClassroomInfo {
    pub school: PlaceId,
    pub age_level: u32,
}

#[derive(Clone, Debug, Default)]
pub struct WorkplaceInfo {
    pub offices: Vec<PlaceId>,
}

#[derive(Copy, Clone, Debug)]
pub struct OfficeInfo {
    pub workplace: PlaceId,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct HospitalInfo {
    pub workers: u32,
    pub physicians: u32,
    pub beds: u32,
}

/// Kind specific payload of a place
#[derive(Clone, Debug)]
pub enum PlaceInfo {
    Household(HouseholdInfo),
    Neighborhood,
    School(SchoolInfo),
    Classroom(ClassroomInfo),
    Workplace(WorkplaceInfo),
    Office(OfficeInfo),
    Hospital(HospitalInfo),
}

impl PlaceInfo {
    pub fn kind(&self) -> PlaceKind {
        match self {
            PlaceInfo::Household(_) => PlaceKind::Household,
            PlaceInfo::Neighborhood => PlaceKind::Neighborhood,
            PlaceInfo::School(_) => PlaceKind::School,
            PlaceInfo::Classroom(_) => PlaceKind::Classroom,
            PlaceInfo::Workplace(_) => PlaceKind::Workplace,
            PlaceInfo::Office(_) => PlaceKind::Office,
            PlaceInfo::Hospital(_) => PlaceKind::Hospital,
        }
    }
}

/// A shared location where encounters occur
///
/// Links to people are non-owning `PersonId` indices; the population owns
/// every person and the registry owns every place
#[derive(Clone, Debug)]
pub struct Place {
    id: PlaceId,
    pub label: String,
    pub subtype: PlaceSubtype,
    pub location: Point<f64>,
    /// County FIPS code inherited from the loaded record, 0 when unknown
    pub county_fips: u32,
    /// The containing place, e.g. a classroom's school
    pub container: Option<PlaceId>,
    pub enrollees: Vec<PersonId>,
    /// Enrollee count at prepare time; daily ad hoc visitors can push the
    /// visiting population above this
    pub orig_size: u32,
    pub open_day: i32,
    pub close_day: i32,
    pub first_infectious_day: i32,
    pub last_infectious_day: i32,
    pub total_infections: Vec<u32>,
    pub info: PlaceInfo,
}

impl Place {
    pub fn new(
        id: PlaceId,
        label: String,
        subtype: PlaceSubtype,
        location: Point<f64>,
        county_fips: u32,
        info: PlaceInfo,
    ) -> Place {
        Place {
            id,
            label,
            subtype,
            location,
            county_fips,
            container: None,
            enrollees: Vec::new(),
            orig_size: 0,
            open_day: 0,
            close_day: i32::MAX,
            first_infectious_day: -1,
            last_infectious_day: -2,
            total_infections: Vec::new(),
            info,
        }
    }

    pub fn id(&self) -> PlaceId {
        self.id
    }

    pub fn kind(&self) -> PlaceKind {
        self.info.kind()
    }

    /// The number of enrolled members
    pub fn size(&self) -> u32 {
        self.enrollees.len() as u32
    }

    pub fn intimacy(&self) -> f64 {
        self.kind().intimacy()
    }

    pub fn is_household(&self) -> bool {
        self.kind() == PlaceKind::Household
    }

    pub fn is_neighborhood(&self) -> bool {
        self.kind() == PlaceKind::Neighborhood
    }

    pub fn is_group_quarters(&self) -> bool {
        matches!(
            self.subtype,
            PlaceSubtype::College
                | PlaceSubtype::MilitaryBase
                | PlaceSubtype::Prison
                | PlaceSubtype::NursingHome
        )
    }

    /// Whether the place itself is open; containers are resolved by the registry
    pub fn is_open(&self, day: u32) -> bool {
        self.open_day <= day as i32 && (day as i32) < self.close_day
    }

    pub fn household(&self) -> Option<&HouseholdInfo> {
        match &self.info {
            PlaceInfo::Household(info) => Some(info),
            _ => None,
        }
    }

    pub fn household_mut(&mut self) -> Option<&mut HouseholdInfo> {
        match &mut self.info {
            PlaceInfo::Household(info) => Some(info),
            _ => None,
        }
    }

    pub fn school(&self) -> Option<&SchoolInfo> {
        match &self.info {
            PlaceInfo::School(info) => Some(info),
            _ => None,
        }
    }

    pub fn school_mut(&mut self) -> Option<&mut SchoolInfo> {
        match &mut self.info {
            PlaceInfo::School(info) => Some(info),
            _ => None,
        }
    }

    pub fn workplace(&self) -> Option<&WorkplaceInfo> {
        match &self.info {
            PlaceInfo::Workplace(info) => Some(info),
            _ => None,
        }
    }

    pub fn workplace_mut(&mut self) -> Option<&mut WorkplaceInfo> {
        match &mut self.info {
            PlaceInfo::Workplace(info) => Some(info),
            _ => None,
        }
    }

    pub fn hospital(&self) -> Option<&HospitalInfo> {
        match &self.info {
            PlaceInfo::Hospital(info) => Some(info),
            _ => None,
        }
    }

    pub fn classroom(&self) -> Option<&ClassroomInfo> {
        match &self.info {
            PlaceInfo::Classroom(info) => Some(info),
            _ => None,
        }
    }

    /// Size class of a workplace, from its current headcount
    pub fn size_class(&self) -> WorkplaceSizeClass {
        use crate::config::{MEDIUM_COMPANY_MAXSIZE, MID_COMPANY_MAXSIZE, SMALL_COMPANY_MAXSIZE};
        let size = self.size();
        if size <= SMALL_COMPANY_MAXSIZE {
            WorkplaceSizeClass::Small
        } else if size <= MID_COMPANY_MAXSIZE {
            WorkplaceSizeClass::Medium
        } else if size <= MEDIUM_COMPANY_MAXSIZE {
            WorkplaceSizeClass::Large
        } else {
            WorkplaceSizeClass::ExtraLarge
        }
    }

    pub fn record_infectious_day(&mut self, day: u32) {
        if self.first_infectious_day == -1 {
            self.first_infectious_day = day as i32;
        }
        self.last_infectious_day = day as i32;
    }
}

impl Display for Place {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} with {} members",
            self.kind(),
            self.label,
            self.enrollees.len()
        )
    }
}
