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

use num_format::Locale;

/// Locale used when logging large population counts
pub const NUMBER_FORMATTING: Locale = Locale::en;

/// Youngest age attending school
pub const SCHOOL_AGE: u32 = 5;
/// Age at which a person counts as an adult (and leaves school)
pub const ADULT_AGE: u32 = 18;
/// Age at which retirement becomes possible
pub const RETIREMENT_AGE: u32 = 67;
/// Oldest age tracked by the age-structured transmission buckets
pub const MAX_AGE: usize = 100;

/// Grades are indexed by age, so the last grade is ADULT_AGE - 1
pub const MAX_GRADE: u32 = ADULT_AGE - 1;

/// Fraction of new workers that also work weekends
pub const WEEKEND_WORKER_FRACTION: f64 = 0.2;
/// Chance that hospital staff go in on a weekend day
pub const HOSPITAL_STAFF_WEEKEND_PROB: f64 = 0.4;
/// Chance of visiting a hospitalized housemate on a given day
pub const HOSPITAL_VISIT_HOUSEMATE_PROB: f64 = 0.25;
/// Chance of retiring in the year retirement age is reached
pub const RETIREMENT_PROB: f64 = 0.5;

/// Workplace size class upper bounds (inclusive)
pub const SMALL_COMPANY_MAXSIZE: u32 = 49;
pub const MID_COMPANY_MAXSIZE: u32 = 99;
pub const MEDIUM_COMPANY_MAXSIZE: u32 = 499;

/// Chance of sick leave being available, by workplace size class
pub const SICK_LEAVE_PROB_SMALL: f64 = 0.53;
pub const SICK_LEAVE_PROB_MID: f64 = 0.58;
pub const SICK_LEAVE_PROB_LARGE: f64 = 0.70;
pub const SICK_LEAVE_PROB_XLARGE: f64 = 0.85;

/// How often to print progress statements during the run
pub const DEBUG_ITERATION_PRINT: u32 = 10;
