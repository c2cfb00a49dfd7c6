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

use crate::{DayOfWeek, SimError};

const DAYS_PER_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u32, month: u32) -> u32 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_PER_MONTH[(month - 1) as usize]
    }
}

/// A civil date, parsed from `YYYY-MM-DD`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Date {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl Date {
    pub fn parse(text: &str) -> Result<Date, SimError> {
        let error = |message: &str| SimError::Configuration {
            key: text.to_string(),
            message: message.to_string(),
        };
        let fields: Vec<&str> = text.split('-').collect();
        if fields.len() != 3 {
            return Err(error("Dates must be formatted as YYYY-MM-DD"));
        }
        let year = fields[0].parse().map_err(|_| error("Bad year"))?;
        let month = fields[1].parse().map_err(|_| error("Bad month"))?;
        let day = fields[2].parse().map_err(|_| error("Bad day"))?;
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return Err(error("Date does not exist"));
        }
        Ok(Date { year, month, day })
    }

    fn next(self) -> Date {
        if self.day < days_in_month(self.year, self.month) {
            Date {
                day: self.day + 1,
                ..self
            }
        } else if self.month < 12 {
            Date {
                year: self.year,
                month: self.month + 1,
                day: 1,
            }
        } else {
            Date {
                year: self.year + 1,
                month: 1,
                day: 1,
            }
        }
    }

    pub fn day_of_year(&self) -> u32 {
        let mut total = self.day;
        for month in 1..self.month {
            total += days_in_month(self.year, month);
        }
        total
    }

    /// Days since 0000-03-01, used only to derive the weekday
    fn civil_day_number(&self) -> i64 {
        let y = if self.month <= 2 {
            self.year as i64 - 1
        } else {
            self.year as i64
        };
        let era = y / 400;
        let yoe = y - era * 400;
        let m = self.month as i64;
        let d = self.day as i64;
        let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        era * 146097 + doe
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        // civil day 0 (0000-03-01) was a Wednesday
        let weekday = (self.civil_day_number() + 2).rem_euclid(7);
        DayOfWeek::from_index(weekday as u32)
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// The simulation clock: one tick per civil day from the configured start date
///
/// The core only ever asks "is today a weekday", "what day of year is this"
/// and "is this a school year boundary"
pub struct Calendar {
    start: Date,
    current: Date,
    day: u32,
    weekday: DayOfWeek,
}

impl Calendar {
    pub fn new(start: Date) -> Calendar {
        Calendar {
            start,
            current: start,
            day: 0,
            weekday: start.day_of_week(),
        }
    }

    pub fn advance_to(&mut self, day: u32) {
        while self.day < day {
            self.current = self.current.next();
            self.weekday = self.weekday.next_day();
            self.day += 1;
        }
    }

    pub fn simulation_day(&self) -> u32 {
        self.day
    }

    pub fn date(&self) -> Date {
        self.current
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        self.weekday
    }

    pub fn is_weekday(&self) -> bool {
        !self.weekday.is_weekend()
    }

    pub fn day_of_year(&self) -> u32 {
        self.current.day_of_year()
    }

    /// Last day of the school year
    pub fn is_school_year_end(&self) -> bool {
        self.current.month == 7 && self.current.day == 31
    }

    /// First day of the new school year, when profiles are re-evaluated
    pub fn is_school_year_start(&self) -> bool {
        self.current.month == 8 && self.current.day == 1
    }
}

#[cfg(test)]
mod tests {
    use super::{Calendar, Date};
    use crate::DayOfWeek;

    #[test]
    fn weekday_is_correct() {
        // 2020-01-01 was a Wednesday
        let date = Date::parse("2020-01-01").unwrap();
        assert_eq!(date.day_of_week(), DayOfWeek::Wednesday);
        assert_eq!(Date::parse("2021-08-01").unwrap().day_of_week(), DayOfWeek::Sunday);
    }

    #[test]
    fn advancing_crosses_month_and_year_boundaries() {
        let mut calendar = Calendar::new(Date::parse("2020-12-30").unwrap());
        calendar.advance_to(2);
        assert_eq!(calendar.date(), Date::parse("2021-01-01").unwrap());
        assert_eq!(calendar.day_of_year(), 1);
    }

    #[test]
    fn leap_day_exists() {
        let mut calendar = Calendar::new(Date::parse("2020-02-28").unwrap());
        calendar.advance_to(1);
        assert_eq!(calendar.date(), Date::parse("2020-02-29").unwrap());
        assert!(Date::parse("2021-02-29").is_err());
    }

    #[test]
    fn school_year_triggers() {
        let mut calendar = Calendar::new(Date::parse("2020-07-30").unwrap());
        calendar.advance_to(1);
        assert!(calendar.is_school_year_end());
        calendar.advance_to(2);
        assert!(calendar.is_school_year_start());
    }
}
