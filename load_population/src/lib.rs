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

extern crate log;

pub mod parsing_error;
pub mod records;

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;

use crate::parsing_error::DataLoadingError;
use crate::records::{
    GroupQuartersRecord, HospitalRecord, HouseholdRecord, PersonRecord, SchoolRecord,
    WorkplaceRecord,
};

/// The complete set of synthetic population tables for one simulated region
///
/// Group quarters and hospitals are optional tables; all others must exist
pub struct SyntheticPopulation {
    pub households: Vec<HouseholdRecord>,
    pub group_quarters: Vec<GroupQuartersRecord>,
    pub people: Vec<PersonRecord>,
    pub schools: Vec<SchoolRecord>,
    pub workplaces: Vec<WorkplaceRecord>,
    pub hospitals: Vec<HospitalRecord>,
}

impl SyntheticPopulation {
    /// Loads every population table from the given directory
    ///
    /// Filenames are fixed: `households.csv`, `group_quarters.csv`, `people.csv`,
    /// `schools.csv`, `workplaces.csv` and `hospitals.csv`
    pub fn load_from_directory(directory: &str) -> Result<SyntheticPopulation, DataLoadingError> {
        let start = Instant::now();
        let dir = Path::new(directory);
        let households: Vec<HouseholdRecord> = read_table(&dir.join("households.csv"), true)?;
        let group_quarters: Vec<GroupQuartersRecord> =
            read_table(&dir.join("group_quarters.csv"), false)?;
        let people: Vec<PersonRecord> = read_table(&dir.join("people.csv"), true)?;
        let schools: Vec<SchoolRecord> = read_table(&dir.join("schools.csv"), true)?;
        let workplaces: Vec<WorkplaceRecord> = read_table(&dir.join("workplaces.csv"), true)?;
        let hospitals: Vec<HospitalRecord> = read_table(&dir.join("hospitals.csv"), false)?;
        info!(
            "Loaded synthetic population from {} in {:?}: {} households, {} group quarters, {} people, {} schools, {} workplaces, {} hospitals",
            directory,
            start.elapsed(),
            households.len(),
            group_quarters.len(),
            people.len(),
            schools.len(),
            workplaces.len(),
            hospitals.len()
        );
        Ok(SyntheticPopulation {
            households,
            group_quarters,
            people,
            schools,
            workplaces,
            hospitals,
        })
    }

    pub fn total_people(&self) -> usize {
        self.people.len()
    }
}

/// Reads one CSV table into records, skipping rows that fail to parse
///
/// A missing optional table returns an empty list; a missing required table is an error
fn read_table<T: DeserializeOwned>(
    path: &PathBuf,
    required: bool,
) -> Result<Vec<T>, DataLoadingError> {
    let filename = path.to_string_lossy().to_string();
    if !path.exists() {
        if required {
            return Err(DataLoadingError::MissingFile { filename });
        }
        warn!("Optional population file ({}) does not exist", filename);
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataLoadingError::from_csv(e, &filename))?;
    let start = Instant::now();
    let mut records = Vec::new();
    let mut skipped = 0_usize;
    for row in reader.deserialize() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => {
                // data integrity errors are recoverable, drop the row and continue
                let error = DataLoadingError::from_csv(e, &filename);
                warn!("Skipping malformed row: {:?}", error);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} malformed rows in {}", skipped, filename);
    }
    debug!(
        "Read {} records from {} in {:?}",
        records.len(),
        filename,
        start.elapsed()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use crate::records::{HouseholdRecord, PersonRecord, Sex};

    fn parse<T: serde::de::DeserializeOwned>(data: &str) -> Vec<T> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());
        reader.deserialize().map(|row| row.unwrap()).collect()
    }

    #[test]
    fn household_rows_parse() {
        let rows: Vec<HouseholdRecord> = parse(
            "label,latitude,longitude,census_tract,race,income,deme\n\
             H1,40.44,-79.99,42003140100,1,52000,0\n",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "H1");
        assert_eq!(rows[0].income, 52000);
        assert!((rows[0].latitude - 40.44).abs() < 1e-9);
    }

    #[test]
    fn person_rows_parse_with_empty_links() {
        let rows: Vec<PersonRecord> = parse(
            "label,household,age,sex,race,relationship,school,workplace\n\
             P1,H1,34,F,1,0,,W9\n\
             P2,H1,7,M,1,2,S4,\n",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sex, Sex::Female);
        assert!(rows[0].school.is_none());
        assert_eq!(rows[0].workplace.as_deref(), Some("W9"));
        assert_eq!(rows[1].school.as_deref(), Some("S4"));
        assert!(rows[1].workplace.is_none());
    }
}
