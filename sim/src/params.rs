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
use std::fmt::Display;
use std::fs;
use std::str::FromStr;

use log::debug;

use crate::SimError;

/// The flat key -> value parameter table driving a simulation run
///
/// The file format is one `key = value` entry per line, with `#` comments.
/// Later entries override earlier ones, so a scenario file can be layered
/// on top of a defaults file by concatenation.
#[derive(Clone, Debug, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Params {
        Params {
            values: HashMap::new(),
        }
    }

    pub fn load_from_file(filename: &str) -> Result<Params, SimError> {
        let contents = fs::read_to_string(filename).map_err(|e| SimError::Configuration {
            key: filename.to_string(),
            message: format!("Cannot read parameter file: {}", e),
        })?;
        let mut params = Params::new();
        params.parse(&contents)?;
        debug!("Loaded {} parameters from {}", params.values.len(), filename);
        Ok(params)
    }

    pub fn parse(&mut self, contents: &str) -> Result<(), SimError> {
        for (line_number, line) in contents.lines().enumerate() {
            let line = match line.find('#') {
                Some(index) => &line[..index],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut split = line.splitn(2, '=');
            let key = split.next().unwrap_or_default().trim();
            let value = split.next().map(str::trim);
            match value {
                Some(value) if !key.is_empty() => {
                    self.values.insert(key.to_string(), value.to_string());
                }
                _ => {
                    return Err(SimError::Configuration {
                        key: line.to_string(),
                        message: format!("Malformed parameter on line {}", line_number + 1),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Retrieves a required parameter, failing with a fatal configuration error
    pub fn get<T: FromStr>(&self, key: &str) -> Result<T, SimError>
    where
        <T as FromStr>::Err: Display,
    {
        let raw = self.values.get(key).ok_or_else(|| SimError::Configuration {
            key: key.to_string(),
            message: String::from("Required parameter is missing"),
        })?;
        raw.parse().map_err(|e| SimError::Configuration {
            key: key.to_string(),
            message: format!("Cannot parse value ({}): {}", raw, e),
        })
    }

    /// Retrieves an optional parameter, substituting the given default
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, SimError>
    where
        <T as FromStr>::Err: Display,
    {
        if self.contains(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Enable flags are encoded as 0/1 in the table
    pub fn get_flag(&self, key: &str) -> Result<bool, SimError> {
        Ok(self.get_or::<u8>(key, 0)? == 1)
    }

    /// Retrieves a per-disease parameter such as `transmissibility[0]`
    pub fn get_indexed<T: FromStr>(&self, key: &str, index: usize) -> Result<T, SimError>
    where
        <T as FromStr>::Err: Display,
    {
        self.get(&format!("{}[{}]", key, index))
    }

    pub fn get_indexed_or<T: FromStr>(
        &self,
        key: &str,
        index: usize,
        default: T,
    ) -> Result<T, SimError>
    where
        <T as FromStr>::Err: Display,
    {
        self.get_or(&format!("{}[{}]", key, index), default)
    }

    /// Retrieves a whitespace separated list value
    pub fn get_list<T: FromStr>(&self, key: &str) -> Result<Vec<T>, SimError>
    where
        <T as FromStr>::Err: Display,
    {
        let raw = self.values.get(key).ok_or_else(|| SimError::Configuration {
            key: key.to_string(),
            message: String::from("Required parameter is missing"),
        })?;
        raw.split_whitespace()
            .map(|entry| {
                entry.parse().map_err(|e| SimError::Configuration {
                    key: key.to_string(),
                    message: format!("Cannot parse list entry ({}): {}", entry, e),
                })
            })
            .collect()
    }

    /// Builds an age keyed lookup from the `<prefix>_ages` / `<prefix>_values` pair
    ///
    /// Missing pairs produce an empty map, which always returns 0.0
    pub fn get_age_map(&self, prefix: &str) -> Result<AgeMap, SimError> {
        let ages_key = format!("{}_ages", prefix);
        let values_key = format!("{}_values", prefix);
        if !self.contains(&ages_key) && !self.contains(&values_key) {
            return Ok(AgeMap::default());
        }
        let upper_ages: Vec<u32> = self.get_list(&ages_key)?;
        let values: Vec<f64> = self.get_list(&values_key)?;
        if upper_ages.len() != values.len() {
            return Err(SimError::Configuration {
                key: prefix.to_string(),
                message: format!(
                    "Age map has {} ages but {} values",
                    upper_ages.len(),
                    values.len()
                ),
            });
        }
        Ok(AgeMap { upper_ages, values })
    }
}

/// A stepwise age keyed value table: each entry covers ages up to its bound
#[derive(Clone, Debug, Default)]
pub struct AgeMap {
    upper_ages: Vec<u32>,
    values: Vec<f64>,
}

impl AgeMap {
    pub fn new(upper_ages: Vec<u32>, values: Vec<f64>) -> AgeMap {
        assert_eq!(upper_ages.len(), values.len());
        AgeMap { upper_ages, values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Looks up the value for the given age, falling into the last band when older
    pub fn find_value(&self, age: u32) -> f64 {
        for (bound, value) in self.upper_ages.iter().zip(&self.values) {
            if age <= *bound {
                return *value;
            }
        }
        self.values.last().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{AgeMap, Params};

    #[test]
    fn parses_keys_comments_and_overrides() {
        let mut params = Params::new();
        params
            .parse(
                "# scenario\n\
                 days = 100\n\
                 transmissibility[0] = 0.5   # per disease\n\
                 days = 120\n",
            )
            .unwrap();
        assert_eq!(params.get::<u32>("days").unwrap(), 120);
        assert!((params.get_indexed::<f64>("transmissibility", 0).unwrap() - 0.5).abs() < 1e-12);
        assert!(params.get::<u32>("missing").is_err());
        assert_eq!(params.get_or::<u32>("missing", 7).unwrap(), 7);
    }

    #[test]
    fn malformed_line_is_fatal() {
        let mut params = Params::new();
        assert!(params.parse("days 100").is_err());
    }

    #[test]
    fn age_map_bands() {
        let map = AgeMap::new(vec![17, 64, 120], vec![0.1, 0.2, 0.7]);
        assert!((map.find_value(0) - 0.1).abs() < 1e-12);
        assert!((map.find_value(17) - 0.1).abs() < 1e-12);
        assert!((map.find_value(18) - 0.2).abs() < 1e-12);
        assert!((map.find_value(90) - 0.7).abs() < 1e-12);
        assert!((map.find_value(200) - 0.7).abs() < 1e-12);
        assert_eq!(AgeMap::default().find_value(30), 0.0);
    }
}
