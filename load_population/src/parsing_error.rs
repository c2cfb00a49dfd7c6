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

use std::fmt::{Debug, Display, Formatter};

/// Everything that can go wrong reading the population tables
///
/// A missing required table is fatal; a row that fails to parse is
/// recoverable and reported per row by the loader
pub enum DataLoadingError {
    /// An error occurs parsing a CSV table, either opening it or on one row
    CsvError {
        source: csv::Error,
        filename: String,
    },
    /// A required population file does not exist
    MissingFile { filename: String },
}

impl DataLoadingError {
    pub fn from_csv(source: csv::Error, filename: &str) -> DataLoadingError {
        DataLoadingError::CsvError {
            source,
            filename: filename.to_string(),
        }
    }
}

impl Debug for DataLoadingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataLoadingError::CsvError { source, filename } => {
                write!(f, "Failed to parse CSV file ({}): {}", filename, source)
            }
            DataLoadingError::MissingFile { filename } => {
                write!(f, "Population file ({}) does not exist", filename)
            }
        }
    }
}

impl Display for DataLoadingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for DataLoadingError {}
