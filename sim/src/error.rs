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

pub enum SimError {
    InitializationError {
        message: String,
    },
    /// A missing or malformed entry in the parameter table, fatal at startup
    Configuration {
        key: String,
        message: String,
    },
    /// A population record referencing something that does not exist
    ///
    /// Recoverable: the offending record is logged and skipped
    DataIntegrity {
        context: String,
        label: String,
    },
}

impl Debug for SimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::InitializationError { message } => {
                write!(f, "{} has not been Initialized", message)
            }
            SimError::Configuration { key, message } => {
                write!(f, "Configuration error for parameter ({}): {}", key, message)
            }
            SimError::DataIntegrity { context, label } => {
                write!(f, "Data integrity error for record ({}): {}", label, context)
            }
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for SimError {}
