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

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{App, Arg};
use log::{error, info};
use uuid::Uuid;

use load_population::SyntheticPopulation;
use sim::params::Params;
use sim::simulator::Simulator;
use sim::simulator_builder::SimulatorBuilder;

fn get_cmd_arguments() -> clap::ArgMatches<'static> {
    App::new("Epidemic Simulation Using Synthetic Populations")
        .version("0.1")
        .author("Sam Ralph")
        .about("Simulates the spread of infectious disease through a synthetic population")
        .usage(
            "run --config=<params> --population=<directory>\
            \n    The parameter file drives every model option (key = value lines)\
            \n    The population directory holds the synthetic population tables:\
            \n        households.csv, people.csv, schools.csv, workplaces.csv\
            \n        plus optional group_quarters.csv and hospitals.csv",
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .help("The simulation parameter file")
                .require_equals(true)
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("population")
                .long("population")
                .help("The directory containing the synthetic population tables")
                .require_equals(true)
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("output-directory")
                .long("output-directory")
                .help("Where to store the run's report files")
                .require_equals(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("number-of-threads")
                .long("number-of-threads")
                .help("The number of threads for the agent and place phases")
                .require_equals(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("dump-on-error")
                .long("dump-on-error")
                .help("Write a JSON dump of the simulation state if the run fails"),
        )
        .get_matches()
}

fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    let arguments = get_cmd_arguments();

    let threads = arguments
        .value_of("number-of-threads")
        .map(str::parse)
        .transpose()
        .context("--number-of-threads must be an integer")?
        .unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to size the thread pool")?;
    info!("Using {} threads", threads);

    let config = arguments.value_of("config").expect("config is required");
    let population_directory = arguments
        .value_of("population")
        .expect("population is required");
    let output_directory = match arguments.value_of("output-directory") {
        Some(directory) => PathBuf::from(directory),
        None => PathBuf::from("output").join(Uuid::new_v4().to_string()),
    };

    let params = Params::load_from_file(config).context("Loading the parameter file")?;
    let data = SyntheticPopulation::load_from_directory(population_directory)
        .context("Loading the synthetic population")?;

    let mut simulator = SimulatorBuilder::new(data, params)
        .build()
        .context("Building the simulation")?;

    let outcome = simulator.run();
    if let Err(e) = &outcome {
        error!("Simulation failed: {:?}", e);
        if arguments.is_present("dump-on-error") {
            simulator.error_dump_json("crash.json")?;
        }
    }
    outcome?;

    simulator.finalize();
    write_reports(&simulator, &output_directory).context("Writing reports")?;
    info!("Reports written to {}", output_directory.display());
    Ok(())
}

/// Emits the daily, per-place and stratified CSV reports
fn write_reports(simulator: &Simulator, directory: &Path) -> Result<()> {
    fs::create_dir_all(directory)
        .context(format!("Creating output directory {}", directory.display()))?;

    let mut daily = csv::Writer::from_path(directory.join("daily.csv"))?;
    for snapshot in simulator.statistics.snapshots() {
        daily.serialize(snapshot)?;
    }
    daily.flush()?;

    let mut places = csv::Writer::from_path(directory.join("places.csv"))?;
    places.write_record([
        "label",
        "kind",
        "size",
        "first_infectious_day",
        "last_infectious_day",
        "total_infections",
        "attack_rate",
    ])?;
    for place in &simulator.registry.places {
        let total: u32 = place.total_infections.iter().sum();
        if place.first_infectious_day < 0 {
            continue;
        }
        let attack_rate = if place.size() > 0 {
            f64::from(total) / f64::from(place.size())
        } else {
            0.0
        };
        places.write_record([
            place.label.clone(),
            place.kind().to_string(),
            place.size().to_string(),
            place.first_infectious_day.to_string(),
            place.last_infectious_day.to_string(),
            total.to_string(),
            format!("{:.6}", attack_rate),
        ])?;
    }
    places.flush()?;

    let mut strata = csv::Writer::from_path(directory.join("strata.csv"))?;
    strata.write_record(["disease", "stratum", "key", "first_day", "exposures"])?;
    for disease in &simulator.diseases {
        let d = disease.id();
        for (county, (first, total)) in simulator.statistics.counties_exposed(d) {
            strata.write_record([
                d.to_string(),
                "county".to_string(),
                county.to_string(),
                first.to_string(),
                total.to_string(),
            ])?;
        }
        for (tract, (first, total)) in simulator.statistics.tracts_exposed(d) {
            strata.write_record([
                d.to_string(),
                "census_tract".to_string(),
                tract.to_string(),
                first.to_string(),
                total.to_string(),
            ])?;
        }
        for (school, (first, total)) in simulator.statistics.schools_exposed(d) {
            strata.write_record([
                d.to_string(),
                "school".to_string(),
                school.to_string(),
                first.to_string(),
                total.to_string(),
            ])?;
        }
        for (quartile, total) in simulator
            .statistics
            .income_quartiles_exposed(d)
            .iter()
            .enumerate()
        {
            strata.write_record([
                d.to_string(),
                "income_quartile".to_string(),
                quartile.to_string(),
                String::new(),
                total.to_string(),
            ])?;
        }
        for (group, total) in simulator.statistics.age_groups_exposed(d).iter().enumerate() {
            strata.write_record([
                d.to_string(),
                "age_group".to_string(),
                group.to_string(),
                String::new(),
                total.to_string(),
            ])?;
        }
    }
    strata.flush()?;
    Ok(())
}
