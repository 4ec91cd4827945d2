/**
 * RecoFactors
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

extern crate getopts;
extern crate recofactors;
extern crate tracing_subscriber;

use std::env;
use std::error::Error;
use std::io::stdout;
use std::process;

use getopts::{Matches, Options};
use tracing_subscriber::EnvFilter;

use recofactors::config::Config;
use recofactors::factorizer::Strategy;
use recofactors::{io, store, Outcome};

fn main() {

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("d", "dimension", "Embedding dimension (optional, defaults to CF_FACTORS or 32).",
        "NUMBER");
    opts.optopt("n", "iterations", "Number of passes of the fallback ALS solver (optional, \
        defaults to CF_ITERATIONS or 10).", "NUMBER");
    opts.optopt("s", "strategy", "Factorization strategy to use instead of the first available \
        one: implicit-als, warp or als (optional).", "NAME");
    opts.optopt("", "seed", "Seed for the random initialization of the factors (optional).",
        "NUMBER");
    opts.optflag("", "status", "Report the freshness of the factor tables instead of training.");
    opts.optflag("", "json", "Report the freshness as JSON, one object per line.");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let overrides = match parse_overrides(&matches) {
        Ok(overrides) => overrides,
        Err(hint) => return print_usage_and_exit(&program, opts, Some(&hint)),
    };

    let config = match configure(overrides) {
        Ok(config) => config,
        Err(failure) => {
            eprintln!("{}", failure);
            process::exit(1);
        },
    };

    let result = if matches.opt_present("status") {
        report_status(&config, matches.opt_present("json"))
    } else {
        train(&config)
    };

    if let Err(failure) = result {
        eprintln!("{}", failure);
        process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]\n\nDatabase access is configured through the \
        DB_* environment variables.", program);
    eprint!("{}", opts.usage(&brief));

    if hint.is_some() {
        process::exit(2);
    }
}

/// Settings given on the command line, they take precedence over the environment.
#[derive(Default)]
struct Overrides {
    dimension: Option<usize>,
    iterations: Option<usize>,
    seed: Option<u64>,
    strategy: Option<Strategy>,
}

fn parse_overrides(matches: &Matches) -> Result<Overrides, String> {

    let dimension = matches.opt_get::<usize>("d")
        .map_err(|failure| format!("Problem with option 'dimension': {}", failure))?;

    let iterations = matches.opt_get::<usize>("n")
        .map_err(|failure| format!("Problem with option 'iterations': {}", failure))?;

    let seed = matches.opt_get::<u64>("seed")
        .map_err(|failure| format!("Problem with option 'seed': {}", failure))?;

    let strategy = match matches.opt_str("s") {
        Some(name) => Some(name.parse::<Strategy>()
            .map_err(|failure| format!("Problem with option 'strategy': {}", failure))?),
        None => None,
    };

    Ok(Overrides { dimension, iterations, seed, strategy })
}

/// Environment first, command line options on top.
fn configure(overrides: Overrides) -> Result<Config, Box<dyn Error>> {

    let mut config = Config::from_env()?;

    if let Some(dimension) = overrides.dimension {
        config.training.dimension = dimension;
    }
    if let Some(iterations) = overrides.iterations {
        config.training.iterations = iterations;
    }
    if overrides.seed.is_some() {
        config.training.seed = overrides.seed;
    }
    if overrides.strategy.is_some() {
        config.training.strategy = overrides.strategy;
    }

    config.validate()?;

    Ok(config)
}

fn train(config: &Config) -> Result<(), Box<dyn Error>> {

    match recofactors::train(config, &config.database)? {
        Outcome::NoInteractions => println!("No interactions; skipping."),
        Outcome::Trained(summary) => println!(
            "users={} items={} dim={}",
            summary.num_users,
            summary.num_items,
            summary.dimension,
        ),
    }

    Ok(())
}

fn report_status(config: &Config, as_json: bool) -> Result<(), Box<dyn Error>> {
    let report = store::freshness_report(&config.database, recofactors::run_timestamp())?;
    io::write_status(&mut stdout(), &report, as_json)?;
    Ok(())
}
