//! headmon CLI
//!
//! Usage: headmon <table.csv> [config.toml]
//!
//! Environment (a `.env` file is read if present):
//! - `HEADMON_CONFIG`     config path when none is given on the command line
//! - `HEADMON_LOG_LEVEL`  debug | info | warn | error (default info)
//! - `HEADMON_LOG_FILE`   append log entries to this file

use std::env;
use std::process;

use chrono::Utc;

use headmon::config::{self, HeadmonConfig};
use headmon::ingest::table::load_table;
use headmon::logging::{self, Component, LogLevel};
use headmon::model::HeadError;
use headmon::report;

fn main() {
    dotenv::dotenv().ok();

    let level = env::var("HEADMON_LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse::<LogLevel>().ok())
        .unwrap_or(LogLevel::Info);
    let log_file = env::var("HEADMON_LOG_FILE").ok();
    logging::init_logger(level, log_file.as_deref(), log_file.is_some());

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(table_path) = args.first() else {
        eprintln!("Usage: headmon <table.csv> [config.toml]");
        process::exit(2);
    };
    let config_path = args.get(1).cloned().or_else(|| env::var("HEADMON_CONFIG").ok());

    match run(table_path, config_path.as_deref()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            logging::error(Component::Cli, Some(table_path.as_str()), &e.to_string());
            process::exit(1);
        }
    }
}

fn run(table_path: &str, config_path: Option<&str>) -> Result<String, HeadError> {
    let config = match config_path {
        Some(path) => {
            logging::debug(Component::Config, Some(path), "Loading configuration");
            config::load_config(path)?
        }
        None => HeadmonConfig::default(),
    };

    let table = load_table(table_path, &config.ingest)?;
    let report = report::build_report(&table, &config, table_path, Utc::now())?;

    logging::info(
        Component::Detector,
        Some(table_path),
        &format!(
            "{} outliers, {} jumps, {} drops between {} and {}",
            report.flagged.counts.outliers,
            report.flagged.counts.jumps,
            report.flagged.counts.drops,
            report.flagged.domain_start.format("%Y-%m-%d"),
            report.flagged.domain_end.format("%Y-%m-%d"),
        ),
    );

    report::to_json(&report)
}
