// src/bin/analyze_csv.rs
use std::env;

use anyhow::{anyhow, Result};
use log::info;

use index_dashboard::config::AnalysisSettings;
use index_dashboard::models::Envelope;
use index_dashboard::services::analysis::analyze;
use index_dashboard::services::calendar::normalize;
use index_dashboard::services::csv_source::read_observations_file;

fn main() -> Result<()> {
    env_logger::init();

    let csv_path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: analyze_csv <observations.csv>"))?;
    let settings = AnalysisSettings::from_env()?;

    let rows = read_observations_file(&csv_path)?;
    info!("Loaded {} rows from {}", rows.len(), csv_path);

    let observations = normalize(rows, settings.zone)?;
    let results = analyze(observations, &settings.options)?;

    println!("{}", serde_json::to_string_pretty(&Envelope::ok(results))?);
    Ok(())
}
