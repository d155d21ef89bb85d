// src/bin/setup_db.rs
use std::env;

use anyhow::{anyhow, Result};
use dotenv::dotenv;
use log::info;

use index_dashboard::config::AnalysisSettings;
use index_dashboard::services::calendar::normalize;
use index_dashboard::services::csv_source::read_observations_file;
use index_dashboard::services::db::DbStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL")?;
    let csv_path = env::args().nth(1).unwrap_or_else(|| "market_data.csv".to_string());
    let settings = AnalysisSettings::from_env()?;

    let db = DbStore::new(&database_url, 1)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
    db.ensure_schema()
        .await
        .map_err(|e| anyhow!("Failed to create market_data table: {}", e))?;

    info!("Reading observations from {}", csv_path);
    let rows = read_observations_file(&csv_path)?;
    let observations = normalize(rows, settings.zone)?;

    let written = db.insert_observations(&observations)
        .await
        .map_err(|e| anyhow!("Failed to insert observations: {}", e))?;

    println!("Database setup complete! {} rows written from {}", written, csv_path);
    Ok(())
}
