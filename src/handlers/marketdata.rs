// src/handlers/marketdata.rs
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;
use log::{debug, error, info, warn};

use crate::config::AnalysisSettings;
use crate::models::Envelope;
use crate::services::{analysis, calendar};
use crate::services::db::MarketStore;
use super::error::ApiError;

pub async fn get_market_analysis(
    store: Arc<dyn MarketStore>,
    settings: Arc<AnalysisSettings>,
) -> Result<Json, Rejection> {
    info!("Handling request for market data analysis");

    let rows = store.market_observations().await.map_err(|e| {
        error!("Error fetching market data analysis: {}", e);
        warp::reject::custom(ApiError::new("Failed to fetch market data analysis"))
    })?;
    debug!("Loaded {} market data rows", rows.len());

    let results = calendar::normalize(rows, settings.zone)
        .and_then(|observations| analysis::analyze(observations, &settings.options))
        .map_err(|e| {
            warn!("Market data analysis failed: {}", e);
            warp::reject::custom(ApiError::analysis_error(&e))
        })?;

    info!("Analyzed {} index-years", results.len());
    Ok(warp::reply::json(&Envelope::ok(results)))
}
