// src/handlers/bse500.rs
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;
use log::{error, info};

use crate::config::AnalysisSettings;
use crate::models::{DateQuery, Envelope};
use crate::services::db::MarketStore;
use super::error::ApiError;
use super::requested_date;

const FETCH_FAILED: &str = "Failed to fetch BSE 500 distribution";

pub async fn get_bse500(store: Arc<dyn MarketStore>) -> Result<Json, Rejection> {
    let rows = store.bse500_distribution(None).await.map_err(|e| {
        error!("Error fetching BSE 500 distribution: {}", e);
        warp::reject::custom(ApiError::new(FETCH_FAILED))
    })?;

    Ok(warp::reply::json(&Envelope::ok(rows)))
}

pub async fn post_bse500(
    query: DateQuery,
    store: Arc<dyn MarketStore>,
    settings: Arc<AnalysisSettings>,
) -> Result<Json, Rejection> {
    let date = requested_date("BSE500", &query, settings.zone)?;

    let rows = store.bse500_distribution(Some(date)).await.map_err(|e| {
        error!("Error fetching BSE 500 distribution for {}: {}", date, e);
        warp::reject::custom(ApiError::new(FETCH_FAILED))
    })?;

    info!("BSE500 query for {} returned {} rows", date, rows.len());
    Ok(warp::reply::json(&Envelope::ok(rows)))
}
