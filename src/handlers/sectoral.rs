// src/handlers/sectoral.rs
use std::collections::BTreeMap;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;
use log::{error, info};

use crate::config::AnalysisSettings;
use crate::models::{DateQuery, Envelope, SectoralRow};
use crate::services::db::MarketStore;
use super::error::ApiError;
use super::requested_date;

const FETCH_FAILED: &str = "Failed to fetch sectoral data";

/// duration -> rows, rows keeping their storage order.
pub fn group_by_duration(rows: Vec<SectoralRow>) -> BTreeMap<String, Vec<SectoralRow>> {
    let mut grouped: BTreeMap<String, Vec<SectoralRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.duration.clone()).or_default().push(row);
    }
    grouped
}

/// sector -> duration -> market cap change. A repeated (sector, duration) keeps the last row.
pub fn pivot_by_sector(rows: Vec<SectoralRow>) -> BTreeMap<String, BTreeMap<String, Option<f64>>> {
    let mut pivot: BTreeMap<String, BTreeMap<String, Option<f64>>> = BTreeMap::new();
    for row in rows {
        pivot.entry(row.sector).or_default().insert(row.duration, row.market_cap_change);
    }
    pivot
}

pub async fn get_sectoral(store: Arc<dyn MarketStore>) -> Result<Json, Rejection> {
    let rows = store.sectoral_performance(None).await.map_err(|e| {
        error!("Error fetching sectoral data: {}", e);
        warp::reject::custom(ApiError::new(FETCH_FAILED))
    })?;

    Ok(warp::reply::json(&Envelope::ok(group_by_duration(rows))))
}

pub async fn post_sectoral(
    query: DateQuery,
    store: Arc<dyn MarketStore>,
    settings: Arc<AnalysisSettings>,
) -> Result<Json, Rejection> {
    let date = requested_date("sectoral", &query, settings.zone)?;

    let rows = store.sectoral_performance(Some(date)).await.map_err(|e| {
        error!("Error fetching sectoral data for {}: {}", date, e);
        warp::reject::custom(ApiError::new(FETCH_FAILED))
    })?;

    info!("Sectoral query for {} returned {} rows", date, rows.len());
    Ok(warp::reply::json(&Envelope::ok(pivot_by_sector(rows))))
}
