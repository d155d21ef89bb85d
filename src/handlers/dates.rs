// src/handlers/dates.rs
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;
use log::{debug, error};

use crate::models::Envelope;
use crate::services::db::MarketStore;
use super::error::ApiError;

pub async fn get_dates(store: Arc<dyn MarketStore>) -> Result<Json, Rejection> {
    let dates = store.available_dates().await.map_err(|e| {
        error!("Error fetching dates: {}", e);
        warp::reject::custom(ApiError::new("Failed to fetch dates"))
    })?;

    debug!("Available dates: {}", dates.len());
    Ok(warp::reply::json(&Envelope::ok(dates)))
}
