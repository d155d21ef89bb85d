// src/handlers/mod.rs
pub mod error;
pub mod marketdata;
pub mod dates;
pub mod bse500;
pub mod sectoral;

use chrono::NaiveDate;
use chrono_tz::Tz;
use log::{info, warn};
use warp::Rejection;

use crate::models::DateQuery;
use crate::services::calendar::canonical_date;
use error::ApiError;

/// Pulls the `date` out of a POST body and reduces it to a calendar day in `zone`.
fn requested_date(endpoint: &str, query: &DateQuery, zone: Tz) -> Result<NaiveDate, Rejection> {
    let raw = match query.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(warp::reject::custom(ApiError::bad_request("Date parameter is required"))),
    };

    info!("Raw date received by {} endpoint: {}", endpoint, raw);
    canonical_date(raw, zone).map_err(|e| {
        warn!("Rejecting {} request: {}", endpoint, e);
        warp::reject::custom(ApiError::bad_request(format!("Invalid date parameter: {}", raw)))
    })
}
