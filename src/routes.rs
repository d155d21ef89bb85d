// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;

use log::info;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{MethodNotAllowed, Rejection};
use warp::{Filter, Reply};

use crate::config::AnalysisSettings;
use crate::handlers::error::ApiError;
use crate::handlers::{bse500, dates, marketdata, sectoral};
use crate::models::{DateQuery, Envelope};
use crate::services::db::MarketStore;

const MAX_BODY_BYTES: u64 = 16 * 1024;

// Every failure leaves in the same { success: false, error } envelope.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if err.find::<BodyDeserializeError>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid request body".to_string();
    } else if err.find::<MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&Envelope::failure(message)),
        code,
    ))
}

fn date_body() -> impl Filter<Extract = (DateQuery,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(
    store: Arc<dyn MarketStore>,
    settings: Arc<AnalysisSettings>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let store_filter = warp::any().map(move || store.clone());
    let settings_filter = warp::any().map(move || settings.clone());

    let marketdata_route = warp::path!("api" / "marketdata")
        .and(warp::get())
        .and(store_filter.clone())
        .and(settings_filter.clone())
        .and_then(marketdata::get_market_analysis);

    let dates_route = warp::path!("api" / "dates")
        .and(warp::get())
        .and(store_filter.clone())
        .and_then(dates::get_dates);

    let bse500_route = warp::path!("api" / "bse500")
        .and(warp::get())
        .and(store_filter.clone())
        .and_then(bse500::get_bse500);

    let bse500_by_date_route = warp::path!("api" / "bse500")
        .and(warp::post())
        .and(date_body())
        .and(store_filter.clone())
        .and(settings_filter.clone())
        .and_then(bse500::post_bse500);

    let sectoral_route = warp::path!("api" / "sectoral")
        .and(warp::get())
        .and(store_filter.clone())
        .and_then(sectoral::get_sectoral);

    let sectoral_by_date_route = warp::path!("api" / "sectoral")
        .and(warp::post())
        .and(date_body())
        .and(store_filter.clone())
        .and(settings_filter.clone())
        .and_then(sectoral::post_sectoral);

    info!("All routes configured successfully.");

    marketdata_route
        .or(dates_route)
        .or(bse500_route)
        .or(bse500_by_date_route)
        .or(sectoral_route)
        .or(sectoral_by_date_route)
        .recover(handle_rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use crate::models::{DateRow, RawObservation, SectoralRow};
    use crate::BoxError;

    #[derive(Default)]
    struct MemoryStore {
        observations: Vec<RawObservation>,
        dates: Vec<DateRow>,
        bse500: Vec<Value>,
        sectoral: Vec<SectoralRow>,
        offline: bool,
    }

    impl MemoryStore {
        fn check(&self) -> Result<(), BoxError> {
            if self.offline {
                return Err("connection refused".into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MarketStore for MemoryStore {
        async fn market_observations(&self) -> Result<Vec<RawObservation>, BoxError> {
            self.check()?;
            Ok(self.observations.clone())
        }

        async fn available_dates(&self) -> Result<Vec<DateRow>, BoxError> {
            self.check()?;
            Ok(self.dates.clone())
        }

        async fn bse500_distribution(&self, on: Option<NaiveDate>) -> Result<Vec<Value>, BoxError> {
            self.check()?;
            Ok(self.bse500.iter()
                .filter(|row| match on {
                    Some(date) => row["date_captured"].as_str() == Some(date.to_string().as_str()),
                    None => true,
                })
                .cloned()
                .collect())
        }

        async fn sectoral_performance(&self, on: Option<NaiveDate>) -> Result<Vec<SectoralRow>, BoxError> {
            self.check()?;
            Ok(self.sectoral.iter()
                .filter(|row| on.map_or(true, |date| row.date_captured == date))
                .cloned()
                .collect())
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn raw(index_name: &str, date: &str, high: f64, close: f64) -> RawObservation {
        RawObservation { index_name: index_name.into(), date: date.into(), high, close }
    }

    fn filter_for(store: MemoryStore) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
        routes(Arc::new(store), Arc::new(AnalysisSettings::default()))
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn marketdata_returns_analysis_envelope() {
        let closes: [f64; 7] = [100.0, 95.0, 88.0, 70.0, 75.0, 90.0, 101.0];
        let observations = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let high = if i == 0 { 100.0 } else { close.min(100.0) };
                raw("IDX", &format!("2023-01-0{}", i + 1), high, close)
            })
            .collect();
        let filter = filter_for(MemoryStore { observations, ..Default::default() });

        let res = warp::test::request().method("GET").path("/api/marketdata").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = body_json(res.body());
        assert_eq!(body["success"], json!(true));
        let first = &body["data"][0];
        assert_eq!(first["index_name"], json!("IDX"));
        assert_eq!(first["year"], json!(2023));
        assert_eq!(first["peak_date"], json!("2023-01-01"));
        assert_eq!(first["max_drawdown_pct"], json!(30.0));
        assert_eq!(first["drawdown_date"], json!("2023-01-04"));
        assert_eq!(first["recovery_days"], json!(3));
        assert_eq!(first["recovered"], json!(true));
    }

    #[tokio::test]
    async fn marketdata_hides_storage_errors() {
        let filter = filter_for(MemoryStore { offline: true, ..Default::default() });

        let res = warp::test::request().method("GET").path("/api/marketdata").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(res.body()),
            json!({ "success": false, "error": "Failed to fetch market data analysis" })
        );
    }

    #[tokio::test]
    async fn marketdata_rejects_zero_high_without_partial_data() {
        let observations = vec![
            raw("IDX", "2023-01-02", 100.0, 99.0),
            raw("IDX", "2023-01-03", 0.0, 98.0),
        ];
        let filter = filter_for(MemoryStore { observations, ..Default::default() });

        let res = warp::test::request().method("GET").path("/api/marketdata").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(res.body());
        assert_eq!(body["success"], json!(false));
        assert!(body.get("data").is_none());
        assert!(body["error"].as_str().unwrap().contains("high must be positive"));
    }

    #[tokio::test]
    async fn marketdata_with_no_rows_is_empty_success() {
        let filter = filter_for(MemoryStore::default());

        let res = warp::test::request().method("GET").path("/api/marketdata").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res.body()), json!({ "success": true, "data": [] }));
    }

    #[tokio::test]
    async fn dates_are_listed() {
        let dates = vec![DateRow { date_captured: d(2024, 3, 5) }, DateRow { date_captured: d(2024, 3, 4) }];
        let filter = filter_for(MemoryStore { dates, ..Default::default() });

        let res = warp::test::request().method("GET").path("/api/dates").reply(&filter).await;
        assert_eq!(
            body_json(res.body()),
            json!({ "success": true, "data": [{ "date_captured": "2024-03-05" }, { "date_captured": "2024-03-04" }] })
        );
    }

    #[tokio::test]
    async fn bse500_post_requires_a_date() {
        let filter = filter_for(MemoryStore::default());

        let res = warp::test::request()
            .method("POST")
            .path("/api/bse500")
            .json(&json!({}))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res.body()), json!({ "success": false, "error": "Date parameter is required" }));
    }

    #[tokio::test]
    async fn bse500_post_filters_by_market_date() {
        let bse500 = vec![
            json!({ "date_captured": "2024-03-05", "bucket": "0-10%", "count": 42 }),
            json!({ "date_captured": "2024-03-04", "bucket": "0-10%", "count": 40 }),
        ];
        let filter = filter_for(MemoryStore { bse500, ..Default::default() });

        // Midnight IST sent as UTC by the browser.
        let res = warp::test::request()
            .method("POST")
            .path("/api/bse500")
            .json(&json!({ "date": "2024-03-04T18:30:00.000Z" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res.body());
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["count"], json!(42));
    }

    #[tokio::test]
    async fn sectoral_get_groups_by_duration_and_post_pivots() {
        let sectoral = vec![
            SectoralRow { date_captured: d(2024, 3, 5), duration: "1M".into(), sector: "Banks".into(), market_cap_change: Some(1.5) },
            SectoralRow { date_captured: d(2024, 3, 5), duration: "1W".into(), sector: "Banks".into(), market_cap_change: Some(0.4) },
            SectoralRow { date_captured: d(2024, 3, 4), duration: "1W".into(), sector: "IT".into(), market_cap_change: Some(-1.0) },
        ];
        let filter = filter_for(MemoryStore { sectoral, ..Default::default() });

        let res = warp::test::request().method("GET").path("/api/sectoral").reply(&filter).await;
        let body = body_json(res.body());
        assert_eq!(body["data"]["1W"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["1M"][0]["sector"], json!("Banks"));

        let res = warp::test::request()
            .method("POST")
            .path("/api/sectoral")
            .json(&json!({ "date": "2024-03-05" }))
            .reply(&filter)
            .await;
        assert_eq!(
            body_json(res.body()),
            json!({ "success": true, "data": { "Banks": { "1M": 1.5, "1W": 0.4 } } })
        );
    }

    #[tokio::test]
    async fn unparseable_post_date_is_bad_request() {
        let filter = filter_for(MemoryStore::default());

        let res = warp::test::request()
            .method("POST")
            .path("/api/sectoral")
            .json(&json!({ "date": "last tuesday" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res.body())["success"], json!(false));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found_envelope() {
        let filter = filter_for(MemoryStore::default());

        let res = warp::test::request().method("GET").path("/api/nothing").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res.body()), json!({ "success": false, "error": "Not Found" }));
    }
}
