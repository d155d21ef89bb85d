// src/services/db.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{error, info};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::models::{DateRow, Observation, RawObservation, SectoralRow};
use crate::BoxError;

/// Read side of the dashboard tables, as the HTTP handlers see it.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Every `market_data` row, ordered by index then date.
    async fn market_observations(&self) -> Result<Vec<RawObservation>, BoxError>;

    /// Capture dates present in either the BSE 500 or the sectoral table, newest first.
    async fn available_dates(&self) -> Result<Vec<DateRow>, BoxError>;

    async fn bse500_distribution(&self, on: Option<NaiveDate>) -> Result<Vec<Value>, BoxError>;

    async fn sectoral_performance(&self, on: Option<NaiveDate>) -> Result<Vec<SectoralRow>, BoxError>;
}

pub struct DbStore {
    pub(crate) pool: PgPool
}

impl DbStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<(), BoxError> {
        match sqlx::query("SELECT NOW()").execute(&self.pool).await {
            Ok(_) => {
                info!("Database connected successfully");
                Ok(())
            }
            Err(e) => {
                error!("Database connection error: {}", e);
                Err(e.into())
            }
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS public.market_data (
                index_name TEXT NOT NULL,
                "date" DATE NOT NULL,
                high NUMERIC NOT NULL,
                "close" NUMERIC NOT NULL,
                PRIMARY KEY (index_name, "date")
            )
            "#
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts observations keyed by (index_name, date); returns rows written.
    pub async fn insert_observations(&self, observations: &[Observation]) -> Result<u64, BoxError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for obs in observations {
            let result = sqlx::query(
                r#"
                INSERT INTO public.market_data (index_name, "date", high, "close")
                VALUES ($1, $2, $3::numeric, $4::numeric)
                ON CONFLICT (index_name, "date") DO UPDATE SET
                    high = EXCLUDED.high,
                    "close" = EXCLUDED."close"
                "#
            )
            .bind(&obs.index_name)
            .bind(obs.date)
            .bind(obs.high)
            .bind(obs.close)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}

fn required_price(row: &PgRow, column: &str, index_name: &str, date: &str) -> Result<f64, BoxError> {
    let value: Option<f64> = row.try_get(column)?;
    value.ok_or_else(|| format!("{} on {} has no {} value", index_name, date, column).into())
}

fn sectoral_row(row: &PgRow) -> Result<SectoralRow, sqlx::Error> {
    Ok(SectoralRow {
        date_captured: row.try_get("date_captured")?,
        duration: row.try_get("duration")?,
        sector: row.try_get("sector")?,
        market_cap_change: row.try_get("market_cap_change")?,
    })
}

#[async_trait]
impl MarketStore for DbStore {
    async fn market_observations(&self) -> Result<Vec<RawObservation>, BoxError> {
        let rows = sqlx::query(
            r#"
            SELECT
                index_name,
                "date"::text AS date,
                high::float8 AS high,
                "close"::float8 AS close
            FROM
                public.market_data
            ORDER BY
                index_name,
                "date"
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<RawObservation, BoxError> {
                let index_name: String = row.try_get("index_name")?;
                let date: String = row.try_get("date")?;
                let high = required_price(row, "high", &index_name, &date)?;
                let close = required_price(row, "close", &index_name, &date)?;
                Ok(RawObservation { index_name, date, high, close })
            })
            .collect()
    }

    async fn available_dates(&self) -> Result<Vec<DateRow>, BoxError> {
        let rows = sqlx::query(
            r#"
            WITH combined_dates AS (
                SELECT DISTINCT date_captured::date AS date_captured
                FROM bse500_distribution
                UNION
                SELECT DISTINCT date_captured::date AS date_captured
                FROM sectoral_performance
            )
            SELECT date_captured
            FROM combined_dates
            ORDER BY date_captured DESC
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        let dates = rows.iter()
            .map(|row| Ok(DateRow { date_captured: row.try_get("date_captured")? }))
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(dates)
    }

    async fn bse500_distribution(&self, on: Option<NaiveDate>) -> Result<Vec<Value>, BoxError> {
        let rows = match on {
            Some(date) => {
                sqlx::query(
                    "SELECT row_to_json(b) AS row FROM bse500_distribution b WHERE b.date_captured::date = $1"
                )
                .bind(date)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT row_to_json(b) AS row FROM bse500_distribution b ORDER BY b.date_captured DESC"
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let values = rows.iter()
            .map(|row| row.try_get::<Value, _>("row"))
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(values)
    }

    async fn sectoral_performance(&self, on: Option<NaiveDate>) -> Result<Vec<SectoralRow>, BoxError> {
        const COLUMNS: &str = r#"
            SELECT
                date_captured::date AS date_captured,
                duration::text AS duration,
                sector::text AS sector,
                market_cap_change::float8 AS market_cap_change
            FROM sectoral_performance
        "#;

        let rows = match on {
            Some(date) => {
                let sql = format!("{} WHERE date_captured::date = $1 ORDER BY sector, duration", COLUMNS);
                sqlx::query(&sql).bind(date).fetch_all(&self.pool).await?
            }
            None => {
                let sql = format!("{} ORDER BY date_captured DESC, duration, sector", COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        let records = rows.iter()
            .map(sectoral_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(records)
    }
}
