//! Versioned, immutable metered time series and their observations. Rows
//! are append-only: a correction inserts a new `time_series` row and flips
//! the previous one's `is_latest` flag in the same transaction.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use settlement_core_money::Quantity;
use settlement_domain_models::{Observation, Period, Quality, Resolution, TimeSeries};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const FIND_LATEST_FOR_PERIOD: &str = r#"
        SELECT * FROM time_series
        WHERE metering_point_id = $1 AND period_start = $2 AND period_end IS NOT DISTINCT FROM $3 AND is_latest = TRUE
    "#;
    pub const INSERT_TIME_SERIES: &str = r#"
        INSERT INTO time_series
            (id, metering_point_id, period_start, period_end, resolution, version, is_latest, transaction_id, received_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    "#;
    pub const FLIP_IS_LATEST_FALSE: &str = "UPDATE time_series SET is_latest = FALSE WHERE id = $1";
    pub const INSERT_OBSERVATION: &str =
        "INSERT INTO observations (id, time_series_id, timestamp, quantity, quality) VALUES ($1, $2, $3, $4, $5)";
    pub const OBSERVATIONS_FOR_TIME_SERIES: &str =
        "SELECT * FROM observations WHERE time_series_id = $1 ORDER BY timestamp";
    pub const UNSETTLED_LATEST_CANDIDATES: &str = r#"
        SELECT ts.* FROM time_series ts
        WHERE ts.is_latest = TRUE
          AND NOT EXISTS (SELECT 1 FROM settlements s WHERE s.time_series_id = ts.id AND s.time_series_version = ts.version)
          AND NOT EXISTS (
              SELECT 1 FROM settlements s2
              WHERE s2.metering_point_id = ts.metering_point_id
                AND s2.period_start = ts.period_start
                AND s2.period_end IS NOT DISTINCT FROM ts.period_end
                AND s2.status = 'calculated'
          )
        ORDER BY ts.received_at
        LIMIT $1
    "#;
}

pub struct TimeSeriesRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TimeSeriesRow {
    id: Uuid,
    metering_point_id: Uuid,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
    resolution: String,
    version: i32,
    is_latest: bool,
    #[allow(dead_code)]
    transaction_id: Option<String>,
    received_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ObservationRow {
    timestamp: DateTime<Utc>,
    quantity: Decimal,
    quality: String,
}

impl TimeSeriesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_latest_for_period(&self, metering_point_id: Uuid, period: &Period) -> Result<Option<TimeSeries>, DbError> {
        let row: Option<TimeSeriesRow> = sqlx::query_as(queries::FIND_LATEST_FOR_PERIOD)
            .bind(metering_point_id)
            .bind(period.start)
            .bind(period.end)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let observations = self.observations_for(row.id).await?;
        Ok(Some(Self::map_time_series(row, observations)?))
    }

    /// Persists a new version of the time series, flipping the predecessor's
    /// `is_latest` flag in the same transaction. `predecessor_id` is `None`
    /// for the first delivery of a `(metering_point, period)`.
    #[instrument(skip(self, time_series))]
    pub async fn insert_new_version(
        &self,
        time_series: &TimeSeries,
        resolution: Resolution,
        transaction_id: Option<&str>,
        predecessor_id: Option<Uuid>,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        if let Some(predecessor_id) = predecessor_id {
            sqlx::query(queries::FLIP_IS_LATEST_FALSE)
                .bind(predecessor_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(queries::INSERT_TIME_SERIES)
            .bind(time_series.id)
            .bind(time_series.metering_point_id)
            .bind(time_series.period.start)
            .bind(time_series.period.end)
            .bind(resolution_str(resolution))
            .bind(time_series.version)
            .bind(time_series.is_latest)
            .bind(transaction_id)
            .bind(time_series.received_at)
            .execute(&mut *tx)
            .await?;
        for observation in &time_series.observations {
            sqlx::query(queries::INSERT_OBSERVATION)
                .bind(Uuid::new_v4())
                .bind(time_series.id)
                .bind(observation.timestamp)
                .bind(observation.quantity.value())
                .bind(quality_str(observation.quality))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn observations_for(&self, time_series_id: Uuid) -> Result<Vec<Observation>, DbError> {
        let rows: Vec<ObservationRow> = sqlx::query_as(queries::OBSERVATIONS_FOR_TIME_SERIES)
            .bind(time_series_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::map_observation).collect()
    }

    /// §4.6: latest-version series with no settlement yet and no settlement
    /// already `Calculated` for the same `(metering_point, period)` — the
    /// `Invoiced`/`Migrated`/`Adjusted` cases are handled by the correction
    /// branch in the settlement repository rather than excluded here.
    #[instrument(skip(self))]
    pub async fn unsettled_latest_candidates(&self, limit: i64) -> Result<Vec<TimeSeries>, DbError> {
        let rows: Vec<TimeSeriesRow> = sqlx::query_as(queries::UNSETTLED_LATEST_CANDIDATES)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let observations = self.observations_for(row.id).await?;
            result.push(Self::map_time_series(row, observations)?);
        }
        Ok(result)
    }

    fn map_time_series(row: TimeSeriesRow, observations: Vec<Observation>) -> Result<TimeSeries, DbError> {
        Ok(TimeSeries {
            id: row.id,
            metering_point_id: row.metering_point_id,
            period: Period::new(row.period_start, row.period_end),
            version: row.version,
            is_latest: row.is_latest,
            received_at: row.received_at,
            observations,
        })
    }

    fn map_observation(row: ObservationRow) -> Result<Observation, DbError> {
        Ok(Observation {
            timestamp: row.timestamp,
            quantity: Quantity::new(row.quantity),
            quality: parse_quality(&row.quality)?,
        })
    }
}

fn resolution_str(r: Resolution) -> &'static str {
    match r {
        Resolution::Hour => "hour",
        Resolution::QuarterHour => "quarter_hour",
    }
}

fn quality_str(q: Quality) -> &'static str {
    match q {
        Quality::Measured => "measured",
        Quality::Estimated => "estimated",
        Quality::Revised => "revised",
        Quality::Incomplete => "incomplete",
    }
}

fn parse_quality(s: &str) -> Result<Quality, DbError> {
    match s {
        "measured" => Ok(Quality::Measured),
        "estimated" => Ok(Quality::Estimated),
        "revised" => Ok(Quality::Revised),
        "incomplete" => Ok(Quality::Incomplete),
        other => Err(DbError::MappingError(format!("unknown quality: {other}"))),
    }
}
