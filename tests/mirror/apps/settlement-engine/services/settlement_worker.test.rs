use chrono::{TimeZone, Utc};
use settlement_engine::prelude::*;
use settlement_infra_db::Db;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        message_hub_base_url: None,
        message_hub_credential: None,
        spot_price_base_url: None,
        spot_price_credential: None,
        http_timeout: Duration::from_secs(5),
        inbox_poll_interval: Duration::from_secs(3600),
        inbox_batch_size: 50,
        inbox_max_attempts: 5,
        settlement_poll_interval: Duration::from_millis(20),
        settlement_batch_size: 20,
        outbox_poll_interval: Duration::from_secs(3600),
        outbox_batch_size: 50,
        outbox_max_retries: 8,
        outbox_base_backoff: chrono::Duration::seconds(10),
        spot_price_poll_interval: Duration::from_secs(3600),
        spot_price_bidding_areas: vec!["DK1".to_string()],
    }
}

async fn seed_metering_point_without_supply(pool: &sqlx::PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO metering_points (id, gsrn, metering_point_type, category, settlement_method, resolution, connection_state, grid_area_code, grid_company_id, has_active_supply, created_at) VALUES ($1, $2, 'consumption', 'physical', 'hourly', 'hour', 'connected', 'DK1', '5790000000000', false, $3)",
    )
    .bind(id)
    .bind("571313110000099999")
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed_time_series(pool: &sqlx::PgPool, metering_point_id: Uuid, period_start: chrono::DateTime<Utc>, period_end: chrono::DateTime<Utc>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO time_series (id, metering_point_id, period_start, period_end, resolution, version, is_latest, transaction_id, received_at) VALUES ($1, $2, $3, $4, 'hour', 1, true, NULL, $5)",
    )
    .bind(id)
    .bind(metering_point_id)
    .bind(period_start)
    .bind(period_end)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

/// A time series with no active supply for its metering point cannot be
/// priced: the worker must raise a `missing_price_elements` issue instead
/// of calculating a settlement.
#[sqlx::test]
async fn candidate_without_supply_raises_missing_price_elements_issue(pool: sqlx::PgPool) -> sqlx::Result<()> {
    settlement_infra_db::schema::apply_schema(&pool).await.unwrap();
    let metering_point_id = seed_metering_point_without_supply(&pool).await;
    let period_start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    let period_end = Utc.with_ymd_and_hms(2026, 2, 1, 1, 0, 0).unwrap();
    let time_series_id = seed_time_series(&pool, metering_point_id, period_start, period_end).await;

    let db = Db::from_pool(pool.clone());
    let state = AppState::new(db, test_config());

    let shutdown = state.shutdown.clone();
    let handle = tokio::spawn(settlement_engine::services::settlement_worker::run(state.clone()));
    sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    let _ = handle.await;

    let (settlement_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settlements WHERE time_series_id = $1")
        .bind(time_series_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(settlement_count, 0);

    let (kind, status): (String, String) =
        sqlx::query_as("SELECT kind, status FROM settlement_issues WHERE time_series_id = $1")
            .bind(time_series_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(kind, "missing_price_elements");
    assert_eq!(status, "open");

    Ok(())
}
