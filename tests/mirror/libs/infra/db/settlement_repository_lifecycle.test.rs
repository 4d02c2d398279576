use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use settlement_core_money::{Amount, Quantity, UnitPrice};
use settlement_domain_models::{Period, Settlement, SettlementLine, SettlementLineSource, SettlementStatus};
use settlement_infra_db::repositories::settlement::SettlementRepository;
use settlement_infra_db::schema::apply_schema;
use uuid::Uuid;

/// Inserts the minimal chain of rows a `settlements` foreign key requires:
/// a metering point, a customer owned by a supplier identity, a supply,
/// and a latest time-series version.
async fn seed_settlement_dependencies(pool: &sqlx::PgPool) -> (Uuid, Uuid, Uuid) {
    let metering_point_id = Uuid::new_v4();
    let supplier_identity_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    let supply_id = Uuid::new_v4();
    let time_series_id = Uuid::new_v4();

    sqlx::query("INSERT INTO metering_points (id, gsrn, metering_point_type, category, settlement_method, resolution, connection_state, grid_area_code, grid_company_id, has_active_supply, created_at) VALUES ($1, $2, 'consumption', 'physical', 'hourly', 'hour', 'connected', 'DK1', '5790000000000', true, $3)")
        .bind(metering_point_id)
        .bind("571313110000012340")
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO supplier_identities (id, grid_participant_id, name, state, created_at) VALUES ($1, $2, 'Test Supplier', 'active', $3)")
        .bind(supplier_identity_id)
        .bind("5790000000001")
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO customers (id, supplier_identity_id, identity_kind, identity_value, name, created_at) VALUES ($1, $2, 'personal', '1234567890', 'Test Customer', $3)")
        .bind(customer_id)
        .bind(supplier_identity_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO supplies (id, metering_point_id, customer_id, period_start, period_end, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(supply_id)
        .bind(metering_point_id)
        .bind(customer_id)
        .bind(period().start)
        .bind(period().end)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO time_series (id, metering_point_id, period_start, period_end, resolution, version, is_latest, received_at) VALUES ($1, $2, $3, $4, 'hour', 1, true, $5)")
        .bind(time_series_id)
        .bind(metering_point_id)
        .bind(period().start)
        .bind(period().end)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

    (metering_point_id, supply_id, time_series_id)
}

fn period() -> Period {
    Period::closed(
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
    )
}

fn settlement(metering_point_id: Uuid, supply_id: Uuid, time_series_id: Uuid, document_number: String) -> Settlement {
    let settlement_id = Uuid::new_v4();
    Settlement {
        id: settlement_id,
        metering_point_id,
        supply_id,
        period: period(),
        time_series_id,
        time_series_version: 1,
        total_energy: Quantity::new(dec!(24.0)),
        total_amount: Amount::new(dec!(15.60)),
        status: SettlementStatus::Calculated,
        is_correction: false,
        previous_settlement_id: None,
        invoice_reference: None,
        invoiced_at: None,
        document_number,
        created_at: Utc::now(),
        lines: vec![SettlementLine {
            id: Uuid::new_v4(),
            settlement_id,
            description: "Supplier margin".into(),
            source: SettlementLineSource::SupplierMargin,
            quantity: Quantity::new(dec!(24.0)),
            unit_price: UnitPrice::new(dec!(0.150000)),
            amount: Amount::new(dec!(3.60)),
        }],
    }
}

#[sqlx::test]
async fn document_number_sequence_is_strictly_monotonic(pool: sqlx::PgPool) -> sqlx::Result<()> {
    apply_schema(&pool).await.unwrap();
    let repo = SettlementRepository::new(pool);

    let first = repo.allocate_document_number(2026).await.unwrap();
    let second = repo.allocate_document_number(2026).await.unwrap();

    assert_ne!(first, second);
    assert!(first.starts_with("WO-2026-"));
    Ok(())
}

#[sqlx::test]
async fn insert_then_mark_invoiced_round_trips(pool: sqlx::PgPool) -> sqlx::Result<()> {
    apply_schema(&pool).await.unwrap();

    let settlement_repo = SettlementRepository::new(pool.clone());
    let (metering_point_id, supply_id, time_series_id) = seed_settlement_dependencies(&pool).await;
    let document_number = settlement_repo.allocate_document_number(2026).await.unwrap();
    let s = settlement(metering_point_id, supply_id, time_series_id, document_number);
    let settlement_id = s.id;

    settlement_repo.insert(&s).await.unwrap();

    let found = settlement_repo.find_by_id(settlement_id).await.unwrap().unwrap();
    assert_eq!(found.status, SettlementStatus::Calculated);
    assert_eq!(found.lines.len(), 1);

    settlement_repo
        .mark_invoiced(settlement_id, "INV-2026-001", Utc::now())
        .await
        .unwrap();
    let invoiced = settlement_repo.find_by_id(settlement_id).await.unwrap().unwrap();
    assert_eq!(invoiced.status, SettlementStatus::Invoiced);
    assert_eq!(invoiced.invoice_reference.as_deref(), Some("INV-2026-001"));
    Ok(())
}
