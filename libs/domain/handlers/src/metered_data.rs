//! BRS-021: versioned delivery of metered time series.

use chrono::{DateTime, Utc};
use settlement_domain_models::{MeteringPoint, Observation, Period, TimeSeries};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MeteredDataInput {
    pub metering_point_id: Uuid,
    pub period: Period,
    pub observations: Vec<Observation>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum MeteredDataOutcome {
    /// The metering point is unknown. Not fatal — logged and skipped, per §4.2 step 1.
    MeteringPointNotFound,
    /// A new version was created. If `supersedes` is set, the caller must
    /// flip that row's `is_latest` to false in the same transaction.
    Versioned {
        new_series: TimeSeries,
        supersedes: Option<Uuid>,
    },
}

/// Runs the BRS-021 algorithm. `existing_latest` must already be scoped to
/// the exact same `(metering_point, period)` — finding it is the caller's
/// (repository) responsibility.
pub fn handle_metered_data(
    metering_point: Option<&MeteringPoint>,
    existing_latest: Option<&TimeSeries>,
    input: MeteredDataInput,
) -> MeteredDataOutcome {
    if metering_point.is_none() {
        return MeteredDataOutcome::MeteringPointNotFound;
    }

    let (version, supersedes) = match existing_latest {
        None => (1, None),
        Some(existing) => (existing.version + 1, Some(existing.id)),
    };

    let new_series = TimeSeries {
        id: Uuid::new_v4(),
        metering_point_id: input.metering_point_id,
        period: input.period,
        version,
        is_latest: true,
        received_at: input.received_at,
        observations: input.observations,
    };

    MeteredDataOutcome::Versioned { new_series, supersedes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement_core_identifiers::Gsrn;
    use settlement_domain_models::{
        ConnectionState, MeteringPointCategory, MeteringPointType, Resolution, SettlementMethod,
    };

    fn metering_point() -> MeteringPoint {
        MeteringPoint {
            id: Uuid::new_v4(),
            gsrn: Gsrn::new("571313110000012340").unwrap(),
            metering_point_type: MeteringPointType::Consumption,
            category: MeteringPointCategory::Physical,
            settlement_method: SettlementMethod::Hourly,
            resolution: Resolution::Hour,
            connection_state: ConnectionState::Connected,
            grid_area_code: "DK1".into(),
            grid_company_id: "5790001330552".into(),
            address: None,
            has_active_supply: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn input(mp_id: Uuid) -> MeteredDataInput {
        MeteredDataInput {
            metering_point_id: mp_id,
            period: Period::closed(Utc::now(), Utc::now() + chrono::Duration::hours(24)),
            observations: Vec::new(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn unknown_metering_point_is_skipped_not_fatal() {
        let outcome = handle_metered_data(None, None, input(Uuid::new_v4()));
        assert!(matches!(outcome, MeteredDataOutcome::MeteringPointNotFound));
    }

    #[test]
    fn first_delivery_creates_version_one() {
        let mp = metering_point();
        let outcome = handle_metered_data(Some(&mp), None, input(mp.id));
        match outcome {
            MeteredDataOutcome::Versioned { new_series, supersedes } => {
                assert_eq!(new_series.version, 1);
                assert!(new_series.is_latest);
                assert!(supersedes.is_none());
            }
            _ => panic!("expected Versioned"),
        }
    }

    #[test]
    fn correction_increments_version_and_flags_predecessor() {
        let mp = metering_point();
        let existing = TimeSeries {
            id: Uuid::new_v4(),
            metering_point_id: mp.id,
            period: input(mp.id).period,
            version: 1,
            is_latest: true,
            received_at: Utc::now(),
            observations: Vec::new(),
        };
        let outcome = handle_metered_data(Some(&mp), Some(&existing), input(mp.id));
        match outcome {
            MeteredDataOutcome::Versioned { new_series, supersedes } => {
                assert_eq!(new_series.version, 2);
                assert_eq!(supersedes, Some(existing.id));
            }
            _ => panic!("expected Versioned"),
        }
    }
}
