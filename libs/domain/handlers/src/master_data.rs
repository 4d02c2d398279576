//! BRS-006: idempotent partial update of metering-point master data.

use settlement_domain_models::{MeteringPoint, MeteringPointUpdate};

#[derive(Debug, Clone)]
pub enum MasterDataOutcome {
    MeteringPointNotFound,
    Updated(MeteringPoint),
}

pub fn handle_master_data(
    metering_point: Option<&MeteringPoint>,
    update: MeteringPointUpdate,
) -> MasterDataOutcome {
    let Some(metering_point) = metering_point else {
        return MasterDataOutcome::MeteringPointNotFound;
    };
    let mut updated = metering_point.clone();
    updated.apply_master_data_update(update);
    MasterDataOutcome::Updated(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use settlement_core_identifiers::Gsrn;
    use settlement_domain_models::{
        ConnectionState, MeteringPointCategory, MeteringPointType, Resolution, SettlementMethod,
    };
    use uuid::Uuid;

    fn metering_point() -> MeteringPoint {
        MeteringPoint {
            id: Uuid::new_v4(),
            gsrn: Gsrn::new("571313110000012340").unwrap(),
            metering_point_type: MeteringPointType::Consumption,
            category: MeteringPointCategory::Physical,
            settlement_method: SettlementMethod::Hourly,
            resolution: Resolution::Hour,
            connection_state: ConnectionState::New,
            grid_area_code: "DK1".into(),
            grid_company_id: "5790001330552".into(),
            address: None,
            has_active_supply: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn unknown_metering_point_is_not_fatal() {
        let outcome = handle_master_data(None, MeteringPointUpdate::default());
        assert!(matches!(outcome, MasterDataOutcome::MeteringPointNotFound));
    }

    #[test]
    fn update_only_touches_fields_present_in_payload() {
        let mp = metering_point();
        let update = MeteringPointUpdate {
            connection_state: Some(ConnectionState::Connected),
            ..Default::default()
        };
        match handle_master_data(Some(&mp), update) {
            MasterDataOutcome::Updated(updated) => {
                assert_eq!(updated.connection_state, ConnectionState::Connected);
                assert_eq!(updated.grid_area_code, mp.grid_area_code);
            }
            _ => panic!("expected Updated"),
        }
    }
}
