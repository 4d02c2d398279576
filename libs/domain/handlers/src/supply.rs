//! BRS-001 (supplier change) and BRS-009 (move-in / move-out): lifecycle
//! events on a metering point's `Supply`.

use chrono::{DateTime, Utc};
use settlement_domain_models::{DocumentType, Period, Supply};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum SupplyChangeOutcome {
    /// A `Reject…` document carries no state change.
    Rejected,
    /// A confirmed change of supplier opens a new, open-ended supply.
    Started(Supply),
}

/// A confirmed change always opens a fresh supply; closing whatever supply
/// preceded it is the caller's job (it has the old row to close).
pub fn handle_supply_change(
    document_type: DocumentType,
    metering_point_id: Uuid,
    customer_id: Uuid,
    effective_date: DateTime<Utc>,
) -> SupplyChangeOutcome {
    match document_type {
        DocumentType::Confirm => SupplyChangeOutcome::Started(Supply {
            id: Uuid::new_v4(),
            metering_point_id,
            customer_id,
            period: Period::open_ended(effective_date),
            created_at: Utc::now(),
            updated_at: None,
        }),
        DocumentType::Reject | DocumentType::Notify => SupplyChangeOutcome::Rejected,
    }
}

#[derive(Debug, Clone)]
pub enum MoveOutcome {
    /// Move-in with no prior occupant: just opens a supply.
    MovedIn(Supply),
    /// Move-in that displaces a current occupant: close the old one, open the new.
    Replaced { closed: Supply, opened: Supply },
    /// Move-out: close the current occupant. `None` if there was none to close.
    MovedOut(Option<Supply>),
}

pub fn handle_move_in(
    current_active: Option<&Supply>,
    metering_point_id: Uuid,
    customer_id: Uuid,
    effective_date: DateTime<Utc>,
) -> MoveOutcome {
    let opened = Supply {
        id: Uuid::new_v4(),
        metering_point_id,
        customer_id,
        period: Period::open_ended(effective_date),
        created_at: Utc::now(),
        updated_at: None,
    };
    match current_active {
        None => MoveOutcome::MovedIn(opened),
        Some(current) => {
            let mut closed = current.clone();
            closed.period = Period::closed(closed.period.start, effective_date);
            closed.updated_at = Some(Utc::now());
            MoveOutcome::Replaced { closed, opened }
        }
    }
}

pub fn handle_move_out(current_active: Option<&Supply>, effective_date: DateTime<Utc>) -> MoveOutcome {
    match current_active {
        None => MoveOutcome::MovedOut(None),
        Some(current) => {
            let mut closed = current.clone();
            closed.period = Period::closed(closed.period.start, effective_date);
            closed.updated_at = Some(Utc::now());
            MoveOutcome::MovedOut(Some(closed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(h: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn reject_produces_no_state_change() {
        let outcome = handle_supply_change(DocumentType::Reject, Uuid::new_v4(), Uuid::new_v4(), ts(0));
        assert!(matches!(outcome, SupplyChangeOutcome::Rejected));
    }

    #[test]
    fn confirm_opens_an_open_ended_supply() {
        let outcome = handle_supply_change(DocumentType::Confirm, Uuid::new_v4(), Uuid::new_v4(), ts(0));
        match outcome {
            SupplyChangeOutcome::Started(supply) => assert!(!supply.period.is_closed()),
            _ => panic!("expected Started"),
        }
    }

    #[test]
    fn move_in_without_prior_occupant() {
        let outcome = handle_move_in(None, Uuid::new_v4(), Uuid::new_v4(), ts(0));
        assert!(matches!(outcome, MoveOutcome::MovedIn(_)));
    }

    #[test]
    fn move_in_displaces_current_occupant() {
        let current = Supply {
            id: Uuid::new_v4(),
            metering_point_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            period: Period::open_ended(ts(0)),
            created_at: Utc::now(),
            updated_at: None,
        };
        let outcome = handle_move_in(Some(&current), current.metering_point_id, Uuid::new_v4(), ts(12));
        match outcome {
            MoveOutcome::Replaced { closed, opened } => {
                assert_eq!(closed.period.end, Some(ts(12)));
                assert_eq!(opened.period.start, ts(12));
            }
            _ => panic!("expected Replaced"),
        }
    }
}
