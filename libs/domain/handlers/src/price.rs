//! BRS-031/037 price handlers, disambiguated by `businessReason`: D18
//! (price info), D08 (price series) and D17 (price link).

use chrono::Utc;
use settlement_domain_models::{Price, PriceInvariantError, PriceLink, PricePoint, Period};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PriceHandlerError {
    #[error(transparent)]
    Invariant(#[from] PriceInvariantError),
}

/// Mutable attributes a D18 update may change; everything else (id,
/// charge_id, owner_gln) is the lookup key and never changes.
#[derive(Debug, Clone)]
pub struct PriceInfoUpdate {
    pub description: String,
    pub category: settlement_domain_models::PriceCategory,
    pub period: Period,
    pub is_vat_exempt: bool,
    pub is_tax: bool,
    pub is_pass_through: bool,
    pub resolution: Option<settlement_domain_models::Resolution>,
    pub price_type: settlement_domain_models::PriceType,
}

#[derive(Debug, Clone)]
pub enum PriceInfoOutcome {
    Created(Price),
    Updated(Price),
}

/// D18: upsert by `(charge_id, owner_gln)`. Points are never touched here.
pub fn handle_price_info(
    existing: Option<&Price>,
    charge_id: String,
    owner_gln: String,
    update: PriceInfoUpdate,
) -> Result<PriceInfoOutcome, PriceHandlerError> {
    let is_pass_through = if update.price_type == settlement_domain_models::PriceType::Fee {
        false
    } else {
        update.is_pass_through
    };

    let price = match existing {
        None => Price {
            id: Uuid::new_v4(),
            charge_id,
            owner_gln,
            price_type: update.price_type,
            category: update.category,
            description: update.description,
            period: update.period,
            is_vat_exempt: update.is_vat_exempt,
            is_tax: update.is_tax,
            is_pass_through,
            resolution: update.resolution,
            created_at: Utc::now(),
            updated_at: None,
        },
        Some(existing) => Price {
            description: update.description,
            category: update.category,
            period: update.period,
            is_vat_exempt: update.is_vat_exempt,
            is_tax: update.is_tax,
            is_pass_through,
            resolution: update.resolution,
            price_type: update.price_type,
            updated_at: Some(Utc::now()),
            ..existing.clone()
        },
    };
    price.validate_invariants()?;

    Ok(match existing {
        None => PriceInfoOutcome::Created(price),
        Some(_) => PriceInfoOutcome::Updated(price),
    })
}

#[derive(Debug, Clone)]
pub enum PriceSeriesOutcome {
    /// The referenced price does not exist; logged and skipped, not fatal.
    PriceNotFound,
    /// Replace every point in `range` with `new_points`.
    Replace { price_id: Uuid, range: Period, new_points: Vec<PricePoint> },
}

/// D08: atomically replace the points of `[range.start, range.end)` for the
/// price identified by `(charge_id, owner_gln)`.
pub fn handle_price_series(
    existing_price: Option<&Price>,
    range: Period,
    new_points: Vec<PricePoint>,
) -> PriceSeriesOutcome {
    match existing_price {
        None => PriceSeriesOutcome::PriceNotFound,
        Some(price) => PriceSeriesOutcome::Replace { price_id: price.id, range, new_points },
    }
}

#[derive(Debug, Clone)]
pub enum PriceLinkOutcome {
    Created(PriceLink),
    /// Overwriting an existing link with a newer `linkStart` is permitted.
    Updated(PriceLink),
}

/// D17: create or update the link between a price and a metering point.
pub fn handle_price_link(
    existing_link: Option<&PriceLink>,
    price_id: Uuid,
    metering_point_id: Uuid,
    period: Period,
) -> PriceLinkOutcome {
    match existing_link {
        None => PriceLinkOutcome::Created(PriceLink {
            id: Uuid::new_v4(),
            price_id,
            metering_point_id,
            period,
            created_at: Utc::now(),
            updated_at: None,
        }),
        Some(existing) => PriceLinkOutcome::Updated(PriceLink {
            period,
            updated_at: Some(Utc::now()),
            ..existing.clone()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement_domain_models::{PriceCategory, PriceType};

    fn period() -> Period {
        Period::open_ended(Utc::now())
    }

    #[test]
    fn price_info_create_rejects_tax_on_non_tariff() {
        let update = PriceInfoUpdate {
            description: "x".into(),
            category: PriceCategory::Tax,
            period: period(),
            is_vat_exempt: false,
            is_tax: true,
            is_pass_through: false,
            resolution: None,
            price_type: PriceType::Fee,
        };
        let result = handle_price_info(None, "C1".into(), "5790001330552".into(), update);
        assert!(result.is_err());
    }

    #[test]
    fn price_info_forces_pass_through_false_for_fees() {
        let update = PriceInfoUpdate {
            description: "x".into(),
            category: PriceCategory::Other,
            period: period(),
            is_vat_exempt: false,
            is_tax: false,
            is_pass_through: true,
            resolution: None,
            price_type: PriceType::Fee,
        };
        match handle_price_info(None, "C1".into(), "5790001330552".into(), update).unwrap() {
            PriceInfoOutcome::Created(price) => assert!(!price.is_pass_through),
            _ => panic!("expected Created"),
        }
    }

    #[test]
    fn price_series_skips_when_price_absent() {
        let outcome = handle_price_series(None, period(), Vec::new());
        assert!(matches!(outcome, PriceSeriesOutcome::PriceNotFound));
    }

    #[test]
    fn price_link_create_then_update() {
        let created = handle_price_link(None, Uuid::new_v4(), Uuid::new_v4(), period());
        let link = match created {
            PriceLinkOutcome::Created(link) => link,
            _ => panic!("expected Created"),
        };
        let updated = handle_price_link(Some(&link), link.price_id, link.metering_point_id, period());
        assert!(matches!(updated, PriceLinkOutcome::Updated(_)));
    }
}
