//! The output of the settlement calculator: a `Settlement` and its lines,
//! plus the `SettlementIssue` record raised when calculation is blocked.

use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_core_money::{Amount, Quantity, UnitPrice};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Calculated,
    Invoiced,
    Adjusted,
    /// Terminal starting state for historically imported settlements; never
    /// produced by the calculator itself.
    Migrated,
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot apply {operation} to a settlement in state {observed:?} (expected {expected:?})")]
pub struct SettlementStateError {
    pub operation: &'static str,
    pub observed: SettlementStatus,
    pub expected: SettlementStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementLineSource {
    Tariff,
    Spot,
    SupplierMargin,
    Subscription,
    Fee,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementLine {
    pub id: Uuid,
    pub settlement_id: Uuid,
    pub description: String,
    pub source: SettlementLineSource,
    pub quantity: Quantity,
    pub unit_price: UnitPrice,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub metering_point_id: Uuid,
    pub supply_id: Uuid,
    pub period: Period,
    pub time_series_id: Uuid,
    pub time_series_version: i32,
    pub total_energy: Quantity,
    pub total_amount: Amount,
    pub status: SettlementStatus,
    pub is_correction: bool,
    pub previous_settlement_id: Option<Uuid>,
    pub invoice_reference: Option<String>,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub document_number: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<SettlementLine>,
}

impl Settlement {
    /// `Calculated → Invoiced`, requiring an external invoice reference.
    pub fn mark_invoiced(&mut self, invoice_reference: String, at: DateTime<Utc>) -> Result<(), SettlementStateError> {
        if self.status != SettlementStatus::Calculated {
            return Err(SettlementStateError {
                operation: "mark_invoiced",
                observed: self.status,
                expected: SettlementStatus::Calculated,
            });
        }
        self.status = SettlementStatus::Invoiced;
        self.invoice_reference = Some(invoice_reference);
        self.invoiced_at = Some(at);
        Ok(())
    }

    /// `Invoiced → Adjusted` (terminal), triggered when a correction against
    /// this settlement is produced.
    pub fn mark_adjusted(&mut self) -> Result<(), SettlementStateError> {
        if self.status != SettlementStatus::Invoiced {
            return Err(SettlementStateError {
                operation: "mark_adjusted",
                observed: self.status,
                expected: SettlementStatus::Invoiced,
            });
        }
        self.status = SettlementStatus::Adjusted;
        Ok(())
    }

    /// `total_amount = Σ lines.amount` is the one universal invariant the
    /// calculator can always uphold — `total_energy` is stamped directly
    /// from the metered observations rather than re-derived from lines,
    /// since energy lines under the spot-addon model intentionally repeat
    /// the same quantity once per price source.
    pub fn recomputed_total_amount(&self) -> Amount {
        self.lines.iter().map(|l| l.amount).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementIssueKind {
    MissingPriceElements,
    PriceCoverageGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementIssueStatus {
    Open,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementIssue {
    pub id: Uuid,
    pub metering_point_id: Uuid,
    pub time_series_id: Uuid,
    pub time_series_version: i32,
    pub kind: SettlementIssueKind,
    pub status: SettlementIssueStatus,
    /// Human-readable description of the missing charges or uncovered
    /// intervals, surfaced to operators.
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SettlementIssue {
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = SettlementIssueStatus::Resolved;
        self.resolved_at = Some(at);
    }

    pub fn dismiss(&mut self) {
        self.status = SettlementIssueStatus::Dismissed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn settlement(status: SettlementStatus) -> Settlement {
        Settlement {
            id: Uuid::new_v4(),
            metering_point_id: Uuid::new_v4(),
            supply_id: Uuid::new_v4(),
            period: Period::closed(Utc::now(), Utc::now()),
            time_series_id: Uuid::new_v4(),
            time_series_version: 1,
            total_energy: Quantity::zero(),
            total_amount: Amount::zero(),
            status,
            is_correction: false,
            previous_settlement_id: None,
            invoice_reference: None,
            invoiced_at: None,
            document_number: "WO-2026-00001".to_string(),
            created_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    #[test]
    fn mark_invoiced_requires_calculated() {
        let mut s = settlement(SettlementStatus::Invoiced);
        assert!(s.mark_invoiced("INV-1".into(), Utc::now()).is_err());
    }

    #[test]
    fn lifecycle_calculated_to_invoiced_to_adjusted() {
        let mut s = settlement(SettlementStatus::Calculated);
        s.mark_invoiced("INV-1".into(), Utc::now()).unwrap();
        assert_eq!(s.status, SettlementStatus::Invoiced);
        s.mark_adjusted().unwrap();
        assert_eq!(s.status, SettlementStatus::Adjusted);
    }

    #[test]
    fn mark_adjusted_requires_invoiced() {
        let mut s = settlement(SettlementStatus::Calculated);
        assert!(s.mark_adjusted().is_err());
    }
}
