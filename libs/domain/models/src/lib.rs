//! Domain entities for the settlement engine: metering points, supplies,
//! customers, prices, time series, market data and settlements.

pub mod customer;
pub mod market;
pub mod messaging;
pub mod metering;
pub mod period;
pub mod price;
pub mod product;
pub mod settlement;
pub mod timeseries;

pub use customer::{Customer, SupplierIdentity, SupplierIdentityState};
pub use market::{AggregatedTimeSeries, SpotPrice, SpotPriceSeries, WholesaleSettlement};
pub use messaging::{BusinessProcess, DocumentType, InboxMessage, OutboxMessage};
pub use metering::{
    Address, ConnectionState, MeteringPoint, MeteringPointCategory, MeteringPointType,
    MeteringPointUpdate, Resolution, SettlementMethod, Supply,
};
pub use period::Period;
pub use price::{Price, PriceCategory, PriceInvariantError, PriceLink, PricePoint, PricePointSeries, PriceType};
pub use product::{
    PricingModel, SupplierMarginSchedule, SupplierMarginStep, SupplierProduct, SupplyProductPeriod,
};
pub use settlement::{
    Settlement, SettlementIssue, SettlementIssueKind, SettlementIssueStatus, SettlementLine,
    SettlementLineSource, SettlementStateError, SettlementStatus,
};
pub use timeseries::{Observation, Quality, TimeSeries};
