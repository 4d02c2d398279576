//! Pure, stateless BRS handlers. Each takes the current state the router
//! already loaded plus a normalized payload and returns a decision; nothing
//! here touches a database or the clock beyond stamping `created_at`.

pub mod aggregated;
pub mod master_data;
pub mod metered_data;
pub mod price;
pub mod supply;

pub use aggregated::{handle_aggregated_data, handle_wholesale_settlement};
pub use master_data::{handle_master_data, MasterDataOutcome};
pub use metered_data::{handle_metered_data, MeteredDataInput, MeteredDataOutcome};
pub use price::{
    handle_price_info, handle_price_link, handle_price_series, PriceHandlerError, PriceInfoOutcome,
    PriceInfoUpdate, PriceLinkOutcome, PriceSeriesOutcome,
};
pub use supply::{handle_move_in, handle_move_out, handle_supply_change, MoveOutcome, SupplyChangeOutcome};
