//! Outbound HTTP adapters to the external message hub and spot-price
//! provider, plus the simulation-mode fallbacks used when no credentials
//! are configured (§6 "Environment inputs").

pub mod errors;
pub mod message_hub;
pub mod spot_price;

pub use errors::TransportError;
pub use message_hub::{DispatchOutcome, HttpMessageHub, InboundEnvelope, MessageHub, SimulationMessageHub};
pub use spot_price::{HttpSpotPriceProvider, SimulationSpotPriceProvider, SpotPriceProvider, SpotPriceQuote};
