//! Application shell for the settlement engine: configuration, shared
//! state, the HTTP surface and the independently scheduled workers that
//! drive inbox classification, settlement calculation and outbound
//! dispatch.

pub mod config;
pub mod handlers;
pub mod kernel;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::kernel::Kernel;
    pub use crate::state::AppState;
}
