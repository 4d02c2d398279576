//! PostgreSQL persistence for the settlement engine: a pool wrapper, the
//! embedded schema, and one repository per aggregate group.

pub mod client;
pub mod errors;
pub mod schema;

pub mod repositories;

pub use client::Db;
pub use errors::DbError;
