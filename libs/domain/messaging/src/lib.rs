//! Classification and payload normalization for inbound market messages.

pub mod classifier;
pub mod payload;

pub use classifier::{classify, document_type_from_name, ClassificationError};
pub use payload::{extract_period, extract_str, extract_timestamp, parse_points, points_to_observations, unwrap_value, PayloadError, WirePoint};
