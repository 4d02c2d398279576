//! The settlement validator and calculator: the pure-math core of the
//! pipeline, deliberately free of any I/O.

pub mod calculator;
pub mod validator;

pub use calculator::{calculate, calculate_correction, CalculationInput};
pub use validator::{validate, ValidationInput, ValidationIssue};
