//! Utility functions and helpers

pub mod certificates;
pub mod duration;

pub use certificates::{parse_certificate_bundle, validate_certificate_pem};
pub use duration::{format_go_duration, parse_go_duration};
