//! Library surface for the OCR job service, split out of the binary so
//! integration tests can exercise the application and infra layers
//! directly.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
