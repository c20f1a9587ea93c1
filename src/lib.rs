//! Loan Scoring Client Library
//!
//! Sits between a loan-application UI and the external scoring API:
//! normalizes loosely typed form input into the canonical scoring payload,
//! sends it, and classifies whatever comes back into either a score or a
//! user-safe error.
//!
//! # Modules
//!
//! - `models`: Form, wire and result types.
//! - `normalizer`: Form → canonical payload.
//! - `classifier`: Response and error classification.
//! - `errors`: Error codes, classified errors and transport errors.
//! - `scoring_client`: HTTP client for the scoring API.
//! - `batch`: Batch CSV template, parsing and validation.
//! - `config`: Configuration management.
//! - `handlers`: HTTP handlers for the UI-facing shell.

pub mod batch;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod scoring_client;

pub use classifier::{classify_error, classify_success};
pub use normalizer::normalize;
