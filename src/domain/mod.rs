//! Core domain types and logic.

pub mod allocation;
pub mod config_validation;
pub mod convex;
pub mod cvar;
pub mod error;
pub mod estimators;
pub mod frontier;
pub mod hrp;
pub mod pipeline;
pub mod portfolio;
pub mod price_series;
pub mod sectors;
pub mod semivariance;
pub mod strategy;
pub mod universe;
