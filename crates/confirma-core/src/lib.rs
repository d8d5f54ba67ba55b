//! # confirma-core
//!
//! Core types, traits, configuration, and error handling for the Confirma
//! reminder engine.

pub mod appointment;
pub mod config;
pub mod error;
pub mod phone;
pub mod traits;
pub mod window;

pub use config::shellexpand;
