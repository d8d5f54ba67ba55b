//! # confirma-channels
//!
//! Patient messaging gateway integration for Confirma.

pub mod gateway;

pub use gateway::GatewayClient;
