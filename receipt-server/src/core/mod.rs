//! Core module - configuration
//!
//! - [`Config`] - environment-driven server configuration

pub mod config;

pub use config::Config;
