//! Core application modules
//!
//! Configuration, constants, logging, errors, CORS, server plumbing and the
//! upstream provider layer.

pub mod config;
pub mod constants;
pub mod cors;
pub mod error;
pub mod logging;
pub mod provider;
pub mod providers;
pub mod server;
