//! Core domain + application logic for the anonymous whisper bot.
//!
//! This crate is framework-agnostic. Telegram lives behind ports (traits)
//! implemented in the adapter crate.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod formatting;
pub mod gate;
pub mod logging;
pub mod persistence;
pub mod ports;
pub mod recency;
pub mod registry;
pub mod results;
pub mod security;
pub mod service;

pub use errors::{Error, Result};
