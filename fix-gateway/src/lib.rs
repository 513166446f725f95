//! FIX order gateway.
//!
//! An HTTP/WebSocket front door for a FIX-style order-entry session that
//! trades against an in-process simulated market maker.
//!
//! # Modules
//!
//! - `settings`: layered configuration (defaults, TOML file, environment)
//! - `messages`: application messages with their FIX codes
//! - `market_maker`: simulated venue quoting and filling orders
//! - `session`: logon state, order entry and market-data subscription
//! - `journal`: CSV log of received messages
//! - `pricing`: USD/BRL currency conversion
//! - `hub` / `websocket`: push events to browser connections
//! - `routes`: the HTTP API

#[macro_use]
extern crate log;

pub mod gateway;
pub mod hub;
pub mod journal;
pub mod market_maker;
pub mod messages;
pub mod pricing;
pub mod routes;
pub mod session;
pub mod settings;
pub mod websocket;

pub use gateway::Gateway;
pub use settings::Settings;
