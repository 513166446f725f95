//! FIX Gateway Client Library
//!
//! Console client for the FIX order gateway. Commands are typed as
//! `action -tag value ...` using FIX tag numbers, sent to the gateway's HTTP
//! API, and timed per action. Push events from `/ws` are logged as they arrive.
//!
//! # Modules
//!
//! - `config`: Configuration loading from .properties files
//! - `protocol`: Command parsing, gateway routes and reply rendering
//! - `tracker`: Round-trip latency histograms per action
//! - `client`: HTTP calls and the push event stream

pub mod client;
pub mod config;
pub mod protocol;
pub mod tracker;

pub use client::{ClientError, GatewayClient};
pub use config::Config;
pub use protocol::{Command, CommandDefaults};
pub use tracker::LatencyTracker;
