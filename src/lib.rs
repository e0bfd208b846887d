//! avrlink - async control client for multi-zone AV receivers
//!
//! A client library for the line-oriented ASCII control protocol spoken by
//! Pioneer-compatible multi-zone AV receivers.
//!
//! This library provides:
//! - A persistent TCP session with automatic reconnection and keepalive
//! - A rate-limited writer with request/response correlation
//! - A declarative decoder registry converting wire codes to typed state
//! - A cached, queryable view of the device (zones, volume, sources, tuner,
//!   DSP, video)
//! - A multi-priority command queue driving refreshes and workarounds
//!
//! The entry point is [`avr::AvrClient`].

#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod avr;
pub mod connection;
pub mod decode;
pub mod decoders;
pub mod error;
pub mod params;
pub mod properties;
pub mod queue;
pub mod registry;
pub mod types;

pub use avr::AvrClient;
pub use error::Error;
pub use types::{TunerBand, Zone};
