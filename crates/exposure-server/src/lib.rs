//! # exposure-server
//!
//! HTTP server library for exposure: COVID-19 case statistics and
//! Bluetooth LE proximity scanning behind one session.
//!
//! This library provides the API handlers, application state and logging setup.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
