//! Accessory host
//!
//! Serves a small command surface over one external accessory at a time:
//! device enumeration, a single session with its input and output streams,
//! a declared configuration, and bulk transfers. Commands reach the
//! [`dispatcher::Dispatcher`] through a worker thread so they execute one at
//! a time; [`network::CommandServer`] exposes that worker over TCP.

pub mod accessory;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod network;
pub mod platform;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod worker;

pub use dispatcher::{Dispatcher, Method};
pub use error::{AccessoryError, Result};
