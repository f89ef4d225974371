//! Common utilities for the quick-usb accessory host
//!
//! This crate provides functionality shared by the host library and binary:
//! error handling, logging setup, and the async channel bridge that carries
//! method calls from the Tokio runtime to the blocking accessory thread.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{AccessoryBridge, AccessoryCommand, AccessoryWorker, create_accessory_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
