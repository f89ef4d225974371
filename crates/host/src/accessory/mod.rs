//! Accessory core
//!
//! - Device registry: snapshots of connected accessories
//! - Session manager: the single open session and its lifecycle
//! - Configuration model: declared configuration, no-op claims
//! - Transfer engine: bounded bulk reads and writes on the open session
//!
//! All of it runs on the accessory thread; nothing here is shared across
//! threads except the platform behind the registry.

pub mod configuration;
pub mod registry;
pub mod session;
pub mod transfer;

pub use configuration::ConfigurationModel;
pub use registry::DeviceRegistry;
pub use session::{Session, SessionManager};
pub use transfer::{MAX_TRANSFER_LENGTH, bulk_transfer_in, bulk_transfer_out};
