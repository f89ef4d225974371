//! Command transport
//!
//! Length-prefixed postcard messages over TCP. Each connection sends
//! `Call` messages and receives one `Reply` per call, in order. Calls from
//! all connections funnel into the single accessory worker.
//!
//! ```text
//! CommandServer
//!   ├─> accept TCP connections
//!   └─> spawn ClientConnection per peer
//!         ├─> read framed Call
//!         ├─> forward through AccessoryBridge
//!         └─> write framed Reply
//! ```

pub mod connection;
pub mod server;

pub use connection::ClientConnection;
pub use server::CommandServer;
