//! Network subsystem
//!
//! Accepts USB/IP clients over TCP and runs each connection through the
//! control phase and, after an import, the URB phase.
//!
//! # Architecture
//!
//! ```text
//! UsbIpServer
//!   ├─> accept TCP connections
//!   └─> spawn ClientConnection per client
//!         ├─> OP_REQ_DEVLIST: send fake device list, close
//!         ├─> OP_REQ_IMPORT: send import reply, hand stream to UrbExchange
//!         │     └─> CMD_SUBMIT: RET_SUBMIT with inflated actual_length
//!         └─> anything else: ignore, keep reading
//! ```

pub mod connection;
pub mod exchange;
pub mod server;

pub use server::UsbIpServer;
