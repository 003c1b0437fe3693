//! USB/IP wire protocol for uboat
//!
//! This crate defines the fixed-layout USB/IP messages exchanged by the
//! emulated server: the control-plane `OP_*` messages used for device
//! discovery and import, and the URB-phase `CMD_SUBMIT` / `RET_SUBMIT` pair.
//! All integers are big-endian and every message encodes itself field by
//! field; nothing relies on host memory layout.
//!
//! # Example
//!
//! ```
//! use protocol::{ControlRequest, DevListReply, ExportedDevice, USBIP_VERSION};
//!
//! // Client side: OP_REQ_DEVLIST is a bare header
//! let request = [0x01, 0x11, 0x80, 0x05, 0, 0, 0, 0];
//!
//! // Server side: decode, then answer with the single fake device
//! let ControlRequest::DevList(header) = ControlRequest::decode(&request).unwrap() else {
//!     panic!("not a device list request");
//! };
//! let reply = DevListReply::new(header.version, ExportedDevice::synthetic());
//! let bytes = reply.encode().unwrap();
//! assert_eq!(bytes.len(), DevListReply::SIZE);
//! assert_eq!(header.version, USBIP_VERSION);
//! ```
//!
//! # URB Frames
//!
//! ```
//! use protocol::{CmdSubmit, UrbCommand, UrbFrame, UrbHeader};
//!
//! let cmd = CmdSubmit {
//!     header: UrbHeader::new(UrbCommand::Submit, 1, 0x10001),
//!     transfer_flags: 0,
//!     transfer_buffer_length: 64,
//!     start_frame: 0,
//!     number_of_packets: 0,
//!     interval: 0,
//!     setup: [0; 8],
//! };
//! let bytes = cmd.encode().unwrap();
//! assert!(matches!(UrbFrame::decode(&bytes).unwrap(), UrbFrame::Submit(_)));
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;
pub mod urb;
pub mod version;

pub use codec::{
    OVERFLOW_SIZE, URB_DATA_PATTERN, URB_FRAME_SIZE, URB_MESSAGE_SIZE, USBIP_PORT,
    USBIP_STATUS_OK, fill_pattern,
};

#[cfg(feature = "async")]
pub use codec::{read_frame_async, write_frame_async};
pub use error::{ProtocolError, Result};
pub use messages::{ControlRequest, DevListReply, ImportReply, ImportRequest, OpCode, OpHeader};
pub use types::{
    DeviceSpeed, ExportedDevice, FAKE_BUS_ID, FAKE_DEVICE_PATH, FAKE_PRODUCT_ID, FAKE_VENDOR_ID,
};
pub use urb::{CmdSubmit, RetSubmit, UrbCommand, UrbFrame, UrbHeader};
pub use version::{USBIP_VERSION, format_version};
