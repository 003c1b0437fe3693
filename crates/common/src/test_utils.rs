//! Test utilities for uboat
//!
//! Provides USB/IP frame builders and async helpers for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{create_devlist_request, create_cmd_submit_frame};
//!
//! # fn main() {
//! let request = create_devlist_request(0x0111);
//! assert_eq!(request.len(), 8);
//!
//! let submit = create_cmd_submit_frame(1, 1024);
//! assert_eq!(submit.len(), 48);
//! # }
//! ```

use protocol::{
    CmdSubmit, ImportRequest, OpCode, OpHeader, USBIP_VERSION, UrbCommand, UrbHeader,
};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Devid the kernel uses for bus 1, device 1
pub const TEST_DEVID: u32 = 0x0001_0001;

/// Create an `OP_REQ_DEVLIST` frame
pub fn create_devlist_request(version: u16) -> Vec<u8> {
    create_op_frame(version, OpCode::DevListRequest)
}

/// Create an `OP_REQ_IMPORT` frame for `busid`
///
/// # Example
/// ```
/// use common::test_utils::create_import_request;
///
/// let frame = create_import_request("1-1");
/// assert_eq!(frame.len(), 40);
/// assert_eq!(&frame[8..11], b"1-1");
/// ```
pub fn create_import_request(busid: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ImportRequest::SIZE);
    ImportRequest::new(USBIP_VERSION, busid)
        .write_to(&mut buf)
        .expect("writing to a Vec cannot fail");
    buf
}

/// Create a bare control header frame with any command code
pub fn create_op_frame(version: u16, command: OpCode) -> Vec<u8> {
    let mut buf = Vec::with_capacity(OpHeader::SIZE);
    OpHeader::new(version, command)
        .write_to(&mut buf)
        .expect("writing to a Vec cannot fail");
    buf
}

/// Create a `USBIP_CMD_SUBMIT` for an IN transfer on endpoint 1
pub fn create_mock_cmd_submit(seqnum: u32, transfer_buffer_length: u32) -> CmdSubmit {
    CmdSubmit {
        header: UrbHeader {
            command: UrbCommand::Submit,
            seqnum,
            devid: TEST_DEVID,
            direction: 1,
            ep: 1,
        },
        transfer_flags: 0,
        transfer_buffer_length,
        start_frame: 0,
        number_of_packets: 0,
        interval: 0,
        setup: [0u8; 8],
    }
}

/// Encoded form of [`create_mock_cmd_submit`]
pub fn create_cmd_submit_frame(seqnum: u32, transfer_buffer_length: u32) -> Vec<u8> {
    create_mock_cmd_submit(seqnum, transfer_buffer_length)
        .encode()
        .expect("writing to a Vec cannot fail")
}

/// Create a `USBIP_CMD_UNLINK` frame (header plus unlink seqnum and padding)
pub fn create_cmd_unlink_frame(seqnum: u32, unlink_seqnum: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(protocol::URB_MESSAGE_SIZE);
    UrbHeader::new(UrbCommand::Unlink, seqnum, TEST_DEVID)
        .write_to(&mut buf)
        .expect("writing to a Vec cannot fail");
    buf.extend_from_slice(&unlink_seqnum.to_be_bytes());
    buf.resize(protocol::URB_MESSAGE_SIZE, 0);
    buf
}

/// Create a control transfer setup packet
///
/// # Arguments
/// * `request_type` - bmRequestType
/// * `request` - bRequest
/// * `value` - wValue
/// * `index` - wIndex
/// * `length` - wLength
pub fn create_mock_setup_packet(
    request_type: u8,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
) -> [u8; 8] {
    let value = value.to_le_bytes();
    let index = index.to_le_bytes();
    let length = length.to_le_bytes();
    [
        request_type,
        request,
        value[0],
        value[1],
        index[0],
        index[1],
        length[0],
        length[1],
    ]
}

/// Create a `USBIP_CMD_SUBMIT` for a control IN transfer on endpoint 0
///
/// The transfer length is taken from the setup packet's `wLength`.
pub fn create_mock_control_submit(seqnum: u32, setup: [u8; 8]) -> CmdSubmit {
    let length = u16::from_le_bytes([setup[6], setup[7]]);
    let mut cmd = create_mock_cmd_submit(seqnum, u32::from(length));
    cmd.header.ep = 0;
    cmd.setup = setup;
    cmd
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging
/// when the server keeps a connection open.
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
///     assert_eq!(result, 42);
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
