//! Connection Dispatcher
//!
//! Drives the control phase of one accepted connection: reads frames,
//! decodes the `OP_*` header and routes to the device-list or import
//! responder. A successful import turns the same stream into the URB data
//! stream, handled by [`super::exchange`].

use anyhow::{Context, Result};
use protocol::{
    ControlRequest, DevListReply, ExportedDevice, FAKE_BUS_ID, ImportReply, ImportRequest,
    OpHeader, ProtocolError, format_version, read_frame_async, write_frame_async,
};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::exchange::UrbExchange;

/// Size of the per-connection read buffer for control frames
const CONTROL_FRAME_SIZE: usize = 1500;

/// How a connection finished when it finished without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Device list was sent; discovery is single-shot
    DeviceListed,
}

/// Read one frame, honouring the optional idle timeout
pub(super) async fn read_frame<S>(
    stream: &mut S,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> protocol::Result<usize>
where
    S: AsyncRead + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, read_frame_async(stream, buf))
            .await
            .map_err(|_| {
                ProtocolError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no frame within {:?}", limit),
                ))
            })?,
        None => read_frame_async(stream, buf).await,
    }
}

/// Per-connection handler for the control phase
///
/// Owns the stream and its buffers exclusively; nothing is shared with other
/// connections.
pub struct ClientConnection<S> {
    stream: S,
    device: ExportedDevice,
    idle_timeout: Option<Duration>,
}

impl<S> ClientConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, idle_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            device: ExportedDevice::synthetic(),
            idle_timeout,
        }
    }

    /// Run the connection until it is served, closed or fails
    ///
    /// Returns `Ok` only after a device list was served. Every other path
    /// ends in an error (including a clean close by the peer), and the stream
    /// is dropped, closing the connection.
    pub async fn run(mut self) -> Result<SessionEnd> {
        let mut buf = vec![0u8; CONTROL_FRAME_SIZE];

        loop {
            let n = read_frame(&mut self.stream, &mut buf, self.idle_timeout)
                .await
                .context("Failed to read control frame")?;

            let request =
                ControlRequest::decode(&buf[..n]).context("Failed to decode control header")?;

            match request {
                ControlRequest::DevList(header) => {
                    self.send_device_list(&header).await?;
                    return Ok(SessionEnd::DeviceListed);
                }
                ControlRequest::Import(request) => {
                    self.send_import(&request).await?;
                    // Kernel communication begins here, on the same stream
                    return Err(UrbExchange::new(&mut self.stream, self.idle_timeout)
                        .run()
                        .await);
                }
                ControlRequest::Other(header) => {
                    debug!(
                        "Ignoring control command {:#06x} ({} bytes)",
                        u16::from(header.command),
                        n
                    );
                }
            }
        }
    }

    /// Answer `OP_REQ_DEVLIST` with the single fake device
    async fn send_device_list(&mut self, header: &OpHeader) -> Result<()> {
        let reply = DevListReply::new(header.version, self.device.clone());
        let bytes = reply.encode().context("Failed to encode device list")?;

        write_frame_async(&mut self.stream, &bytes)
            .await
            .context("Failed to send device list")?;

        info!(
            "Sent fake device list (USB/IP {})",
            format_version(header.version)
        );
        Ok(())
    }

    /// Answer `OP_REQ_IMPORT`, exporting the fake device whatever bus id was asked for
    async fn send_import(&mut self, request: &ImportRequest) -> Result<()> {
        match request.busid.as_deref() {
            Some(FAKE_BUS_ID) => debug!("Import requested for busid {}", FAKE_BUS_ID),
            Some(other) => warn!(
                "Import requested for unknown busid '{}', exporting {} anyway",
                other, FAKE_BUS_ID
            ),
            None => debug!("Import request without busid"),
        }

        let reply = ImportReply::new(request.header.version, self.device.clone());
        let bytes = reply.encode().context("Failed to encode import reply")?;

        write_frame_async(&mut self.stream, &bytes)
            .await
            .context("Failed to send import reply")?;

        info!("Fake device is being exported");
        Ok(())
    }
}
