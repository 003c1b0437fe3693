//! URB Exchange Engine
//!
//! Runs after a successful import. Every `CMD_SUBMIT` is answered with a
//! `RET_SUBMIT` whose `actual_length` is the requested length plus
//! [`OVERFLOW_SIZE`], while the frame actually sent is always
//! [`URB_FRAME_SIZE`] bytes: the 48-byte message and a fixed run of
//! [`URB_DATA_PATTERN`] filler. A client that trusts `actual_length` reads
//! past what the server supplied.
//!
//! ```text
//! buf: [ RET_SUBMIT (48) | DE AD C0 DE DE AD C0 DE ... (1452) ]
//!                          ^ independent of actual_length
//! ```
//!
//! [`URB_DATA_PATTERN`]: protocol::URB_DATA_PATTERN

use anyhow::{Context, Result};
use protocol::{
    CmdSubmit, OVERFLOW_SIZE, RetSubmit, URB_FRAME_SIZE, URB_MESSAGE_SIZE, UrbFrame,
    fill_pattern, write_frame_async,
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

use super::connection::read_frame;

/// Length claimed for a submit that asked for `requested` bytes
///
/// Wraps on 32-bit overflow like the wire field does; never clamped.
pub fn inflated_length(requested: u32) -> u32 {
    requested.wrapping_add(OVERFLOW_SIZE)
}

/// Build the return frame for `cmd` over the front of `frame`
///
/// The message overwrites the first [`URB_MESSAGE_SIZE`] bytes and the
/// remainder of `frame` is filled with the data pattern, whatever length the
/// message claims.
pub fn craft_return_frame(cmd: &CmdSubmit, frame: &mut [u8]) -> protocol::Result<RetSubmit> {
    let ret = RetSubmit::success(cmd, inflated_length(cmd.transfer_buffer_length));
    ret.encode_into(frame)?;
    fill_pattern(&mut frame[URB_MESSAGE_SIZE..]);
    Ok(ret)
}

/// Frame counters for one exchange, logged when it ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeStats {
    pub submits: u64,
    pub unlinks: u64,
    pub ignored: u64,
}

/// URB phase of a connection
pub struct UrbExchange<'a, S> {
    stream: &'a mut S,
    idle_timeout: Option<Duration>,
    buf: Vec<u8>,
    stats: ExchangeStats,
}

impl<'a, S> UrbExchange<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: &'a mut S, idle_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            idle_timeout,
            buf: vec![0u8; URB_FRAME_SIZE],
            stats: ExchangeStats::default(),
        }
    }

    /// Process frames until the stream fails
    ///
    /// The exchange has no successful end: it stops on the first read,
    /// decode or write error and returns it.
    pub async fn run(mut self) -> anyhow::Error {
        loop {
            if let Err(e) = self.process_frame().await {
                debug!(
                    submits = self.stats.submits,
                    unlinks = self.stats.unlinks,
                    ignored = self.stats.ignored,
                    "URB exchange finished"
                );
                return e;
            }
        }
    }

    async fn process_frame(&mut self) -> Result<()> {
        let n = read_frame(&mut *self.stream, &mut self.buf, self.idle_timeout)
            .await
            .context("Failed to read URB frame")?;

        match UrbFrame::decode(&self.buf[..n]).context("Failed to decode URB frame")? {
            UrbFrame::Submit(cmd) => {
                trace!(
                    seqnum = cmd.header.seqnum,
                    ep = cmd.header.ep,
                    direction = cmd.header.direction,
                    "CMD_SUBMIT"
                );

                let ret = craft_return_frame(&cmd, &mut self.buf)
                    .context("Failed to encode RET_SUBMIT")?;

                write_frame_async(&mut *self.stream, &self.buf)
                    .await
                    .context("Failed to send RET_SUBMIT")?;

                self.stats.submits += 1;
                warn!(
                    seqnum = ret.header.seqnum,
                    "Sending {} bytes, but actual buffer is {} bytes",
                    ret.actual_length,
                    cmd.transfer_buffer_length
                );
            }
            UrbFrame::Unlink(header) => {
                self.stats.unlinks += 1;
                debug!(seqnum = header.seqnum, "Ignoring CMD_UNLINK");
            }
            UrbFrame::Other(header) => {
                self.stats.ignored += 1;
                debug!(
                    seqnum = header.seqnum,
                    "Ignoring URB command {:#010x}",
                    u32::from(header.command)
                );
            }
        }

        Ok(())
    }
}
