//! URB-phase message definitions
//!
//! After a successful import the control socket is handed to the kernel
//! (`vhci_hcd`) and carries URB traffic. Every URB message starts with a
//! 20-byte header:
//! ```text
//! [command: u32][seqnum: u32][devid: u32][direction: u32][ep: u32]
//! ```
//! `CMD_SUBMIT` and `RET_SUBMIT` extend it to a fixed 48 bytes.

use crate::codec::{URB_MESSAGE_SIZE, USBIP_STATUS_OK, ensure_len, read_array};
use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// URB command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrbCommand {
    /// `USBIP_CMD_SUBMIT`
    Submit,
    /// `USBIP_CMD_UNLINK`
    Unlink,
    /// `USBIP_RET_SUBMIT`
    RetSubmit,
    /// `USBIP_RET_UNLINK`
    RetUnlink,
    Unknown(u32),
}

impl UrbCommand {
    pub const CMD_SUBMIT: u32 = 0x0000_0001;
    pub const CMD_UNLINK: u32 = 0x0000_0002;
    pub const RET_SUBMIT: u32 = 0x0000_0003;
    pub const RET_UNLINK: u32 = 0x0000_0004;
}

impl From<u32> for UrbCommand {
    fn from(value: u32) -> Self {
        match value {
            Self::CMD_SUBMIT => Self::Submit,
            Self::CMD_UNLINK => Self::Unlink,
            Self::RET_SUBMIT => Self::RetSubmit,
            Self::RET_UNLINK => Self::RetUnlink,
            other => Self::Unknown(other),
        }
    }
}

impl From<UrbCommand> for u32 {
    fn from(command: UrbCommand) -> Self {
        match command {
            UrbCommand::Submit => UrbCommand::CMD_SUBMIT,
            UrbCommand::Unlink => UrbCommand::CMD_UNLINK,
            UrbCommand::RetSubmit => UrbCommand::RET_SUBMIT,
            UrbCommand::RetUnlink => UrbCommand::RET_UNLINK,
            UrbCommand::Unknown(raw) => raw,
        }
    }
}

/// Common header of every URB message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrbHeader {
    pub command: UrbCommand,
    /// Sequence number for matching requests/responses
    pub seqnum: u32,
    pub devid: u32,
    /// 0 = USBIP_DIR_OUT, 1 = USBIP_DIR_IN
    pub direction: u32,
    /// Endpoint number
    pub ep: u32,
}

impl UrbHeader {
    pub const SIZE: usize = 20;

    pub fn new(command: UrbCommand, seqnum: u32, devid: u32) -> Self {
        Self {
            command,
            seqnum,
            devid,
            direction: 0,
            ep: 0,
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            command: UrbCommand::from(reader.read_u32::<BigEndian>()?),
            seqnum: reader.read_u32::<BigEndian>()?,
            devid: reader.read_u32::<BigEndian>()?,
            direction: reader.read_u32::<BigEndian>()?,
            ep: reader.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(self.command.into())?;
        writer.write_u32::<BigEndian>(self.seqnum)?;
        writer.write_u32::<BigEndian>(self.devid)?;
        writer.write_u32::<BigEndian>(self.direction)?;
        writer.write_u32::<BigEndian>(self.ep)?;
        Ok(())
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len("urb header", frame, Self::SIZE)?;
        Self::read_from(&mut Cursor::new(frame))
    }
}

/// `USBIP_CMD_SUBMIT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdSubmit {
    pub header: UrbHeader,
    pub transfer_flags: u32,
    /// Transfer length requested by the client
    pub transfer_buffer_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub interval: u32,
    /// Setup packet for control transfers
    pub setup: [u8; 8],
}

impl CmdSubmit {
    pub const SIZE: usize = URB_MESSAGE_SIZE;

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            header: UrbHeader::read_from(reader)?,
            transfer_flags: reader.read_u32::<BigEndian>()?,
            transfer_buffer_length: reader.read_u32::<BigEndian>()?,
            start_frame: reader.read_u32::<BigEndian>()?,
            number_of_packets: reader.read_u32::<BigEndian>()?,
            interval: reader.read_u32::<BigEndian>()?,
            setup: read_array(reader)?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.write_to(writer)?;
        writer.write_u32::<BigEndian>(self.transfer_flags)?;
        writer.write_u32::<BigEndian>(self.transfer_buffer_length)?;
        writer.write_u32::<BigEndian>(self.start_frame)?;
        writer.write_u32::<BigEndian>(self.number_of_packets)?;
        writer.write_u32::<BigEndian>(self.interval)?;
        writer.write_all(&self.setup)?;
        Ok(())
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len("cmd submit", frame, Self::SIZE)?;
        Self::read_from(&mut Cursor::new(frame))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// `USBIP_RET_SUBMIT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetSubmit {
    pub header: UrbHeader,
    /// 0 = success, negative errno otherwise
    pub status: i32,
    /// Payload length claimed to follow the message
    pub actual_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub error_count: u32,
    pub setup: [u8; 8],
}

impl RetSubmit {
    pub const SIZE: usize = URB_MESSAGE_SIZE;

    /// Successful return for `cmd`, echoing its routing fields
    pub fn success(cmd: &CmdSubmit, actual_length: u32) -> Self {
        Self {
            header: UrbHeader {
                command: UrbCommand::RetSubmit,
                ..cmd.header
            },
            status: USBIP_STATUS_OK as i32,
            actual_length,
            start_frame: 0,
            number_of_packets: 0,
            error_count: 0,
            setup: [0u8; 8],
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            header: UrbHeader::read_from(reader)?,
            status: reader.read_i32::<BigEndian>()?,
            actual_length: reader.read_u32::<BigEndian>()?,
            start_frame: reader.read_u32::<BigEndian>()?,
            number_of_packets: reader.read_u32::<BigEndian>()?,
            error_count: reader.read_u32::<BigEndian>()?,
            setup: read_array(reader)?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.write_to(writer)?;
        writer.write_i32::<BigEndian>(self.status)?;
        writer.write_u32::<BigEndian>(self.actual_length)?;
        writer.write_u32::<BigEndian>(self.start_frame)?;
        writer.write_u32::<BigEndian>(self.number_of_packets)?;
        writer.write_u32::<BigEndian>(self.error_count)?;
        writer.write_all(&self.setup)?;
        Ok(())
    }

    /// Encode over the front of `buf`, leaving the rest untouched
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        ensure_len("ret submit buffer", buf, Self::SIZE)?;
        let mut dst = &mut buf[..Self::SIZE];
        self.write_to(&mut dst)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len("ret submit", frame, Self::SIZE)?;
        Self::read_from(&mut Cursor::new(frame))
    }
}

/// A decoded URB frame, tagged by command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrbFrame {
    Submit(CmdSubmit),
    /// Accepted and dropped by the emulator
    Unlink(UrbHeader),
    Other(UrbHeader),
}

impl UrbFrame {
    /// Two-phase decode: header first, full submit only when named
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let header = UrbHeader::decode(frame)?;
        Ok(match header.command {
            UrbCommand::Submit => Self::Submit(CmdSubmit::decode(frame)?),
            UrbCommand::Unlink => Self::Unlink(header),
            _ => Self::Other(header),
        })
    }
}
