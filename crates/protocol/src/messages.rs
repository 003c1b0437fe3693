//! Control-plane message definitions
//!
//! Control messages (`OP_*`) come from the userspace USB/IP tool before the
//! kernel takes over the socket. They share an 8-byte header:
//! ```text
//! [version: u16][command: u16][status: u32]
//! ```
//! The server decodes the header first and only then the variant it names,
//! see [`ControlRequest::decode`].

use crate::codec::{USBIP_STATUS_OK, ensure_len, fixed_str, str_from_fixed};
use crate::error::Result;
use crate::types::{BUSID_SIZE, ExportedDevice};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Control-plane command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// `OP_REQ_DEVLIST`
    DevListRequest,
    /// `OP_REP_DEVLIST`
    DevListReply,
    /// `OP_REQ_IMPORT`
    ImportRequest,
    /// `OP_REP_IMPORT`
    ImportReply,
    /// Anything else; tolerated and ignored by the server
    Unknown(u16),
}

impl OpCode {
    pub const DEVLIST_REQUEST: u16 = 0x8005;
    pub const DEVLIST_REPLY: u16 = 0x0005;
    pub const IMPORT_REQUEST: u16 = 0x8003;
    pub const IMPORT_REPLY: u16 = 0x0003;
}

impl From<u16> for OpCode {
    fn from(value: u16) -> Self {
        match value {
            Self::DEVLIST_REQUEST => Self::DevListRequest,
            Self::DEVLIST_REPLY => Self::DevListReply,
            Self::IMPORT_REQUEST => Self::ImportRequest,
            Self::IMPORT_REPLY => Self::ImportReply,
            other => Self::Unknown(other),
        }
    }
}

impl From<OpCode> for u16 {
    fn from(code: OpCode) -> Self {
        match code {
            OpCode::DevListRequest => OpCode::DEVLIST_REQUEST,
            OpCode::DevListReply => OpCode::DEVLIST_REPLY,
            OpCode::ImportRequest => OpCode::IMPORT_REQUEST,
            OpCode::ImportReply => OpCode::IMPORT_REPLY,
            OpCode::Unknown(raw) => raw,
        }
    }
}

/// Common header of every control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpHeader {
    pub version: u16,
    pub command: OpCode,
    pub status: u32,
}

impl OpHeader {
    pub const SIZE: usize = 8;

    /// Header with status OK
    pub fn new(version: u16, command: OpCode) -> Self {
        Self {
            version,
            command,
            status: USBIP_STATUS_OK,
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let version = reader.read_u16::<BigEndian>()?;
        let command = OpCode::from(reader.read_u16::<BigEndian>()?);
        let status = reader.read_u32::<BigEndian>()?;
        Ok(Self {
            version,
            command,
            status,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.version)?;
        writer.write_u16::<BigEndian>(self.command.into())?;
        writer.write_u32::<BigEndian>(self.status)?;
        Ok(())
    }

    /// Decode the header from the front of a frame
    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len("op header", frame, Self::SIZE)?;
        Self::read_from(&mut Cursor::new(frame))
    }
}

/// `OP_REQ_IMPORT`: header followed by the requested bus id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub header: OpHeader,
    /// `None` when the frame stopped after the header
    pub busid: Option<String>,
}

impl ImportRequest {
    pub const SIZE: usize = OpHeader::SIZE + BUSID_SIZE;

    pub fn new(version: u16, busid: &str) -> Self {
        Self {
            header: OpHeader::new(version, OpCode::ImportRequest),
            busid: Some(busid.to_string()),
        }
    }

    /// Decode from a frame; the bus id is optional, the header is not
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let header = OpHeader::decode(frame)?;
        let busid = frame
            .get(OpHeader::SIZE..Self::SIZE)
            .map(str_from_fixed);
        Ok(Self { header, busid })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.write_to(writer)?;
        let busid: [u8; BUSID_SIZE] = fixed_str(self.busid.as_deref().unwrap_or_default());
        writer.write_all(&busid)?;
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// A decoded control request, tagged by command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    DevList(OpHeader),
    Import(ImportRequest),
    /// Any other command code, including replies sent the wrong way
    Other(OpHeader),
}

impl ControlRequest {
    /// Two-phase decode: header first, then the variant it names
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let header = OpHeader::decode(frame)?;
        Ok(match header.command {
            OpCode::DevListRequest => Self::DevList(header),
            OpCode::ImportRequest => Self::Import(ImportRequest::decode(frame)?),
            _ => Self::Other(header),
        })
    }

    pub fn header(&self) -> &OpHeader {
        match self {
            Self::DevList(header) | Self::Other(header) => header,
            Self::Import(request) => &request.header,
        }
    }
}

/// `OP_REP_DEVLIST` carrying a single device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevListReply {
    pub header: OpHeader,
    pub num_devices: u32,
    pub device: ExportedDevice,
}

impl DevListReply {
    /// Header, count, identity, interface triple and one padding byte
    pub const SIZE: usize = OpHeader::SIZE + 4 + ExportedDevice::IDENTITY_SIZE + 4;

    /// Reply listing `device`, echoing the requester's `version`
    pub fn new(version: u16, device: ExportedDevice) -> Self {
        Self {
            header: OpHeader::new(version, OpCode::DevListReply),
            num_devices: 1,
            device,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.write_to(writer)?;
        writer.write_u32::<BigEndian>(self.num_devices)?;
        self.device.write_identity(writer)?;
        writer.write_u8(self.device.interface_class)?;
        writer.write_u8(self.device.interface_subclass)?;
        writer.write_u8(self.device.interface_protocol)?;
        // padding
        writer.write_u8(0)?;
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len("devlist reply", frame, Self::SIZE)?;
        let mut cursor = Cursor::new(frame);
        let header = OpHeader::read_from(&mut cursor)?;
        let num_devices = cursor.read_u32::<BigEndian>()?;
        let mut device = ExportedDevice::read_identity(&mut cursor)?;
        device.interface_class = cursor.read_u8()?;
        device.interface_subclass = cursor.read_u8()?;
        device.interface_protocol = cursor.read_u8()?;
        Ok(Self {
            header,
            num_devices,
            device,
        })
    }
}

/// `OP_REP_IMPORT`: identity of the device now exported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReply {
    pub header: OpHeader,
    pub device: ExportedDevice,
}

impl ImportReply {
    pub const SIZE: usize = OpHeader::SIZE + ExportedDevice::IDENTITY_SIZE;

    /// Acknowledge import of `device`, echoing the requester's `version`
    pub fn new(version: u16, device: ExportedDevice) -> Self {
        Self {
            header: OpHeader::new(version, OpCode::ImportReply),
            device,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.write_to(writer)?;
        self.device.write_identity(writer)?;
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len("import reply", frame, Self::SIZE)?;
        let mut cursor = Cursor::new(frame);
        let header = OpHeader::read_from(&mut cursor)?;
        let device = ExportedDevice::read_identity(&mut cursor)?;
        Ok(Self { header, device })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::version::USBIP_VERSION;

    #[test]
    fn test_opcode_mapping() {
        assert_eq!(OpCode::from(0x8005), OpCode::DevListRequest);
        assert_eq!(OpCode::from(0x8003), OpCode::ImportRequest);
        assert_eq!(OpCode::from(0x1234), OpCode::Unknown(0x1234));
        assert_eq!(u16::from(OpCode::DevListReply), 0x0005);
        assert_eq!(u16::from(OpCode::ImportReply), 0x0003);
        assert_eq!(u16::from(OpCode::Unknown(0x4242)), 0x4242);
    }

    #[test]
    fn test_header_wire_layout() {
        let header = OpHeader::new(USBIP_VERSION, OpCode::DevListRequest);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        assert_eq!(buf, vec![0x01, 0x11, 0x80, 0x05, 0, 0, 0, 0]);
    }

    #[test]
    fn test_header_truncated() {
        let result = OpHeader::decode(&[0x01, 0x11, 0x80]);
        assert!(matches!(
            result,
            Err(ProtocolError::Truncated {
                needed: 8,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_control_request_variants() {
        let devlist = [0x01, 0x11, 0x80, 0x05, 0, 0, 0, 0];
        assert!(matches!(
            ControlRequest::decode(&devlist).unwrap(),
            ControlRequest::DevList(_)
        ));

        let import = ImportRequest::new(USBIP_VERSION, "1-1").encode().unwrap();
        let ControlRequest::Import(request) = ControlRequest::decode(&import).unwrap() else {
            panic!("Expected Import request");
        };
        assert_eq!(request.busid.as_deref(), Some("1-1"));

        let other = [0x01, 0x11, 0x12, 0x34, 0, 0, 0, 0];
        let decoded = ControlRequest::decode(&other).unwrap();
        assert!(matches!(decoded, ControlRequest::Other(_)));
        assert_eq!(decoded.header().command, OpCode::Unknown(0x1234));
    }

    #[test]
    fn test_import_request_without_busid() {
        let frame = [0x01, 0x11, 0x80, 0x03, 0, 0, 0, 0];
        let request = ImportRequest::decode(&frame).unwrap();
        assert_eq!(request.header.command, OpCode::ImportRequest);
        assert!(request.busid.is_none());
    }

    #[test]
    fn test_devlist_reply_size() {
        let reply = DevListReply::new(USBIP_VERSION, ExportedDevice::synthetic());
        let bytes = reply.encode().unwrap();
        assert_eq!(bytes.len(), DevListReply::SIZE);
        assert_eq!(bytes.len(), 328);
    }

    #[test]
    fn test_import_reply_size() {
        let reply = ImportReply::new(USBIP_VERSION, ExportedDevice::synthetic());
        let bytes = reply.encode().unwrap();
        assert_eq!(bytes.len(), ImportReply::SIZE);
        assert_eq!(bytes.len(), 320);
    }

    #[test]
    fn test_devlist_reply_count_field() {
        let bytes = DevListReply::new(0x0111, ExportedDevice::synthetic())
            .encode()
            .unwrap();
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);
        assert_eq!(&bytes[12..41], b"/sys/fake/dangerous/usbipdemo");
    }
}
