//! Exported device identity
//!
//! The emulator exports exactly one fabricated device. Its identity is
//! constant for the lifetime of the process and is echoed by both the
//! device-list and the import replies.

use crate::codec::{fixed_str, read_array, str_from_fixed};
use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Sysfs-style path reported for the fake device
pub const FAKE_DEVICE_PATH: &str = "/sys/fake/dangerous/usbipdemo";

/// Bus id reported for the fake device
pub const FAKE_BUS_ID: &str = "1-1";

/// USB Vendor ID of the fake device
pub const FAKE_VENDOR_ID: u16 = 0xDEAD;

/// USB Product ID of the fake device
pub const FAKE_PRODUCT_ID: u16 = 0xBEEF;

/// Length of the path field on the wire
pub const PATH_SIZE: usize = 256;

/// Length of the bus id field on the wire
pub const BUSID_SIZE: usize = 32;

/// USB device speed as encoded by USB/IP (`enum usb_device_speed`)
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSpeed {
    Unknown = 0,
    /// 1.5 Mbps (USB 1.0)
    Low = 1,
    /// 12 Mbps (USB 1.1)
    Full = 2,
    /// 480 Mbps (USB 2.0)
    High = 3,
    Wireless = 4,
    /// 5 Gbps (USB 3.0)
    Super = 5,
    /// 10 Gbps (USB 3.1)
    SuperPlus = 6,
}

impl From<DeviceSpeed> for u32 {
    fn from(speed: DeviceSpeed) -> Self {
        speed as u32
    }
}

impl DeviceSpeed {
    /// Map a wire value back to a speed; unknown values collapse to `Unknown`
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Low,
            2 => Self::Full,
            3 => Self::High,
            4 => Self::Wireless,
            5 => Self::Super,
            6 => Self::SuperPlus,
            _ => Self::Unknown,
        }
    }
}

/// Identity of an exported USB device as carried in `OP_REP_*` messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDevice {
    /// NUL-padded sysfs path
    pub path: [u8; PATH_SIZE],
    /// NUL-padded bus id (e.g. "1-1")
    pub busid: [u8; BUSID_SIZE],
    pub busnum: u32,
    pub devnum: u32,
    /// Raw speed value, see [`DeviceSpeed`]
    pub speed: u32,
    pub id_vendor: u16,
    pub id_product: u16,
    pub bcd_device: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub configuration_value: u8,
    pub num_configurations: u8,
    pub num_interfaces: u8,
    /// Only carried by the device-list reply
    pub interface_class: u8,
    /// Only carried by the device-list reply
    pub interface_subclass: u8,
    /// Only carried by the device-list reply
    pub interface_protocol: u8,
}

impl ExportedDevice {
    /// Size of the identity block shared by the list and import replies
    pub const IDENTITY_SIZE: usize = PATH_SIZE + BUSID_SIZE + 3 * 4 + 3 * 2 + 6;

    /// The single fabricated device: high speed, DEAD:BEEF on bus 1-1
    pub fn synthetic() -> Self {
        Self {
            path: fixed_str(FAKE_DEVICE_PATH),
            busid: fixed_str(FAKE_BUS_ID),
            busnum: 1,
            devnum: 1,
            speed: DeviceSpeed::High.into(),
            id_vendor: FAKE_VENDOR_ID,
            id_product: FAKE_PRODUCT_ID,
            bcd_device: 0,
            device_class: 0,
            device_subclass: 0,
            device_protocol: 0,
            configuration_value: 0,
            num_configurations: 0,
            num_interfaces: 0,
            interface_class: 0,
            interface_subclass: 0,
            interface_protocol: 0,
        }
    }

    pub fn path_str(&self) -> String {
        str_from_fixed(&self.path)
    }

    pub fn busid_str(&self) -> String {
        str_from_fixed(&self.busid)
    }

    pub fn speed(&self) -> DeviceSpeed {
        DeviceSpeed::from_u32(self.speed)
    }

    /// Write the identity block (path through `bNumInterfaces`)
    pub fn write_identity<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.path)?;
        writer.write_all(&self.busid)?;
        writer.write_u32::<BigEndian>(self.busnum)?;
        writer.write_u32::<BigEndian>(self.devnum)?;
        writer.write_u32::<BigEndian>(self.speed)?;
        writer.write_u16::<BigEndian>(self.id_vendor)?;
        writer.write_u16::<BigEndian>(self.id_product)?;
        writer.write_u16::<BigEndian>(self.bcd_device)?;
        writer.write_u8(self.device_class)?;
        writer.write_u8(self.device_subclass)?;
        writer.write_u8(self.device_protocol)?;
        writer.write_u8(self.configuration_value)?;
        writer.write_u8(self.num_configurations)?;
        writer.write_u8(self.num_interfaces)?;
        Ok(())
    }

    /// Read the identity block; interface fields are left at zero
    pub fn read_identity<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            path: read_array(reader)?,
            busid: read_array(reader)?,
            busnum: reader.read_u32::<BigEndian>()?,
            devnum: reader.read_u32::<BigEndian>()?,
            speed: reader.read_u32::<BigEndian>()?,
            id_vendor: reader.read_u16::<BigEndian>()?,
            id_product: reader.read_u16::<BigEndian>()?,
            bcd_device: reader.read_u16::<BigEndian>()?,
            device_class: reader.read_u8()?,
            device_subclass: reader.read_u8()?,
            device_protocol: reader.read_u8()?,
            configuration_value: reader.read_u8()?,
            num_configurations: reader.read_u8()?,
            num_interfaces: reader.read_u8()?,
            interface_class: 0,
            interface_subclass: 0,
            interface_protocol: 0,
        })
    }
}
