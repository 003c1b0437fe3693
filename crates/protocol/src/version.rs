//! USB/IP protocol version

/// USB/IP protocol version 1.1.1, as sent by current userspace tools
///
/// Replies never use this directly: they echo whatever version the request
/// carried.
pub const USBIP_VERSION: u16 = 0x0111;

/// Render a BCD-style version word as `major.minor.patch`
pub fn format_version(version: u16) -> String {
    format!(
        "{}.{}.{}",
        version >> 8,
        (version >> 4) & 0xF,
        version & 0xF
    )
}
