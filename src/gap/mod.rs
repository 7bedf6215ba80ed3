//! Generic Access Profile data: peer addresses, discovered devices and
//! the registry that collects them during a scan.

pub mod adv_parser;
pub mod registry;
pub mod scanner;

use core::fmt;

use heapless::String;

use crate::config::{HID_SERVICE_UUID16, NAME_MAX_LEN};

/// 48-bit Bluetooth device address, most significant byte first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// Parse the canonical `XX:XX:XX:XX:XX:XX` form.
    ///
    /// The string must be exactly 17 characters long with exactly 5 colons
    /// at the separator positions; anything else is not an address.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 17 || bytes.iter().filter(|&&b| b == b':').count() != 5 {
            return None;
        }
        let mut addr = [0u8; 6];
        for (i, byte) in addr.iter_mut().enumerate() {
            if i > 0 && bytes[3 * i - 1] != b':' {
                return None;
            }
            let pair = s.get(3 * i..3 * i + 2)?;
            if !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            *byte = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(BdAddr(addr))
    }

    /// Canonical lowercase string form.
    pub fn to_str(&self) -> String<17> {
        let mut out = String::new();
        let _ = fmt::write(&mut out, format_args!("{}", self));
        out
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

impl From<[u8; 6]> for BdAddr {
    fn from(raw: [u8; 6]) -> Self {
        BdAddr(raw)
    }
}

/// Radio technology a peer was seen on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportKind {
    Classic,
    Ble,
    DualMode,
}

impl TransportKind {
    pub const fn is_ble(&self) -> bool {
        matches!(self, TransportKind::Ble | TransportKind::DualMode)
    }

    pub const fn label(&self) -> &'static str {
        match self {
            TransportKind::Classic => "BT",
            TransportKind::Ble => "BLE",
            TransportKind::DualMode => "DUMO",
        }
    }
}

/// BLE address type as reported by the advertiser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleAddrType {
    #[default]
    Public,
    Random,
    PublicId,
    RandomId,
}

/// Service UUID in one of the three Bluetooth widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Uuid {
    Uuid16(u16),
    Uuid32(u32),
    /// Little-endian, as carried on air.
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Decode from raw little-endian bytes; the width picks the form.
    pub fn from_le_bytes(data: &[u8]) -> Option<Self> {
        match data.len() {
            2 => Some(Uuid::Uuid16(u16::from_le_bytes([data[0], data[1]]))),
            4 => Some(Uuid::Uuid32(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))),
            16 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(data);
                Some(Uuid::Uuid128(raw))
            }
            _ => None,
        }
    }

    pub const fn width(&self) -> usize {
        match self {
            Uuid::Uuid16(_) => 2,
            Uuid::Uuid32(_) => 4,
            Uuid::Uuid128(_) => 16,
        }
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(v) => write!(f, "{:04X}", v),
            Uuid::Uuid32(v) => write!(f, "{:08X}", v),
            Uuid::Uuid128(raw) => {
                for i in (0..16).rev() {
                    write!(f, "{:02x}", raw[i])?;
                    if matches!(i, 12 | 10 | 8 | 6) {
                        f.write_str("-")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Transport-specific part of a discovered device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceDetails {
    Classic {
        /// Class-of-device bitfield.
        cod: u32,
        uuid: Option<Uuid>,
    },
    Ble {
        /// Advertised 16-bit service UUID, 0 when none was seen.
        service_uuid16: u16,
        appearance: u16,
        addr_type: BleAddrType,
    },
}

/// One peer observed during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredDevice {
    pub kind: TransportKind,
    pub addr: BdAddr,
    pub name: String<NAME_MAX_LEN>,
    pub rssi: i8,
    pub details: DeviceDetails,
}

impl DiscoveredDevice {
    /// Empty record for an address seen for the first time.
    pub fn new(kind: TransportKind, addr: BdAddr) -> Self {
        let details = if kind.is_ble() {
            DeviceDetails::Ble {
                service_uuid16: 0,
                appearance: 0,
                addr_type: BleAddrType::Public,
            }
        } else {
            DeviceDetails::Classic { cod: 0, uuid: None }
        };
        Self {
            kind,
            addr,
            name: String::new(),
            rssi: 0,
            details,
        }
    }

    /// Advertised 16-bit service UUID of a BLE peer, 0 otherwise.
    pub fn service_uuid16(&self) -> u16 {
        match self.details {
            DeviceDetails::Ble { service_uuid16, .. } => service_uuid16,
            DeviceDetails::Classic { .. } => 0,
        }
    }

    /// `false` only for BLE peers advertising some service other than HID.
    pub fn advertises_hid(&self) -> bool {
        let uuid = self.service_uuid16();
        uuid == 0 || uuid == HID_SERVICE_UUID16
    }

    pub fn addr_type(&self) -> BleAddrType {
        match self.details {
            DeviceDetails::Ble { addr_type, .. } => addr_type,
            DeviceDetails::Classic { .. } => BleAddrType::Public,
        }
    }
}

/// Human-readable HID appearance, if the code is one of the HID values.
pub fn appearance_name(appearance: u16) -> Option<&'static str> {
    match appearance {
        0x03C0 => Some("Generic"),
        0x03C1 => Some("Keyboard"),
        0x03C2 => Some("Mouse"),
        0x03C3 => Some("Joystick"),
        0x03C4 => Some("Gamepad"),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
