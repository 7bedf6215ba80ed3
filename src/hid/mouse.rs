//! Relative and absolute mouse reports.
//!
//! Relative layout (5 bytes, report id 2):
//! ```text
//! Byte 0: Button bitfield
//!         Bit 0 = Left, Bit 1 = Right, Bit 2 = Middle,
//!         Bit 3 = Backward, Bit 4 = Forward
//! Byte 1: X displacement (signed, -127..127)
//! Byte 2: Y displacement (signed, -127..127)
//! Byte 3: Vertical wheel (signed, -127..127)
//! Byte 4: Horizontal pan (signed, -127..127)
//! ```
//!
//! Absolute layout (7 bytes, report id 3): buttons, X and Y as
//! little-endian `u16` in `0..=32767`, then wheel and pan.

/// Relative mouse report size in bytes.
pub const MOUSE_REPORT_SIZE: usize = 5;

/// Absolute mouse report size in bytes.
pub const ABS_MOUSE_REPORT_SIZE: usize = 7;

pub const BUTTON_LEFT: u8 = 1 << 0;
pub const BUTTON_RIGHT: u8 = 1 << 1;
pub const BUTTON_MIDDLE: u8 = 1 << 2;
pub const BUTTON_BACKWARD: u8 = 1 << 3;
pub const BUTTON_FORWARD: u8 = 1 << 4;

/// Number of buttons tracked by edge detection.
pub const BUTTON_COUNT: usize = 5;

/// Button names, indexed by bit position.
pub const BUTTON_NAMES: [&str; BUTTON_COUNT] = ["Left", "Right", "Middle", "Backward", "Forward"];

/// Button bit for a case-insensitive name, `0` when unknown.
pub fn button_from_name(name: &str) -> u8 {
    BUTTON_NAMES
        .iter()
        .position(|n| n.eq_ignore_ascii_case(name))
        .map(|i| 1 << i)
        .unwrap_or(0)
}

/// Relative mouse report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Button bitfield.
    pub buttons: u8,
    /// Relative X movement.
    pub x: i8,
    /// Relative Y movement.
    pub y: i8,
    /// Vertical wheel delta.
    pub wheel: i8,
    /// Horizontal pan delta.
    pub pan: i8,
}

impl MouseReport {
    /// Create an idle (no movement, no buttons) report.
    pub const fn empty() -> Self {
        Self {
            buttons: 0,
            x: 0,
            y: 0,
            wheel: 0,
            pan: 0,
        }
    }

    /// Parse from raw report bytes.
    ///
    /// Accepts a 4-byte boot report (no pan) or the full 5-byte report.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        Some(Self {
            buttons: data[0],
            x: data[1] as i8,
            y: data[2] as i8,
            wheel: data[3] as i8,
            pan: if data.len() >= MOUSE_REPORT_SIZE { data[4] as i8 } else { 0 },
        })
    }

    /// Serialise into a byte slice. Returns 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1] = self.x as u8;
        buf[2] = self.y as u8;
        buf[3] = self.wheel as u8;
        buf[4] = self.pan as u8;
        MOUSE_REPORT_SIZE
    }

    /// Returns `true` if nothing moves and no button is held.
    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0 && self.wheel == 0 && self.pan == 0
    }
}

/// Absolute mouse report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AbsMouseReport {
    pub buttons: u8,
    /// Absolute X position, `0..=0x7FFF`.
    pub x: u16,
    /// Absolute Y position, `0..=0x7FFF`.
    pub y: u16,
    pub wheel: i8,
    pub pan: i8,
}

impl AbsMouseReport {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ABS_MOUSE_REPORT_SIZE {
            return None;
        }
        Some(Self {
            buttons: data[0],
            x: u16::from_le_bytes([data[1], data[2]]),
            y: u16::from_le_bytes([data[3], data[4]]),
            wheel: data[5] as i8,
            pan: data[6] as i8,
        })
    }

    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < ABS_MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1..3].copy_from_slice(&self.x.to_le_bytes());
        buf[3..5].copy_from_slice(&self.y.to_le_bytes());
        buf[5] = self.wheel as u8;
        buf[6] = self.pan as u8;
        ABS_MOUSE_REPORT_SIZE
    }
}
