//! System control and Surface Dial reports.
//!
//! System control is a single byte carrying a Generic Desktop system
//! control usage; bit 7 marks a press. The dial report is two bytes:
//! bit 0 is the button, the remaining 15 bits a signed rotation.

/// System control report size in bytes (report id 7).
pub const SYSTEM_CONTROL_REPORT_SIZE: usize = 1;

/// Surface Dial report size in bytes (report id 8).
pub const DIAL_REPORT_SIZE: usize = 2;

/// Bit set on a system control code while it is pressed.
pub const SYSTEM_CONTROL_PRESSED: u8 = 0x80;

/// Generic Desktop system control usages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SystemControl {
    PowerDown = 0x01,
    Sleep = 0x02,
    WakeUp = 0x03,
    ContextMenu = 0x04,
    MainMenu = 0x05,
    AppMenu = 0x06,
    MenuHelp = 0x07,
    MenuExit = 0x08,
    MenuSelect = 0x09,
    MenuLeft = 0x0A,
    MenuRight = 0x0B,
    MenuUp = 0x0C,
    MenuDown = 0x0D,
    ColdRestart = 0x0E,
    WarmRestart = 0x0F,
    DpadUp = 0x10,
    DpadDown = 0x11,
    DpadRight = 0x12,
    DpadLeft = 0x13,
}

impl TryFrom<u8> for SystemControl {
    type Error = crate::Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        use SystemControl::*;
        Ok(match code & !SYSTEM_CONTROL_PRESSED {
            0x01 => PowerDown,
            0x02 => Sleep,
            0x03 => WakeUp,
            0x04 => ContextMenu,
            0x05 => MainMenu,
            0x06 => AppMenu,
            0x07 => MenuHelp,
            0x08 => MenuExit,
            0x09 => MenuSelect,
            0x0A => MenuLeft,
            0x0B => MenuRight,
            0x0C => MenuUp,
            0x0D => MenuDown,
            0x0E => ColdRestart,
            0x0F => WarmRestart,
            0x10 => DpadUp,
            0x11 => DpadDown,
            0x12 => DpadRight,
            0x13 => DpadLeft,
            _ => return Err(crate::Error::InvalidArgument),
        })
    }
}

/// Raw system control report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemControlReport(pub u8);

impl SystemControlReport {
    pub const fn press(code: SystemControl) -> Self {
        Self(code as u8 | SYSTEM_CONTROL_PRESSED)
    }

    pub const fn release() -> Self {
        Self(0)
    }

    pub fn is_pressed(&self) -> bool {
        self.0 & SYSTEM_CONTROL_PRESSED != 0
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        data.first().map(|&b| Self(b))
    }

    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match buf.first_mut() {
            Some(b) => {
                *b = self.0;
                SYSTEM_CONTROL_REPORT_SIZE
            }
            None => 0,
        }
    }
}

/// Surface Dial actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DialKey {
    /// Button release.
    Release = 0x00,
    /// Button press.
    Press = 0x01,
    /// Knob rotate counter-clockwise.
    RotateLeft = 0x38,
    /// Knob rotate clockwise.
    RotateRight = 0xC8,
}

/// Raw dial report: key byte and the sign-extension byte of the rotation.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DialReport {
    pub code: u8,
    pub extra: u8,
}

impl DialReport {
    pub const fn new(key: DialKey) -> Self {
        Self {
            code: key as u8,
            extra: if matches!(key, DialKey::RotateLeft) { 0xFF } else { 0 },
        }
    }

    /// Button state.
    pub fn pressed(&self) -> bool {
        self.code & 0x01 != 0
    }

    /// Signed rotation in 0.1 degree units.
    pub fn rotation(&self) -> i16 {
        // 15-bit signed field above the button bit
        (u16::from_le_bytes([self.code, self.extra]) as i16) >> 1
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < DIAL_REPORT_SIZE {
            return None;
        }
        Some(Self {
            code: data[0],
            extra: data[1],
        })
    }

    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < DIAL_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.code;
        buf[1] = self.extra;
        DIAL_REPORT_SIZE
    }
}
