//! HID report descriptors and per-layout device profiles.
//!
//! The same descriptor is advertised over USB and over Bluetooth, so the
//! report ids and byte layouts here must match the report types in
//! [`super`] exactly.

use super::gamepad::GamepadLayout;
use super::ReportId;
use crate::config;

/// Composite descriptor for the general profile: keyboard (1), mouse (2),
/// absolute mouse (3), gamepad (6), system control (7), dial (8).
pub const GENERAL_REPORT_DESCRIPTOR: &[u8] = &[
    // ── Keyboard ──
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x01, //   Report ID (1)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x95, 0x08, //   Report Count (8)
    0x75, 0x01, //   Report Size (1)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x05, 0x0C, //   Usage Page (Consumer) - reserved byte
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0xFF, //   Usage Maximum (255)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x00, //   Input (Data, Array)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0xFF, //   Usage Maximum (255)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x00, //   Input (Data, Array)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (Num Lock)
    0x29, 0x08, //   Usage Maximum (8)
    0x95, 0x08, //   Report Count (8)
    0x75, 0x01, //   Report Size (1)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0xC0, // End Collection
    // ── Mouse ──
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x02, //   Report ID (2)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x08, //     Usage Maximum (8)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x08, //     Report Count (8)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x08, //     Report Size (8)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0x05, 0x0C, //     Usage Page (Consumer)
    0x0A, 0x38, 0x02, // Usage (AC Pan)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x08, //     Report Size (8)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xC0, //   End Collection
    0xC0, // End Collection
    // ── Absolute mouse ──
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x03, //   Report ID (3)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x08, //     Usage Maximum (8)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x08, //     Report Count (8)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x15, 0x00, //     Logical Minimum (0)
    0x26, 0xFF, 0x7F, // Logical Maximum (32767)
    0x95, 0x02, //     Report Count (2)
    0x75, 0x10, //     Report Size (16)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x08, //     Report Size (8)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0x05, 0x0C, //     Usage Page (Consumer)
    0x0A, 0x38, 0x02, // Usage (AC Pan)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x08, //     Report Size (8)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xC0, //   End Collection
    0xC0, // End Collection
    // ── Gamepad ──
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Gamepad)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x06, //   Report ID (6)
    0x09, 0x30, //   Usage (X)
    0x09, 0x31, //   Usage (Y)
    0x09, 0x32, //   Usage (Z)
    0x09, 0x33, //   Usage (Rx)
    0x09, 0x34, //   Usage (Ry)
    0x09, 0x35, //   Usage (Rz)
    0x15, 0x81, //   Logical Minimum (-127)
    0x25, 0x7F, //   Logical Maximum (127)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x09, 0x39, //   Usage (Hat Switch)
    0x09, 0x39, //   Usage (Hat Switch)
    0x15, 0x01, //   Logical Minimum (1)
    0x25, 0x08, //   Logical Maximum (8)
    0x35, 0x00, //   Physical Minimum (0)
    0x46, 0x3B, 0x01, // Physical Maximum (315)
    0x95, 0x02, //   Report Count (2)
    0x75, 0x04, //   Report Size (4)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x10, //   Usage Maximum (16)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x95, 0x10, //   Report Count (16)
    0x75, 0x01, //   Report Size (1)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0xC0, // End Collection
    // ── System control ──
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x80, // Usage (System Control)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x07, //   Report ID (7)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0xFF, //   Usage Maximum (255)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x00, //   Input (Data, Array)
    0xC0, // End Collection
    // ── Surface Dial ──
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x0E, // Usage (System Multi-Axis Controller)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x08, //   Report ID (8)
    0x05, 0x0D, //   Usage Page (Digitizer)
    0x09, 0x21, //   Usage (Puck)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x09, 0x01, //     Usage (1)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x01, //     Report Size (1)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x37, //     Usage (Dial)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x0F, //     Report Size (15)
    0x55, 0x0F, //     Unit Exponent (-1)
    0x65, 0x14, //     Unit (Degrees)
    0x36, 0xF0, 0xF1, // Physical Minimum (-3600)
    0x46, 0x10, 0x0E, // Physical Maximum (3600)
    0x16, 0xF0, 0xF1, // Logical Minimum (-3600)
    0x26, 0x10, 0x0E, // Logical Maximum (3600)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xC0, //   End Collection
    0xC0, // End Collection
];

/// Device identity and report sizes for one gamepad layout.
///
/// Vendor layouts (XInput, Switch, DualSense) advertise a descriptor
/// captured from the real controller; boards supply it through
/// [`HidProfile::with_descriptor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidProfile {
    /// `None` disables gamepad reports entirely.
    pub layout: Option<GamepadLayout>,
    pub vid: u16,
    pub pid: u16,
    pub version: u16,
    pub description: &'static str,
    pub report_descriptor: &'static [u8],
}

impl Default for HidProfile {
    fn default() -> Self {
        Self {
            layout: None,
            vid: config::USB_VID,
            pid: config::USB_PID,
            version: 0,
            description: "",
            report_descriptor: &[],
        }
    }
}

impl HidProfile {
    pub fn for_layout(layout: GamepadLayout) -> Self {
        match layout {
            GamepadLayout::General => Self {
                layout: Some(layout),
                vid: 0x05DF,
                pid: config::USB_PID,
                version: 0,
                description: "Keybd(1), Mouse(2-3), Joyst(6), SCtrl(7), SDial(8)",
                report_descriptor: GENERAL_REPORT_DESCRIPTOR,
            },
            GamepadLayout::XInput => Self {
                layout: Some(layout),
                vid: 0x045E,
                pid: 0x0B13,
                version: 0x0509,
                description: "Microsoft XInput compatible gamepad",
                report_descriptor: &[],
            },
            GamepadLayout::Switch => Self {
                layout: Some(layout),
                vid: 0x057E,
                pid: 0x2009,
                version: 0x0101,
                description: "Nintendo Switch compatible gamepad",
                report_descriptor: &[],
            },
            GamepadLayout::DualSense => Self {
                layout: Some(layout),
                vid: 0x054C,
                pid: 0x0CE6,
                version: 0x0101,
                description: "PlayStation DualSense gamepad",
                report_descriptor: &[],
            },
        }
    }

    /// Profile with the general composite descriptor.
    pub fn general() -> Self {
        Self::for_layout(GamepadLayout::General)
    }

    pub fn with_descriptor(mut self, descriptor: &'static [u8]) -> Self {
        self.report_descriptor = descriptor;
        self
    }

    /// Payload length of `id` under this profile; `0` means not sendable.
    pub fn report_size(&self, id: ReportId) -> usize {
        match id {
            ReportId::Gamepad => self.layout.map(|l| l.report_size()).unwrap_or(0),
            other => other.payload_size(),
        }
    }

    /// Whether reports with `id` may be emitted under this profile.
    ///
    /// Without a layout gamepad reports are refused; a vendor layout only
    /// carries gamepad reports.
    pub fn accepts(&self, id: ReportId) -> bool {
        match self.layout {
            None => id != ReportId::Gamepad,
            Some(GamepadLayout::General) => true,
            Some(_) => id == ReportId::Gamepad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_profile_accepts_everything() {
        let profile = HidProfile::general();
        assert!(profile.accepts(ReportId::Keyboard));
        assert!(profile.accepts(ReportId::Gamepad));
        assert_eq!(profile.report_size(ReportId::Gamepad), 9);
        assert_eq!(profile.vid, 0x05DF);
    }

    #[test]
    fn vendor_profile_only_accepts_gamepad() {
        let profile = HidProfile::for_layout(GamepadLayout::XInput);
        assert!(profile.accepts(ReportId::Gamepad));
        assert!(!profile.accepts(ReportId::Keyboard));
        assert_eq!(profile.report_size(ReportId::Gamepad), 16);
        assert_eq!((profile.vid, profile.pid), (0x045E, 0x0B13));
    }

    #[test]
    fn default_profile_refuses_gamepad() {
        let profile = HidProfile::default();
        assert!(!profile.accepts(ReportId::Gamepad));
        assert!(profile.accepts(ReportId::Mouse));
        assert_eq!(profile.report_size(ReportId::Gamepad), 0);
        assert!(profile.report_descriptor.is_empty());
    }

    #[test]
    fn general_descriptor_is_balanced() {
        let opens = GENERAL_REPORT_DESCRIPTOR
            .windows(2)
            .filter(|w| w[0] == 0xA1 && w[1] <= 0x01)
            .count();
        let closes = GENERAL_REPORT_DESCRIPTOR.iter().filter(|&&b| b == 0xC0).count();
        assert_eq!(opens, closes);
    }
}
