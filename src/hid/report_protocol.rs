//! HID report descriptor parser.
//!
//! A BLE HID peer publishes its report map when the host opens it. The
//! parser walks the item stream and records, for every report id, which
//! application collection it belongs to. Inbound reports are then routed
//! by usage rather than guessed from their length.
//!
//! ## Limitations
//!
//! - Only top-level application collections are classified
//! - Push/Pop state is not supported
//! - Long items are skipped

use heapless::Vec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportKind {
    Keyboard,
    Mouse,
    Gamepad,
    SystemControl,
    Dial,
    Consumer,
    Other,
}

/// Usage page codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsagePage {
    /// Generic Desktop (mouse, keyboard, joystick).
    GenericDesktop,
    /// Keyboard/Keypad.
    Keyboard,
    /// LEDs.
    Led,
    /// Button.
    Button,
    /// Consumer Control.
    Consumer,
    /// Digitizers.
    Digitizer,
    /// Unknown/unsupported.
    Unknown(u16),
}

impl From<u16> for UsagePage {
    fn from(code: u16) -> Self {
        match code {
            0x01 => UsagePage::GenericDesktop,
            0x07 => UsagePage::Keyboard,
            0x08 => UsagePage::Led,
            0x09 => UsagePage::Button,
            0x0C => UsagePage::Consumer,
            0x0D => UsagePage::Digitizer,
            other => UsagePage::Unknown(other),
        }
    }
}

/// Application collection kind from its usage page and usage.
fn classify_application(page: UsagePage, usage: u16) -> ReportKind {
    match (page, usage) {
        (UsagePage::GenericDesktop, 0x06 | 0x07) => ReportKind::Keyboard,
        (UsagePage::GenericDesktop, 0x01 | 0x02) => ReportKind::Mouse,
        (UsagePage::GenericDesktop, 0x04 | 0x05) => ReportKind::Gamepad,
        (UsagePage::GenericDesktop, 0x80) => ReportKind::SystemControl,
        (UsagePage::GenericDesktop, 0x0E) => ReportKind::Dial,
        (UsagePage::Consumer, _) => ReportKind::Consumer,
        _ => ReportKind::Other,
    }
}

/// Maximum number of report ids tracked per descriptor.
pub const MAX_REPORTS: usize = 8;

/// Report id → application kind map of a parsed descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HidDescriptor {
    reports: Vec<(u8, ReportKind), MAX_REPORTS>,
    /// Kind of the first application collection, used when the device
    /// does not prefix its reports with an id.
    default_kind: Option<ReportKind>,
}

impl HidDescriptor {
    pub fn has_report_ids(&self) -> bool {
        !self.reports.is_empty()
    }

    pub fn report_kind_for_id(&self, report_id: u8) -> Option<ReportKind> {
        if report_id == 0 {
            return self.default_kind;
        }
        self.reports
            .iter()
            .find(|(id, _)| *id == report_id)
            .map(|&(_, kind)| kind)
    }

    pub fn reports(&self) -> &[(u8, ReportKind)] {
        &self.reports
    }

    /// Parse a HID report descriptor. Returns `None` when no application
    /// collection was found.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut desc = HidDescriptor::default();

        let mut usage_page = UsagePage::Unknown(0);
        let mut usage: u16 = 0;
        let mut depth: u8 = 0;
        let mut application: Option<ReportKind> = None;

        let mut i = 0;
        while i < data.len() {
            let prefix = data[i];
            if prefix == 0xFE {
                // long item: data size in the next byte
                let Some(&len) = data.get(i + 1) else { break };
                i += 3 + len as usize;
                continue;
            }
            let tag = (prefix >> 4) & 0x0F;
            let item_type = (prefix >> 2) & 0x03;
            let size = match prefix & 0x03 {
                0 => 0,
                1 => 1,
                2 => 2,
                _ => 4,
            };

            if i + 1 + size > data.len() {
                break;
            }

            let value: u32 = match size {
                0 => 0,
                1 => data[i + 1] as u32,
                2 => u16::from_le_bytes([data[i + 1], data[i + 2]]) as u32,
                _ => u32::from_le_bytes([data[i + 1], data[i + 2], data[i + 3], data[i + 4]]),
            };

            match item_type {
                // Main items
                0 => {
                    match tag {
                        // Collection
                        0x0A => {
                            if depth == 0 && value == 0x01 {
                                let kind = classify_application(usage_page, usage);
                                application = Some(kind);
                                desc.default_kind.get_or_insert(kind);
                            }
                            depth = depth.saturating_add(1);
                        }
                        // End Collection
                        0x0C => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                application = None;
                            }
                        }
                        _ => {}
                    }
                    // local items do not survive a main item
                    usage = 0;
                }
                // Global items
                1 => match tag {
                    // Usage Page
                    0x00 => usage_page = UsagePage::from(value as u16),
                    // Report ID
                    0x08 => {
                        let id = value as u8;
                        if let Some(kind) = application {
                            if desc.report_kind_for_id(id).is_none()
                                && desc.reports.push((id, kind)).is_err()
                            {
                                warn!("HID descriptor: more than {} report ids", MAX_REPORTS);
                            }
                        }
                    }
                    _ => {}
                },
                // Local items
                2 => {
                    if tag == 0x00 {
                        usage = value as u16;
                    }
                }
                _ => {}
            }

            i += 1 + size;
        }

        if desc.default_kind.is_some() {
            Some(desc)
        } else {
            debug!("HID descriptor: no application collection found");
            None
        }
    }
}
