//! HID report model.
//!
//! Every report travels as a 1-byte report id followed by a fixed-size
//! payload. [`HidReport`] is the tagged form; [`HidReport::from_raw`]
//! is the only way to build one from an untrusted id/payload pair and
//! enforces the id range.

pub mod control;
pub mod descriptor;
pub mod gamepad;
pub mod keyboard;
pub mod keymap;
pub mod mouse;
pub mod pointer;
pub mod report_protocol;

#[cfg(test)]
mod tests;

use core::fmt;

use crate::Error;
use control::{DialReport, SystemControlReport, DIAL_REPORT_SIZE, SYSTEM_CONTROL_REPORT_SIZE};
use gamepad::{GamepadLayout, GamepadReport};
use keyboard::{KeyboardReport, KEYBOARD_REPORT_SIZE};
use mouse::{AbsMouseReport, MouseReport, ABS_MOUSE_REPORT_SIZE, MOUSE_REPORT_SIZE};
use pointer::{PointReport, TouchReport, POINT_REPORT_SIZE, TOUCH_REPORT_SIZE};
use report_protocol::{HidDescriptor, ReportKind};

/// First invalid report id.
pub const MAX_REPORT_ID: u8 = 9;

/// Largest payload of any report.
pub const MAX_REPORT_SIZE: usize = TOUCH_REPORT_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportId {
    Keyboard = 1,
    Mouse = 2,
    AbsMouse = 3,
    Point = 4,
    Touch = 5,
    Gamepad = 6,
    SystemControl = 7,
    SurfaceDial = 8,
}

impl ReportId {
    /// Payload size; the gamepad size is for the general layout.
    pub const fn payload_size(self) -> usize {
        match self {
            ReportId::Keyboard => KEYBOARD_REPORT_SIZE,
            ReportId::Mouse => MOUSE_REPORT_SIZE,
            ReportId::AbsMouse => ABS_MOUSE_REPORT_SIZE,
            ReportId::Point => POINT_REPORT_SIZE,
            ReportId::Touch => TOUCH_REPORT_SIZE,
            ReportId::Gamepad => GamepadLayout::General.report_size(),
            ReportId::SystemControl => SYSTEM_CONTROL_REPORT_SIZE,
            ReportId::SurfaceDial => DIAL_REPORT_SIZE,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ReportId::Keyboard => "KEYBD",
            ReportId::Mouse => "MOUSE",
            ReportId::AbsMouse => "ABMSE",
            ReportId::Point => "POINT",
            ReportId::Touch => "TOUCH",
            ReportId::Gamepad => "GMPAD",
            ReportId::SystemControl => "SCTRL",
            ReportId::SurfaceDial => "SDIAL",
        }
    }
}

impl TryFrom<u8> for ReportId {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self, Error> {
        Ok(match id {
            1 => ReportId::Keyboard,
            2 => ReportId::Mouse,
            3 => ReportId::AbsMouse,
            4 => ReportId::Point,
            5 => ReportId::Touch,
            6 => ReportId::Gamepad,
            7 => ReportId::SystemControl,
            8 => ReportId::SurfaceDial,
            _ => return Err(Error::InvalidArgument),
        })
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
    AbsMouse(AbsMouseReport),
    Point(PointReport),
    Touch(TouchReport),
    Gamepad(GamepadReport),
    SystemControl(SystemControlReport),
    SurfaceDial(DialReport),
}

impl HidReport {
    pub fn id(&self) -> ReportId {
        match self {
            HidReport::Keyboard(_) => ReportId::Keyboard,
            HidReport::Mouse(_) => ReportId::Mouse,
            HidReport::AbsMouse(_) => ReportId::AbsMouse,
            HidReport::Point(_) => ReportId::Point,
            HidReport::Touch(_) => ReportId::Touch,
            HidReport::Gamepad(_) => ReportId::Gamepad,
            HidReport::SystemControl(_) => ReportId::SystemControl,
            HidReport::SurfaceDial(_) => ReportId::SurfaceDial,
        }
    }

    /// Payload length in bytes, excluding the report id.
    pub fn size(&self) -> usize {
        match self {
            HidReport::Gamepad(pad) => pad.size(),
            other => other.id().payload_size(),
        }
    }

    /// Serialise the payload. Returns 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Keyboard(r) => r.serialize(buf),
            HidReport::Mouse(r) => r.serialize(buf),
            HidReport::AbsMouse(r) => r.serialize(buf),
            HidReport::Point(r) => r.serialize(buf),
            HidReport::Touch(r) => r.serialize(buf),
            HidReport::Gamepad(r) => r.serialize(buf),
            HidReport::SystemControl(r) => r.serialize(buf),
            HidReport::SurfaceDial(r) => r.serialize(buf),
        }
    }

    /// Serialise as `report_id + payload`, the form used on the USB
    /// interrupt endpoint and the UDP relay.
    pub fn serialize_with_id(&self, buf: &mut [u8]) -> usize {
        let Some((first, rest)) = buf.split_first_mut() else {
            return 0;
        };
        match self.serialize(rest) {
            0 => 0,
            n => {
                *first = self.id() as u8;
                n + 1
            }
        }
    }

    /// Build a report from a raw id and payload using the general gamepad
    /// layout.
    pub fn from_raw(id: u8, data: &[u8]) -> Result<Self, Error> {
        Self::from_raw_with_layout(id, data, GamepadLayout::General)
    }

    /// Build a report from a raw id and payload.
    ///
    /// `id` must be in `1..MAX_REPORT_ID` and `data` non-empty. A payload
    /// shorter than the report is zero-filled; extra bytes are ignored.
    pub fn from_raw_with_layout(id: u8, data: &[u8], layout: GamepadLayout) -> Result<Self, Error> {
        let id = ReportId::try_from(id)?;
        if data.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let size = match id {
            ReportId::Gamepad => layout.report_size(),
            other => other.payload_size(),
        };
        let mut buf = [0u8; MAX_REPORT_SIZE];
        let n = data.len().min(size);
        buf[..n].copy_from_slice(&data[..n]);
        let payload = &buf[..size];
        let report = match id {
            ReportId::Keyboard => KeyboardReport::from_bytes(payload).map(HidReport::Keyboard),
            ReportId::Mouse => MouseReport::from_bytes(payload).map(HidReport::Mouse),
            ReportId::AbsMouse => AbsMouseReport::from_bytes(payload).map(HidReport::AbsMouse),
            ReportId::Point => PointReport::from_bytes(payload).map(HidReport::Point),
            ReportId::Touch => TouchReport::from_bytes(payload).map(HidReport::Touch),
            ReportId::Gamepad => {
                return GamepadReport::from_bytes(layout, payload).map(HidReport::Gamepad)
            }
            ReportId::SystemControl => {
                SystemControlReport::from_bytes(payload).map(HidReport::SystemControl)
            }
            ReportId::SurfaceDial => DialReport::from_bytes(payload).map(HidReport::SurfaceDial),
        };
        report.ok_or(Error::InvalidArgument)
    }
}

impl From<KeyboardReport> for HidReport {
    fn from(r: KeyboardReport) -> Self {
        HidReport::Keyboard(r)
    }
}

impl From<MouseReport> for HidReport {
    fn from(r: MouseReport) -> Self {
        HidReport::Mouse(r)
    }
}

impl From<GamepadReport> for HidReport {
    fn from(r: GamepadReport) -> Self {
        HidReport::Gamepad(r)
    }
}

/// Classify an inbound report from a BLE HID peripheral.
///
/// `kind` is the usage resolved from the peer's report map, if any. A
/// report matches keyboard on id 1 or keyboard usage with at least 8
/// bytes, mouse on id 2 or mouse usage with at least 4 bytes, system
/// control on 1 byte and dial on 2 bytes.
pub fn classify_report(report_id: u8, kind: Option<ReportKind>, data: &[u8]) -> Option<HidReport> {
    let is = |id: ReportId, k: ReportKind| report_id == id as u8 || kind == Some(k);
    if is(ReportId::Keyboard, ReportKind::Keyboard) && data.len() >= KEYBOARD_REPORT_SIZE {
        return KeyboardReport::from_bytes(data).map(HidReport::Keyboard);
    }
    if is(ReportId::Mouse, ReportKind::Mouse) && data.len() >= MOUSE_REPORT_SIZE - 1 {
        return MouseReport::from_bytes(data).map(HidReport::Mouse);
    }
    match data.len() {
        SYSTEM_CONTROL_REPORT_SIZE => {
            SystemControlReport::from_bytes(data).map(HidReport::SystemControl)
        }
        DIAL_REPORT_SIZE => DialReport::from_bytes(data).map(HidReport::SurfaceDial),
        _ => None,
    }
}

/// Classify with the report map of the peer, when one was captured.
pub fn classify_with_descriptor(
    report_id: u8,
    descriptor: Option<&HidDescriptor>,
    data: &[u8],
) -> Option<HidReport> {
    let kind = descriptor.and_then(|d| d.report_kind_for_id(report_id));
    classify_report(report_id, kind, data)
}
