//! Unit tests for HID report parsing and serialization.
//!
//! These tests run on the host and cover report validity, the raw
//! id/payload constructor, descriptor parsing and inbound classification.

use super::control::{DialKey, DialReport, SystemControl, SystemControlReport};
use super::descriptor::GENERAL_REPORT_DESCRIPTOR;
use super::gamepad::{GamepadLayout, GamepadReport};
use super::keyboard::{KeyboardLeds, KeyboardReport};
use super::mouse::{button_from_name, AbsMouseReport, MouseReport, BUTTON_FORWARD, BUTTON_LEFT};
use super::pointer::{Finger, TouchReport, TOUCH_REPORT_SIZE};
use super::report_protocol::{HidDescriptor, ReportKind};
use super::{classify_report, classify_with_descriptor, HidReport, ReportId, MAX_REPORT_ID};
use crate::Error;

// ═══════════════════════════════════════════════════════════════════════════
// Keyboard Report Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn keyboard_report_empty() {
    let report = KeyboardReport::empty();
    assert!(report.is_empty());
    assert_eq!(report.modifier, 0);
    assert_eq!(report.keycodes, [0; 6]);
}

#[test]
fn keyboard_report_from_valid_bytes() {
    // Modifier: Left Shift (0x02), Reserved: 0, Keys: 'A' (0x04)
    let data = [0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00];
    let report = KeyboardReport::from_bytes(&data).unwrap();

    assert_eq!(report.modifier, 0x02);
    assert_eq!(report.keycodes[0], 0x04);
    assert_eq!(report.key_count(), 1);
    assert!(!report.is_empty());
}

#[test]
fn keyboard_report_from_short_bytes_fails() {
    let data = [0x02, 0x00, 0x04];
    assert!(KeyboardReport::from_bytes(&data).is_none());
}

#[test]
fn keyboard_report_new_truncates_to_six_keys() {
    let report = KeyboardReport::new(0x01, &[4, 5, 6, 7, 8, 9, 10, 11]);
    assert_eq!(report.keycodes, [4, 5, 6, 7, 8, 9]);
    assert_eq!(report.modifier, 0x01);
}

#[test]
fn keyboard_report_serialize_buffer_too_small() {
    let report = KeyboardReport::empty();
    let mut small_buf = [0u8; 4];
    assert_eq!(report.serialize(&mut small_buf), 0);
}

#[test]
fn keyboard_leds_decode() {
    let leds = KeyboardLeds::from_byte(0x03);
    assert!(leds.num_lock);
    assert!(leds.caps_lock);
    assert!(!leds.scroll_lock);
}

// ═══════════════════════════════════════════════════════════════════════════
// Mouse Report Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn mouse_report_empty() {
    let report = MouseReport::empty();
    assert!(report.is_idle());
}

#[test]
fn mouse_report_boot_four_bytes_has_no_pan() {
    // Left button pressed, X=10, Y=-5, wheel=1
    let data = [0x01, 0x0A, 0xFB, 0x01];
    let report = MouseReport::from_bytes(&data).unwrap();
    assert_eq!(report.buttons, BUTTON_LEFT);
    assert_eq!(report.x, 10);
    assert_eq!(report.y, -5);
    assert_eq!(report.wheel, 1);
    assert_eq!(report.pan, 0);
}

#[test]
fn mouse_report_serialize_layout() {
    let report = MouseReport {
        buttons: 0x03,
        x: -1,
        y: 127,
        wheel: -127,
        pan: 2,
    };
    let mut buf = [0u8; 5];
    assert_eq!(report.serialize(&mut buf), 5);
    assert_eq!(buf, [0x03, 0xFF, 0x7F, 0x81, 0x02]);
}

#[test]
fn abs_mouse_coordinates_are_little_endian() {
    let report = AbsMouseReport {
        buttons: 0,
        x: 0x1234,
        y: 0x7FFF,
        wheel: 0,
        pan: 0,
    };
    let mut buf = [0u8; 7];
    assert_eq!(report.serialize(&mut buf), 7);
    assert_eq!(&buf[1..5], &[0x34, 0x12, 0xFF, 0x7F]);
}

#[test]
fn mouse_button_names() {
    assert_eq!(button_from_name("left"), BUTTON_LEFT);
    assert_eq!(button_from_name("Forward"), BUTTON_FORWARD);
    assert_eq!(button_from_name("wheel"), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Touch / Control / Dial Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn touch_report_packs_contact_id_in_high_nibble() {
    let mut report = TouchReport::default();
    report.fingers[1] = Finger {
        tip: true,
        contact_id: 3,
        x: 5000,
        y: 10000,
    };
    report.count = 1;
    let mut buf = [0u8; TOUCH_REPORT_SIZE];
    assert_eq!(report.serialize(&mut buf), TOUCH_REPORT_SIZE);
    assert_eq!(buf[5], 0x31);
    assert_eq!(&buf[6..10], &[0x88, 0x13, 0x10, 0x27]);
    assert_eq!(buf[27], 1);
    assert_eq!(TouchReport::from_bytes(&buf), Some(report));
}

#[test]
fn system_control_press_sets_high_bit() {
    let report = SystemControlReport::press(SystemControl::Sleep);
    assert_eq!(report.0, 0x82);
    assert!(report.is_pressed());
    assert_eq!(SystemControl::try_from(report.0), Ok(SystemControl::Sleep));
    assert_eq!(SystemControl::try_from(0x7F), Err(Error::InvalidArgument));
}

#[test]
fn dial_rotation_sign() {
    assert_eq!(DialReport::new(DialKey::RotateLeft).rotation(), -100);
    assert_eq!(DialReport::new(DialKey::RotateRight).rotation(), 100);
    assert!(DialReport::new(DialKey::Press).pressed());
    assert!(!DialReport::new(DialKey::Release).pressed());
}

// ═══════════════════════════════════════════════════════════════════════════
// Raw Report Validity Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn from_raw_rejects_out_of_range_ids() {
    assert_eq!(HidReport::from_raw(0, &[1]), Err(Error::InvalidArgument));
    assert_eq!(HidReport::from_raw(MAX_REPORT_ID, &[1]), Err(Error::InvalidArgument));
    assert_eq!(HidReport::from_raw(0xFF, &[1]), Err(Error::InvalidArgument));
}

#[test]
fn from_raw_rejects_empty_payload() {
    assert_eq!(HidReport::from_raw(1, &[]), Err(Error::InvalidArgument));
}

#[test]
fn from_raw_accepts_every_valid_id() {
    for id in 1..MAX_REPORT_ID {
        let report = HidReport::from_raw(id, &[0]).unwrap();
        assert_eq!(report.id() as u8, id);
        assert!(report.size() > 0);
    }
}

#[test]
fn from_raw_zero_fills_short_payload() {
    let report = HidReport::from_raw(1, &[0x02, 0x00, 0x04]).unwrap();
    match report {
        HidReport::Keyboard(kb) => {
            assert_eq!(kb.modifier, 0x02);
            assert_eq!(kb.keycodes, [0x04, 0, 0, 0, 0, 0]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn from_raw_gamepad_follows_layout() {
    let report = HidReport::from_raw_with_layout(6, &[0; 16], GamepadLayout::XInput).unwrap();
    assert_eq!(report.size(), 16);
    assert!(matches!(report, HidReport::Gamepad(GamepadReport::XInput { .. })));
    assert_eq!(HidReport::from_raw(6, &[0; 16]).unwrap().size(), 9);
}

#[test]
fn serialize_with_id_prefixes_report_id() {
    let report = HidReport::Mouse(MouseReport {
        buttons: 1,
        ..MouseReport::empty()
    });
    let mut buf = [0u8; 8];
    assert_eq!(report.serialize_with_id(&mut buf), 6);
    assert_eq!(&buf[..6], &[2, 1, 0, 0, 0, 0]);
    assert_eq!(report.serialize_with_id(&mut buf[..3]), 0);
}

#[test]
fn report_id_names() {
    assert_eq!(ReportId::SurfaceDial.name(), "SDIAL");
    assert_eq!(ReportId::try_from(7), Ok(ReportId::SystemControl));
}

// ═══════════════════════════════════════════════════════════════════════════
// Descriptor Parsing Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn general_descriptor_maps_report_ids() {
    let desc = HidDescriptor::parse(GENERAL_REPORT_DESCRIPTOR).unwrap();
    assert!(desc.has_report_ids());
    assert_eq!(desc.report_kind_for_id(1), Some(ReportKind::Keyboard));
    assert_eq!(desc.report_kind_for_id(2), Some(ReportKind::Mouse));
    assert_eq!(desc.report_kind_for_id(3), Some(ReportKind::Mouse));
    assert_eq!(desc.report_kind_for_id(6), Some(ReportKind::Gamepad));
    assert_eq!(desc.report_kind_for_id(7), Some(ReportKind::SystemControl));
    assert_eq!(desc.report_kind_for_id(8), Some(ReportKind::Dial));
    assert_eq!(desc.report_kind_for_id(4), None);
}

#[test]
fn descriptor_without_report_ids_uses_first_application() {
    let boot_mouse = [
        0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0x09, 0x01, 0xA1, 0x00, 0x05, 0x09, 0x19, 0x01,
        0x29, 0x03, 0x15, 0x00, 0x25, 0x01, 0x95, 0x03, 0x75, 0x01, 0x81, 0x02, 0xC0, 0xC0,
    ];
    let desc = HidDescriptor::parse(&boot_mouse).unwrap();
    assert!(!desc.has_report_ids());
    assert_eq!(desc.report_kind_for_id(0), Some(ReportKind::Mouse));
}

#[test]
fn descriptor_garbage_is_rejected() {
    assert!(HidDescriptor::parse(&[]).is_none());
    assert!(HidDescriptor::parse(&[0x05, 0x01, 0x09]).is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// Inbound Classification Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn classify_by_report_id() {
    let kb = [0, 0, 0x04, 0, 0, 0, 0, 0];
    assert!(matches!(classify_report(1, None, &kb), Some(HidReport::Keyboard(_))));
    let mouse = [1, 2, 3, 4, 5];
    assert!(matches!(classify_report(2, None, &mouse), Some(HidReport::Mouse(_))));
}

#[test]
fn classify_by_usage_overrides_id() {
    let kb = [0, 0, 0x04, 0, 0, 0, 0, 0];
    let report = classify_report(9, Some(ReportKind::Keyboard), &kb);
    assert!(matches!(report, Some(HidReport::Keyboard(_))));
}

#[test]
fn classify_short_keyboard_is_dropped() {
    assert!(classify_report(1, None, &[0, 0, 4, 0, 0]).is_none());
}

#[test]
fn classify_by_length_for_control_and_dial() {
    assert!(matches!(classify_report(0, None, &[0x81]), Some(HidReport::SystemControl(_))));
    assert!(matches!(classify_report(0, None, &[0x38, 0xFF]), Some(HidReport::SurfaceDial(_))));
    assert!(classify_report(0, None, &[1, 2, 3, 4, 5, 6, 7]).is_none());
}

#[test]
fn classify_with_descriptor_resolves_usage() {
    let desc = HidDescriptor::parse(GENERAL_REPORT_DESCRIPTOR).unwrap();
    let mouse = [0, 5, 5, 0, 0, 0, 0];
    let report = classify_with_descriptor(3, Some(&desc), &mouse);
    assert!(matches!(report, Some(HidReport::Mouse(_))));
}
