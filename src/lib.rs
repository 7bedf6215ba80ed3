//! Bluetooth HID mode arbiter and report dispatcher.
//!
//! One radio, three roles: a HID device over Bluetooth Classic, a HID
//! device over GATT, or a HID host over GATT that accepts a BLE keyboard
//! or mouse. [`BtMode`] owns the radio and switches between the roles;
//! [`Dispatcher`] turns user actions into HID reports and fans them out to
//! the USB, BLE, UDP and screen sinks.
//!
//! The vendor Bluetooth stack sits behind [`radio::Radio`]. Enable the
//! `mock` feature for an in-memory stack that runs on the host.
//!
//! Runs `no_std`; the `std` feature (or `cargo test`) brings in the host
//! time driver.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod arbiter;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gap;
pub mod hid;
pub mod input;
pub mod mode;
pub mod radio;
pub mod storage;
pub mod transport;
#[cfg(feature = "usb")]
pub mod usb;

pub use arbiter::BtMode;
pub use config::Config;
pub use dispatch::{Dispatcher, InboundHandler, ReportSink, TargetSet};
pub use error::{Error, RadioError};
pub use gap::{BdAddr, DiscoveredDevice};
pub use hid::descriptor::HidProfile;
pub use hid::{HidReport, ReportId};
pub use input::{InputEvent, InputListener};
pub use mode::{ActiveMode, Mode, ModeStatus, Visibility};
pub use radio::{EventQueue, Radio, RadioEvent};
pub use storage::{ConfigStore, MemoryStore, StoreKey};

use heapless::String;

/// Append as much of `src` as fits, never splitting a character.
pub(crate) fn push_truncated<const N: usize>(s: &mut String<N>, src: &str) {
    for c in src.chars() {
        if s.push(c).is_err() {
            break;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
