//! USB HID sink - presents the active [`HidProfile`](crate::hid::descriptor::HidProfile)
//! to a USB host.
//!
//! `embassy-usb` drives the controller. One HID interface carries every
//! report of the profile, prefixed with its report id when the profile
//! uses ids. [`UsbHidSink`] only queues reports; [`hid_writer_task`]
//! drains the queue into the interrupt endpoint.

pub mod hid_device;

pub use hid_device::{
    build_hid_writer, hid_writer_task, usb_config, UsbHidSink, UsbState, UsbStateHandler,
};
