//! USB HID interface over `embassy-usb`.
//!
//! The board creates the driver and the [`Builder`]; this module adds the
//! HID interface, the device-state handler and the writer task.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, State};
use embassy_usb::driver::Driver;
use embassy_usb::{Builder, Config};

use crate::config::{self, USB_HID_POLL_MS};
use crate::dispatch::ReportSink;
use crate::hid::descriptor::HidProfile;
use crate::hid::gamepad::GamepadLayout;
use crate::hid::{HidReport, MAX_REPORT_SIZE};

/// Full-speed interrupt endpoint size.
pub const USB_MAX_PACKET: usize = 64;

/// Reports queued for the writer task.
const USB_QUEUE_DEPTH: usize = 16;

/// Queue and bus state shared by the sink, the handler and the writer.
pub struct UsbState {
    reports: Channel<CriticalSectionRawMutex, HidReport, USB_QUEUE_DEPTH>,
    configured: AtomicBool,
    suspended: AtomicBool,
}

impl Default for UsbState {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbState {
    pub const fn new() -> Self {
        Self {
            reports: Channel::new(),
            configured: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
        }
    }

    /// The host selected a configuration and the bus is not suspended.
    pub fn ready(&self) -> bool {
        self.configured.load(Ordering::Relaxed) && !self.suspended.load(Ordering::Relaxed)
    }
}

/// Device-state handler registered with the USB builder.
pub struct UsbStateHandler<'a> {
    state: &'a UsbState,
}

impl<'a> UsbStateHandler<'a> {
    pub fn new(state: &'a UsbState) -> Self {
        Self { state }
    }
}

impl embassy_usb::Handler for UsbStateHandler<'_> {
    fn configured(&mut self, configured: bool) {
        self.state.configured.store(configured, Ordering::Relaxed);
        info!("USB configured: {}", configured);
    }

    fn suspended(&mut self, suspended: bool) {
        self.state.suspended.store(suspended, Ordering::Relaxed);
        debug!("USB suspended: {}", suspended);
    }

    fn reset(&mut self) {
        self.state.configured.store(false, Ordering::Relaxed);
        // queued reports belong to the previous enumeration
        self.state.reports.clear();
    }
}

/// Report sink queueing into the USB writer task.
#[derive(Clone, Copy)]
pub struct UsbHidSink<'a> {
    state: &'a UsbState,
}

impl<'a> UsbHidSink<'a> {
    pub fn new(state: &'a UsbState) -> Self {
        Self { state }
    }
}

impl ReportSink for UsbHidSink<'_> {
    fn send_report(&self, report: &HidReport) -> bool {
        if !self.state.ready() {
            return false;
        }
        match self.state.reports.try_send(*report) {
            Ok(()) => true,
            Err(_) => {
                warn!("USB report queue full, dropping {}", report.id());
                false
            }
        }
    }
}

/// Device configuration for `profile`. Vendor gamepad layouts present
/// the vendor's ids so host drivers bind to them.
pub fn usb_config<'a>(name: &'a str, profile: &'a HidProfile) -> Config<'a> {
    let (vid, pid) = match profile.layout {
        Some(layout) if layout != GamepadLayout::General => (profile.vid, profile.pid),
        _ => (config::USB_VID, config::USB_PID),
    };
    let mut usb_config = Config::new(vid, pid);
    usb_config.manufacturer = Some(name);
    usb_config.product = Some(profile.description);
    usb_config.device_release = profile.version;
    usb_config.max_power = 100; // mA
    usb_config.max_packet_size_0 = 64;
    usb_config
}

/// Add the HID interface for `profile` and register the state handler.
pub fn build_hid_writer<'d, D: Driver<'d>>(
    builder: &mut Builder<'d, D>,
    hid_state: &'d mut State<'d>,
    handler: &'d mut UsbStateHandler<'d>,
    profile: &HidProfile,
) -> HidWriter<'d, D, USB_MAX_PACKET> {
    builder.handler(handler);
    let hid_config = HidConfig {
        report_descriptor: profile.report_descriptor,
        request_handler: None,
        poll_ms: USB_HID_POLL_MS,
        max_packet_size: USB_MAX_PACKET as u16,
    };
    let writer = HidWriter::new(builder, hid_state, hid_config);
    info!("USB HID interface for {} added", profile.description);
    writer
}

/// Drain queued reports into the HID endpoint. Spawn once per device.
pub async fn hid_writer_task<'d, D: Driver<'d>>(
    mut writer: HidWriter<'d, D, USB_MAX_PACKET>,
    state: &UsbState,
    profile: HidProfile,
) -> ! {
    // the general descriptor declares report ids, vendor layouts do not
    let with_id = !matches!(profile.layout, Some(l) if l != GamepadLayout::General);
    let mut buf = [0u8; MAX_REPORT_SIZE + 1];
    info!("USB HID writer started");

    loop {
        let report = state.reports.receive().await;
        let n = if with_id {
            report.serialize_with_id(&mut buf)
        } else {
            report.serialize(&mut buf)
        };
        if n == 0 {
            continue;
        }
        if writer.write(&buf[..n]).await.is_err() {
            warn!("USB {} write failed", report.id());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
