//! Scan bookkeeping: timeout clamping, completion tracking and the
//! translation of discovery events into registry updates.

use embassy_time::Duration;

use super::registry::DeviceUpdate;
use super::{adv_parser, TransportKind};
use crate::config::{
    BLE_SCAN_MAX_SECS, HID_SERVICE_UUID16, INQUIRY_LEN_MAX, INQUIRY_LEN_MIN, INQUIRY_UNIT_MS,
};
use crate::radio::{AdvReport, InquiryResult};

/// Classic inquiry length (1.28 s units) for a timeout in ms.
pub fn inquiry_length(timeout_ms: u32) -> u8 {
    let units = timeout_ms as u64 / INQUIRY_UNIT_MS;
    units.clamp(INQUIRY_LEN_MIN as u64, INQUIRY_LEN_MAX as u64) as u8
}

/// How long to wait for an inquiry of `len` units to report completion.
pub fn inquiry_wait(len: u8) -> Duration {
    Duration::from_millis(len as u64 * INQUIRY_UNIT_MS * 2)
}

/// BLE scan duration in whole seconds for a timeout in ms.
pub fn ble_scan_secs(timeout_ms: u32) -> u32 {
    (timeout_ms / 1000).clamp(1, BLE_SCAN_MAX_SECS)
}

pub fn ble_scan_wait(secs: u32) -> Duration {
    Duration::from_millis(secs as u64 * 2000)
}

/// What the event pump should do with a completion signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// Completion of a pre-empted scan; swallow it.
    Stale,
    /// A caller is waiting and reports the result itself.
    Waited,
    /// Nobody is waiting; report the device list now.
    Report,
}

/// Completion state of one technology's discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanTracker {
    done: bool,
    suppress: bool,
    waited: bool,
}

impl Default for ScanTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanTracker {
    pub const fn new() -> Self {
        Self {
            done: true,
            suppress: false,
            waited: false,
        }
    }

    pub fn in_flight(&self) -> bool {
        !self.done
    }

    /// A new scan pre-empts the running one. Its completion, whenever
    /// it arrives, is swallowed. Returns `true` if a scan was running.
    pub fn preempt(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.suppress = true;
        true
    }

    pub fn start(&mut self, waited: bool) {
        self.done = false;
        self.waited = waited;
    }

    /// The caller stopped waiting (timeout); a late completion reports.
    pub fn abandon(&mut self) {
        self.waited = false;
    }

    /// The scan never started.
    pub fn abort(&mut self) {
        self.done = true;
        self.waited = false;
    }

    pub fn complete(&mut self) -> Completion {
        if self.suppress {
            self.suppress = false;
            return Completion::Stale;
        }
        self.done = true;
        if self.waited {
            self.waited = false;
            Completion::Waited
        } else {
            Completion::Report
        }
    }
}

/// Registry update from a classic inquiry result.
pub fn inquiry_update(result: &InquiryResult) -> DeviceUpdate {
    let mut update = DeviceUpdate::new(TransportKind::Classic, result.addr);
    update.cod = result.cod;
    update.rssi = result.rssi;
    update.name = result.name.clone().filter(|n| !n.is_empty());
    if !result.eir.is_empty() {
        if let Some(name) = adv_parser::device_name(&result.eir) {
            update.name = Some(name);
        }
        update.uuid = adv_parser::eir_service_uuid(&result.eir);
    }
    update
}

/// Registry update from a BLE advertising report.
pub fn adv_update(report: &AdvReport) -> DeviceUpdate {
    let mut update = DeviceUpdate::new(report.kind, report.addr).with_rssi(report.rssi);
    update.addr_type = Some(report.addr_type);
    update.name = adv_parser::device_name(&report.data);
    update.service_uuid16 = adv_parser::service_uuid16(&report.data).or_else(|| {
        adv_parser::contains_hid_service_uuid(&report.data).then_some(HID_SERVICE_UUID16)
    });
    update.appearance = adv_parser::appearance(&report.data);
    update
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
