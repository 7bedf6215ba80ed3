//! In-memory radio stack.
//!
//! Records every command, answers the acknowledgements a real stack
//! sends (init finished, application registered, service started, scan
//! parameters set) and replays pre-loaded discovery results. Memory
//! release is tracked so that a controller whose memory went back to the
//! heap refuses to start again, like the real one.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use heapless::Vec;

use super::{
    AdvConfig, AdvParams, AdvReport, BleGapEvent, BleHiddEvent, BtHiddEvent, EventQueue,
    GapEvent, HandshakeError, HidAppParams, InquiryResult, MemoryRegion, Radio, RadioEvent,
    SecurityParams, Technology,
};
use crate::config::{INPUT_REPORT_MAX, MAX_BONDED};
use crate::gap::{BdAddr, BleAddrType, TransportKind};
use crate::RadioError;

const CALL_LOG: usize = 128;
const PRELOAD: usize = 8;
const SENT_LOG: usize = 16;

/// Commands recorded by [`MockRadio`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Call {
    ReleaseMemory,
    EnableController,
    DisableController,
    SetDeviceName,
    SetSecurity,
    SetClassOfDevice,
    SetScanMode,
    StartDiscovery,
    CancelDiscovery,
    GetRemoteServices,
    ReadRemoteName,
    PinReply,
    ConfirmReply,
    HiddInit,
    HiddDeinit,
    HiddRegisterApp,
    HiddConnect,
    HiddSendReport,
    HiddReportError,
    BleSetScanParams,
    BleStartScanning,
    BleStopScanning,
    BleConfigAdvData,
    BleStartAdvertising,
    BleStopAdvertising,
    BleSecurityReply,
    BleConfirmReply,
    BleRemoveBond,
    BleDisconnect,
    BleHiddInit,
    BleHiddDeinit,
    BleHiddSendInput,
    BleHiddSetBattery,
    HidhInit,
    HidhDeinit,
    HidhOpen,
}

/// A report handed to the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentReport {
    pub report_id: u8,
    pub data: Vec<u8, INPUT_REPORT_MAX>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call, CALL_LOG>,
    fail: Option<(Call, RadioError)>,
    silent: bool,
    used: bool,
    enabled: Option<Technology>,
    classic_released: bool,
    ble_released: bool,
    discovering: bool,
    scanning: bool,
    scan_mode: Option<(bool, bool)>,
    advertising: bool,
    battery: Option<u8>,
    pin: Vec<u8, 16>,
    opened: Option<(BdAddr, TransportKind)>,
    plugged: Option<BdAddr>,
    hidd_peer: Option<BdAddr>,
    sent: Vec<SentReport, SENT_LOG>,
    inquiry: Vec<InquiryResult, PRELOAD>,
    adv: Vec<AdvReport, PRELOAD>,
    bonded: Vec<BdAddr, MAX_BONDED>,
}

/// Radio stack double driven entirely from memory.
pub struct MockRadio<'q> {
    queue: &'q EventQueue,
    state: BlockingMutex<CriticalSectionRawMutex, RefCell<MockState>>,
}

impl<'q> MockRadio<'q> {
    pub fn new(queue: &'q EventQueue) -> Self {
        Self {
            queue,
            state: BlockingMutex::new(RefCell::new(MockState::default())),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        self.state.lock(|s| f(&mut s.borrow_mut()))
    }

    /// Log `call` and consume a pending injected failure for it.
    fn record(&self, call: Call) -> Result<(), RadioError> {
        self.with(|s| {
            let _ = s.calls.push(call);
            match s.fail {
                Some((c, e)) if c == call => {
                    s.fail = None;
                    Err(e)
                }
                _ => Ok(()),
            }
        })
    }

    fn ack(&self, event: RadioEvent) {
        if !self.with(|s| s.silent) {
            self.inject(event);
        }
    }

    /// Deliver an event as if the stack had reported it.
    pub fn inject(&self, event: RadioEvent) {
        if self.queue.try_send(event).is_err() {
            warn!("Mock event queue full");
        }
    }

    /// Fail the next `call` with `error`.
    pub fn fail_next(&self, call: Call, error: RadioError) {
        self.with(|s| s.fail = Some((call, error)));
    }

    /// Stop answering with acknowledgements.
    pub fn set_silent(&self, silent: bool) {
        self.with(|s| s.silent = silent);
    }

    pub fn preload_inquiry(&self, result: InquiryResult) {
        self.with(|s| {
            let _ = s.inquiry.push(result);
        });
    }

    pub fn preload_adv(&self, report: AdvReport) {
        self.with(|s| {
            let _ = s.adv.push(report);
        });
    }

    /// Host the classic HID application is virtually plugged into, as
    /// reported when the application registers.
    pub fn set_plugged(&self, addr: Option<BdAddr>) {
        self.with(|s| s.plugged = addr);
    }

    pub fn add_bond(&self, addr: BdAddr) {
        self.with(|s| {
            let _ = s.bonded.push(addr);
        });
    }

    pub fn calls(&self) -> Vec<Call, CALL_LOG> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, call: Call) -> usize {
        self.with(|s| s.calls.iter().filter(|c| **c == call).count())
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    pub fn sent(&self) -> Vec<SentReport, SENT_LOG> {
        self.with(|s| s.sent.clone())
    }

    pub fn enabled_tech(&self) -> Option<Technology> {
        self.with(|s| s.enabled)
    }

    /// Last classic `(connectable, discoverable)` setting.
    pub fn scan_mode(&self) -> Option<(bool, bool)> {
        self.with(|s| s.scan_mode)
    }

    pub fn advertising(&self) -> bool {
        self.with(|s| s.advertising)
    }

    pub fn battery(&self) -> Option<u8> {
        self.with(|s| s.battery)
    }

    pub fn last_pin(&self) -> Vec<u8, 16> {
        self.with(|s| s.pin.clone())
    }

    pub fn opened(&self) -> Option<(BdAddr, TransportKind)> {
        self.with(|s| s.opened)
    }

    /// Last host passed to `hidd_connect`.
    pub fn hidd_peer(&self) -> Option<BdAddr> {
        self.with(|s| s.hidd_peer)
    }

    fn push_sent(&self, report_id: u8, data: &[u8]) {
        self.with(|s| {
            let mut copy = Vec::new();
            let _ = copy.extend_from_slice(&data[..data.len().min(INPUT_REPORT_MAX)]);
            let _ = s.sent.push(SentReport {
                report_id,
                data: copy,
            });
        });
    }
}

impl Radio for MockRadio<'_> {
    fn controller_idle(&self) -> bool {
        self.with(|s| !s.used)
    }

    fn controller_enabled(&self) -> bool {
        self.with(|s| s.enabled.is_some())
    }

    fn release_memory(&self, region: MemoryRegion) -> Result<(), RadioError> {
        self.record(Call::ReleaseMemory)?;
        self.with(|s| {
            if s.enabled.is_some() {
                return Err(RadioError::WrongState);
            }
            s.used = true;
            match region {
                MemoryRegion::Classic => s.classic_released = true,
                MemoryRegion::Ble => s.ble_released = true,
                MemoryRegion::All => {
                    s.classic_released = true;
                    s.ble_released = true;
                }
            }
            Ok(())
        })
    }

    fn enable_controller(&self, tech: Technology) -> Result<(), RadioError> {
        self.record(Call::EnableController)?;
        self.with(|s| {
            let released = match tech {
                Technology::Classic => s.classic_released,
                Technology::Ble => s.ble_released,
            };
            if released || s.enabled.is_some() {
                return Err(RadioError::WrongState);
            }
            s.used = true;
            s.enabled = Some(tech);
            Ok(())
        })
    }

    fn disable_controller(&self) -> Result<(), RadioError> {
        self.record(Call::DisableController)?;
        self.with(|s| {
            s.enabled = None;
            s.advertising = false;
            s.discovering = false;
            s.scanning = false;
        });
        Ok(())
    }

    fn set_device_name(&self, _name: &str) -> Result<(), RadioError> {
        self.record(Call::SetDeviceName)
    }

    fn set_security(&self, _tech: Technology, _params: &SecurityParams) -> Result<(), RadioError> {
        self.record(Call::SetSecurity)
    }

    fn bonded_devices(&self, _tech: Technology) -> Vec<BdAddr, MAX_BONDED> {
        self.with(|s| s.bonded.clone())
    }

    fn set_class_of_device(&self, _major: u8, _minor: u8) -> Result<(), RadioError> {
        self.record(Call::SetClassOfDevice)
    }

    fn set_scan_mode(&self, connectable: bool, discoverable: bool) -> Result<(), RadioError> {
        self.record(Call::SetScanMode)?;
        self.with(|s| s.scan_mode = Some((connectable, discoverable)));
        Ok(())
    }

    fn start_discovery(&self, _inquiry_len: u8) -> Result<(), RadioError> {
        self.record(Call::StartDiscovery)?;
        let results = self.with(|s| {
            s.discovering = true;
            s.inquiry.clone()
        });
        if self.with(|s| s.silent) {
            return Ok(());
        }
        self.inject(RadioEvent::Gap(GapEvent::DiscoveryStarted));
        for result in results {
            self.inject(RadioEvent::Gap(GapEvent::DiscoveryResult(result)));
        }
        self.with(|s| s.discovering = false);
        self.inject(RadioEvent::Gap(GapEvent::DiscoveryStopped));
        Ok(())
    }

    fn cancel_discovery(&self) -> Result<(), RadioError> {
        self.record(Call::CancelDiscovery)?;
        let was = self.with(|s| core::mem::replace(&mut s.discovering, false));
        if was {
            self.inject(RadioEvent::Gap(GapEvent::DiscoveryStopped));
        }
        Ok(())
    }

    fn get_remote_services(&self, _addr: BdAddr) -> Result<(), RadioError> {
        self.record(Call::GetRemoteServices)
    }

    fn read_remote_name(&self, _addr: BdAddr) -> Result<(), RadioError> {
        self.record(Call::ReadRemoteName)
    }

    fn pin_reply(&self, _addr: BdAddr, pin: &[u8]) -> Result<(), RadioError> {
        self.record(Call::PinReply)?;
        self.with(|s| {
            s.pin.clear();
            let _ = s.pin.extend_from_slice(&pin[..pin.len().min(16)]);
        });
        Ok(())
    }

    fn confirm_reply(&self, _addr: BdAddr, _accept: bool) -> Result<(), RadioError> {
        self.record(Call::ConfirmReply)
    }

    fn hidd_init(&self) -> Result<(), RadioError> {
        self.record(Call::HiddInit)?;
        self.ack(RadioEvent::BtHidd(BtHiddEvent::InitFinished { success: true }));
        Ok(())
    }

    fn hidd_deinit(&self) -> Result<(), RadioError> {
        self.record(Call::HiddDeinit)
    }

    fn hidd_register_app(&self, _app: &HidAppParams<'_>) -> Result<(), RadioError> {
        self.record(Call::HiddRegisterApp)?;
        let plugged = self.with(|s| s.plugged);
        self.ack(RadioEvent::BtHidd(BtHiddEvent::AppRegistered {
            success: true,
            plugged,
        }));
        Ok(())
    }

    fn hidd_connect(&self, addr: BdAddr) -> Result<(), RadioError> {
        self.record(Call::HiddConnect)?;
        self.with(|s| s.hidd_peer = Some(addr));
        Ok(())
    }

    fn hidd_send_report(&self, report_id: u8, data: &[u8]) -> Result<(), RadioError> {
        self.record(Call::HiddSendReport)?;
        self.push_sent(report_id, data);
        Ok(())
    }

    fn hidd_report_error(&self, _error: HandshakeError) -> Result<(), RadioError> {
        self.record(Call::HiddReportError)
    }

    fn ble_set_scan_params(&self, _interval: u16, _window: u16) -> Result<(), RadioError> {
        self.record(Call::BleSetScanParams)?;
        self.ack(RadioEvent::BleGap(BleGapEvent::ScanParamsSet));
        Ok(())
    }

    fn ble_start_scanning(&self, _secs: u32) -> Result<(), RadioError> {
        self.record(Call::BleStartScanning)?;
        let reports = self.with(|s| {
            s.scanning = true;
            s.adv.clone()
        });
        if self.with(|s| s.silent) {
            return Ok(());
        }
        for report in reports {
            self.inject(RadioEvent::BleGap(BleGapEvent::ScanResult(report)));
        }
        self.with(|s| s.scanning = false);
        self.inject(RadioEvent::BleGap(BleGapEvent::ScanComplete));
        Ok(())
    }

    fn ble_stop_scanning(&self) -> Result<(), RadioError> {
        self.record(Call::BleStopScanning)?;
        let was = self.with(|s| core::mem::replace(&mut s.scanning, false));
        if was {
            self.inject(RadioEvent::BleGap(BleGapEvent::ScanComplete));
        }
        Ok(())
    }

    fn ble_config_adv_data(&self, _adv: &AdvConfig) -> Result<(), RadioError> {
        self.record(Call::BleConfigAdvData)
    }

    fn ble_start_advertising(&self, _params: &AdvParams) -> Result<(), RadioError> {
        self.record(Call::BleStartAdvertising)?;
        self.with(|s| s.advertising = true);
        Ok(())
    }

    fn ble_stop_advertising(&self) -> Result<(), RadioError> {
        self.record(Call::BleStopAdvertising)?;
        self.with(|s| s.advertising = false);
        Ok(())
    }

    fn ble_security_reply(&self, _addr: BdAddr, _accept: bool) -> Result<(), RadioError> {
        self.record(Call::BleSecurityReply)
    }

    fn ble_confirm_reply(&self, _addr: BdAddr, _accept: bool) -> Result<(), RadioError> {
        self.record(Call::BleConfirmReply)
    }

    fn ble_remove_bond(&self, addr: BdAddr) -> Result<(), RadioError> {
        self.record(Call::BleRemoveBond)?;
        self.with(|s| s.bonded.retain(|a| *a != addr));
        Ok(())
    }

    fn ble_disconnect(&self, _addr: BdAddr) -> Result<(), RadioError> {
        self.record(Call::BleDisconnect)
    }

    fn ble_hidd_init(&self, _app: &HidAppParams<'_>) -> Result<(), RadioError> {
        self.record(Call::BleHiddInit)?;
        self.ack(RadioEvent::BleHidd(BleHiddEvent::Started { success: true }));
        Ok(())
    }

    fn ble_hidd_deinit(&self) -> Result<(), RadioError> {
        self.record(Call::BleHiddDeinit)
    }

    fn ble_hidd_send_input(&self, report_id: u8, data: &[u8]) -> Result<(), RadioError> {
        self.record(Call::BleHiddSendInput)?;
        self.push_sent(report_id, data);
        Ok(())
    }

    fn ble_hidd_set_battery(&self, level: u8) -> Result<(), RadioError> {
        self.record(Call::BleHiddSetBattery)?;
        self.with(|s| s.battery = Some(level));
        Ok(())
    }

    fn hidh_init(&self) -> Result<(), RadioError> {
        self.record(Call::HidhInit)
    }

    fn hidh_deinit(&self) -> Result<(), RadioError> {
        self.record(Call::HidhDeinit)
    }

    fn hidh_open(
        &self,
        addr: BdAddr,
        transport: TransportKind,
        _addr_type: BleAddrType,
    ) -> Result<(), RadioError> {
        self.record(Call::HidhOpen)?;
        self.with(|s| s.opened = Some((addr, transport)));
        Ok(())
    }
}
