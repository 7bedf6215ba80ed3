//! Seam between the arbiter and the vendor Bluetooth stack.
//!
//! Commands go down through [`Radio`]; every call only enqueues work in
//! the stack and returns. Results and peer activity come back as
//! [`RadioEvent`] messages which the stack's callback glue pushes onto an
//! [`EventQueue`] with `try_send`. The arbiter's event pump is the only
//! consumer.

#[cfg(feature = "mock")]
pub mod mock;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};

use crate::config::{ADV_DATA_MAX, EVENT_QUEUE_DEPTH, INPUT_REPORT_MAX, MAX_BONDED, NAME_MAX_LEN, REPORT_MAP_MAX};
use crate::gap::{BdAddr, BleAddrType, TransportKind};
use crate::RadioError;

/// Queue between the stack callbacks and the event pump.
pub type EventQueue = Channel<CriticalSectionRawMutex, RadioEvent, EVENT_QUEUE_DEPTH>;

/// Controller technology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Technology {
    Classic,
    Ble,
}

/// Which controller memory to hand back to the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryRegion {
    Classic,
    Ble,
    /// Both technologies; the controller cannot be started again.
    All,
}

impl MemoryRegion {
    /// Region of the technology a clean start of `tech` does not need.
    pub const fn other_than(tech: Technology) -> Self {
        match tech {
            Technology::Classic => MemoryRegion::Ble,
            Technology::Ble => MemoryRegion::Classic,
        }
    }
}

/// Pairing configuration applied at stack bring-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityParams {
    /// Classic: ask for a PIN on every pairing instead of a fixed one.
    pub variable_pin: bool,
    /// Secure connections + MITM protection + bonding.
    pub sc_mitm_bond: bool,
    pub io_cap: IoCapability,
    pub max_key_size: u8,
    /// BLE static passkey, `None` for a random one.
    pub static_passkey: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

/// Identity a HID device application is registered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidAppParams<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub provider: &'a str,
    pub vid: u16,
    pub pid: u16,
    pub version: u16,
    /// HID subclass byte (combo keyboard/pointing).
    pub subclass: u8,
    pub report_map: &'a [u8],
}

/// BLE advertising payload configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvConfig {
    pub include_name: bool,
    pub include_tx_power: bool,
    /// Preferred connection interval range (1.25 ms units).
    pub min_interval: u16,
    pub max_interval: u16,
    pub appearance: u16,
    pub service_uuid16: u16,
    pub flags: u8,
}

/// BLE advertising parameters (connectable undirected, all channels).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvParams {
    pub interval_min: u16,
    pub interval_max: u16,
}

/// Classic HID handshake error returned to a host request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeError {
    InvalidReportId,
    InvalidParameter,
    UnsupportedRequest,
}

/// Report type named in a host's GET_REPORT request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportType {
    Input,
    Output,
    Feature,
}

/// Commands understood by the vendor Bluetooth stack.
///
/// All calls are fire-and-forget: `Ok` means the stack accepted the
/// request, completion is reported through [`RadioEvent`].
pub trait Radio {
    // Controller

    /// Controller has never been started and all its memory is available.
    fn controller_idle(&self) -> bool;
    /// Controller and host stack are up.
    fn controller_enabled(&self) -> bool;
    fn release_memory(&self, region: MemoryRegion) -> Result<(), RadioError>;
    fn enable_controller(&self, tech: Technology) -> Result<(), RadioError>;
    fn disable_controller(&self) -> Result<(), RadioError>;
    fn set_device_name(&self, name: &str) -> Result<(), RadioError>;
    fn set_security(&self, tech: Technology, params: &SecurityParams) -> Result<(), RadioError>;
    fn bonded_devices(&self, tech: Technology) -> Vec<BdAddr, MAX_BONDED>;

    // Classic GAP

    fn set_class_of_device(&self, major: u8, minor: u8) -> Result<(), RadioError>;
    fn set_scan_mode(&self, connectable: bool, discoverable: bool) -> Result<(), RadioError>;
    fn start_discovery(&self, inquiry_len: u8) -> Result<(), RadioError>;
    fn cancel_discovery(&self) -> Result<(), RadioError>;
    fn get_remote_services(&self, addr: BdAddr) -> Result<(), RadioError>;
    fn read_remote_name(&self, addr: BdAddr) -> Result<(), RadioError>;
    fn pin_reply(&self, addr: BdAddr, pin: &[u8]) -> Result<(), RadioError>;
    fn confirm_reply(&self, addr: BdAddr, accept: bool) -> Result<(), RadioError>;

    // Classic HID device

    fn hidd_init(&self) -> Result<(), RadioError>;
    fn hidd_deinit(&self) -> Result<(), RadioError>;
    fn hidd_register_app(&self, app: &HidAppParams<'_>) -> Result<(), RadioError>;
    fn hidd_connect(&self, addr: BdAddr) -> Result<(), RadioError>;
    /// Send an input report on the interrupt channel.
    fn hidd_send_report(&self, report_id: u8, data: &[u8]) -> Result<(), RadioError>;
    fn hidd_report_error(&self, error: HandshakeError) -> Result<(), RadioError>;

    // BLE GAP

    fn ble_set_scan_params(&self, interval: u16, window: u16) -> Result<(), RadioError>;
    fn ble_start_scanning(&self, secs: u32) -> Result<(), RadioError>;
    fn ble_stop_scanning(&self) -> Result<(), RadioError>;
    fn ble_config_adv_data(&self, adv: &AdvConfig) -> Result<(), RadioError>;
    fn ble_start_advertising(&self, params: &AdvParams) -> Result<(), RadioError>;
    fn ble_stop_advertising(&self) -> Result<(), RadioError>;
    fn ble_security_reply(&self, addr: BdAddr, accept: bool) -> Result<(), RadioError>;
    fn ble_confirm_reply(&self, addr: BdAddr, accept: bool) -> Result<(), RadioError>;
    fn ble_remove_bond(&self, addr: BdAddr) -> Result<(), RadioError>;
    fn ble_disconnect(&self, addr: BdAddr) -> Result<(), RadioError>;

    // BLE HID device (HID over GATT server)

    fn ble_hidd_init(&self, app: &HidAppParams<'_>) -> Result<(), RadioError>;
    fn ble_hidd_deinit(&self) -> Result<(), RadioError>;
    fn ble_hidd_send_input(&self, report_id: u8, data: &[u8]) -> Result<(), RadioError>;
    fn ble_hidd_set_battery(&self, level: u8) -> Result<(), RadioError>;

    // BLE HID host (HID over GATT client)

    fn hidh_init(&self) -> Result<(), RadioError>;
    fn hidh_deinit(&self) -> Result<(), RadioError>;
    fn hidh_open(
        &self,
        addr: BdAddr,
        transport: TransportKind,
        addr_type: BleAddrType,
    ) -> Result<(), RadioError>;
}

/// One classic inquiry result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InquiryResult {
    pub addr: BdAddr,
    pub cod: Option<u32>,
    pub rssi: Option<i8>,
    pub name: Option<String<NAME_MAX_LEN>>,
    /// Raw extended inquiry response.
    pub eir: Vec<u8, ADV_DATA_MAX>,
}

/// One BLE advertising or scan response report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvReport {
    pub addr: BdAddr,
    pub kind: TransportKind,
    pub addr_type: BleAddrType,
    pub rssi: i8,
    pub data: Vec<u8, ADV_DATA_MAX>,
}

/// Classic GAP events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GapEvent {
    DiscoveryStarted,
    DiscoveryStopped,
    DiscoveryResult(InquiryResult),
    RemoteServices { addr: BdAddr, count: u8 },
    AuthComplete { addr: BdAddr, success: bool },
    PinRequest { addr: BdAddr, min_16_digit: bool },
    ConfirmRequest { addr: BdAddr, passkey: u32 },
    KeyNotify { addr: BdAddr, passkey: u32 },
    RemoteName { addr: BdAddr, name: Option<String<NAME_MAX_LEN>> },
    ModeChange { addr: BdAddr, mode: u8 },
}

/// BLE GAP events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BleGapEvent {
    ScanParamsSet,
    ScanResult(AdvReport),
    /// Inquiry complete, cancelled or scan stopped.
    ScanComplete,
    AuthComplete { addr: BdAddr, success: bool },
    NumericComparison { addr: BdAddr, passkey: u32 },
    SecurityRequest { addr: BdAddr },
    PasskeyNotify { addr: BdAddr, passkey: u32 },
}

/// Classic HID device profile events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BtHiddEvent {
    InitFinished { success: bool },
    /// `plugged` is the host the application is virtually cabled to,
    /// if the stack still holds one from an earlier session.
    AppRegistered { success: bool, plugged: Option<BdAddr> },
    AppUnregistered,
    Opened { addr: BdAddr, connected: bool },
    Closed { disconnected: bool },
    SendReportFailed { report_id: u8 },
    GetReport { report_type: ReportType, report_id: u8 },
    SetProtocol { boot: bool },
    VirtualCableUnplug,
}

/// BLE HID device (GATT server) events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BleHiddEvent {
    Started { success: bool },
    Connected { addr: BdAddr },
    ProtocolMode { boot: bool },
    /// Output report written by the host.
    Output { report_id: u8, data: Vec<u8, INPUT_REPORT_MAX> },
    Disconnected,
    Stopped,
}

/// BLE HID host (GATT client) events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BleHidhEvent {
    Opened {
        addr: BdAddr,
        success: bool,
        name: Option<String<NAME_MAX_LEN>>,
        /// Report map read from the peer, empty if unavailable.
        report_map: Vec<u8, REPORT_MAP_MAX>,
    },
    Battery { level: u8 },
    Input { report_id: u8, data: Vec<u8, INPUT_REPORT_MAX> },
    Feature { report_id: u8, len: u8 },
    Closed,
}

/// Everything the stack reports back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RadioEvent {
    Gap(GapEvent),
    BleGap(BleGapEvent),
    BtHidd(BtHiddEvent),
    BleHidd(BleHiddEvent),
    BleHidh(BleHidhEvent),
}
