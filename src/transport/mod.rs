//! Transport adapters: one per active mode.
//!
//! An adapter brings its profile up on an enabled controller, tears it
//! down again, and turns outbound reports into stack calls. All of them
//! share one [`LinkState`] owned by the arbiter and reach it through a
//! [`LinkContext`].

pub mod ble_hidd;
pub mod ble_hidh;
pub mod bt_hidd;
pub mod gap_events;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Instant};
use heapless::String;

use crate::config::{self, Config, NAME_MAX_LEN};
use crate::gap::registry::Registry;
use crate::gap::scanner::ScanTracker;
use crate::gap::BdAddr;
use crate::hid::descriptor::HidProfile;
use crate::hid::report_protocol::HidDescriptor;
use crate::hid::HidReport;
use crate::mode::{ActiveMode, Mode, Visibility};
use crate::radio::{HidAppParams, IoCapability, MemoryRegion, Radio, SecurityParams, Technology};
use crate::{Error, RadioError};

pub use ble_hidd::BleHidd;
pub use ble_hidh::BleHidh;
pub use bt_hidd::BtHidd;

/// HID subclass: combo keyboard / pointing device.
const HID_SUBCLASS_COMBO: u8 = 0xC0;

/// Result of a successful `exit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExitOutcome {
    /// The profile and, if needed, the controller are down.
    TornDown,
    /// Controller memory was released; only a restart brings it back.
    NeedsReboot,
}

/// Acknowledgements the stack sends while an adapter starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// Classic HID application registered.
    AppRegistered,
    /// GATT HID service started.
    ServiceStarted,
    ScanParamsSet,
    /// The stack refused the pending request.
    Refused,
}

/// Link state shared by the adapters, the event pump and the arbiter.
#[derive(Clone, Debug, Default)]
pub struct LinkState {
    /// Adapter holding the radio, from the start of `init` until `exit`.
    pub owner: Option<ActiveMode>,
    /// Outbound reports are routed to `owner`.
    pub routed: bool,
    /// Controller technology currently enabled.
    pub tech: Option<Technology>,
    pub visibility: Visibility,
    pub enabled: bool,
    pub connected: bool,
    pub peer: Option<BdAddr>,
    pub peer_name: String<NAME_MAX_LEN>,
    /// Report map of a connected HID peripheral.
    pub peer_reports: Option<HidDescriptor>,
    pub peer_battery: Option<u8>,
    pub classic_scan: ScanTracker,
    pub ble_scan: ScanTracker,
}

impl LinkState {
    /// Forget the profile-level state when an adapter goes away.
    pub fn reset_profile(&mut self) {
        self.owner = None;
        self.routed = false;
        self.enabled = false;
        self.forget_peer();
    }

    pub fn forget_peer(&mut self) {
        self.connected = false;
        self.peer = None;
        self.peer_name.clear();
        self.peer_reports = None;
        self.peer_battery = None;
    }

    pub fn scan(&mut self, tech: Technology) -> &mut ScanTracker {
        match tech {
            Technology::Classic => &mut self.classic_scan,
            Technology::Ble => &mut self.ble_scan,
        }
    }
}

pub type LinkCell = BlockingMutex<CriticalSectionRawMutex, RefCell<LinkState>>;
pub type RegistryCell = BlockingMutex<CriticalSectionRawMutex, RefCell<Registry>>;
pub type AckSignal = Signal<CriticalSectionRawMutex, Ack>;
pub type ScanSignal = Signal<CriticalSectionRawMutex, ()>;

/// Everything an adapter needs, borrowed from the arbiter.
pub struct LinkContext<'a, R> {
    pub radio: &'a R,
    pub config: &'a Config,
    pub profile: &'a HidProfile,
    pub link: &'a LinkCell,
    pub registry: &'a RegistryCell,
    pub acks: &'a AckSignal,
    pub classic_done: &'a ScanSignal,
    pub ble_done: &'a ScanSignal,
}

impl<'a, R: Radio> LinkContext<'a, R> {
    pub fn with_link<T>(&self, f: impl FnOnce(&mut LinkState) -> T) -> T {
        self.link.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn with_registry<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        self.registry.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn scan_signal(&self, tech: Technology) -> &'a ScanSignal {
        match tech {
            Technology::Classic => self.classic_done,
            Technology::Ble => self.ble_done,
        }
    }

    /// Wait for `expected`, ignoring unrelated acknowledgements.
    pub async fn wait_ack(&self, expected: Ack, timeout: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            match with_timeout(deadline - now, self.acks.wait()).await {
                Ok(ack) if ack == expected => return Ok(()),
                Ok(Ack::Refused) => return Err(Error::Transient(RadioError::Failed)),
                Ok(_) => debug!("Ignoring unrelated stack ack"),
                Err(_) => return Err(Error::Timeout),
            }
        }
    }

    /// Identity the HID application registers with.
    pub fn app_params<'n>(&self, name: &'n str) -> HidAppParams<'n>
    where
        'a: 'n,
    {
        HidAppParams {
            name,
            description: self.profile.description,
            provider: self.config.name.as_str(),
            vid: self.profile.vid,
            pid: self.profile.pid,
            version: self.profile.version,
            subclass: HID_SUBCLASS_COMBO,
            report_map: self.profile.report_descriptor,
        }
    }

    /// Bring the controller and host stack up in `tech`.
    ///
    /// A clean start on a never-used controller first hands the other
    /// technology's memory back. Does nothing if the stack is already up.
    pub fn bring_up(&self, tech: Technology, clean: bool) -> Result<(), Error> {
        if self.radio.controller_enabled() {
            return Ok(());
        }
        if clean && self.radio.controller_idle() {
            self.radio.release_memory(MemoryRegion::other_than(tech))?;
        }
        self.radio.enable_controller(tech)?;
        let visibility = self.with_link(|link| {
            link.tech = Some(tech);
            link.visibility
        });

        let name = self.config.device_name();
        self.radio.set_device_name(&name)?;
        match tech {
            Technology::Classic => {
                self.radio.set_security(
                    tech,
                    &SecurityParams {
                        variable_pin: true,
                        sc_mitm_bond: false,
                        io_cap: IoCapability::DisplayYesNo,
                        max_key_size: config::BLE_MAX_KEY_SIZE,
                        static_passkey: None,
                    },
                )?;
                self.radio
                    .set_scan_mode(visibility.connectable, visibility.discoverable)?;
            }
            Technology::Ble => {
                self.radio.set_security(
                    tech,
                    &SecurityParams {
                        variable_pin: false,
                        sc_mitm_bond: true,
                        io_cap: IoCapability::DisplayYesNo,
                        max_key_size: config::BLE_MAX_KEY_SIZE,
                        static_passkey: Some(config::BLE_STATIC_PASSKEY),
                    },
                )?;
            }
        }
        info!("Bluetooth controller up as {}", name.as_str());
        Ok(())
    }

    /// Take the controller down. A clean tear-down also releases its
    /// memory, after which it can only come back through a restart.
    pub fn tear_down(&self, clean: bool) -> Result<ExitOutcome, Error> {
        if !self.radio.controller_enabled() {
            return Ok(ExitOutcome::TornDown);
        }
        self.radio.disable_controller()?;
        self.with_link(|link| link.tech = None);
        if clean {
            self.radio.release_memory(MemoryRegion::All)?;
            return Ok(ExitOutcome::NeedsReboot);
        }
        Ok(ExitOutcome::TornDown)
    }
}

/// Uniform contract of the per-mode adapters.
#[allow(async_fn_in_trait)]
pub trait TransportAdapter {
    fn mode(&self) -> ActiveMode;

    /// Start the profile. `prev` is the mode being left.
    async fn init<R: Radio>(&self, cx: &LinkContext<'_, R>, prev: Mode) -> Result<(), Error>;

    /// Stop the profile. `next` is the mode being entered.
    async fn exit<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        next: ActiveMode,
    ) -> Result<ExitOutcome, Error>;

    fn configure_visibility<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        visibility: Visibility,
    ) -> Result<(), Error>;

    /// Send one input report; `false` if not enabled or not connected.
    fn send_report<R: Radio>(&self, cx: &LinkContext<'_, R>, report: &HidReport) -> bool;
}

/// Static dispatch over the three adapters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adapter {
    BtHidd(BtHidd),
    BleHidd(BleHidd),
    BleHidh(BleHidh),
}

impl Adapter {
    pub const fn for_mode(mode: ActiveMode) -> Self {
        match mode {
            ActiveMode::BtClassicHidDevice => Adapter::BtHidd(BtHidd),
            ActiveMode::BleHidDevice => Adapter::BleHidd(BleHidd),
            ActiveMode::BleHidHost => Adapter::BleHidh(BleHidh),
        }
    }
}

impl TransportAdapter for Adapter {
    fn mode(&self) -> ActiveMode {
        match self {
            Adapter::BtHidd(a) => a.mode(),
            Adapter::BleHidd(a) => a.mode(),
            Adapter::BleHidh(a) => a.mode(),
        }
    }

    async fn init<R: Radio>(&self, cx: &LinkContext<'_, R>, prev: Mode) -> Result<(), Error> {
        match self {
            Adapter::BtHidd(a) => a.init(cx, prev).await,
            Adapter::BleHidd(a) => a.init(cx, prev).await,
            Adapter::BleHidh(a) => a.init(cx, prev).await,
        }
    }

    async fn exit<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        next: ActiveMode,
    ) -> Result<ExitOutcome, Error> {
        match self {
            Adapter::BtHidd(a) => a.exit(cx, next).await,
            Adapter::BleHidd(a) => a.exit(cx, next).await,
            Adapter::BleHidh(a) => a.exit(cx, next).await,
        }
    }

    fn configure_visibility<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        visibility: Visibility,
    ) -> Result<(), Error> {
        match self {
            Adapter::BtHidd(a) => a.configure_visibility(cx, visibility),
            Adapter::BleHidd(a) => a.configure_visibility(cx, visibility),
            Adapter::BleHidh(a) => a.configure_visibility(cx, visibility),
        }
    }

    fn send_report<R: Radio>(&self, cx: &LinkContext<'_, R>, report: &HidReport) -> bool {
        match self {
            Adapter::BtHidd(a) => a.send_report(cx, report),
            Adapter::BleHidd(a) => a.send_report(cx, report),
            Adapter::BleHidh(a) => a.send_report(cx, report),
        }
    }
}

/// Serialise a report payload into `buf`.
pub(crate) fn payload<'b>(report: &HidReport, buf: &'b mut [u8]) -> Option<&'b [u8]> {
    match report.serialize(buf) {
        0 => None,
        n => Some(&buf[..n]),
    }
}
