//! Bluetooth mode arbiter.
//!
//! [`BtMode`] owns the one radio and decides which transport adapter
//! holds it. Mode changes go through [`BtMode::switch_mode`], which tears
//! the old adapter down, brings the new one up and persists the choice.
//! Some transitions need the controller memory of the other technology
//! back; those end in [`Mode::PendingReboot`] and take effect after a
//! restart.
//!
//! Radio callbacks only enqueue [`RadioEvent`]s. [`BtMode::run`] is the
//! single consumer: it updates the link state and the device registry,
//! wakes waiters and hands inbound host reports to an [`InboundHandler`].
//!
//! Locking: the mode and the store sit behind async mutexes held across
//! a whole transition. Link state and registry sit behind blocking
//! mutexes that are never held across an `.await` or a radio call.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Instant};

use crate::config::{
    Config, BLE_SCAN_DEFAULT_SECS, BLE_SCAN_INTERVAL, BLE_SCAN_WINDOW, DISCOVERY_CANCEL_SETTLE_MS,
    INQUIRY_LEN_DEFAULT,
};
use crate::dispatch::{InboundHandler, ReportSink, TargetSet};
use crate::gap::registry::Registry;
use crate::gap::scanner::{ble_scan_secs, ble_scan_wait, inquiry_length, inquiry_wait};
use crate::gap::DiscoveredDevice;
use crate::hid::descriptor::HidProfile;
use crate::hid::HidReport;
use crate::mode::{ActiveMode, Mode, ModeStatus, Visibility};
use crate::radio::{EventQueue, Radio, RadioEvent, Technology};
use crate::storage::{ConfigStore, StoreKey};
use crate::transport::{
    ble_hidd, ble_hidh, bt_hidd, gap_events, Ack, AckSignal, Adapter, BleHidd, BleHidh,
    ExitOutcome, LinkCell, LinkContext, LinkState, RegistryCell, ScanSignal, TransportAdapter,
};
use crate::Error;

/// How long a BLE scan waits for the stack to take the scan parameters.
const SCAN_PARAMS_TIMEOUT: Duration = Duration::from_millis(100);

/// The Bluetooth mode arbiter.
pub struct BtMode<'a, R: Radio, S: ConfigStore> {
    radio: &'a R,
    queue: &'a EventQueue,
    store: Mutex<CriticalSectionRawMutex, S>,
    config: Config,
    profile: HidProfile,
    mode: Mutex<CriticalSectionRawMutex, Mode>,
    link: LinkCell,
    registry: RegistryCell,
    acks: AckSignal,
    classic_done: ScanSignal,
    ble_done: ScanSignal,
    restart: Option<fn()>,
}

impl<'a, R: Radio, S: ConfigStore> BtMode<'a, R, S> {
    pub fn new(radio: &'a R, queue: &'a EventQueue, store: S, config: Config) -> Self {
        let profile = match config.layout {
            Some(layout) => HidProfile::for_layout(layout),
            None => HidProfile {
                layout: None,
                ..HidProfile::general()
            },
        };
        Self {
            radio,
            queue,
            store: Mutex::new(store),
            config,
            profile,
            mode: Mutex::new(Mode::Uninitialized),
            link: BlockingMutex::new(RefCell::new(LinkState::default())),
            registry: BlockingMutex::new(RefCell::new(Registry::new())),
            acks: Signal::new(),
            classic_done: Signal::new(),
            ble_done: Signal::new(),
            restart: None,
        }
    }

    /// Replace the HID profile registered with the stack.
    pub fn with_profile(mut self, profile: HidProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Hook called when a transition needs a restart and the caller asked
    /// for one.
    pub fn with_restart(mut self, restart: fn()) -> Self {
        self.restart = Some(restart);
        self
    }

    pub fn profile(&self) -> &HidProfile {
        &self.profile
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn cx(&self) -> LinkContext<'_, R> {
        LinkContext {
            radio: self.radio,
            config: &self.config,
            profile: &self.profile,
            link: &self.link,
            registry: &self.registry,
            acks: &self.acks,
            classic_done: &self.classic_done,
            ble_done: &self.ble_done,
        }
    }

    /// Run `f` on the persisted configuration store.
    pub async fn with_store<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        let mut store = self.store.lock().await;
        f(&mut store)
    }

    pub async fn mode(&self) -> Mode {
        *self.mode.lock().await
    }

    pub async fn status(&self) -> ModeStatus {
        let mode = self.mode().await;
        let mut status = ModeStatus::new(mode);
        self.link.lock(|link| {
            let link = link.borrow();
            status.visibility = link.visibility;
            status.enabled = link.enabled;
            status.connected = link.connected;
            status.peer = link.peer;
            status.peer_name = link.peer_name.clone();
            status.peer_battery = link.peer_battery;
        });
        if mode.is_server() {
            status.bonded = self.radio.bonded_devices(if mode.is_bt() {
                Technology::Classic
            } else {
                Technology::Ble
            });
        }
        status
    }

    /// Move the radio to `target`.
    ///
    /// Returns [`Error::NeedsReboot`] when the old adapter released memory
    /// the new one needs. The target is persisted in that case and the
    /// mode becomes [`Mode::PendingReboot`].
    pub async fn switch_mode(&self, target: Mode, reboot_if_needed: bool) -> Result<(), Error> {
        let target = ActiveMode::try_from(target)?;
        let mut mode = self.mode.lock().await;
        let prev = *mode;
        if prev == Mode::from(target) {
            debug!("Already in {}", target);
            return Ok(());
        }
        let cx = self.cx();

        let mut exited = matches!(prev, Mode::Disabled | Mode::Uninitialized);
        if let Some(active) = prev.active() {
            cx.with_link(|link| link.routed = false);
            match Adapter::for_mode(active).exit(&cx, target).await {
                Ok(ExitOutcome::TornDown) => exited = true,
                Ok(ExitOutcome::NeedsReboot) => {}
                Err(e) => {
                    error!("Could not stop {}: {}", active, e);
                    cx.with_link(LinkState::reset_profile);
                    exited = true;
                }
            }
        }

        if !exited {
            if let Err(e) = self.persist_mode(target).await {
                error!("Could not save {}: {}", target, e);
            }
            *mode = Mode::PendingReboot(target);
            info!("{} takes effect after restart", target);
            if reboot_if_needed {
                if let Some(restart) = self.restart {
                    restart();
                }
            }
            return Err(Error::NeedsReboot);
        }

        match Adapter::for_mode(target).init(&cx, prev).await {
            Ok(()) => {
                cx.with_link(|link| link.routed = true);
                *mode = target.into();
                if let Err(e) = self.persist_mode(target).await {
                    warn!("Could not save {}: {}", target, e);
                }
                info!("Bluetooth mode {} -> {}", prev, target);
                Ok(())
            }
            Err(e) => {
                error!("Could not start {}: {}", target, e);
                cx.with_link(LinkState::reset_profile);
                *mode = Mode::Failed(e);
                Err(e)
            }
        }
    }

    async fn persist_mode(&self, mode: ActiveMode) -> Result<(), Error> {
        self.store.lock().await.set(StoreKey::BtMode, mode.name()).await
    }

    /// Apply the persisted mode and discoverability default.
    pub async fn initialize(&self) -> Result<(), Error> {
        let (saved, scan) = {
            let mut store = self.store.lock().await;
            (store.get(StoreKey::BtMode).await?, store.get(StoreKey::BtScan).await?)
        };
        if let Some(scan) = scan {
            let discoverable = scan.as_str() != "0";
            self.link
                .lock(|link| link.borrow_mut().visibility.discoverable = discoverable);
        }

        let saved = saved.unwrap_or_default();
        if saved.trim().is_empty() {
            *self.mode.lock().await = Mode::Disabled;
            info!("Bluetooth is software blocked");
            return Ok(());
        }
        match ActiveMode::from_name(&saved) {
            Some(mode) => self.switch_mode(mode.into(), false).await,
            None => {
                error!("Unknown Bluetooth mode {}", saved.as_str());
                Err(Error::InvalidArgument)
            }
        }
    }

    /// Discover peers on the enabled controller.
    ///
    /// A `timeout_ms` of 0 starts a default-length scan and returns at
    /// once; the device list is logged when the scan ends. Otherwise the
    /// call waits for the scan to finish. A running scan is cancelled
    /// first and the registry is cleared.
    pub async fn scan(&self, timeout_ms: u32) -> Result<(), Error> {
        let cx = self.cx();
        let tech = cx.with_link(|link| link.tech).ok_or(Error::InvalidState)?;
        let signal = cx.scan_signal(tech);

        if cx.with_link(|link| link.scan(tech).preempt()) {
            let stopped = match tech {
                Technology::Classic => self.radio.cancel_discovery(),
                Technology::Ble => self.radio.ble_stop_scanning(),
            };
            if let Err(e) = stopped {
                warn!("Could not stop running scan: {}", e);
            }
            let settle = Duration::from_millis(DISCOVERY_CANCEL_SETTLE_MS);
            let _ = with_timeout(settle, signal.wait()).await;
        }
        signal.reset();
        cx.with_registry(Registry::clear);

        if tech == Technology::Ble {
            self.acks.reset();
            self.radio.ble_set_scan_params(BLE_SCAN_INTERVAL, BLE_SCAN_WINDOW)?;
            match cx.wait_ack(Ack::ScanParamsSet, SCAN_PARAMS_TIMEOUT).await {
                Ok(()) | Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
        }

        if timeout_ms == 0 {
            cx.with_link(|link| link.scan(tech).start(false));
            let started = match tech {
                Technology::Classic => self.radio.start_discovery(INQUIRY_LEN_DEFAULT),
                Technology::Ble => self.radio.ble_start_scanning(BLE_SCAN_DEFAULT_SECS),
            };
            if let Err(e) = started {
                cx.with_link(|link| link.scan(tech).abort());
                return Err(e.into());
            }
            info!("Scanning in background");
            return Ok(());
        }

        let (wait, started) = match tech {
            Technology::Classic => {
                let len = inquiry_length(timeout_ms);
                cx.with_link(|link| link.scan(tech).start(true));
                (inquiry_wait(len), self.radio.start_discovery(len))
            }
            Technology::Ble => {
                let secs = ble_scan_secs(timeout_ms);
                cx.with_link(|link| link.scan(tech).start(true));
                (ble_scan_wait(secs), self.radio.ble_start_scanning(secs))
            }
        };
        if let Err(e) = started {
            cx.with_link(|link| link.scan(tech).abort());
            return Err(e.into());
        }
        info!("Scanning for {} ms", wait.as_millis());

        let deadline = Instant::now() + wait;
        while cx.with_link(|link| link.scan(tech).in_flight()) {
            let now = Instant::now();
            let timed_out =
                now >= deadline || with_timeout(deadline - now, signal.wait()).await.is_err();
            if timed_out {
                cx.with_link(|link| link.scan(tech).abandon());
                warn!("Scan did not finish in time");
                return Err(Error::Timeout);
            }
        }
        cx.with_registry(|registry| {
            info!("Scan found {} devices", registry.len());
            registry.log_devices();
        });
        Ok(())
    }

    /// Look up a device from the last scan by address string or name.
    /// Without either, the first device found is returned.
    pub fn find_device(&self, name: Option<&str>, addr: Option<&str>) -> Option<DiscoveredDevice> {
        self.registry.lock(|registry| {
            let registry = registry.borrow();
            match addr.or(name) {
                Some(key) => registry.find_by_str(key).cloned(),
                None => registry.first().cloned(),
            }
        })
    }

    /// Connect the HID host to a device from the last scan.
    pub fn connect(&self, key: &str) -> Result<(), Error> {
        let device = self.find_device(Some(key), None).ok_or(Error::NotFound)?;
        if device.kind.is_ble() && !device.advertises_hid() {
            warn!("{} does not advertise HID", device.addr);
            return Err(Error::InvalidArgument);
        }
        let cx = self.cx();
        if !cx.with_link(|link| link.routed && link.owner == Some(ActiveMode::BleHidHost)) {
            return Err(Error::InvalidState);
        }
        BleHidh.connect(&cx, &device)
    }

    /// Change the connectable/discoverable flags and remember the
    /// discoverability default.
    pub async fn configure_visibility(&self, connectable: bool, discoverable: bool) -> Result<(), Error> {
        let visibility = Visibility {
            connectable,
            discoverable,
        };
        let cx = self.cx();
        let (changed, owner) = cx.with_link(|link| {
            let changed = link.visibility != visibility;
            link.visibility = visibility;
            (changed, link.owner.filter(|_| link.routed))
        });
        if !changed {
            return Ok(());
        }
        let flag = if discoverable { "1" } else { "0" };
        self.store.lock().await.set(StoreKey::BtScan, flag).await?;
        info!("Connectable {} discoverable {}", connectable, discoverable);
        match owner {
            Some(owner) => Adapter::for_mode(owner).configure_visibility(&cx, visibility),
            None => Ok(()),
        }
    }

    /// Report the battery level to the connected host (BLE HID device).
    pub fn set_battery(&self, level: u8) -> Result<(), Error> {
        let cx = self.cx();
        if !cx.with_link(|link| link.routed && link.owner == Some(ActiveMode::BleHidDevice)) {
            return Err(Error::InvalidState);
        }
        BleHidd.set_battery(&cx, level)
    }

    /// Event pump. Run it on its own task for the lifetime of the arbiter.
    pub async fn run(&self, inbound: &impl InboundHandler) -> ! {
        loop {
            let event = self.queue.receive().await;
            self.handle_event(event, inbound);
        }
    }

    /// Process one radio event.
    pub fn handle_event(&self, event: RadioEvent, inbound: &impl InboundHandler) {
        let cx = self.cx();
        let owner = cx.with_link(|link| link.owner);
        match event {
            RadioEvent::Gap(e) => gap_events::on_gap_event(&cx, e),
            RadioEvent::BleGap(e) => gap_events::on_ble_gap_event(&cx, e),
            RadioEvent::BtHidd(e) if owner == Some(ActiveMode::BtClassicHidDevice) => {
                bt_hidd::on_event(&cx, e)
            }
            RadioEvent::BleHidd(e) if owner == Some(ActiveMode::BleHidDevice) => {
                ble_hidd::on_event(&cx, e)
            }
            RadioEvent::BleHidh(e) if owner == Some(ActiveMode::BleHidHost) => {
                if let Some(report) = ble_hidh::on_event(&cx, e) {
                    inbound.on_input(TargetSet::BLE, &report);
                }
            }
            _ => debug!("Dropping event for inactive profile"),
        }
    }
}

impl<R: Radio, S: ConfigStore> ReportSink for BtMode<'_, R, S> {
    fn send_report(&self, report: &HidReport) -> bool {
        let owner = self
            .link
            .lock(|link| {
                let link = link.borrow();
                link.owner.filter(|_| link.routed)
            });
        match owner {
            Some(owner) => Adapter::for_mode(owner).send_report(&self.cx(), report),
            None => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use core::future::Future;

    use embassy_futures::select::{select, Either};
    use embassy_futures::{block_on, yield_now};

    use super::*;
    use crate::gap::{BdAddr, BleAddrType, TransportKind};
    use crate::hid::mouse::MouseReport;
    use crate::radio::mock::{Call, MockRadio};
    use crate::radio::{AdvReport, BleHiddEvent, BleHidhEvent};
    use crate::storage::MemoryStore;
    use crate::RadioError;

    struct Ignore;

    impl InboundHandler for Ignore {
        fn on_input(&self, _source: TargetSet, _report: &HidReport) {}
    }

    type Arbiter<'a> = BtMode<'a, MockRadio<'a>, MemoryStore>;

    fn drive<'a, T>(bt: &Arbiter<'a>, body: impl Future<Output = T>) -> T {
        match block_on(select(bt.run(&Ignore), body)) {
            Either::First(never) => match never {},
            Either::Second(out) => out,
        }
    }

    async fn settle() {
        for _ in 0..4 {
            yield_now().await;
        }
    }

    fn arbiter<'a>(radio: &'a MockRadio<'a>, queue: &'a EventQueue) -> Arbiter<'a> {
        BtMode::new(radio, queue, MemoryStore::new(), Config::new("bthid", "0001"))
    }

    #[test]
    fn non_active_targets_are_rejected() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        let res = drive(&bt, bt.switch_mode(Mode::Disabled, false));
        assert_eq!(res, Err(Error::InvalidArgument));
        assert_eq!(drive(&bt, bt.mode()), Mode::Uninitialized);
    }

    #[test]
    fn switching_to_the_current_mode_is_a_no_op() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        drive(&bt, async {
            bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
            let calls = radio.calls().len();
            bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
            assert_eq!(radio.calls().len(), calls);
        });
        assert_eq!(radio.count(Call::BleHiddInit), 1);
    }

    #[test]
    fn failed_init_leaves_failed_mode() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        radio.fail_next(Call::HiddInit, RadioError::NoMemory);
        let bt = arbiter(&radio, &queue);
        let res = drive(&bt, bt.switch_mode(Mode::BtClassicHidDevice, false));
        let err = Error::Transient(RadioError::NoMemory);
        assert_eq!(res, Err(err));
        assert_eq!(drive(&bt, bt.mode()), Mode::Failed(err));
        assert!(!bt.send_report(&MouseReport::empty().into()));
    }

    #[test]
    fn ble_device_to_ble_host_needs_no_reboot() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        drive(&bt, async {
            bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
            bt.switch_mode(Mode::BleHidHost, false).await.unwrap();
        });
        assert_eq!(drive(&bt, bt.mode()), Mode::BleHidHost);
        assert_eq!(radio.count(Call::EnableController), 1);
        assert_eq!(radio.enabled_tech(), Some(Technology::Ble));
    }

    #[test]
    fn leaving_a_failed_mode_waits_for_restart() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        radio.fail_next(Call::HiddInit, RadioError::Failed);
        let bt = arbiter(&radio, &queue);
        drive(&bt, async {
            assert!(bt.switch_mode(Mode::BtClassicHidDevice, false).await.is_err());
            let res = bt.switch_mode(Mode::BleHidDevice, false).await;
            assert_eq!(res, Err(Error::NeedsReboot));
        });
        assert_eq!(
            drive(&bt, bt.mode()),
            Mode::PendingReboot(ActiveMode::BleHidDevice)
        );
    }

    #[test]
    fn failed_host_exit_drops_the_host_link() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        drive(&bt, async {
            bt.switch_mode(Mode::BleHidHost, false).await.unwrap();
            radio.inject(RadioEvent::BleHidh(BleHidhEvent::Opened {
                addr: BdAddr([1; 6]),
                success: true,
                name: None,
                report_map: heapless::Vec::new(),
            }));
            settle().await;
            radio.fail_next(Call::HidhDeinit, RadioError::Failed);
            bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
        });
        let status = drive(&bt, bt.status());
        assert_eq!(status.mode, Mode::BleHidDevice);
        assert!(!status.connected);
        assert_eq!(status.peer, None);
        assert!(!bt.send_report(&MouseReport::empty().into()));
    }

    #[test]
    fn scan_without_active_mode_is_invalid() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        assert_eq!(drive(&bt, bt.scan(1000)), Err(Error::InvalidState));
    }

    #[test]
    fn background_scan_returns_at_once() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        radio.preload_adv(AdvReport {
            addr: BdAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]),
            kind: TransportKind::Ble,
            addr_type: BleAddrType::Random,
            rssi: -40,
            data: heapless::Vec::from_slice(&[0x03, 0x03, 0x12, 0x18]).unwrap(),
        });
        drive(&bt, async {
            bt.switch_mode(Mode::BleHidHost, false).await.unwrap();
            bt.scan(0).await.unwrap();
            settle().await;
        });
        let dev = bt.find_device(None, None).unwrap();
        assert!(dev.advertises_hid());
        assert_eq!(dev.addr_type(), BleAddrType::Random);
    }

    #[test]
    fn battery_needs_a_connected_ble_device() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        assert_eq!(bt.set_battery(50), Err(Error::InvalidState));
        drive(&bt, async {
            bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
            assert_eq!(bt.set_battery(50), Err(Error::InvalidState));
            radio.inject(RadioEvent::BleHidd(BleHiddEvent::Connected {
                addr: BdAddr([1; 6]),
            }));
            settle().await;
            assert_eq!(bt.set_battery(150), Ok(()));
        });
        assert_eq!(radio.battery(), Some(100));
    }

    #[test]
    fn host_events_are_dropped_when_host_is_inactive() {
        let queue = EventQueue::new();
        let radio = MockRadio::new(&queue);
        let bt = arbiter(&radio, &queue);
        drive(&bt, async {
            bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
            radio.inject(RadioEvent::BleHidh(BleHidhEvent::Battery { level: 42 }));
            settle().await;
        });
        assert_eq!(drive(&bt, bt.status()).peer_battery, None);
    }
}
