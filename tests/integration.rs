//! End-to-end scenarios over the in-memory radio stack.

use core::cell::RefCell;
use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_futures::{block_on, yield_now};
use heapless::{String, Vec};

use bthid::config::Config;
use bthid::gap::{BdAddr, BleAddrType, TransportKind};
use bthid::hid::keyboard::KeyboardReport;
use bthid::hid::mouse::MouseReport;
use bthid::radio::mock::{Call, MockRadio};
use bthid::radio::{
    AdvReport, BleHiddEvent, BleHidhEvent, EventQueue, InquiryResult, RadioEvent, Technology,
};
use bthid::storage::{MemoryStore, StoreKey};
use bthid::{
    ActiveMode, BtMode, Dispatcher, Error, HidReport, InboundHandler, InputEvent, InputListener,
    Mode, ReportSink, TargetSet,
};

type Arbiter<'a> = BtMode<'a, MockRadio<'a>, MemoryStore>;

const KEYBOARD_ADDR: BdAddr = BdAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
const SENSOR_ADDR: BdAddr = BdAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

struct Ignore;

impl InboundHandler for Ignore {
    fn on_input(&self, _source: TargetSet, _report: &HidReport) {}
}

#[derive(Default)]
struct Recorder(RefCell<std::vec::Vec<InputEvent>>);

impl InputListener for Recorder {
    fn on_event(&self, _source: TargetSet, event: InputEvent) {
        self.0.borrow_mut().push(event);
    }
}

/// Run `body` with the event pump of `bt` next to it.
fn drive<T>(bt: &Arbiter<'_>, inbound: &impl InboundHandler, body: impl Future<Output = T>) -> T {
    match block_on(select(bt.run(inbound), body)) {
        Either::First(never) => match never {},
        Either::Second(out) => out,
    }
}

/// Let the pump drain everything queued so far.
async fn settle() {
    for _ in 0..4 {
        yield_now().await;
    }
}

fn arbiter<'a>(radio: &'a MockRadio<'a>, queue: &'a EventQueue, store: MemoryStore) -> Arbiter<'a> {
    let _ = env_logger::builder().is_test(true).try_init();
    BtMode::new(radio, queue, store, Config::new("bthid", "0001"))
}

fn adv(addr: BdAddr, data: &[u8]) -> AdvReport {
    AdvReport {
        addr,
        kind: TransportKind::Ble,
        addr_type: BleAddrType::Public,
        rssi: -50,
        data: Vec::from_slice(data).unwrap(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Mode transitions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn ble_device_sends_only_when_connected() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());
    let mouse = HidReport::Mouse(MouseReport {
        x: 5,
        ..MouseReport::empty()
    });

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
        let status = bt.status().await;
        assert_eq!(status.mode, Mode::BleHidDevice);
        assert!(status.enabled);
        assert!(!status.connected);

        assert!(!bt.send_report(&mouse));
        radio.inject(RadioEvent::BleHidd(BleHiddEvent::Connected { addr: KEYBOARD_ADDR }));
        settle().await;
        assert!(bt.send_report(&mouse));
    });

    let sent = radio.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].report_id, 2);
    assert_eq!(sent[0].data[1], 5);
    assert!(!radio.advertising());
}

#[test]
fn classic_device_reconnects_to_plugged_host() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    radio.set_plugged(Some(KEYBOARD_ADDR));
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BtClassicHidDevice, false).await.unwrap();
        settle().await;
    });

    assert_eq!(radio.count(Call::HiddConnect), 1);
    assert_eq!(radio.hidd_peer(), Some(KEYBOARD_ADDR));
}

#[test]
fn classic_device_without_plugged_host_waits() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BtClassicHidDevice, false).await.unwrap();
        settle().await;
    });

    assert_eq!(radio.count(Call::HiddConnect), 0);
    assert_eq!(radio.scan_mode(), Some((true, true)));
}

#[test]
fn crossing_technologies_needs_a_reboot() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    let res = drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
        bt.switch_mode(Mode::BtClassicHidDevice, false).await
    });

    assert_eq!(res, Err(Error::NeedsReboot));
    let status = drive(&bt, &Ignore, bt.status());
    assert_eq!(status.mode, Mode::PendingReboot(ActiveMode::BtClassicHidDevice));
    let saved = drive(&bt, &Ignore, async {
        bt.with_store(|s| s.value(StoreKey::BtMode) == Some("BT_HIDD")).await
    });
    assert!(saved);
    assert_eq!(radio.count(Call::HiddInit), 0);
    assert_eq!(radio.enabled_tech(), None);
}

#[test]
fn reboot_hook_runs_when_requested() {
    use std::sync::atomic::{AtomicBool, Ordering};
    static RESTARTED: AtomicBool = AtomicBool::new(false);

    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new())
        .with_restart(|| RESTARTED.store(true, Ordering::SeqCst));

    let res = drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BtClassicHidDevice, false).await.unwrap();
        bt.switch_mode(Mode::BleHidHost, true).await
    });
    assert_eq!(res, Err(Error::NeedsReboot));
    assert!(RESTARTED.load(Ordering::SeqCst));
}

#[test]
fn repeated_switch_touches_nothing() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BtClassicHidDevice, false).await.unwrap();
        radio.clear_calls();
        bt.switch_mode(Mode::BtClassicHidDevice, false).await.unwrap();
    });
    assert!(radio.calls().is_empty());
    assert_eq!(radio.scan_mode(), Some((true, true)));
}

#[test]
fn initialize_restores_saved_mode() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let store = MemoryStore::new()
        .with(StoreKey::BtMode, "ble_hidh")
        .with(StoreKey::BtScan, "0");
    let bt = arbiter(&radio, &queue, store);

    drive(&bt, &Ignore, bt.initialize()).unwrap();
    let status = drive(&bt, &Ignore, bt.status());
    assert_eq!(status.mode, Mode::BleHidHost);
    assert!(!status.visibility.discoverable);
    assert_eq!(radio.count(Call::HidhInit), 1);
}

#[test]
fn initialize_without_saved_mode_is_disabled() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, bt.initialize()).unwrap();
    assert_eq!(drive(&bt, &Ignore, bt.mode()), Mode::Disabled);
    assert!(radio.calls().is_empty());
}

#[test]
fn initialize_rejects_unknown_mode() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let store = MemoryStore::new().with(StoreKey::BtMode, "ZIGBEE");
    let bt = arbiter(&radio, &queue, store);

    assert_eq!(drive(&bt, &Ignore, bt.initialize()), Err(Error::InvalidArgument));
    assert_eq!(drive(&bt, &Ignore, bt.mode()), Mode::Uninitialized);
}

#[test]
fn visibility_is_persisted_and_applied() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BtClassicHidDevice, false).await.unwrap();
        bt.configure_visibility(true, false).await.unwrap();
        radio.clear_calls();
        bt.configure_visibility(true, false).await.unwrap();
    });
    assert_eq!(radio.scan_mode(), Some((true, false)));
    assert_eq!(radio.count(Call::SetScanMode), 0);
    let saved = drive(&bt, &Ignore, async {
        bt.with_store(|s| s.value(StoreKey::BtScan) == Some("0")).await
    });
    assert!(saved);
}

// ═══════════════════════════════════════════════════════════════════════════
// Discovery and the BLE host
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn classic_scan_fills_the_registry() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    radio.preload_inquiry(InquiryResult {
        addr: KEYBOARD_ADDR,
        cod: Some(0x2540),
        rssi: Some(-60),
        name: Some(String::try_from("Keyboard K380").unwrap()),
        eir: Vec::new(),
    });
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BtClassicHidDevice, false).await.unwrap();
        bt.scan(3000).await.unwrap();
    });

    let by_addr = bt.find_device(None, Some("AA:BB:CC:DD:EE:FF")).unwrap();
    assert_eq!(by_addr.name.as_str(), "Keyboard K380");
    assert_eq!(bt.find_device(Some("Keyboard K380"), None), Some(by_addr));
    // wrong shape falls back to a name lookup
    assert_eq!(bt.find_device(None, Some("AA:BB:CC:DD:EE")), None);
    assert_eq!(radio.count(Call::GetRemoteServices), 1);
}

#[test]
fn rescan_replaces_previous_results() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    radio.preload_adv(adv(KEYBOARD_ADDR, &[0x03, 0x03, 0x12, 0x18]));
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BleHidHost, false).await.unwrap();
        bt.scan(2000).await.unwrap();
        bt.scan(2000).await.unwrap();
    });
    assert_eq!(radio.count(Call::BleStartScanning), 2);
    assert_eq!(radio.count(Call::BleSetScanParams), 2);
    assert!(bt.find_device(None, None).is_some());
}

#[test]
fn host_connects_only_to_hid_peripherals() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    radio.preload_adv(adv(KEYBOARD_ADDR, &[0x03, 0x03, 0x12, 0x18]));
    // battery service only
    radio.preload_adv(adv(SENSOR_ADDR, &[0x03, 0x03, 0x0F, 0x18]));
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BleHidHost, false).await.unwrap();
        bt.scan(2000).await.unwrap();
    });

    assert_eq!(bt.connect("11:22:33:44:55:66"), Err(Error::InvalidArgument));
    assert_eq!(bt.connect("00:00:00:00:00:01"), Err(Error::NotFound));
    assert_eq!(bt.connect("AA:BB:CC:DD:EE:FF"), Ok(()));
    assert_eq!(radio.opened(), Some((KEYBOARD_ADDR, TransportKind::Ble)));
}

#[test]
fn connect_needs_the_host_mode() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    radio.preload_adv(adv(KEYBOARD_ADDR, &[0x03, 0x03, 0x12, 0x18]));
    let bt = arbiter(&radio, &queue, MemoryStore::new());

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
        bt.scan(2000).await.unwrap();
    });
    assert_eq!(bt.connect("AA:BB:CC:DD:EE:FF"), Err(Error::InvalidState));
}

#[test]
fn inbound_keyboard_reaches_the_listener() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());
    let events = Recorder::default();
    let dispatcher = Dispatcher::new(*bt.profile()).with_listener(&events);
    let key = |pressed| InputEvent::Key {
        code: 0x04,
        modifier: 0,
        pressed,
    };

    drive(&bt, &dispatcher, async {
        bt.switch_mode(Mode::BleHidHost, false).await.unwrap();
        radio.inject(RadioEvent::BleHidh(BleHidhEvent::Opened {
            addr: KEYBOARD_ADDR,
            success: true,
            name: Some(String::try_from("K380").unwrap()),
            report_map: Vec::new(),
        }));
        let frames: [&[u8]; 3] = [&[0x04], &[0x04], &[]];
        for keys in frames {
            let mut data = [0u8; 8];
            data[2..2 + keys.len()].copy_from_slice(keys);
            radio.inject(RadioEvent::BleHidh(BleHidhEvent::Input {
                report_id: 1,
                data: Vec::from_slice(&data).unwrap(),
            }));
        }
        radio.inject(RadioEvent::BleHidh(BleHidhEvent::Battery { level: 80 }));
        settle().await;

        let status = bt.status().await;
        assert!(status.connected);
        assert_eq!(status.peer_name.as_str(), "K380");
        assert_eq!(status.peer_battery, Some(80));
    });

    assert_eq!(*events.0.borrow(), [key(true), key(false)]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Dispatch through the arbiter
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn dispatcher_routes_keyboard_through_ble() {
    let queue = EventQueue::new();
    let radio = MockRadio::new(&queue);
    let bt = arbiter(&radio, &queue, MemoryStore::new());
    let dispatcher = Dispatcher::new(*bt.profile()).with_ble(&bt);

    drive(&bt, &Ignore, async {
        bt.switch_mode(Mode::BleHidDevice, false).await.unwrap();
        radio.inject(RadioEvent::BleHidd(BleHiddEvent::Connected { addr: KEYBOARD_ADDR }));
        settle().await;
        assert!(dispatcher.keyboard_press(TargetSet::BLE, "Shift|a", None).await);
        assert!(!dispatcher.keyboard(TargetSet::USB, 0, &[0x05]));
        assert!(!dispatcher.send_raw(TargetSet::BLE, 0, &[1]));
        assert!(!dispatcher.send_raw(TargetSet::BLE, 9, &[1]));
    });

    let sent = radio.sent();
    assert_eq!(sent.len(), 1);
    let report = KeyboardReport::from_bytes(&sent[0].data).unwrap();
    assert_eq!(report.modifier, 0x02);
    assert_eq!(report.keycodes[0], 0x04);
    assert_eq!(radio.enabled_tech(), Some(Technology::Ble));
}
