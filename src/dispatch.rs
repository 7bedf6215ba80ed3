//! Report fan-out and inbound report handling.
//!
//! [`Dispatcher::hid_report_send`] validates a report against the active
//! [`HidProfile`] and hands it to every selected sink. The builders on top
//! of it (`keyboard_press`, `mouse_click`, `gamepad_button`, ...) turn
//! user-level actions into reports, with an optional hold before the
//! matching release.
//!
//! In the other direction the dispatcher implements [`InboundHandler`]:
//! reports received from a connected peripheral are edge-detected per
//! source and mirrored to the screen sink.

use core::cell::RefCell;
use core::ops::BitOr;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_time::{Duration, Timer};
use heapless::Vec;

use crate::config::SYSTEM_CONTROL_HOLD_MS;
use crate::hid::control::{DialKey, DialReport, SystemControl, SystemControlReport};
use crate::hid::descriptor::HidProfile;
use crate::hid::gamepad::{ButtonAction, Dpad, GamepadLayout, GamepadState, CLICK_NAMES};
use crate::hid::keyboard::KeyboardReport;
use crate::hid::keymap::{buttons_to_str, keycode_to_str, keycodes_to_str, modifier_to_str, str_to_keycodes};
use crate::hid::mouse::{button_from_name, AbsMouseReport, MouseReport};
use crate::hid::HidReport;
use crate::input::{InputEvent, InputListener, InputTracker};

/// Sinks a report is fanned out to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetSet(pub u8);

impl TargetSet {
    pub const NONE: Self = Self(0);
    pub const USB: Self = Self(1 << 0);
    pub const BLE: Self = Self(1 << 1);
    pub const UDP: Self = Self(1 << 2);
    pub const SCREEN: Self = Self(1 << 3);
    pub const ALL: Self = Self(0xFF);

    pub const fn contains(&self, other: TargetSet) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Bit index when exactly one target is set.
    pub const fn single_index(&self) -> Option<usize> {
        if self.0.count_ones() == 1 {
            Some(self.0.trailing_zeros() as usize)
        } else {
            None
        }
    }
}

impl BitOr for TargetSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Anything that can carry an input report to a host.
pub trait ReportSink {
    /// `true` if the report was accepted.
    fn send_report(&self, report: &HidReport) -> bool;
}

/// Receiver of reports coming from a connected HID peripheral.
pub trait InboundHandler {
    fn on_input(&self, source: TargetSet, report: &HidReport);
}

type Locked<T> = BlockingMutex<CriticalSectionRawMutex, RefCell<T>>;

/// Report fan-out to the USB, BLE, UDP and screen sinks.
pub struct Dispatcher<'a> {
    profile: HidProfile,
    usb: Option<&'a dyn ReportSink>,
    ble: Option<&'a dyn ReportSink>,
    udp: Option<&'a dyn ReportSink>,
    screen: Option<&'a dyn ReportSink>,
    listener: Option<&'a dyn InputListener>,
    gamepad: Locked<GamepadState>,
    tracker: Locked<InputTracker>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(profile: HidProfile) -> Self {
        Self {
            profile,
            usb: None,
            ble: None,
            udp: None,
            screen: None,
            listener: None,
            gamepad: BlockingMutex::new(RefCell::new(GamepadState::default())),
            tracker: BlockingMutex::new(RefCell::new(InputTracker::new())),
        }
    }

    pub fn with_usb(mut self, sink: &'a dyn ReportSink) -> Self {
        self.usb = Some(sink);
        self
    }

    pub fn with_ble(mut self, sink: &'a dyn ReportSink) -> Self {
        self.ble = Some(sink);
        self
    }

    pub fn with_udp(mut self, sink: &'a dyn ReportSink) -> Self {
        self.udp = Some(sink);
        self
    }

    pub fn with_screen(mut self, sink: &'a dyn ReportSink) -> Self {
        self.screen = Some(sink);
        self
    }

    pub fn with_listener(mut self, listener: &'a dyn InputListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn profile(&self) -> &HidProfile {
        &self.profile
    }

    pub fn gamepad_state(&self) -> GamepadState {
        self.gamepad.lock(|g| *g.borrow())
    }

    /// Send `report` to every sink in `targets`. Returns `true` if at
    /// least one sink accepted it.
    pub fn hid_report_send(&self, targets: TargetSet, report: &HidReport) -> bool {
        let id = report.id();
        if !self.profile.accepts(id) {
            debug!("{} report not accepted by the profile", id);
            return false;
        }
        let size = self.profile.report_size(id);
        if size == 0 || report.size() != size {
            warn!("{} report has {} bytes, profile expects {}", id, report.size(), size);
            return false;
        }

        let mut sent = false;
        for (target, sink) in [
            (TargetSet::USB, self.usb),
            (TargetSet::BLE, self.ble),
            (TargetSet::UDP, self.udp),
            (TargetSet::SCREEN, self.screen),
        ] {
            if let Some(sink) = sink.filter(|_| targets.contains(target)) {
                sent |= sink.send_report(report);
            }
        }
        if sent && !targets.contains(TargetSet::SCREEN) {
            self.log_report(report);
        }
        sent
    }

    /// Send a raw `id` + payload. Invalid ids and empty payloads are
    /// refused; short payloads are zero-filled.
    pub fn send_raw(&self, targets: TargetSet, id: u8, data: &[u8]) -> bool {
        let layout = self.profile.layout.unwrap_or(GamepadLayout::General);
        match HidReport::from_raw_with_layout(id, data, layout) {
            Ok(report) => self.hid_report_send(targets, &report),
            Err(_) => {
                warn!("Unknown report id: {}", id);
                false
            }
        }
    }

    fn log_report(&self, report: &HidReport) {
        match report {
            HidReport::Keyboard(r) => info!(
                "KEYBD MOD {:#x} KEY {}",
                r.modifier,
                keycodes_to_str(&r.keycodes, r.modifier).as_str()
            ),
            HidReport::Mouse(r) => info!(
                "MOUSE X {} Y {} V {} H {} BTN {}",
                r.x,
                r.y,
                r.wheel,
                r.pan,
                buttons_to_str(r.buttons).as_str()
            ),
            HidReport::AbsMouse(r) => info!(
                "ABMSE X {} Y {} V {} H {} BTN {}",
                r.x,
                r.y,
                r.wheel,
                r.pan,
                buttons_to_str(r.buttons).as_str()
            ),
            HidReport::Gamepad(_) => {
                let g = self.gamepad_state();
                info!(
                    "GMPAD L {} {} R {} {} H {:#x} T {} {} BTN {:#x}",
                    g.lx >> 8,
                    g.ly >> 8,
                    g.rx >> 8,
                    g.ry >> 8,
                    g.dpad,
                    g.lt,
                    g.rt,
                    g.buttons
                )
            }
            HidReport::SystemControl(r) => info!("SCTRL {:#x}", r.0),
            HidReport::SurfaceDial(r) => {
                info!("SDIAL {:#x}", u16::from_le_bytes([r.code, r.extra]))
            }
            HidReport::Point(_) | HidReport::Touch(_) => debug!("{} report sent", report.id()),
        }
    }

    // ── Keyboard ─────────────────────────────────────────────────────────

    pub fn keyboard(&self, targets: TargetSet, modifier: u8, keys: &[u8]) -> bool {
        self.hid_report_send(targets, &KeyboardReport::new(modifier, keys).into())
    }

    /// Press a key expression such as `"Ctrl|Alt|Delete"`; release it
    /// after `hold` unless `hold` is `None`.
    pub async fn keyboard_press(&self, targets: TargetSet, keys: &str, hold: Option<Duration>) -> bool {
        let (modifier, codes) = str_to_keycodes(keys);
        let sent = self.keyboard(targets, modifier, &codes);
        match hold {
            Some(hold) if sent && (modifier != 0 || !codes.is_empty()) => {
                Timer::after(hold).await;
                self.keyboard(targets, 0, &[])
            }
            _ => sent,
        }
    }

    // ── Mouse ────────────────────────────────────────────────────────────

    pub fn mouse(&self, targets: TargetSet, buttons: u8, x: i8, y: i8, wheel: i8, pan: i8) -> bool {
        let report = MouseReport {
            buttons,
            x,
            y,
            wheel,
            pan,
        };
        self.hid_report_send(targets, &report.into())
    }

    pub fn mouse_button(&self, targets: TargetSet, buttons: u8) -> bool {
        self.mouse(targets, buttons, 0, 0, 0, 0)
    }

    /// Click a named button (`Left`, `Right`, `Middle`, `Backward`,
    /// `Forward`). An unknown name sends an empty report.
    pub async fn mouse_click(&self, targets: TargetSet, name: &str, hold: Option<Duration>) -> bool {
        let button = button_from_name(name);
        let sent = self.mouse_button(targets, button);
        match hold {
            Some(hold) if sent && button != 0 => {
                Timer::after(hold).await;
                self.mouse_button(targets, 0)
            }
            _ => sent,
        }
    }

    pub fn mouse_move(&self, targets: TargetSet, x: i8, y: i8) -> bool {
        self.mouse(targets, 0, x, y, 0, 0)
    }

    pub fn mouse_scroll(&self, targets: TargetSet, wheel: i8, pan: i8) -> bool {
        self.mouse(targets, 0, 0, 0, wheel, pan)
    }

    /// Move the absolute pointer to `x`/`y` in `0..=0x7FFF`.
    pub fn mouse_moveto(&self, targets: TargetSet, x: u16, y: u16) -> bool {
        let report = AbsMouseReport {
            x,
            y,
            ..AbsMouseReport::default()
        };
        self.hid_report_send(targets, &HidReport::AbsMouse(report))
    }

    // ── Gamepad ──────────────────────────────────────────────────────────

    fn send_gamepad(&self, targets: TargetSet, f: impl FnOnce(&mut GamepadState) -> bool) -> bool {
        let Some(layout) = self.profile.layout else {
            debug!("No gamepad layout configured");
            return false;
        };
        let report = self.gamepad.lock(|g| {
            let mut g = g.borrow_mut();
            f(&mut *g).then(|| g.pack(layout))
        });
        match report {
            Some(report) => self.hid_report_send(targets, &report.into()),
            // unchanged state, nothing to send
            None => true,
        }
    }

    pub fn gamepad_dpad(&self, targets: TargetSet, first: Dpad, second: Dpad) -> bool {
        self.send_gamepad(targets, |g| {
            g.set_dpad(first, second);
            true
        })
    }

    pub fn gamepad_trig(&self, targets: TargetSet, lt: u8, rt: u8) -> bool {
        self.send_gamepad(targets, |g| {
            g.lt = lt;
            g.rt = rt;
            true
        })
    }

    pub fn gamepad_joyst(&self, targets: TargetSet, lx: i16, ly: i16, rx: i16, ry: i16) -> bool {
        self.send_gamepad(targets, |g| {
            (g.lx, g.ly, g.rx, g.ry) = (lx, ly, rx, ry);
            true
        })
    }

    /// Combine `mask` into the held buttons. An unchanged state returns
    /// `true` without sending.
    pub fn gamepad_button(&self, targets: TargetSet, mask: u16, action: ButtonAction) -> bool {
        self.send_gamepad(targets, |g| g.apply_buttons(mask, action))
    }

    /// Click a named button or diagonal (see [`CLICK_NAMES`]).
    pub async fn gamepad_click(&self, targets: TargetSet, name: &str, hold: Option<Duration>) -> bool {
        let Some(index) = CLICK_NAMES.iter().position(|n| n.eq_ignore_ascii_case(name)) else {
            return false;
        };
        let sent = match index {
            0..=15 => self.gamepad_button(targets, 1 << index, ButtonAction::Press),
            // UR, DR, DL, UL
            _ => {
                let dir = Dpad::from_u8(2 * index as u8 - 30);
                self.gamepad_dpad(targets, dir, dir)
            }
        };
        let Some(hold) = hold.filter(|_| sent) else {
            return sent;
        };
        Timer::after(hold).await;
        match index {
            0..=15 => self.gamepad_button(targets, 1 << index, ButtonAction::Release),
            _ => self.gamepad_dpad(targets, Dpad::None, Dpad::None),
        }
    }

    // ── System control / dial ────────────────────────────────────────────

    /// Press and release a system control key.
    pub async fn system_control(&self, targets: TargetSet, code: SystemControl) -> bool {
        let press = HidReport::SystemControl(SystemControlReport::press(code));
        if !self.hid_report_send(targets, &press) {
            return false;
        }
        Timer::after(Duration::from_millis(SYSTEM_CONTROL_HOLD_MS)).await;
        self.hid_report_send(targets, &HidReport::SystemControl(SystemControlReport::release()))
    }

    pub fn dial(&self, targets: TargetSet, key: DialKey) -> bool {
        self.hid_report_send(targets, &HidReport::SurfaceDial(DialReport::new(key)))
    }

    pub async fn dial_click(&self, targets: TargetSet, hold: Option<Duration>) -> bool {
        let sent = self.dial(targets, DialKey::Press);
        match hold {
            Some(hold) if sent => {
                Timer::after(hold).await;
                self.dial(targets, DialKey::Release)
            }
            _ => sent,
        }
    }
}

/// Edge events produced by one inbound report.
type EdgeEvents = Vec<InputEvent, 16>;

impl InboundHandler for Dispatcher<'_> {
    fn on_input(&self, source: TargetSet, report: &HidReport) {
        let mut events = EdgeEvents::new();
        let mut push = |e: InputEvent| {
            let _ = events.push(e);
        };
        let res = self.tracker.lock(|t| {
            let mut t = t.borrow_mut();
            match report {
                HidReport::Keyboard(r) => t.handle_keyboard(source, r, &mut push),
                HidReport::Mouse(r) => t.handle_mouse(source, r, &mut push),
                HidReport::AbsMouse(r) => t.handle_abs_mouse(source, r, &mut push),
                _ => Ok(()),
            }
        });
        if let Err(e) = res {
            warn!("Inbound {} report dropped: {}", report.id(), e);
            return;
        }

        for event in events {
            match event {
                InputEvent::Key {
                    code,
                    modifier,
                    pressed: true,
                } => info!(
                    "{} pressed modifier {}",
                    keycode_to_str(code, modifier).as_str(),
                    modifier_to_str(modifier).as_str()
                ),
                InputEvent::Key { code, modifier, .. } => {
                    info!("{} released", keycode_to_str(code, modifier).as_str())
                }
                InputEvent::Button { mask, pressed } => {
                    debug!("{} {}", buttons_to_str(mask).as_str(), if pressed { "down" } else { "up" })
                }
                InputEvent::Motion { x, y, .. } => trace!("X: {} Y: {}", x, y),
            }
            if let Some(listener) = self.listener {
                listener.on_event(source, event);
            }
        }

        if !source.contains(TargetSet::SCREEN) {
            if let Some(screen) = self.screen {
                screen.send_report(report);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
