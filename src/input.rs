//! Edge detection for inbound reports.
//!
//! Keyboards and mice report their whole state every time. The tracker
//! keeps the previous report of each source and turns the difference into
//! press/release and motion events, so two sources held at the same time
//! never cancel each other out.

use crate::dispatch::TargetSet;
use crate::hid::keyboard::KeyboardReport;
use crate::hid::mouse::{AbsMouseReport, MouseReport, BUTTON_COUNT};
use crate::Error;

/// Number of sources tracked independently (one per [`TargetSet`] bit).
pub const SOURCE_COUNT: usize = 8;

/// Keycodes below this are the error/rollover codes, not keys.
const FIRST_KEY: u8 = 4;

/// One edge or motion derived from consecutive reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    Key { code: u8, modifier: u8, pressed: bool },
    Button { mask: u8, pressed: bool },
    /// Pointer moved; `x`/`y` is the running position of the source.
    Motion { x: i32, y: i32, dx: i32, dy: i32 },
}

/// Receiver of decoded input events.
pub trait InputListener {
    fn on_event(&self, source: TargetSet, event: InputEvent);
}

#[derive(Clone, Copy, Debug, Default)]
struct SourceState {
    keyboard: KeyboardReport,
    buttons: u8,
    x: i32,
    y: i32,
    /// Last absolute position, `None` until the first absolute report.
    abs: Option<(u16, u16)>,
}

/// Previous-report state per input source.
#[derive(Clone, Debug, Default)]
pub struct InputTracker {
    sources: [SourceState; SOURCE_COUNT],
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn source(&mut self, source: TargetSet) -> Result<&mut SourceState, Error> {
        let index = source.single_index().ok_or(Error::InvalidArgument)?;
        self.sources.get_mut(index).ok_or(Error::InvalidArgument)
    }

    /// Diff a keyboard report against the previous one from `source`.
    /// Slot order does not matter.
    pub fn handle_keyboard(
        &mut self,
        source: TargetSet,
        report: &KeyboardReport,
        mut emit: impl FnMut(InputEvent),
    ) -> Result<(), Error> {
        let state = self.source(source)?;
        let prev = state.keyboard;
        for (&old, &new) in prev.keycodes.iter().zip(report.keycodes.iter()) {
            if old >= FIRST_KEY && !report.keycodes.contains(&old) {
                emit(InputEvent::Key {
                    code: old,
                    modifier: prev.modifier,
                    pressed: false,
                });
            }
            if new >= FIRST_KEY && !prev.keycodes.contains(&new) {
                emit(InputEvent::Key {
                    code: new,
                    modifier: report.modifier,
                    pressed: true,
                });
            }
        }
        state.keyboard = *report;
        Ok(())
    }

    /// Accumulate a relative mouse report and emit button edges.
    pub fn handle_mouse(
        &mut self,
        source: TargetSet,
        report: &MouseReport,
        mut emit: impl FnMut(InputEvent),
    ) -> Result<(), Error> {
        let state = self.source(source)?;
        let (dx, dy) = (report.x as i32, report.y as i32);
        if dx != 0 || dy != 0 {
            state.x = state.x.wrapping_add(dx);
            state.y = state.y.wrapping_add(dy);
            emit(InputEvent::Motion {
                x: state.x,
                y: state.y,
                dx,
                dy,
            });
        }
        button_edges(state.buttons, report.buttons, &mut emit);
        state.buttons = report.buttons;
        Ok(())
    }

    /// Track an absolute pointer; the first report of a source moves by 0.
    pub fn handle_abs_mouse(
        &mut self,
        source: TargetSet,
        report: &AbsMouseReport,
        mut emit: impl FnMut(InputEvent),
    ) -> Result<(), Error> {
        let state = self.source(source)?;
        let (px, py) = state.abs.unwrap_or((report.x, report.y));
        let dx = report.x as i32 - px as i32;
        let dy = report.y as i32 - py as i32;
        state.abs = Some((report.x, report.y));
        state.x = report.x as i32;
        state.y = report.y as i32;
        if dx != 0 || dy != 0 {
            emit(InputEvent::Motion {
                x: state.x,
                y: state.y,
                dx,
                dy,
            });
        }
        button_edges(state.buttons, report.buttons, &mut emit);
        state.buttons = report.buttons;
        Ok(())
    }

    /// Forget everything seen from `source`.
    pub fn reset(&mut self, source: TargetSet) -> Result<(), Error> {
        *self.source(source)? = SourceState::default();
        Ok(())
    }
}

fn button_edges(prev: u8, next: u8, emit: &mut impl FnMut(InputEvent)) {
    let changed = prev ^ next;
    for bit in 0..BUTTON_COUNT {
        let mask = 1u8 << bit;
        if changed & mask != 0 {
            emit(InputEvent::Button {
                mask,
                pressed: next & mask != 0,
            });
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;

    const KEY_A: u8 = 0x04;
    const KEY_B: u8 = 0x05;

    fn keyboard(tracker: &mut InputTracker, source: TargetSet, keys: &[u8]) -> Vec<InputEvent> {
        let mut events = Vec::new();
        tracker
            .handle_keyboard(source, &KeyboardReport::new(0, keys), |e| events.push(e))
            .unwrap();
        events
    }

    fn key(code: u8, pressed: bool) -> InputEvent {
        InputEvent::Key {
            code,
            modifier: 0,
            pressed,
        }
    }

    #[test]
    fn first_key_press() {
        let mut t = InputTracker::new();
        assert_eq!(keyboard(&mut t, TargetSet::USB, &[KEY_A]), [key(KEY_A, true)]);
    }

    #[test]
    fn release_only_the_lifted_key() {
        let mut t = InputTracker::new();
        keyboard(&mut t, TargetSet::USB, &[KEY_A, KEY_B]);
        assert_eq!(keyboard(&mut t, TargetSet::USB, &[KEY_B]), [key(KEY_A, false)]);
    }

    #[test]
    fn slot_moves_are_not_edges() {
        let mut t = InputTracker::new();
        keyboard(&mut t, TargetSet::BLE, &[KEY_A, KEY_B]);
        assert!(keyboard(&mut t, TargetSet::BLE, &[KEY_B, KEY_A]).is_empty());
    }

    #[test]
    fn sources_are_independent() {
        let mut t = InputTracker::new();
        keyboard(&mut t, TargetSet::USB, &[KEY_A]);
        assert_eq!(keyboard(&mut t, TargetSet::BLE, &[KEY_A]), [key(KEY_A, true)]);
        assert_eq!(keyboard(&mut t, TargetSet::USB, &[]), [key(KEY_A, false)]);
    }

    #[test]
    fn rollover_codes_are_ignored() {
        let mut t = InputTracker::new();
        assert!(keyboard(&mut t, TargetSet::USB, &[0x01, 0x01, 0x01]).is_empty());
    }

    #[test]
    fn multi_bit_source_is_rejected() {
        let mut t = InputTracker::new();
        let res = t.handle_keyboard(TargetSet::ALL, &KeyboardReport::empty(), |_| {});
        assert_eq!(res, Err(Error::InvalidArgument));
    }

    #[test]
    fn mouse_accumulates_and_reports_buttons() {
        let mut t = InputTracker::new();
        let mut events = Vec::new();
        let report = MouseReport {
            buttons: 0b01,
            x: 10,
            y: -5,
            ..MouseReport::empty()
        };
        t.handle_mouse(TargetSet::BLE, &report, |e| events.push(e)).unwrap();
        t.handle_mouse(TargetSet::BLE, &MouseReport { x: 2, y: 0, ..report }, |e| {
            events.push(e)
        })
        .unwrap();
        t.handle_mouse(TargetSet::BLE, &MouseReport::empty(), |e| events.push(e))
            .unwrap();
        assert_eq!(
            events,
            [
                InputEvent::Motion { x: 10, y: -5, dx: 10, dy: -5 },
                InputEvent::Button { mask: 1, pressed: true },
                InputEvent::Motion { x: 12, y: -5, dx: 2, dy: 0 },
                InputEvent::Button { mask: 1, pressed: false },
            ]
        );
    }

    #[test]
    fn relative_position_wraps_instead_of_overflowing() {
        let mut t = InputTracker::new();
        let index = TargetSet::BLE.single_index().unwrap();
        t.sources[index].x = i32::MAX;
        t.sources[index].y = i32::MIN;
        let mut events = Vec::new();
        let report = MouseReport {
            x: 1,
            y: -1,
            ..MouseReport::empty()
        };
        t.handle_mouse(TargetSet::BLE, &report, |e| events.push(e)).unwrap();
        assert_eq!(
            events,
            [InputEvent::Motion { x: i32::MIN, y: i32::MAX, dx: 1, dy: -1 }]
        );
    }

    #[test]
    fn absolute_mouse_first_report_does_not_move() {
        let mut t = InputTracker::new();
        let mut events = Vec::new();
        let report = AbsMouseReport {
            x: 100,
            y: 200,
            ..AbsMouseReport::default()
        };
        t.handle_abs_mouse(TargetSet::SCREEN, &report, |e| events.push(e)).unwrap();
        assert!(events.is_empty());
        let moved = AbsMouseReport { x: 90, ..report };
        t.handle_abs_mouse(TargetSet::SCREEN, &moved, |e| events.push(e)).unwrap();
        assert_eq!(events, [InputEvent::Motion { x: 90, y: 200, dx: -10, dy: 0 }]);
    }
}
