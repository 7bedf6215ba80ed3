//! Gamepad state and its per-layout wire packings.
//!
//! [`GamepadState`] is the layout-independent model that builders mutate.
//! [`GamepadState::pack`] turns it into the [`GamepadReport`] the selected
//! HID profile advertises:
//!
//! ```text
//! bits    : 15  14  13  12   11    10    9    8     7  6  5  4  3 2 1 0
//! state   : L   D   R   U    Share Home  Next Prev  RS LS RB LB Y X B A
//! xinput  : -   RS  LS  XBox Start Select -   -     RB LB -  Y  X - B A
//! switch  : -   -   Cap Home RS    LS    Plus Minus ZR ZL R  L  Y X B A
//! dsense  : -   -   Pad Home R3    L3    Opt  Share R2 L2 R1 L1 T C C S
//! ```

use crate::Error;

pub const BUTTON_A: u16 = 1 << 0;
pub const BUTTON_B: u16 = 1 << 1;
pub const BUTTON_X: u16 = 1 << 2;
pub const BUTTON_Y: u16 = 1 << 3;
/// Left shoulder.
pub const BUTTON_LB: u16 = 1 << 4;
/// Right shoulder.
pub const BUTTON_RB: u16 = 1 << 5;
/// Left stick press.
pub const BUTTON_LS: u16 = 1 << 6;
/// Right stick press.
pub const BUTTON_RS: u16 = 1 << 7;
/// Back / select.
pub const BUTTON_PREV: u16 = 1 << 8;
/// Start.
pub const BUTTON_NEXT: u16 = 1 << 9;
pub const BUTTON_HOME: u16 = 1 << 10;
pub const BUTTON_SHARE: u16 = 1 << 11;
pub const BUTTON_UP: u16 = 1 << 12;
pub const BUTTON_RIGHT: u16 = 1 << 13;
pub const BUTTON_DOWN: u16 = 1 << 14;
pub const BUTTON_LEFT: u16 = 1 << 15;

/// Mask of the four direction buttons.
pub const DPAD_BUTTONS: u16 = 0xF000;

/// Names accepted by named clicks. Indices 0-15 are button bits, 16-19
/// the diagonal hat directions.
pub const CLICK_NAMES: [&str; 20] = [
    "A", "B", "X", "Y", "LB", "RB", "LS", "RS", "PREV", "NEXT", "HOME", "SHARE", "U", "R", "D",
    "L", "UR", "DR", "DL", "UL",
];

/// Wire layout of the gamepad report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GamepadLayout {
    /// 16 buttons, 2 hats, 6 axes.
    General = 1,
    /// Microsoft XInput compatible.
    XInput,
    /// Nintendo Switch wireless.
    Switch,
    /// PlayStation DualSense.
    DualSense,
}

impl GamepadLayout {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::XInput => "XINPUT",
            Self::Switch => "SWITCH",
            Self::DualSense => "DSENSE",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::General, Self::XInput, Self::Switch, Self::DualSense]
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(name))
    }

    /// Gamepad report size in bytes for this layout.
    pub const fn report_size(&self) -> usize {
        match self {
            Self::General => 9,
            Self::XInput => 16,
            Self::Switch => 11,
            Self::DualSense => 9,
        }
    }
}

/// Hat switch direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Dpad {
    #[default]
    None = 0,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

const DPAD_MAP: [u16; 9] = [
    0,
    BUTTON_UP,
    BUTTON_UP | BUTTON_RIGHT,
    BUTTON_RIGHT,
    BUTTON_DOWN | BUTTON_RIGHT,
    BUTTON_DOWN,
    BUTTON_DOWN | BUTTON_LEFT,
    BUTTON_LEFT,
    BUTTON_UP | BUTTON_LEFT,
];

impl Dpad {
    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Up,
            2 => Self::UpRight,
            3 => Self::Right,
            4 => Self::DownRight,
            5 => Self::Down,
            6 => Self::DownLeft,
            7 => Self::Left,
            8 => Self::UpLeft,
            _ => Self::None,
        }
    }

    /// Direction button bits for this hat value.
    pub const fn to_buttons(self) -> u16 {
        DPAD_MAP[self as usize]
    }

    /// Hat value matching the direction bits of `buttons`.
    pub fn from_buttons(buttons: u16) -> Self {
        DPAD_MAP
            .iter()
            .position(|&bits| bits == buttons & DPAD_BUTTONS)
            .map(|i| Self::from_u8(i as u8))
            .unwrap_or(Self::None)
    }
}

/// How [`GamepadState::apply_buttons`] combines a button mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonAction {
    Release,
    Press,
    Toggle,
    /// Replace all buttons.
    Set,
}

/// Layout-independent gamepad state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GamepadState {
    /// Joysticks, `-32767..=32767`.
    pub lx: i16,
    pub ly: i16,
    pub rx: i16,
    pub ry: i16,
    /// Triggers, `0..=255`.
    pub lt: u8,
    pub rt: u8,
    /// Two 4-bit hats: low nibble first hat, high nibble second.
    pub dpad: u8,
    pub buttons: u16,
}

impl GamepadState {
    /// Combine `mask` into the buttons. Returns `false` when nothing changed.
    ///
    /// The first hat follows the resulting direction buttons.
    pub fn apply_buttons(&mut self, mask: u16, action: ButtonAction) -> bool {
        let next = match action {
            ButtonAction::Set => mask,
            ButtonAction::Press => self.buttons | mask,
            ButtonAction::Release => self.buttons & !mask,
            ButtonAction::Toggle => self.buttons ^ mask,
        };
        if next == self.buttons {
            return false;
        }
        self.buttons = next;
        self.dpad = Dpad::from_buttons(next) as u8 | (self.dpad & 0xF0);
        true
    }

    /// Set both hats; the direction buttons follow the first one.
    pub fn set_dpad(&mut self, first: Dpad, second: Dpad) {
        self.buttons = first.to_buttons() | (self.buttons & !DPAD_BUTTONS);
        self.dpad = (first as u8 & 0x0F) | ((second as u8 & 0x0F) << 4);
    }

    /// Pack into the wire report for `layout`.
    pub fn pack(&self, layout: GamepadLayout) -> GamepadReport {
        let b = self.buttons;
        let bits = |shift: u16, n: u16| (b >> shift) & ((1 << n) - 1);
        let offset = |v: i16| (v as i32 + 0x8000) as u16;
        match layout {
            GamepadLayout::General => GamepadReport::General {
                lx: scale_axis(self.lx),
                ly: scale_axis(self.ly),
                lz: (self.lt as i16 - 0x80) as i8,
                rx: scale_axis(self.rx),
                ry: scale_axis(self.ry),
                rz: (self.rt as i16 - 0x80) as i8,
                dpad: self.dpad,
                buttons: b,
            },
            GamepadLayout::XInput => GamepadReport::XInput {
                lx: offset(self.lx),
                ly: offset(self.ly),
                rx: offset(self.rx),
                ry: offset(self.ry),
                lt: (self.lt as u16) << 2,
                rt: (self.rt as u16) << 2,
                dpad: self.dpad & 0x0F,
                buttons: (b & 0x03)
                    | bits(2, 2) << 3
                    | bits(4, 2) << 6
                    | bits(8, 3) << 10
                    | bits(6, 2) << 13,
                share: (b & BUTTON_SHARE != 0) as u8,
            },
            GamepadLayout::Switch => GamepadReport::Switch {
                buttons: (b & 0x033F)
                    | if self.lt != 0 { 1 << 6 } else { 0 }
                    | if self.rt != 0 { 1 << 7 } else { 0 }
                    | bits(6, 2) << 10
                    | bits(10, 2) << 12,
                dpad: self.dpad & 0x0F,
                lx: offset(self.lx),
                ly: offset(self.ly),
                rx: offset(self.rx),
                ry: offset(self.ry),
            },
            GamepadLayout::DualSense => {
                let btns = bits(2, 1)
                    | bits(0, 1) << 1
                    | bits(1, 1) << 2
                    | bits(3, 1) << 3
                    | (b & 0x0330)
                    | if self.lt != 0 { 1 << 6 } else { 0 }
                    | if self.rt != 0 { 1 << 7 } else { 0 }
                    | bits(6, 2) << 10
                    | bits(10, 2) << 12;
                GamepadReport::DualSense {
                    lx: scale_axis(self.lx) as u8,
                    ly: scale_axis(self.ly) as u8,
                    rx: scale_axis(self.rx) as u8,
                    ry: scale_axis(self.ry) as u8,
                    // face buttons ride in the upper nibble of the hat byte
                    dpad: (self.dpad & 0x0F) | ((btns << 4) as u8),
                    buttons: btns >> 4,
                    lt: self.lt,
                    rt: self.rt,
                }
            }
        }
    }
}

fn scale_axis(v: i16) -> i8 {
    (v as i32 * 0x7F / 0x7FFF) as i8
}

/// Gamepad report in one of the supported wire layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GamepadReport {
    General {
        lx: i8,
        ly: i8,
        lz: i8,
        rx: i8,
        ry: i8,
        rz: i8,
        dpad: u8,
        buttons: u16,
    },
    XInput {
        lx: u16,
        ly: u16,
        rx: u16,
        ry: u16,
        /// 10-bit triggers.
        lt: u16,
        rt: u16,
        dpad: u8,
        buttons: u16,
        share: u8,
    },
    Switch {
        buttons: u16,
        dpad: u8,
        lx: u16,
        ly: u16,
        rx: u16,
        ry: u16,
    },
    DualSense {
        lx: u8,
        ly: u8,
        rx: u8,
        ry: u8,
        dpad: u8,
        buttons: u16,
        lt: u8,
        rt: u8,
    },
}

impl Default for GamepadReport {
    fn default() -> Self {
        GamepadState::default().pack(GamepadLayout::General)
    }
}

impl GamepadReport {
    pub const fn layout(&self) -> GamepadLayout {
        match self {
            Self::General { .. } => GamepadLayout::General,
            Self::XInput { .. } => GamepadLayout::XInput,
            Self::Switch { .. } => GamepadLayout::Switch,
            Self::DualSense { .. } => GamepadLayout::DualSense,
        }
    }

    pub const fn size(&self) -> usize {
        self.layout().report_size()
    }

    /// Parse raw bytes in the given layout.
    pub fn from_bytes(layout: GamepadLayout, data: &[u8]) -> Result<Self, Error> {
        if data.len() < layout.report_size() {
            return Err(Error::InvalidArgument);
        }
        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        Ok(match layout {
            GamepadLayout::General => Self::General {
                lx: data[0] as i8,
                ly: data[1] as i8,
                lz: data[2] as i8,
                rx: data[3] as i8,
                ry: data[4] as i8,
                rz: data[5] as i8,
                dpad: data[6],
                buttons: u16_at(7),
            },
            GamepadLayout::XInput => Self::XInput {
                lx: u16_at(0),
                ly: u16_at(2),
                rx: u16_at(4),
                ry: u16_at(6),
                lt: u16_at(8),
                rt: u16_at(10),
                dpad: data[12],
                buttons: u16_at(13),
                share: data[15],
            },
            GamepadLayout::Switch => Self::Switch {
                buttons: u16_at(0),
                dpad: data[2],
                lx: u16_at(3),
                ly: u16_at(5),
                rx: u16_at(7),
                ry: u16_at(9),
            },
            GamepadLayout::DualSense => Self::DualSense {
                lx: data[0],
                ly: data[1],
                rx: data[2],
                ry: data[3],
                dpad: data[4],
                buttons: u16_at(5),
                lt: data[7],
                rt: data[8],
            },
        })
    }

    /// Serialise into `buf`. Returns 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        let size = self.size();
        if buf.len() < size {
            return 0;
        }
        match *self {
            Self::General { lx, ly, lz, rx, ry, rz, dpad, buttons } => {
                buf[..6].copy_from_slice(&[lx as u8, ly as u8, lz as u8, rx as u8, ry as u8, rz as u8]);
                buf[6] = dpad;
                buf[7..9].copy_from_slice(&buttons.to_le_bytes());
            }
            Self::XInput { lx, ly, rx, ry, lt, rt, dpad, buttons, share } => {
                for (i, v) in [lx, ly, rx, ry, lt, rt].into_iter().enumerate() {
                    buf[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
                }
                buf[12] = dpad;
                buf[13..15].copy_from_slice(&buttons.to_le_bytes());
                buf[15] = share;
            }
            Self::Switch { buttons, dpad, lx, ly, rx, ry } => {
                buf[0..2].copy_from_slice(&buttons.to_le_bytes());
                buf[2] = dpad;
                for (i, v) in [lx, ly, rx, ry].into_iter().enumerate() {
                    buf[3 + i * 2..5 + i * 2].copy_from_slice(&v.to_le_bytes());
                }
            }
            Self::DualSense { lx, ly, rx, ry, dpad, buttons, lt, rt } => {
                buf[..5].copy_from_slice(&[lx, ly, rx, ry, dpad]);
                buf[5..7].copy_from_slice(&buttons.to_le_bytes());
                buf[7] = lt;
                buf[8] = rt;
            }
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_then_release_restores_state() {
        let mut pad = GamepadState::default();
        assert!(pad.apply_buttons(BUTTON_A | BUTTON_X, ButtonAction::Press));
        assert_eq!(pad.buttons, BUTTON_A | BUTTON_X);
        assert!(!pad.apply_buttons(BUTTON_A, ButtonAction::Press));
        assert!(pad.apply_buttons(BUTTON_A, ButtonAction::Release));
        assert_eq!(pad.buttons, BUTTON_X);
        assert!(pad.apply_buttons(BUTTON_X | BUTTON_Y, ButtonAction::Toggle));
        assert_eq!(pad.buttons, BUTTON_Y);
        assert!(pad.apply_buttons(BUTTON_HOME, ButtonAction::Set));
        assert_eq!(pad.buttons, BUTTON_HOME);
    }

    #[test]
    fn direction_buttons_drive_first_hat() {
        let mut pad = GamepadState::default();
        pad.dpad = 0x30;
        pad.apply_buttons(BUTTON_UP | BUTTON_RIGHT, ButtonAction::Press);
        assert_eq!(pad.dpad, 0x30 | Dpad::UpRight as u8);
    }

    #[test]
    fn set_dpad_updates_direction_buttons() {
        let mut pad = GamepadState::default();
        pad.buttons = BUTTON_A | BUTTON_LEFT;
        pad.set_dpad(Dpad::DownRight, Dpad::Up);
        assert_eq!(pad.buttons, BUTTON_A | BUTTON_DOWN | BUTTON_RIGHT);
        assert_eq!(pad.dpad, 0x14);
    }

    #[test]
    fn general_packing_scales_axes_and_centers_triggers() {
        let pad = GamepadState {
            lx: 0x7FFF,
            ly: -0x7FFF,
            lt: 0xFF,
            rt: 0,
            buttons: BUTTON_B,
            ..Default::default()
        };
        let mut buf = [0u8; 9];
        assert_eq!(pad.pack(GamepadLayout::General).serialize(&mut buf), 9);
        assert_eq!(buf[0] as i8, 127);
        assert_eq!(buf[1] as i8, -127);
        assert_eq!(buf[2] as i8, 127);
        assert_eq!(buf[5] as i8, -128);
        assert_eq!(&buf[7..9], &[0x02, 0x00]);
    }

    #[test]
    fn xinput_remaps_buttons() {
        let pad = GamepadState {
            buttons: BUTTON_X | BUTTON_LB | BUTTON_HOME | BUTTON_RS | BUTTON_SHARE,
            lt: 0xFF,
            ..Default::default()
        };
        match pad.pack(GamepadLayout::XInput) {
            GamepadReport::XInput { buttons, share, lt, lx, .. } => {
                assert_eq!(buttons, 1 << 3 | 1 << 6 | 1 << 12 | 1 << 14);
                assert_eq!(share, 1);
                assert_eq!(lt, 0x3FC);
                assert_eq!(lx, 0x8000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn switch_maps_triggers_to_zl_zr() {
        let pad = GamepadState {
            buttons: BUTTON_A | BUTTON_LS | BUTTON_HOME,
            rt: 1,
            ..Default::default()
        };
        match pad.pack(GamepadLayout::Switch) {
            GamepadReport::Switch { buttons, .. } => {
                assert_eq!(buttons, 1 | 1 << 7 | 1 << 10 | 1 << 12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn dualsense_moves_face_buttons_into_hat_byte() {
        let pad = GamepadState {
            buttons: BUTTON_A | BUTTON_NEXT,
            dpad: Dpad::Left as u8,
            ..Default::default()
        };
        match pad.pack(GamepadLayout::DualSense) {
            GamepadReport::DualSense { dpad, buttons, .. } => {
                // cross is bit 1 of the face nibble
                assert_eq!(dpad, 0x20 | Dpad::Left as u8);
                assert_eq!(buttons, BUTTON_NEXT >> 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn layout_names_are_case_insensitive() {
        assert_eq!(GamepadLayout::from_name("dsense"), Some(GamepadLayout::DualSense));
        assert_eq!(GamepadLayout::from_name("xbox"), None);
    }

    #[test]
    fn parse_matches_serialize_for_switch() {
        let report = GamepadState { lx: 100, buttons: BUTTON_B, ..Default::default() }
            .pack(GamepadLayout::Switch);
        let mut buf = [0u8; 16];
        let n = report.serialize(&mut buf);
        assert_eq!(n, 11);
        assert_eq!(GamepadReport::from_bytes(GamepadLayout::Switch, &buf[..n]), Ok(report));
    }
}
