//! ASCII / key name ↔ HID keycode translation.
//!
//! Three static tables: named special keys, printable ASCII with its
//! shifted counterpart, and modifier names. Nothing here allocates; all
//! strings are `heapless` and truncate when full.

use core::fmt::Write;

use heapless::{String, Vec};

use super::keyboard::{add_shift, has_shift};
use super::mouse::BUTTON_NAMES;

pub const KEY_NONE: u8 = 0x00;
/// Highest reserved error code; real keys are above it.
pub const KEY_ERROR_UNDEFINED: u8 = 0x03;
pub const KEY_A: u8 = 0x04;
pub const KEY_Z: u8 = 0x1D;
pub const KEY_1: u8 = 0x1E;
pub const KEY_2: u8 = 0x1F;
pub const KEY_3: u8 = 0x20;
pub const KEY_4: u8 = 0x21;
pub const KEY_5: u8 = 0x22;
pub const KEY_6: u8 = 0x23;
pub const KEY_7: u8 = 0x24;
pub const KEY_8: u8 = 0x25;
pub const KEY_9: u8 = 0x26;
pub const KEY_0: u8 = 0x27;
pub const KEY_ENTER: u8 = 0x28;
pub const KEY_ESCAPE: u8 = 0x29;
pub const KEY_BACKSPACE: u8 = 0x2A;
pub const KEY_TAB: u8 = 0x2B;
pub const KEY_SPACE: u8 = 0x2C;
pub const KEY_MINUS: u8 = 0x2D;
pub const KEY_EQUAL: u8 = 0x2E;
pub const KEY_BRACKET_LEFT: u8 = 0x2F;
pub const KEY_BRACKET_RIGHT: u8 = 0x30;
pub const KEY_BACKSLASH: u8 = 0x31;
pub const KEY_EUROPE_1: u8 = 0x32;
pub const KEY_SEMICOLON: u8 = 0x33;
pub const KEY_APOSTROPHE: u8 = 0x34;
pub const KEY_GRAVE: u8 = 0x35;
pub const KEY_COMMA: u8 = 0x36;
pub const KEY_PERIOD: u8 = 0x37;
pub const KEY_SLASH: u8 = 0x38;
pub const KEY_CAPS_LOCK: u8 = 0x39;
pub const KEY_F1: u8 = 0x3A;
pub const KEY_F12: u8 = 0x45;
pub const KEY_PRINT_SCREEN: u8 = 0x46;
pub const KEY_SCROLL_LOCK: u8 = 0x47;
pub const KEY_PAUSE: u8 = 0x48;
pub const KEY_INSERT: u8 = 0x49;
pub const KEY_HOME: u8 = 0x4A;
pub const KEY_PAGE_UP: u8 = 0x4B;
pub const KEY_DELETE: u8 = 0x4C;
pub const KEY_END: u8 = 0x4D;
pub const KEY_PAGE_DOWN: u8 = 0x4E;
pub const KEY_ARROW_RIGHT: u8 = 0x4F;
pub const KEY_ARROW_LEFT: u8 = 0x50;
pub const KEY_ARROW_DOWN: u8 = 0x51;
pub const KEY_ARROW_UP: u8 = 0x52;
pub const KEY_NUM_LOCK: u8 = 0x53;
pub const KEY_MENU: u8 = 0x65;
pub const KEY_POWER: u8 = 0x66;
pub const KEY_MUTE: u8 = 0x7F;
pub const KEY_VOLUME_UP: u8 = 0x80;
pub const KEY_VOLUME_DOWN: u8 = 0x81;
pub const KEY_CANCEL: u8 = 0x9B;

/// Named keys that have no single printable character.
pub static SPECIAL_KEYS: [(u8, &str); 26] = [
    (KEY_HOME, "Home"),
    (KEY_END, "End"),
    (KEY_BACKSPACE, "Backspace"),
    (KEY_TAB, "Tab"),
    (KEY_ENTER, "Enter"),
    (KEY_ARROW_UP, "Up"),
    (KEY_ARROW_DOWN, "Down"),
    (KEY_ARROW_RIGHT, "Right"),
    (KEY_ARROW_LEFT, "Left"),
    (KEY_CANCEL, "Cancel"),
    (KEY_ESCAPE, "Escape"),
    (KEY_SPACE, "Space"),
    (KEY_DELETE, "Delete"),
    (KEY_CAPS_LOCK, "CapsLock"),
    (KEY_SCROLL_LOCK, "ScrLock"),
    (KEY_NUM_LOCK, "NumLock"),
    (KEY_PRINT_SCREEN, "PrtScn"),
    (KEY_PAUSE, "Pause"),
    (KEY_MUTE, "VolumeMute"),
    (KEY_VOLUME_DOWN, "VolumeDown"),
    (KEY_VOLUME_UP, "VolumeUp"),
    (KEY_PAGE_UP, "PageUp"),
    (KEY_PAGE_DOWN, "PageDown"),
    (KEY_INSERT, "Insert"),
    (KEY_MENU, "Menu"),
    (KEY_POWER, "Power"),
];

/// Printable keys: keycode, plain character, shifted character.
pub static NORMAL_KEYS: [(u8, char, char); 23] = [
    (KEY_1, '1', '!'),
    (KEY_2, '2', '@'),
    (KEY_3, '3', '#'),
    (KEY_4, '4', '$'),
    (KEY_5, '5', '%'),
    (KEY_6, '6', '^'),
    (KEY_7, '7', '&'),
    (KEY_8, '8', '*'),
    (KEY_9, '9', '('),
    (KEY_0, '0', ')'),
    (KEY_SPACE, ' ', ' '),
    (KEY_MINUS, '-', '_'),
    (KEY_EQUAL, '=', '+'),
    (KEY_BRACKET_LEFT, '[', '{'),
    (KEY_BRACKET_RIGHT, ']', '}'),
    (KEY_BACKSLASH, '\\', '|'),
    (KEY_EUROPE_1, '\\', '|'),
    (KEY_SEMICOLON, ';', ':'),
    (KEY_APOSTROPHE, '\'', '"'),
    (KEY_GRAVE, '`', '~'),
    (KEY_COMMA, ',', '<'),
    (KEY_PERIOD, '.', '>'),
    (KEY_SLASH, '/', '?'),
];

/// Modifier names. The first eight map to bits 0-7, the side-less
/// aliases to the left-hand bit.
pub static MODIFIER_NAMES: [&str; 12] = [
    "L-Ctrl", "L-Shift", "L-Alt", "L-Meta", "R-Ctrl", "R-Shift", "R-Alt", "R-Meta", "Ctrl",
    "Shift", "Alt", "Meta",
];

/// Modifier bit for a case-insensitive name, `0` if `token` is not one.
pub fn modifier_from_name(token: &str) -> u8 {
    MODIFIER_NAMES
        .iter()
        .position(|n| n.eq_ignore_ascii_case(token))
        .map(|i| 1 << (i % 8))
        .unwrap_or(0)
}

/// Single-character token, if `token` is exactly one char.
fn single_char(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Function key `F1`..`F12` (either case).
fn function_key(token: &str) -> Option<u8> {
    let rest = token.strip_prefix('F').or_else(|| token.strip_prefix('f'))?;
    match rest.parse::<u8>() {
        Ok(n @ 1..=12) => Some(KEY_F1 + n - 1),
        _ => None,
    }
}

/// Translate a `|`-separated key expression into a modifier mask and up
/// to six keycodes, e.g. `"Ctrl|Alt|Delete"` or `"Shift|a"`.
///
/// Each token is tried against modifier names, `F1`-`F12`, the special
/// key names, the printable table (shifted characters add shift), then
/// `a`-`z` / `A`-`Z` (upper case adds shift). Unknown tokens are skipped.
/// A leading `|` stands for the `|` character itself.
pub fn str_to_keycodes(s: &str) -> (u8, Vec<u8, 6>) {
    let mut modifier = 0u8;
    let mut keys: Vec<u8, 6> = Vec::new();
    if s.starts_with('|') {
        let _ = keys.push(KEY_BACKSLASH);
        modifier = add_shift(modifier);
    }
    for token in s.split('|').filter(|t| !t.is_empty()) {
        if keys.is_full() {
            break;
        }
        let m = modifier_from_name(token);
        if m != 0 {
            modifier |= m;
            continue;
        }
        if let Some(code) = function_key(token) {
            let _ = keys.push(code);
            continue;
        }
        if let Some(&(code, _)) = SPECIAL_KEYS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(token))
        {
            let _ = keys.push(code);
            continue;
        }
        let Some(c) = single_char(token) else {
            continue;
        };
        if let Some(&(code, _, _)) = NORMAL_KEYS.iter().find(|(_, p, _)| *p == c) {
            let _ = keys.push(code);
        } else if let Some(&(code, _, _)) = NORMAL_KEYS.iter().find(|(_, _, s)| *s == c) {
            let _ = keys.push(code);
            modifier = add_shift(modifier);
        } else if c.is_ascii_lowercase() {
            let _ = keys.push(KEY_A + (c as u8 - b'a'));
        } else if c.is_ascii_uppercase() {
            let _ = keys.push(KEY_A + (c as u8 - b'A'));
            modifier = add_shift(modifier);
        }
    }
    (modifier, keys)
}

/// Human-readable name of one keycode: a letter (upper case with shift),
/// `F1`-`F12`, the printable character, `<Name>` for special keys, or
/// `<0xHH>`.
pub fn keycode_to_str(code: u8, modifier: u8) -> String<16> {
    let shift = has_shift(modifier);
    let mut out = String::new();
    if (KEY_A..=KEY_Z).contains(&code) {
        let base = if shift { b'A' } else { b'a' };
        let _ = out.push((base + code - KEY_A) as char);
    } else if (KEY_F1..=KEY_F12).contains(&code) {
        let _ = write!(out, "F{}", code - KEY_F1 + 1);
    } else if let Some(&(_, plain, shifted)) = NORMAL_KEYS.iter().find(|(k, _, _)| *k == code) {
        let _ = out.push(if shift { shifted } else { plain });
    } else if let Some(&(_, name)) = SPECIAL_KEYS.iter().find(|(k, _)| *k == code) {
        let _ = write!(out, "<{}>", name);
    } else {
        let _ = write!(out, "<0x{:02X}>", code);
    }
    out
}

/// Keycodes joined with `" | "`, stopping at the first empty slot.
pub fn keycodes_to_str(keycodes: &[u8], modifier: u8) -> String<64> {
    let mut out = String::new();
    for (i, &code) in keycodes.iter().take_while(|&&k| k != KEY_NONE).enumerate() {
        if i > 0 {
            let _ = out.push_str(" | ");
        }
        let _ = out.push_str(&keycode_to_str(code, modifier));
    }
    out
}

/// Names of the set modifier bits joined with `" | "`.
pub fn modifier_to_str(modifier: u8) -> String<64> {
    join_bits(modifier, &MODIFIER_NAMES[..8])
}

/// Names of the set mouse buttons joined with `" | "`.
pub fn buttons_to_str(buttons: u8) -> String<64> {
    join_bits(buttons, &BUTTON_NAMES)
}

fn join_bits(bits: u8, names: &[&str]) -> String<64> {
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        if bits & (1 << i) == 0 {
            continue;
        }
        if !out.is_empty() {
            let _ = out.push_str(" | ");
        }
        let _ = out.push_str(name);
    }
    out
}
