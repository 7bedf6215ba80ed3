//! Advertisement / EIR payload parsing.
//!
//! Both payloads are a sequence of `len, type, data[len - 1]` structures.
//! A malformed structure ends the walk; whatever was found before it
//! stays valid.

use heapless::String;

use super::Uuid;
use crate::config::HID_SERVICE_UUID16;

pub const AD_FLAGS: u8 = 0x01;
pub const AD_UUID16_INCOMPLETE: u8 = 0x02;
pub const AD_UUID16_COMPLETE: u8 = 0x03;
pub const AD_UUID32_COMPLETE: u8 = 0x05;
pub const AD_UUID128_COMPLETE: u8 = 0x07;
pub const AD_NAME_SHORT: u8 = 0x08;
pub const AD_NAME_COMPLETE: u8 = 0x09;
pub const AD_TX_POWER: u8 = 0x0A;
pub const AD_APPEARANCE: u8 = 0x19;

/// First structure of type `ad_type`.
pub fn find_field(data: &[u8], ad_type: u8) -> Option<&[u8]> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        if data[i + 1] == ad_type {
            return Some(&data[i + 2..i + 1 + len]);
        }
        i += len + 1;
    }
    None
}

/// Look up a "complete" type, falling back to the type one below it
/// (the incomplete/shortened variant). With a non-zero `width` the field
/// must be exactly that long, otherwise it must be non-empty.
pub fn resolve(data: &[u8], complete: u8, width: usize) -> Option<&[u8]> {
    let field = find_field(data, complete).or_else(|| find_field(data, complete.wrapping_sub(1)))?;
    let fits = if width == 0 {
        !field.is_empty()
    } else {
        field.len() == width
    };
    fits.then_some(field)
}

/// Local name, truncated to `N` bytes on a character boundary.
pub fn device_name<const N: usize>(data: &[u8]) -> Option<String<N>> {
    let raw = resolve(data, AD_NAME_COMPLETE, 0)?;
    let text = match core::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).ok()?,
    };
    let mut name = String::new();
    for c in text.chars() {
        if name.push(c).is_err() {
            break;
        }
    }
    (!name.is_empty()).then_some(name)
}

/// A single advertised 16-bit service UUID.
pub fn service_uuid16(data: &[u8]) -> Option<u16> {
    resolve(data, AD_UUID16_COMPLETE, 2).map(|f| u16::from_le_bytes([f[0], f[1]]))
}

pub fn appearance(data: &[u8]) -> Option<u16> {
    let field = find_field(data, AD_APPEARANCE)?;
    (field.len() == 2).then(|| u16::from_le_bytes([field[0], field[1]]))
}

/// First service UUID in an EIR payload, trying 16, 32 then 128 bits.
pub fn eir_service_uuid(data: &[u8]) -> Option<Uuid> {
    [
        (AD_UUID16_COMPLETE, 2),
        (AD_UUID32_COMPLETE, 4),
        (AD_UUID128_COMPLETE, 16),
    ]
    .iter()
    .find_map(|&(ad_type, width)| resolve(data, ad_type, width))
    .and_then(Uuid::from_le_bytes)
}

/// Check if raw advertisement data lists the HID Service UUID (0x1812)
/// anywhere in its 16-bit UUID lists.
pub fn contains_hid_service_uuid(data: &[u8]) -> bool {
    let hid_uuid_le = HID_SERVICE_UUID16.to_le_bytes();

    [AD_UUID16_INCOMPLETE, AD_UUID16_COMPLETE].iter().any(|&ad_type| {
        find_field(data, ad_type)
            .map(|uuids| uuids.chunks_exact(2).any(|chunk| chunk == hid_uuid_le))
            .unwrap_or(false)
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
