//! Crate-wide constants and runtime configuration.
//!
//! Radio timing, capacities and protocol constants live here so they can
//! be tuned in one place. [`Config`] carries the values a board or test
//! supplies at start-up.

use embassy_time::Duration;
use heapless::String;

use crate::hid::gamepad::GamepadLayout;

// Classic inquiry

/// One classic inquiry length unit (ms).
pub const INQUIRY_UNIT_MS: u64 = 1280;

/// Legal classic inquiry length range (in 1.28 s units).
pub const INQUIRY_LEN_MIN: u8 = 0x01;
pub const INQUIRY_LEN_MAX: u8 = 0x30;

/// Inquiry length used when the caller passes no timeout (12.8 s).
pub const INQUIRY_LEN_DEFAULT: u8 = 10;

/// Settle time after cancelling an in-flight discovery (ms).
pub const DISCOVERY_CANCEL_SETTLE_MS: u64 = 10;

// BLE scan / advertising

/// Upper bound of one BLE scan (seconds).
pub const BLE_SCAN_MAX_SECS: u32 = 50;

/// BLE scan duration used when the caller passes no timeout (seconds).
pub const BLE_SCAN_DEFAULT_SECS: u32 = 10;

/// BLE active scan interval and window (0.625 ms units).
pub const BLE_SCAN_INTERVAL: u16 = 0x50;
pub const BLE_SCAN_WINDOW: u16 = 0x30;

/// BLE advertising interval range (0.625 ms units).
pub const BLE_ADV_INTERVAL_MIN: u16 = 0x20;
pub const BLE_ADV_INTERVAL_MAX: u16 = 0x30;

/// Advertising flags: LE general discoverable, BR/EDR not supported.
pub const BLE_ADV_FLAGS: u8 = 0x06;

/// GAP appearance values.
pub const APPEARANCE_HID_GENERIC: u16 = 0x03C0;
pub const APPEARANCE_HID_GAMEPAD: u16 = 0x03C4;

/// HID service UUID (16-bit form).
pub const HID_SERVICE_UUID16: u16 = 0x1812;

/// Class of device: major "Peripheral", minor "combo keyboard/pointing".
pub const COD_MAJOR_PERIPHERAL: u8 = 0x05;
pub const COD_MINOR_COMBO: u8 = 0xC0;

// Pairing

/// Legacy PIN replied to classic PIN requests.
pub const PIN_CODE: &[u8] = b"1234";

/// Length of the all-zero PIN used when the peer demands 16 digits.
pub const PIN_CODE_SECURE_LEN: usize = 16;

/// Static passkey for BLE pairing.
pub const BLE_STATIC_PASSKEY: u32 = 1234;

/// Maximum BLE encryption key size.
pub const BLE_MAX_KEY_SIZE: u8 = 16;

// Capacities

/// Maximum number of devices kept in the registry during one scan.
pub const REGISTRY_CAPACITY: usize = 32;

/// Maximum stored device name length (bytes).
pub const NAME_MAX_LEN: usize = 63;

/// Depth of the radio event queue.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Maximum number of bonded peers reported by the stack.
pub const MAX_BONDED: usize = 8;

/// Maximum advertisement / EIR payload carried by one discovery event.
pub const ADV_DATA_MAX: usize = 240;

/// Maximum peer report map parsed on a host-side open.
pub const REPORT_MAP_MAX: usize = 512;

/// Largest inbound input/output report carried by one event.
pub const INPUT_REPORT_MAX: usize = 64;

// Persisted configuration

/// Store key of the desired mode at boot.
pub const KEY_BT_MODE: &str = "sys.bt.mode";

/// Store key of the discoverability default.
pub const KEY_BT_SCAN: &str = "sys.bt.scan";

/// Maximum length of a persisted value.
pub const STORE_VALUE_MAX: usize = 32;

// Report fan-out

/// Release delay of a system control press (ms).
pub const SYSTEM_CONTROL_HOLD_MS: u64 = 50;

/// Default USB identity when no vendor profile is selected.
pub const USB_VID: u16 = 0xCAFE;
pub const USB_PID: u16 = 0x4000;

/// USB HID polling interval (ms).
pub const USB_HID_POLL_MS: u8 = 1;

/// Time the arbiter waits for a radio stack acknowledgement.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(3000);

/// Runtime configuration supplied by the board at start-up.
#[derive(Clone, Debug)]
pub struct Config {
    /// Device name prefix advertised to peers.
    pub name: String<32>,
    /// Unique id suffix (usually derived from the MAC).
    pub uid: String<16>,
    /// Gamepad layout of the HID profile; `None` disables gamepad reports.
    pub layout: Option<GamepadLayout>,
    /// How long `init` waits for the stack to acknowledge registration.
    pub ack_timeout: Duration,
    /// Reply 16-digit PINs with zeros instead of the short PIN.
    pub secure_pin: bool,
}

impl Config {
    /// Configuration with a device name and unique id.
    pub fn new(name: &str, uid: &str) -> Self {
        let mut config = Self::default();
        config.name.clear();
        crate::push_truncated(&mut config.name, name);
        crate::push_truncated(&mut config.uid, uid);
        config
    }

    /// Select the gamepad layout.
    pub fn with_layout(mut self, layout: Option<GamepadLayout>) -> Self {
        self.layout = layout;
        self
    }

    /// Override the acknowledgement timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Device name as advertised: `NAME-UID`, or `NAME-LAYOUT` for a
    /// vendor gamepad layout.
    pub fn device_name(&self) -> String<64> {
        let mut out: String<64> = String::new();
        crate::push_truncated(&mut out, &self.name);
        let _ = out.push('-');
        match self.layout {
            Some(layout) if layout != GamepadLayout::General => {
                crate::push_truncated(&mut out, layout.name())
            }
            _ => crate::push_truncated(&mut out, &self.uid),
        }
        out
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut name = String::new();
        let _ = name.push_str("bthid");
        Self {
            name,
            uid: String::new(),
            layout: Some(GamepadLayout::General),
            ack_timeout: ACK_TIMEOUT,
            secure_pin: false,
        }
    }
}
