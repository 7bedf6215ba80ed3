//! Bluetooth operating modes and the status snapshot reported for them.

use core::fmt;

use heapless::{String, Vec};

use crate::config::{MAX_BONDED, NAME_MAX_LEN};
use crate::gap::BdAddr;
use crate::radio::Technology;
use crate::Error;

/// A mode that owns the radio through one transport adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveMode {
    /// HID device over Bluetooth Classic.
    BtClassicHidDevice,
    /// HID device over GATT.
    BleHidDevice,
    /// HID host over GATT.
    BleHidHost,
}

impl ActiveMode {
    pub const ALL: [ActiveMode; 3] = [
        ActiveMode::BtClassicHidDevice,
        ActiveMode::BleHidDevice,
        ActiveMode::BleHidHost,
    ];

    /// Persisted name.
    pub const fn name(&self) -> &'static str {
        match self {
            ActiveMode::BtClassicHidDevice => "BT_HIDD",
            ActiveMode::BleHidDevice => "BLE_HIDD",
            ActiveMode::BleHidHost => "BLE_HIDH",
        }
    }

    /// Case-insensitive lookup by persisted name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    pub const fn technology(&self) -> Technology {
        match self {
            ActiveMode::BtClassicHidDevice => Technology::Classic,
            ActiveMode::BleHidDevice | ActiveMode::BleHidHost => Technology::Ble,
        }
    }

    /// Device role: the peer is a HID host.
    pub const fn is_server(&self) -> bool {
        !self.is_client()
    }

    /// Host role: the peer is a HID device.
    pub const fn is_client(&self) -> bool {
        matches!(self, ActiveMode::BleHidHost)
    }
}

impl fmt::Display for ActiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-wide Bluetooth mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    BtClassicHidDevice,
    BleHidDevice,
    BleHidHost,
    /// Bluetooth is software blocked.
    Disabled,
    /// Not yet set from persisted configuration.
    #[default]
    Uninitialized,
    /// The stack must restart before the carried mode can start.
    PendingReboot(ActiveMode),
    /// The last init failed; the radio is in an unknown state.
    Failed(Error),
}

impl Mode {
    /// The adapter-backed mode, if any.
    pub const fn active(&self) -> Option<ActiveMode> {
        match self {
            Mode::BtClassicHidDevice => Some(ActiveMode::BtClassicHidDevice),
            Mode::BleHidDevice => Some(ActiveMode::BleHidDevice),
            Mode::BleHidHost => Some(ActiveMode::BleHidHost),
            _ => None,
        }
    }

    /// Runs on the Classic controller.
    pub const fn is_bt(&self) -> bool {
        matches!(self, Mode::BtClassicHidDevice)
    }

    /// Runs on the BLE controller.
    pub const fn is_ble(&self) -> bool {
        matches!(self, Mode::BleHidDevice | Mode::BleHidHost)
    }

    pub const fn is_server(&self) -> bool {
        matches!(self, Mode::BtClassicHidDevice | Mode::BleHidDevice)
    }

    pub const fn is_client(&self) -> bool {
        matches!(self, Mode::BleHidHost)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Mode::BtClassicHidDevice => "BT_HIDD",
            Mode::BleHidDevice => "BLE_HIDD",
            Mode::BleHidHost => "BLE_HIDH",
            Mode::Disabled => "DISABLED",
            Mode::Uninitialized => "UNINIT",
            Mode::PendingReboot(_) => "PENDING",
            Mode::Failed(_) => "FAILED",
        }
    }
}

impl From<ActiveMode> for Mode {
    fn from(mode: ActiveMode) -> Self {
        match mode {
            ActiveMode::BtClassicHidDevice => Mode::BtClassicHidDevice,
            ActiveMode::BleHidDevice => Mode::BleHidDevice,
            ActiveMode::BleHidHost => Mode::BleHidHost,
        }
    }
}

impl TryFrom<Mode> for ActiveMode {
    type Error = Error;

    fn try_from(mode: Mode) -> Result<Self, Error> {
        mode.active().ok_or(Error::InvalidArgument)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::PendingReboot(target) => write!(f, "PENDING({})", target),
            Mode::Failed(e) => write!(f, "FAILED({})", e),
            other => f.write_str(other.name()),
        }
    }
}

/// Connectable / discoverable flags of the local device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Visibility {
    pub connectable: bool,
    pub discoverable: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            connectable: true,
            discoverable: true,
        }
    }
}

/// Snapshot returned by `status()`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeStatus {
    pub mode: Mode,
    pub visibility: Visibility,
    /// The adapter finished registering with the stack.
    pub enabled: bool,
    pub connected: bool,
    pub peer: Option<BdAddr>,
    pub peer_name: String<NAME_MAX_LEN>,
    /// Bonded peers; empty for the host role.
    pub bonded: Vec<BdAddr, MAX_BONDED>,
    /// Battery level last reported by a connected HID peripheral.
    pub peer_battery: Option<u8>,
}

impl ModeStatus {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            visibility: Visibility::default(),
            enabled: false,
            connected: false,
            peer: None,
            peer_name: String::new(),
            bonded: Vec::new(),
            peer_battery: None,
        }
    }
}

impl fmt::Display for ModeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(
            f,
            "Connectable: {}, Discoverable: {}",
            self.visibility.connectable, self.visibility.discoverable
        )?;
        if self.mode.is_server() {
            writeln!(f, "Enabled: {}", self.enabled)?;
            for addr in self.bonded.iter() {
                if Some(*addr) == self.peer && self.connected {
                    writeln!(f, "* {} {}", addr, self.peer_name)?;
                } else {
                    writeln!(f, "  {}", addr)?;
                }
            }
        }
        match self.peer.filter(|_| self.connected) {
            Some(addr) if self.mode.is_client() => {
                writeln!(f, "Connected to {} {}", addr, self.peer_name)
            }
            Some(_) => Ok(()),
            None if self.mode.active().is_some() => writeln!(f, "Not connected"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_case_insensitively() {
        assert_eq!(ActiveMode::from_name("ble_hidd"), Some(ActiveMode::BleHidDevice));
        assert_eq!(ActiveMode::from_name("BT_HIDD"), Some(ActiveMode::BtClassicHidDevice));
        assert_eq!(ActiveMode::from_name("BLE"), None);
    }

    #[test]
    fn only_active_modes_convert() {
        assert_eq!(ActiveMode::try_from(Mode::BleHidHost), Ok(ActiveMode::BleHidHost));
        assert_eq!(ActiveMode::try_from(Mode::Disabled), Err(Error::InvalidArgument));
        assert_eq!(
            ActiveMode::try_from(Mode::PendingReboot(ActiveMode::BleHidHost)),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn role_predicates() {
        assert!(Mode::BtClassicHidDevice.is_bt());
        assert!(Mode::BleHidHost.is_ble() && Mode::BleHidHost.is_client());
        assert!(Mode::BleHidDevice.is_server());
        assert!(!Mode::Uninitialized.is_ble() && !Mode::Uninitialized.is_bt());
    }

    #[test]
    fn status_marks_connected_bonded_peer() {
        let peer = BdAddr([1, 2, 3, 4, 5, 6]);
        let mut status = ModeStatus::new(Mode::BtClassicHidDevice);
        status.enabled = true;
        status.connected = true;
        status.peer = Some(peer);
        let _ = status.peer_name.push_str("Laptop");
        let _ = status.bonded.push(BdAddr([9; 6]));
        let _ = status.bonded.push(peer);

        let text = std::format!("{}", status);
        assert!(text.contains("Mode: BT_HIDD"));
        assert!(text.contains("* 01:02:03:04:05:06 Laptop"));
        assert!(text.contains("  09:09:09:09:09:09"));
        assert!(!text.contains("Not connected"));
    }

    #[test]
    fn pending_reboot_display() {
        let mode = Mode::PendingReboot(ActiveMode::BtClassicHidDevice);
        assert_eq!(std::format!("{}", mode), "PENDING(BT_HIDD)");
    }
}
