//! Device registry: every peer seen during the current scan session.
//!
//! Records are keyed by address. A discovery event rarely carries all
//! properties, so each event is folded into the existing record: fields
//! the event carries overwrite, fields it lacks are left alone.

use heapless::{String, Vec};

use super::{BdAddr, BleAddrType, DeviceDetails, DiscoveredDevice, TransportKind, Uuid};
use crate::config::{NAME_MAX_LEN, REGISTRY_CAPACITY};
use crate::Error;

/// Properties carried by one discovery event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub kind: TransportKind,
    pub addr: BdAddr,
    pub name: Option<String<NAME_MAX_LEN>>,
    pub rssi: Option<i8>,
    pub cod: Option<u32>,
    pub uuid: Option<Uuid>,
    pub service_uuid16: Option<u16>,
    pub appearance: Option<u16>,
    pub addr_type: Option<BleAddrType>,
}

impl DeviceUpdate {
    pub fn new(kind: TransportKind, addr: BdAddr) -> Self {
        Self {
            kind,
            addr,
            name: None,
            rssi: None,
            cod: None,
            uuid: None,
            service_uuid16: None,
            appearance: None,
            addr_type: None,
        }
    }

    /// Set the name from a string, truncated to the storage bound.
    pub fn with_name(mut self, name: &str) -> Self {
        let mut stored = String::new();
        crate::push_truncated(&mut stored, name);
        self.name = Some(stored);
        self
    }

    pub fn with_rssi(mut self, rssi: i8) -> Self {
        self.rssi = Some(rssi);
        self
    }

    fn apply(&self, dev: &mut DiscoveredDevice) {
        if dev.kind != self.kind {
            dev.kind = TransportKind::DualMode;
        }
        if let Some(name) = self.name.as_ref().filter(|n| !n.is_empty()) {
            dev.name = name.clone();
        }
        if let Some(rssi) = self.rssi {
            dev.rssi = rssi;
        }
        match &mut dev.details {
            DeviceDetails::Classic { cod, uuid } => {
                if let Some(v) = self.cod {
                    *cod = v;
                }
                if self.uuid.is_some() {
                    *uuid = self.uuid;
                }
            }
            DeviceDetails::Ble {
                service_uuid16,
                appearance,
                addr_type,
            } => {
                if let Some(v) = self.service_uuid16.filter(|&v| v != 0) {
                    *service_uuid16 = v;
                }
                if let Some(v) = self.appearance.filter(|&v| v != 0) {
                    *appearance = v;
                }
                if let Some(v) = self.addr_type {
                    *addr_type = v;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    devices: Vec<DiscoveredDevice, REGISTRY_CAPACITY>,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Fold a discovery event into the registry.
    ///
    /// Returns `true` when the address was not known before.
    pub fn merge(&mut self, update: &DeviceUpdate) -> Result<bool, Error> {
        if let Some(dev) = self.devices.iter_mut().find(|d| d.addr == update.addr) {
            update.apply(dev);
            return Ok(false);
        }
        let mut dev = DiscoveredDevice::new(update.kind, update.addr);
        update.apply(&mut dev);
        self.devices.push(dev).map_err(|_| {
            warn!("Registry full, dropping {}", update.addr);
            Error::BufferOverflow
        })?;
        Ok(true)
    }

    pub fn find(&self, addr: &BdAddr) -> Option<&DiscoveredDevice> {
        self.devices.iter().find(|d| d.addr == *addr)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&DiscoveredDevice> {
        self.devices.iter().find(|d| d.name.as_str() == name)
    }

    /// Look up by a `XX:XX:XX:XX:XX:XX` address string, or by exact name
    /// when the string does not have the address shape.
    pub fn find_by_str(&self, key: &str) -> Option<&DiscoveredDevice> {
        match BdAddr::parse(key) {
            Some(addr) => self.find(&addr),
            None => self.find_by_name(key),
        }
    }

    pub fn first(&self) -> Option<&DiscoveredDevice> {
        self.devices.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredDevice> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Log one line per device.
    pub fn log_devices(&self) {
        for dev in self.devices.iter() {
            match dev.details {
                DeviceDetails::Classic { cod, uuid } => match uuid {
                    Some(uuid) => info!(
                        "{} {} {} RSSI {} COD {:#x} UUID {}",
                        dev.kind.label(),
                        dev.name.as_str(),
                        dev.addr,
                        dev.rssi,
                        cod,
                        uuid
                    ),
                    None => info!(
                        "{} {} {} RSSI {} COD {:#x}",
                        dev.kind.label(),
                        dev.name.as_str(),
                        dev.addr,
                        dev.rssi,
                        cod
                    ),
                },
                DeviceDetails::Ble {
                    service_uuid16,
                    appearance,
                    ..
                } => info!(
                    "{} {} {} RSSI {} UUID {:#x} {}",
                    dev.kind.label(),
                    dev.name.as_str(),
                    dev.addr,
                    dev.rssi,
                    service_uuid16,
                    super::appearance_name(appearance).unwrap_or("")
                ),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: BdAddr = BdAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn same_address_merges_into_one_record() {
        let mut reg = Registry::new();
        let first = DeviceUpdate::new(TransportKind::Ble, ADDR).with_rssi(-70);
        let second = DeviceUpdate::new(TransportKind::Ble, ADDR)
            .with_rssi(-60)
            .with_name("Keyboard");

        assert_eq!(reg.merge(&first), Ok(true));
        assert_eq!(reg.merge(&second), Ok(false));
        assert_eq!(reg.merge(&second), Ok(false));

        assert_eq!(reg.len(), 1);
        let dev = reg.find(&ADDR).unwrap();
        assert_eq!(dev.name.as_str(), "Keyboard");
        assert_eq!(dev.rssi, -60);
    }

    #[test]
    fn populated_fields_never_regress() {
        let mut reg = Registry::new();
        let mut full = DeviceUpdate::new(TransportKind::Ble, ADDR).with_name("Pad");
        full.service_uuid16 = Some(0x1812);
        full.appearance = Some(0x03C4);
        reg.merge(&full).unwrap();

        let mut sparse = DeviceUpdate::new(TransportKind::Ble, ADDR).with_name("");
        sparse.service_uuid16 = Some(0);
        reg.merge(&sparse).unwrap();

        let dev = reg.find(&ADDR).unwrap();
        assert_eq!(dev.name.as_str(), "Pad");
        assert_eq!(dev.service_uuid16(), 0x1812);
        assert!(matches!(
            dev.details,
            DeviceDetails::Ble {
                appearance: 0x03C4,
                ..
            }
        ));
    }

    #[test]
    fn seen_on_both_technologies_is_dual_mode() {
        let mut reg = Registry::new();
        reg.merge(&DeviceUpdate::new(TransportKind::Classic, ADDR)).unwrap();
        reg.merge(&DeviceUpdate::new(TransportKind::Ble, ADDR)).unwrap();
        assert_eq!(reg.find(&ADDR).unwrap().kind, TransportKind::DualMode);
    }

    #[test]
    fn lookup_by_address_string_or_name() {
        let mut reg = Registry::new();
        reg.merge(&DeviceUpdate::new(TransportKind::Classic, ADDR).with_name("Mouse"))
            .unwrap();

        assert_eq!(reg.find_by_str("AA:BB:CC:DD:EE:FF").unwrap().addr, ADDR);
        assert_eq!(reg.find_by_str("aa:bb:cc:dd:ee:ff").unwrap().addr, ADDR);
        assert_eq!(reg.find_by_str("Mouse").unwrap().addr, ADDR);
        // wrong shape falls back to names, and there is no such name
        assert!(reg.find_by_str("AA:BB:CC:DD:EE").is_none());
    }

    #[test]
    fn full_registry_reports_overflow() {
        let mut reg = Registry::new();
        for i in 0..REGISTRY_CAPACITY {
            let addr = BdAddr([0, 0, 0, 0, (i >> 8) as u8, i as u8]);
            assert_eq!(reg.merge(&DeviceUpdate::new(TransportKind::Ble, addr)), Ok(true));
        }
        let extra = DeviceUpdate::new(TransportKind::Ble, BdAddr([9; 6]));
        assert_eq!(reg.merge(&extra), Err(Error::BufferOverflow));
        assert_eq!(reg.len(), REGISTRY_CAPACITY);

        reg.clear();
        assert!(reg.is_empty());
    }
}
