//! HID host over GATT: connects to a BLE keyboard or mouse and turns its
//! input reports into [`HidReport`]s for the dispatcher.

use super::{ExitOutcome, LinkContext, TransportAdapter};
use crate::gap::{DiscoveredDevice, TransportKind};
use crate::hid::report_protocol::HidDescriptor;
use crate::hid::{classify_with_descriptor, HidReport};
use crate::mode::{ActiveMode, Mode, Visibility};
use crate::radio::{BleHidhEvent, Radio};
use crate::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BleHidh;

impl BleHidh {
    /// Open a HID connection to a discovered peripheral.
    pub fn connect<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        device: &DiscoveredDevice,
    ) -> Result<(), Error> {
        if cx.with_link(|link| link.connected || !link.enabled) {
            return Err(Error::InvalidState);
        }
        let transport = if device.kind.is_ble() {
            TransportKind::Ble
        } else {
            TransportKind::Classic
        };
        info!("Connecting to {} {}", device.addr, device.name.as_str());
        cx.radio
            .hidh_open(device.addr, transport, device.addr_type())?;
        Ok(())
    }
}

impl TransportAdapter for BleHidh {
    fn mode(&self) -> ActiveMode {
        ActiveMode::BleHidHost
    }

    async fn init<R: Radio>(&self, cx: &LinkContext<'_, R>, prev: Mode) -> Result<(), Error> {
        if cx.with_link(|link| link.owner == Some(self.mode()) && link.enabled) {
            return Ok(());
        }
        cx.bring_up(self.mode().technology(), !prev.is_ble())?;
        cx.with_link(|link| link.owner = Some(self.mode()));
        cx.radio.hidh_init()?;
        cx.with_link(|link| link.enabled = true);
        Ok(())
    }

    async fn exit<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        next: ActiveMode,
    ) -> Result<ExitOutcome, Error> {
        if !cx.with_link(|link| link.enabled) {
            return Ok(ExitOutcome::TornDown);
        }
        let deinit = cx.radio.hidh_deinit();
        cx.with_link(|link| link.reset_profile());
        deinit?;
        if Mode::from(next).is_ble() {
            return Ok(ExitOutcome::TornDown);
        }
        cx.tear_down(true)
    }

    fn configure_visibility<R: Radio>(
        &self,
        _cx: &LinkContext<'_, R>,
        _visibility: Visibility,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn send_report<R: Radio>(&self, _cx: &LinkContext<'_, R>, _report: &HidReport) -> bool {
        false
    }
}

/// Handle a GATT HID client event. Returns the classified input report,
/// if the event carried one.
pub fn on_event<R: Radio>(cx: &LinkContext<'_, R>, event: BleHidhEvent) -> Option<HidReport> {
    match event {
        BleHidhEvent::Opened {
            addr,
            success: true,
            name,
            report_map,
        } => {
            let reports = HidDescriptor::parse(&report_map);
            cx.with_link(|link| {
                link.peer = Some(addr);
                link.connected = true;
                link.peer_name.clear();
                if let Some(name) = name.as_deref() {
                    crate::push_truncated(&mut link.peer_name, name);
                }
                link.peer_reports = reports;
            });
            info!("BLE HIDH opened {}", addr);
            None
        }
        BleHidhEvent::Opened {
            addr,
            success: false,
            ..
        } => {
            warn!("BLE HIDH open {} failed", addr);
            None
        }
        BleHidhEvent::Battery { level } => {
            cx.with_link(|link| link.peer_battery = Some(level));
            info!("Peer battery: {}%", level);
            None
        }
        BleHidhEvent::Feature { report_id, len } => {
            debug!("Feature report {}: {} bytes", report_id, len);
            None
        }
        BleHidhEvent::Input { report_id, data } => {
            let reports = cx.with_link(|link| link.peer_reports.clone());
            let report = classify_with_descriptor(report_id, reports.as_ref(), &data);
            if report.is_none() {
                debug!("Unclassified input {}: {}", report_id, crate::fmt::Bytes(&data));
            }
            report
        }
        BleHidhEvent::Closed => {
            cx.with_link(|link| link.forget_peer());
            info!("BLE HIDH closed");
            None
        }
    }
}
