//! HID device over Bluetooth Classic.
//!
//! Registration is a two-step handshake with the stack: `hidd_init`
//! answers with `InitFinished`, on which the application is registered,
//! which answers with `AppRegistered`. `init` returns once the second
//! acknowledgement arrived. While a host is connected the device stops
//! answering inquiries so the paired host keeps the link.

use super::{payload, Ack, ExitOutcome, LinkContext, TransportAdapter};
use crate::config::{COD_MAJOR_PERIPHERAL, COD_MINOR_COMBO};
use crate::hid::MAX_REPORT_SIZE;
use crate::hid::HidReport;
use crate::mode::{ActiveMode, Mode, Visibility};
use crate::radio::{BtHiddEvent, HandshakeError, Radio, ReportType};
use crate::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BtHidd;

impl TransportAdapter for BtHidd {
    fn mode(&self) -> ActiveMode {
        ActiveMode::BtClassicHidDevice
    }

    async fn init<R: Radio>(&self, cx: &LinkContext<'_, R>, prev: Mode) -> Result<(), Error> {
        cx.bring_up(self.mode().technology(), !prev.is_bt())?;
        cx.radio
            .set_class_of_device(COD_MAJOR_PERIPHERAL, COD_MINOR_COMBO)?;
        cx.with_link(|link| link.owner = Some(self.mode()));
        cx.acks.reset();
        cx.radio.hidd_init()?;
        cx.wait_ack(Ack::AppRegistered, cx.config.ack_timeout).await
    }

    async fn exit<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        next: ActiveMode,
    ) -> Result<ExitOutcome, Error> {
        let deinit = cx.radio.hidd_deinit();
        cx.with_link(|link| link.reset_profile());
        deinit?;
        if Mode::from(next).is_bt() {
            return Ok(ExitOutcome::TornDown);
        }
        cx.tear_down(true)
    }

    fn configure_visibility<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        visibility: Visibility,
    ) -> Result<(), Error> {
        cx.radio
            .set_scan_mode(visibility.connectable, visibility.discoverable)?;
        Ok(())
    }

    fn send_report<R: Radio>(&self, cx: &LinkContext<'_, R>, report: &HidReport) -> bool {
        if !cx.with_link(|link| link.enabled && link.connected) {
            return false;
        }
        let mut buf = [0u8; MAX_REPORT_SIZE];
        let Some(data) = payload(report, &mut buf) else {
            return false;
        };
        match cx.radio.hidd_send_report(report.id() as u8, data) {
            Ok(()) => true,
            Err(e) => {
                warn!("BT HIDD send {} failed: {}", report.id(), e);
                false
            }
        }
    }
}

/// Handle a classic HID device profile event.
pub fn on_event<R: Radio>(cx: &LinkContext<'_, R>, event: BtHiddEvent) {
    match event {
        BtHiddEvent::InitFinished { success: true } => {
            let name = cx.config.device_name();
            if let Err(e) = cx.radio.hidd_register_app(&cx.app_params(&name)) {
                error!("BT HIDD register app failed: {}", e);
                cx.acks.signal(Ack::Refused);
            }
        }
        BtHiddEvent::InitFinished { success: false } => {
            error!("BT HIDD init failed");
            cx.acks.signal(Ack::Refused);
        }
        BtHiddEvent::AppRegistered {
            success: true,
            plugged,
        } => {
            if let Err(e) = cx.radio.set_scan_mode(true, true) {
                warn!("BT HIDD scan enable failed: {}", e);
            }
            cx.with_link(|link| link.enabled = true);
            if let Some(addr) = plugged {
                info!("BT HIDD reconnecting to {}", addr);
                if let Err(e) = cx.radio.hidd_connect(addr) {
                    warn!("BT HIDD connect failed: {}", e);
                }
            }
            info!("BT HIDD application registered");
            cx.acks.signal(Ack::AppRegistered);
        }
        BtHiddEvent::AppRegistered { success: false, .. } => {
            error!("BT HIDD register app refused");
            cx.acks.signal(Ack::Refused);
        }
        BtHiddEvent::AppUnregistered => {
            let visibility = cx.with_link(|link| {
                link.enabled = false;
                link.visibility
            });
            if let Err(e) = cx
                .radio
                .set_scan_mode(visibility.connectable, visibility.discoverable)
            {
                warn!("BT HIDD scan restore failed: {}", e);
            }
        }
        BtHiddEvent::Opened {
            addr,
            connected: true,
        } => {
            if let Err(e) = cx.radio.read_remote_name(addr) {
                debug!("Remote name request failed: {}", e);
            }
            cx.with_link(|link| {
                link.peer = Some(addr);
                link.connected = true;
            });
            if let Err(e) = cx.radio.set_scan_mode(false, false) {
                warn!("BT HIDD scan disable failed: {}", e);
            }
            info!("BT HIDD connected to {}", addr);
        }
        BtHiddEvent::Opened {
            addr,
            connected: false,
        } => {
            warn!("BT HIDD open from {} did not connect", addr);
        }
        BtHiddEvent::Closed { disconnected: true } => {
            cx.with_link(|link| link.forget_peer());
            if let Err(e) = cx.radio.set_scan_mode(true, true) {
                warn!("BT HIDD scan enable failed: {}", e);
            }
            info!("BT HIDD disconnected");
        }
        BtHiddEvent::Closed {
            disconnected: false,
        } => debug!("BT HIDD close pending"),
        BtHiddEvent::SendReportFailed { report_id } => {
            warn!("BT HIDD report {} not delivered", report_id);
        }
        BtHiddEvent::GetReport {
            report_type,
            report_id,
        } => {
            // Only input reports exist, and they are pushed, never polled.
            let reply = if report_type == ReportType::Input {
                HandshakeError::UnsupportedRequest
            } else {
                HandshakeError::InvalidParameter
            };
            debug!("BT HIDD get report {} rejected", report_id);
            if let Err(e) = cx.radio.hidd_report_error(reply) {
                warn!("BT HIDD report error reply failed: {}", e);
            }
        }
        BtHiddEvent::SetProtocol { boot } => {
            info!("BT HIDD protocol: {}", if boot { "boot" } else { "report" });
        }
        BtHiddEvent::VirtualCableUnplug => {
            info!("BT HIDD virtual cable unplugged");
            if let Err(e) = cx.radio.set_scan_mode(true, true) {
                warn!("BT HIDD scan enable failed: {}", e);
            }
        }
    }
}
