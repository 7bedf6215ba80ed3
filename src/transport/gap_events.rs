//! GAP events: discovery results, scan completion and pairing requests.
//!
//! These are handled regardless of which adapter owns the radio.

use heapless::Vec;

use super::{Ack, LinkContext};
use crate::config::{PIN_CODE, PIN_CODE_SECURE_LEN};
use crate::gap::scanner::{adv_update, inquiry_update, Completion};
use crate::radio::{BleGapEvent, GapEvent, Radio, Technology};

/// A discovery of `tech` finished, was cancelled or timed out.
pub fn scan_completed<R: Radio>(cx: &LinkContext<'_, R>, tech: Technology) {
    match cx.with_link(|link| link.scan(tech).complete()) {
        Completion::Stale => debug!("Discarding completion of a pre-empted scan"),
        Completion::Waited => {}
        Completion::Report => {
            let count = cx.with_registry(|registry| {
                registry.log_devices();
                registry.len()
            });
            info!("Scan finished, found {} devices", count);
        }
    }
    cx.scan_signal(tech).signal(());
}

pub fn on_gap_event<R: Radio>(cx: &LinkContext<'_, R>, event: GapEvent) {
    match event {
        GapEvent::DiscoveryStarted => debug!("Discovery started"),
        GapEvent::DiscoveryStopped => scan_completed(cx, Technology::Classic),
        GapEvent::DiscoveryResult(result) => {
            let update = inquiry_update(&result);
            if let Ok(true) = cx.with_registry(|registry| registry.merge(&update)) {
                if let Err(e) = cx.radio.get_remote_services(result.addr) {
                    debug!("Service discovery of {} failed: {}", result.addr, e);
                }
            }
        }
        GapEvent::RemoteServices { addr, count } => {
            debug!("{} offers {} services", addr, count);
        }
        GapEvent::AuthComplete { addr, success } => {
            if success {
                info!("Authenticated with {}", addr);
            } else {
                error!("Authentication with {} failed", addr);
            }
        }
        GapEvent::PinRequest { addr, min_16_digit } => {
            let res = if min_16_digit || cx.config.secure_pin {
                let pin: Vec<u8, PIN_CODE_SECURE_LEN> =
                    core::iter::repeat(b'0').take(PIN_CODE_SECURE_LEN).collect();
                info!("Replying 16-digit PIN to {}", addr);
                cx.radio.pin_reply(addr, &pin)
            } else {
                info!("Replying PIN to {}", addr);
                cx.radio.pin_reply(addr, PIN_CODE)
            };
            if let Err(e) = res {
                warn!("PIN reply failed: {}", e);
            }
        }
        GapEvent::ConfirmRequest { addr, passkey } => {
            info!("Confirming passkey {} for {}", passkey, addr);
            if let Err(e) = cx.radio.confirm_reply(addr, true) {
                warn!("Confirm reply failed: {}", e);
            }
        }
        GapEvent::KeyNotify { addr, passkey } => {
            info!("Passkey for {}: {}", addr, passkey);
        }
        GapEvent::RemoteName { addr, name } => {
            let Some(name) = name else {
                debug!("No name from {}", addr);
                return;
            };
            cx.with_link(|link| {
                if link.peer == Some(addr) {
                    link.peer_name.clear();
                    crate::push_truncated(&mut link.peer_name, &name);
                }
            });
            debug!("{} is {}", addr, name.as_str());
        }
        GapEvent::ModeChange { addr, mode } => {
            debug!("{} power mode {}", addr, mode);
        }
    }
}

pub fn on_ble_gap_event<R: Radio>(cx: &LinkContext<'_, R>, event: BleGapEvent) {
    match event {
        BleGapEvent::ScanParamsSet => cx.acks.signal(Ack::ScanParamsSet),
        BleGapEvent::ScanResult(report) => {
            let update = adv_update(&report);
            let _ = cx.with_registry(|registry| registry.merge(&update));
        }
        BleGapEvent::ScanComplete => scan_completed(cx, Technology::Ble),
        BleGapEvent::AuthComplete { addr, success } => {
            if success {
                cx.with_link(|link| link.peer = Some(addr));
                info!("Paired with {}", addr);
                return;
            }
            error!("Pairing with {} failed", addr);
            if let Err(e) = cx.radio.ble_remove_bond(addr) {
                warn!("Removing bond failed: {}", e);
            }
            if let Err(e) = cx.radio.ble_disconnect(addr) {
                warn!("Disconnect failed: {}", e);
            }
        }
        BleGapEvent::NumericComparison { addr, passkey } => {
            info!("Confirming passkey {} for {}", passkey, addr);
            if let Err(e) = cx.radio.ble_confirm_reply(addr, true) {
                warn!("Confirm reply failed: {}", e);
            }
        }
        BleGapEvent::SecurityRequest { addr } => {
            if let Err(e) = cx.radio.ble_security_reply(addr, true) {
                warn!("Security reply failed: {}", e);
            }
        }
        BleGapEvent::PasskeyNotify { addr, passkey } => {
            info!("Passkey for {}: {}", addr, passkey);
        }
    }
}
