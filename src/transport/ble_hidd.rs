//! HID device over GATT.

use super::{payload, Ack, ExitOutcome, LinkContext, TransportAdapter};
use crate::config::{
    APPEARANCE_HID_GAMEPAD, APPEARANCE_HID_GENERIC, BLE_ADV_FLAGS, BLE_ADV_INTERVAL_MAX,
    BLE_ADV_INTERVAL_MIN, HID_SERVICE_UUID16,
};
use crate::hid::gamepad::GamepadLayout;
use crate::hid::keyboard::KeyboardLeds;
use crate::hid::{HidReport, ReportId, MAX_REPORT_SIZE};
use crate::mode::{ActiveMode, Mode, Visibility};
use crate::radio::{AdvConfig, AdvParams, BleHiddEvent, Radio};
use crate::Error;

/// Preferred connection interval range advertised to hosts (1.25 ms units).
const CONN_INTERVAL_MIN: u16 = 0x0006;
const CONN_INTERVAL_MAX: u16 = 0x0010;

const ADV_PARAMS: AdvParams = AdvParams {
    interval_min: BLE_ADV_INTERVAL_MIN,
    interval_max: BLE_ADV_INTERVAL_MAX,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BleHidd;

impl BleHidd {
    /// Push a battery level to the connected host.
    pub fn set_battery<R: Radio>(&self, cx: &LinkContext<'_, R>, level: u8) -> Result<(), Error> {
        if !cx.with_link(|link| link.enabled && link.connected) {
            return Err(Error::InvalidState);
        }
        cx.radio.ble_hidd_set_battery(level.min(100))?;
        Ok(())
    }

    fn appearance(layout: Option<GamepadLayout>) -> u16 {
        match layout {
            Some(GamepadLayout::General) | None => APPEARANCE_HID_GENERIC,
            Some(_) => APPEARANCE_HID_GAMEPAD,
        }
    }
}

fn advertise<R: Radio>(cx: &LinkContext<'_, R>, on: bool) {
    let res = if on {
        cx.radio.ble_start_advertising(&ADV_PARAMS)
    } else {
        cx.radio.ble_stop_advertising()
    };
    if let Err(e) = res {
        warn!("BLE advertising {} failed: {}", if on { "start" } else { "stop" }, e);
    }
}

impl TransportAdapter for BleHidd {
    fn mode(&self) -> ActiveMode {
        ActiveMode::BleHidDevice
    }

    async fn init<R: Radio>(&self, cx: &LinkContext<'_, R>, prev: Mode) -> Result<(), Error> {
        cx.bring_up(self.mode().technology(), !prev.is_ble())?;
        cx.radio.ble_config_adv_data(&AdvConfig {
            include_name: true,
            include_tx_power: true,
            min_interval: CONN_INTERVAL_MIN,
            max_interval: CONN_INTERVAL_MAX,
            appearance: Self::appearance(cx.profile.layout),
            service_uuid16: HID_SERVICE_UUID16,
            flags: BLE_ADV_FLAGS,
        })?;
        cx.with_link(|link| link.owner = Some(self.mode()));
        cx.acks.reset();
        let name = cx.config.device_name();
        cx.radio.ble_hidd_init(&cx.app_params(&name))?;
        cx.wait_ack(Ack::ServiceStarted, cx.config.ack_timeout).await
    }

    async fn exit<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        next: ActiveMode,
    ) -> Result<ExitOutcome, Error> {
        let deinit = cx.radio.ble_hidd_deinit();
        cx.with_link(|link| link.reset_profile());
        deinit?;
        if Mode::from(next).is_ble() {
            return Ok(ExitOutcome::TornDown);
        }
        cx.tear_down(true)
    }

    fn configure_visibility<R: Radio>(
        &self,
        cx: &LinkContext<'_, R>,
        visibility: Visibility,
    ) -> Result<(), Error> {
        let connected = cx.with_link(|link| link.connected);
        if visibility.discoverable && !connected {
            cx.radio.ble_start_advertising(&ADV_PARAMS)?;
        } else {
            cx.radio.ble_stop_advertising()?;
        }
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
        match cx.radio.ble_hidd_send_input(report.id() as u8, data) {
            Ok(()) => true,
            Err(e) => {
                warn!("BLE HIDD send {} failed: {}", report.id(), e);
                false
            }
        }
    }
}

/// Handle a GATT HID server event.
pub fn on_event<R: Radio>(cx: &LinkContext<'_, R>, event: BleHiddEvent) {
    match event {
        BleHiddEvent::Started { success: true } => {
            advertise(cx, true);
            cx.with_link(|link| link.enabled = true);
            info!("BLE HIDD service started");
            cx.acks.signal(Ack::ServiceStarted);
        }
        BleHiddEvent::Started { success: false } => {
            error!("BLE HIDD service failed to start");
            cx.acks.signal(Ack::Refused);
        }
        BleHiddEvent::Connected { addr } => {
            cx.with_link(|link| {
                link.connected = true;
                link.peer = Some(addr);
            });
            advertise(cx, false);
            info!("BLE HIDD connected to {}", addr);
        }
        BleHiddEvent::ProtocolMode { boot } => {
            info!("BLE HIDD protocol: {}", if boot { "boot" } else { "report" });
        }
        BleHiddEvent::Output { report_id, data } => {
            if report_id == ReportId::Keyboard as u8 && data.len() == 1 {
                let leds = KeyboardLeds::from_byte(data[0]);
                info!(
                    "Keyboard LEDs: num {} caps {} scroll {}",
                    leds.num_lock,
                    leds.caps_lock,
                    leds.scroll_lock
                );
            } else if report_id == ReportId::Gamepad as u8
                && cx.profile.layout == Some(GamepadLayout::XInput)
            {
                debug!("Rumble: {}", crate::fmt::Bytes(&data));
            } else {
                debug!("Output report {}: {}", report_id, crate::fmt::Bytes(&data));
            }
        }
        BleHiddEvent::Disconnected => {
            cx.with_link(|link| link.forget_peer());
            advertise(cx, true);
            info!("BLE HIDD disconnected");
        }
        BleHiddEvent::Stopped => {
            let discoverable = cx.with_link(|link| {
                link.enabled = false;
                link.visibility.discoverable
            });
            advertise(cx, discoverable);
            info!("BLE HIDD service stopped");
        }
    }
}
