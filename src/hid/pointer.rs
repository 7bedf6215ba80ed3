//! Digitizer reports: single pointer (stylus) and multi-finger touch.
//!
//! Coordinates are percentages scaled to `0..=10000`.

/// Point report size in bytes (report id 4).
pub const POINT_REPORT_SIZE: usize = 5;

/// Number of fingers carried by one touch report.
pub const TOUCH_FINGERS: usize = 5;

/// Touch report size in bytes (report id 5).
pub const TOUCH_REPORT_SIZE: usize = TOUCH_FINGERS * 5 + 3;

/// Maximum digitizer coordinate.
pub const DIGITIZER_MAX: u16 = 10000;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PointReport {
    /// Tip switch.
    pub tip: bool,
    /// In range.
    pub in_range: bool,
    pub x: u16,
    pub y: u16,
}

impl PointReport {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < POINT_REPORT_SIZE {
            return None;
        }
        Some(Self {
            tip: data[0] & 0x01 != 0,
            in_range: data[0] & 0x02 != 0,
            x: u16::from_le_bytes([data[1], data[2]]),
            y: u16::from_le_bytes([data[3], data[4]]),
        })
    }

    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < POINT_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.tip as u8 | (self.in_range as u8) << 1;
        buf[1..3].copy_from_slice(&self.x.to_le_bytes());
        buf[3..5].copy_from_slice(&self.y.to_le_bytes());
        POINT_REPORT_SIZE
    }
}

/// One contact of a touch report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Finger {
    pub tip: bool,
    /// Contact identifier, `0..=9`.
    pub contact_id: u8,
    pub x: u16,
    pub y: u16,
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchReport {
    pub fingers: [Finger; TOUCH_FINGERS],
    /// Sample rate.
    pub rate: u16,
    /// Number of touching fingers.
    pub count: u8,
}

impl TouchReport {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < TOUCH_REPORT_SIZE {
            return None;
        }
        let mut report = Self::default();
        for (finger, raw) in report.fingers.iter_mut().zip(data.chunks_exact(5)) {
            *finger = Finger {
                tip: raw[0] & 0x01 != 0,
                contact_id: raw[0] >> 4,
                x: u16::from_le_bytes([raw[1], raw[2]]),
                y: u16::from_le_bytes([raw[3], raw[4]]),
            };
        }
        let tail = TOUCH_FINGERS * 5;
        report.rate = u16::from_le_bytes([data[tail], data[tail + 1]]);
        report.count = data[tail + 2];
        Some(report)
    }

    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < TOUCH_REPORT_SIZE {
            return 0;
        }
        for (finger, raw) in self.fingers.iter().zip(buf.chunks_exact_mut(5)) {
            raw[0] = finger.tip as u8 | (finger.contact_id & 0x0F) << 4;
            raw[1..3].copy_from_slice(&finger.x.to_le_bytes());
            raw[3..5].copy_from_slice(&finger.y.to_le_bytes());
        }
        let tail = TOUCH_FINGERS * 5;
        buf[tail..tail + 2].copy_from_slice(&self.rate.to_le_bytes());
        buf[tail + 2] = self.count;
        TOUCH_REPORT_SIZE
    }
}
