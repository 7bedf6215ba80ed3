//! Persisted configuration: the mode selected at boot and the
//! discoverability default.
//!
//! [`ConfigStore`] is the seam the arbiter persists through.
//! [`MemoryStore`] keeps values in RAM; [`FlashStore`] (feature `storage`)
//! keeps them in NOR flash through `sequential-storage`, which handles
//! wear levelling and garbage collection of the flash pages.

use heapless::{String, Vec};

use crate::config::{KEY_BT_MODE, KEY_BT_SCAN, STORE_VALUE_MAX};
use crate::Error;

/// A stored value.
pub type StoreValue = String<STORE_VALUE_MAX>;

/// Keys of the persisted configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreKey {
    /// Desired mode at boot (`BT_HIDD`, `BLE_HIDD`, `BLE_HIDH`).
    BtMode,
    /// `"1"` when the device is discoverable by default.
    BtScan,
}

impl StoreKey {
    pub const fn name(&self) -> &'static str {
        match self {
            StoreKey::BtMode => KEY_BT_MODE,
            StoreKey::BtScan => KEY_BT_SCAN,
        }
    }

    /// Flash map key.
    const fn id(&self) -> u8 {
        match self {
            StoreKey::BtMode => 0x01,
            StoreKey::BtScan => 0x02,
        }
    }
}

/// Key/value store the arbiter treats as the source of truth at boot.
#[allow(async_fn_in_trait)]
pub trait ConfigStore {
    /// `Ok(None)` when the key was never written.
    async fn get(&mut self, key: StoreKey) -> Result<Option<StoreValue>, Error>;

    async fn set(&mut self, key: StoreKey, value: &str) -> Result<(), Error>;
}

/// RAM-backed store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Vec<(StoreKey, StoreValue), 2>,
}

impl MemoryStore {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Store pre-loaded with `value` under `key`.
    pub fn with(mut self, key: StoreKey, value: &str) -> Self {
        self.put(key, value);
        self
    }

    /// Synchronous read, for inspection.
    pub fn value(&self, key: StoreKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    fn put(&mut self, key: StoreKey, value: &str) -> bool {
        let mut stored = StoreValue::new();
        if stored.push_str(value).is_err() {
            return false;
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = stored,
            None => {
                if self.entries.push((key, stored)).is_err() {
                    return false;
                }
            }
        }
        true
    }
}

impl ConfigStore for MemoryStore {
    async fn get(&mut self, key: StoreKey) -> Result<Option<StoreValue>, Error> {
        Ok(self.value(key).and_then(|v| StoreValue::try_from(v).ok()))
    }

    async fn set(&mut self, key: StoreKey, value: &str) -> Result<(), Error> {
        if !self.put(key, value) {
            return Err(Error::BufferOverflow);
        }
        debug!("Stored {} = {}", key.name(), value);
        Ok(())
    }
}

#[cfg(feature = "storage")]
pub use flash::FlashStore;

#[cfg(feature = "storage")]
mod flash {
    use core::ops::Range;

    use embedded_storage_async::nor_flash::NorFlash;
    use sequential_storage::cache::NoCache;
    use sequential_storage::map::{fetch_item, store_item};

    use super::{ConfigStore, StoreKey, StoreValue};
    use crate::config::STORE_VALUE_MAX;
    use crate::Error;

    /// Scratch buffer for one map item (key + value + header).
    const ITEM_BUF_SIZE: usize = STORE_VALUE_MAX + 16;

    /// NOR-flash backed store.
    pub struct FlashStore<F> {
        flash: F,
        range: Range<u32>,
    }

    impl<F: NorFlash> FlashStore<F> {
        /// `range` must cover at least two erase pages.
        pub fn new(flash: F, range: Range<u32>) -> Self {
            Self { flash, range }
        }

        pub fn release(self) -> F {
            self.flash
        }
    }

    impl<F: NorFlash> ConfigStore for FlashStore<F> {
        async fn get(&mut self, key: StoreKey) -> Result<Option<StoreValue>, Error> {
            let mut buf = [0u8; ITEM_BUF_SIZE];
            let item = fetch_item::<u8, &[u8], _>(
                &mut self.flash,
                self.range.clone(),
                &mut NoCache::new(),
                &mut buf,
                &key.id(),
            )
            .await
            .map_err(|_| {
                error!("Flash read of {} failed", key.name());
                Error::Storage
            })?;

            let Some(data) = item else {
                return Ok(None);
            };
            let text = core::str::from_utf8(data).map_err(|_| {
                warn!("Stored {} is not text", key.name());
                Error::Storage
            })?;
            let mut value = StoreValue::new();
            crate::push_truncated(&mut value, text);
            Ok(Some(value))
        }

        async fn set(&mut self, key: StoreKey, value: &str) -> Result<(), Error> {
            if value.len() > STORE_VALUE_MAX {
                return Err(Error::BufferOverflow);
            }
            let mut buf = [0u8; ITEM_BUF_SIZE];
            store_item::<u8, &[u8], _>(
                &mut self.flash,
                self.range.clone(),
                &mut NoCache::new(),
                &mut buf,
                &key.id(),
                &value.as_bytes(),
            )
            .await
            .map_err(|_| {
                error!("Flash write of {} failed", key.name());
                Error::Storage
            })?;
            info!("Saved {} to flash", key.name());
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;

    #[test]
    fn missing_key_reads_none() {
        let mut store = MemoryStore::new();
        assert_eq!(block_on(store.get(StoreKey::BtMode)), Ok(None));
    }

    #[test]
    fn set_overwrites() {
        let mut store = MemoryStore::new().with(StoreKey::BtMode, "BLE_HIDD");
        block_on(store.set(StoreKey::BtMode, "BT_HIDD")).unwrap();
        block_on(store.set(StoreKey::BtScan, "0")).unwrap();
        assert_eq!(store.value(StoreKey::BtMode), Some("BT_HIDD"));
        assert_eq!(store.value(StoreKey::BtScan), Some("0"));
    }

    #[test]
    fn oversized_value_is_rejected() {
        let mut store = MemoryStore::new();
        let long = "x".repeat(STORE_VALUE_MAX + 1);
        assert_eq!(
            block_on(store.set(StoreKey::BtMode, &long)),
            Err(Error::BufferOverflow)
        );
        assert_eq!(store.value(StoreKey::BtMode), None);
    }

    #[test]
    fn key_names() {
        assert_eq!(StoreKey::BtMode.name(), "sys.bt.mode");
        assert_eq!(StoreKey::BtScan.name(), "sys.bt.scan");
    }

    #[cfg(feature = "storage")]
    mod flash {
        use embassy_futures::block_on;
        use embedded_storage_async::nor_flash::{
            ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
        };

        use super::super::{ConfigStore, FlashStore, StoreKey};

        const PAGE: usize = 1024;
        const PAGES: usize = 4;

        /// RAM-backed NOR flash: erase sets 0xFF, writes only clear bits.
        struct RamFlash {
            mem: [u8; PAGE * PAGES],
        }

        impl RamFlash {
            fn new() -> Self {
                Self {
                    mem: [0xFF; PAGE * PAGES],
                }
            }

            fn range(
                &self,
                offset: u32,
                len: usize,
            ) -> Result<core::ops::Range<usize>, NorFlashErrorKind> {
                let start = offset as usize;
                let end = start + len;
                if end > self.mem.len() {
                    return Err(NorFlashErrorKind::OutOfBounds);
                }
                Ok(start..end)
            }
        }

        impl ErrorType for RamFlash {
            type Error = NorFlashErrorKind;
        }

        impl ReadNorFlash for RamFlash {
            const READ_SIZE: usize = 1;

            async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
                let range = self.range(offset, bytes.len())?;
                bytes.copy_from_slice(&self.mem[range]);
                Ok(())
            }

            fn capacity(&self) -> usize {
                self.mem.len()
            }
        }

        impl NorFlash for RamFlash {
            const WRITE_SIZE: usize = 4;
            const ERASE_SIZE: usize = PAGE;

            async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
                if from as usize % PAGE != 0 || to as usize % PAGE != 0 {
                    return Err(NorFlashErrorKind::NotAligned);
                }
                let range = self.range(from, (to - from) as usize)?;
                self.mem[range].fill(0xFF);
                Ok(())
            }

            async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
                if offset as usize % 4 != 0 || bytes.len() % 4 != 0 {
                    return Err(NorFlashErrorKind::NotAligned);
                }
                let range = self.range(offset, bytes.len())?;
                for (cell, &b) in self.mem[range].iter_mut().zip(bytes) {
                    *cell &= b;
                }
                Ok(())
            }
        }

        fn store(flash: RamFlash) -> FlashStore<RamFlash> {
            FlashStore::new(flash, 0..(PAGE * PAGES) as u32)
        }

        #[test]
        fn blank_flash_reads_none() {
            let mut store = store(RamFlash::new());
            assert_eq!(block_on(store.get(StoreKey::BtMode)), Ok(None));
        }

        #[test]
        fn values_survive_a_new_store() {
            let mut first = store(RamFlash::new());
            block_on(async {
                first.set(StoreKey::BtMode, "BLE_HIDH").await.unwrap();
                first.set(StoreKey::BtScan, "0").await.unwrap();
                first.set(StoreKey::BtMode, "BT_HIDD").await.unwrap();
            });

            let mut second = store(first.release());
            let (mode, scan) = block_on(async {
                (
                    second.get(StoreKey::BtMode).await.unwrap(),
                    second.get(StoreKey::BtScan).await.unwrap(),
                )
            });
            assert_eq!(mode.as_deref(), Some("BT_HIDD"));
            assert_eq!(scan.as_deref(), Some("0"));
        }
    }
}
