//! Calibration persistence.
//!
//! The linear model is stored as one 20-byte record:
//!
//! | Bytes  | Content                                   |
//! |--------|-------------------------------------------|
//! | 0..4   | magic `TPG1`                              |
//! | 4..16  | [`CalibrationRecord`], postcard encoded   |
//! | 16..20 | CRC-32 (ISO-HDLC) of bytes 0..16, `u32` LE |
//!
//! Erased flash reads as `0xFF` and never matches the magic.

use crc::{CRC_32_ISO_HDLC, Crc};
use embedded_storage::Storage;
use serde::{Deserialize, Serialize};

use crate::smp3011::calibration::LinearCalibration;

pub const RECORD_MAGIC: [u8; 4] = *b"TPG1";
const PAYLOAD_START: usize = RECORD_MAGIC.len();
/// Three `f32`, which postcard writes as four little-endian bytes each.
const PAYLOAD_LEN: usize = 12;
const CRC_START: usize = PAYLOAD_START + PAYLOAD_LEN;
pub const RECORD_LEN: usize = CRC_START + 4;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError<E> {
    /// The underlying storage failed
    Storage(E),
    /// The record did not fit its slot
    Encode,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRecord {
    pub min_kpa: f32,
    pub max_kpa: f32,
    pub offset_kpa: f32,
}

impl CalibrationRecord {
    pub fn from_model(model: &LinearCalibration) -> Self {
        Self {
            min_kpa: model.minimum(),
            max_kpa: model.maximum(),
            offset_kpa: model.offset(),
        }
    }

    /// Rebuilds the model, or `None` if the stored values are unusable.
    pub fn to_model(&self) -> Option<LinearCalibration> {
        if !self.offset_kpa.is_finite() {
            return None;
        }
        let mut model = LinearCalibration::new(self.min_kpa, self.max_kpa).ok()?;
        model.set_offset(self.offset_kpa);
        Some(model)
    }

    pub fn encode(&self) -> Result<[u8; RECORD_LEN], postcard::Error> {
        let mut buf = [0u8; RECORD_LEN];
        buf[..PAYLOAD_START].copy_from_slice(&RECORD_MAGIC);
        let used = postcard::to_slice(self, &mut buf[PAYLOAD_START..CRC_START])?.len();
        if used != PAYLOAD_LEN {
            return Err(postcard::Error::SerializeBufferFull);
        }
        let sum = CRC32.checksum(&buf[..CRC_START]);
        buf[CRC_START..].copy_from_slice(&sum.to_le_bytes());
        Ok(buf)
    }

    /// `None` for erased, foreign or corrupted data.
    pub fn decode(buf: &[u8; RECORD_LEN]) -> Option<Self> {
        if buf[..PAYLOAD_START] != RECORD_MAGIC {
            return None;
        }
        let stored = u32::from_le_bytes([
            buf[CRC_START],
            buf[CRC_START + 1],
            buf[CRC_START + 2],
            buf[CRC_START + 3],
        ]);
        if stored != CRC32.checksum(&buf[..CRC_START]) {
            return None;
        }
        postcard::from_bytes(&buf[PAYLOAD_START..CRC_START]).ok()
    }
}

/// Calibration record at a fixed offset of some flash-like storage.
pub struct CalibrationStore<S> {
    storage: S,
    offset: u32,
}

impl<S: Storage> CalibrationStore<S> {
    pub fn new(storage: S, offset: u32) -> Self {
        Self { storage, offset }
    }

    /// Reads the stored model. `Ok(None)` when nothing valid is stored.
    pub fn load(&mut self) -> Result<Option<LinearCalibration>, PersistError<S::Error>> {
        let mut buf = [0u8; RECORD_LEN];
        self.storage
            .read(self.offset, &mut buf)
            .map_err(PersistError::Storage)?;

        let model = CalibrationRecord::decode(&buf).and_then(|r| r.to_model());
        match model {
            Some(ref m) => info!(
                "Loaded calibration {}..{} kPa, offset {} kPa",
                m.minimum(),
                m.maximum(),
                m.offset()
            ),
            None => info!("No stored calibration at {=u32:#x}", self.offset),
        }
        Ok(model)
    }

    pub fn save(&mut self, model: &LinearCalibration) -> Result<(), PersistError<S::Error>> {
        let buf = CalibrationRecord::from_model(model)
            .encode()
            .map_err(|_| {
                error!("Calibration record encoding failed");
                PersistError::Encode
            })?;
        self.storage
            .write(self.offset, &buf)
            .map_err(PersistError::Storage)?;
        debug!("Calibration saved at {=u32:#x}", self.offset);
        Ok(())
    }

    pub fn release(self) -> S {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::ReadStorage;

    /// RAM-backed flash, erased to 0xFF.
    struct MemFlash {
        data: [u8; 256],
        broken: bool,
    }

    impl MemFlash {
        fn new() -> Self {
            Self {
                data: [0xFF; 256],
                broken: false,
            }
        }
    }

    #[derive(Debug, PartialEq)]
    struct FlashFault;

    impl ReadStorage for MemFlash {
        type Error = FlashFault;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            if self.broken {
                return Err(FlashFault);
            }
            let start = offset as usize;
            bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl Storage for MemFlash {
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.broken {
                return Err(FlashFault);
            }
            let start = offset as usize;
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }

    fn model(min: f32, max: f32, offset: f32) -> LinearCalibration {
        let mut m = LinearCalibration::new(min, max).unwrap();
        m.set_offset(offset);
        m
    }

    #[test]
    fn erased_flash_has_no_calibration() {
        let mut store = CalibrationStore::new(MemFlash::new(), 0x40);
        assert_eq!(store.load(), Ok(None));
    }

    #[test]
    fn saved_model_is_loaded_back() {
        let mut store = CalibrationStore::new(MemFlash::new(), 0x40);
        let saved = model(0.0, 700.0, -12.5);
        store.save(&saved).unwrap();
        assert_eq!(store.load(), Ok(Some(saved)));

        // Leaves the rest of the sector alone.
        let flash = store.release();
        assert!(flash.data[..0x40].iter().all(|&b| b == 0xFF));
        assert!(flash.data[0x40 + RECORD_LEN..].iter().all(|&b| b == 0xFF));
        assert_eq!(&flash.data[0x40..0x44], b"TPG1");
    }

    #[test]
    fn record_layout_is_fixed() {
        let record = CalibrationRecord {
            min_kpa: 0.0,
            max_kpa: 1000.0,
            offset_kpa: -2.5,
        };
        let buf = record.encode().unwrap();
        assert_eq!(&buf[4..8], &0.0f32.to_le_bytes());
        assert_eq!(&buf[8..12], &1000.0f32.to_le_bytes());
        assert_eq!(&buf[12..16], &(-2.5f32).to_le_bytes());
        assert_eq!(
            u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            CRC32.checksum(&buf[..16])
        );
        assert_eq!(CalibrationRecord::decode(&buf), Some(record));
    }

    #[test]
    fn corrupted_record_is_ignored() {
        let mut store = CalibrationStore::new(MemFlash::new(), 0);
        store.save(&model(0.0, 1000.0, 10.0)).unwrap();
        let mut flash = store.release();
        flash.data[13] ^= 0x01;

        let mut store = CalibrationStore::new(flash, 0);
        assert_eq!(store.load(), Ok(None));
    }

    #[test]
    fn foreign_magic_is_ignored() {
        let mut buf = CalibrationRecord::from_model(&LinearCalibration::default())
            .encode()
            .unwrap();
        buf[3] = b'0';
        assert_eq!(CalibrationRecord::decode(&buf), None);
    }

    #[test]
    fn record_with_invalid_range_is_ignored() {
        let record = CalibrationRecord {
            min_kpa: 500.0,
            max_kpa: 100.0,
            offset_kpa: 0.0,
        };
        let decoded = CalibrationRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.to_model(), None);

        let record = CalibrationRecord {
            offset_kpa: f32::INFINITY,
            ..CalibrationRecord::from_model(&LinearCalibration::default())
        };
        assert_eq!(record.to_model(), None);
    }

    #[test]
    fn storage_errors_propagate() {
        let mut flash = MemFlash::new();
        flash.broken = true;
        let mut store = CalibrationStore::new(flash, 0);
        assert_eq!(store.load(), Err(PersistError::Storage(FlashFault)));
        assert_eq!(
            store.save(&LinearCalibration::default()),
            Err(PersistError::Storage(FlashFault))
        );
    }
}
