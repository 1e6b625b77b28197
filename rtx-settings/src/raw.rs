//! On-disk layout of a settings frame.
//!
//! A partition holds a chain of frames, each appended right after the
//! previous one. Every frame starts with a magic word and carries its own
//! total length, so the chain can be walked with six-byte header reads.
//! The trailing CRC covers everything before it.

use crate::crc::crc_ccitt;
use crate::error::Error;
use crate::settings::{Settings, SETTINGS_SIZE};

/// Magic word opening every stored frame ("OPNX" on the wire).
pub const STORE_MAGIC: u32 = 0x584E504F;

/// The value read back from erased flash where a magic word would be.
pub const ERASED_MAGIC: u32 = 0xFFFF_FFFF;

/// Bytes of frame header: magic, length and save counter.
pub const STORE_HEADER_SIZE: usize = 8;

/// Total size of a current-layout frame, magic through CRC.
pub const STORE_SIZE: usize = STORE_HEADER_SIZE + SETTINGS_SIZE + 2;

// The reported length must fit the length field and leave room for the
// header and the CRC in the smallest accepted frame.
const _: () = assert!(STORE_SIZE <= u16::MAX as usize);
const _: () = assert!(STORE_SIZE > STORE_HEADER_SIZE + 2);

/// Outcome of validating a stored frame.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Integrity {
    /// Magic, length and CRC all match the current layout.
    Valid,
    /// A shorter frame written by older firmware; readable, with missing
    /// payload fields at their defaults.
    Stale,
    /// Anything else: bad magic, impossible length or CRC mismatch.
    Corrupt,
}

/// One settings frame as stored on disk.
///
/// `length` is kept as read from the device: for frames written by older
/// firmware it is smaller than [`STORE_SIZE`] while the in-memory
/// `settings` are padded out with defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsFrame {
    pub magic: u32,
    pub length: u16,
    pub counter: u16,
    pub settings: Settings,
    pub crc: u16,
}

impl SettingsFrame {
    /// Build a full-length frame around `settings` with a freshly computed
    /// CRC.
    pub fn new(counter: u16, settings: Settings) -> Self {
        let mut frame = Self {
            magic: STORE_MAGIC,
            length: STORE_SIZE as u16,
            counter,
            settings,
            crc: 0,
        };
        frame.crc = frame.compute_crc();
        frame
    }

    /// The frame persisted on first boot: default settings, counter zero.
    pub fn with_defaults() -> Self {
        Self::new(0, Settings::default())
    }

    /// Replace the payload and advance the save counter, refreshing length
    /// and CRC. The counter is a free-running 16-bit value and wraps.
    pub fn update(&mut self, settings: &Settings) {
        self.counter = self.counter.wrapping_add(1);
        self.length = STORE_SIZE as u16;
        self.settings = *settings;
        self.crc = self.compute_crc();
    }

    /// Serialize to the on-disk byte layout, little-endian.
    pub fn to_bytes(&self) -> [u8; STORE_SIZE] {
        let mut buf = [0u8; STORE_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.length.to_le_bytes());
        buf[6..8].copy_from_slice(&self.counter.to_le_bytes());
        buf[8..STORE_SIZE - 2].copy_from_slice(&self.settings.to_bytes());
        buf[STORE_SIZE - 2..].copy_from_slice(&self.crc.to_le_bytes());
        buf
    }

    /// Decode a frame from its stored bytes. `bytes` must span exactly the
    /// frame as it exists on disk, i.e. as many bytes as its length field
    /// reports; shorter frames written by older firmware have their missing
    /// payload bytes taken from the defaults.
    ///
    /// No integrity judgment happens here, see [`SettingsFrame::integrity`].
    pub fn from_stored_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < STORE_HEADER_SIZE + 2 {
            return Err(Error::InvalidArgument);
        }
        if bytes.len() > STORE_SIZE {
            return Err(Error::TooLarge);
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let length = u16::from_le_bytes([bytes[4], bytes[5]]);
        let counter = u16::from_le_bytes([bytes[6], bytes[7]]);

        let mut payload = Settings::default().to_bytes();
        let stored = bytes.len() - STORE_HEADER_SIZE - 2;
        payload[..stored].copy_from_slice(&bytes[STORE_HEADER_SIZE..STORE_HEADER_SIZE + stored]);

        let crc = u16::from_le_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);

        Ok(Self {
            magic,
            length,
            counter,
            settings: Settings::from_bytes(&payload),
            crc,
        })
    }

    /// Classify this frame against the current layout.
    pub fn integrity(&self) -> Integrity {
        if self.magic != STORE_MAGIC {
            return Integrity::Corrupt;
        }

        let length = self.length as usize;
        if length > STORE_SIZE || length < STORE_HEADER_SIZE + 2 {
            return Integrity::Corrupt;
        }

        // For stale frames the serialized prefix up to the stored length
        // matches the on-disk bytes, so the CRC input is the same either way.
        let bytes = self.to_bytes();
        if self.crc != crc_ccitt(&bytes[..length - 2]) {
            return Integrity::Corrupt;
        }

        if length == STORE_SIZE {
            Integrity::Valid
        } else {
            Integrity::Stale
        }
    }

    fn compute_crc(&self) -> u16 {
        let bytes = self.to_bytes();
        crc_ccitt(&bytes[..STORE_SIZE - 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_is_valid() {
        let frame = SettingsFrame::with_defaults();
        assert_eq!(frame.counter, 0);
        assert_eq!(frame.length as usize, STORE_SIZE);
        assert_eq!(frame.integrity(), Integrity::Valid);
    }

    #[test]
    fn byte_layout() {
        let frame = SettingsFrame::with_defaults();
        let bytes = frame.to_bytes();

        assert_eq!(&bytes[0..4], &[0x4F, 0x50, 0x4E, 0x58]); // "OPNX"
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]) as usize, STORE_SIZE);
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 0);
    }

    #[test]
    fn stored_roundtrip() {
        let mut settings = Settings::default();
        settings.set_callsign("IU2KWO").unwrap();
        let frame = SettingsFrame::new(7, settings);

        let decoded = SettingsFrame::from_stored_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.integrity(), Integrity::Valid);
    }

    #[test]
    fn update_advances_counter_and_crc() {
        let mut frame = SettingsFrame::with_defaults();
        let crc0 = frame.crc;

        let mut settings = frame.settings;
        settings.brightness = 1;
        frame.update(&settings);

        assert_eq!(frame.counter, 1);
        assert_ne!(frame.crc, crc0);
        assert_eq!(frame.integrity(), Integrity::Valid);

        frame.counter = u16::MAX;
        frame.update(&settings);
        assert_eq!(frame.counter, 0);
    }

    #[test]
    fn corrupt_classification() {
        let mut frame = SettingsFrame::with_defaults();
        frame.crc ^= 1;
        assert_eq!(frame.integrity(), Integrity::Corrupt);

        let mut frame = SettingsFrame::with_defaults();
        frame.magic = ERASED_MAGIC;
        assert_eq!(frame.integrity(), Integrity::Corrupt);

        // A length beyond the current layout is never accepted.
        let mut frame = SettingsFrame::with_defaults();
        frame.length = STORE_SIZE as u16 + 1;
        assert_eq!(frame.integrity(), Integrity::Corrupt);
    }

    #[test]
    fn stale_frame_reads_with_defaults() {
        let mut settings = Settings::default();
        settings.brightness = 33;
        settings.gps_set_time = true; // beyond the stored prefix below

        // Rebuild the frame the way an eight byte shorter firmware wrote it.
        let full = SettingsFrame::new(3, settings).to_bytes();
        let short_len = STORE_SIZE - 8;
        let mut raw = [0u8; STORE_SIZE];
        raw[..short_len].copy_from_slice(&full[..short_len]);
        raw[4..6].copy_from_slice(&(short_len as u16).to_le_bytes());
        let crc = crc_ccitt(&raw[..short_len - 2]);
        raw[short_len - 2..short_len].copy_from_slice(&crc.to_le_bytes());

        let decoded = SettingsFrame::from_stored_bytes(&raw[..short_len]).unwrap();
        assert_eq!(decoded.integrity(), Integrity::Stale);
        assert_eq!(decoded.settings.brightness, 33);
        // Dropped trailing fields come back as defaults.
        assert!(!decoded.settings.gps_set_time);
    }
}
