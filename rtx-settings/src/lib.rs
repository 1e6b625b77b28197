#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod access;
pub mod crc;
pub mod error;
mod internal;
pub mod platform;
pub mod raw;
pub mod settings;

pub use settings::{DisplayTimer, Settings};

use crate::access::NvmTable;
use crate::error::Error;
use crate::internal::{find_latest_valid_store, write_store, PartitionScan, PartitionState};
use crate::raw::SettingsFrame;

/// Persistent storage for the device settings over two partitions of an
/// NVM area, written alternately so that one intact copy survives any
/// single interrupted save.
///
/// The handle caches the newest settings after the first [`load`]; a
/// [`save`] only touches the device when the payload changed or a rewrite
/// is pending (first boot, or the stored copy came from older firmware).
///
/// Single owner, no interior locking: callers running load and save from
/// different tasks must serialize access themselves.
///
/// [`load`]: SettingsStorage::load
/// [`save`]: SettingsStorage::save
pub struct SettingsStorage {
    /// NVM area holding both settings partitions.
    area: u32,
    /// Partition index for partition A.
    part_a: u32,
    /// Partition index for partition B.
    part_b: u32,
    /// Offset of the free space after the last frame in partition A.
    part_a_offset: u32,
    /// Offset of the free space after the last frame in partition B.
    part_b_offset: u32,
    /// The most up-to-date settings frame.
    latest_store: SettingsFrame,
    /// Whether `latest_store` reflects what was read from the device.
    initialized: bool,
    /// Whether the next save must write even with unchanged settings.
    write_needed: bool,
    part_a_state: PartitionState,
    part_b_state: PartitionState,
}

impl SettingsStorage {
    /// Create a storage handle over partitions `part_a` and `part_b` of
    /// `area`. Nothing is read until the first [`SettingsStorage::load`].
    pub fn new(area: u32, part_a: u32, part_b: u32) -> Self {
        Self {
            area,
            part_a,
            part_b,
            part_a_offset: 0,
            part_b_offset: 0,
            latest_store: SettingsFrame::with_defaults(),
            initialized: false,
            write_needed: false,
            part_a_state: PartitionState::Empty,
            part_b_state: PartitionState::Empty,
        }
    }

    /// Load the device settings.
    ///
    /// The first call scans both partitions and picks the newest readable
    /// frame by save counter, ties going to partition A. When neither
    /// partition holds one, the compiled-in defaults are returned and the
    /// next [`SettingsStorage::save`] persists them. Subsequent calls
    /// return the cached copy.
    pub fn load(&mut self, nvm: &mut NvmTable<'_>) -> Result<Settings, Error> {
        if self.initialized {
            return Ok(self.latest_store.settings);
        }

        let (store_a, stale_a) = self.scan_partition(nvm, Bank::A)?;
        let (store_b, stale_b) = self.scan_partition(nvm, Bank::B)?;

        match (store_a, store_b) {
            (Some(frame_a), Some(frame_b)) => {
                if frame_a.counter >= frame_b.counter {
                    self.latest_store = frame_a;
                    self.write_needed = stale_a;
                } else {
                    self.latest_store = frame_b;
                    self.write_needed = stale_b;
                }
            }
            (Some(frame_a), None) => {
                self.latest_store = frame_a;
                self.write_needed = stale_a;
            }
            (None, Some(frame_b)) => {
                self.latest_store = frame_b;
                self.write_needed = stale_b;
            }
            (None, None) => {
                // Neither partition is usable: fall back to the defaults
                // and make sure the next save writes a clean frame.
                self.latest_store = SettingsFrame::with_defaults();
                self.write_needed = true;
            }
        }

        self.initialized = true;
        Ok(self.latest_store.settings)
    }

    /// Save the device settings.
    ///
    /// Nothing is written when the settings match the stored copy and no
    /// rewrite is pending. Otherwise the save counter advances and the
    /// frame is appended to the partition selected by counter parity, the
    /// other partition keeping the previous durable copy. A partition that
    /// is corrupt or out of space is erased first.
    pub fn save(&mut self, nvm: &mut NvmTable<'_>, settings: &Settings) -> Result<(), Error> {
        let changed = settings.to_bytes() != self.latest_store.settings.to_bytes();

        if changed || self.write_needed {
            // Unchanged settings with a pending rewrite still advance the
            // counter and refresh the CRC.
            self.latest_store.update(settings);
            self.write_needed = true;
        }

        if self.write_needed {
            let frame = self.latest_store;

            if frame.counter % 2 == 1 {
                write_store(
                    nvm,
                    self.area,
                    self.part_b,
                    &frame,
                    &mut self.part_b_offset,
                    self.part_b_state == PartitionState::Corrupt,
                )?;
                self.part_b_state = PartitionState::Clean;
            } else {
                write_store(
                    nvm,
                    self.area,
                    self.part_a,
                    &frame,
                    &mut self.part_a_offset,
                    self.part_a_state == PartitionState::Corrupt,
                )?;
                self.part_a_state = PartitionState::Clean;
            }
        }

        self.write_needed = false;
        Ok(())
    }

    /// Scan one partition, record its state and free offset, and return
    /// its newest readable frame together with its staleness.
    fn scan_partition(
        &mut self,
        nvm: &mut NvmTable<'_>,
        bank: Bank,
    ) -> Result<(Option<SettingsFrame>, bool), Error> {
        let part = match bank {
            Bank::A => self.part_a,
            Bank::B => self.part_b,
        };

        let (state, offset, result) = match find_latest_valid_store(nvm, self.area, part)? {
            PartitionScan::Corrupt => (PartitionState::Corrupt, None, (None, false)),
            PartitionScan::Empty => (PartitionState::Empty, Some(0), (None, false)),
            PartitionScan::Stale { frame, free_offset } => {
                (PartitionState::Clean, Some(free_offset), (Some(frame), true))
            }
            PartitionScan::Valid { frame, free_offset } => {
                (PartitionState::Clean, Some(free_offset), (Some(frame), false))
            }
        };

        match bank {
            Bank::A => {
                self.part_a_state = state;
                if let Some(offset) = offset {
                    self.part_a_offset = offset;
                }
            }
            Bank::B => {
                self.part_b_state = state;
                if let Some(offset) = offset {
                    self.part_b_offset = offset;
                }
            }
        }

        Ok(result)
    }
}

#[derive(Clone, Copy)]
enum Bank {
    A,
    B,
}
