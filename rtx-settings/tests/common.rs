#![allow(dead_code)]

// Shared mock NVM device, in one file per
// https://doc.rust-lang.org/book/ch11-03-test-organization.html

use rtx_settings::access::{NvmArea, NvmPartition, NvmTable};
use rtx_settings::error::Error;
use rtx_settings::platform::NvmDevice;
use rtx_settings::raw::{SettingsFrame, STORE_SIZE};
use rtx_settings::Settings;

pub const DEVICE_SIZE: u32 = 512;
pub const PART_SIZE: u32 = 256;
pub const AREA: u32 = 0;
pub const PART_A: u32 = 1;
pub const PART_B: u32 = 2;

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { address: u32, len: usize },
    Write { address: u32, len: usize },
    Erase { address: u32, len: u32 },
    Sync,
}

/// RAM-backed NVM device with flash semantics: starts erased to `0xFF`,
/// writes can only clear bits, erase restores all-ones. Every backend hook
/// appends to an operation journal, and a fault can be injected at any
/// operation index; a faulting write optionally applies a byte prefix
/// first to model a write torn by power loss.
pub struct MemFlash {
    pub buf: Vec<u8>,
    pub write_size: u32,
    pub erase_size: u32,
    pub operations: Vec<Operation>,
    pub fail_after_operation: usize,
    pub torn_write_bytes: usize,
}

impl MemFlash {
    pub fn new(size: u32) -> Self {
        Self::with_geometry(size, 1, PART_SIZE)
    }

    pub fn with_geometry(size: u32, write_size: u32, erase_size: u32) -> Self {
        Self {
            buf: vec![0xFFu8; size as usize],
            write_size,
            erase_size,
            operations: vec![],
            fail_after_operation: usize::MAX,
            torn_write_bytes: 0,
        }
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    fn faulted(&self) -> bool {
        self.operations.len() >= self.fail_after_operation
    }
}

impl NvmDevice for MemFlash {
    fn name(&self) -> &str {
        "mock flash"
    }

    fn size(&self) -> u32 {
        self.buf.len() as u32
    }

    fn write_size(&self) -> u32 {
        self.write_size
    }

    fn erase_size(&self) -> u32 {
        self.erase_size
    }

    fn read(&mut self, address: u32, data: &mut [u8]) -> Result<(), Error> {
        if self.faulted() {
            return Err(Error::Io);
        }
        self.operations.push(Operation::Read {
            address,
            len: data.len(),
        });

        let address = address as usize;
        data.copy_from_slice(&self.buf[address..address + data.len()]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        assert!(address.is_multiple_of(self.write_size));
        assert!((data.len() as u32).is_multiple_of(self.write_size));

        if self.faulted() {
            // Power was lost mid-write: only a prefix reached the flash.
            let torn = self.torn_write_bytes.min(data.len());
            for (i, &val) in data[..torn].iter().enumerate() {
                self.buf[address as usize + i] &= val;
            }
            return Err(Error::Io);
        }
        self.operations.push(Operation::Write {
            address,
            len: data.len(),
        });

        // Flash writes can only flip bits from one to zero.
        for (i, &val) in data.iter().enumerate() {
            self.buf[address as usize + i] &= val;
        }
        Ok(())
    }

    fn erase(&mut self, address: u32, len: u32) -> Result<(), Error> {
        assert!(address.is_multiple_of(self.erase_size));
        assert!(len.is_multiple_of(self.erase_size));

        if self.faulted() {
            return Err(Error::Io);
        }
        self.operations.push(Operation::Erase { address, len });

        let address = address as usize;
        self.buf[address..address + len as usize].fill(0xFF);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        if self.faulted() {
            return Err(Error::Io);
        }
        self.operations.push(Operation::Sync);
        Ok(())
    }
}

/// An area with two equally sized settings partitions at the start of the
/// device, the usual A/B arrangement.
pub fn settings_table(flash: &mut MemFlash) -> NvmTable<'_> {
    table_with_parts(flash, PART_SIZE)
}

pub fn table_with_parts(flash: &mut MemFlash, part_size: u32) -> NvmTable<'_> {
    let size = flash.buf.len() as u32;
    NvmTable::new(vec![NvmArea::new(
        "settings",
        flash,
        0,
        size,
        vec![
            NvmPartition {
                offset: 0,
                size: part_size,
            },
            NvmPartition {
                offset: part_size,
                size: part_size,
            },
        ],
    )])
}

/// Place a full-length frame with the given counter directly into the
/// device buffer.
pub fn put_frame(buf: &mut [u8], offset: usize, counter: u16, settings: &Settings) {
    let frame = SettingsFrame::new(counter, *settings);
    buf[offset..offset + STORE_SIZE].copy_from_slice(&frame.to_bytes());
}

pub fn settings_with_brightness(brightness: u8) -> Settings {
    let mut settings = Settings::default();
    settings.brightness = brightness;
    settings
}
