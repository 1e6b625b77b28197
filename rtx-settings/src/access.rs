//! Areas, partitions and the NVM access registry.
//!
//! An area is a named region of one device, carved into partitions by a
//! table fixed at platform bring-up. All I/O is addressed as
//! `(area, partition, offset)`; this layer resolves that triple to a
//! device-absolute address, enforcing partition bounds on the way, and
//! dispatches through the checked device operations.
//!
//! The registry is plain data handed to whoever needs NVM access instead
//! of process-global state, which keeps the whole stack runnable against
//! mock devices.

use crate::error::Error;
use crate::platform::{DeviceOps, NvmDevice};
use alloc::vec::Vec;

/// A contiguous sub-range of an area. Offsets are relative to the area's
/// device base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NvmPartition {
    pub offset: u32,
    pub size: u32,
}

/// A named region of a nonvolatile memory device with its partition table.
pub struct NvmArea<'d> {
    name: &'static str,
    dev: &'d mut dyn NvmDevice,
    base_addr: u32,
    size: u32,
    partitions: Vec<NvmPartition>,
}

impl<'d> NvmArea<'d> {
    pub fn new(
        name: &'static str,
        dev: &'d mut dyn NvmDevice,
        base_addr: u32,
        size: u32,
        partitions: Vec<NvmPartition>,
    ) -> Self {
        Self {
            name,
            dev,
            base_addr,
            size,
            partitions,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn device(&self) -> &dyn NvmDevice {
        &*self.dev
    }
}

/// Registry of all NVM areas, indexed from zero.
pub struct NvmTable<'d> {
    areas: Vec<NvmArea<'d>>,
}

impl<'d> NvmTable<'d> {
    pub fn new(areas: Vec<NvmArea<'d>>) -> Self {
        Self { areas }
    }

    /// The descriptor of an area, or `None` when the index is out of range.
    pub fn area(&self, index: u32) -> Option<&NvmArea<'d>> {
        self.areas.get(index as usize)
    }

    /// Resolve a partition of an area. Partition `0` designates the whole
    /// area; indices `1..=partition_count` select table entries. Anything
    /// else fails with [`Error::InvalidArgument`].
    pub fn partition(&self, area: u32, part: u32) -> Result<NvmPartition, Error> {
        let desc = self.area(area).ok_or(Error::InvalidArgument)?;

        if part == 0 {
            return Ok(NvmPartition {
                offset: 0,
                size: desc.size,
            });
        }

        desc.partitions
            .get(part as usize - 1)
            .copied()
            .ok_or(Error::InvalidArgument)
    }

    /// Byte-aligned read from a partition.
    pub fn read(
        &mut self,
        area: u32,
        part: u32,
        offset: u32,
        data: &mut [u8],
    ) -> Result<(), Error> {
        let address = self.resolve(area, part, offset, data.len())?;
        self.areas[area as usize].dev.dev_read(address, data)
    }

    /// Write to a partition; granularity is enforced at the device layer.
    pub fn write(&mut self, area: u32, part: u32, offset: u32, data: &[u8]) -> Result<(), Error> {
        let address = self.resolve(area, part, offset, data.len())?;
        self.areas[area as usize].dev.dev_write(address, data)
    }

    /// Erase a range of a partition back to the all-ones state.
    pub fn erase(&mut self, area: u32, part: u32, offset: u32, len: u32) -> Result<(), Error> {
        let address = self.resolve(area, part, offset, len as usize)?;
        self.areas[area as usize].dev.dev_erase(address, len)
    }

    /// Flush the area's device.
    pub fn sync(&mut self, area: u32) -> Result<(), Error> {
        self.areas
            .get_mut(area as usize)
            .ok_or(Error::InvalidArgument)?
            .dev
            .dev_sync()
    }

    /// Bounds-check an access and translate it to a device address.
    ///
    /// Accesses exceeding the device size are caught by the partition size
    /// check, provided that the partition table is well defined.
    fn resolve(&self, area: u32, part: u32, offset: u32, len: usize) -> Result<u32, Error> {
        let partition = self.partition(area, part)?;

        let len = u32::try_from(len).map_err(|_| Error::InvalidArgument)?;
        let end = offset.checked_add(len).ok_or(Error::InvalidArgument)?;
        if end > partition.size {
            return Err(Error::InvalidArgument);
        }

        // Index validated by partition() above.
        let desc = &self.areas[area as usize];
        Ok(desc.base_addr + partition.offset + offset)
    }
}
